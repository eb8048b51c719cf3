// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The WGSL programs behind [jfa_sdf], together with the metadata needed to
//! bind them: the byte layout of each `Params` uniform block and the names of
//! the remaining resource slots.
//!
//! Every program is a fragment stage drawn over the same full-screen quad.
//! [`ShaderInfo::source`] prepends the shared vertex stage.
//!
//! With the `cpu` feature (on by default), the [`cpu`] module provides
//! per-pixel ports of every fragment stage.
//!
//! [jfa_sdf]: https://docs.rs/jfa_sdf

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs, reason = "We have many as-yet undocumented items.")]
#![allow(
    clippy::cast_possible_truncation,
    clippy::missing_assert_message,
    reason = "Deferred, only apply in some feature sets so not expect"
)]

mod types;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use types::{
    BindType, BindingInfo, JumpFloodParams, MergeParams, OutlineParams, ParamInfo, ParamType,
    StyleUniform,
};

use core::mem::offset_of;

/// Vertex stage shared by all programs, emitting `VertexOutput`.
pub const FULLSCREEN_WGSL: &str = include_str!("../shader/fullscreen.wgsl");

/// Entry point of the shared vertex stage.
pub const VERTEX_MAIN: &str = "vs_main";
/// Entry point of every fragment stage.
pub const FRAGMENT_MAIN: &str = "fs_main";

#[derive(Debug)]
pub struct ShaderInfo {
    pub name: &'static str,
    /// Fragment stage only; see [`ShaderInfo::source`].
    pub wgsl: &'static str,
    /// Fields of the `Params` block bound at slot 0.
    pub params: &'static [ParamInfo],
    pub params_size: u32,
    /// Resources bound at slots 1 and up, in order.
    pub bindings: &'static [BindingInfo],
}

impl ShaderInfo {
    /// Complete module source, vertex and fragment stage.
    pub fn source(&self) -> String {
        format!("{FULLSCREEN_WGSL}\n{}", self.wgsl)
    }

    pub fn param(&self, name: &str) -> Option<&'static ParamInfo> {
        self.params.iter().find(|param| param.name == name)
    }

    /// Slot index of a named binding, counting the `Params` block as slot 0.
    pub fn binding(&self, name: &str) -> Option<(u32, &'static BindingInfo)> {
        self.bindings
            .iter()
            .position(|binding| binding.name == name)
            .map(|index| (index as u32 + 1, &self.bindings[index]))
    }
}

macro_rules! param {
    ($block:ident, $name:ident: $ty:ident) => {
        ParamInfo {
            name: stringify!($name),
            ty: ParamType::$ty,
            offset: offset_of!($block, $name) as u32,
        }
    };
}

macro_rules! bind {
    ($name:ident: $ty:ident) => {
        BindingInfo {
            name: stringify!($name),
            ty: BindType::$ty,
        }
    };
}

#[derive(Debug)]
pub struct Shaders {
    pub jump_flood: ShaderInfo,
    pub merge: ShaderInfo,
    pub outline: ShaderInfo,
}

pub static SHADERS: Shaders = Shaders {
    jump_flood: ShaderInfo {
        name: "jump_flood",
        wgsl: include_str!("../shader/jump_flood.wgsl"),
        params: &[
            param!(JumpFloodParams, resolution: Vec2),
            param!(JumpFloodParams, source_size: Vec2),
            param!(JumpFloodParams, padding: F32),
            param!(JumpFloodParams, pixel_ratio: F32),
            param!(JumpFloodParams, spread: F32),
            param!(JumpFloodParams, jump: F32),
            param!(JumpFloodParams, phase: Bool),
            param!(JumpFloodParams, is_positive: Bool),
            param!(JumpFloodParams, first_jump: Bool),
            param!(JumpFloodParams, unsigned_format: Bool),
        ],
        params_size: size_of::<JumpFloodParams>() as u32,
        bindings: &[bind!(tex: Texture)],
    },
    merge: ShaderInfo {
        name: "merge",
        wgsl: include_str!("../shader/merge.wgsl"),
        params: &[
            param!(MergeParams, resolution: Vec2),
            param!(MergeParams, spread: F32),
            param!(MergeParams, unsigned_format: Bool),
        ],
        params_size: size_of::<MergeParams>() as u32,
        bindings: &[bind!(tex_positive: Texture), bind!(tex_negative: Texture)],
    },
    outline: ShaderInfo {
        name: "outline",
        wgsl: include_str!("../shader/outline.wgsl"),
        params: &[
            param!(OutlineParams, resolution: Vec2),
            param!(OutlineParams, source_size: Vec2),
            param!(OutlineParams, padding: F32),
            param!(OutlineParams, pixel_ratio: F32),
            param!(OutlineParams, spread: F32),
            param!(OutlineParams, is_signed: Bool),
        ],
        params_size: size_of::<OutlineParams>() as u32,
        bindings: &[
            bind!(style: Uniform),
            bind!(src: Texture),
            bind!(field: Texture),
        ],
    },
};

impl Shaders {
    pub fn iter(&self) -> impl Iterator<Item = &ShaderInfo> {
        [&self.jump_flood, &self.merge, &self.outline].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::SHADERS;

    #[test]
    fn params_fit_their_blocks() {
        for shader in SHADERS.iter() {
            for param in shader.params {
                assert!(
                    param.offset as usize + param.ty.size() <= shader.params_size as usize,
                    "{}.{} overruns the params block",
                    shader.name,
                    param.name
                );
            }
        }
    }

    #[test]
    fn bindings_start_after_params() {
        let (slot, info) = SHADERS.outline.binding("field").unwrap();
        assert_eq!(slot, 3);
        assert_eq!(info.ty, super::BindType::Texture);
        assert!(SHADERS.jump_flood.binding("field").is_none());
    }
}
