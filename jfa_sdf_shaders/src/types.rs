// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uniform blocks shared between the shaders and their callers.
//!
//! Each struct mirrors the WGSL struct of the same role byte for byte.

use bytemuck::{Pod, Zeroable};

/// `Params` block of `jump_flood.wgsl`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct JumpFloodParams {
    pub resolution: [f32; 2],
    pub source_size: [f32; 2],
    pub padding: f32,
    pub pixel_ratio: f32,
    pub spread: f32,
    pub jump: f32,
    pub phase: u32,
    pub is_positive: u32,
    pub first_jump: u32,
    pub unsigned_format: u32,
}

/// `Params` block of `merge.wgsl`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct MergeParams {
    pub resolution: [f32; 2],
    pub spread: f32,
    pub unsigned_format: u32,
}

/// `Params` block of `outline.wgsl`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct OutlineParams {
    pub resolution: [f32; 2],
    pub source_size: [f32; 2],
    pub padding: f32,
    pub pixel_ratio: f32,
    pub spread: f32,
    pub is_signed: u32,
}

/// `Style` block of `outline.wgsl`, bound as its own uniform buffer so it
/// can be rewritten without touching the rest of the draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod)]
#[repr(C)]
pub struct StyleUniform {
    pub outline_color: [f32; 4],
    pub shadow_color: [f32; 4],
    pub shadow_offset: [f32; 2],
    pub image_alpha: f32,
    pub outline_width: f32,
    pub outline_softness: f32,
    pub shadow_width: f32,
    pub shadow_softness: f32,
    pub _padding: f32,
}

/// The type of a named scalar or vector parameter inside a `Params` block.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ParamType {
    F32,
    /// Stored as a `u32` that is either 0 or 1.
    Bool,
    Vec2,
    Vec4,
}

impl ParamType {
    pub const fn size(self) -> usize {
        match self {
            Self::F32 | Self::Bool => 4,
            Self::Vec2 => 8,
            Self::Vec4 => 16,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct ParamInfo {
    pub name: &'static str,
    pub ty: ParamType,
    /// Byte offset inside the `Params` block.
    pub offset: u32,
}

/// The type of resource that will be bound to a slot after the `Params` block.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BindType {
    /// A uniform buffer owned by the caller.
    Uniform,
    /// A sampled 2D texture, read with `textureLoad`.
    Texture,
}

#[derive(Copy, Clone, Debug)]
pub struct BindingInfo {
    pub name: &'static str,
    pub ty: BindType,
}
