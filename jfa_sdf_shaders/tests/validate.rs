// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Checks every WGSL module with naga, and that the uniform layouts seen by
//! the shaders agree with the host-side tables.

use std::mem::offset_of;

use jfa_sdf_shaders::{SHADERS, ShaderInfo, StyleUniform};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{Module, TypeInner};

fn parse(shader: &ShaderInfo) -> Module {
    let source = shader.source();
    let module = naga::front::wgsl::parse_str(&source).unwrap_or_else(|e| {
        panic!(
            "{} failed to parse:\n{}",
            shader.name,
            e.emit_to_string(&source)
        )
    });
    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .unwrap_or_else(|e| panic!("{} failed validation: {e:?}", shader.name));
    module
}

/// Member offsets and total span of the struct called `name`.
fn struct_layout(module: &Module, name: &str) -> (Vec<(String, u32)>, u32) {
    for (_, ty) in module.types.iter() {
        if ty.name.as_deref() != Some(name) {
            continue;
        }
        if let TypeInner::Struct { members, span } = &ty.inner {
            let members = members
                .iter()
                .map(|m| (m.name.clone().unwrap_or_default(), m.offset))
                .collect();
            return (members, *span);
        }
    }
    panic!("no struct named {name}");
}

#[test]
fn all_shaders_validate() {
    for shader in SHADERS.iter() {
        let module = parse(shader);
        for entry in ["vs_main", "fs_main"] {
            assert!(
                module.entry_points.iter().any(|ep| ep.name == entry),
                "{} is missing {entry}",
                shader.name
            );
        }
    }
}

#[test]
fn params_tables_match_wgsl() {
    for shader in SHADERS.iter() {
        let module = parse(shader);
        let (members, span) = struct_layout(&module, "Params");
        assert_eq!(span, shader.params_size, "{} params size", shader.name);
        assert_eq!(members.len(), shader.params.len(), "{} params count", shader.name);
        for param in shader.params {
            let offset = members
                .iter()
                .find(|(name, _)| name == param.name)
                .map(|(_, offset)| *offset);
            assert_eq!(
                offset,
                Some(param.offset),
                "{}.{} offset",
                shader.name,
                param.name
            );
        }
    }
}

#[test]
fn style_uniform_matches_wgsl() {
    let module = parse(&SHADERS.outline);
    let (members, span) = struct_layout(&module, "Style");
    assert_eq!(span as usize, size_of::<StyleUniform>());
    let expected = [
        ("outline_color", offset_of!(StyleUniform, outline_color)),
        ("shadow_color", offset_of!(StyleUniform, shadow_color)),
        ("shadow_offset", offset_of!(StyleUniform, shadow_offset)),
        ("image_alpha", offset_of!(StyleUniform, image_alpha)),
        ("outline_width", offset_of!(StyleUniform, outline_width)),
        ("outline_softness", offset_of!(StyleUniform, outline_softness)),
        ("shadow_width", offset_of!(StyleUniform, shadow_width)),
        ("shadow_softness", offset_of!(StyleUniform, shadow_softness)),
    ];
    for ((name, offset), (expected_name, expected_offset)) in members.iter().zip(expected) {
        assert_eq!(name, expected_name);
        assert_eq!(*offset as usize, expected_offset, "Style.{name} offset");
    }
}
