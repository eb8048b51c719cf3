// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{CpuBinding, CpuTexture, distance, stretched_texel};
use crate::JumpFloodParams;

fn empty_texel(params: &JumpFloodParams) -> [f32; 4] {
    [0.0, 0.0, params.spread, 0.0]
}

fn seed(params: &JumpFloodParams, tex: &CpuTexture<'_>, pixel: [f32; 2]) -> [f32; 4] {
    let image_pos = [
        pixel[0] / params.pixel_ratio - params.padding,
        pixel[1] / params.pixel_ratio - params.padding,
    ];
    let coverage = stretched_texel(tex, image_pos, params.source_size).map_or(0.0, |t| t[3]);
    let inside = coverage > 0.5;
    if inside == (params.is_positive != 0) {
        [pixel[0], pixel[1], 0.0, 1.0]
    } else {
        empty_texel(params)
    }
}

fn propagate(params: &JumpFloodParams, tex: &CpuTexture<'_>, pixel: [f32; 2]) -> [f32; 4] {
    let here = [pixel[0].floor() as i32, pixel[1].floor() as i32];
    let last = [
        params.resolution[0] as i32 - 1,
        params.resolution[1] as i32 - 1,
    ];
    let stride = params
        .jump
        .min(params.resolution[0].max(params.resolution[1])) as i32;
    let mut best = empty_texel(params);
    let mut best_dist = 3.4e38_f32;
    for dy in -1..=1 {
        for dx in -1..=1 {
            let coord = [
                (here[0] + dx * stride).clamp(0, last[0]),
                (here[1] + dy * stride).clamp(0, last[1]),
            ];
            let texel = tex.load(coord[0], coord[1]);
            if texel[3] < 0.5 {
                continue;
            }
            let seed_pos = if params.first_jump != 0 {
                [coord[0] as f32 + 0.5, coord[1] as f32 + 0.5]
            } else {
                [texel[0], texel[1]]
            };
            let dist = distance(pixel, seed_pos);
            if dist < best_dist {
                best_dist = dist;
                best = [seed_pos[0], seed_pos[1], dist.min(params.spread), 1.0];
            }
        }
    }
    best
}

/// Seed phase (`phase == 0`) or one propagation step of the jump flood.
pub fn jump_flood(frag_coord: [f32; 2], resources: &[CpuBinding<'_>]) -> [f32; 4] {
    let params: JumpFloodParams = resources[0].as_uniform();
    let tex = resources[1].as_texture();
    let field = if params.phase == 0 {
        seed(&params, &tex, frag_coord)
    } else {
        propagate(&params, &tex, frag_coord)
    };
    if params.unsigned_format != 0 {
        let value = (field[2] / params.spread).clamp(0.0, 1.0);
        return [value, value, value, 1.0];
    }
    field
}
