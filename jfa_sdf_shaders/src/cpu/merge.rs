// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::CpuBinding;
use crate::MergeParams;

/// Signed merge of the two polarity fields.
pub fn merge(frag_coord: [f32; 2], resources: &[CpuBinding<'_>]) -> [f32; 4] {
    let params: MergeParams = resources[0].as_uniform();
    let tex_positive = resources[1].as_texture();
    let tex_negative = resources[2].as_texture();
    let x = (frag_coord[0].floor() as i32).min(params.resolution[0] as i32 - 1);
    let y = (frag_coord[1].floor() as i32).min(params.resolution[1] as i32 - 1);
    let outside = tex_positive.load(x, y);
    let inside = tex_negative.load(x, y);
    let dist = outside[2] - inside[2];
    if params.unsigned_format != 0 {
        let value = (0.5 + 0.5 * dist / params.spread).clamp(0.0, 1.0);
        return [value, value, value, 1.0];
    }
    if inside[2] > 0.0 {
        [inside[0], inside[1], dist, 1.0]
    } else {
        [outside[0], outside[1], dist, 0.0]
    }
}
