// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{CpuBinding, CpuTexture, stretched_texel};
use crate::{OutlineParams, StyleUniform};

fn shape_distance(params: &OutlineParams, field: &CpuTexture<'_>, pixel: [f32; 2]) -> f32 {
    let offset = params.padding * params.pixel_ratio;
    let x = (pixel[0] + offset).floor() as i32;
    let y = (pixel[1] + offset).floor() as i32;
    let mut dist = field.load(x, y)[2].min(params.spread);
    if params.is_signed != 0 {
        dist = dist.max(0.0);
    }
    dist / params.pixel_ratio
}

fn coverage(dist: f32, width: f32, softness: f32) -> f32 {
    if width <= 0.0 {
        return 0.0;
    }
    if dist >= width {
        return 0.0;
    }
    let inner = width * (1.0 - softness.clamp(0.0, 1.0));
    if dist <= inner {
        return 1.0;
    }
    let t = (dist - inner) / (width - inner);
    1.0 - t * t * (3.0 - 2.0 * t)
}

fn over(top: [f32; 4], bottom: [f32; 4]) -> [f32; 4] {
    let alpha = top[3] + bottom[3] * (1.0 - top[3]);
    if alpha <= 0.0 {
        return [0.0; 4];
    }
    let channel = |c: usize| (top[c] * top[3] + bottom[c] * bottom[3] * (1.0 - top[3])) / alpha;
    [channel(0), channel(1), channel(2), alpha]
}

/// Outline and shadow composite over the source image.
pub fn outline(frag_coord: [f32; 2], resources: &[CpuBinding<'_>]) -> [f32; 4] {
    let params: OutlineParams = resources[0].as_uniform();
    let style: StyleUniform = resources[1].as_uniform();
    let src = resources[2].as_texture();
    let field = resources[3].as_texture();

    let image_pos = [
        frag_coord[0] / params.pixel_ratio,
        frag_coord[1] / params.pixel_ratio,
    ];
    let mut color = stretched_texel(&src, image_pos, params.source_size).unwrap_or([0.0; 4]);
    color[3] *= style.image_alpha;

    let outline_dist = shape_distance(&params, &field, frag_coord);
    let shadow_pixel = [
        frag_coord[0] - style.shadow_offset[0] * params.pixel_ratio,
        frag_coord[1] - style.shadow_offset[1] * params.pixel_ratio,
    ];
    let shadow_dist = shape_distance(&params, &field, shadow_pixel);
    let [r, g, b, a] = style.outline_color;
    let outline = [
        r,
        g,
        b,
        a * coverage(outline_dist, style.outline_width, style.outline_softness),
    ];
    let [r, g, b, a] = style.shadow_color;
    let shadow = [
        r,
        g,
        b,
        a * coverage(shadow_dist, style.shadow_width, style.shadow_softness),
    ];
    over(color, over(outline, shadow))
}

#[cfg(test)]
mod tests {
    use super::{coverage, over};

    #[test]
    fn hard_edge_without_softness() {
        assert_eq!(coverage(2.0, 2.0, 0.0), 0.0);
        assert_eq!(coverage(1.9, 2.0, 0.0), 1.0);
        assert_eq!(coverage(2.0, 2.0, 1.0), 0.0);
    }

    #[test]
    fn soft_edge_falls_off() {
        let near = coverage(6.0, 10.0, 0.5);
        let far = coverage(9.0, 10.0, 0.5);
        assert!(near > far && far > 0.0);
        assert_eq!(coverage(5.0, 10.0, 0.5), 1.0);
    }

    #[test]
    fn opaque_top_wins() {
        let top = [1.0, 0.0, 0.0, 1.0];
        assert_eq!(over(top, [0.0, 1.0, 0.0, 1.0]), top);
        assert_eq!(over([0.0; 4], [0.0; 4]), [0.0; 4]);
    }
}
