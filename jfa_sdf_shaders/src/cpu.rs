// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU implementations of the fragment stages.
//!
//! Each function is called once per pixel center with the same bindings the
//! GPU program sees, in slot order. They are useful for testing and for
//! running the passes on machines without an adapter, but they make no
//! attempt at being fast.

mod jump_flood;
mod merge;
mod outline;

pub use jump_flood::jump_flood;
pub use merge::merge;
pub use outline::outline;

use bytemuck::Pod;

/// Signature shared by all CPU fragment stages.
///
/// `frag_coord` is the pixel center in framebuffer coordinates, matching
/// `@builtin(position).xy`.
pub type CpuFragmentShader = fn(frag_coord: [f32; 2], resources: &[CpuBinding<'_>]) -> [f32; 4];

#[derive(Clone, Copy)]
pub enum CpuBinding<'a> {
    Uniform(&'a [u8]),
    Texture(CpuTexture<'a>),
}

#[derive(Clone, Copy)]
pub enum CpuTexels<'a> {
    /// Normalized on load, as `Rgba8Unorm` is.
    Rgba8(&'a [u8]),
    Rgba32Float(&'a [[f32; 4]]),
}

#[derive(Clone, Copy)]
pub struct CpuTexture<'a> {
    pub width: u32,
    pub height: u32,
    pub texels: CpuTexels<'a>,
}

impl CpuTexture<'_> {
    /// Equivalent of `textureLoad`, except that out of range coordinates are
    /// clamped to the edge instead of being undefined.
    pub fn load(&self, x: i32, y: i32) -> [f32; 4] {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        let index = y * self.width as usize + x;
        match self.texels {
            CpuTexels::Rgba8(bytes) => {
                let texel = &bytes[index * 4..index * 4 + 4];
                [0, 1, 2, 3].map(|c| f32::from(texel[c]) / 255.0)
            }
            CpuTexels::Rgba32Float(texels) => texels[index],
        }
    }

    pub fn dimensions(&self) -> [i32; 2] {
        [self.width as i32, self.height as i32]
    }
}

impl<'a> CpuBinding<'a> {
    /// Reads a uniform block.
    ///
    /// Panics if the binding is not a uniform buffer large enough for `T`.
    pub fn as_uniform<T: Pod>(&self) -> T {
        match self {
            CpuBinding::Uniform(bytes) => bytemuck::pod_read_unaligned(&bytes[..size_of::<T>()]),
            CpuBinding::Texture(_) => panic!("resource type mismatch: expected a uniform"),
        }
    }

    /// Panics if the binding is not a texture.
    pub fn as_texture(&self) -> CpuTexture<'a> {
        match self {
            CpuBinding::Texture(texture) => *texture,
            CpuBinding::Uniform(_) => panic!("resource type mismatch: expected a texture"),
        }
    }
}

fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// Nearest texel of a source image stretched over `size`, or `None` outside it.
fn stretched_texel(texture: &CpuTexture<'_>, pos: [f32; 2], size: [f32; 2]) -> Option<[f32; 4]> {
    if pos[0] < 0.0 || pos[1] < 0.0 || pos[0] >= size[0] || pos[1] >= size[1] {
        return None;
    }
    let [width, height] = texture.dimensions();
    let x = (pos[0] * width as f32 / size[0]).floor() as i32;
    let y = (pos[1] * height as f32 / size[1]).floor() as i32;
    Some(texture.load(x.min(width - 1), y.min(height - 1)))
}
