// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! jfa_sdf tests.

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
// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(
    missing_debug_implementations,
    unreachable_pub,
    missing_docs,
    clippy::missing_assert_message,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::allow_attributes_without_reason
)]

use anyhow::{Result, bail};
use jfa_sdf::image::{Rgba, RgbaImage};
use jfa_sdf::util::{RenderContext, block_on_wgpu};
use jfa_sdf::{
    CpuEngine, DistanceField, Engine, EngineStats, OutlineCompositor, OutlineStyle, PreviewImage,
    SdfGenerator, SdfOptions, WgpuEngine,
};

const OPAQUE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// A transparent image with a single opaque pixel at `(x, y)`.
pub fn dot(width: u32, height: u32, x: u32, y: u32) -> RgbaImage {
    let mut image = RgbaImage::new(width, height);
    image.put_pixel(x, y, OPAQUE);
    image
}

/// A transparent `size`x`size` image with an opaque square of `side`
/// pixels in the middle.
pub fn centered_square(size: u32, side: u32) -> RgbaImage {
    let start = (size - side) / 2;
    let inside = start..start + side;
    RgbaImage::from_fn(size, size, |x, y| {
        if inside.contains(&x) && inside.contains(&y) {
            OPAQUE
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Computes a field on the CPU engine, returning the engine's counters too.
pub fn cpu_field(image: &RgbaImage, options: &SdfOptions) -> Result<(DistanceField, EngineStats)> {
    let mut generator = SdfGenerator::new(CpuEngine::new());
    let field = pollster::block_on(generator.compute_field(image, options))?;
    let stats = generator.engine()?.stats();
    Ok((field, stats))
}

pub fn cpu_preview(image: &RgbaImage, options: &SdfOptions) -> Result<PreviewImage> {
    let mut generator = SdfGenerator::new(CpuEngine::new());
    Ok(pollster::block_on(
        generator.compute_preview_image(image, options),
    )?)
}

/// Creates an engine on the first adapter wgpu's environment variables pick.
pub fn gpu_engine() -> Result<WgpuEngine> {
    let mut context = RenderContext::new();
    Ok(pollster::block_on(context.engine())?)
}

pub fn gpu_field(image: &RgbaImage, options: &SdfOptions) -> Result<DistanceField> {
    let engine = gpu_engine()?;
    let device = engine.device().clone();
    let mut generator = SdfGenerator::new(engine);
    Ok(block_on_wgpu(
        &device,
        generator.compute_field(image, options),
    )?)
}

pub fn gpu_preview(image: &RgbaImage, options: &SdfOptions) -> Result<PreviewImage> {
    let engine = gpu_engine()?;
    let device = engine.device().clone();
    let mut generator = SdfGenerator::new(engine);
    Ok(block_on_wgpu(
        &device,
        generator.compute_preview_image(image, options),
    )?)
}

/// Computes the field of `image` and composites it on `engine`.
pub async fn composite<E: Engine>(
    engine: E,
    field_engine: E,
    image: &RgbaImage,
    options: &SdfOptions,
    style: &OutlineStyle,
) -> Result<PreviewImage> {
    let mut generator = SdfGenerator::new(field_engine);
    let field = generator.compute_field(image, options).await?;
    let mut compositor = OutlineCompositor::new(engine);
    compositor.render(image, &field, options, style).await?;
    Ok(compositor.read_image().await?)
}

/// Decodes an 8-bit RGBA PNG into its size and pixels.
pub fn decode_png(bytes: &[u8]) -> Result<(u32, u32, Vec<u8>)> {
    let decoder = png::Decoder::new(bytes);
    let mut reader = decoder.read_info()?;
    let mut data = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut data)?;
    if info.color_type != png::ColorType::Rgba || info.bit_depth != png::BitDepth::Eight {
        bail!(
            "expected an 8-bit RGBA PNG, got {:?} at {:?}",
            info.color_type,
            info.bit_depth
        );
    }
    data.truncate(info.buffer_size());
    Ok((info.width, info.height, data))
}

/// How far apart two fields are.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldComparison {
    /// Largest absolute difference between two distances.
    pub max_difference: f32,
    /// Texels that are interior in one field but not in the other.
    pub sign_mismatches: usize,
}

impl FieldComparison {
    pub fn assert_max_less_than(&self, tolerance: f32) {
        assert!(
            self.max_difference < tolerance,
            "distances differ by up to {}, more than {tolerance}",
            self.max_difference
        );
        assert_eq!(self.sign_mismatches, 0, "interior texels differ");
    }
}

pub fn compare_fields(a: &DistanceField, b: &DistanceField) -> Result<FieldComparison> {
    if (a.width, a.height) != (b.width, b.height) {
        bail!(
            "fields are {}x{} and {}x{}",
            a.width,
            a.height,
            b.width,
            b.height
        );
    }
    let mut comparison = FieldComparison {
        max_difference: 0.0,
        sign_mismatches: 0,
    };
    for (da, db) in a.distances().zip(b.distances()) {
        comparison.max_difference = comparison.max_difference.max((da - db).abs());
        if (da < 0.0) != (db < 0.0) {
            comparison.sign_mismatches += 1;
        }
    }
    Ok(comparison)
}

/// Computes the field of `image` on both engines.
pub fn compare_gpu_cpu(image: &RgbaImage, options: &SdfOptions) -> Result<FieldComparison> {
    let gpu = gpu_field(image, options)?;
    let (cpu, _) = cpu_field(image, options)?;
    compare_fields(&gpu, &cpu)
}

/// Largest difference of any channel of any pixel.
pub fn max_channel_difference(a: &PreviewImage, b: &PreviewImage) -> Result<u8> {
    if (a.width, a.height) != (b.width, b.height) {
        bail!(
            "images are {}x{} and {}x{}",
            a.width,
            a.height,
            b.width,
            b.height
        );
    }
    Ok(a.data
        .iter()
        .zip(&b.data)
        .map(|(x, y)| x.abs_diff(*y))
        .max()
        .unwrap_or(0))
}
