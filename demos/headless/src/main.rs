// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Headless

// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(clippy::print_stdout, reason = "Deferred")]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use image::RgbaImage;
use jfa_sdf::util::{RenderContext, block_on_wgpu};
use jfa_sdf::{
    CpuEngine, Engine, OutlineCompositor, OutlineStyle, PreviewImage, SdfGenerator, SdfOptions,
    WgpuEngine,
};

fn main() -> Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::init();
    let args = Args::parse();
    let image = image::open(&args.input)
        .with_context(|| format!("couldn't load {}", args.input.display()))?
        .to_rgba8();
    fs::create_dir_all(&args.out_directory)?;

    if args.use_cpu {
        pollster::block_on(run(CpuEngine::new(), CpuEngine::new(), &image, &args))
    } else {
        let mut context = RenderContext::new();
        let device_id = pollster::block_on(context.device())
            .ok_or_else(|| anyhow!("No compatible device found"))?;
        let handle = &context.devices[device_id];
        let info = handle.adapter().get_info();
        println!("Rendering on {} ({:?})", info.name, info.backend);
        let generator_engine = WgpuEngine::new(&handle.device, &handle.queue);
        let compositor_engine = WgpuEngine::new(&handle.device, &handle.queue);
        block_on_wgpu(
            &handle.device,
            run(generator_engine, compositor_engine, &image, &args),
        )
    }
}

async fn run<E: Engine>(
    generator_engine: E,
    compositor_engine: E,
    image: &RgbaImage,
    args: &Args,
) -> Result<()> {
    let options = args.sdf_options();
    let stem = args
        .input
        .file_stem()
        .map_or_else(|| "image".into(), |stem| stem.to_string_lossy());

    let mut generator = SdfGenerator::new(generator_engine);
    generator.initialize().await?;
    let preview = generator.compute_preview_image(image, &options).await?;
    write_png(&args.out_directory.join(format!("{stem}_field.png")), &preview)?;

    let field = generator.compute_field(image, &options).await?;
    let mut compositor = OutlineCompositor::new(compositor_engine);
    compositor
        .render(image, &field, &options, &args.outline_style())
        .await?;
    let composite = compositor.read_image().await?;
    write_png(&args.out_directory.join(format!("{stem}_outline.png")), &composite)?;

    compositor.clear()?;
    generator.dispose()?;
    Ok(())
}

fn write_png(path: &Path, image: &PreviewImage) -> Result<()> {
    fs::write(path, image.encode_png()?)?;
    println!("Wrote result ({}x{}) to {path:?}", image.width, image.height);
    Ok(())
}

#[derive(Parser, Debug)]
#[command(about, long_about = None, bin_name="cargo run -p headless --")]
struct Args {
    /// Image whose alpha channel is the shape
    input: PathBuf,
    /// Directory to store the results into
    #[arg(long, default_value_os_t = default_directory())]
    out_directory: PathBuf,
    #[arg(long)]
    /// Whether to use CPU shaders
    use_cpu: bool,

    /// Search radius in working pixels (after `--pixel-ratio`); distances saturate at this value
    #[arg(long, default_value_t = 10.0)]
    spread: f32,
    /// Border added around the image on every side
    #[arg(long, default_value_t = 0)]
    padding: i32,
    /// Working resolution relative to the image
    #[arg(long, default_value_t = 1.0)]
    pixel_ratio: f32,
    /// Also flood from the background, producing a signed field
    #[arg(long)]
    signed: bool,
    /// Stretch the image to this width
    #[arg(long)]
    width: Option<u32>,
    /// Stretch the image to this height
    #[arg(long)]
    height: Option<u32>,

    #[arg(long, default_value_t = 1.0)]
    image_alpha: f32,
    #[arg(long, default_value_t = 10.0)]
    outline_width: f32,
    #[arg(long, default_value_t = 0.5)]
    outline_softness: f32,
    /// As `#rrggbb` or `#rrggbbaa`
    #[arg(long, default_value = "#ff0000", value_parser = parse_color)]
    outline_color: [f32; 4],
    #[arg(long, default_value_t = 10.0, allow_hyphen_values = true)]
    shadow_x: f32,
    #[arg(long, default_value_t = 10.0, allow_hyphen_values = true)]
    shadow_y: f32,
    #[arg(long, default_value_t = 30.0)]
    shadow_width: f32,
    #[arg(long, default_value_t = 0.5)]
    shadow_softness: f32,
    /// As `#rrggbb` or `#rrggbbaa`
    #[arg(long, default_value = "#ff0000", value_parser = parse_color)]
    shadow_color: [f32; 4],
}

impl Args {
    fn sdf_options(&self) -> SdfOptions {
        SdfOptions {
            spread: self.spread,
            padding: self.padding,
            pixel_ratio: self.pixel_ratio,
            signed: self.signed,
            width: self.width,
            height: self.height,
        }
    }

    fn outline_style(&self) -> OutlineStyle {
        OutlineStyle {
            image_alpha: self.image_alpha,
            outline_width: self.outline_width,
            outline_softness: self.outline_softness,
            outline_color: self.outline_color,
            shadow_offset: [self.shadow_x, self.shadow_y],
            shadow_width: self.shadow_width,
            shadow_softness: self.shadow_softness,
            shadow_color: self.shadow_color,
        }
    }
}

fn parse_color(s: &str) -> Result<[f32; 4], String> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if !matches!(hex.len(), 6 | 8) {
        return Err(format!("expected 6 or 8 hex digits, got `{s}`"));
    }
    let mut color = [1.0; 4];
    for (channel, i) in color.iter_mut().zip((0..hex.len()).step_by(2)) {
        let byte = hex
            .get(i..i + 2)
            .and_then(|digits| u8::from_str_radix(digits, 16).ok())
            .ok_or_else(|| format!("`{s}` is not a hex color"))?;
        *channel = f32::from(byte) / 255.0;
    }
    Ok(color)
}

fn default_directory() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("outputs")
}
