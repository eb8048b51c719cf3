// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Outline and drop shadow composited from a distance field.

use std::mem;

use image::RgbaImage;
use jfa_sdf_shaders::StyleUniform;

use crate::draw::DrawCallCache;
use crate::engine::{Engine, Program};
use crate::field::{DistanceField, PreviewImage};
use crate::options::{SdfOptions, Viewport};
use crate::recording::{BufferProxy, DrawTarget, ImageProxy, Recording, TargetProxy};
use crate::{Error, Result};

/// Appearance of the composite.
///
/// Widths and offsets are in source pixels, colors are straight RGBA.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutlineStyle {
    /// Opacity of the source image drawn over the outline.
    pub image_alpha: f32,
    pub outline_width: f32,
    /// Fraction of the width, from the outside, over which the outline fades.
    pub outline_softness: f32,
    pub outline_color: [f32; 4],
    pub shadow_offset: [f32; 2],
    pub shadow_width: f32,
    pub shadow_softness: f32,
    pub shadow_color: [f32; 4],
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self {
            image_alpha: 1.0,
            outline_width: 10.0,
            outline_softness: 0.5,
            outline_color: [1.0, 0.0, 0.0, 1.0],
            shadow_offset: [10.0, 10.0],
            shadow_width: 30.0,
            shadow_softness: 0.5,
            shadow_color: [1.0, 0.0, 0.0, 1.0],
        }
    }
}

impl OutlineStyle {
    pub fn to_uniform(&self) -> StyleUniform {
        StyleUniform {
            outline_color: self.outline_color,
            shadow_color: self.shadow_color,
            shadow_offset: self.shadow_offset,
            image_alpha: self.image_alpha,
            outline_width: self.outline_width,
            outline_softness: self.outline_softness,
            shadow_width: self.shadow_width,
            shadow_softness: self.shadow_softness,
            _padding: 0.0,
        }
    }
}

/// The compiled program and the style buffer, created on the first render.
struct Pipeline {
    cache: DrawCallCache,
    style: BufferProxy,
}

/// Textures of the last render, kept for [`OutlineCompositor::redraw`].
#[derive(Clone, Copy)]
struct Bound {
    output: Viewport,
    source: ImageProxy,
    field: TargetProxy,
}

impl Bound {
    fn free(&self, recording: &mut Recording) {
        recording.free_image(self.source);
        recording.free_target(self.field);
    }
}

enum State<E> {
    Live {
        engine: E,
        pipeline: Option<Pipeline>,
        bound: Option<Bound>,
    },
    Cleared,
}

/// Draws a source image over the outline and shadow of its distance field.
///
/// The composite is drawn to the engine's surface at the source size times
/// the pixel ratio. Once rendered, a new style can be applied with
/// [`redraw`](Self::redraw) without uploading the textures again.
pub struct OutlineCompositor<E: Engine> {
    state: State<E>,
}

impl<E: Engine> OutlineCompositor<E> {
    pub fn new(engine: E) -> Self {
        Self {
            state: State::Live {
                engine,
                pipeline: None,
                bound: None,
            },
        }
    }

    pub fn engine(&self) -> Result<&E> {
        match &self.state {
            State::Live { engine, .. } => Ok(engine),
            State::Cleared => Err(Error::Disposed),
        }
    }

    /// Uploads `image` and `field` and draws the composite.
    ///
    /// `field` must come from [`SdfGenerator::compute_field`] with the same
    /// `options`, otherwise [`Error::FieldSizeMismatch`] is returned. The
    /// textures of a previous render are released.
    ///
    /// [`SdfGenerator::compute_field`]: crate::SdfGenerator::compute_field
    pub async fn render(
        &mut self,
        image: &RgbaImage,
        field: &DistanceField,
        options: &SdfOptions,
        style: &OutlineStyle,
    ) -> Result<()> {
        let State::Live {
            engine,
            pipeline,
            bound,
        } = &mut self.state
        else {
            return Err(Error::Disposed);
        };
        let layout = options.layout(image.width(), image.height())?;
        let output = layout.output_size()?;
        let expected = (layout.viewport.width, layout.viewport.height);
        let texels = expected.0 as usize * expected.1 as usize;
        if (field.width, field.height) != expected || field.data.len() != texels * 4 {
            return Err(Error::FieldSizeMismatch {
                expected,
                actual: (field.width, field.height),
            });
        }

        if pipeline.is_none() {
            let mut cache = DrawCallCache::default();
            cache.compile(engine, Program::Outline).await?;
            let size = size_of::<StyleUniform>() as u64;
            *pipeline = Some(Pipeline {
                cache,
                style: BufferProxy::new(size, "style"),
            });
            log::info!("outline compositor ready");
        }
        let Some(pipeline) = pipeline.as_mut() else {
            return Err(Error::UnavailableResource("outline", "render"));
        };
        engine.resize_surface(output.width, output.height)?;

        let mut recording = Recording::default();
        let previous = bound.take();
        if let Some(previous) = &previous {
            previous.free(&mut recording);
        }
        let (width, height) = image.dimensions();
        let source = recording.upload_image(width, height, image.as_raw().as_slice());
        let field_target = recording.upload_field(field.width, field.height, field.data.as_slice());
        let style_buffer = pipeline.style;
        recording.write_buffer(style_buffer, bytemuck::bytes_of(&style.to_uniform()));
        let draw = pipeline.cache.get(Program::Outline, output)?;
        draw.set("resolution", output.resolution())
            .set("source_size", layout.source_size())
            .set("padding", layout.padding as f32)
            .set("pixel_ratio", layout.pixel_ratio)
            .set("spread", layout.spread)
            .set("is_signed", layout.signed)
            .set("style", style_buffer)
            .set("src", source)
            .set("field", field_target);
        draw.draw(&mut recording, DrawTarget::Surface);

        let current = Bound {
            output,
            source,
            field: field_target,
        };
        match engine.run_recording(&recording, "outline.render") {
            Ok(()) => {
                *bound = Some(current);
                Ok(())
            }
            Err(err) => {
                pipeline.cache.invalidate();
                let mut release = Recording::default();
                for leftover in previous.iter().chain([&current]) {
                    leftover.free(&mut release);
                }
                if let Err(err) = engine.run_recording(&release, "outline.release") {
                    log::warn!("failed to release outline textures: {err}");
                }
                Err(err)
            }
        }
    }

    /// Draws the last rendered image and field again with a new style.
    ///
    /// Only the style buffer is rewritten.
    pub async fn redraw(&mut self, style: &OutlineStyle) -> Result<()> {
        let (engine, pipeline, bound) = match &mut self.state {
            State::Live {
                engine,
                pipeline: Some(pipeline),
                bound: Some(bound),
            } => (engine, pipeline, bound),
            State::Live { .. } => return Err(Error::NotRendered),
            State::Cleared => return Err(Error::Disposed),
        };
        let mut recording = Recording::default();
        recording.write_buffer(pipeline.style, bytemuck::bytes_of(&style.to_uniform()));
        let draw = pipeline.cache.get(Program::Outline, bound.output)?;
        draw.draw(&mut recording, DrawTarget::Surface);
        engine
            .run_recording(&recording, "outline.redraw")
            .inspect_err(|_| pipeline.cache.invalidate())
    }

    /// Reads the composite back from the surface.
    pub async fn read_image(&mut self) -> Result<PreviewImage> {
        let (engine, bound) = match &mut self.state {
            State::Live {
                engine,
                bound: Some(bound),
                ..
            } => (engine, bound),
            State::Live { .. } => return Err(Error::NotRendered),
            State::Cleared => return Err(Error::Disposed),
        };
        let output = bound.output;
        Ok(PreviewImage {
            width: output.width,
            height: output.height,
            data: engine.read_surface().await?,
        })
    }

    /// Releases the textures, the style buffer and the engine.
    ///
    /// Afterwards every operation fails with [`Error::Disposed`].
    pub fn clear(&mut self) -> Result<()> {
        let State::Live {
            mut engine,
            pipeline,
            bound,
        } = mem::replace(&mut self.state, State::Cleared)
        else {
            return Err(Error::Disposed);
        };
        let mut recording = Recording::default();
        if let Some(bound) = bound {
            bound.free(&mut recording);
        }
        if let Some(pipeline) = pipeline {
            recording.free_buffer(pipeline.style);
            pipeline.cache.free(&mut recording);
        }
        if let Err(err) = engine.run_recording(&recording, "outline.clear") {
            log::warn!("failed to release outline resources on clear: {err}");
        }
        drop(engine);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::{OutlineCompositor, OutlineStyle};
    use crate::{CpuEngine, DistanceField, Engine, Error, SdfOptions};

    /// A transparent `size`x`size` image with one white pixel at `(2, 2)`,
    /// and its exact unsigned field.
    fn dot(size: u32) -> (RgbaImage, DistanceField) {
        let mut image = RgbaImage::new(size, size);
        image.put_pixel(2, 2, Rgba([255, 255, 255, 255]));
        let mut data = Vec::new();
        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 - 2.0;
                let dy = y as f32 - 2.0;
                data.extend([2.0, 2.0, (dx * dx + dy * dy).sqrt(), 1.0]);
            }
        }
        let field = DistanceField {
            width: size,
            height: size,
            data,
        };
        (image, field)
    }

    fn no_shadow() -> OutlineStyle {
        OutlineStyle {
            shadow_width: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn outline_surrounds_the_image() {
        let (image, field) = dot(6);
        let mut compositor = OutlineCompositor::new(CpuEngine::new());
        let options = SdfOptions::default();
        pollster::block_on(compositor.render(&image, &field, &options, &no_shadow())).unwrap();
        let composite = pollster::block_on(compositor.read_image()).unwrap();
        assert_eq!((composite.width, composite.height), (6, 6));
        assert_eq!(composite.pixel(2, 2), [255, 255, 255, 255]);
        assert_eq!(composite.pixel(5, 5), [255, 0, 0, 255]);
    }

    #[test]
    fn redraw_only_rewrites_the_style() {
        let (image, field) = dot(6);
        let mut compositor = OutlineCompositor::new(CpuEngine::new());
        let options = SdfOptions::default();
        pollster::block_on(compositor.render(&image, &field, &options, &no_shadow())).unwrap();
        let before = compositor.engine().unwrap().stats();

        let blue = OutlineStyle {
            outline_color: [0.0, 0.0, 1.0, 1.0],
            ..no_shadow()
        };
        pollster::block_on(compositor.redraw(&blue)).unwrap();
        let after = compositor.engine().unwrap().stats();
        assert_eq!(after.textures_uploaded, before.textures_uploaded);
        assert_eq!(after.targets_allocated, before.targets_allocated);
        assert_eq!(after.buffers_allocated, before.buffers_allocated);
        assert_eq!(after.draws, before.draws + 1);

        let composite = pollster::block_on(compositor.read_image()).unwrap();
        assert_eq!(composite.pixel(5, 5), [0, 0, 255, 255]);
        assert_eq!(composite.pixel(2, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn rendering_again_releases_the_previous_textures() {
        let (image, field) = dot(6);
        let mut compositor = OutlineCompositor::new(CpuEngine::new());
        let options = SdfOptions::default();
        for _ in 0..2 {
            pollster::block_on(compositor.render(&image, &field, &options, &no_shadow())).unwrap();
        }
        let stats = compositor.engine().unwrap().stats();
        assert_eq!(stats.textures_uploaded, 4);
        assert_eq!(stats.live_textures(), 2);
        assert_eq!(stats.buffers_allocated, 2);
        assert_eq!(stats.surface_resizes, 1);
    }

    #[test]
    fn redraw_needs_a_render() {
        let mut compositor = OutlineCompositor::new(CpuEngine::new());
        let redrawn = pollster::block_on(compositor.redraw(&OutlineStyle::default()));
        assert!(matches!(redrawn, Err(Error::NotRendered)));
        let read = pollster::block_on(compositor.read_image());
        assert!(matches!(read, Err(Error::NotRendered)));
    }

    #[test]
    fn field_must_match_the_viewport() {
        let (image, _) = dot(6);
        let (_, field) = dot(5);
        let mut compositor = OutlineCompositor::new(CpuEngine::new());
        let options = SdfOptions::default();
        let style = OutlineStyle::default();
        let result = pollster::block_on(compositor.render(&image, &field, &options, &style));
        assert!(matches!(
            result,
            Err(Error::FieldSizeMismatch {
                expected: (6, 6),
                actual: (5, 5)
            })
        ));
        assert_eq!(compositor.engine().unwrap().stats().live_textures(), 0);
    }

    #[test]
    fn cleared_compositor_is_disposed() {
        let (image, field) = dot(6);
        let mut compositor = OutlineCompositor::new(CpuEngine::new());
        let options = SdfOptions::default();
        pollster::block_on(compositor.render(&image, &field, &options, &no_shadow())).unwrap();
        compositor.clear().unwrap();
        assert!(matches!(compositor.clear(), Err(Error::Disposed)));
        assert!(matches!(compositor.engine(), Err(Error::Disposed)));
        let redrawn = pollster::block_on(compositor.redraw(&OutlineStyle::default()));
        assert!(matches!(redrawn, Err(Error::Disposed)));
    }
}
