// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::mem;

use image::RgbaImage;

use crate::draw::DrawCallCache;
use crate::engine::{Engine, Program};
use crate::field::{DistanceField, PreviewImage};
use crate::jump_flood::{self, Polarity};
use crate::merge;
use crate::options::{FieldLayout, SdfOptions};
use crate::recording::{ImageProxy, Recording, TargetProxy};
use crate::{Error, Result};

/// Lifecycle of an [`SdfGenerator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorState {
    /// Programs have not been compiled yet.
    Uninitialized,
    Ready,
    /// Torn down; every operation fails with [`Error::Disposed`].
    Disposed,
}

enum State<E> {
    Uninitialized { engine: E },
    Ready { engine: E, cache: DrawCallCache },
    Disposed,
}

impl<E> State<E> {
    fn into_ready(self, cache: DrawCallCache) -> Self {
        match self {
            Self::Uninitialized { engine } | Self::Ready { engine, .. } => {
                Self::Ready { engine, cache }
            }
            Self::Disposed => Self::Disposed,
        }
    }
}

/// Computes distance fields of image masks.
///
/// The programs are compiled on first use, or up front with
/// [`initialize`](Self::initialize), and the draw calls are memoized per
/// viewport until [`dispose`](Self::dispose).
pub struct SdfGenerator<E: Engine> {
    state: State<E>,
}

impl<E: Engine> SdfGenerator<E> {
    pub fn new(engine: E) -> Self {
        Self {
            state: State::Uninitialized { engine },
        }
    }

    pub fn state(&self) -> GeneratorState {
        match self.state {
            State::Uninitialized { .. } => GeneratorState::Uninitialized,
            State::Ready { .. } => GeneratorState::Ready,
            State::Disposed => GeneratorState::Disposed,
        }
    }

    pub fn engine(&self) -> Result<&E> {
        match &self.state {
            State::Uninitialized { engine } | State::Ready { engine, .. } => Ok(engine),
            State::Disposed => Err(Error::Disposed),
        }
    }

    /// Compiles the jump flood and merge programs.
    ///
    /// Does nothing once the generator is ready.
    pub async fn initialize(&mut self) -> Result<()> {
        let engine = match &mut self.state {
            State::Uninitialized { engine } => engine,
            State::Ready { .. } => return Ok(()),
            State::Disposed => return Err(Error::Disposed),
        };
        let mut cache = DrawCallCache::default();
        cache.compile(engine, Program::JumpFlood).await?;
        cache.compile(engine, Program::Merge).await?;
        self.state = mem::replace(&mut self.state, State::Disposed).into_ready(cache);
        log::info!("distance field generator ready");
        Ok(())
    }

    /// Validates `options` and makes sure the programs are compiled.
    async fn prepare(
        &mut self,
        image: &RgbaImage,
        options: &SdfOptions,
    ) -> Result<(&mut E, &mut DrawCallCache, FieldLayout)> {
        if let State::Disposed = self.state {
            return Err(Error::Disposed);
        }
        let layout = options.layout(image.width(), image.height())?;
        self.initialize().await?;
        match &mut self.state {
            State::Ready { engine, cache } => Ok((engine, cache, layout)),
            _ => Err(Error::Disposed),
        }
    }

    /// Computes the field of `image` and reads it back.
    ///
    /// The result is `viewport.width * viewport.height` texels of four floats,
    /// see [`DistanceField`].
    pub async fn compute_field(
        &mut self,
        image: &RgbaImage,
        options: &SdfOptions,
    ) -> Result<DistanceField> {
        let (engine, cache, layout) = self.prepare(image, options).await?;
        let seed = upload_seed(engine, image)?;
        let field = solve_field(engine, cache, &layout, seed).await;
        let released = release_seed(engine, seed);
        let field = field.inspect_err(|_| cache.invalidate())?;
        if let Err(err) = released {
            release_targets(engine, &[field]);
            return Err(err);
        }

        let data = engine.read_target(field).await;
        let mut recording = Recording::default();
        recording.free_target(field);
        engine.run_recording(&recording, "release field")?;
        Ok(DistanceField {
            width: layout.viewport.width,
            height: layout.viewport.height,
            data: data?,
        })
    }

    /// Computes the field of `image` and renders it as a greyscale image.
    ///
    /// Unsigned fields map `[0, spread]` to black through white. Signed
    /// fields map `[-spread, spread]`, so the edge of the shape is mid grey.
    pub async fn compute_preview_image(
        &mut self,
        image: &RgbaImage,
        options: &SdfOptions,
    ) -> Result<PreviewImage> {
        let (engine, cache, layout) = self.prepare(image, options).await?;
        let viewport = layout.viewport;
        engine.resize_surface(viewport.width, viewport.height)?;
        let seed = upload_seed(engine, image)?;
        let solved = solve_preview(engine, cache, &layout, seed).await;
        let released = release_seed(engine, seed);
        solved.inspect_err(|_| cache.invalidate())?;
        released?;
        Ok(PreviewImage {
            width: viewport.width,
            height: viewport.height,
            data: engine.read_surface().await?,
        })
    }

    /// Releases the draw calls and the engine.
    ///
    /// Afterwards every operation fails with [`Error::Disposed`].
    pub fn dispose(&mut self) -> Result<()> {
        match mem::replace(&mut self.state, State::Disposed) {
            State::Disposed => Err(Error::Disposed),
            State::Uninitialized { engine } => {
                drop(engine);
                Ok(())
            }
            State::Ready { mut engine, cache } => {
                let mut recording = Recording::default();
                cache.free(&mut recording);
                if let Err(err) = engine.run_recording(&recording, "dispose") {
                    log::warn!("failed to release draw calls on dispose: {err}");
                }
                drop(engine);
                Ok(())
            }
        }
    }

    #[cfg(test)]
    fn cached_draw_calls(&self) -> usize {
        match &self.state {
            State::Ready { cache, .. } => cache.len(),
            _ => 0,
        }
    }
}

fn upload_seed<E: Engine>(engine: &mut E, image: &RgbaImage) -> Result<ImageProxy> {
    let mut recording = Recording::default();
    let seed = recording.upload_image(image.width(), image.height(), image.as_raw().as_slice());
    engine.run_recording(&recording, "seed upload")?;
    Ok(seed)
}

fn release_seed<E: Engine>(engine: &mut E, seed: ImageProxy) -> Result<()> {
    let mut recording = Recording::default();
    recording.free_image(seed);
    engine.run_recording(&recording, "seed release")
}

fn release_targets<E: Engine>(engine: &mut E, targets: &[TargetProxy]) {
    let mut recording = Recording::default();
    for target in targets {
        recording.free_target(*target);
    }
    if let Err(err) = engine.run_recording(&recording, "release") {
        log::warn!("failed to release targets: {err}");
    }
}

/// Runs both polarities, handing the targets of a failed run back to the engine.
async fn flood_both<E: Engine>(
    engine: &mut E,
    cache: &mut DrawCallCache,
    layout: &FieldLayout,
    seed: ImageProxy,
) -> Result<(TargetProxy, TargetProxy)> {
    let draw = cache.get(Program::JumpFlood, layout.viewport)?;
    let positive = jump_flood::flood(engine, draw, layout, seed, Polarity::Positive).await?;
    match jump_flood::flood(engine, draw, layout, seed, Polarity::Negative).await {
        Ok(negative) => Ok((positive, negative)),
        Err(err) => {
            release_targets(engine, &[positive]);
            Err(err)
        }
    }
}

async fn solve_field<E: Engine>(
    engine: &mut E,
    cache: &mut DrawCallCache,
    layout: &FieldLayout,
    seed: ImageProxy,
) -> Result<TargetProxy> {
    if !layout.signed {
        let draw = cache.get(Program::JumpFlood, layout.viewport)?;
        return jump_flood::flood(engine, draw, layout, seed, Polarity::Positive).await;
    }
    let (positive, negative) = flood_both(engine, cache, layout, seed).await?;
    let draw = match cache.get(Program::Merge, layout.viewport) {
        Ok(draw) => draw,
        Err(err) => {
            release_targets(engine, &[positive, negative]);
            return Err(err);
        }
    };
    merge::merge(engine, draw, layout, positive, negative)
}

async fn solve_preview<E: Engine>(
    engine: &mut E,
    cache: &mut DrawCallCache,
    layout: &FieldLayout,
    seed: ImageProxy,
) -> Result<()> {
    if !layout.signed {
        let draw = cache.get(Program::JumpFlood, layout.viewport)?;
        return jump_flood::flood_to_surface(engine, draw, layout, seed).await;
    }
    let (positive, negative) = flood_both(engine, cache, layout, seed).await?;
    let draw = match cache.get(Program::Merge, layout.viewport) {
        Ok(draw) => draw,
        Err(err) => {
            release_targets(engine, &[positive, negative]);
            return Err(err);
        }
    };
    merge::merge_to_surface(engine, draw, layout, positive, negative)
}
