// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Nearest-seed propagation for one polarity.

use crate::Result;
use crate::draw::DrawCall;
use crate::engine::{Engine, next_tick};
use crate::options::FieldLayout;
use crate::recording::{DrawTarget, ImageProxy, Recording, TargetProxy};

/// Which source pixels act as seeds.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Polarity {
    /// Foreground pixels; the field measures the distance to the shape.
    Positive,
    /// Background pixels; the field measures the distance to the outside.
    Negative,
}

/// Number of propagation draws for `spread`: `ceil(log2(spread)) + 1`.
pub fn jump_count(spread: f32) -> u32 {
    spread.log2().ceil().max(0.0) as u32 + 1
}

/// The two render targets the passes alternate between.
#[derive(Clone, Copy, Debug)]
struct PingPong {
    slots: [TargetProxy; 2],
    front: usize,
}

impl PingPong {
    fn new(recording: &mut Recording, width: u32, height: u32) -> Self {
        Self {
            slots: [
                recording.alloc_target(width, height),
                recording.alloc_target(width, height),
            ],
            front: 0,
        }
    }

    /// The target holding the latest field.
    fn front(&self) -> TargetProxy {
        self.slots[self.front]
    }

    /// The target the next step writes to.
    fn back(&self) -> TargetProxy {
        self.slots[1 - self.front]
    }

    fn flip(&mut self) {
        self.front = 1 - self.front;
    }

    fn free(&self, recording: &mut Recording) {
        for target in self.slots {
            recording.free_target(target);
        }
    }
}

/// Runs a recording, releasing both targets if it fails.
fn submit<E: Engine>(
    engine: &mut E,
    recording: &Recording,
    label: &'static str,
    targets: &PingPong,
) -> Result<()> {
    engine.run_recording(recording, label).inspect_err(|_| {
        let mut release = Recording::default();
        targets.free(&mut release);
        if let Err(err) = engine.run_recording(&release, "jump_flood.release") {
            log::warn!("failed to release jump flood targets: {err}");
        }
    })
}

/// Seeds and propagates, leaving the field in the front target.
///
/// With `to_surface`, the final step is drawn to the surface as an unsigned
/// preview instead, and nothing is flipped.
async fn propagate<E: Engine>(
    engine: &mut E,
    draw: &mut DrawCall,
    layout: &FieldLayout,
    seed: ImageProxy,
    polarity: Polarity,
    to_surface: bool,
) -> Result<PingPong> {
    let viewport = layout.viewport;
    let mut recording = Recording::default();
    let mut targets = PingPong::new(&mut recording, viewport.width, viewport.height);
    draw.set("resolution", viewport.resolution())
        .set("source_size", layout.source_size())
        .set("padding", layout.padding as f32)
        .set("pixel_ratio", layout.pixel_ratio)
        .set("spread", layout.spread)
        .set("jump", 0.0)
        .set("phase", false)
        .set("is_positive", polarity == Polarity::Positive)
        .set("first_jump", false)
        .set("unsigned_format", false)
        .set("tex", seed);
    draw.draw(&mut recording, DrawTarget::Target(targets.front()));
    submit(engine, &recording, "jump_flood.seed", &targets)?;

    let count = jump_count(layout.spread);
    let max_jump = viewport.width.max(viewport.height) as f32;
    for step in 0..count {
        next_tick().await;
        let power = count - 1 - step;
        let jump = (power as f32).exp2().min(max_jump);
        log::trace!("jump flood {polarity:?} step {step}: power {power}, jump {jump}");
        let last = step + 1 == count;
        draw.set("phase", true)
            .set("jump", jump)
            .set("first_jump", step == 0)
            .set("unsigned_format", last && to_surface)
            .set("tex", targets.front());
        let mut recording = Recording::default();
        if last && to_surface {
            draw.draw(&mut recording, DrawTarget::Surface);
        } else {
            draw.draw(&mut recording, DrawTarget::Target(targets.back()));
            targets.flip();
        }
        submit(engine, &recording, "jump_flood.step", &targets)?;
    }
    Ok(targets)
}

/// Computes the field of one polarity into a new render target.
///
/// The caller owns the returned target.
pub(crate) async fn flood<E: Engine>(
    engine: &mut E,
    draw: &mut DrawCall,
    layout: &FieldLayout,
    seed: ImageProxy,
    polarity: Polarity,
) -> Result<TargetProxy> {
    let targets = propagate(engine, draw, layout, seed, polarity, false).await?;
    let mut recording = Recording::default();
    recording.free_target(targets.back());
    submit(engine, &recording, "jump_flood.finish", &targets)?;
    Ok(targets.front())
}

/// Computes the positive field and draws it to the surface as an unsigned preview.
pub(crate) async fn flood_to_surface<E: Engine>(
    engine: &mut E,
    draw: &mut DrawCall,
    layout: &FieldLayout,
    seed: ImageProxy,
) -> Result<()> {
    let targets = propagate(engine, draw, layout, seed, Polarity::Positive, true).await?;
    let mut recording = Recording::default();
    targets.free(&mut recording);
    engine.run_recording(&recording, "jump_flood.finish")
}

#[cfg(test)]
mod tests {
    use std::future::Future as _;
    use std::pin::pin;
    use std::task::{Context, Poll, Waker};

    use super::{PingPong, Polarity, flood, jump_count};
    use crate::draw::DrawCall;
    use crate::engine::{Engine, Program};
    use crate::low_level::Recording;
    use crate::{CpuEngine, SdfOptions};

    #[test]
    fn schedule_is_log2_of_spread() {
        for (spread, count) in [(1.0, 1), (2.0, 2), (3.0, 3), (8.0, 4), (9.0, 5), (100.0, 8)] {
            assert_eq!(jump_count(spread), count, "spread {spread}");
        }
    }

    #[test]
    fn ping_pong_alternates() {
        let mut recording = Recording::default();
        let mut targets = PingPong::new(&mut recording, 4, 4);
        let (a, b) = (targets.front(), targets.back());
        assert_ne!(a.id, b.id);
        targets.flip();
        assert_eq!(targets.front().id, b.id);
        assert_eq!(targets.back().id, a.id);
        targets.flip();
        assert_eq!(targets.front().id, a.id);
    }

    #[test]
    fn yields_once_per_step() {
        let mut engine = CpuEngine::new();
        let shader = pollster::block_on(engine.add_shader(Program::JumpFlood)).unwrap();
        let mut draw = DrawCall::new(shader, Program::JumpFlood.info());
        let options = SdfOptions {
            spread: 9.0,
            ..Default::default()
        };
        let layout = options.layout(6, 6).unwrap();
        let mut recording = Recording::default();
        let seed = recording.upload_image(6, 6, vec![255; 6 * 6 * 4]);
        engine.run_recording(&recording, "upload").unwrap();

        let mut cx = Context::from_waker(Waker::noop());
        let mut suspensions = 0;
        let target = {
            let mut pass = pin!(flood(
                &mut engine,
                &mut draw,
                &layout,
                seed,
                Polarity::Positive
            ));
            loop {
                match pass.as_mut().poll(&mut cx) {
                    Poll::Pending => suspensions += 1,
                    Poll::Ready(target) => break target.unwrap(),
                }
            }
        };
        assert_eq!(suspensions, jump_count(9.0));

        let stats = engine.stats();
        assert_eq!(stats.draws, 1 + u64::from(jump_count(9.0)));
        assert_eq!(stats.targets_allocated, 2);
        assert_eq!(stats.targets_released, 1);
        let field = pollster::block_on(engine.read_target(target)).unwrap();
        assert!(field.chunks_exact(4).all(|texel| texel[2] == 0.0));
    }
}
