// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::Result;
use crate::draw::DrawCall;
use crate::engine::Engine;
use crate::options::FieldLayout;
use crate::recording::{DrawTarget, Recording, TargetProxy};

/// Records the merge of two polarity fields into `target`, consuming both.
fn record(
    recording: &mut Recording,
    draw: &mut DrawCall,
    layout: &FieldLayout,
    positive: TargetProxy,
    negative: TargetProxy,
    target: DrawTarget,
) {
    draw.set("resolution", layout.viewport.resolution())
        .set("spread", layout.spread)
        .set("unsigned_format", matches!(target, DrawTarget::Surface))
        .set("tex_positive", positive)
        .set("tex_negative", negative);
    draw.draw(recording, target);
    recording.free_target(positive);
    recording.free_target(negative);
}

fn submit<E: Engine>(
    engine: &mut E,
    recording: &Recording,
    leftovers: &[TargetProxy],
) -> Result<()> {
    engine.run_recording(recording, "merge").inspect_err(|_| {
        let mut release = Recording::default();
        for target in leftovers {
            release.free_target(*target);
        }
        if let Err(err) = engine.run_recording(&release, "merge.release") {
            log::warn!("failed to release merge targets: {err}");
        }
    })
}

/// Combines the positive and negative fields into a new signed field.
///
/// Both inputs are released; the caller owns the returned target.
pub(crate) fn merge<E: Engine>(
    engine: &mut E,
    draw: &mut DrawCall,
    layout: &FieldLayout,
    positive: TargetProxy,
    negative: TargetProxy,
) -> Result<TargetProxy> {
    let mut recording = Recording::default();
    let viewport = layout.viewport;
    let merged = recording.alloc_target(viewport.width, viewport.height);
    record(
        &mut recording,
        draw,
        layout,
        positive,
        negative,
        DrawTarget::Target(merged),
    );
    submit(engine, &recording, &[positive, negative, merged])?;
    Ok(merged)
}

/// Draws the signed field to the surface, remapped so that the edge reads as
/// mid grey.
pub(crate) fn merge_to_surface<E: Engine>(
    engine: &mut E,
    draw: &mut DrawCall,
    layout: &FieldLayout,
    positive: TargetProxy,
    negative: TargetProxy,
) -> Result<()> {
    let mut recording = Recording::default();
    record(
        &mut recording,
        draw,
        layout,
        positive,
        negative,
        DrawTarget::Surface,
    );
    submit(engine, &recording, &[positive, negative])
}

#[cfg(test)]
mod tests {
    use super::merge;
    use crate::draw::DrawCall;
    use crate::engine::{Engine, Program};
    use crate::low_level::Recording;
    use crate::{CpuEngine, SdfOptions};

    #[test]
    fn interior_is_negative() {
        let mut engine = CpuEngine::new();
        let shader = pollster::block_on(engine.add_shader(Program::Merge)).unwrap();
        let mut draw = DrawCall::new(shader, Program::Merge.info());
        let layout = SdfOptions::default().layout(2, 1).unwrap();
        let mut recording = Recording::default();
        // Left texel outside the shape, right texel inside.
        let positive = recording.upload_field(2, 1, [0.0, 0.0, 2.0, 1.0, 1.5, 0.5, 0.0, 1.0]);
        let negative = recording.upload_field(2, 1, [0.5, 0.5, 0.0, 1.0, 0.5, 0.5, 1.0, 1.0]);
        engine.run_recording(&recording, "upload").unwrap();

        let merged = merge(&mut engine, &mut draw, &layout, positive, negative).unwrap();
        let field = pollster::block_on(engine.read_target(merged)).unwrap();
        assert_eq!(field[2], 2.0);
        assert_eq!(field[3], 0.0);
        assert_eq!(field[6], -1.0);
        assert_eq!(field[7], 1.0);
        assert_eq!(engine.stats().live_textures(), 1);
    }
}
