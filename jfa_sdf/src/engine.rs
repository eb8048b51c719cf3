// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use jfa_sdf_shaders::cpu::{self, CpuFragmentShader};
use jfa_sdf_shaders::{SHADERS, ShaderInfo};

use crate::Result;
use crate::recording::{Recording, ShaderId, TargetProxy};

/// The programs an [`Engine`] can be asked to compile.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Program {
    JumpFlood,
    Merge,
    Outline,
}

impl Program {
    pub fn info(self) -> &'static ShaderInfo {
        match self {
            Self::JumpFlood => &SHADERS.jump_flood,
            Self::Merge => &SHADERS.merge,
            Self::Outline => &SHADERS.outline,
        }
    }

    /// The CPU port of the program's fragment stage.
    pub fn cpu(self) -> CpuFragmentShader {
        match self {
            Self::JumpFlood => cpu::jump_flood,
            Self::Merge => cpu::merge,
            Self::Outline => cpu::outline,
        }
    }
}

/// Executes [`Recording`]s.
///
/// Every engine owns an 8-bit RGBA presentation surface, which
/// [`DrawTarget::Surface`](crate::low_level::DrawTarget::Surface) draws to.
#[allow(
    async_fn_in_trait,
    reason = "Engines are driven from a single thread, so Send futures aren't needed"
)]
pub trait Engine {
    /// Compiles a program against the full-screen quad.
    async fn add_shader(&mut self, program: Program) -> Result<ShaderId>;

    /// Executes the commands of `recording` in order.
    fn run_recording(&mut self, recording: &Recording, label: &'static str) -> Result<()>;

    /// Reads back a render target as four floats per texel, row-major.
    async fn read_target(&mut self, target: TargetProxy) -> Result<Vec<f32>>;

    /// Reads back the surface as RGBA8, row-major.
    async fn read_surface(&mut self) -> Result<Vec<u8>>;

    /// Reallocates the surface if its size differs.
    fn resize_surface(&mut self, width: u32, height: u32) -> Result<()>;

    fn surface_size(&self) -> (u32, u32);

    fn stats(&self) -> EngineStats;
}

/// Counters of the work an engine has done since it was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub targets_allocated: u64,
    pub targets_released: u64,
    /// Source images and fields.
    pub textures_uploaded: u64,
    /// Source images released.
    pub textures_released: u64,
    pub buffers_allocated: u64,
    pub draws: u64,
    pub surface_resizes: u64,
}

impl EngineStats {
    /// Textures, other than the surface, that are still alive.
    pub fn live_textures(&self) -> u64 {
        (self.targets_allocated + self.textures_uploaded)
            .saturating_sub(self.targets_released + self.textures_released)
    }
}

/// Returns a future which completes on its second poll.
///
/// Awaiting it hands control back to the executor once.
pub(crate) fn next_tick() -> NextTick {
    NextTick { yielded: false }
}

pub(crate) struct NextTick {
    yielded: bool,
}

impl Future for NextTick {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future as _;
    use std::pin::pin;
    use std::task::{Context, Poll, Waker};

    use super::{EngineStats, Program, next_tick};

    #[test]
    fn next_tick_yields_once() {
        let mut cx = Context::from_waker(Waker::noop());
        let mut tick = pin!(next_tick());
        assert_eq!(tick.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(tick.as_mut().poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn programs_map_to_their_shaders() {
        assert_eq!(Program::JumpFlood.info().name, "jump_flood");
        assert_eq!(Program::Merge.info().name, "merge");
        assert_eq!(Program::Outline.info().name, "outline");
    }

    #[test]
    fn live_textures_balance() {
        let stats = EngineStats {
            targets_allocated: 3,
            textures_uploaded: 2,
            targets_released: 3,
            textures_released: 1,
            ..Default::default()
        };
        assert_eq!(stats.live_textures(), 1);
    }
}
