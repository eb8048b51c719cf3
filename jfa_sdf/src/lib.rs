// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! jfa_sdf computes distance fields from image masks with the Jump Flooding
//! Algorithm, running every step as a full-screen fragment pass.
//!
//! A pixel of the source whose alpha is above one half is a foreground pixel.
//! The unsigned field holds, for every pixel of the working viewport, the
//! distance to the nearest foreground pixel. The signed field additionally
//! runs the flood from the background and merges both, so that the interior of
//! the shape reads negative.
//!
//! The field can then be composited into an outline and drop shadow with the
//! [`OutlineCompositor`].
//!
//! ## Engines
//!
//! All GPU work is expressed as [`Recording`](low_level::Recording)s, which an
//! [`Engine`] executes. [`WgpuEngine`] runs them on a [`wgpu::Device`], and
//! [`CpuEngine`] runs CPU ports of the same shaders, which is handy for tests.
//!
//! ```
//! use jfa_sdf::image::{Rgba, RgbaImage};
//! use jfa_sdf::{CpuEngine, SdfGenerator, SdfOptions};
//!
//! let mut image = RgbaImage::new(8, 8);
//! image.put_pixel(3, 3, Rgba([255, 255, 255, 255]));
//!
//! let mut generator = SdfGenerator::new(CpuEngine::new());
//! let options = SdfOptions {
//!     spread: 4.0,
//!     ..Default::default()
//! };
//! let field = pollster::block_on(generator.compute_field(&image, &options)).unwrap();
//! assert_eq!(field.distance(3, 3), 0.0);
//! assert_eq!(field.distance(5, 3), 2.0);
//! ```
//!
//! On the GPU, a device is usually obtained through [`util::RenderContext`],
//! and futures are driven with [`util::block_on_wgpu`] or any executor that
//! polls the device.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
// The following lints are part of the Linebender standard set,
// but resolving them has been deferred for now.
// Feel free to send a PR that solves one or more of these.
#![allow(missing_docs, reason = "We have many as-yet undocumented items.")]
#![allow(
    missing_debug_implementations,
    unreachable_pub,
    clippy::cast_possible_truncation,
    clippy::missing_assert_message,
    reason = "Deferred"
)]

mod cpu_engine;
mod draw;
mod engine;
mod field;
mod generator;
mod jump_flood;
mod merge;
mod options;
mod outline;
mod recording;

#[cfg(feature = "wgpu")]
pub mod util;
#[cfg(feature = "wgpu")]
mod wgpu_engine;

pub mod low_level {
    //! Building blocks of the passes, for callers that want to drive an
    //! [`Engine`](crate::Engine) directly.

    pub use crate::draw::{DrawCall, ParamValue};
    pub use crate::jump_flood::{Polarity, jump_count};
    pub use crate::recording::{
        BufferProxy, Command, DrawParams, DrawTarget, ImageProxy, Recording, ResourceId,
        ResourceProxy, ShaderId, TargetProxy,
    };
}

pub use cpu_engine::CpuEngine;
pub use engine::{Engine, EngineStats, Program};
pub use field::{DistanceField, PreviewImage};
pub use generator::{GeneratorState, SdfGenerator};
pub use options::{FieldLayout, SdfOptions, Viewport};
pub use outline::{OutlineCompositor, OutlineStyle};
#[cfg(feature = "wgpu")]
pub use wgpu_engine::WgpuEngine;

pub use image;
#[cfg(feature = "wgpu")]
pub use wgpu;

use thiserror::Error;

/// Errors that can occur in jfa_sdf.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// An option was out of range. Nothing was allocated.
    #[error("invalid options: {0}")]
    InvalidOptions(#[from] OptionsError),
    /// The device refused a texture of this size.
    #[error("couldn't allocate a {width}x{height} texture, the limit is {max}")]
    Allocation { width: u32, height: u32, max: u32 },
    /// The generator or compositor was used after being torn down.
    #[error("used after dispose")]
    Disposed,
    /// [`OutlineCompositor::redraw`] was called before any render.
    #[error("nothing has been rendered yet")]
    NotRendered,
    /// The field handed to the compositor doesn't match the options.
    #[error("field is {actual:?} but the options describe a {expected:?} viewport")]
    FieldSizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// A shader failed to compile or link.
    #[error("failed to compile shader `{name}`: {message}")]
    ShaderCompilation { name: &'static str, message: String },
    /// Used a resource inside a recording while it was not available.
    /// Check if you have created it and not freed before its last usage.
    #[error("{0} is not available but used for {1}")]
    UnavailableResource(&'static str, &'static str),
    /// There is no available device with the features required.
    #[cfg(feature = "wgpu")]
    #[error("Couldn't find suitable device")]
    NoCompatibleDevice,
    /// Failed to async map a buffer.
    /// See [`wgpu::BufferAsyncError`] for more information.
    #[cfg(feature = "wgpu")]
    #[error("Failed to async map a buffer")]
    BufferAsyncError(#[from] wgpu::BufferAsyncError),
    /// Polling the device for a read-back failed.
    #[cfg(feature = "wgpu")]
    #[error("Failed to poll the device")]
    PollError(#[from] wgpu::PollError),
    /// The read-back callback was dropped without reporting.
    #[cfg(feature = "wgpu")]
    #[error("read-back channel was closed")]
    DownloadChannelClosed,
    #[error("Failed to encode PNG")]
    PngEncoding(#[from] png::EncodingError),
}

/// Out of range values in [`SdfOptions`].
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum OptionsError {
    #[error("spread must be a finite number of at least 1, got {0}")]
    Spread(f32),
    #[error("padding must not be negative, got {0}")]
    Padding(i32),
    #[error("pixel ratio must be finite and positive, got {0}")]
    PixelRatio(f32),
    #[error("width must be positive")]
    Width,
    #[error("height must be positive")]
    Height,
    #[error("the working viewport would be {width}x{height}")]
    EmptyViewport { width: u32, height: u32 },
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

static_assertions::assert_impl_all!(SdfGenerator<CpuEngine>: Send);
static_assertions::assert_impl_all!(OutlineCompositor<CpuEngine>: Send);
