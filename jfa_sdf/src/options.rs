// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::OptionsError;

/// Parameters of a single distance field computation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SdfOptions {
    /// Search radius in working pixels, that is source pixels scaled by
    /// `pixel_ratio`. Distances saturate at this value.
    pub spread: f32,
    /// Border added around the source on every side, in source pixels.
    pub padding: i32,
    /// Working resolution relative to the source.
    pub pixel_ratio: f32,
    /// Whether to also flood from the background and produce a signed field.
    pub signed: bool,
    /// Logical width the source is stretched to. Defaults to the image width.
    pub width: Option<u32>,
    /// Logical height the source is stretched to. Defaults to the image height.
    pub height: Option<u32>,
}

impl Default for SdfOptions {
    fn default() -> Self {
        Self {
            spread: 10.0,
            padding: 0,
            pixel_ratio: 1.0,
            signed: false,
            width: None,
            height: None,
        }
    }
}

/// Size of the render targets a computation works in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn resolution(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

/// Validated [`SdfOptions`] resolved against a source image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldLayout {
    /// Logical size of the source, after overrides.
    pub source_width: u32,
    pub source_height: u32,
    pub padding: u32,
    pub pixel_ratio: f32,
    pub spread: f32,
    pub signed: bool,
    pub viewport: Viewport,
}

impl SdfOptions {
    /// Validates the options for a source of the given size.
    ///
    /// Out of range values are rejected rather than clamped.
    pub fn layout(&self, image_width: u32, image_height: u32) -> Result<FieldLayout, OptionsError> {
        if !(self.spread.is_finite() && self.spread >= 1.0) {
            return Err(OptionsError::Spread(self.spread));
        }
        let padding = u32::try_from(self.padding).map_err(|_| OptionsError::Padding(self.padding))?;
        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
            return Err(OptionsError::PixelRatio(self.pixel_ratio));
        }
        let source_width = self.width.unwrap_or(image_width);
        let source_height = self.height.unwrap_or(image_height);
        if source_width == 0 || image_width == 0 {
            return Err(OptionsError::Width);
        }
        if source_height == 0 || image_height == 0 {
            return Err(OptionsError::Height);
        }
        let viewport = Viewport {
            width: scaled(u64::from(source_width) + 2 * u64::from(padding), self.pixel_ratio),
            height: scaled(u64::from(source_height) + 2 * u64::from(padding), self.pixel_ratio),
        };
        if viewport.width == 0 || viewport.height == 0 {
            return Err(OptionsError::EmptyViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        Ok(FieldLayout {
            source_width,
            source_height,
            padding,
            pixel_ratio: self.pixel_ratio,
            spread: self.spread,
            signed: self.signed,
            viewport,
        })
    }
}

/// `floor(len * ratio)`, saturating at `u32::MAX`.
fn scaled(len: u64, ratio: f32) -> u32 {
    (len as f64 * f64::from(ratio)).floor() as u32
}

impl FieldLayout {
    pub fn source_size(&self) -> [f32; 2] {
        [self.source_width as f32, self.source_height as f32]
    }

    /// Size of an outline composite: the source without padding, at the
    /// working pixel ratio.
    pub fn output_size(&self) -> Result<Viewport, OptionsError> {
        let output = Viewport {
            width: scaled(u64::from(self.source_width), self.pixel_ratio),
            height: scaled(u64::from(self.source_height), self.pixel_ratio),
        };
        if output.width == 0 || output.height == 0 {
            return Err(OptionsError::EmptyViewport {
                width: output.width,
                height: output.height,
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::{SdfOptions, Viewport};
    use crate::OptionsError;

    #[test]
    fn viewport_includes_padding_and_ratio() {
        let options = SdfOptions {
            padding: 3,
            pixel_ratio: 2.0,
            ..Default::default()
        };
        let layout = options.layout(10, 4).unwrap();
        assert_eq!(
            layout.viewport,
            Viewport {
                width: 32,
                height: 20
            }
        );
        assert_eq!(layout.output_size().unwrap().width, 20);
    }

    #[test]
    fn fractional_ratio_floors() {
        let options = SdfOptions {
            pixel_ratio: 0.5,
            ..Default::default()
        };
        let layout = options.layout(5, 5).unwrap();
        assert_eq!(layout.viewport.width, 2);
    }

    #[test]
    fn size_overrides() {
        let options = SdfOptions {
            width: Some(7),
            ..Default::default()
        };
        let layout = options.layout(3, 3).unwrap();
        assert_eq!(layout.source_size(), [7.0, 3.0]);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let check = |options: SdfOptions, expected: OptionsError| {
            assert_eq!(options.layout(4, 4), Err(expected));
        };
        let base = SdfOptions::default();
        check(
            SdfOptions {
                spread: 0.0,
                ..base
            },
            OptionsError::Spread(0.0),
        );
        check(
            SdfOptions {
                spread: f32::INFINITY,
                ..base
            },
            OptionsError::Spread(f32::INFINITY),
        );
        check(
            SdfOptions {
                padding: -1,
                ..base
            },
            OptionsError::Padding(-1),
        );
        check(
            SdfOptions {
                pixel_ratio: 0.0,
                ..base
            },
            OptionsError::PixelRatio(0.0),
        );
        check(
            SdfOptions {
                width: Some(0),
                ..base
            },
            OptionsError::Width,
        );
        check(
            SdfOptions {
                pixel_ratio: 0.1,
                ..base
            },
            OptionsError::EmptyViewport {
                width: 0,
                height: 0,
            },
        );
        assert_eq!(base.layout(4, 0), Err(OptionsError::Height));
    }
}
