// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use image::RgbaImage;

use crate::Result;

/// A distance field read back from the GPU.
///
/// Texels are stored row-major, four floats each: the position of the
/// nearest seed in viewport pixels, the distance to it, and a flag. In an
/// unsigned field the flag marks texels that found a seed. In a signed field
/// it marks the interior, where the distance is negative.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceField {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl DistanceField {
    /// # Panics
    ///
    /// If `(x, y)` is out of bounds.
    pub fn sample(&self, x: u32, y: u32) -> [f32; 4] {
        assert!(
            x < self.width && y < self.height,
            "({x}, {y}) is outside a {}x{} field",
            self.width,
            self.height
        );
        let index = (y as usize * self.width as usize + x as usize) * 4;
        let mut texel = [0.0; 4];
        texel.copy_from_slice(&self.data[index..index + 4]);
        texel
    }

    pub fn distance(&self, x: u32, y: u32) -> f32 {
        self.sample(x, y)[2]
    }

    pub fn is_interior(&self, x: u32, y: u32) -> bool {
        self.distance(x, y) < 0.0
    }

    /// Distances of all texels, row by row.
    pub fn distances(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.chunks_exact(4).map(|texel| texel[2])
    }
}

/// An 8-bit RGBA image read back from an engine's surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PreviewImage {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let index = (y as usize * self.width as usize + x as usize) * 4;
        let mut pixel = [0; 4];
        pixel.copy_from_slice(&self.data[index..index + 4]);
        pixel
    }

    /// Encodes the image as an 8-bit RGBA PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut encoder = png::Encoder::new(&mut data, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.data)?;
        writer.finish()?;
        Ok(data)
    }

    pub fn into_rgba_image(self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::{DistanceField, PreviewImage};

    #[test]
    fn samples_are_row_major() {
        let field = DistanceField {
            width: 2,
            height: 2,
            data: (0..16).map(|v| v as f32).collect(),
        };
        assert_eq!(field.sample(1, 0), [4.0, 5.0, 6.0, 7.0]);
        assert_eq!(field.distance(0, 1), 10.0);
        assert_eq!(field.distances().collect::<Vec<_>>(), [2.0, 6.0, 10.0, 14.0]);
        assert!(!field.is_interior(1, 1));
    }

    #[test]
    fn png_round_trips_through_the_decoder() {
        let image = PreviewImage {
            width: 2,
            height: 1,
            data: vec![255, 0, 0, 255, 0, 0, 255, 128],
        };
        let encoded = image.encode_png().unwrap();
        let decoder = png::Decoder::new(encoded.as_slice());
        let mut reader = decoder.read_info().unwrap();
        let mut decoded = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut decoded).unwrap();
        assert_eq!((info.width, info.height), (2, 1));
        assert_eq!(decoded, image.data);
        assert_eq!(image.pixel(1, 0), [0, 0, 255, 128]);
    }
}
