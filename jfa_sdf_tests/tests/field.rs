// Copyright 2025 the jfa_sdf Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Distance fields computed on the CPU engine.

use jfa_sdf::low_level::jump_count;
use jfa_sdf::{CpuEngine, Engine, EngineStats, Error, OptionsError, SdfGenerator, SdfOptions};
use jfa_sdf_tests::{centered_square, cpu_field, cpu_preview, decode_png, dot};

#[test]
fn field_covers_the_padded_scaled_viewport() {
    let options = SdfOptions {
        padding: 2,
        pixel_ratio: 1.5,
        ..Default::default()
    };
    let (field, _) = cpu_field(&dot(5, 3, 2, 1), &options).unwrap();
    assert_eq!((field.width, field.height), (13, 10));
    assert_eq!(field.data.len(), 13 * 10 * 4);
}

#[test]
fn size_overrides_stretch_the_source() {
    let options = SdfOptions {
        width: Some(4),
        height: Some(6),
        ..Default::default()
    };
    let (field, _) = cpu_field(&dot(2, 2, 0, 0), &options).unwrap();
    assert_eq!((field.width, field.height), (4, 6));
    // The top left source pixel covers 2x3 output pixels.
    for y in 0..3 {
        for x in 0..2 {
            assert_eq!(field.distance(x, y), 0.0, "({x}, {y})");
        }
    }
    assert!(field.distance(2, 0) > 0.0);
    assert!(field.distance(0, 3) > 0.0);
}

#[test]
fn one_seed_draw_then_log2_spread_jumps() {
    for spread in [1.0, 2.0, 3.0, 8.0, 9.0, 100.0] {
        let options = SdfOptions {
            spread,
            ..Default::default()
        };
        let (_, stats) = cpu_field(&dot(8, 8, 3, 3), &options).unwrap();
        let jumps = u64::from(spread.log2().ceil() as u32 + 1);
        assert_eq!(u64::from(jump_count(spread)), jumps);
        assert_eq!(stats.draws, 1 + jumps, "spread {spread}");

        let signed = SdfOptions {
            signed: true,
            ..options
        };
        let (_, stats) = cpu_field(&dot(8, 8, 3, 3), &signed).unwrap();
        assert_eq!(stats.draws, 2 * (1 + jumps) + 1, "signed spread {spread}");
    }
}

#[test]
fn identical_runs_give_identical_fields() {
    let image = centered_square(12, 4);
    let options = SdfOptions {
        signed: true,
        padding: 1,
        ..Default::default()
    };
    let mut generator = SdfGenerator::new(CpuEngine::new());
    let first = pollster::block_on(generator.compute_field(&image, &options)).unwrap();
    let second = pollster::block_on(generator.compute_field(&image, &options)).unwrap();
    assert_eq!(first, second);
    assert_eq!(generator.engine().unwrap().stats().live_textures(), 0);
}

#[test]
fn spread_is_measured_in_working_pixels() {
    let options = SdfOptions {
        spread: 3.0,
        pixel_ratio: 2.0,
        ..Default::default()
    };
    let (field, _) = cpu_field(&dot(8, 8, 0, 0), &options).unwrap();
    assert_eq!((field.width, field.height), (16, 16));
    // The seed covers working pixels 0..2, so x = 3 is two working pixels away
    // and x = 5 is four, past the spread even though it is two source pixels.
    assert_eq!(field.distance(3, 0), 2.0);
    assert_eq!(field.distance(5, 0), 3.0);
    assert_eq!(field.distance(15, 15), 3.0);
    assert!(field.distances().all(|d| d <= 3.0));
}

#[test]
fn unsigned_distances_are_never_negative() {
    let options = SdfOptions {
        spread: 6.0,
        padding: 3,
        ..Default::default()
    };
    let (field, _) = cpu_field(&centered_square(10, 4), &options).unwrap();
    assert!(field.distances().all(|d| d >= 0.0));
    assert!(field.distances().all(|d| d <= 6.0));
}

#[test]
fn signed_field_flips_at_the_square_edge() {
    let options = SdfOptions {
        signed: true,
        ..Default::default()
    };
    let (field, _) = cpu_field(&centered_square(12, 6), &options).unwrap();
    let inside = 3..9;
    for y in 0..12 {
        for x in 0..12 {
            let interior = inside.contains(&x) && inside.contains(&y);
            assert_eq!(field.is_interior(x, y), interior, "({x}, {y})");
            if !interior {
                assert!(field.distance(x, y) > 0.0, "({x}, {y})");
            }
        }
    }
    // Neighbours across the edge sit one pixel from the other side.
    assert_eq!(field.distance(2, 5), 1.0);
    assert_eq!(field.distance(3, 5), -1.0);
    // The middle is furthest from the background.
    assert_eq!(field.distance(5, 5), -3.0);
}

#[test]
fn single_pixel_field_grows_with_distance() {
    let options = SdfOptions {
        spread: 4.0,
        padding: 0,
        pixel_ratio: 1.0,
        signed: false,
        ..Default::default()
    };
    let (field, _) = cpu_field(&dot(4, 4, 1, 1), &options).unwrap();
    assert_eq!((field.width, field.height), (4, 4));
    assert_eq!(field.distance(1, 1), 0.0);

    let mut samples = Vec::new();
    for y in 0..4 {
        for x in 0..4 {
            let euclidean = ((x as f32 - 1.0).powi(2) + (y as f32 - 1.0).powi(2)).sqrt();
            let distance = field.distance(x, y);
            assert!((distance - euclidean).abs() < 1e-5, "({x}, {y})");
            samples.push((euclidean, distance));
        }
    }
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));
    for pair in samples.windows(2) {
        assert!(pair[0].1 <= pair[1].1, "{pair:?}");
    }
}

#[test]
fn invalid_options_allocate_nothing() {
    let cases = [
        (
            SdfOptions {
                spread: 0.0,
                ..Default::default()
            },
            OptionsError::Spread(0.0),
        ),
        (
            SdfOptions {
                padding: -1,
                ..Default::default()
            },
            OptionsError::Padding(-1),
        ),
        (
            SdfOptions {
                pixel_ratio: 0.0,
                ..Default::default()
            },
            OptionsError::PixelRatio(0.0),
        ),
        (
            SdfOptions {
                width: Some(0),
                ..Default::default()
            },
            OptionsError::Width,
        ),
    ];
    for (options, expected) in cases {
        let mut generator = SdfGenerator::new(CpuEngine::new());
        let result = pollster::block_on(generator.compute_field(&dot(4, 4, 1, 1), &options));
        match result {
            Err(Error::InvalidOptions(err)) => assert_eq!(err, expected),
            other => panic!("expected {expected:?}, got {other:?}"),
        }
        assert_eq!(generator.engine().unwrap().stats(), EngineStats::default());
    }
}

#[test]
fn oversized_viewports_fail_to_allocate() {
    let mut generator = SdfGenerator::new(CpuEngine::with_max_target_size(16));
    let options = SdfOptions {
        padding: 8,
        ..Default::default()
    };
    let result = pollster::block_on(generator.compute_field(&dot(4, 4, 1, 1), &options));
    assert!(matches!(
        result,
        Err(Error::Allocation {
            width: 20,
            height: 20,
            max: 16
        })
    ));
    assert_eq!(generator.engine().unwrap().stats().live_textures(), 0);
}

#[test]
fn unsigned_preview_darkens_towards_the_seed() {
    let options = SdfOptions {
        spread: 4.0,
        ..Default::default()
    };
    let preview = cpu_preview(&dot(4, 4, 1, 1), &options).unwrap();
    let (width, height, pixels) = decode_png(&preview.encode_png().unwrap()).unwrap();
    assert_eq!((width, height), (4, 4));
    assert_eq!(pixels, preview.data);
    assert_eq!(preview.pixel(1, 1), [0, 0, 0, 255]);
    assert!(preview.pixel(2, 1)[0] < preview.pixel(3, 1)[0]);
    assert!(preview.pixel(2, 2)[0] < preview.pixel(3, 3)[0]);
}

#[test]
fn signed_preview_is_mid_grey_at_the_edge() {
    let options = SdfOptions {
        signed: true,
        spread: 4.0,
        ..Default::default()
    };
    let preview = cpu_preview(&centered_square(12, 6), &options).unwrap();
    assert!(preview.pixel(5, 5)[0] < 128);
    assert!(preview.pixel(0, 0)[0] > 128);
    // One pixel either side of the edge.
    assert_eq!(preview.pixel(2, 5)[0], 159);
    assert_eq!(preview.pixel(3, 5)[0], 96);
}
