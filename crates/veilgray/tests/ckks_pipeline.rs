//! End-to-end runs against the real CKKS engine with the small insecure parameter set.

use veilgray::image::{Image, Pixel};
use veilgray::layout::packed_len;
use veilgray::pipeline::{CkksPipeline, EncryptionMode, PipelineConfig};
use veilgray::reference;
use veilgray::{LumaWeights, PipelineError};
use veilgray_he_core::ParameterProfile;

fn config(threads: Option<usize>, encryption: EncryptionMode) -> PipelineConfig {
    PipelineConfig {
        profile: ParameterProfile::InsecureN2048,
        threads,
        key_seed: Some(42),
        encryption,
        weights: LumaWeights::BT601,
    }
}

fn gradient(width: usize, height: usize) -> Image {
    Image::from_rows(
        (0..height)
            .map(|r| {
                (0..width)
                    .map(|c| {
                        Pixel::new(
                            (r * 37 + c * 11) as u8,
                            (r * 5 + c * 53) as u8,
                            (255 - r * 19 - c * 7) as u8,
                        )
                    })
                    .collect()
            })
            .collect(),
    )
    .unwrap()
}

#[test]
fn two_by_two_matches_hand_computed_luma() {
    let image = Image::from_rows(vec![
        vec![Pixel::new(255, 0, 0), Pixel::new(0, 255, 0)],
        vec![Pixel::new(0, 0, 255), Pixel::new(100, 150, 200)],
    ])
    .unwrap();
    let pipeline = CkksPipeline::from_config(config(None, EncryptionMode::SecretKey)).unwrap();
    let out = pipeline.run(&image).unwrap();

    assert_eq!(out.grid_shape, (3, 2));
    let expected = [[29.07, 149.685], [76.245, 159.25]];
    for (row, values) in out.decoded_rows.iter().enumerate() {
        assert_eq!(values.len(), packed_len(2));
        for (j, want) in expected[row].iter().enumerate() {
            for k in 0..3 {
                let got = values[3 * j + k];
                assert!((got - want).abs() < 1e-2, "row {row} pixel {j}: {got} vs {want}");
            }
        }
    }
    assert_eq!(
        out.image.rows,
        vec![
            vec![Pixel::gray(29), Pixel::gray(150)],
            vec![Pixel::gray(76), Pixel::gray(159)],
        ]
    );
}

#[test]
fn encrypted_result_tracks_plaintext_luma() {
    let image = gradient(7, 5);
    for mode in [EncryptionMode::SecretKey, EncryptionMode::PublicKey] {
        let pipeline = CkksPipeline::from_config(config(Some(2), mode)).unwrap();
        let out = pipeline.run(&image).unwrap();
        let plain = reference::grayscale(&image, &LumaWeights::BT601);

        assert_eq!(out.image.header, image.header);
        for (r, row) in image.rows.iter().enumerate() {
            for (j, px) in row.iter().enumerate() {
                let want = reference::luma(px, &LumaWeights::BT601);
                for k in 0..3 {
                    let got = out.decoded_rows[r][3 * j + k];
                    assert!((got - want).abs() < 1e-3, "{mode:?} ({r}, {j}): {got} vs {want}");
                }
                let (a, b) = (out.image.rows[r][j].g, plain.rows[r][j].g);
                assert!(a.abs_diff(b) <= 1);
            }
        }
    }
}

#[test]
fn thread_count_does_not_change_results() {
    let image = gradient(4, 6);
    let single = CkksPipeline::from_config(config(Some(1), EncryptionMode::SecretKey))
        .unwrap()
        .run(&image)
        .unwrap();
    let many = CkksPipeline::from_config(config(Some(4), EncryptionMode::SecretKey))
        .unwrap()
        .run(&image)
        .unwrap();

    assert_eq!(single.grid_shape, many.grid_shape);
    assert_eq!(single.decoded_rows.len(), many.decoded_rows.len());
    for (a, b) in single.decoded_rows.iter().zip(&many.decoded_rows) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-3);
        }
    }
}

#[test]
fn row_wider_than_slot_count_is_rejected() {
    // 342 pixels need 1026 slots; the insecure set has 1024.
    let image = Image::from_rows(vec![vec![Pixel::gray(1); 342]]).unwrap();
    let pipeline = CkksPipeline::from_config(config(None, EncryptionMode::SecretKey)).unwrap();
    let err = pipeline.run(&image).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::SlotCapacity {
            required: 1026,
            available: 1024
        }
    ));
}
