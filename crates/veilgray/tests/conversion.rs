//! File-level conversion: both outputs appear only when every stage succeeded.

use std::fs;

use tempfile::TempDir;
use veilgray::image::{self, Image, Pixel};
use veilgray::mock::{Fault, FaultStage, MockEngine};
use veilgray::pipeline::{convert, CkksPipeline, ConversionPaths, Pipeline, PipelineConfig};
use veilgray::reference;
use veilgray::{LumaWeights, PipelineError};
use veilgray_he_core::ParameterProfile;

fn paths(dir: &TempDir) -> ConversionPaths {
    ConversionPaths {
        input: dir.path().join("in.bmp"),
        encrypted_output: dir.path().join("encrypted.bmp"),
        plaintext_output: dir.path().join("plain.bmp"),
    }
}

fn small_image() -> Image {
    Image::from_rows(vec![
        vec![Pixel::new(12, 200, 31), Pixel::new(250, 9, 77), Pixel::new(0, 128, 255)],
        vec![Pixel::new(64, 64, 64), Pixel::new(1, 2, 3), Pixel::new(90, 180, 45)],
    ])
    .unwrap()
}

fn assert_no_outputs(paths: &ConversionPaths) {
    assert!(!paths.encrypted_output.exists());
    assert!(!paths.plaintext_output.exists());
}

#[test]
fn converts_file_and_writes_both_outputs() {
    let dir = TempDir::new().unwrap();
    let paths = paths(&dir);
    let input = small_image();
    image::write(&paths.input, &input).unwrap();

    let pipeline = CkksPipeline::from_config(PipelineConfig {
        profile: ParameterProfile::InsecureN2048,
        key_seed: Some(7),
        ..PipelineConfig::default()
    })
    .unwrap();
    let report = convert(&pipeline, &paths).unwrap();
    assert_eq!((report.width, report.height), (3, 2));

    let encrypted = image::read(&paths.encrypted_output).unwrap();
    let plain = image::read(&paths.plaintext_output).unwrap();
    assert_eq!(plain, reference::grayscale(&input, &LumaWeights::BT601));
    assert_eq!(encrypted.header, input.header);
    for (a, b) in encrypted.rows.iter().flatten().zip(plain.rows.iter().flatten()) {
        assert_eq!(a.b, a.g);
        assert_eq!(a.g, a.r);
        assert!(a.g.abs_diff(b.g) <= 1);
    }
}

#[test]
fn header_length_mismatch_is_malformed_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let paths = paths(&dir);
    let mut bytes = image::encode(&small_image()).unwrap();
    bytes.truncate(bytes.len() - 3);
    fs::write(&paths.input, &bytes).unwrap();

    let pipeline =
        Pipeline::with_engine(MockEngine::new(64), PipelineConfig::default()).unwrap();
    let err = convert(&pipeline, &paths).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedImage(_)));
    assert_eq!(err.stage(), "input");
    assert_no_outputs(&paths);
}

#[test]
fn missing_input_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let paths = paths(&dir);
    let pipeline =
        Pipeline::with_engine(MockEngine::new(64), PipelineConfig::default()).unwrap();
    let err = convert(&pipeline, &paths).unwrap_err();
    match err {
        PipelineError::Io { path, .. } => assert_eq!(path, paths.input),
        other => panic!("unexpected error: {other}"),
    }
    assert_no_outputs(&paths);
}

#[test]
fn failing_unit_aborts_before_any_output() {
    let dir = TempDir::new().unwrap();
    let paths = paths(&dir);
    image::write(&paths.input, &small_image()).unwrap();

    // Every channel of row 1 starts with 64.
    for (stage, name) in [
        (FaultStage::Encrypt, "encryption"),
        (FaultStage::ScalarMultiply, "evaluation"),
    ] {
        let engine = MockEngine::new(64).with_fault(Fault {
            stage,
            first_slot: 64.0,
        });
        let pipeline = Pipeline::with_engine(engine, PipelineConfig::default()).unwrap();
        let err = convert(&pipeline, &paths).unwrap_err();
        assert_eq!(err.stage(), name, "{err}");
        assert_no_outputs(&paths);
    }
}
