use std::sync::{Arc, Mutex};

use ndarray::{Array2, Array3, ArrayView3, Axis};

use crate::memory_correction::calibration::{CalibrationModel, CropAlignment};
use crate::memory_correction::common::error::{CorrectionError, ErrorKind, Result};
use crate::memory_correction::config::CorrectionConfig;
use crate::memory_correction::correction::{CorrectionStrategy, MemoryCorrector};
use crate::memory_correction::roi::Roi;
use super::{CorrectionPipeline, correct};

struct MockCorrector {
    should_fail: bool,
    seen: Arc<Mutex<Vec<Array3<f32>>>>,
}

impl MockCorrector {
    fn new(should_fail: bool) -> (Self, Arc<Mutex<Vec<Array3<f32>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                should_fail,
                seen: seen.clone(),
            },
            seen,
        )
    }
}

impl MemoryCorrector for MockCorrector {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn correct(
        &self,
        volume: ArrayView3<'_, f32>,
        _calibration: &CalibrationModel,
        _dampening: f32,
    ) -> Result<Array3<f32>> {
        if self.should_fail {
            return Err(CorrectionError::CudaError("Mock device error".to_string()));
        }
        self.seen.lock().unwrap().push(volume.to_owned());
        Ok(volume.to_owned())
    }
}

/// Calibration over a 10x8 sensor (cols 1..=10, rows 1..=8).
fn calibration() -> CalibrationModel {
    let roi = Roi::new(1, 1, 10, 8);
    let (h, w) = roi.shape();
    CalibrationModel::from_maps(
        Array2::from_elem((h, w), 2.0),
        Array2::from_elem((h, w), 0.01),
        Array2::from_elem((h, w), 100.0),
        roi,
        CropAlignment::default(),
    )
    .unwrap()
}

/// Centred horizontally so the vertical shift is zero: 6 wide, 4 tall.
fn data_roi() -> Roi {
    Roi::new(3, 2, 8, 5)
}

fn channel_stacks(channels: usize, planes: usize) -> Vec<Array3<u16>> {
    (0..channels)
        .map(|c| {
            Array3::from_shape_fn((planes, 4, 6), |(p, y, x)| {
                (300 + c * 50 + ((p * 13 + y * 7 + x * 3) % 17) * 10) as u16
            })
        })
        .collect()
}

#[test]
fn test_corrector_sees_acquisition_order() {
    let (mock, seen) = MockCorrector::new(false);
    let config = CorrectionConfig::builder().repair_pixels(false).build();
    let pipeline = CorrectionPipeline::with_corrector(Box::new(mock), config).unwrap();

    let stacks = channel_stacks(3, 4);
    let out = pipeline.correct(&stacks, &calibration(), &data_roi()).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].dim(), (12, 4, 6));
    for q in 0..4 {
        for c in 0..3 {
            let expected = stacks[c].index_axis(Axis(0), q).mapv(|v| v as f32);
            assert_eq!(seen[0].index_axis(Axis(0), c + q * 3), expected);
        }
    }
    // Identity corrector and no repair: the stacks come back unchanged.
    assert_eq!(out, stacks);
}

#[test]
fn test_corrector_failure_propagates() {
    let (mock, _) = MockCorrector::new(true);
    let pipeline = CorrectionPipeline::with_corrector(Box::new(mock), CorrectionConfig::default()).unwrap();

    let err = pipeline
        .correct(&channel_stacks(2, 3), &calibration(), &data_roi())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Device);
}

#[test]
fn test_output_matches_input_shape_and_dtype() {
    let pipeline = CorrectionPipeline::new(CorrectionConfig::default()).unwrap();
    let stacks = channel_stacks(2, 5);
    let out: Vec<Array3<u16>> = pipeline.correct(&stacks, &calibration(), &data_roi()).unwrap();
    assert_eq!(out.len(), 2);
    for (o, i) in out.iter().zip(&stacks) {
        assert_eq!(o.dim(), i.dim());
    }
}

#[test]
fn test_float_stacks_non_negative() {
    let pipeline = CorrectionPipeline::new(
        CorrectionConfig::builder().dampening(3.0).build(),
    )
    .unwrap();
    let stacks: Vec<Array3<f32>> = channel_stacks(2, 6)
        .into_iter()
        .map(|s| s.mapv(|v| v as f32 * 0.3))
        .collect();
    let out = pipeline.correct(&stacks, &calibration(), &data_roi()).unwrap();
    assert!(out.iter().flat_map(|s| s.iter()).all(|&v| v >= 0.0));
}

#[test]
fn test_strategies_agree_through_pipeline() {
    let stacks: Vec<Array3<f32>> = channel_stacks(2, 6)
        .into_iter()
        .map(|s| s.mapv(|v| v as f32))
        .collect();
    let run = |strategy| {
        let config = CorrectionConfig::builder()
            .strategy(strategy)
            .repair_pixels(false)
            .build();
        CorrectionPipeline::new(config)
            .unwrap()
            .correct(&stacks, &calibration(), &data_roi())
            .unwrap()
    };

    let reference = run(CorrectionStrategy::Scalar);
    for strategy in [CorrectionStrategy::Vectorized, CorrectionStrategy::Device] {
        let out = run(strategy);
        for (a, b) in out.iter().flat_map(|s| s.iter()).zip(reference.iter().flat_map(|s| s.iter())) {
            assert!((a - b).abs() <= 1e-3 * b.abs().max(1.0), "{strategy}: {a} vs {b}");
        }
    }
}

#[test]
fn test_report_present_only_with_repair() {
    let stacks = channel_stacks(2, 5);

    let with = CorrectionPipeline::new(CorrectionConfig::default()).unwrap();
    let output = with.correct_with_report(&stacks, &calibration(), &data_roi()).unwrap();
    let report = output.repair.expect("repair enabled by default");
    assert_eq!(report.defects.dim(), (4, 6));
    assert!(output.timings.get_step("pixel_repair").is_some());
    assert!(output.timings.get_step("memory_correction").is_some());

    let without = CorrectionPipeline::new(CorrectionConfig::builder().repair_pixels(false).build()).unwrap();
    let output = without.correct_with_report(&stacks, &calibration(), &data_roi()).unwrap();
    assert!(output.repair.is_none());
    assert!(output.timings.get_step("pixel_repair").is_none());
}

#[test]
fn test_roi_outside_calibration_rejected() {
    let pipeline = CorrectionPipeline::new(CorrectionConfig::default()).unwrap();
    let err = pipeline
        .correct(&channel_stacks(1, 2), &calibration(), &Roi::new(0, 2, 5, 5))
        .unwrap_err();
    assert!(matches!(err, CorrectionError::RoiOutOfBounds { .. }));
}

#[test]
fn test_stack_shape_mismatch_rejected() {
    let pipeline = CorrectionPipeline::new(CorrectionConfig::default()).unwrap();
    let mut stacks = channel_stacks(2, 3);
    stacks[1] = Array3::zeros((4, 4, 6));
    let err = pipeline.correct(&stacks, &calibration(), &data_roi()).unwrap_err();
    assert!(matches!(err, CorrectionError::ShapeMismatch(_)));
}

#[test]
fn test_plane_shape_must_match_roi() {
    let pipeline = CorrectionPipeline::new(CorrectionConfig::default()).unwrap();
    let stacks = vec![Array3::<u16>::zeros((3, 5, 6))];
    let err = pipeline.correct(&stacks, &calibration(), &data_roi()).unwrap_err();
    assert!(matches!(err, CorrectionError::DimensionMismatch { .. }));
}

#[test]
fn test_invalid_config_rejected() {
    let config = CorrectionConfig::builder().median_window(2).build();
    assert!(matches!(
        CorrectionPipeline::new(config).err(),
        Some(CorrectionError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_set_config_rebuilds_corrector() {
    let mut pipeline = CorrectionPipeline::new(CorrectionConfig::default()).unwrap();
    assert_eq!(pipeline.corrector_name(), "vectorized");
    pipeline
        .set_config(CorrectionConfig::builder().strategy(CorrectionStrategy::Scalar).build())
        .unwrap();
    assert_eq!(pipeline.corrector_name(), "scalar");
    assert_eq!(pipeline.config().strategy, CorrectionStrategy::Scalar);
}

#[test]
fn test_free_function() {
    let stacks = channel_stacks(2, 4);
    let out = correct(
        &stacks,
        &calibration(),
        &data_roi(),
        CorrectionStrategy::Scalar,
        0.88,
        true,
    )
    .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].dim(), (4, 4, 6));
}

#[test]
fn test_single_pixel_scenario_end_to_end() {
    let roi = Roi::new(1, 1, 1, 1);
    let model = CalibrationModel::from_maps(
        Array2::from_elem((1, 1), 2.0),
        Array2::from_elem((1, 1), 1.0),
        Array2::from_elem((1, 1), 10.0),
        roi,
        CropAlignment::default(),
    )
    .unwrap();
    let stacks = vec![Array3::from_shape_vec((3, 1, 1), vec![50.0f32, 60.0, 10.0]).unwrap()];
    let out = correct(&stacks, &model, &roi, CorrectionStrategy::Vectorized, 0.88, false).unwrap();
    assert_eq!(out[0][[0, 0, 0]], 40.0);
    assert!((out[0][[1, 0, 0]] - 48.24).abs() < 1e-4);
    assert_eq!(out[0][[2, 0, 0]], 0.0);
}

#[test]
fn test_config_alignment_drives_crop() {
    // Dark offset equals the calibration row index, so the output shows which row was used.
    let roi = Roi::new(1, 1, 100, 100);
    let (h, w) = roi.shape();
    let model = CalibrationModel::from_maps(
        Array2::zeros((h, w)),
        Array2::zeros((h, w)),
        Array2::from_shape_fn((h, w), |(r, _)| r as f32),
        roi,
        CropAlignment::default(),
    )
    .unwrap();
    let data = Roi::new(16, 11, 80, 50);
    let stacks = vec![Array3::<u16>::from_elem((1, 40, 65), 1000)];

    let run = |alignment: CropAlignment| {
        let config = CorrectionConfig::builder()
            .alignment(alignment)
            .repair_pixels(false)
            .build();
        CorrectionPipeline::new(config)
            .unwrap()
            .correct(&stacks, &model, &data)
            .unwrap()
    };

    // Vertical shift 1 + 100 - 16 - 80 = 5 rows on top of the 10-row offset.
    assert_eq!(run(CropAlignment::default())[0][[0, 0, 0]], 985);
    let unshifted = CropAlignment {
        horizontal_shift: 0,
        vertical_shift_enabled: false,
    };
    assert_eq!(run(unshifted)[0][[0, 0, 0]], 990);
}
