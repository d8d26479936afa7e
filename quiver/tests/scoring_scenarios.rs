use ndarray::{Array, ArrayD, IxDyn};
use quiver::scoring::{score_for_distance, TargetGeometry};
use quiver::{
    AnalysisError, AnalysisStatus, Analyzer, BoundingBox, PreprocessMeta, PreprocessTransform,
    ScoringConfig,
};

const MISS: usize = 0;
const ARROW: usize = 1;
const TARGET: usize = 2;

/// Build a `[1, 8, n]` detector output. Boxes are given in original-image
/// pixels and pushed through `transform` into model space first.
fn capture(
    transform: &PreprocessTransform,
    predictions: &[(usize, f32, BoundingBox)],
) -> ArrayD<f32> {
    let channels = 5 + 3;
    let n = predictions.len();
    let mut data = vec![0.0; channels * n];
    for (i, (class, confidence, bbox)) in predictions.iter().enumerate() {
        let model = transform.to_model_space(bbox);
        data[i] = model.center_x;
        data[n + i] = model.center_y;
        data[2 * n + i] = model.width;
        data[3 * n + i] = model.height;
        data[4 * n + i] = 0.1;
        data[(5 + class) * n + i] = *confidence;
    }
    Array::from_shape_vec(IxDyn(&[1, channels, n]), data).unwrap()
}

fn target_face() -> (usize, f32, BoundingBox) {
    (TARGET, 0.92, BoundingBox::new(100.0, 100.0, 200.0, 200.0))
}

fn arrow_at(x: f32, y: f32) -> (usize, f32, BoundingBox) {
    (ARROW, 0.81, BoundingBox::new(x, y, 6.0, 6.0))
}

fn letterboxed() -> PreprocessMeta {
    PreprocessMeta::letterbox(1600, 1200, 640)
}

fn plain_scaled() -> PreprocessMeta {
    PreprocessMeta::plain_scale(1600, 1200, 640)
}

fn analyze_single_arrow(meta: &PreprocessMeta, x: f32, y: f32) -> quiver::AnalysisResult {
    let analyzer = Analyzer::new(ScoringConfig::default()).unwrap();
    let tensor = capture(&meta.transform, &[target_face(), arrow_at(x, y)]);
    analyzer.analyze(&tensor.view(), meta)
}

#[test]
fn test_arrow_at_center_scores_ten() {
    for meta in [letterboxed(), plain_scaled()] {
        let result = analyze_single_arrow(&meta, 100.0, 100.0);

        assert_eq!(result.status(), AnalysisStatus::Success);
        let hit = &result.hits()[0];
        assert!(hit.distance_from_center < 1e-3);
        assert_eq!(hit.points, 10);
        assert_eq!(result.total_score(), 10);
    }
}

#[test]
fn test_arrow_in_second_ring_scores_nine() {
    for meta in [letterboxed(), plain_scaled()] {
        let result = analyze_single_arrow(&meta, 115.0, 100.0);

        let hit = &result.hits()[0];
        assert!((hit.distance_from_center - 15.0).abs() < 1e-2);
        assert_eq!(hit.points, 9);
        assert_eq!(hit.ring, 9);
    }
}

#[test]
fn test_arrow_near_rim_scores_one() {
    for meta in [letterboxed(), plain_scaled()] {
        let result = analyze_single_arrow(&meta, 195.0, 100.0);

        assert_eq!(result.hits()[0].points, 1);
        assert_eq!(result.total_score(), 1);
    }
}

#[test]
fn test_arrow_outside_target_is_recorded_with_zero() {
    for meta in [letterboxed(), plain_scaled()] {
        let result = analyze_single_arrow(&meta, 250.0, 100.0);

        assert!(result.is_success());
        assert_eq!(result.hits().len(), 1);
        assert_eq!(result.hits()[0].points, 0);
        assert_eq!(result.hits()[0].ring, 0);
        assert_eq!(result.total_score(), 0);
    }
}

#[test]
fn test_nothing_surviving_is_no_detections() {
    let analyzer = Analyzer::new(ScoringConfig::default()).unwrap();
    let meta = letterboxed();
    let weak = (TARGET, 0.05, BoundingBox::new(100.0, 100.0, 200.0, 200.0));
    let tensor = capture(&meta.transform, &[weak]);

    let result = analyzer.analyze(&tensor.view(), &meta);

    assert_eq!(result.status(), AnalysisStatus::Failure);
    assert!(matches!(
        result.error(),
        Some(AnalysisError::NoDetections { .. })
    ));
    assert!(result.hits().is_empty());
    assert!(result.target().is_none());

    let empty = Array::<f32, _>::zeros(IxDyn(&[1, 8, 0]));
    let result = analyzer.analyze(&empty.view(), &meta);
    assert!(matches!(
        result.error(),
        Some(AnalysisError::NoDetections { .. })
    ));
}

#[test]
fn test_missing_target_lists_what_was_seen() {
    let analyzer = Analyzer::new(ScoringConfig::default()).unwrap();
    let meta = plain_scaled();
    let tensor = capture(
        &meta.transform,
        &[
            arrow_at(115.0, 100.0),
            (MISS, 0.66, BoundingBox::new(400.0, 400.0, 6.0, 6.0)),
        ],
    );

    let result = analyzer.analyze(&tensor.view(), &meta);

    match result.error() {
        Some(AnalysisError::TargetNotFound { observed }) => {
            assert!(observed.contains("arrow (0.81)"));
            assert!(observed.contains("miss (0.66)"));
        }
        other => panic!("expected TargetNotFound, got {other:?}"),
    }
    assert_eq!(result.detections().len(), 2);
}

#[test]
fn test_full_end_is_summed() {
    let analyzer = Analyzer::new(ScoringConfig::default()).unwrap();
    let meta = letterboxed();
    let tensor = capture(
        &meta.transform,
        &[
            target_face(),
            (ARROW, 0.9, BoundingBox::new(100.0, 100.0, 6.0, 6.0)),
            (ARROW, 0.8, BoundingBox::new(100.0, 135.0, 6.0, 6.0)),
            (ARROW, 0.7, BoundingBox::new(45.0, 100.0, 6.0, 6.0)),
            (MISS, 0.95, BoundingBox::new(500.0, 500.0, 6.0, 6.0)),
        ],
    );

    let result = analyzer.analyze(&tensor.view(), &meta);

    let points: Vec<u32> = result.hits().iter().map(|h| h.points).collect();
    assert_eq!(points, vec![10, 7, 5]);
    assert_eq!(result.total_score(), 22);
    assert_eq!(result.detections().len(), 5);
}

#[test]
fn test_score_properties() {
    let radius = 100.0;
    assert_eq!(score_for_distance(0.0, radius), 10);
    assert_eq!(score_for_distance(0.95 * radius, radius), 1);
    assert_eq!(score_for_distance(radius, radius), 0);
    assert_eq!(score_for_distance(radius * 3.0, radius), 0);
    assert_eq!(score_for_distance(0.0, 0.0), 0);
    assert_eq!(score_for_distance(0.0, -1.0), 0);

    for step in 0..=200 {
        let points = score_for_distance(step as f32, radius);
        assert!(points <= 10);
    }
}

#[test]
fn test_elliptical_face_uses_larger_semi_axis() {
    let geometry = TargetGeometry {
        center_x: 0.0,
        center_y: 0.0,
        radius_x: 100.0,
        radius_y: 60.0,
    };
    assert_eq!(geometry.radius(), 100.0);
    assert_eq!(score_for_distance(geometry.distance_to(0.0, 65.0), geometry.radius()), 4);
}

#[test]
fn test_concurrent_analyses_share_one_analyzer() {
    let analyzer = Analyzer::new(ScoringConfig::default()).unwrap();
    let meta = letterboxed();
    let positions = [100.0_f32, 115.0, 195.0, 250.0];
    let expected = [10, 9, 1, 0];

    let totals: Vec<u32> = std::thread::scope(|scope| {
        let handles: Vec<_> = positions
            .iter()
            .map(|&x| {
                let analyzer = &analyzer;
                scope.spawn(move || {
                    let tensor = capture(&meta.transform, &[target_face(), arrow_at(x, 100.0)]);
                    analyzer.analyze(&tensor.view(), &meta).total_score()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(totals, expected);
}
