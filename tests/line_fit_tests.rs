use profile_alignment::config::{CoarseRotationConfig, RansacConfig};
use profile_alignment::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 90 points on y = 2x plus 10 outliers placed by `placement_seed`
fn contaminated_line(placement_seed: u64) -> PointSet {
    let mut rng = StdRng::seed_from_u64(placement_seed);
    let mut points: Vec<Point> = (0..90)
        .map(|i| {
            let x = i as f64 * 0.5;
            Point::new(x, 2.0 * x)
        })
        .collect();

    for _ in 0..10 {
        let x = rng.gen_range(0.0..45.0);
        let y = rng.gen_range(-100.0..200.0);
        points.push(Point::new(x, y));
    }
    PointSet::new(points)
}

#[test]
fn test_slope_is_robust_to_outlier_placement() {
    for placement_seed in 0..10 {
        let points = contaminated_line(placement_seed);
        let fitter = RobustLineFitter::new(
            RansacConfig::default()
                .with_residual_threshold(0.5)
                .with_seed(placement_seed + 100),
        );

        let slope = fitter.slope(&points).unwrap();
        assert!((slope - 2.0).abs() < 0.05, "seed {}: slope {}", placement_seed, slope);
    }
}

/// 90 points on y = 2x plus 10 outliers 3 to 20 above the line
fn line_with_near_outliers(placement_seed: u64) -> PointSet {
    let mut rng = StdRng::seed_from_u64(placement_seed);
    let mut points: Vec<Point> = (0..90)
        .map(|i| {
            let x = i as f64 * 0.5;
            Point::new(x, 2.0 * x)
        })
        .collect();

    for _ in 0..10 {
        let x = rng.gen_range(0.0..45.0);
        points.push(Point::new(x, 2.0 * x + rng.gen_range(3.0..20.0)));
    }
    PointSet::new(points)
}

#[test]
fn test_default_threshold_is_robust_to_near_outliers() {
    let fitter = RobustLineFitter::new(RansacConfig::default().with_seed(1));

    for placement_seed in 0..50 {
        let fit = fitter.fit(&line_with_near_outliers(placement_seed)).unwrap();
        assert!(
            (fit.model.slope - 2.0).abs() < 0.05,
            "seed {}: slope {} threshold {}",
            placement_seed,
            fit.model.slope,
            fit.threshold
        );
        assert!(fit.threshold < 1.0);
        assert_eq!(fit.inliers.len(), 90);
    }
}

#[test]
fn test_default_threshold_rejects_far_outliers() {
    let mut points: Vec<Point> = (0..90)
        .map(|i| {
            let x = i as f64 * 0.5;
            Point::new(x, 2.0 * x)
        })
        .collect();
    for i in 0..10 {
        let x = i as f64 * 4.5;
        points.push(Point::new(x, 2.0 * x + 500.0));
    }

    let fitter = RobustLineFitter::new(RansacConfig::default().with_seed(7));
    let fit = fitter.fit(&PointSet::new(points)).unwrap();

    assert_eq!(fit.inliers.len(), 90);
    assert!(fit.inliers.iter().all(|&i| i < 90));
    assert!((fit.model.slope - 2.0).abs() < 1e-9);
    assert!(fit.model.intercept.abs() < 1e-9);
}

#[test]
fn test_unseeded_fits_agree_on_clean_data() {
    let points: PointSet = (0..30).map(|i| Point::new(i as f64, -0.5 * i as f64 + 3.0)).collect();
    let fitter = RobustLineFitter::default();
    assert!((fitter.slope(&points).unwrap() + 0.5).abs() < 1e-9);
    assert!((fitter.slope(&points).unwrap() + 0.5).abs() < 1e-9);
}

#[test]
fn test_least_squares_fallback_on_all_points() {
    let points = contaminated_line(3);
    let model = fit_least_squares(points.as_slice()).unwrap();
    assert!(model.slope.is_finite());
}

#[test]
fn test_coarse_rotation_on_tilted_edges() {
    let generator = ProfileGenerator::new(SyntheticProfileConfig::default()).unwrap();
    let tread = generator.clean_profile();
    let flange = ProfileTransformer::rotate(&tread, 3.0);

    let estimator = CoarseRotationEstimator::new(CoarseRotationConfig::default(), RansacConfig::default().with_seed(1));
    let coarse = estimator.estimate(&flange, &tread).unwrap();

    assert!((coarse.angle_degrees + 3.0).abs() < 1e-6, "angle {}", coarse.angle_degrees);
    assert_eq!(coarse.rotated.len(), flange.len());
    assert!(calculate_max_pointwise_error(&coarse.rotated, &tread).unwrap() < 1e-9);
}

#[test]
fn test_coarse_rotation_needs_two_points_per_window() {
    let estimator = CoarseRotationEstimator::new(CoarseRotationConfig::default(), RansacConfig::default());
    let single = PointSet::from_pairs(&[(5.0, 1.0)]);
    let tread = PointSet::from_pairs(&[(0.0, 0.0), (5.0, 0.5), (7.0, 0.7), (8.0, 0.8), (10.0, 1.0)]);

    assert!(matches!(
        estimator.estimate(&single, &tread),
        Err(LineFitError::InsufficientData { found: 1 })
    ));
}
