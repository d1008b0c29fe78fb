use profile_alignment::config::{IcpConfig, NeighborSearch};
use profile_alignment::*;

fn curve() -> PointSet {
    (0..=200)
        .map(|i| {
            let x = i as f64 * 0.5;
            Point::new(x, 5.0 * (x / 8.0).sin() + 0.05 * x)
        })
        .collect()
}

fn unit_square() -> PointSet {
    PointSet::from_pairs(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
}

fn assert_recovers(truth: Transform2D) {
    let target = curve();
    let source = truth.apply_to_set(&target);

    let result = IcpEngine::default().run(&source, &target);
    assert_eq!(result.state, IcpState::ConvergedSmallMotion);

    let max_error = calculate_max_pointwise_error(&result.aligned_source, &target).unwrap();
    assert!(max_error < 1e-6, "max pointwise error {}", max_error);

    let error = calculate_transform_error(&result.transform, &truth);
    assert!(error.rotation_degrees < 1e-6);
    assert!(error.translation < 1e-6);
}

#[test]
fn test_identity_converges_immediately() {
    let target = curve();
    let result = IcpEngine::default().run(&target, &target);

    assert_eq!(result.state, IcpState::ConvergedSmallMotion);
    assert_eq!(result.iterations, 1);
    assert!(result.transform.theta.abs() < 1e-12);
    assert!(result.transform.tx.abs() < 1e-12);
    assert!(result.transform.ty.abs() < 1e-12);
    assert_eq!(result.final_rms, Some(0.0));
}

#[test]
fn test_recovers_small_rotation_and_translation() {
    assert_recovers(Transform2D::from_degrees(0.5, 0.3, -0.2));
}

#[test]
fn test_recovers_one_degree() {
    assert_recovers(Transform2D::from_degrees(1.0, 0.2, 0.2));
}

#[test]
fn test_unit_square_end_to_end() {
    let source = unit_square();
    let target = Transform2D::from_degrees(90.0, 5.0, 5.0).apply_to_set(&source);

    let config = IcpConfig::default()
        .with_distance_threshold(10.0)
        .with_point_pairs_threshold(4)
        .with_neighbor_search(NeighborSearch::BruteForce);
    let result = IcpEngine::new(config).run(&source, &target);

    assert!(matches!(
        result.state,
        IcpState::ConvergedSmallMotion | IcpState::MaxIterationsReached
    ));

    // The square is symmetric, so match each corner to its closest target corner
    for p in &result.aligned_source {
        let closest = target.iter().map(|q| p.distance(q)).fold(f64::INFINITY, f64::min);
        assert!(closest < 1e-3, "corner {:?} is {} away", p, closest);
    }
}

#[test]
fn test_few_pairs_returns_source_untouched() {
    let target = curve();
    let source = PointSet::from_pairs(&[(0.0, 0.1), (0.5, 0.4), (1.0, 0.7)]);

    let result = IcpEngine::default().run(&source, &target);
    assert_eq!(result.state, IcpState::ConvergedFewPairs);
    assert_eq!(result.iterations, 0);
    assert_eq!(result.aligned_source, source);
    assert_eq!(result.final_pair_count, 3);
}

#[test]
fn test_iteration_cap_is_honoured() {
    let target = curve();
    let source = Transform2D::from_degrees(0.5, 0.3, -0.2).apply_to_set(&target);

    let result = IcpEngine::new(IcpConfig::default().with_max_iterations(2)).run(&source, &target);
    assert_eq!(result.state, IcpState::MaxIterationsReached);
    assert_eq!(result.iterations, 2);
}

#[test]
fn test_cancel_flag_returns_best_so_far() {
    let target = curve();
    let source = Transform2D::from_degrees(0.5, 0.3, -0.2).apply_to_set(&target);
    let flag = CancelFlag::new();
    flag.cancel();

    let result = IcpEngine::default().run_with_stop(&source, &target, &flag);
    assert_eq!(result.state, IcpState::Cancelled);
    assert_eq!(result.aligned_source, source);
}

#[test]
fn test_inputs_are_not_modified() {
    let target = curve();
    let source = Transform2D::from_degrees(1.0, 0.2, 0.2).apply_to_set(&target);
    let (source_before, target_before) = (source.clone(), target.clone());

    let result = IcpEngine::default().run(&source, &target);
    assert_eq!(source, source_before);
    assert_eq!(target, target_before);
    assert_eq!(result.target, target);
}

#[test]
fn test_transform_maps_source_onto_aligned() {
    let target = curve();
    let source = Transform2D::from_degrees(0.5, 0.3, -0.2).apply_to_set(&target);

    let result = IcpEngine::new(IcpConfig::default().with_max_iterations(2)).run(&source, &target);
    let replayed = result.transform.apply_to_set(&source);
    assert!(calculate_max_pointwise_error(&replayed, &result.aligned_source).unwrap() < 1e-9);
}
