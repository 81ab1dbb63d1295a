use crate::{Error, JointOrder, SkinBinding, WeightsTable};
use glam::{Mat4, Vec3};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-5,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn order() -> JointOrder {
    JointOrder::new(vec!["root".to_string(), "child".to_string()])
}

fn table(entries: &[(&str, &[(usize, f32)])]) -> WeightsTable {
    WeightsTable {
        weights: entries
            .iter()
            .map(|(joint, list)| (joint.to_string(), list.to_vec()))
            .collect(),
    }
}

#[test]
fn resolve_pads_and_normalizes() {
    let weights = table(&[
        ("ghost", &[(0, 5.0)]),
        ("root", &[(0, 2.0), (1, 1.0)]),
        ("child", &[(1, 3.0)]),
    ]);
    let binding = SkinBinding::resolve(&order(), &weights, 3);

    assert_eq!(binding.influences, 2);
    assert_eq!(binding.joint_indices.len(), 6);
    assert_eq!(binding.vertex_joint_indices(0), [0, 0]);
    assert_approx(binding.vertex_weights(0)[0], 1.0);
    assert_approx(binding.vertex_weights(0)[1], 0.0);

    assert_eq!(binding.vertex_joint_indices(1), [0, 1]);
    assert_approx(binding.vertex_weights(1)[0], 0.25);
    assert_approx(binding.vertex_weights(1)[1], 0.75);

    // No weights at all: left as all zero.
    assert_eq!(binding.vertex_weights(2), [0.0, 0.0]);

    for v in 0..binding.vertex_count {
        let sum = binding.weight_sum(v);
        assert!(
            (sum - 1.0).abs() <= 1.0e-5 || sum == 0.0,
            "vertex {v} weight sum {sum}"
        );
    }
}

#[test]
fn out_of_range_weight_entries_are_skipped() {
    let weights = table(&[("root", &[(0, 1.0), (9, 1.0)])]);
    let binding = SkinBinding::resolve(&order(), &weights, 2);
    assert_eq!(binding.influences, 1);
    assert_approx(binding.weight_sum(0), 1.0);
    assert_approx(binding.weight_sum(1), 0.0);
}

#[test]
fn sort_influences_orders_by_descending_weight() {
    let weights = table(&[("root", &[(0, 0.2)]), ("child", &[(0, 0.8), (1, 1.0)])]);
    let mut binding = SkinBinding::resolve(&order(), &weights, 2);
    assert_eq!(binding.vertex_joint_indices(0), [0, 1]);

    binding.sort_influences();
    assert_eq!(binding.vertex_joint_indices(0), [1, 0]);
    assert_approx(binding.vertex_weights(0)[0], 0.8);
    assert_approx(binding.vertex_weights(0)[1], 0.2);
    // Padding stays last.
    assert_eq!(binding.vertex_joint_indices(1), [1, 0]);
    assert_approx(binding.vertex_weights(1)[1], 0.0);
}

#[test]
fn skin_points_blends_joint_transforms() {
    let weights = table(&[("root", &[(0, 1.0), (1, 1.0)]), ("child", &[(1, 1.0), (2, 1.0)])]);
    let binding = SkinBinding::resolve(&order(), &weights, 3);
    let xforms = [Mat4::IDENTITY, Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0))];
    let points = [Vec3::ZERO, Vec3::X, Vec3::Z];

    let skinned = binding.skin_points(&xforms, &points).unwrap();
    assert!(skinned[0].abs_diff_eq(Vec3::ZERO, 1.0e-5));
    assert!(skinned[1].abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1.0e-5));
    assert!(skinned[2].abs_diff_eq(Vec3::new(0.0, 2.0, 1.0), 1.0e-5));

    let chunked = binding.skin_points_chunked(&xforms, &points, 1).unwrap();
    assert_eq!(chunked, skinned);

    let subset = binding.skin_indices(&xforms, &points, &[2, 1]).unwrap();
    assert_eq!(subset, vec![skinned[2], skinned[1]]);
}

#[test]
fn skinning_fails_for_unweighted_vertices() {
    let weights = table(&[("root", &[(0, 1.0)])]);
    let binding = SkinBinding::resolve(&order(), &weights, 2);
    let xforms = [Mat4::IDENTITY, Mat4::IDENTITY];
    let points = [Vec3::ZERO, Vec3::ONE];

    let err = binding.skin_points(&xforms, &points).unwrap_err();
    assert!(matches!(err, Error::SkinningFailure { vertex: 1, .. }), "{err}");

    // Skinning only the weighted vertex succeeds.
    let subset = binding.skin_indices(&xforms, &points, &[0]).unwrap();
    assert_eq!(subset, vec![Vec3::ZERO]);

    let err = binding.skin_indices(&xforms, &points, &[5]).unwrap_err();
    assert!(matches!(err, Error::SkinningFailure { vertex: 5, .. }), "{err}");
}

#[test]
fn skinning_fails_for_missing_joint_transforms() {
    let weights = table(&[("child", &[(0, 1.0)])]);
    let binding = SkinBinding::resolve(&order(), &weights, 1);
    let err = binding
        .skin_points(&[Mat4::IDENTITY], &[Vec3::ZERO])
        .unwrap_err();
    assert!(matches!(err, Error::SkinningFailure { vertex: 0, .. }), "{err}");

    let err = binding
        .skin_points(&[Mat4::IDENTITY, Mat4::IDENTITY], &[Vec3::ZERO, Vec3::ONE])
        .unwrap_err();
    assert!(matches!(err, Error::SkinningFailure { .. }), "{err}");
}
