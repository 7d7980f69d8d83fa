use kakera_core::game::{angle_delta, normalize_angle, snap_quarter};
use kakera_core::{build_pieces, is_placed, Difficulty, GridCoord, RotationMode, Tolerance, Transform};

fn tolerance(position: f32) -> Tolerance {
    Tolerance {
        position,
        rotation_deg: 1.5,
    }
}

#[test]
fn centered_piece_with_no_rotation_is_placed() {
    let correct = GridCoord { row: 1, col: 1 };
    let current = Transform::new(1.0, 1.0, 0.0);
    assert!(is_placed(&current, correct, &tolerance(0.3)));
}

#[test]
fn quarter_turn_is_never_placed() {
    let correct = GridCoord { row: 1, col: 1 };
    for rot in [90.0, 180.0, 270.0, -90.0] {
        let current = Transform::new(1.0, 1.0, rot);
        assert!(!is_placed(&current, correct, &tolerance(0.3)), "rot {rot}");
    }
}

#[test]
fn offset_beyond_tolerance_is_not_placed() {
    let correct = GridCoord { row: 1, col: 1 };
    let current = Transform::new(1.0, 1.4, 0.0);
    assert!(!is_placed(&current, correct, &tolerance(0.3)));
}

#[test]
fn offset_within_tolerance_is_placed() {
    let correct = GridCoord { row: 2, col: 0 };
    let current = Transform::new(0.1, 2.1, 0.0);
    assert!(is_placed(&current, correct, &tolerance(0.3)));
}

#[test]
fn full_turns_and_small_errors_count_as_upright() {
    let correct = GridCoord { row: 0, col: 0 };
    for rot in [360.0, -360.0, 720.0, 1.0, 359.0] {
        let current = Transform::new(0.0, 0.0, rot);
        assert!(is_placed(&current, correct, &tolerance(0.2)), "rot {rot}");
    }
    let current = Transform::new(0.0, 0.0, 3.0);
    assert!(!is_placed(&current, correct, &tolerance(0.2)));
}

#[test]
fn non_finite_transform_is_not_placed() {
    let correct = GridCoord { row: 0, col: 0 };
    let current = Transform::new(f32::NAN, 0.0, 0.0);
    assert!(!is_placed(&current, correct, &tolerance(0.3)));
}

#[test]
fn built_pieces_start_home_and_placed() {
    let pieces = build_pieces(Difficulty { rows: 3, cols: 4 });
    assert_eq!(pieces.len(), 12);
    let piece = &pieces[6];
    assert_eq!(piece.id, 6);
    assert_eq!(piece.correct, GridCoord { row: 1, col: 2 });
    assert_eq!(piece.current, Transform::new(2.0, 1.0, 0.0));
    assert!(pieces.iter().all(|piece| piece.placed));
    assert!(pieces
        .iter()
        .all(|piece| is_placed(&piece.current, piece.correct, &Tolerance::default())));
}

#[test]
fn quarter_mode_snaps_rotation() {
    assert_eq!(RotationMode::Quarter.apply(88.0), 90.0);
    assert_eq!(RotationMode::Quarter.apply(-91.0), 270.0);
    assert_eq!(RotationMode::Quarter.apply(359.0), 0.0);
    assert_eq!(RotationMode::Free.apply(-30.0), 330.0);
}

#[test]
fn angle_helpers_wrap() {
    assert_eq!(normalize_angle(-90.0), 270.0);
    assert_eq!(normalize_angle(720.0), 0.0);
    assert_eq!(angle_delta(0.0, 350.0), 10.0);
    assert_eq!(angle_delta(0.0, 10.0), -10.0);
    assert_eq!(snap_quarter(44.0), 0.0);
    assert_eq!(snap_quarter(46.0), 90.0);
}
