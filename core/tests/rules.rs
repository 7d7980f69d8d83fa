use kakera_core::{puzzle_by_slug, GameRules, ImageRef, RotationMode, DEFAULT_PUZZLE_SLUG};

#[test]
fn missing_fields_fall_back_to_defaults() {
    let rules = GameRules::from_json(r#"{ "points_per_piece": 25 }"#).expect("rules");
    assert_eq!(rules.points_per_piece, 25);
    assert_eq!(rules.completion_bonus, GameRules::default().completion_bonus);
    assert_eq!(rules.rotation_mode, RotationMode::Quarter);
    assert_eq!(rules.lock_timeout_ms, 5_000);
}

#[test]
fn out_of_range_values_are_clamped() {
    let rules = GameRules::from_json(
        r#"{
            "tolerance": { "position": 9.0, "rotation_deg": -3.0 },
            "rotation_mode": "free",
            "lock_timeout_ms": 10,
            "scramble_radius_ratio": 50.0
        }"#,
    )
    .expect("rules");
    assert_eq!(rules.rotation_mode, RotationMode::Free);
    assert_eq!(rules.tolerance.position, 0.45);
    assert_eq!(rules.tolerance.rotation_deg, 0.0);
    assert_eq!(rules.lock_timeout_ms, 500);
    assert_eq!(rules.scramble_radius_ratio, 3.0);
}

#[test]
fn malformed_json_is_an_error() {
    assert!(GameRules::from_json("{ not json").is_err());
}

#[test]
fn image_refs_validate() {
    assert!(ImageRef::catalog("harbor-dusk").validate().is_ok());
    assert!(ImageRef::catalog("  ").validate().is_err());
    let upload = ImageRef::Upload {
        hash: "00ff".to_string(),
    };
    assert!(upload.validate().is_ok());
    assert_eq!(upload.to_string(), "upload:00ff");
    let bad = ImageRef::Upload {
        hash: "zz".to_string(),
    };
    assert!(bad.validate().is_err());
}

#[test]
fn catalog_lookup_ignores_case() {
    let entry = puzzle_by_slug(" Alpine-Meadow ").expect("entry");
    assert_eq!(entry.slug, "alpine-meadow");
    assert!(puzzle_by_slug(DEFAULT_PUZZLE_SLUG).is_some());
    assert!(puzzle_by_slug("missing").is_none());
}
