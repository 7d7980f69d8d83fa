use kakera_core::grid::grid_choices;
use kakera_core::{Difficulty, DifficultyError, RoomId, RoomIdError};

#[test]
fn presets_and_explicit_grids_parse() {
    assert_eq!("easy".parse::<Difficulty>(), Ok(Difficulty::EASY));
    assert_eq!("Expert".parse::<Difficulty>(), Ok(Difficulty::EXPERT));
    assert_eq!("5x7".parse::<Difficulty>(), Ok(Difficulty { rows: 5, cols: 7 }));
    assert!(matches!(
        "0x7".parse::<Difficulty>(),
        Err(DifficultyError::OutOfRange { rows: 0, cols: 7 })
    ));
    assert!(matches!(
        "huge".parse::<Difficulty>(),
        Err(DifficultyError::Unrecognized(_))
    ));
}

#[test]
fn image_grids_follow_aspect_ratio() {
    let wide = Difficulty::for_image(1920, 1080, 100).expect("grid");
    assert!(wide.cols > wide.rows);
    let tall = Difficulty::for_image(1200, 1500, 100).expect("grid");
    assert!(tall.rows >= tall.cols);
    assert!(matches!(
        Difficulty::for_image(0, 100, 100),
        Err(DifficultyError::NoFit { .. })
    ));
    assert!(!grid_choices(1600, 1200).is_empty());
}

#[test]
fn oversized_piece_targets_do_not_fit() {
    for target in [u32::MAX, u32::MAX / 2, 32 * 32 + 1] {
        assert!(matches!(
            Difficulty::for_image(1600, 1200, target),
            Err(DifficultyError::NoFit { .. })
        ));
    }
}

#[test]
fn room_ids_validate() {
    assert!(RoomId::parse("Abc123XYZ0").is_ok());
    assert_eq!(
        RoomId::parse("short"),
        Err(RoomIdError::InvalidLength {
            expected: 10,
            found: 5
        })
    );
    assert_eq!(
        RoomId::parse("Abc123XYZ-"),
        Err(RoomIdError::InvalidCharacter { ch: '-', index: 9 })
    );
    let mut rng = rand::rng();
    let generated = RoomId::generate(&mut rng);
    assert!(RoomId::parse(generated.as_str()).is_ok());
}
