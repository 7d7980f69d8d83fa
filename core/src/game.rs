//! Seeded randomness and angle math shared by every client.
//!
//! Everything here is deterministic: two clients given the same seed compute
//! bit-identical layouts, which is what lets a room ship a seed instead of a
//! full piece table.

pub const PUZZLE_SEED: u32 = 0x5EED_2520;

pub const ROTATION_STEP_DEG: f32 = 90.0;
pub const QUARTER_TURNS: u32 = 4;

pub fn splitmix32(mut value: u32) -> u32 {
    value = value.wrapping_add(0x9E37_79B9);
    let mut z = value;
    z = (z ^ (z >> 16)).wrapping_mul(0x85EB_CA6B);
    z = (z ^ (z >> 13)).wrapping_mul(0xC2B2_AE35);
    z ^ (z >> 16)
}

/// Uniform value in `[0, 1)` derived from `seed` and `salt`.
pub fn rand_unit(seed: u32, salt: u32) -> f32 {
    let mixed = splitmix32(seed ^ splitmix32(salt));
    let top = mixed >> 8;
    top as f32 / ((1u32 << 24) as f32)
}

pub fn rand_range(seed: u32, salt: u32, min: f32, max: f32) -> f32 {
    min + (max - min) * rand_unit(seed, salt)
}

/// Integer in `[0, bound)`; `bound == 0` yields 0.
pub fn rand_index(seed: u32, salt: u32, bound: usize) -> usize {
    if bound == 0 {
        return 0;
    }
    let idx = (rand_unit(seed, salt) * bound as f32) as usize;
    idx.min(bound - 1)
}

/// Maps any angle in degrees into `[0, 360)`.
pub fn normalize_angle(angle: f32) -> f32 {
    let mut angle = angle % 360.0;
    if angle < 0.0 {
        angle += 360.0;
    }
    if angle >= 360.0 {
        angle -= 360.0;
    }
    angle
}

/// Signed shortest rotation from `current` to `target`, in `(-180, 180]`.
pub fn angle_delta(target: f32, current: f32) -> f32 {
    let mut diff = normalize_angle(target - current);
    if diff > 180.0 {
        diff -= 360.0;
    }
    diff
}

pub fn angle_matches(a: f32, b: f32, tolerance: f32) -> bool {
    angle_delta(a, b).abs() <= tolerance
}

/// Nearest multiple of 90 degrees, normalized.
pub fn snap_quarter(angle: f32) -> f32 {
    normalize_angle((angle / ROTATION_STEP_DEG).round() * ROTATION_STEP_DEG)
}

pub fn distance_sq(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}
