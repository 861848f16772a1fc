/// Convert decibels to linear amplitude.
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Convert a 0-100 percentage control to a 0-1 factor.
#[inline]
pub fn pct(value: f32) -> f32 {
    value / 100.0
}

/// Wraps `pos - offset` into `0..len`.
#[inline]
pub fn wrap_back(pos: usize, offset: usize, len: usize) -> usize {
    (pos + len - offset % len) % len
}
