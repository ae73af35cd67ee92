pub mod analysis;
pub mod buffer;
pub mod decode;
pub mod dynamics;
pub mod loudness;
pub mod spectral;
pub mod window;

/// Finite floor reported instead of -inf for silent or empty signals.
pub const DB_FLOOR: f64 = -120.0;

pub(crate) fn amplitude_db(a: f64) -> f64 {
    if a <= 0.0 {
        DB_FLOOR
    } else {
        (20.0 * a.log10()).max(DB_FLOOR)
    }
}

pub(crate) fn power_db(p: f64) -> f64 {
    if p <= 0.0 {
        DB_FLOOR
    } else {
        (10.0 * p.log10()).max(DB_FLOOR)
    }
}
