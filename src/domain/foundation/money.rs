//! Currency arithmetic helpers.
//!
//! Amounts are `f64` in the currency's major unit (e.g. BRL). Engines compute
//! unrounded values; rounding happens once, half away from zero to two
//! decimals, when a value is stored on a ledger row.

/// Tolerance used when checking ledger invariants on rounded amounts.
pub const MONEY_TOLERANCE: f64 = 0.01;

/// Rounds to two decimal places, half away from zero.
pub fn round_currency(amount: f64) -> f64 {
    let scaled = amount * 100.0;
    // Nudge past binary representation error (e.g. 1.005 * 100 = 100.49999...).
    let nudged = scaled + scaled.signum() * 1e-9;
    nudged.round() / 100.0
}

/// Whether two amounts are equal within [`MONEY_TOLERANCE`].
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= MONEY_TOLERANCE + f64::EPSILON
}
