//! Black-Scholes pricing and implied volatility.
//!
//! Options on the futures underlying are priced with a zero interest rate, so the
//! forward equals the underlying price. Implied volatility is recovered by bisection
//! over a fixed bracket:
//!
//! - the observed price must lie strictly between the prices at the bracket ends,
//!   otherwise no volatility reproduces it and the result is unavailable;
//! - iteration stops when the repriced option is within the absolute tolerance of the
//!   observed price, or when the bracket collapses;
//! - the iteration count is bounded, non-convergence is unavailable as well.
//!
//! "Unavailable" is `None`; the solver never returns zero, negative or NaN volatility.

use std::f64::consts::SQRT_2;

use chain_common::OptionKind;
use chrono::{DateTime, Utc};
use statrs::function::erf::erfc;

/// Absolute price tolerance of the inversion.
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 60.0 * 60.0;
const VOL_LOW: f64 = 1e-4;
const VOL_HIGH: f64 = 10.0;
const VOL_EPSILON: f64 = 1e-12;
const MAX_ITERATIONS: usize = 200;

/// Standard normal CDF
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Black-Scholes price with zero rates. `vol` and `years` are annualised.
pub fn black_price(spot: f64, strike: f64, vol: f64, years: f64, kind: OptionKind) -> f64 {
    if years <= 0.0 || vol <= 0.0 {
        return kind.intrinsic(spot, strike);
    }

    let sqrt_t = years.sqrt();
    let d1 = ((spot / strike).ln() + 0.5 * vol * vol * years) / (vol * sqrt_t);
    let d2 = d1 - vol * sqrt_t;

    match kind {
        OptionKind::Call => spot * norm_cdf(d1) - strike * norm_cdf(d2),
        OptionKind::Put => strike * norm_cdf(-d2) - spot * norm_cdf(-d1),
    }
}

/// Annualised volatility reproducing `price`, or `None` when unavailable.
pub fn implied_volatility(
    price: f64,
    spot: f64,
    strike: f64,
    years: f64,
    kind: OptionKind,
    tolerance: f64,
) -> Option<f64> {
    // Negated comparisons also reject NaN inputs.
    if !(spot > 0.0 && strike > 0.0 && years > 0.0 && price > 0.0) {
        return None;
    }

    let floor = black_price(spot, strike, VOL_LOW, years, kind);
    let cap = black_price(spot, strike, VOL_HIGH, years, kind);
    if !(price > floor && price < cap) {
        return None;
    }

    let (mut low, mut high) = (VOL_LOW, VOL_HIGH);
    for _ in 0..MAX_ITERATIONS {
        let mid = 0.5 * (low + high);
        let diff = black_price(spot, strike, mid, years, kind) - price;

        if diff.abs() < tolerance {
            return Some(mid);
        }
        if diff > 0.0 {
            high = mid;
        } else {
            low = mid;
        }
        if high - low < VOL_EPSILON {
            return Some(0.5 * (low + high));
        }
    }
    None
}

/// Implied volatility for one option series with a fixed expiry.
#[derive(Debug, Clone, Copy)]
pub struct VolatilitySolver {
    expiry: DateTime<Utc>,
}

impl VolatilitySolver {
    /// Solver for options expiring at `expiry`.
    pub fn new(expiry: DateTime<Utc>) -> Self {
        Self { expiry }
    }

    /// Years left until expiry at `now`; zero once expired.
    pub fn years_to_expiry(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (self.expiry - now).num_milliseconds() as f64 / 1000.0;
        (seconds / SECONDS_PER_YEAR).max(0.0)
    }

    /// Implied volatility in percent for an observed `price`.
    ///
    /// Absent or zero prices, non-positive inputs, an expired series and prices no
    /// volatility can reproduce all give `None`.
    pub fn solve(
        &self,
        now: DateTime<Utc>,
        spot: f64,
        strike: i64,
        price: Option<f64>,
        kind: OptionKind,
    ) -> Option<f64> {
        let price = price.filter(|p| *p > 0.0)?;
        let years = self.years_to_expiry(now);
        implied_volatility(price, spot, strike as f64, years, kind, DEFAULT_TOLERANCE)
            .map(|vol| vol * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn prices_at_the_money_call() {
        // S = K, r = 0: C = S * (2 N(vol * sqrt(T) / 2) - 1)
        let price = black_price(100.0, 100.0, 0.2, 1.0, OptionKind::Call);
        assert!((price - 7.965567).abs() < 1e-5, "ATM call: {}", price);
    }

    #[test]
    fn put_call_parity_holds_with_zero_rates() {
        let call = black_price(100000.0, 103000.0, 0.25, 0.1, OptionKind::Call);
        let put = black_price(100000.0, 103000.0, 0.25, 0.1, OptionKind::Put);
        assert!((call - put - (100000.0 - 103000.0)).abs() < 1e-6);
    }

    #[test]
    fn recovers_volatility_of_synthetic_price() {
        for (strike, kind) in [
            (95000.0, OptionKind::Call),
            (100000.0, OptionKind::Call),
            (105000.0, OptionKind::Put),
            (100000.0, OptionKind::Put),
        ] {
            let price = black_price(100000.0, strike, 0.18, 30.0 / 365.0, kind);
            let vol = implied_volatility(price, 100000.0, strike, 30.0 / 365.0, kind, 1e-8)
                .unwrap();
            assert!((vol - 0.18).abs() < 1e-6, "{kind} {strike}: {vol}");
        }
    }

    #[test]
    fn prices_outside_the_bracket_are_unavailable() {
        let years = 30.0 / 365.0;
        // below intrinsic
        assert_eq!(implied_volatility(1000.0, 105000.0, 100000.0, years, OptionKind::Call, 1e-8), None);
        // a call cannot be worth more than the underlying
        assert_eq!(implied_volatility(200000.0, 100000.0, 100000.0, years, OptionKind::Call, 1e-8), None);
        assert_eq!(implied_volatility(f64::NAN, 100000.0, 100000.0, years, OptionKind::Call, 1e-8), None);
    }

    #[test]
    fn non_positive_inputs_are_unavailable() {
        let years = 30.0 / 365.0;
        assert_eq!(implied_volatility(0.0, 100.0, 100.0, years, OptionKind::Call, 1e-8), None);
        assert_eq!(implied_volatility(-1.0, 100.0, 100.0, years, OptionKind::Call, 1e-8), None);
        assert_eq!(implied_volatility(5.0, 0.0, 100.0, years, OptionKind::Call, 1e-8), None);
        assert_eq!(implied_volatility(5.0, 100.0, -100.0, years, OptionKind::Put, 1e-8), None);
        assert_eq!(implied_volatility(5.0, 100.0, 100.0, 0.0, OptionKind::Put, 1e-8), None);
    }

    #[test]
    fn solver_reports_percent_until_expiry() {
        let solver = VolatilitySolver::new(now() + Duration::days(30));
        let years = solver.years_to_expiry(now());
        assert!((years - 30.0 / 365.0).abs() < 1e-12);

        let price = black_price(100000.0, 100000.0, 0.2, years, OptionKind::Call);
        let vol = solver
            .solve(now(), 100000.0, 100000, Some(price), OptionKind::Call)
            .unwrap();
        assert!((vol - 20.0).abs() < 1e-4, "percent vol: {}", vol);

        assert_eq!(solver.solve(now(), 100000.0, 100000, None, OptionKind::Call), None);
        assert_eq!(solver.solve(now(), 100000.0, 100000, Some(0.0), OptionKind::Call), None);
    }

    #[test]
    fn expired_series_is_unavailable() {
        let solver = VolatilitySolver::new(now());
        assert_eq!(solver.years_to_expiry(now() + Duration::hours(1)), 0.0);
        assert_eq!(
            solver.solve(now() + Duration::hours(1), 100000.0, 100000, Some(120.0), OptionKind::Call),
            None
        );
    }
}
