//! Strike ladder: the evenly spaced strikes tracked around the underlying price.

/// Strike nearest to `price` on the `step` grid. Halfway prices round away from zero.
///
/// `None` when the strike does not fit an `i64`.
pub fn central_strike(price: f64, step: i64) -> Option<i64> {
    let cells = (price / step as f64).round();
    // `i64::MAX as f64` is 2^63, one past the largest i64
    if !(cells.is_finite() && cells.abs() < i64::MAX as f64) {
        return None;
    }
    (cells as i64).checked_mul(step)
}

/// Ordered, evenly spaced strikes centred on the strike nearest to the underlying price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrikeLadder {
    central: i64,
    strikes: Vec<i64>,
}

impl StrikeLadder {
    /// Ladder of `count` strikes spaced by `step` around `price`.
    ///
    /// `step` must be positive and `count` odd; both are checked once in `ChainConfig`.
    /// `None` when a strike of the ladder does not fit an `i64`.
    pub fn around(price: f64, step: i64, count: usize) -> Option<Self> {
        let central = central_strike(price, step)?;
        let half = i64::try_from(count / 2).ok()?.checked_mul(step)?;
        let first = central.checked_sub(half)?;
        central.checked_add(half)?;
        let strikes = (0..count as i64).map(|i| first + i * step).collect();
        Some(Self { central, strikes })
    }

    /// Central strike.
    pub fn central(&self) -> i64 {
        self.central
    }

    /// Strikes in ascending order.
    pub fn strikes(&self) -> &[i64] {
        &self.strikes
    }

    /// `true` if `strike` is on the ladder.
    pub fn contains(&self, strike: i64) -> bool {
        self.strikes.binary_search(&strike).is_ok()
    }
}
