use crate::candle::CandleSeries;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::patterns::{PatternSignal, two_crows_at};
use ta::indicators::{SimpleMovingAverage, StandardDeviation};
use ta::{Next, Reset};

/// Trailing simple moving average. The first `window - 1` rows are `None`.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let Ok(mut sma) = SimpleMovingAverage::new(window) else {
        return vec![None; values.len()];
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let mean = sma.next(value);
            (i + 1 >= window).then_some(mean)
        })
        .collect()
}

/// Trailing sample standard deviation. A row is defined only when the
/// `window` values ending at it are all defined.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window < 2 {
        return vec![None; values.len()];
    }
    let Ok(mut sd) = StandardDeviation::new(window) else {
        return vec![None; values.len()];
    };
    // ta reports the population deviation; rescale to n - 1.
    let correction = (window as f64 / (window as f64 - 1.0)).sqrt();

    let mut run = 0usize;
    values
        .iter()
        .map(|value| match value {
            Some(v) => {
                let population = sd.next(*v);
                run += 1;
                (run >= window).then_some(population * correction)
            }
            None => {
                sd.reset();
                run = 0;
                None
            }
        })
        .collect()
}

/// `out[i] = values[i] - values[i - 1]`; row 0 is `None`.
pub fn first_difference(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if !values.is_empty() {
        out.push(None);
    }
    out.extend(values.windows(2).map(|w| Some(w[1] - w[0])));
    out
}

/// True when `short` moved from below `long` to above it over the last two
/// rows. Undefined values never count as a cross.
pub fn golden_cross_at_tail(short: &[Option<f64>], long: &[Option<f64>]) -> bool {
    let n = short.len().min(long.len());
    if n < 2 {
        return false;
    }
    match (short[n - 1], long[n - 1], short[n - 2], long[n - 2]) {
        (Some(s1), Some(l1), Some(s0), Some(l0)) => s1 > l1 && s0 < l0,
        _ => false,
    }
}

/// Every derived column of one analysis run.
#[derive(Debug, Clone)]
pub struct Indicators {
    pub long_ma: Vec<Option<f64>>,
    pub short_ma: Vec<Option<f64>>,
    pub support: f64,
    pub resistance: f64,
    pub price_change: Vec<Option<f64>>,
    pub volatility: Vec<Option<f64>>,
    pub pattern: PatternSignal,
    pub crossover: bool,
}

impl Indicators {
    /// Computes all columns in dependency order. Fails when the series is
    /// shorter than the long moving-average window.
    pub fn compute(series: &CandleSeries, config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let required = config.long_window.max(2);
        if series.len() < required {
            return Err(AnalysisError::InsufficientData {
                indicator: "long moving average",
                required,
                actual: series.len(),
            });
        }

        let closes = series.closes();
        let long_ma = rolling_mean(&closes, config.long_window);
        let short_ma = rolling_mean(&closes, config.short_window);

        let support = series.lows().into_iter().fold(f64::INFINITY, f64::min);
        let resistance = series.highs().into_iter().fold(f64::NEG_INFINITY, f64::max);

        let price_change = first_difference(&closes);
        let volatility = rolling_std(&price_change, config.volatility_window);

        let pattern = PatternSignal::from_score(two_crows_at(&series.candles, series.len() - 1));
        let crossover = golden_cross_at_tail(&short_ma, &long_ma);

        Ok(Self {
            long_ma,
            short_ma,
            support,
            resistance,
            price_change,
            volatility,
            pattern,
            crossover,
        })
    }

    pub fn last_price_change(&self) -> Option<f64> {
        self.price_change.last().copied().flatten()
    }

    pub fn last_volatility(&self) -> Option<f64> {
        self.volatility.last().copied().flatten()
    }
}
