//! Candlestick reversal detection.

use crate::candle::Candle;

/// Candles averaged when deciding whether a real body is "long".
pub const BODY_LONG_PERIOD: usize = 10;

/// Magnitude of a detected pattern's score.
pub const PATTERN_SCORE: i32 = 100;

/// Classification of the pattern score at the last row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSignal {
    Bearish,
    Bullish,
    None,
}

impl PatternSignal {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s > 0 => PatternSignal::Bearish,
            s if s < 0 => PatternSignal::Bullish,
            _ => PatternSignal::None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PatternSignal::Bearish => "Two Crows (Bearish Reversal)",
            PatternSignal::Bullish => "Bullish Reversal Pattern Detected",
            PatternSignal::None => "No Pattern Detected",
        }
    }
}

fn average_body(candles: &[Candle]) -> f64 {
    if candles.is_empty() {
        return 0.0;
    }
    candles.iter().map(Candle::real_body).sum::<f64>() / candles.len() as f64
}

/// Two Crows ending at `index`: a long white candle, a black candle whose
/// body gaps up above it, then a black candle opening inside the second body
/// and closing inside the first. A match scores `-PATTERN_SCORE`, following
/// the TA-Lib `CDL2CROWS` convention, so `PatternSignal::from_score` labels it
/// as a bullish reversal. Returns `0` otherwise, including when there is not
/// enough history to judge the first body.
pub fn two_crows_at(candles: &[Candle], index: usize) -> i32 {
    if index < BODY_LONG_PERIOD + 2 || index >= candles.len() {
        return 0;
    }
    let first = &candles[index - 2];
    let second = &candles[index - 1];
    let third = &candles[index];

    let history = &candles[index - 2 - BODY_LONG_PERIOD..index - 2];
    let first_is_long = first.real_body() > average_body(history);

    let second_gaps_up = second.open.min(second.close) > first.open.max(first.close);

    let matched = first.is_white()
        && first_is_long
        && second.is_black()
        && second_gaps_up
        && third.is_black()
        && third.open < second.open
        && third.open > second.close
        && third.close > first.open
        && third.close < first.close;

    if matched { -PATTERN_SCORE } else { 0 }
}
