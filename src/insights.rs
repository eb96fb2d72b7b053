use crate::candle::CandleSeries;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::indicators::Indicators;
use tracing::{debug, info};

/// Pattern name the recommendation rules look for. The two-crows classifier
/// never yields it, so that rule cannot fire until a head-and-shoulders
/// detector exists.
pub const HEAD_AND_SHOULDERS: &str = "Head and Shoulders";

/// Ordered insight lines followed by any recommendations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsightReport {
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

impl InsightReport {
    /// Insights then recommendations, in report order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.insights
            .iter()
            .chain(self.recommendations.iter())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.insights.len() + self.recommendations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `{:?}` keeps a trailing `.0` on whole numbers (`16500.0`).
fn format_level(value: f64) -> String {
    format!("{:?}", value)
}

fn format_2dp(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "nan".to_string(),
    }
}

/// Recommendation rules, appended in a fixed order.
pub fn recommendations(
    indicators: &Indicators,
    pattern_label: &str,
    volatility_threshold: f64,
) -> Vec<String> {
    let mut out = Vec::new();
    let change = indicators.last_price_change();
    let volatility = indicators.last_volatility();

    if indicators.crossover {
        out.push("Consider a long position due to a short-term moving average crossover.".to_string());
    }
    if pattern_label == HEAD_AND_SHOULDERS {
        out.push("Be cautious as a head and shoulders pattern is detected.".to_string());
    }
    if let (Some(change), Some(volatility)) = (change, volatility) {
        if change > 0.0 && volatility > volatility_threshold {
            out.push("Consider a bullish trade with high volatility.".to_string());
        }
        if change < 0.0 && volatility > volatility_threshold {
            out.push("Consider a bearish trade with high volatility".to_string());
        }
    }
    out
}

/// Builds the report text from already computed indicators.
pub fn build_report(indicators: &Indicators, config: &AnalysisConfig) -> InsightReport {
    let pattern_label = indicators.pattern.label();

    let insights = vec![
        "Price Trends:".to_string(),
        format!(
            "- Long-term trend: Check for crossovers of {}-day moving average.",
            config.long_window
        ),
        format!(
            "- Short-term trend: Check for crossovers of {}-day moving average.",
            config.short_window
        ),
        format!("- Support level: {}", format_level(indicators.support)),
        format!("- Resistance level: {}", format_level(indicators.resistance)),
        "Price Patterns:".to_string(),
        format!("- Pattern Detected: {}", pattern_label),
        "Price Change and Volatility:".to_string(),
        format!(
            "- Price Change (Today): {}",
            format_2dp(indicators.last_price_change())
        ),
        format!(
            "- Volatility ({}-day): {}",
            config.volatility_window,
            format_2dp(indicators.last_volatility())
        ),
    ];

    InsightReport {
        insights,
        recommendations: recommendations(indicators, pattern_label, config.volatility_threshold),
    }
}

/// Computes every indicator for `series` and turns them into a report.
pub fn generate_insights(
    series: &CandleSeries,
    config: &AnalysisConfig,
) -> Result<(InsightReport, Indicators), AnalysisError> {
    let indicators = Indicators::compute(series, config)?;
    debug!(
        support = indicators.support,
        resistance = indicators.resistance,
        crossover = indicators.crossover,
        pattern = indicators.pattern.label(),
        "indicators computed"
    );

    let report = build_report(&indicators, config);
    info!(
        symbol = %series.symbol,
        insights = report.insights.len(),
        recommendations = report.recommendations.len(),
        "insights generated"
    );
    Ok((report, indicators))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternSignal;

    fn indicators(change: f64, volatility: f64, crossover: bool) -> Indicators {
        Indicators {
            long_ma: vec![None, Some(100.0)],
            short_ma: vec![None, Some(101.0)],
            support: 16500.0,
            resistance: 23919.9,
            price_change: vec![None, Some(change)],
            volatility: vec![None, Some(volatility)],
            pattern: PatternSignal::None,
            crossover,
        }
    }

    #[test]
    fn test_report_lines_in_fixed_order() {
        let report = build_report(&indicators(-12.346, 0.2, false), &AnalysisConfig::default());

        assert_eq!(
            report.insights,
            vec![
                "Price Trends:",
                "- Long-term trend: Check for crossovers of 200-day moving average.",
                "- Short-term trend: Check for crossovers of 20-day moving average.",
                "- Support level: 16500.0",
                "- Resistance level: 23919.9",
                "Price Patterns:",
                "- Pattern Detected: No Pattern Detected",
                "Price Change and Volatility:",
                "- Price Change (Today): -12.35",
                "- Volatility (20-day): 0.20",
            ]
        );
        assert!(report.recommendations.is_empty());
        assert_eq!(report.len(), 10);
    }

    #[test]
    fn test_crossover_and_bullish_volatility_recommendations() {
        let report = build_report(&indicators(5.0, 3.2, true), &AnalysisConfig::default());

        assert_eq!(
            report.recommendations,
            vec![
                "Consider a long position due to a short-term moving average crossover.",
                "Consider a bullish trade with high volatility.",
            ]
        );
        assert_eq!(
            report.lines().last(),
            Some("Consider a bullish trade with high volatility.")
        );
    }

    #[test]
    fn test_bearish_volatility_recommendation() {
        let recs = recommendations(&indicators(-5.0, 0.51, false), "No Pattern Detected", 0.5);
        assert_eq!(recs, vec!["Consider a bearish trade with high volatility"]);
    }

    #[test]
    fn test_low_volatility_gives_no_trade_recommendation() {
        let recs = recommendations(&indicators(5.0, 0.5, false), "No Pattern Detected", 0.5);
        assert!(recs.is_empty());
    }

    #[test]
    fn test_head_and_shoulders_rule_only_matches_its_label() {
        let ind = indicators(0.0, 0.0, false);

        for signal in [PatternSignal::Bearish, PatternSignal::Bullish, PatternSignal::None] {
            assert!(recommendations(&ind, signal.label(), 0.5).is_empty());
        }
        assert_eq!(
            recommendations(&ind, HEAD_AND_SHOULDERS, 0.5),
            vec!["Be cautious as a head and shoulders pattern is detected."]
        );
    }
}
