use crate::candle::CandleSeries;
use crate::insights::InsightReport;
use chrono::{DateTime, Utc};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(dt) => dt.format("%d-%m-%Y %H:%M:%S").to_string(),
        None => "Unknown Time".to_string(),
    }
}

/// Section headers end with a colon; everything else is a detail line.
fn is_header(line: &str) -> bool {
    line.ends_with(':') && !line.starts_with('-')
}

/// Builds the console summary: a title line plus a table of the report.
pub fn build(series: &CandleSeries, report: &InsightReport) -> String {
    let title = format!(
        "{} | {} candles | {} .. {} UTC",
        series.symbol,
        series.len(),
        format_timestamp(series.first_timestamp()),
        format_timestamp(series.last_timestamp())
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Insight").add_attribute(Attribute::Bold),
        ]);

    for (rank, line) in report.insights.iter().enumerate() {
        let cell = if is_header(line) {
            Cell::new(line).add_attribute(Attribute::Bold).fg(Color::Cyan)
        } else {
            Cell::new(line)
        };
        table.add_row(vec![
            Cell::new(rank + 1)
                .fg(Color::DarkGrey)
                .set_alignment(CellAlignment::Right),
            cell,
        ]);
    }
    for line in &report.recommendations {
        table.add_row(vec![
            Cell::new("*").fg(Color::DarkGrey).set_alignment(CellAlignment::Right),
            Cell::new(line).fg(Color::Green),
        ]);
    }

    format!("\n{}\n{}", title, table)
}

pub fn run(series: &CandleSeries, report: &InsightReport) {
    println!("{}", build(series, report));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_contains_every_line() {
        let report = InsightReport {
            insights: vec!["Price Trends:".to_string(), "- Support level: 1.0".to_string()],
            recommendations: vec!["Consider a bullish trade with high volatility.".to_string()],
        };

        let text = build(&CandleSeries::empty("BTCUSDT"), &report);

        assert!(text.contains("BTCUSDT | 0 candles | Unknown Time"));
        for line in report.lines() {
            assert!(text.contains(line), "missing {}", line);
        }
    }

    #[test]
    fn test_is_header() {
        assert!(is_header("Price Trends:"));
        assert!(!is_header("- Support level: 1.0"));
    }
}
