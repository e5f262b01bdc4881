//! Report rendering
//!
//! One row per comparison record, in scan order. Absent prices render as an
//! empty cell (table, CSV) or `null` (JSON), never as zero.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::Table;

use crate::core::{ComparisonRecord, ScanError, ScanResult};
use crate::scan::ScanReport;

const HEADERS: [&str; 7] = [
    "Ticker",
    "ExpirationDate",
    "StrikePrice",
    "Type",
    "ModelPrice",
    "MarketPrice",
    "Difference",
];

/// Output format for a finished scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => f.write_str("table"),
            OutputFormat::Csv => f.write_str("csv"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(ScanError::invalid_input(format!(
                "unknown output format '{}', expected table, csv or json",
                s
            ))),
        }
    }
}

fn price_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_default()
}

fn row(record: &ComparisonRecord) -> [String; 7] {
    [
        record.ticker.clone(),
        record.expiration.to_string(),
        format!("{:.2}", record.strike),
        record.option_type.to_string(),
        price_cell(record.model_price),
        price_cell(record.market_price),
        price_cell(record.difference()),
    ]
}

/// Records as a text table
pub fn to_table(records: &[ComparisonRecord]) -> String {
    let mut builder = Builder::default();
    builder.push_record(HEADERS);
    for record in records {
        builder.push_record(row(record));
    }

    let mut table = Table::from(builder);
    table.with(Style::modern());
    table.to_string()
}

/// Write records as CSV with a header row
pub fn write_csv<W: Write>(records: &[ComparisonRecord], writer: W) -> ScanResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADERS).map_err(csv_error)?;
    for record in records {
        wtr.write_record(row(record)).map_err(csv_error)?;
    }
    wtr.flush()?;
    Ok(())
}

fn csv_error(e: csv::Error) -> ScanError {
    ScanError::Serialization(e.to_string())
}

/// Render a report in the requested format
pub fn render<W: Write>(report: &ScanReport, format: OutputFormat, mut writer: W) -> ScanResult<()> {
    match format {
        OutputFormat::Table => {
            if report.records.is_empty() {
                writeln!(writer, "(no contracts priced)")?;
            } else {
                writeln!(writer, "{}", to_table(&report.records))?;
            }
            writeln!(
                writer,
                "As of {} | risk-free rate {:.4}% | {} priced, {} skipped",
                report.as_of,
                report.rate * 100.0,
                report.records.len(),
                report.skipped.len()
            )?;
            for item in &report.skipped {
                let expiration = item.expiration.map(|d| d.to_string()).unwrap_or_default();
                let strike = item.strike.map(|k| format!(" @ {:.2}", k)).unwrap_or_default();
                writeln!(
                    writer,
                    "  skipped {} {}{}: {}",
                    item.ticker, expiration, strike, item.reason
                )?;
            }
        }
        OutputFormat::Csv => write_csv(&report.records, writer)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, report)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OptionType;
    use crate::scan::SkippedItem;
    use chrono::NaiveDate;

    fn report() -> ScanReport {
        let expiration = NaiveDate::from_ymd_opt(2026, 12, 18).unwrap();
        ScanReport {
            as_of: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            rate: 0.041,
            records: vec![
                ComparisonRecord {
                    ticker: "AAPL".into(),
                    expiration,
                    strike: 220.0,
                    option_type: OptionType::Call,
                    model_price: Some(14.25),
                    market_price: Some(14.5),
                },
                ComparisonRecord {
                    ticker: "AAPL".into(),
                    expiration,
                    strike: 230.0,
                    option_type: OptionType::Call,
                    model_price: Some(8.1),
                    market_price: None,
                },
            ],
            skipped: vec![SkippedItem {
                ticker: "MSFT".into(),
                expiration: Some(expiration),
                strike: None,
                reason: "no option chain".into(),
            }],
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_csv_leaves_missing_price_empty() {
        let mut out = Vec::new();
        write_csv(&report().records, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Ticker,ExpirationDate,StrikePrice,Type,ModelPrice,MarketPrice,Difference"
        );
        assert_eq!(lines[1], "AAPL,2026-12-18,220.00,call,14.2500,14.5000,0.2500");
        assert_eq!(lines[2], "AAPL,2026-12-18,230.00,call,8.1000,,");
    }

    #[test]
    fn test_json_uses_null() {
        let mut out = Vec::new();
        render(&report(), OutputFormat::Json, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert!(value["records"][1]["market_price"].is_null());
        assert_eq!(value["records"][0]["market_price"], 14.5);
        assert_eq!(value["skipped"][0]["ticker"], "MSFT");
    }

    #[test]
    fn test_table_lists_rows_and_skips() {
        let mut out = Vec::new();
        render(&report(), OutputFormat::Table, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("ExpirationDate"));
        assert!(text.contains("8.1000"));
        assert!(text.contains("2 priced, 1 skipped"));
        assert!(text.contains("skipped MSFT 2026-12-18: no option chain"));
    }
}
