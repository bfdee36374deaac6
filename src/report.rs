use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, Utc};
use log::info;
use rust_decimal::{prelude::FromPrimitive, Decimal, RoundingStrategy};
use tabled::{builder::Builder, settings::Style};

use crate::datasources::StatusBoard;
use crate::refresh::RefreshReport;

const GOLD_HEADER: &str = "Gold Price (USD)";
const CRYPTO_HEADER: &str = "Bitcoin Price (USD)";

/// `$1,234.56`; falls back to plain formatting for values Decimal cannot hold.
pub fn format_usd(price: f64) -> String {
    let rounded = match Decimal::from_f64(price) {
        Some(d) => format!(
            "{:.2}",
            d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
        ),
        None => format!("{:.2}", price),
    };
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", int_part),
    };
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}${}.{}", sign, grouped, frac_part)
}

pub fn render_table(report: &RefreshReport) -> String {
    let mut builder = Builder::default();
    builder.push_record([
        "Date".to_owned(),
        GOLD_HEADER.to_owned(),
        CRYPTO_HEADER.to_owned(),
        report.mode.label().to_owned(),
    ]);
    for row in &report.rows {
        builder.push_record([
            row.date.to_string(),
            format_usd(row.gold_price),
            format_usd(row.crypto_price),
            format!("{:.6}", row.ratio),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    format!(
        "{}\nLast refreshed: {}",
        table,
        report
            .refreshed_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    )
}

pub fn render_statuses(statuses: &StatusBoard) -> String {
    statuses
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn default_export_name(days: u32, at: DateTime<Utc>) -> PathBuf {
    PathBuf::from(format!(
        "price_ratio_{}days_{}.csv",
        days,
        at.with_timezone(&Local).format("%Y%m%d_%H%M%S")
    ))
}

/// Writes the rows as CSV with raw numeric cells. Refuses an empty report.
pub fn export_csv(report: &RefreshReport, path: &Path) -> Result<()> {
    if report.rows.is_empty() {
        return Err(anyhow!("No data to export!"));
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["Date", GOLD_HEADER, CRYPTO_HEADER, report.mode.label()])?;
    for row in &report.rows {
        writer.write_record([
            row.date.to_string(),
            row.gold_price.to_string(),
            row.crypto_price.to_string(),
            row.ratio.to_string(),
        ])?;
    }
    writer.flush()?;
    info!("Exported {} rows to {}", report.rows.len(), path.display());
    Ok(())
}
