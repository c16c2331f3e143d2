use crate::engine::DashboardRow;
use crate::expiry::format_expiry;
use crate::model::OptionEntry;
use anyhow::Result;
use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Table};
use csv::Writer;
use rust_decimal::Decimal;
use std::fs::File;
use std::path::Path;
use tracing::info;

pub fn print_dashboard(rows: &[DashboardRow]) -> Result<()> {
    if rows.is_empty() {
        println!("no tracked tickers");
        return Ok(());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Ticker",
        "Spot",
        "Chg %",
        "Strike",
        "Expiry",
        "Delta %",
        "Bid/Ask/Last",
        "Earlier",
        "Future",
        "Alerts",
        "Sent",
    ]);

    for row in rows {
        let p = &row.position;
        let sent = if row.sent_levels.is_empty() {
            "-".to_string()
        } else {
            row.sent_levels
                .iter()
                .map(|level| level.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        table.add_row(vec![
            Cell::new(p.ticker.to_string()),
            Cell::new(format_decimal(p.spot)),
            Cell::new(format_decimal(p.change_percent)),
            Cell::new(p.strike.normalize().to_string()),
            Cell::new(format_expiry(p.expiry)),
            Cell::new(
                row.delta
                    .map(format_decimal)
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(format!(
                "{}/{}/{}",
                format_decimal(p.current_bid),
                format_decimal(p.current_ask),
                format_decimal(p.current_last_trade_price)
            )),
            Cell::new(describe_entries(&p.earlier)),
            Cell::new(describe_entries(&p.future)),
            Cell::new(if row.alerts_enabled { "on" } else { "off" }),
            Cell::new(sent),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub fn export_csv<P: AsRef<Path>>(rows: &[DashboardRow], path: P) -> Result<()> {
    let mut writer = Writer::from_writer(File::create(path)?);
    writer.write_record([
        "ticker",
        "spot",
        "change_percent",
        "strike",
        "expiry",
        "delta",
        "current_bid",
        "current_ask",
        "current_last",
        "earlier",
        "future",
        "alerts_enabled",
    ])?;
    for row in rows {
        let p = &row.position;
        writer.write_record([
            p.ticker.to_string(),
            p.spot.normalize().to_string(),
            p.change_percent.normalize().to_string(),
            p.strike.normalize().to_string(),
            format_expiry(p.expiry),
            row.delta
                .map(|d| d.round_dp(4).normalize().to_string())
                .unwrap_or_default(),
            p.current_bid.normalize().to_string(),
            p.current_ask.normalize().to_string(),
            p.current_last_trade_price.normalize().to_string(),
            p.earlier
                .iter()
                .map(|e| e.label.clone())
                .collect::<Vec<_>>()
                .join("|"),
            p.future
                .iter()
                .map(|e| e.label.clone())
                .collect::<Vec<_>>()
                .join("|"),
            row.alerts_enabled.to_string(),
        ])?;
    }
    writer.flush()?;
    info!(target: "export.csv", rows = rows.len(), "wrote dashboard to disk");
    Ok(())
}

fn describe_entries(entries: &[OptionEntry]) -> String {
    if entries.is_empty() {
        return "-".to_string();
    }
    entries
        .iter()
        .map(|entry| {
            if entry.is_sentinel() {
                entry.label.clone()
            } else {
                format!(
                    "{} {}/{}",
                    entry.label,
                    format_decimal(entry.bid),
                    format_decimal(entry.last_trade_price)
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_decimal(value: Decimal) -> String {
    if !value.is_zero() && value.abs() < Decimal::new(1, 2) {
        format!("{:.4}", value)
    } else {
        format!("{:.2}", value)
    }
}
