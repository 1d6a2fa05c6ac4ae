// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::{Parser, Subcommand};
use csv::Writer;
use redeem_ledger::{Denomination, Engine, LedgerSummary, StockLine, StoreConfig, StoreError};
use regex::Regex;
use rust_decimal::Decimal;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::LazyLock;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Redeem Ledger - Manage a pool of top-up codes
///
/// Keeps the available codes, the archive of handed-out codes and the running
/// due total in `codes.json`, `used.json` and `due.json`.
#[derive(Parser, Debug)]
#[command(name = "redeem-ledger")]
#[command(about = "Manage top-up code stock, orders and dues", long_about = None)]
struct Args {
    /// Directory holding the store files
    ///
    /// Overrides REDEEM_DATA_DIR and the per-file REDEEM_*_FILE variables.
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Available codes per denomination and the worth of the stock
    Stock,
    /// Prices of all priced denominations
    Rate,
    /// Extract codes from FILE (or stdin) and add them to AMOUNT
    Upload {
        #[arg(value_parser = parse_amount)]
        amount: Denomination,
        file: Option<PathBuf>,
    },
    /// Hand out COUNT codes of AMOUNT
    Order {
        #[arg(value_parser = parse_amount)]
        amount: Denomination,
        #[arg(default_value_t = 1)]
        count: usize,
    },
    /// Set the unit price of AMOUNT
    SetPrice {
        #[arg(value_parser = parse_amount)]
        amount: Denomination,
        price: Decimal,
    },
    /// Handed-out codes per denomination and the total due
    Check,
    /// Empty the ledger and reset the total due
    Clear {
        /// Only clear this denomination, deducting its subtotal from the due
        #[arg(long, value_parser = parse_amount)]
        amount: Option<Denomination>,
    },
    /// Move codes flagged as redeemed out of the inventory into the ledger
    Sweep,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("no valid codes found")]
    NoCodes,
}

fn main() {
    init_tracing();
    let args = Args::parse();

    let config = match &args.data_dir {
        Some(dir) => StoreConfig::in_dir(dir),
        None => StoreConfig::from_env(),
    };
    let engine = Engine::new(&config);

    if let Err(e) = run(&engine, args.command, io::stdin().lock(), io::stdout().lock()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Logs go to stderr so stdout stays a clean report.
///
/// `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Accepts `50` as well as the legacy `50uc` spelling.
fn parse_amount(raw: &str) -> Result<Denomination, String> {
    let digits = raw
        .strip_suffix("uc")
        .or_else(|| raw.strip_suffix("UC"))
        .unwrap_or(raw);
    digits
        .parse::<u32>()
        .map(Denomination)
        .map_err(|_| format!("invalid amount '{}', expected a number such as 50 or 50uc", raw))
}

static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z]{4}-[a-zA-Z]-S-\d{8} \d{4}-\d{4}-\d{4}-\d{4}")
        .expect("code pattern is a valid regex")
});

/// Pulls well-formed code tokens out of free text, in order of appearance.
fn extract_codes(text: &str) -> Vec<String> {
    CODE_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn run<R: Read, W: Write>(
    engine: &Engine,
    command: Command,
    mut stdin: R,
    mut out: W,
) -> Result<(), CliError> {
    match command {
        Command::Stock => {
            let stock = engine.list_stock()?;
            let worth = engine.stock_worth()?;
            write_stock(&stock, worth, out)?;
        }
        Command::Rate => {
            let mut wtr = Writer::from_writer(out);
            for line in engine.price_list()? {
                wtr.serialize(&line)?;
            }
            wtr.flush()?;
        }
        Command::Upload { amount, file } => {
            let text = match file {
                Some(path) => fs::read_to_string(path)?,
                None => {
                    let mut text = String::new();
                    stdin.read_to_string(&mut text)?;
                    text
                }
            };
            let codes = extract_codes(&text);
            if codes.is_empty() {
                return Err(CliError::NoCodes);
            }

            let report = engine.upload_codes(amount, &codes)?;
            writeln!(out, "Added {} codes for {}", report.added, amount)?;
            for duplicate in &report.duplicates {
                writeln!(out, "Duplicate skipped: {}", duplicate)?;
            }
        }
        Command::Order { amount, count } => {
            let receipt = engine.reserve_and_record(amount, count)?;
            for code in &receipt.codes {
                writeln!(out, "{}", code)?;
            }
            writeln!(out)?;
            writeln!(
                out,
                "{} x {} @ {} = {}",
                amount,
                receipt.codes.len(),
                receipt.unit_price,
                receipt.subtotal
            )?;
            writeln!(out, "Total due: {}", engine.current_due()?)?;
        }
        Command::SetPrice { amount, price } => {
            engine.set_price(amount, price)?;
            writeln!(out, "Price for {} set to {}", amount, price)?;
        }
        Command::Check => {
            let summary = engine.ledger_summary()?;
            write_ledger(&summary, out)?;
        }
        Command::Clear { amount: None } => {
            engine.clear_ledger()?;
            writeln!(out, "Cleared all used codes")?;
        }
        Command::Clear {
            amount: Some(amount),
        } => {
            let removed = engine.clear_ledger_for(amount)?;
            writeln!(out, "Cleared used codes for {} ({} deducted)", amount, removed)?;
        }
        Command::Sweep => {
            let moved = engine.sweep_redeemed()?;
            writeln!(out, "Moved {} redeemed codes to the ledger", moved)?;
        }
    }
    Ok(())
}

/// Writes the stock table followed by a `worth` row.
///
/// # CSV Format
///
/// Columns: `denomination, available, price`
///
/// ```csv
/// denomination,available,price
/// 60,12,85
/// worth,,1020
/// ```
fn write_stock<W: Write>(stock: &[StockLine], worth: Decimal, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for line in stock {
        wtr.serialize(line)?;
    }
    if stock.is_empty() {
        wtr.write_record(["denomination", "available", "price"])?;
    }
    wtr.write_record(["worth", "", &worth.to_string()])?;

    wtr.flush()?;
    Ok(())
}

/// Writes the ledger summary followed by a `total` row.
///
/// # CSV Format
///
/// Columns: `denomination, count, price, subtotal`
fn write_ledger<W: Write>(summary: &LedgerSummary, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for line in &summary.lines {
        wtr.serialize(line)?;
    }
    if summary.is_empty() {
        wtr.write_record(["denomination", "count", "price", "subtotal"])?;
    }
    wtr.write_record(["total", "", "", &summary.grand_total.to_string()])?;

    wtr.flush()?;
    Ok(())
}
