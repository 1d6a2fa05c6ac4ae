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

//! # Redeem Ledger
//!
//! This library manages a finite pool of top-up codes grouped by
//! denomination. Orders withdraw the oldest unredeemed codes, redeemed codes
//! are archived in an audit ledger, and a running due total is kept in step
//! with every order.
//!
//! ## Core Components
//!
//! - [`Engine`]: Service object owning the three stores and their locks
//! - [`InventoryStore`]: Codes still available, per denomination
//! - [`RedemptionEngine`]: FIFO selection of exactly N unredeemed codes
//! - [`LedgerStore`]: Archive of redeemed codes with per-denomination pricing
//! - [`PricingCatalog`]: Price changes mirrored to inventory and ledger
//! - [`DueAccumulator`]: Persisted running total of dues
//! - [`StoreError`]: Error types for store operations
//!
//! ## Example
//!
//! ```
//! use redeem_ledger::{Denomination, Engine, StoreConfig};
//! use rust_decimal_macros::dec;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let engine = Engine::new(&StoreConfig::in_dir(dir.path()));
//!
//! engine.upload_codes(Denomination(50), ["A", "B", "C"]).unwrap();
//! engine.set_price(Denomination(50), dec!(10)).unwrap();
//!
//! let receipt = engine.reserve_and_record(Denomination(50), 2).unwrap();
//! assert_eq!(receipt.codes, ["A", "B"]);
//! assert_eq!(engine.current_due().unwrap(), dec!(20));
//! ```
//!
//! ## Persistence
//!
//! Each store is one JSON file, written through a temporary file and an
//! atomic rename. A corrupted file is logged and read as empty.

mod base;
pub mod code;
pub mod config;
pub mod dues;
mod engine;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod pricing;
pub mod redemption;
mod storage;

pub use base::Denomination;
pub use code::{Code, CodeBook, Group};
pub use config::StoreConfig;
pub use dues::{DueAccumulator, DueTotal};
pub use engine::{Engine, Receipt};
pub use error::StoreError;
pub use inventory::{InventoryStore, MAX_PRICE, StockLine, UploadReport};
pub use ledger::{LedgerLine, LedgerStore, LedgerSummary};
pub use pricing::{PriceLine, PricingCatalog};
pub use redemption::{RedemptionEngine, Reservation};
