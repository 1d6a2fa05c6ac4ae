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

//! Running total of dues.
//!
//! A single persisted scalar, `{ "total_due": <number> }`, increased by
//! `price × count` for every committed reservation and reset to zero when
//! the ledger is cleared.

use crate::base::Denomination;
use crate::code;
use crate::error::StoreError;
use crate::inventory::InventoryStore;
use crate::storage::JsonFile;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Persisted due document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueTotal {
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision")]
    pub total_due: Decimal,
}

#[derive(Debug)]
pub struct DueAccumulator {
    file: JsonFile<DueTotal>,
    inventory: Arc<InventoryStore>,
}

impl DueAccumulator {
    pub fn new(path: impl Into<PathBuf>, inventory: Arc<InventoryStore>) -> Self {
        Self {
            file: JsonFile::new(path),
            inventory,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Adds `price × count` for `denomination`, using the group price held in
    /// the inventory. Returns the amount added.
    ///
    /// The price lives on the group, which outlives its codes, so this may run
    /// after the reservation emptied the group.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] - The inventory has no group for the denomination.
    /// - [`StoreError::Overflow`] - The amount or the new total does not fit;
    ///   the total is left unchanged.
    /// - [`StoreError::Io`] - The total could not be read or written.
    pub fn record_due(
        &self,
        denomination: Denomination,
        count: usize,
    ) -> Result<Decimal, StoreError> {
        let price = self
            .inventory
            .price_of(denomination)?
            .ok_or(StoreError::NotFound(denomination))?;
        let amount = code::line_total(denomination, price, count)?;

        let total = self.file.update(|due| {
            due.total_due = due
                .total_due
                .checked_add(amount)
                .ok_or(StoreError::Overflow(denomination))?;
            Ok(due.total_due)
        })?;

        info!(%denomination, count, %price, %amount, %total, "Recorded due");
        Ok(amount)
    }

    /// Subtracts `amount`, flooring at zero. Returns the new total.
    pub fn deduct(&self, amount: Decimal) -> Result<Decimal, StoreError> {
        self.file.update(|due| {
            due.total_due = (due.total_due - amount).max(Decimal::ZERO);
            Ok(due.total_due)
        })
    }

    pub fn reset(&self) -> Result<(), StoreError> {
        self.file.save(&DueTotal::default())?;
        info!("Reset total due");
        Ok(())
    }

    pub fn current(&self) -> Result<Decimal, StoreError> {
        Ok(self.file.load()?.total_due)
    }
}
