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

//! Archive of redeemed codes.
//!
//! The ledger has the same shape as the inventory but only ever holds codes
//! that were redeemed and migrated out of it. A ledger group's price is
//! seeded from the inventory on first migration and re-synchronized by
//! price changes afterwards.

use crate::base::Denomination;
use crate::code::{Code, CodeBook, Group};
use crate::error::StoreError;
use crate::inventory::InventoryStore;
use crate::storage::JsonFile;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Audit line for one denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerLine {
    pub denomination: Denomination,
    pub count: usize,
    pub price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub lines: Vec<LedgerLine>,
    pub grand_total: Decimal,
}

impl LedgerSummary {
    pub fn line(&self, denomination: Denomination) -> Option<&LedgerLine> {
        self.lines.iter().find(|line| line.denomination == denomination)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug)]
pub struct LedgerStore {
    file: JsonFile<CodeBook>,
    inventory: Arc<InventoryStore>,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>, inventory: Arc<InventoryStore>) -> Self {
        Self {
            file: JsonFile::new(path),
            inventory,
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn load(&self) -> Result<CodeBook, StoreError> {
        self.file.load()
    }

    pub fn save(&self, book: &CodeBook) -> Result<(), StoreError> {
        self.file.save(book)
    }

    /// Appends redeemed codes to the group for `denomination`.
    ///
    /// A missing group is created with the current inventory price of the
    /// denomination (zero if the inventory has no such group).
    pub fn record_redemption(
        &self,
        denomination: Denomination,
        codes: &[Code],
    ) -> Result<(), StoreError> {
        debug_assert!(codes.iter().all(|code| code.redeemed));
        let seed_price = self
            .inventory
            .price_of(denomination)?
            .unwrap_or(Decimal::ZERO);

        self.file.update(|book| {
            book.group_or_insert(denomination, seed_price)
                .codes
                .extend_from_slice(codes);
            Ok(())
        })?;

        info!(%denomination, count = codes.len(), "Moved used codes to ledger");
        Ok(())
    }

    /// Removes `codes` from the group for `denomination`, dropping the group
    /// if nothing is left in it. Undoes a [`record_redemption`] whose
    /// surrounding operation failed.
    ///
    /// [`record_redemption`]: LedgerStore::record_redemption
    pub(crate) fn retract(
        &self,
        denomination: Denomination,
        codes: &[Code],
    ) -> Result<(), StoreError> {
        let retracted: HashSet<&str> = codes.iter().map(Code::as_str).collect();
        self.file.update(|book| {
            if let Some(group) = book.group_mut(denomination) {
                group
                    .codes
                    .retain(|code| !retracted.contains(code.as_str()));
                if group.codes.is_empty() {
                    book.remove_group(denomination);
                }
            }
            Ok(())
        })
    }

    /// Code strings archived for `denomination`.
    pub fn archived_codes(&self, denomination: Denomination) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .load()?
            .group(denomination)
            .map(|group| group.codes.iter().map(|code| code.code.clone()).collect())
            .unwrap_or_default())
    }

    /// Empties the ledger, or only the group for `denomination` when given.
    ///
    /// Returns the subtotal of what was removed, saturating at
    /// `Decimal::MAX`, so a clear never fails on arithmetic.
    pub fn clear(&self, denomination: Option<Denomination>) -> Result<Decimal, StoreError> {
        let removed = self.file.update(|book| {
            let removed = match denomination {
                Some(denomination) => book
                    .remove_group(denomination)
                    .map(|group| saturating_subtotal(&group))
                    .unwrap_or(Decimal::ZERO),
                None => {
                    let total = book
                        .groups()
                        .fold(Decimal::ZERO, |acc, group| {
                            acc.saturating_add(saturating_subtotal(group))
                        });
                    book.codes.clear();
                    total
                }
            };
            Ok(removed)
        })?;

        match denomination {
            Some(denomination) => info!(%denomination, %removed, "Cleared ledger group"),
            None => info!(%removed, "Cleared all codes from ledger"),
        }
        Ok(removed)
    }

    /// Count, price and subtotal per denomination plus the grand total.
    ///
    /// # Errors
    ///
    /// [`StoreError::Overflow`] if a subtotal or the grand total does not fit.
    pub fn summarize(&self) -> Result<LedgerSummary, StoreError> {
        let book = self.load()?;
        let lines = book
            .groups()
            .map(|group| {
                Ok(LedgerLine {
                    denomination: group.amount,
                    count: group.codes.len(),
                    price: group.price,
                    subtotal: group.subtotal()?,
                })
            })
            .collect::<Result<Vec<LedgerLine>, StoreError>>()?;
        let grand_total = lines.iter().try_fold(Decimal::ZERO, |acc, line| {
            acc.checked_add(line.subtotal)
                .ok_or(StoreError::Overflow(line.denomination))
        })?;

        Ok(LedgerSummary { lines, grand_total })
    }

    /// Updates the price of the ledger group for `denomination`.
    ///
    /// Returns `false` without writing if the ledger has no such group.
    pub fn set_price_if_present(
        &self,
        denomination: Denomination,
        price: Decimal,
    ) -> Result<bool, StoreError> {
        let present = self.load()?.group(denomination).is_some();
        if !present {
            return Ok(false);
        }

        self.file.update(|book| {
            if let Some(group) = book.group_mut(denomination) {
                group.price = price;
            }
            Ok(())
        })?;

        info!(%denomination, %price, "Set ledger price");
        Ok(true)
    }
}

fn saturating_subtotal(group: &Group) -> Decimal {
    group.price.saturating_mul(Decimal::from(group.codes.len()))
}
