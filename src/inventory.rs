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

//! Inventory of codes still available for redemption.
//!
//! The inventory is the single source of truth for what can be handed out.
//! Groups are created lazily on the first upload for a denomination and are
//! never removed, so the group price stays readable after the last code of a
//! tier has been redeemed.

use crate::base::Denomination;
use crate::code::{Code, CodeBook, Group};
use crate::error::StoreError;
use crate::storage::JsonFile;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Largest unit price accepted by [`InventoryStore::set_price`].
pub const MAX_PRICE: Decimal = dec!(1000000000000);

/// Outcome of an upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub added: usize,
    /// Codes skipped because the group (or the ledger) already held them,
    /// in input order.
    pub duplicates: Vec<String>,
}

/// One row of the stock report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLine {
    pub denomination: Denomination,
    pub available: usize,
    pub price: Decimal,
}

#[derive(Debug)]
pub struct InventoryStore {
    file: JsonFile<CodeBook>,
}

impl InventoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
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

    /// Adds a batch of codes to the group for `denomination`.
    ///
    /// Each code is trimmed; blank entries are ignored and codes already in
    /// the group (or repeated within the batch) are reported as duplicates.
    /// The rest are appended in input order as unredeemed.
    pub fn add_codes<I, S>(
        &self,
        denomination: Denomination,
        raw_codes: I,
    ) -> Result<UploadReport, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_codes_excluding(denomination, raw_codes, &HashSet::new())
    }

    /// Like [`add_codes`], but also reports codes found in `archived` as
    /// duplicates.
    ///
    /// [`add_codes`]: InventoryStore::add_codes
    pub(crate) fn add_codes_excluding<I, S>(
        &self,
        denomination: Denomination,
        raw_codes: I,
        archived: &HashSet<String>,
    ) -> Result<UploadReport, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let report = self.file.update(|book| {
            let group = book.group_or_insert(denomination, Decimal::ZERO);
            let mut existing: HashSet<String> =
                group.codes.iter().map(|code| code.code.clone()).collect();
            let mut report = UploadReport::default();

            for raw in raw_codes {
                let code = raw.as_ref().trim();
                if code.is_empty() {
                    continue;
                }
                if archived.contains(code) {
                    warn!(%denomination, code, "Code already redeemed");
                    report.duplicates.push(code.to_string());
                    continue;
                }
                if !existing.insert(code.to_string()) {
                    warn!(%denomination, code, "Duplicate code detected");
                    report.duplicates.push(code.to_string());
                    continue;
                }
                group.codes.push(Code::new(code));
                report.added += 1;
            }

            Ok(report)
        })?;

        info!(
            %denomination,
            added = report.added,
            duplicates = report.duplicates.len(),
            "Added codes"
        );
        Ok(report)
    }

    /// Sets the unit price of an existing group.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidPrice`] - Price is negative or above [`MAX_PRICE`].
    /// - [`StoreError::NotFound`] - No group exists for the denomination.
    pub fn set_price(&self, denomination: Denomination, price: Decimal) -> Result<(), StoreError> {
        if price < Decimal::ZERO || price > MAX_PRICE {
            return Err(StoreError::InvalidPrice(price));
        }

        self.file.update(|book| {
            let group = book
                .group_mut(denomination)
                .ok_or(StoreError::NotFound(denomination))?;
            group.price = price;
            Ok(())
        })?;

        info!(%denomination, %price, "Set inventory price");
        Ok(())
    }

    /// Current unit price of `denomination`, `None` if no group exists.
    pub fn price_of(&self, denomination: Denomination) -> Result<Option<Decimal>, StoreError> {
        Ok(self.load()?.group(denomination).map(|group| group.price))
    }

    /// Available count and price per denomination, in stored order.
    pub fn stock(&self) -> Result<Vec<StockLine>, StoreError> {
        let book = self.load()?;
        Ok(book
            .groups()
            .map(|group| StockLine {
                denomination: group.amount,
                available: group.available(),
                price: group.price,
            })
            .collect())
    }

    pub(crate) fn update<R>(
        &self,
        f: impl FnOnce(&mut CodeBook) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        self.file.update(f)
    }

    /// Puts codes back at the front of their group, ahead of any code
    /// uploaded since they were taken, keeping their original order.
    pub(crate) fn reinstate(
        &self,
        denomination: Denomination,
        price: Decimal,
        codes: Vec<Code>,
    ) -> Result<(), StoreError> {
        self.file.update(|book| {
            let group = book.group_or_insert(denomination, price);
            group.codes.splice(0..0, codes);
            Ok(())
        })
    }

    /// Removes every code flagged as redeemed, returning them grouped by
    /// denomination together with the group price.
    pub(crate) fn drain_redeemed(&self) -> Result<Vec<Group>, StoreError> {
        self.file.update(|book| {
            let mut drained = Vec::new();
            for group in &mut book.codes {
                let (used, live): (Vec<Code>, Vec<Code>) =
                    group.codes.drain(..).partition(|code| code.redeemed);
                group.codes = live;
                if !used.is_empty() {
                    drained.push(Group {
                        amount: group.amount,
                        price: group.price,
                        codes: used,
                    });
                }
            }
            Ok(drained)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn store() -> (InventoryStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = InventoryStore::new(dir.path().join("codes.json"));
        (store, dir)
    }

    #[test]
    fn add_codes_trims_and_keeps_order() {
        let (store, _dir) = store();

        let report = store
            .add_codes(Denomination(50), ["  A ", "B", "\tC\n"])
            .unwrap();

        assert_eq!(report.added, 3);
        assert!(report.duplicates.is_empty());
        let book = store.load().unwrap();
        let codes: Vec<&str> = book
            .group(Denomination(50))
            .unwrap()
            .codes
            .iter()
            .map(Code::as_str)
            .collect();
        assert_eq!(codes, ["A", "B", "C"]);
    }

    #[test]
    fn add_codes_reports_duplicates_in_batch_and_store() {
        let (store, _dir) = store();
        store.add_codes(Denomination(50), ["A"]).unwrap();

        let report = store
            .add_codes(Denomination(50), ["A", "B", "B ", ""])
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.duplicates, ["A", "B"]);
        assert_eq!(store.stock().unwrap()[0].available, 2);
    }

    #[test]
    fn same_code_allowed_in_different_denominations() {
        let (store, _dir) = store();
        store.add_codes(Denomination(50), ["A"]).unwrap();

        let report = store.add_codes(Denomination(60), ["A"]).unwrap();

        assert_eq!(report.added, 1);
    }

    #[test]
    fn new_group_has_zero_price() {
        let (store, _dir) = store();
        store.add_codes(Denomination(50), ["A"]).unwrap();

        assert_eq!(store.price_of(Denomination(50)).unwrap(), Some(Decimal::ZERO));
        assert_eq!(store.price_of(Denomination(60)).unwrap(), None);
    }

    #[test]
    fn set_price_requires_group() {
        let (store, _dir) = store();

        let result = store.set_price(Denomination(50), dec!(10));

        assert_eq!(result, Err(StoreError::NotFound(Denomination(50))));
    }

    #[test]
    fn set_price_rejects_negative() {
        let (store, _dir) = store();
        store.add_codes(Denomination(50), ["A"]).unwrap();

        let result = store.set_price(Denomination(50), dec!(-1));

        assert_eq!(result, Err(StoreError::InvalidPrice(dec!(-1))));
        assert_eq!(store.price_of(Denomination(50)).unwrap(), Some(Decimal::ZERO));
    }

    #[test]
    fn set_price_bounds() {
        let (store, _dir) = store();
        store.add_codes(Denomination(50), ["A"]).unwrap();

        store.set_price(Denomination(50), MAX_PRICE).unwrap();
        assert_eq!(store.price_of(Denomination(50)).unwrap(), Some(MAX_PRICE));

        let too_high = MAX_PRICE + dec!(0.01);
        assert_eq!(
            store.set_price(Denomination(50), too_high),
            Err(StoreError::InvalidPrice(too_high))
        );
        assert_eq!(
            store.set_price(Denomination(50), Decimal::MAX),
            Err(StoreError::InvalidPrice(Decimal::MAX))
        );
        assert_eq!(store.stock().unwrap()[0].available, 1);
    }

    #[test]
    fn high_precision_price_is_stored_exactly() {
        let (store, _dir) = store();
        store.add_codes(Denomination(50), ["A"]).unwrap();

        store.set_price(Denomination(50), dec!(123456789012.3456789012345)).unwrap();

        let reopened = InventoryStore::new(store.path());
        assert_eq!(
            reopened.price_of(Denomination(50)).unwrap(),
            Some(dec!(123456789012.3456789012345))
        );
    }

    #[test]
    fn archived_codes_are_reported_as_duplicates() {
        let (store, _dir) = store();
        let archived: HashSet<String> = ["A".to_string()].into();

        let report = store
            .add_codes_excluding(Denomination(50), ["A", "B"], &archived)
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.duplicates, ["A"]);
        assert_eq!(store.stock().unwrap()[0].available, 1);
    }

    #[test]
    fn stock_lists_groups_in_stored_order() {
        let (store, _dir) = store();
        store.add_codes(Denomination(325), ["X"]).unwrap();
        store.add_codes(Denomination(60), ["A", "B"]).unwrap();
        store.set_price(Denomination(60), dec!(85)).unwrap();

        let stock = store.stock().unwrap();

        assert_eq!(
            stock,
            vec![
                StockLine {
                    denomination: Denomination(325),
                    available: 1,
                    price: Decimal::ZERO,
                },
                StockLine {
                    denomination: Denomination(60),
                    available: 2,
                    price: dec!(85),
                },
            ]
        );
    }

    #[test]
    fn reinstate_puts_codes_in_front() {
        let (store, _dir) = store();
        store.add_codes(Denomination(50), ["C"]).unwrap();

        store
            .reinstate(Denomination(50), Decimal::ZERO, vec![Code::new("A"), Code::new("B")])
            .unwrap();

        let book = store.load().unwrap();
        let codes: Vec<&str> = book
            .group(Denomination(50))
            .unwrap()
            .codes
            .iter()
            .map(Code::as_str)
            .collect();
        assert_eq!(codes, ["A", "B", "C"]);
    }

    #[test]
    fn drain_redeemed_keeps_live_codes() {
        let (store, _dir) = store();
        store.add_codes(Denomination(50), ["A", "B", "C"]).unwrap();
        store.set_price(Denomination(50), dec!(10)).unwrap();
        store
            .update(|book| {
                let group = book.group_mut(Denomination(50)).unwrap();
                group.codes[0].redeem();
                group.codes[2].redeem();
                Ok(())
            })
            .unwrap();

        let drained = store.drain_redeemed().unwrap();

        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].price, dec!(10));
        assert_eq!(drained[0].codes.len(), 2);
        assert!(drained[0].codes.iter().all(|code| code.redeemed));
        assert_eq!(store.stock().unwrap()[0].available, 1);
        assert!(store.drain_redeemed().unwrap().is_empty());
    }
}
