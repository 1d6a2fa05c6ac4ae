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

//! Per-denomination pricing mirrored across inventory and ledger.

use crate::base::Denomination;
use crate::error::StoreError;
use crate::inventory::InventoryStore;
use crate::ledger::LedgerStore;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// One row of the price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceLine {
    pub denomination: Denomination,
    pub price: Decimal,
}

/// Keeps the inventory and ledger copies of a group price in step.
#[derive(Debug)]
pub struct PricingCatalog {
    inventory: Arc<InventoryStore>,
    ledger: Arc<LedgerStore>,
}

impl PricingCatalog {
    pub fn new(inventory: Arc<InventoryStore>, ledger: Arc<LedgerStore>) -> Self {
        Self { inventory, ledger }
    }

    /// Sets the price of `denomination` in the inventory, then in the ledger
    /// if the ledger holds a group for it.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidPrice`] - Price is negative.
    /// - [`StoreError::NotFound`] - The inventory has no group for the denomination.
    /// - [`StoreError::PartialPropagation`] - The inventory was updated but the
    ///   ledger copy could not be; retrying the same call is safe.
    pub fn set_price(&self, denomination: Denomination, price: Decimal) -> Result<(), StoreError> {
        self.inventory.set_price(denomination, price)?;

        if let Err(e) = self.ledger.set_price_if_present(denomination, price) {
            error!(%denomination, %price, error = %e, "Ledger price not updated");
            return Err(StoreError::PartialPropagation {
                denomination,
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    /// Priced denominations, first occurrence only, in stored order.
    /// Groups without a price are left out.
    pub fn price_list(&self) -> Result<Vec<PriceLine>, StoreError> {
        let book = self.inventory.load()?;
        let mut lines: Vec<PriceLine> = Vec::new();
        for group in book.groups() {
            if group.price <= Decimal::ZERO
                || lines.iter().any(|line| line.denomination == group.amount)
            {
                continue;
            }
            lines.push(PriceLine {
                denomination: group.amount,
                price: group.price,
            });
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Code, Group};
    use rust_decimal_macros::dec;
    use std::fs;
    use tempfile::TempDir;

    fn catalog() -> (PricingCatalog, Arc<InventoryStore>, Arc<LedgerStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let inventory = Arc::new(InventoryStore::new(dir.path().join("codes.json")));
        let ledger = Arc::new(LedgerStore::new(
            dir.path().join("used.json"),
            Arc::clone(&inventory),
        ));
        let catalog = PricingCatalog::new(Arc::clone(&inventory), Arc::clone(&ledger));
        (catalog, inventory, ledger, dir)
    }

    fn archived(code: &str) -> Vec<Code> {
        vec![Code {
            code: code.to_string(),
            redeemed: true,
        }]
    }

    #[test]
    fn set_price_updates_both_copies() {
        let (catalog, inventory, ledger, _dir) = catalog();
        inventory.add_codes(Denomination(50), ["B"]).unwrap();
        ledger.record_redemption(Denomination(50), &archived("A")).unwrap();

        catalog.set_price(Denomination(50), dec!(15)).unwrap();

        assert_eq!(inventory.price_of(Denomination(50)).unwrap(), Some(dec!(15)));
        assert_eq!(
            ledger.summarize().unwrap().line(Denomination(50)).unwrap().price,
            dec!(15)
        );
    }

    #[test]
    fn set_price_without_ledger_group() {
        let (catalog, inventory, ledger, _dir) = catalog();
        inventory.add_codes(Denomination(50), ["B"]).unwrap();

        catalog.set_price(Denomination(50), dec!(15)).unwrap();

        assert!(ledger.summarize().unwrap().is_empty());
    }

    #[test]
    fn set_price_unknown_denomination_touches_nothing() {
        let (catalog, _inventory, ledger, _dir) = catalog();
        ledger.record_redemption(Denomination(50), &archived("A")).unwrap();

        let result = catalog.set_price(Denomination(50), dec!(15));

        assert_eq!(result, Err(StoreError::NotFound(Denomination(50))));
        assert_eq!(
            ledger.summarize().unwrap().line(Denomination(50)).unwrap().price,
            Decimal::ZERO
        );
    }

    #[test]
    fn ledger_failure_is_reported_as_partial() {
        let (catalog, inventory, ledger, _dir) = catalog();
        inventory.add_codes(Denomination(50), ["B"]).unwrap();
        ledger.record_redemption(Denomination(50), &archived("A")).unwrap();
        let mut temp = ledger.path().as_os_str().to_owned();
        temp.push(".tmp");
        fs::create_dir(&temp).unwrap();

        let result = catalog.set_price(Denomination(50), dec!(15));

        assert!(matches!(
            result,
            Err(StoreError::PartialPropagation { denomination: Denomination(50), .. })
        ));
        assert_eq!(inventory.price_of(Denomination(50)).unwrap(), Some(dec!(15)));

        // Retry succeeds once the ledger is writable again.
        fs::remove_dir(&temp).unwrap();
        catalog.set_price(Denomination(50), dec!(15)).unwrap();
        assert_eq!(ledger.summarize().unwrap().grand_total, dec!(15));
    }

    #[test]
    fn price_list_skips_unpriced_and_repeated_groups() {
        let (catalog, inventory, _ledger, _dir) = catalog();
        let mut book = inventory.load().unwrap();
        book.codes.push(Group::new(Denomination(60), dec!(85)));
        book.codes.push(Group::new(Denomination(325), Decimal::ZERO));
        book.codes.push(Group::new(Denomination(60), dec!(90)));
        book.codes.push(Group::new(Denomination(660), dec!(800)));
        inventory.save(&book).unwrap();

        let lines = catalog.price_list().unwrap();

        assert_eq!(
            lines,
            vec![
                PriceLine { denomination: Denomination(60), price: dec!(85) },
                PriceLine { denomination: Denomination(660), price: dec!(800) },
            ]
        );
    }
}
