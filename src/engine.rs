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

//! Redemption engine service.
//!
//! The [`Engine`] owns the inventory, ledger and dues stores and runs every
//! operation that spans more than one of them as a single critical section.
//!
//! # Operations
//!
//! - **Upload**: Add codes to a denomination, skipping codes already in stock
//!   or already handed out.
//! - **Reserve**: Take the oldest N codes, archive them in the ledger and add
//!   their price to the running due total.
//! - **Set price**: Re-price a denomination in the inventory and the ledger.
//! - **Clear**: Empty the ledger and reset the due total together.
//!
//! # Thread Safety
//!
//! Reservations and uploads hold the shared side of a global gate plus a
//! per-denomination mutex, so work on different denominations runs
//! concurrently while two operations on the same denomination never
//! interleave. Price changes,
//! clears and sweeps take the gate exclusively. Lock order is always
//! gate, then denomination, then store file.

use crate::base::Denomination;
use crate::code;
use crate::config::StoreConfig;
use crate::dues::DueAccumulator;
use crate::error::StoreError;
use crate::inventory::{InventoryStore, StockLine, UploadReport};
use crate::ledger::{LedgerStore, LedgerSummary};
use crate::pricing::{PriceLine, PricingCatalog};
use crate::redemption::{RedemptionEngine, Reservation};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};

/// Result of a committed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub denomination: Denomination,
    /// Handed-out codes, oldest first.
    pub codes: Vec<String>,
    pub unit_price: Decimal,
    /// `unit_price × codes.len()`, the amount added to the due total.
    pub subtotal: Decimal,
}

/// Code inventory service.
///
/// # Invariants
///
/// - A code is either available in the inventory or archived in the ledger,
///   never both.
/// - A reservation hands out exactly the requested number of codes or none.
/// - Without re-pricing since the last clear, the due total equals the
///   ledger's grand total.
pub struct Engine {
    inventory: Arc<InventoryStore>,
    ledger: Arc<LedgerStore>,
    dues: DueAccumulator,
    pricing: PricingCatalog,
    redemption: RedemptionEngine,
    gate: RwLock<()>,
}

impl Engine {
    /// Creates an engine over the store files named in `config`.
    ///
    /// Files are not touched until the first operation.
    pub fn new(config: &StoreConfig) -> Self {
        let inventory = Arc::new(InventoryStore::new(&config.inventory_path));
        let ledger = Arc::new(LedgerStore::new(
            &config.ledger_path,
            Arc::clone(&inventory),
        ));
        Engine {
            dues: DueAccumulator::new(&config.dues_path, Arc::clone(&inventory)),
            pricing: PricingCatalog::new(Arc::clone(&inventory), Arc::clone(&ledger)),
            redemption: RedemptionEngine::new(Arc::clone(&inventory)),
            inventory,
            ledger,
            gate: RwLock::new(()),
        }
    }

    /// Available count and price per denomination.
    pub fn list_stock(&self) -> Result<Vec<StockLine>, StoreError> {
        self.inventory.stock()
    }

    /// Value of the remaining stock: `Σ price × available`.
    pub fn stock_worth(&self) -> Result<Decimal, StoreError> {
        self.inventory
            .stock()?
            .iter()
            .try_fold(Decimal::ZERO, |worth, line| {
                code::line_total(line.denomination, line.price, line.available)?
                    .checked_add(worth)
                    .ok_or(StoreError::Overflow(line.denomination))
            })
    }

    /// Priced denominations.
    pub fn price_list(&self) -> Result<Vec<PriceLine>, StoreError> {
        self.pricing.price_list()
    }

    /// Adds codes to `denomination`, creating its group on first use.
    ///
    /// Codes already in the group or already archived in the ledger are
    /// reported as duplicates, so no code can be handed out twice.
    pub fn upload_codes<I, S>(
        &self,
        denomination: Denomination,
        raw_codes: I,
    ) -> Result<UploadReport, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _gate = self.gate.read();
        let lock = self.redemption.lock_for(denomination);
        let _guard = lock.lock();

        let archived = self.ledger.archived_codes(denomination)?;
        self.inventory
            .add_codes_excluding(denomination, raw_codes, &archived)
    }

    /// Hands out `count` codes of `denomination`, archives them in the ledger
    /// and adds their price to the due total.
    ///
    /// If archiving or the due update fails, the steps already taken are
    /// undone and the codes stay available.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidCount`] - `count` is zero.
    /// - [`StoreError::NotFound`] - No codes were ever uploaded for the denomination.
    /// - [`StoreError::InsufficientStock`] - Fewer than `count` codes available.
    /// - [`StoreError::Overflow`] - The subtotal or the new due total does not fit.
    /// - [`StoreError::Io`] - A store could not be read or written.
    pub fn reserve_and_record(
        &self,
        denomination: Denomination,
        count: usize,
    ) -> Result<Receipt, StoreError> {
        let _gate = self.gate.read();
        let lock = self.redemption.lock_for(denomination);
        let _guard = lock.lock();

        let reservation = self.redemption.reserve(denomination, count)?;

        if let Err(e) = self
            .ledger
            .record_redemption(denomination, &reservation.codes)
        {
            self.release(&reservation);
            return Err(e);
        }

        let subtotal = match self.dues.record_due(denomination, reservation.count()) {
            Ok(amount) => amount,
            Err(e) => {
                if let Err(undo) = self.ledger.retract(denomination, &reservation.codes) {
                    error!(%denomination, error = %undo, "Failed to retract codes from ledger");
                }
                self.release(&reservation);
                return Err(e);
            }
        };
        debug_assert_eq!(subtotal, reservation.subtotal);

        Ok(Receipt {
            denomination,
            codes: reservation.code_strings(),
            unit_price: reservation.unit_price,
            subtotal,
        })
    }

    /// Sets the price of `denomination` in the inventory and the ledger.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] - The inventory has no group for the denomination.
    /// - [`StoreError::InvalidPrice`] - Price is negative or too large to bill.
    /// - [`StoreError::PartialPropagation`] - Only the inventory copy was updated.
    pub fn set_price(&self, denomination: Denomination, price: Decimal) -> Result<(), StoreError> {
        let _gate = self.gate.write();
        self.pricing.set_price(denomination, price)
    }

    /// Empties the ledger and resets the due total to zero.
    ///
    /// If the reset fails the ledger is restored, so either both halves
    /// happen or neither does.
    pub fn clear_ledger(&self) -> Result<(), StoreError> {
        let _gate = self.gate.write();
        let snapshot = self.ledger.load()?;

        self.ledger.clear(None)?;
        if let Err(e) = self.dues.reset() {
            if let Err(undo) = self.ledger.save(&snapshot) {
                error!(error = %undo, "Failed to restore ledger after due reset failure");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Removes the ledger group for `denomination` and deducts its subtotal
    /// from the due total. Returns the deducted amount.
    pub fn clear_ledger_for(&self, denomination: Denomination) -> Result<Decimal, StoreError> {
        let _gate = self.gate.write();
        let snapshot = self.ledger.load()?;

        let removed = self.ledger.clear(Some(denomination))?;
        if let Err(e) = self.dues.deduct(removed) {
            if let Err(undo) = self.ledger.save(&snapshot) {
                error!(%denomination, error = %undo, "Failed to restore ledger after due deduction failure");
            }
            return Err(e);
        }
        Ok(removed)
    }

    /// Count, price and subtotal of archived codes per denomination.
    pub fn ledger_summary(&self) -> Result<LedgerSummary, StoreError> {
        self.ledger.summarize()
    }

    pub fn current_due(&self) -> Result<Decimal, StoreError> {
        self.dues.current()
    }

    /// Moves codes flagged as redeemed but still stored in the inventory into
    /// the ledger. Returns how many codes were moved.
    ///
    /// Such codes were never billed through this engine, so the due total is
    /// left unchanged.
    pub fn sweep_redeemed(&self) -> Result<usize, StoreError> {
        let _gate = self.gate.write();
        let drained = self.inventory.drain_redeemed()?;

        for (index, group) in drained.iter().enumerate() {
            if let Err(e) = self.ledger.record_redemption(group.amount, &group.codes) {
                for done in &drained[..index] {
                    if let Err(undo) = self.ledger.retract(done.amount, &done.codes) {
                        error!(denomination = %done.amount, error = %undo, "Failed to retract swept codes");
                    }
                }
                for group in &drained {
                    if let Err(undo) =
                        self.inventory
                            .reinstate(group.amount, group.price, group.codes.clone())
                    {
                        error!(denomination = %group.amount, error = %undo, "Failed to reinstate swept codes");
                    }
                }
                return Err(e);
            }
        }

        let moved: usize = drained.iter().map(|group| group.codes.len()).sum();
        info!(moved, "Swept redeemed codes into ledger");
        Ok(moved)
    }

    fn release(&self, reservation: &Reservation) {
        if let Err(e) = self.redemption.release(reservation) {
            error!(
                denomination = %reservation.denomination,
                count = reservation.count(),
                error = %e,
                "Failed to return reserved codes to inventory"
            );
        }
    }
}
