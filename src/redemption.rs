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

//! Code allocation.
//!
//! [`RedemptionEngine::reserve`] selects the oldest unredeemed codes of a
//! denomination, flags them and removes them from the inventory in a single
//! read-modify-write of the inventory file. Either exactly `count` codes are
//! taken or the inventory is left untouched.

use crate::base::Denomination;
use crate::code::{self, Code, Group};
use crate::error::StoreError;
use crate::inventory::InventoryStore;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Codes taken out of the inventory by one reservation.
///
/// Carries the group price read in the same inventory snapshot the codes
/// were selected from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub denomination: Denomination,
    pub unit_price: Decimal,
    /// `unit_price × count`.
    pub subtotal: Decimal,
    /// Flagged `redeemed = true`, in selection (FIFO) order.
    pub codes: Vec<Code>,
}

impl Reservation {
    pub fn count(&self) -> usize {
        self.codes.len()
    }

    pub fn code_strings(&self) -> Vec<String> {
        self.codes.iter().map(|code| code.code.clone()).collect()
    }
}

/// Allocates codes and hands out per-denomination locks.
///
/// The locks let a caller extend the critical section of a reservation over
/// follow-up steps (ledger and dues) while reservations of other
/// denominations proceed concurrently.
#[derive(Debug)]
pub struct RedemptionEngine {
    inventory: Arc<InventoryStore>,
    locks: DashMap<Denomination, Arc<Mutex<()>>>,
}

impl RedemptionEngine {
    pub fn new(inventory: Arc<InventoryStore>) -> Self {
        Self {
            inventory,
            locks: DashMap::new(),
        }
    }

    /// Returns the lock serializing reservations of `denomination`.
    pub fn lock_for(&self, denomination: Denomination) -> Arc<Mutex<()>> {
        self.locks
            .entry(denomination)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Takes exactly `count` unredeemed codes of `denomination`, oldest first.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidCount`] - `count` is zero.
    /// - [`StoreError::NotFound`] - No inventory group for the denomination.
    /// - [`StoreError::InsufficientStock`] - Fewer than `count` codes available.
    /// - [`StoreError::Overflow`] - `price × count` does not fit.
    /// - [`StoreError::Io`] - The inventory could not be read or written.
    pub fn reserve(
        &self,
        denomination: Denomination,
        count: usize,
    ) -> Result<Reservation, StoreError> {
        if count == 0 {
            return Err(StoreError::InvalidCount);
        }

        let result = self.inventory.update(|book| {
            let group = book
                .group_mut(denomination)
                .ok_or(StoreError::NotFound(denomination))?;
            let subtotal = code::line_total(denomination, group.price, count)?;
            let codes = take_oldest(group, count)?;
            Ok(Reservation {
                denomination,
                unit_price: group.price,
                subtotal,
                codes,
            })
        });

        match &result {
            Ok(_) => info!(%denomination, count, "Reserved codes"),
            Err(StoreError::InsufficientStock { available, .. }) => {
                warn!(%denomination, count, available, "Not enough available codes")
            }
            Err(_) => {}
        }
        result
    }

    /// Returns the codes of an uncommitted reservation to the inventory.
    ///
    /// The codes go back to the front of their group unredeemed, so the next
    /// reservation picks them again.
    pub(crate) fn release(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let codes = reservation
            .codes
            .iter()
            .map(|code| Code::new(code.code.clone()))
            .collect();
        self.inventory
            .reinstate(reservation.denomination, reservation.unit_price, codes)
    }
}

/// Flags and removes the first `count` unredeemed codes of `group`.
///
/// Leaves `group` unchanged when fewer than `count` are available.
fn take_oldest(group: &mut Group, count: usize) -> Result<Vec<Code>, StoreError> {
    let available = group.available();
    if available < count {
        return Err(StoreError::InsufficientStock {
            denomination: group.amount,
            requested: count,
            available,
        });
    }

    let mut taken = Vec::with_capacity(count);
    let mut kept = Vec::with_capacity(group.codes.len() - count);
    for mut code in group.codes.drain(..) {
        if taken.len() < count && !code.redeemed {
            code.redeem();
            taken.push(code);
        } else {
            kept.push(code);
        }
    }
    group.codes = kept;

    debug_assert_eq!(taken.len(), count);
    Ok(taken)
}
