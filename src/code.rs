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

//! Codes, groups and the persisted code book.
//!
//! Inventory and ledger share one document shape:
//!
//! ```json
//! { "codes": [ { "amount": 50, "price": 10.0, "codes": [ { "code": "...", "redeemed": false } ] } ] }
//! ```
//!
//! A code moves through the following states, none of them reversible:
//! - Available (inventory, `redeemed = false`) → Redeemed (via reservation)
//! - Redeemed → Archived (residing in the ledger)
//! - Archived → Purged (via ledger clear; not retained anywhere)

use crate::base::Denomination;
use crate::error::StoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single redemption token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    pub code: String,
    #[serde(default)]
    pub redeemed: bool,
}

impl Code {
    /// Creates an unredeemed code.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            redeemed: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    /// Flags the code as consumed. One-way.
    pub(crate) fn redeem(&mut self) {
        debug_assert!(!self.redeemed, "code {} redeemed twice", self.code);
        self.redeemed = true;
    }
}

/// All codes of one denomination, with the unit price of the tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub amount: Denomination,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision")]
    pub price: Decimal,
    /// Insertion order; redemption takes from the front.
    #[serde(default)]
    pub codes: Vec<Code>,
}

impl Group {
    pub fn new(amount: Denomination, price: Decimal) -> Self {
        Self {
            amount,
            price,
            codes: Vec::new(),
        }
    }

    /// Number of codes not yet redeemed.
    pub fn available(&self) -> usize {
        self.codes.iter().filter(|code| !code.redeemed).count()
    }

    /// `price × number of codes held`.
    pub fn subtotal(&self) -> Result<Decimal, StoreError> {
        line_total(self.amount, self.price, self.codes.len())
    }
}

/// `price × count`, or [`StoreError::Overflow`] when it does not fit.
pub(crate) fn line_total(
    denomination: Denomination,
    price: Decimal,
    count: usize,
) -> Result<Decimal, StoreError> {
    price
        .checked_mul(Decimal::from(count))
        .ok_or(StoreError::Overflow(denomination))
}

/// Persisted document: the group list of one store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBook {
    #[serde(default)]
    pub codes: Vec<Group>,
}

impl CodeBook {
    /// Returns the group for `amount`, if any. First match wins when a legacy
    /// file holds the same denomination twice.
    pub fn group(&self, amount: Denomination) -> Option<&Group> {
        self.codes.iter().find(|group| group.amount == amount)
    }

    pub fn group_mut(&mut self, amount: Denomination) -> Option<&mut Group> {
        self.codes.iter_mut().find(|group| group.amount == amount)
    }

    /// Returns the group for `amount`, creating it with `price` if absent.
    pub fn group_or_insert(&mut self, amount: Denomination, price: Decimal) -> &mut Group {
        let index = match self.codes.iter().position(|group| group.amount == amount) {
            Some(index) => index,
            None => {
                self.codes.push(Group::new(amount, price));
                self.codes.len() - 1
            }
        };
        &mut self.codes[index]
    }

    pub fn remove_group(&mut self, amount: Denomination) -> Option<Group> {
        let index = self.codes.iter().position(|group| group.amount == amount)?;
        Some(self.codes.remove(index))
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.codes.iter()
    }
}
