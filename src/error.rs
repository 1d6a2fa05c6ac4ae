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

//! Error types for store operations.

use crate::base::Denomination;
use crate::inventory::MAX_PRICE;
use rust_decimal::Decimal;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Store operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Persisted document could not be parsed.
    ///
    /// Never escapes a store load, which recovers by treating the store as
    /// empty.
    #[error("corrupt store file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Reading or writing a store file failed at the OS level
    #[error("storage I/O failure on {path}: {message}")]
    Io {
        path: PathBuf,
        kind: io::ErrorKind,
        message: String,
    },

    /// No group exists for the denomination in the target store
    #[error("no codes for denomination {0}")]
    NotFound(Denomination),

    /// Fewer unredeemed codes than requested
    #[error("insufficient stock for denomination {denomination}: requested {requested}, available {available}")]
    InsufficientStock {
        denomination: Denomination,
        requested: usize,
        available: usize,
    },

    /// Price change applied to the inventory but not mirrored to the ledger
    #[error("price for denomination {denomination} set in inventory but not in ledger: {reason}")]
    PartialPropagation {
        denomination: Denomination,
        reason: String,
    },

    /// Price is negative or above [`MAX_PRICE`]
    #[error("invalid price {0} (must be between 0 and {max})", max = MAX_PRICE)]
    InvalidPrice(Decimal),

    /// An amount derived from prices does not fit in a decimal
    #[error("amount overflow for denomination {0}")]
    Overflow(Denomination),

    /// Reservation count is zero
    #[error("invalid count (must be positive)")]
    InvalidCount,
}

impl StoreError {
    pub(crate) fn io(path: &Path, err: &io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
