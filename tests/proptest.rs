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

//! Property-based tests for the redemption engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! uploads and orders.

use proptest::prelude::*;
use redeem_ledger::{Denomination, Engine, StoreConfig, StoreError};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tempfile::TempDir;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a price (0.00 to 500.00 with 2 decimal places).
fn arb_price() -> impl Strategy<Value = Decimal> {
    (0i64..=50_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Generate a batch of distinct codes.
fn arb_codes(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[A-Z]{4}-[0-9]{4}", 1..max)
        .prop_map(|codes| codes.into_iter().collect())
}

/// Generate an order: (denomination index, count).
fn arb_order() -> impl Strategy<Value = (usize, usize)> {
    (0usize..3, 1usize..5)
}

const DENOMINATIONS: [Denomination; 3] = [Denomination(50), Denomination(60), Denomination(325)];

fn engine() -> (Engine, TempDir) {
    let dir = TempDir::new().unwrap();
    let engine = Engine::new(&StoreConfig::in_dir(dir.path()));
    (engine, dir)
}

fn available(engine: &Engine, denomination: Denomination) -> usize {
    engine
        .list_stock()
        .unwrap()
        .iter()
        .find(|line| line.denomination == denomination)
        .map(|line| line.available)
        .unwrap_or(0)
}

// =============================================================================
// Selection Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// An order gets exactly the N oldest codes, or nothing at all.
    #[test]
    fn order_takes_exactly_n_oldest_or_nothing(
        codes in arb_codes(12),
        count in 1usize..15,
        price in arb_price(),
    ) {
        let (engine, _dir) = engine();
        let d = Denomination(50);
        engine.upload_codes(d, &codes).unwrap();
        engine.set_price(d, price).unwrap();

        match engine.reserve_and_record(d, count) {
            Ok(receipt) => {
                prop_assert!(count <= codes.len());
                prop_assert_eq!(&receipt.codes[..], &codes[..count]);
                prop_assert_eq!(receipt.subtotal, price * Decimal::from(count));
                prop_assert_eq!(available(&engine, d), codes.len() - count);
                prop_assert_eq!(engine.current_due().unwrap(), receipt.subtotal);
            }
            Err(StoreError::InsufficientStock { requested, available: left, .. }) => {
                prop_assert!(count > codes.len());
                prop_assert_eq!(requested, count);
                prop_assert_eq!(left, codes.len());
                prop_assert_eq!(available(&engine, d), codes.len());
                prop_assert!(engine.ledger_summary().unwrap().is_empty());
                prop_assert_eq!(engine.current_due().unwrap(), Decimal::ZERO);
            }
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }

    /// Uploading the same batch twice adds nothing the second time.
    #[test]
    fn upload_is_idempotent(
        codes in prop::collection::vec("[A-Z]{2}[0-9]{2}", 0..20),
    ) {
        let (engine, _dir) = engine();
        let d = Denomination(60);
        let distinct: HashSet<&String> = codes.iter().collect();

        let first = engine.upload_codes(d, &codes).unwrap();
        let second = engine.upload_codes(d, &codes).unwrap();

        prop_assert_eq!(first.added, distinct.len());
        prop_assert_eq!(second.added, 0);
        prop_assert_eq!(second.duplicates.len(), codes.len());
        prop_assert_eq!(available(&engine, d), distinct.len());
    }

    /// Re-uploading a batch after some orders never brings handed-out codes
    /// back into stock.
    #[test]
    fn reupload_never_restocks_handed_out_codes(
        codes in arb_codes(10),
        count in 1usize..10,
    ) {
        let (engine, _dir) = engine();
        let d = Denomination(50);
        engine.upload_codes(d, &codes).unwrap();
        let taken = count.min(codes.len());
        engine.reserve_and_record(d, taken).unwrap();

        let report = engine.upload_codes(d, &codes).unwrap();

        prop_assert_eq!(report.added, 0);
        prop_assert_eq!(report.duplicates.len(), codes.len());
        prop_assert_eq!(available(&engine, d), codes.len() - taken);
    }
}

// =============================================================================
// Ledger and Due Consistency Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Every uploaded code is either still available or archived, never
    /// both, and the due total matches the ledger while prices are fixed.
    #[test]
    fn codes_are_conserved_and_dues_match_ledger(
        batches in prop::collection::vec(arb_codes(8), 3),
        prices in prop::collection::vec(arb_price(), 3),
        orders in prop::collection::vec(arb_order(), 1..12),
    ) {
        let (engine, _dir) = engine();
        let mut uploaded = 0;
        for ((d, codes), price) in DENOMINATIONS.iter().zip(&batches).zip(&prices) {
            uploaded += engine.upload_codes(*d, codes).unwrap().added;
            engine.set_price(*d, *price).unwrap();
        }

        let mut handed_out = Vec::new();
        for (index, count) in orders {
            match engine.reserve_and_record(DENOMINATIONS[index], count) {
                Ok(receipt) => handed_out.extend(receipt.codes),
                Err(StoreError::InsufficientStock { .. }) => {}
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }

        let unique: HashSet<&String> = handed_out.iter().collect();
        prop_assert_eq!(unique.len(), handed_out.len());

        let summary = engine.ledger_summary().unwrap();
        let archived: usize = summary.lines.iter().map(|line| line.count).sum();
        let left: usize = DENOMINATIONS.iter().map(|d| available(&engine, *d)).sum();
        prop_assert_eq!(archived, handed_out.len());
        prop_assert_eq!(left + archived, uploaded);
        prop_assert_eq!(engine.current_due().unwrap(), summary.grand_total);
    }

    /// Clearing always leaves an empty ledger and a zero due, whatever
    /// prices were set before.
    #[test]
    fn clear_resets_ledger_and_due(
        codes in arb_codes(10),
        first_price in arb_price(),
        second_price in arb_price(),
        count in 1usize..4,
    ) {
        let (engine, _dir) = engine();
        let d = Denomination(50);
        engine.upload_codes(d, &codes).unwrap();
        engine.set_price(d, first_price).unwrap();
        let _ = engine.reserve_and_record(d, count);
        engine.set_price(d, second_price).unwrap();

        engine.clear_ledger().unwrap();

        prop_assert!(engine.ledger_summary().unwrap().is_empty());
        prop_assert_eq!(engine.current_due().unwrap(), Decimal::ZERO);
    }
}
