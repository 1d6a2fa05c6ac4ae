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

//! Store file locations.
//!
//! ## Sources (priority order)
//! 1. Explicit values (e.g. the CLI `--data-dir` flag)
//! 2. Environment variables (`REDEEM_*`)
//! 3. Defaults: `codes.json`, `used.json` and `due.json` in the working directory

use std::env;
use std::path::{Path, PathBuf};

pub const INVENTORY_FILE: &str = "codes.json";
pub const LEDGER_FILE: &str = "used.json";
pub const DUES_FILE: &str = "due.json";

/// Directory holding all three store files.
pub const ENV_DATA_DIR: &str = "REDEEM_DATA_DIR";
pub const ENV_INVENTORY_FILE: &str = "REDEEM_INVENTORY_FILE";
pub const ENV_LEDGER_FILE: &str = "REDEEM_LEDGER_FILE";
pub const ENV_DUES_FILE: &str = "REDEEM_DUES_FILE";

/// Paths of the inventory, ledger and dues files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub inventory_path: PathBuf,
    pub ledger_path: PathBuf,
    pub dues_path: PathBuf,
}

impl StoreConfig {
    /// All three files inside `dir`, under their default names.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            inventory_path: dir.join(INVENTORY_FILE),
            ledger_path: dir.join(LEDGER_FILE),
            dues_path: dir.join(DUES_FILE),
        }
    }

    /// Defaults overridden by `REDEEM_DATA_DIR`, then by the per-file
    /// variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var_os(key).map(PathBuf::from))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<PathBuf>) -> Self {
        let mut config = match lookup(ENV_DATA_DIR) {
            Some(dir) => Self::in_dir(dir),
            None => Self::default(),
        };
        if let Some(path) = lookup(ENV_INVENTORY_FILE) {
            config.inventory_path = path;
        }
        if let Some(path) = lookup(ENV_LEDGER_FILE) {
            config.ledger_path = path;
        }
        if let Some(path) = lookup(ENV_DUES_FILE) {
            config.dues_path = path;
        }
        config
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            inventory_path: PathBuf::from(INVENTORY_FILE),
            ledger_path: PathBuf::from(LEDGER_FILE),
            dues_path: PathBuf::from(DUES_FILE),
        }
    }
}
