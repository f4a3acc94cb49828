//! # Snapshot Store
//!
//! **Crash-Safe Durable State**
//!
//! The whole economy persists as one JSON document: every account record
//! keyed by canonical account key, every listing keyed by listing id, and
//! the set of redeemed payment order ids. Keeping the collections in one
//! document is what makes a cross-entity operation (escrow debit plus
//! listing insert, or debit/credit/deliver/mark-sold) a single durable
//! transaction: either the rename lands and all of it is visible after a
//! crash, or none of it is.
//!
//! ## Guarantees
//!
//! 1. **Durability**: once `commit()` returns, the state is fsynced on disk
//! 2. **Atomicity**: the snapshot is written to a temp file and renamed
//!    over the live file; readers never observe a truncated document
//! 3. **Isolation**: commits are serialized; each one carries every
//!    previously committed change
//!
//! A failed commit leaves both the on-disk file and the in-memory image
//! exactly as they were, so the engine can refuse the operation without
//! any partial state escaping.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};
use crate::ledger::Account;
use crate::listings::Listing;

/// The durable image of the whole economy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomySnapshot {
    /// One record per account, keyed by canonical account key.
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,
    /// Every listing ever created, keyed by listing id.
    #[serde(default)]
    pub listings: BTreeMap<String, Listing>,
    /// Payment order ids already minted, the mint idempotency set.
    #[serde(default)]
    pub redeemed_payments: BTreeSet<String>,
}

/// Changes carried by one commit.
///
/// Only the entities an operation touched are passed in; the store merges
/// them over its last committed image.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommitSet<'a> {
    /// Accounts whose new state should be persisted.
    pub accounts: &'a [(&'a str, &'a Account)],
    /// Listings whose new state should be persisted.
    pub listings: &'a [&'a Listing],
    /// Payment order id redeemed by this commit, if any.
    pub redeemed_payment: Option<&'a str>,
}

/// Writes the durable snapshot, write-to-temp-then-rename.
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    tmp_path: PathBuf,
    image: Mutex<EconomySnapshot>,
}

impl SnapshotStore {
    /// Opens the store, loading the last committed snapshot if present.
    ///
    /// A stale temp file from an interrupted commit is discarded; the
    /// interrupted commit was never acknowledged.
    ///
    /// # Errors
    ///
    /// [`EconomyError::Storage`] if the directory or file cannot be
    /// accessed, [`EconomyError::Corrupt`] if the snapshot exists but
    /// does not decode.
    pub fn open(path: PathBuf) -> EconomyResult<(Self, EconomySnapshot)> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|source| EconomyError::Storage { op: "create data dir", source })?;
        }

        let tmp_path = tmp_path_for(&path);
        fs::remove_file(&tmp_path).ok();

        let snapshot = if path.exists() {
            let data = fs::read(&path)
                .map_err(|source| EconomyError::Storage { op: "read snapshot", source })?;
            serde_json::from_slice(&data).map_err(|e| EconomyError::Corrupt {
                reason: e.to_string(),
            })?
        } else {
            EconomySnapshot::default()
        };

        let store = Self {
            path,
            tmp_path,
            image: Mutex::new(snapshot.clone()),
        };
        Ok((store, snapshot))
    }

    /// Durably commits a set of changes merged over the last image.
    ///
    /// The in-memory image is replaced only after the rename lands, so a
    /// failed commit changes nothing anywhere.
    ///
    /// # Errors
    ///
    /// [`EconomyError::Storage`] on any I/O failure.
    pub fn commit(&self, changes: CommitSet<'_>) -> EconomyResult<()> {
        let mut image = self.image.lock();

        let mut next = image.clone();
        for &(key, account) in changes.accounts {
            next.accounts.insert(key.to_owned(), account.clone());
        }
        for &listing in changes.listings {
            next.listings.insert(listing.id.clone(), listing.clone());
        }
        if let Some(order_id) = changes.redeemed_payment {
            next.redeemed_payments.insert(order_id.to_owned());
        }

        self.write_durable(&next)?;
        *image = next;
        Ok(())
    }

    /// Serializes and lands `snapshot` on disk.
    fn write_durable(&self, snapshot: &EconomySnapshot) -> EconomyResult<()> {
        let data = serde_json::to_vec_pretty(snapshot).map_err(|e| EconomyError::Storage {
            op: "encode snapshot",
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let mut file = File::create(&self.tmp_path)
            .map_err(|source| EconomyError::Storage { op: "create snapshot temp", source })?;
        file.write_all(&data)
            .map_err(|source| EconomyError::Storage { op: "write snapshot", source })?;
        file.sync_all()
            .map_err(|source| EconomyError::Storage { op: "sync snapshot", source })?;
        drop(file);

        fs::rename(&self.tmp_path, &self.path)
            .map_err(|source| EconomyError::Storage { op: "publish snapshot", source })?;
        Ok(())
    }

    /// Path of the live snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
