//! # Player Ledger
//!
//! Owns every account's currency balance, item inventory, and bounded
//! activity log.
//!
//! ## Guarantees
//!
//! 1. **Non-negative balances**: debits check funds before mutating
//! 2. **Positive inventory counts**: an entry that reaches zero is removed
//! 3. **All-or-nothing**: a failed precondition leaves the account
//!    byte-for-byte unchanged
//!
//! ## Locking
//!
//! Each account lives behind its own `parking_lot::Mutex`, handed out as
//! an `Arc` handle. Single-account operations lock, mutate, unlock.
//! Composite operations that touch two accounts must acquire both locks
//! through [`PlayerLedger::lock_pair`], which orders acquisition
//! lexicographically by account key so symmetric concurrent trades cannot
//! deadlock.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};

use gildhall_core::now_millis;

use crate::error::{EconomyError, EconomyResult};

/// Unique identifier for an item type.
pub type ItemId = String;

/// Category of an activity log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// Coins minted from a confirmed payment.
    Mint,
    /// Items granted by the game's reward systems.
    Award,
    /// Coins spent on an in-game sink.
    Spend,
    /// Items escrowed into a new listing.
    ListingCreated,
    /// Escrowed items returned from a cancelled listing.
    ListingCancelled,
    /// Coins received for a sold listing.
    Sale,
    /// Items bought from the marketplace.
    Purchase,
    /// Items moved in a direct peer exchange.
    Exchange,
}

/// One timestamped activity log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Unix milliseconds when the event was recorded.
    pub at_ms: u64,
    /// Event category.
    pub kind: HistoryKind,
    /// Human-readable detail.
    pub message: String,
}

/// One player's economic state.
///
/// The canonical account key is the map key in [`PlayerLedger`] and in
/// the durable snapshot; it is not duplicated inside the record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Coin balance. Non-negative by construction.
    #[serde(default)]
    pub balance: u64,
    /// Item multiset; every stored count is positive.
    #[serde(default)]
    pub inventory: BTreeMap<ItemId, u32>,
    /// Bounded activity log, oldest first.
    #[serde(default)]
    pub history: VecDeque<HistoryEvent>,
}

impl Account {
    /// Adds coins.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::ArithmeticOverflow`] if the balance would
    /// exceed `u64::MAX`; the balance is unchanged in that case.
    pub fn credit(&mut self, amount: u64) -> EconomyResult<u64> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(EconomyError::ArithmeticOverflow)?;
        Ok(self.balance)
    }

    /// Removes coins.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InsufficientFunds`] without mutating if the
    /// balance cannot cover `amount`.
    pub fn debit(&mut self, amount: u64) -> EconomyResult<u64> {
        if self.balance < amount {
            return Err(EconomyError::InsufficientFunds {
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(self.balance)
    }

    /// Number of `item_id` held.
    #[must_use]
    pub fn item_count(&self, item_id: &str) -> u32 {
        self.inventory.get(item_id).copied().unwrap_or(0)
    }

    /// Adds `qty` of an item.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::ArithmeticOverflow`] if the held count
    /// would exceed `u32::MAX`; the inventory is unchanged in that case.
    pub fn add_items(&mut self, item_id: &str, qty: u32) -> EconomyResult<u32> {
        let held = self.item_count(item_id);
        let next = held.checked_add(qty).ok_or(EconomyError::ArithmeticOverflow)?;
        self.inventory.insert(item_id.to_owned(), next);
        Ok(next)
    }

    /// Removes `qty` of an item, deleting the entry if it reaches zero.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InsufficientInventory`] without mutating if
    /// fewer than `qty` are held.
    pub fn remove_items(&mut self, item_id: &str, qty: u32) -> EconomyResult<u32> {
        let held = self.item_count(item_id);
        if held < qty {
            return Err(EconomyError::InsufficientInventory {
                item_id: item_id.to_owned(),
                required: qty,
                available: held,
            });
        }
        let next = held - qty;
        if next == 0 {
            self.inventory.remove(item_id);
        } else {
            self.inventory.insert(item_id.to_owned(), next);
        }
        Ok(next)
    }

    /// Appends an activity record, evicting the oldest past `capacity`.
    pub fn push_history(&mut self, capacity: usize, at_ms: u64, kind: HistoryKind, message: String) {
        self.history.push_back(HistoryEvent { at_ms, kind, message });
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }
}

/// Shared handle to one account's lock.
pub type AccountHandle = Arc<Mutex<Account>>;

/// The ledger of all player accounts.
///
/// Accounts are created lazily on first reference and never deleted.
/// Durability is the engine's concern: the ledger owns the live in-memory
/// state and its locks, nothing else.
#[derive(Debug)]
pub struct PlayerLedger {
    accounts: RwLock<HashMap<String, AccountHandle>>,
    history_capacity: usize,
}

impl PlayerLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new(history_capacity: usize) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            history_capacity,
        }
    }

    /// Restores a ledger from snapshot records, trimming any activity log
    /// longer than the configured capacity.
    #[must_use]
    pub fn from_accounts(
        records: BTreeMap<String, Account>,
        history_capacity: usize,
    ) -> Self {
        let accounts = records
            .into_iter()
            .map(|(key, mut account)| {
                while account.history.len() > history_capacity {
                    account.history.pop_front();
                }
                (key, Arc::new(Mutex::new(account)))
            })
            .collect();
        Self {
            accounts: RwLock::new(accounts),
            history_capacity,
        }
    }

    /// Activity log capacity applied by [`PlayerLedger::append_history`].
    #[must_use]
    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// Returns the handle for `key`, inserting a fresh zero-balance,
    /// empty-inventory account if none exists.
    #[must_use]
    pub fn get_or_create(&self, key: &str) -> AccountHandle {
        if let Some(handle) = self.accounts.read().get(key) {
            return Arc::clone(handle);
        }
        let mut accounts = self.accounts.write();
        Arc::clone(accounts.entry(key.to_owned()).or_default())
    }

    /// Adds coins to an account.
    ///
    /// # Errors
    ///
    /// Propagates [`Account::credit`] failures.
    pub fn credit(&self, key: &str, amount: u64) -> EconomyResult<u64> {
        self.get_or_create(key).lock().credit(amount)
    }

    /// Removes coins from an account.
    ///
    /// # Errors
    ///
    /// Propagates [`Account::debit`] failures.
    pub fn debit(&self, key: &str, amount: u64) -> EconomyResult<u64> {
        self.get_or_create(key).lock().debit(amount)
    }

    /// Adds items to an account.
    ///
    /// # Errors
    ///
    /// Propagates [`Account::add_items`] failures.
    pub fn add_items(&self, key: &str, item_id: &str, qty: u32) -> EconomyResult<u32> {
        self.get_or_create(key).lock().add_items(item_id, qty)
    }

    /// Removes items from an account.
    ///
    /// # Errors
    ///
    /// Propagates [`Account::remove_items`] failures.
    pub fn remove_items(&self, key: &str, item_id: &str, qty: u32) -> EconomyResult<u32> {
        self.get_or_create(key).lock().remove_items(item_id, qty)
    }

    /// Appends a timestamped activity record to an account.
    pub fn append_history(&self, key: &str, kind: HistoryKind, message: String) {
        self.get_or_create(key)
            .lock()
            .push_history(self.history_capacity, now_millis(), kind, message);
    }

    /// Locks two distinct accounts, acquiring in lexicographic key order.
    ///
    /// Guards are returned in caller order (`a` first), whatever the
    /// acquisition order was. Callers must have rejected `a_key == b_key`
    /// already; the same mutex cannot be locked twice.
    pub fn lock_pair<'a>(
        a_key: &str,
        a: &'a Mutex<Account>,
        b_key: &str,
        b: &'a Mutex<Account>,
    ) -> (MutexGuard<'a, Account>, MutexGuard<'a, Account>) {
        debug_assert_ne!(a_key, b_key);
        if a_key < b_key {
            let guard_a = a.lock();
            let guard_b = b.lock();
            (guard_a, guard_b)
        } else {
            let guard_b = b.lock();
            let guard_a = a.lock();
            (guard_a, guard_b)
        }
    }

    /// Number of known accounts.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.accounts.read().len()
    }

    /// Sum of all balances; the conservation probe used by stats and
    /// tests.
    #[must_use]
    pub fn total_coins(&self) -> u64 {
        self.accounts
            .read()
            .values()
            .map(|handle| handle.lock().balance)
            .sum()
    }
}
