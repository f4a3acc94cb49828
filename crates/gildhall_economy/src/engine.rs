//! # Economy Engine
//!
//! The single point of contact for the outside world. Every composite
//! operation is a short saga over the Player Ledger and the Listing
//! Store, sequenced so that partial execution can never lose or
//! duplicate currency or items.
//!
//! ## The Purchase Pipeline
//!
//! ```text
//! buy request -> normalize identity -> validate parameters ->
//!   1. Peek listing (reject unknown / terminal / self-trade)
//!   2. Lock buyer + seller (lexicographic order), then the listing
//!   3. Re-check the listing is still open
//!   4. Debit buyer, credit seller, deliver items, mark sold
//!   5. Durable snapshot commit
//!   6. Release locks, return receipt
//! ```
//!
//! ## Atomicity
//!
//! Steps 4–5 run under every involved lock. If the durable commit fails,
//! the pre-images taken before step 4 are restored before the locks
//! release, so no error path leaves partial state visible — in memory or
//! on disk. A response is only sent after the snapshot rename has
//! landed ("write-before-respond").
//!
//! ## Lock Order
//!
//! Account locks (lexicographic by key), then the listing lock, then the
//! snapshot store. Every operation acquires in this order; none holds a
//! lock across external I/O other than the snapshot write itself. The
//! payment bridge's network round-trip happens before any lock is taken.

use std::collections::{BTreeMap, HashSet};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use gildhall_core::{identity, now_millis};

use crate::config::EconomyConfig;
use crate::error::{EconomyError, EconomyResult};
use crate::ledger::{HistoryEvent, HistoryKind, ItemId, PlayerLedger};
use crate::listings::{Listing, ListingStore, ListingView};
use crate::payment::{PaymentBridge, PaymentReport};
use crate::store::{CommitSet, SnapshotStore};

/// Point-in-time view of one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountView {
    /// Canonical account key.
    pub account_key: String,
    /// Coin balance.
    pub balance: u64,
    /// Item multiset.
    pub inventory: BTreeMap<ItemId, u32>,
    /// Activity log, oldest first.
    pub history: Vec<HistoryEvent>,
}

/// Outcome of a payment mint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MintReceipt {
    /// Canonical account key credited.
    pub account_key: String,
    /// Coins added by this delivery; 0 for duplicates and dust amounts.
    pub coins_added: u64,
    /// Balance after the mint.
    pub new_balance: u64,
}

/// Outcome of a successful purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PurchaseReceipt {
    /// The listing that was bought.
    pub listing_id: String,
    /// Item delivered.
    pub item_id: ItemId,
    /// Quantity delivered.
    pub quantity: u32,
    /// Buyer's balance after the debit.
    pub new_balance: u64,
    /// Buyer's count of `item_id` after delivery.
    pub new_inventory_count: u32,
}

/// Operational counters, also the conservation probe used by tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EconomyStats {
    /// Known accounts.
    pub accounts: usize,
    /// Listings currently open.
    pub open_listings: usize,
    /// Sum of every account balance.
    pub total_coins: u64,
}

/// The transactional economy engine.
///
/// `EconomyEngine` is `Send + Sync`; one instance serves every concurrent
/// request.
#[derive(Debug)]
pub struct EconomyEngine {
    config: EconomyConfig,
    ledger: PlayerLedger,
    listings: ListingStore,
    store: SnapshotStore,
    redeemed: Mutex<HashSet<String>>,
}

impl EconomyEngine {
    /// Opens the engine, restoring durable state if present.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidConfig`] for unworkable configuration,
    /// [`EconomyError::Storage`] / [`EconomyError::Corrupt`] when the
    /// snapshot cannot be loaded.
    pub fn open(config: EconomyConfig) -> EconomyResult<Self> {
        config.validate()?;
        let (store, snapshot) = SnapshotStore::open(config.snapshot_path())?;

        let ledger = PlayerLedger::from_accounts(snapshot.accounts, config.history_capacity);
        let listings = ListingStore::from_listings(snapshot.listings);
        let redeemed: HashSet<String> = snapshot.redeemed_payments.into_iter().collect();

        info!(
            accounts = ledger.account_count(),
            open_listings = listings.open_count(),
            snapshot = %store.path().display(),
            "economy state restored"
        );

        Ok(Self {
            config,
            ledger,
            listings,
            store,
            redeemed: Mutex::new(redeemed),
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Returns a view of an account, creating it lazily on first
    /// reference. A fresh account is zero everywhere, so it is not
    /// persisted until its first committed mutation.
    #[must_use]
    pub fn get_account(&self, account_raw: &str) -> AccountView {
        let key = identity::normalize(Some(account_raw));
        let handle = self.ledger.get_or_create(&key);
        let account = handle.lock();
        AccountView {
            account_key: key,
            balance: account.balance,
            inventory: account.inventory.clone(),
            history: account.history.iter().cloned().collect(),
        }
    }

    /// Asks the bridge to verify `order_id`, then mints from the report.
    ///
    /// # Errors
    ///
    /// [`EconomyError::UpstreamUnavailable`] from the bridge, otherwise
    /// as [`EconomyEngine::mint_from_payment`].
    pub fn redeem_payment(
        &self,
        bridge: &dyn PaymentBridge,
        order_id: &str,
    ) -> EconomyResult<MintReceipt> {
        if order_id.trim().is_empty() {
            return Err(EconomyError::invalid("payment order id must not be empty"));
        }
        let report = bridge.verify_order(order_id)?;
        self.mint_from_payment(&report)
    }

    /// Mints coins for a verified, completed payment.
    ///
    /// `coins = amount * coins_per_major_unit`, rounded half-up. A
    /// delivery whose order id was already redeemed is a logged no-op
    /// (`coins_added = 0`), so provider retries cannot double-credit. A
    /// payment too small to mint a single coin is likewise a logged
    /// no-op rather than an error.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidParameters`] for an empty order id or an
    /// incomplete report, [`EconomyError::Storage`] if the credit cannot
    /// be made durable (nothing is mutated in that case).
    pub fn mint_from_payment(&self, report: &PaymentReport) -> EconomyResult<MintReceipt> {
        if report.order_id.trim().is_empty() {
            return Err(EconomyError::invalid("payment order id must not be empty"));
        }
        if !report.completed {
            return Err(EconomyError::invalid(format!(
                "payment {} is not completed",
                report.order_id
            )));
        }

        let key = identity::normalize(Some(&report.payer));
        let coins = report.amount.to_coins(self.config.coins_per_major_unit);

        let handle = self.ledger.get_or_create(&key);
        let mut account = handle.lock();

        if self.redeemed.lock().contains(&report.order_id) {
            warn!(
                order = %report.order_id,
                account = %key,
                "duplicate payment delivery ignored"
            );
            return Ok(MintReceipt {
                account_key: key,
                coins_added: 0,
                new_balance: account.balance,
            });
        }

        if coins == 0 {
            info!(
                order = %report.order_id,
                amount = %report.amount,
                "payment mints zero coins, ignored"
            );
            return Ok(MintReceipt {
                account_key: key,
                coins_added: 0,
                new_balance: account.balance,
            });
        }

        let before = account.clone();
        account.credit(coins)?;
        account.push_history(
            self.config.history_capacity,
            now_millis(),
            HistoryKind::Mint,
            format!("minted {coins} coins from payment {}", report.order_id),
        );

        if let Err(e) = self.store.commit(CommitSet {
            accounts: &[(key.as_str(), &*account)],
            listings: &[],
            redeemed_payment: Some(&report.order_id),
        }) {
            *account = before;
            return Err(e);
        }
        self.redeemed.lock().insert(report.order_id.clone());

        info!(
            account = %key,
            coins_added = coins,
            new_balance = account.balance,
            order = %report.order_id,
            "minted coins from payment"
        );
        Ok(MintReceipt {
            account_key: key,
            coins_added: coins,
            new_balance: account.balance,
        })
    }

    /// Grants items from the game's reward systems.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidParameters`] for an empty item id or zero
    /// quantity, [`EconomyError::Storage`] if the grant cannot be made
    /// durable.
    pub fn award_items(
        &self,
        account_raw: &str,
        item_id: &str,
        quantity: u32,
    ) -> EconomyResult<u32> {
        let item = validated_item(item_id)?;
        validated_positive(u64::from(quantity), "quantity")?;
        let key = identity::normalize(Some(account_raw));

        let handle = self.ledger.get_or_create(&key);
        let mut account = handle.lock();

        let before = account.clone();
        let new_count = account.add_items(item, quantity)?;
        account.push_history(
            self.config.history_capacity,
            now_millis(),
            HistoryKind::Award,
            format!("awarded {quantity}x {item}"),
        );

        if let Err(e) = self.store.commit(CommitSet {
            accounts: &[(key.as_str(), &*account)],
            ..CommitSet::default()
        }) {
            *account = before;
            return Err(e);
        }

        info!(account = %key, item = %item, quantity, new_count, "items awarded");
        Ok(new_count)
    }

    /// Spends coins on an in-game sink.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidParameters`] for a zero amount,
    /// [`EconomyError::InsufficientFunds`] if the balance cannot cover
    /// it, [`EconomyError::Storage`] if the debit cannot be made durable.
    pub fn spend(&self, account_raw: &str, amount: u64, reason: &str) -> EconomyResult<u64> {
        validated_positive(amount, "amount")?;
        let key = identity::normalize(Some(account_raw));

        let handle = self.ledger.get_or_create(&key);
        let mut account = handle.lock();

        let before = account.clone();
        let new_balance = account.debit(amount)?;
        account.push_history(
            self.config.history_capacity,
            now_millis(),
            HistoryKind::Spend,
            format!("spent {amount} coins on {reason}"),
        );

        if let Err(e) = self.store.commit(CommitSet {
            accounts: &[(key.as_str(), &*account)],
            ..CommitSet::default()
        }) {
            *account = before;
            return Err(e);
        }

        info!(account = %key, amount, new_balance, reason = %reason, "coins spent");
        Ok(new_balance)
    }

    /// Public projections of every open listing, oldest first.
    #[must_use]
    pub fn list_open_listings(&self) -> Vec<ListingView> {
        self.listings.list_open()
    }

    /// Puts items on the market, escrowing them out of the seller's
    /// inventory in the same durable transaction that creates the
    /// listing.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidParameters`] for bad parameters,
    /// [`EconomyError::InsufficientInventory`] if the seller does not
    /// hold the items, [`EconomyError::Storage`] if the commit fails
    /// (the escrow is rolled back; nothing is lost).
    pub fn create_listing(
        &self,
        seller_raw: &str,
        item_id: &str,
        quantity: u32,
        price: u64,
    ) -> EconomyResult<Listing> {
        let item = validated_item(item_id)?;
        validated_positive(u64::from(quantity), "quantity")?;
        validated_positive(price, "price")?;
        let key = identity::normalize(Some(seller_raw));

        let handle = self.ledger.get_or_create(&key);
        let mut account = handle.lock();

        let before = account.clone();
        account.remove_items(item, quantity)?;

        let listing = match self.listings.create(&key, item, quantity, price) {
            Ok(listing) => listing,
            Err(e) => {
                *account = before;
                return Err(e);
            }
        };
        account.push_history(
            self.config.history_capacity,
            now_millis(),
            HistoryKind::ListingCreated,
            format!("listed {quantity}x {item} for {price} coins ({})", listing.id),
        );

        if let Err(e) = self.store.commit(CommitSet {
            accounts: &[(key.as_str(), &*account)],
            listings: &[&listing],
            redeemed_payment: None,
        }) {
            *account = before;
            self.listings.discard(&listing.id);
            return Err(e);
        }

        info!(
            seller = %key,
            listing = %listing.id,
            item = %item,
            quantity,
            price,
            "listing created"
        );
        Ok(listing)
    }

    /// Buys an open listing.
    ///
    /// Once the buyer's debit succeeds, the seller credit, the item
    /// delivery, and the sold transition all commit together or the
    /// whole purchase is rolled back; coins can neither vanish nor
    /// double.
    ///
    /// # Errors
    ///
    /// [`EconomyError::NotFound`] / [`EconomyError::InvalidState`] for an
    /// unknown or no-longer-open listing, [`EconomyError::SelfTrade`] if
    /// the buyer is the seller, [`EconomyError::InsufficientFunds`] if
    /// the buyer cannot pay, [`EconomyError::Storage`] if the commit
    /// fails.
    pub fn buy_listing(
        &self,
        buyer_raw: &str,
        listing_id: &str,
    ) -> EconomyResult<PurchaseReceipt> {
        if listing_id.trim().is_empty() {
            return Err(EconomyError::invalid("listing id must not be empty"));
        }
        let buyer_key = identity::normalize(Some(buyer_raw));

        let peek = self.listings.find_open(listing_id)?;
        if peek.seller == buyer_key {
            return Err(EconomyError::SelfTrade);
        }

        let buyer_handle = self.ledger.get_or_create(&buyer_key);
        let seller_handle = self.ledger.get_or_create(&peek.seller);
        let (mut buyer, mut seller) =
            PlayerLedger::lock_pair(&buyer_key, &buyer_handle, &peek.seller, &seller_handle);

        let listing_handle = self
            .listings
            .handle(listing_id)
            .ok_or_else(|| EconomyError::not_found(format!("listing {listing_id}")))?;
        let mut listing = listing_handle.lock();
        // The listing may have sold or been cancelled between the peek
        // and this lock; exactly one concurrent buyer passes this check.
        listing.require_open()?;

        let before_buyer = buyer.clone();
        let before_seller = seller.clone();
        let before_listing = listing.clone();
        let at_ms = now_millis();

        let staged = buyer
            .debit(listing.price)
            .and_then(|_| seller.credit(listing.price))
            .and_then(|_| buyer.add_items(&listing.item_id, listing.quantity))
            .and_then(|_| listing.mark_sold(&buyer_key, at_ms));
        if let Err(e) = staged {
            *buyer = before_buyer;
            *seller = before_seller;
            *listing = before_listing;
            return Err(e);
        }

        buyer.push_history(
            self.config.history_capacity,
            at_ms,
            HistoryKind::Purchase,
            format!(
                "bought {}x {} for {} coins from {} ({})",
                listing.quantity, listing.item_id, listing.price, listing.seller, listing.id
            ),
        );
        seller.push_history(
            self.config.history_capacity,
            at_ms,
            HistoryKind::Sale,
            format!(
                "sold {}x {} for {} coins to {} ({})",
                listing.quantity, listing.item_id, listing.price, buyer_key, listing.id
            ),
        );

        if let Err(e) = self.store.commit(CommitSet {
            accounts: &[(buyer_key.as_str(), &*buyer), (peek.seller.as_str(), &*seller)],
            listings: &[&*listing],
            redeemed_payment: None,
        }) {
            *buyer = before_buyer;
            *seller = before_seller;
            *listing = before_listing;
            return Err(e);
        }

        info!(
            buyer = %buyer_key,
            seller = %listing.seller,
            listing = %listing.id,
            price = listing.price,
            "listing sold"
        );
        Ok(PurchaseReceipt {
            listing_id: listing.id.clone(),
            item_id: listing.item_id.clone(),
            quantity: listing.quantity,
            new_balance: buyer.balance,
            new_inventory_count: buyer.item_count(&listing.item_id),
        })
    }

    /// Cancels the caller's own open listing, returning the escrowed
    /// items.
    ///
    /// # Errors
    ///
    /// [`EconomyError::NotFound`] for an unknown id,
    /// [`EconomyError::InvalidState`] if the listing already closed,
    /// [`EconomyError::NotOwner`] if the caller is not the seller,
    /// [`EconomyError::Storage`] if the commit fails.
    pub fn cancel_listing(&self, seller_raw: &str, listing_id: &str) -> EconomyResult<()> {
        if listing_id.trim().is_empty() {
            return Err(EconomyError::invalid("listing id must not be empty"));
        }
        let key = identity::normalize(Some(seller_raw));

        let peek = self.listings.find_open(listing_id)?;
        if peek.seller != key {
            return Err(EconomyError::NotOwner);
        }

        let handle = self.ledger.get_or_create(&key);
        let mut seller = handle.lock();

        let listing_handle = self
            .listings
            .handle(listing_id)
            .ok_or_else(|| EconomyError::not_found(format!("listing {listing_id}")))?;
        let mut listing = listing_handle.lock();
        listing.require_open()?;

        let before_seller = seller.clone();
        let before_listing = listing.clone();
        let at_ms = now_millis();

        let staged = seller
            .add_items(&listing.item_id, listing.quantity)
            .and_then(|_| listing.mark_cancelled(at_ms));
        if let Err(e) = staged {
            *seller = before_seller;
            *listing = before_listing;
            return Err(e);
        }

        seller.push_history(
            self.config.history_capacity,
            at_ms,
            HistoryKind::ListingCancelled,
            format!(
                "cancelled listing {} ({}x {} returned)",
                listing.id, listing.quantity, listing.item_id
            ),
        );

        if let Err(e) = self.store.commit(CommitSet {
            accounts: &[(key.as_str(), &*seller)],
            listings: &[&*listing],
            redeemed_payment: None,
        }) {
            *seller = before_seller;
            *listing = before_listing;
            return Err(e);
        }

        info!(seller = %key, listing = %listing.id, "listing cancelled");
        Ok(())
    }

    /// Moves items directly between two players, no currency involved.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidParameters`] for bad parameters or a
    /// self-exchange, [`EconomyError::InsufficientInventory`] if the
    /// sender does not hold the items, [`EconomyError::Storage`] if the
    /// commit fails.
    pub fn exchange_items(
        &self,
        from_raw: &str,
        to_raw: &str,
        item_id: &str,
        quantity: u32,
    ) -> EconomyResult<()> {
        let item = validated_item(item_id)?;
        validated_positive(u64::from(quantity), "quantity")?;
        let from_key = identity::normalize(Some(from_raw));
        let to_key = identity::normalize(Some(to_raw));
        if from_key == to_key {
            return Err(EconomyError::invalid("cannot exchange items with yourself"));
        }

        let from_handle = self.ledger.get_or_create(&from_key);
        let to_handle = self.ledger.get_or_create(&to_key);
        let (mut from, mut to) =
            PlayerLedger::lock_pair(&from_key, &from_handle, &to_key, &to_handle);

        let before_from = from.clone();
        let before_to = to.clone();
        let at_ms = now_millis();

        from.remove_items(item, quantity)?;
        if let Err(e) = to.add_items(item, quantity) {
            *from = before_from;
            return Err(e);
        }

        from.push_history(
            self.config.history_capacity,
            at_ms,
            HistoryKind::Exchange,
            format!("gave {quantity}x {item} to {to_key}"),
        );
        to.push_history(
            self.config.history_capacity,
            at_ms,
            HistoryKind::Exchange,
            format!("received {quantity}x {item} from {from_key}"),
        );

        if let Err(e) = self.store.commit(CommitSet {
            accounts: &[(from_key.as_str(), &*from), (to_key.as_str(), &*to)],
            ..CommitSet::default()
        }) {
            *from = before_from;
            *to = before_to;
            return Err(e);
        }

        info!(from = %from_key, to = %to_key, item = %item, quantity, "items exchanged");
        Ok(())
    }

    /// Operational counters.
    #[must_use]
    pub fn stats(&self) -> EconomyStats {
        EconomyStats {
            accounts: self.ledger.account_count(),
            open_listings: self.listings.open_count(),
            total_coins: self.ledger.total_coins(),
        }
    }
}

/// Trims an item id and rejects empties.
fn validated_item(item_id: &str) -> EconomyResult<&str> {
    let item = item_id.trim();
    if item.is_empty() {
        return Err(EconomyError::invalid("item id must not be empty"));
    }
    Ok(item)
}

/// Rejects zero where only a positive value makes sense.
fn validated_positive(value: u64, what: &str) -> EconomyResult<()> {
    if value == 0 {
        return Err(EconomyError::invalid(format!("{what} must be positive")));
    }
    Ok(())
}
