//! # Listing Store
//!
//! Owns the marketplace's listings and their lifecycle.
//!
//! A listing's status moves one way only: `Open -> Sold` or
//! `Open -> Cancelled`, never back, never again. Both transitions are
//! enforced in exactly one place, the methods on [`Listing`] itself, so
//! no caller can invent a third path out of `Open`. Terminal listings are
//! kept for audit; nothing is ever physically deleted.
//!
//! While a listing is open its items are escrowed: the engine removed
//! them from the seller's inventory before the listing was created, which
//! makes double-listing the same items structurally impossible.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use gildhall_core::{new_listing_id, now_millis};

use crate::error::{EconomyError, EconomyResult};
use crate::ledger::ItemId;

/// Lifecycle state of a listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// On the market, items escrowed.
    Open,
    /// Bought; items delivered to the buyer.
    Sold,
    /// Withdrawn; items returned to the seller.
    Cancelled,
}

impl ListingStatus {
    /// Lowercase label for log and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Sold => "sold",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One seller's offer: a fixed quantity of one item for a fixed price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Unique, unguessable identifier.
    pub id: String,
    /// Canonical key of the selling account.
    pub seller: String,
    /// Item on offer.
    pub item_id: ItemId,
    /// Quantity escrowed into the listing.
    pub quantity: u32,
    /// Price in coins for the whole lot.
    pub price: u64,
    /// Lifecycle state.
    pub status: ListingStatus,
    /// Unix milliseconds at creation.
    pub created_at_ms: u64,
    /// Canonical key of the buying account, once sold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<String>,
    /// Unix milliseconds at sale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sold_at_ms: Option<u64>,
    /// Unix milliseconds at cancellation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at_ms: Option<u64>,
}

impl Listing {
    /// True while the listing is on the market.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ListingStatus::Open
    }

    pub(crate) fn require_open(&self) -> EconomyResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(EconomyError::InvalidState {
                reason: format!("listing {} is {}", self.id, self.status.as_str()),
            })
        }
    }

    /// Transitions `Open -> Sold`.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidState`] if the listing is not open.
    pub fn mark_sold(&mut self, buyer: &str, at_ms: u64) -> EconomyResult<()> {
        self.require_open()?;
        self.status = ListingStatus::Sold;
        self.buyer = Some(buyer.to_owned());
        self.sold_at_ms = Some(at_ms);
        Ok(())
    }

    /// Transitions `Open -> Cancelled`.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidState`] if the listing is not open.
    pub fn mark_cancelled(&mut self, at_ms: u64) -> EconomyResult<()> {
        self.require_open()?;
        self.status = ListingStatus::Cancelled;
        self.cancelled_at_ms = Some(at_ms);
        Ok(())
    }
}

/// Public projection of an open listing.
///
/// Buyers see what they need to decide a purchase and nothing else;
/// timestamps and terminal fields stay private to the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListingView {
    /// Listing identifier.
    pub id: String,
    /// Item on offer.
    pub item_id: ItemId,
    /// Selling account.
    pub seller: String,
    /// Quantity on offer.
    pub quantity: u32,
    /// Price in coins for the whole lot.
    pub price: u64,
}

impl From<&Listing> for ListingView {
    fn from(listing: &Listing) -> Self {
        Self {
            id: listing.id.clone(),
            item_id: listing.item_id.clone(),
            seller: listing.seller.clone(),
            quantity: listing.quantity,
            price: listing.price,
        }
    }
}

/// Shared handle to one listing's lock.
pub(crate) type ListingHandle = Arc<Mutex<Listing>>;

/// The marketplace's set of listings.
///
/// Every listing sits behind its own mutex so status transitions are
/// serialized per listing: two concurrent purchases of the same id can
/// never both observe it open. The raw collection is never exposed.
#[derive(Debug, Default)]
pub struct ListingStore {
    listings: RwLock<HashMap<String, ListingHandle>>,
}

impl ListingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store from snapshot records.
    #[must_use]
    pub fn from_listings(records: BTreeMap<String, Listing>) -> Self {
        let listings = records
            .into_values()
            .map(|listing| (listing.id.clone(), Arc::new(Mutex::new(listing))))
            .collect();
        Self {
            listings: RwLock::new(listings),
        }
    }

    /// Validates and inserts a fresh open listing.
    ///
    /// Inventory escrow is the engine's job and happens before this call.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidParameters`] for an empty item id,
    /// zero quantity, or zero price.
    pub fn create(
        &self,
        seller: &str,
        item_id: &str,
        quantity: u32,
        price: u64,
    ) -> EconomyResult<Listing> {
        let item_id = item_id.trim();
        if item_id.is_empty() {
            return Err(EconomyError::invalid("item id must not be empty"));
        }
        if quantity == 0 {
            return Err(EconomyError::invalid("quantity must be positive"));
        }
        if price == 0 {
            return Err(EconomyError::invalid("price must be positive"));
        }

        let listing = Listing {
            id: new_listing_id(),
            seller: seller.to_owned(),
            item_id: item_id.to_owned(),
            quantity,
            price,
            status: ListingStatus::Open,
            created_at_ms: now_millis(),
            buyer: None,
            sold_at_ms: None,
            cancelled_at_ms: None,
        };

        self.listings
            .write()
            .insert(listing.id.clone(), Arc::new(Mutex::new(listing.clone())));
        Ok(listing)
    }

    /// Returns a point-in-time copy of an open listing.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::NotFound`] for an unknown id and
    /// [`EconomyError::InvalidState`] for a known but terminal listing.
    pub fn find_open(&self, id: &str) -> EconomyResult<Listing> {
        let handle = self
            .handle(id)
            .ok_or_else(|| EconomyError::not_found(format!("listing {id}")))?;
        let listing = handle.lock();
        listing.require_open()?;
        Ok(listing.clone())
    }

    /// Transitions a listing `Open -> Sold`.
    ///
    /// # Errors
    ///
    /// [`EconomyError::NotFound`] for an unknown id,
    /// [`EconomyError::InvalidState`] if the listing is not open.
    pub fn mark_sold(&self, id: &str, buyer: &str) -> EconomyResult<Listing> {
        let handle = self
            .handle(id)
            .ok_or_else(|| EconomyError::not_found(format!("listing {id}")))?;
        let mut listing = handle.lock();
        listing.mark_sold(buyer, now_millis())?;
        Ok(listing.clone())
    }

    /// Transitions a listing `Open -> Cancelled`.
    ///
    /// # Errors
    ///
    /// [`EconomyError::NotFound`] for an unknown id,
    /// [`EconomyError::InvalidState`] if the listing is not open.
    pub fn mark_cancelled(&self, id: &str) -> EconomyResult<Listing> {
        let handle = self
            .handle(id)
            .ok_or_else(|| EconomyError::not_found(format!("listing {id}")))?;
        let mut listing = handle.lock();
        listing.mark_cancelled(now_millis())?;
        Ok(listing.clone())
    }

    /// Public projections of every open listing, oldest first.
    #[must_use]
    pub fn list_open(&self) -> Vec<ListingView> {
        let mut open: Vec<(u64, ListingView)> = self
            .listings
            .read()
            .values()
            .filter_map(|handle| {
                let listing = handle.lock();
                listing
                    .is_open()
                    .then(|| (listing.created_at_ms, ListingView::from(&*listing)))
            })
            .collect();
        open.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        open.into_iter().map(|(_, view)| view).collect()
    }

    /// Number of open listings.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.listings
            .read()
            .values()
            .filter(|handle| handle.lock().is_open())
            .count()
    }

    /// Lock handle for the engine's critical sections.
    pub(crate) fn handle(&self, id: &str) -> Option<ListingHandle> {
        self.listings.read().get(id).map(Arc::clone)
    }

    /// Removes a listing that was inserted but never durably committed.
    pub(crate) fn discard(&self, id: &str) {
        self.listings.write().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_listing() -> (ListingStore, Listing) {
        let store = ListingStore::new();
        let listing = store.create("Alice", "ember", 2, 500).unwrap();
        (store, listing)
    }

    #[test]
    fn test_create_validates_parameters() {
        let store = ListingStore::new();
        assert!(matches!(
            store.create("Alice", "  ", 1, 1),
            Err(EconomyError::InvalidParameters { .. })
        ));
        assert!(matches!(
            store.create("Alice", "ember", 0, 1),
            Err(EconomyError::InvalidParameters { .. })
        ));
        assert!(matches!(
            store.create("Alice", "ember", 1, 0),
            Err(EconomyError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_create_trims_item_id() {
        let store = ListingStore::new();
        let listing = store.create("Alice", " ember ", 1, 10).unwrap();
        assert_eq!(listing.item_id, "ember");
    }

    #[test]
    fn test_find_open_semantics() {
        let (store, listing) = store_with_listing();
        assert_eq!(store.find_open(&listing.id).unwrap().id, listing.id);
        assert!(matches!(
            store.find_open("missing"),
            Err(EconomyError::NotFound { .. })
        ));

        store.mark_sold(&listing.id, "Bob").unwrap();
        assert!(matches!(
            store.find_open(&listing.id),
            Err(EconomyError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_transitions_are_one_way() {
        let (store, listing) = store_with_listing();

        let sold = store.mark_sold(&listing.id, "Bob").unwrap();
        assert_eq!(sold.status, ListingStatus::Sold);
        assert_eq!(sold.buyer.as_deref(), Some("Bob"));
        assert!(sold.sold_at_ms.is_some());

        // No re-sale, no cancellation, no way back to open.
        assert!(matches!(
            store.mark_sold(&listing.id, "Carol"),
            Err(EconomyError::InvalidState { .. })
        ));
        assert!(matches!(
            store.mark_cancelled(&listing.id),
            Err(EconomyError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_cancel_then_cancel_again() {
        let (store, listing) = store_with_listing();
        let cancelled = store.mark_cancelled(&listing.id).unwrap();
        assert_eq!(cancelled.status, ListingStatus::Cancelled);
        assert!(cancelled.cancelled_at_ms.is_some());
        assert!(matches!(
            store.mark_cancelled(&listing.id),
            Err(EconomyError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_list_open_projects_and_filters() {
        let (store, first) = store_with_listing();
        let second = store.create("Bob", "relic", 1, 900).unwrap();
        store.mark_sold(&second.id, "Alice").unwrap();

        let open = store.list_open();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, first.id);
        assert_eq!(open[0].item_id, "ember");
        assert_eq!(open[0].quantity, 2);
        assert_eq!(open[0].price, 500);
        assert_eq!(store.open_count(), 1);
    }

    #[test]
    fn test_terminal_listings_are_retained() {
        let (store, listing) = store_with_listing();
        store.mark_cancelled(&listing.id).unwrap();
        assert!(store.handle(&listing.id).is_some());
    }
}
