//! # GILDHALL Economy System
//!
//! Persistent player economy for the GILDHALL browser game: a currency
//! ledger, per-player item inventories, and a multi-seller marketplace
//! that moves coins and items between players under consistency
//! guarantees.
//!
//! ## Design Principles
//!
//! 1. **Currency is conserved** - trades move coins; only a confirmed
//!    payment mints them
//! 2. **Escrow over reservation** - listed items leave the seller's
//!    inventory at listing time, so double-listing cannot exist
//! 3. **Durable before acknowledged** - every mutation lands in the
//!    crash-safe snapshot before the caller hears "ok"
//! 4. **Business errors are values** - refusals come back as structured
//!    [`EconomyError`] results, never panics
//!
//! ## Thread Safety
//!
//! One [`EconomyEngine`] serves every concurrent request. Accounts and
//! listings carry their own locks; composite operations acquire them in
//! a fixed global order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gildhall_economy::{EconomyConfig, EconomyEngine, PaymentReport};
//!
//! let engine = EconomyEngine::open(EconomyConfig::from_toml("economy.toml")?)?;
//!
//! // A verified payment arrives from the bridge.
//! let receipt = engine.mint_from_payment(&PaymentReport {
//!     order_id: "5O190127TN364715T".into(),
//!     payer: "Alice".into(),
//!     amount: "3.00".parse()?,
//!     completed: true,
//! })?;
//! assert_eq!(receipt.coins_added, 6000);
//!
//! // Alice puts two embers on the market; Bob buys them.
//! let listing = engine.create_listing("Alice", "ember", 2, 500)?;
//! engine.buy_listing("Bob", &listing.id)?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod listings;
pub mod payment;
pub mod store;

pub use config::EconomyConfig;
pub use engine::{AccountView, EconomyEngine, EconomyStats, MintReceipt, PurchaseReceipt};
pub use error::{EconomyError, EconomyResult};
pub use ledger::{Account, HistoryEvent, HistoryKind, ItemId, PlayerLedger};
pub use listings::{Listing, ListingStatus, ListingStore, ListingView};
pub use payment::{PaymentBridge, PaymentReport};
pub use store::{CommitSet, EconomySnapshot, SnapshotStore};
