//! # GILDHALL Core Primitives
//!
//! Shared building blocks for the GILDHALL player economy.
//!
//! ## Design Principles
//!
//! 1. **Pure functions** - nothing here holds state or takes locks
//! 2. **Zero floating point** - currency amounts use fixed-point integers
//! 3. **Canonical identity** - every player name passes through one
//!    normalizer before it is stored or compared
//!
//! ## Example
//!
//! ```rust
//! use gildhall_core::{identity, money::MajorAmount};
//!
//! let key = identity::normalize(Some("  Alice  "));
//! assert_eq!(key, "Alice");
//!
//! let paid: MajorAmount = "3.00".parse().unwrap();
//! assert_eq!(paid.to_coins(3000), 9000);
//! ```

pub mod identity;
pub mod ids;
pub mod money;

pub use identity::{normalize, GUEST_KEY};
pub use ids::{new_listing_id, now_millis};
pub use money::{MajorAmount, ParseAmountError};
