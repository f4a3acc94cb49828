//! # Payment Bridge
//!
//! The economy never talks to the payment provider itself. An external
//! collaborator owns the provider's OAuth and capture plumbing, verifies
//! that an order really completed, and reports the three facts the
//! economy needs: who paid, how much, and whether the capture finished.
//!
//! The engine trusts a completed report exactly once per order id; see
//! `EconomyEngine::mint_from_payment` for the idempotency rules.

use serde::{Deserialize, Serialize};

use gildhall_core::MajorAmount;

use crate::error::EconomyResult;

/// A verified payment, as reported by the bridge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReport {
    /// The provider's order id; the mint idempotency key.
    pub order_id: String,
    /// Payer identity as the provider carries it, still un-normalized.
    pub payer: String,
    /// Amount captured, in major currency units.
    pub amount: MajorAmount,
    /// Whether the provider confirmed the capture as completed.
    pub completed: bool,
}

/// External collaborator that verifies orders with the payment provider.
///
/// Implementations perform the provider round-trip (token, capture
/// lookup) and map transport or verification failures to
/// `EconomyError::UpstreamUnavailable`. The call happens outside every
/// ledger lock, so a slow provider never stalls the economy.
pub trait PaymentBridge: Send + Sync {
    /// Verifies an order and reports its settled state.
    ///
    /// # Errors
    ///
    /// `EconomyError::UpstreamUnavailable` when the provider cannot be
    /// reached or the order cannot be verified.
    fn verify_order(&self, order_id: &str) -> EconomyResult<PaymentReport>;
}
