use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{FeeKind, OrderRef, ReferralRequest};

/// Context forwarded to the provider when an order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMetadata {
    pub request_id: String,
    pub fee: FeeKind,
}

/// Provider-agnostic order handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOrder {
    pub order_ref: OrderRef,
    pub amount_minor: u64,
    pub currency: String,
}

/// Signed result delivered by the provider, either through the client's
/// browser callback or the asynchronous webhook. Both carry the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPaymentPayload {
    pub order_ref: OrderRef,
    pub payment_ref: String,
    pub signature: String,
}

/// External payment provider boundary.
pub trait PaymentProvider: Send + Sync {
    fn create_order(
        &self,
        amount_minor: u64,
        currency: &str,
        metadata: OrderMetadata,
    ) -> Result<ProviderOrder, GatewayFailure>;

    /// Validate the provider signature over a payment payload.
    fn verify_signature(&self, payload: &SignedPaymentPayload) -> bool;
}

/// The external provider was unreachable or rejected order creation.
#[derive(Debug, thiserror::Error)]
#[error("payment gateway failure: {0}")]
pub struct GatewayFailure(pub String);

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment signature rejected for order {order_ref}")]
    Verification { order_ref: String },
    #[error("payment order {order_ref} does not match this fee")]
    UnknownOrder { order_ref: String },
    #[error(transparent)]
    Gateway(#[from] GatewayFailure),
}

/// Result of asking the gate for a payment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOrderOutcome {
    /// The fee was already settled; no provider call was made.
    AlreadyPaid,
    Created(ProviderOrder),
}

/// Decides whether a fee needs an order and validates provider results.
///
/// The gate never writes: callers apply verified results under a
/// fee-unpaid conditional update so the callback and webhook paths stay
/// idempotent.
pub struct PaymentGate<P> {
    provider: Arc<P>,
    currency: String,
}

impl<P: PaymentProvider> PaymentGate<P> {
    pub fn new(provider: Arc<P>, currency: impl Into<String>) -> Self {
        Self {
            provider,
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Request a provider order for the given fee.
    ///
    /// Settled fees short-circuit to `AlreadyPaid` without touching the
    /// provider. An unpaid fee always gets a fresh order so the user can
    /// re-initiate after a gateway failure.
    pub fn create_order(
        &self,
        request: &ReferralRequest,
        kind: FeeKind,
    ) -> Result<PaymentOrderOutcome, PaymentError> {
        let fee = request.fee(kind);
        if fee.paid {
            return Ok(PaymentOrderOutcome::AlreadyPaid);
        }

        let order = self.provider.create_order(
            fee.amount_minor,
            &self.currency,
            OrderMetadata {
                request_id: request.id.0.clone(),
                fee: kind,
            },
        )?;

        Ok(PaymentOrderOutcome::Created(order))
    }

    /// Validate a signed payload against the stored order reference.
    ///
    /// On failure the fee is left unpaid and the order retained, so a later
    /// webhook retry can still land.
    pub fn verify(
        &self,
        request: &ReferralRequest,
        kind: FeeKind,
        payload: &SignedPaymentPayload,
    ) -> Result<(), PaymentError> {
        let fee = request.fee(kind);
        match &fee.order_ref {
            Some(stored) if *stored == payload.order_ref => {}
            _ => {
                return Err(PaymentError::UnknownOrder {
                    order_ref: payload.order_ref.0.clone(),
                })
            }
        }

        if !self.provider.verify_signature(payload) {
            return Err(PaymentError::Verification {
                order_ref: payload.order_ref.0.clone(),
            });
        }

        Ok(())
    }
}
