//! Payment intent hand-off. The gateway itself is an external collaborator;
//! the marketplace only validates the amount and forwards it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::MarketplaceError;
use super::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Price in major currency units.
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: String,
    pub amount: u64,
    pub currency: String,
}

/// Outbound hook to the card processor.
pub trait PaymentGateway: Send + Sync {
    fn create_intent(&self, amount: u64, currency: &str) -> Result<PaymentIntent, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("payment gateway unavailable: {0}")]
    Transport(String),
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),
}

pub struct PaymentDesk<G> {
    gateway: Arc<G>,
    currency: String,
}

impl<G> Clone for PaymentDesk<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            currency: self.currency.clone(),
        }
    }
}

impl<G> PaymentDesk<G>
where
    G: PaymentGateway + 'static,
{
    pub fn new(gateway: Arc<G>, currency: impl Into<String>) -> Self {
        Self {
            gateway,
            currency: currency.into(),
        }
    }

    pub fn create_intent(
        &self,
        caller: &Identity,
        request: PaymentRequest,
    ) -> Result<PaymentIntent, MarketplaceError> {
        let amount = minor_units(request.price)?;
        debug!(payer = %caller.email, amount, currency = %self.currency, "creating payment intent");
        Ok(self.gateway.create_intent(amount, &self.currency)?)
    }
}

/// Convert a major-unit price to minor units, truncating fractions of a cent.
pub fn minor_units(price: f64) -> Result<u64, MarketplaceError> {
    if !price.is_finite() {
        return Err(MarketplaceError::InvalidArgument(
            "price must be a finite number".to_string(),
        ));
    }
    let amount = (price * 100.0).trunc();
    if amount < 1.0 {
        return Err(MarketplaceError::InvalidArgument(
            "payment amount must be at least one minor unit".to_string(),
        ));
    }
    if amount > u64::MAX as f64 {
        return Err(MarketplaceError::InvalidArgument(
            "payment amount is too large".to_string(),
        ));
    }
    Ok(amount as u64)
}
