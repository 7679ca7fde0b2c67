//! Server side of the checkout: turns a (label, amount) pair into a Snap token.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, Environment};
use crate::midtrans::{PaymentProvider, SnapClient, SnapOrder};
use crate::models::{PaymentSession, DEFAULT_LICENSE_LABEL, DEFAULT_PRICE, MOCK_TOKEN};
use crate::{Error, Result};

/// A token as issued by the gateway, before it is flattened to a string on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuedToken {
    Real(String),
    Mock,
}

impl IssuedToken {
    pub fn into_token(self) -> String {
        match self {
            IssuedToken::Real(token) => token,
            IssuedToken::Mock => MOCK_TOKEN.to_string(),
        }
    }
}

pub struct TransactionGateway {
    provider: Option<Arc<dyn PaymentProvider>>,
    environment: Environment,
}

impl TransactionGateway {
    /// `provider` is `None` when no payment credentials are configured.
    pub fn new(provider: Option<Arc<dyn PaymentProvider>>, environment: Environment) -> Self {
        Self { provider, environment }
    }

    pub fn from_config(config: &Config) -> Self {
        let provider = SnapClient::from_config(config).map(|c| Arc::new(c) as Arc<dyn PaymentProvider>);
        if provider.is_none() {
            warn!(
                "[Midtrans] WARNING: server key is not set. Set MIDTRANS_SERVER_KEY_SANDBOX, \
                 MIDTRANS_SERVER_KEY_PRODUCTION or MIDTRANS_SERVER_KEY"
            );
        }
        Self::new(provider, config.environment)
    }

    pub async fn create_session(&self, product_label: &str, amount: Option<i64>) -> Result<PaymentSession> {
        let product_label = match product_label.trim() {
            "" => DEFAULT_LICENSE_LABEL.to_string(),
            label => label.to_string(),
        };
        let amount = amount.filter(|a| *a > 0).unwrap_or(DEFAULT_PRICE);

        let token = self.issue(&product_label, amount).await?;
        Ok(PaymentSession {
            token: token.into_token(),
            product_label,
            amount,
            created_at: Utc::now(),
        })
    }

    async fn issue(&self, product_label: &str, amount: i64) -> Result<IssuedToken> {
        let production = self.environment.is_production();

        let Some(provider) = self.provider.as_ref() else {
            if production {
                return Err(Error::PaymentConfig(
                    "payment credentials are not configured in production".to_string(),
                ));
            }
            warn!("⚠️ No Midtrans server key, issuing mock token for {}", product_label);
            return Ok(IssuedToken::Mock);
        };

        let order = SnapOrder::poster_license(new_order_id(), product_label, amount);
        match provider.create_transaction(&order).await {
            Ok(token) => {
                info!("✅ Issued Snap token for order {}", order.transaction_details.order_id);
                Ok(IssuedToken::Real(token))
            }
            Err(e) if production => Err(e),
            Err(e) => {
                warn!("⚠️ Midtrans call failed ({}), falling back to mock token", e);
                Ok(IssuedToken::Mock)
            }
        }
    }
}

fn new_order_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("ORDER-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}
