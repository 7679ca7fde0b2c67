//! Client side of the Transaction Gateway.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{CreateTransactionRequest, CreateTransactionResponse, MOCK_TOKEN};
use crate::services::{PaymentTokenSource, TokenOutcome};
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches checkout tokens from `POST {base_url}/create-transaction`.
pub struct GatewayClient {
    client: Client,
    base_url: Option<String>,
    is_production: bool,
}

impl GatewayClient {
    pub fn new(base_url: Option<String>, is_production: bool) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            is_production,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backend_url.clone(), config.is_production())
    }
}

#[async_trait]
impl PaymentTokenSource for GatewayClient {
    async fn request_token(&self, product_label: &str, amount: i64) -> Result<TokenOutcome> {
        info!("Initiating payment for: {} (Rp {})", product_label, amount);

        let Some(base_url) = self.base_url.as_deref() else {
            if self.is_production {
                return Ok(TokenOutcome::ConfigError(
                    "BACKEND_URL is not configured in production".to_string(),
                ));
            }
            warn!("BACKEND_URL is not defined. Falling back to mock token for payment simulation.");
            return Ok(TokenOutcome::Mock);
        };

        let body = CreateTransactionRequest {
            product_name: Some(product_label.to_string()),
            amount: Some(amount),
        };
        let response = self
            .client
            .post(format!("{}/create-transaction", base_url))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Gateway(format!("Request failed with status {}", status.as_u16())));
        }

        let text = response.text().await?;
        let parsed: CreateTransactionResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Gateway(format!("Invalid token response from backend: {}", e)))?;

        match parsed.token.trim() {
            "" => Err(Error::Gateway("Invalid token response from backend".to_string())),
            MOCK_TOKEN => Ok(TokenOutcome::Mock),
            token => Ok(TokenOutcome::Real(token.to_string())),
        }
    }
}
