//! Midtrans Snap transaction API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::config::{Config, Environment};
use crate::{Error, Result};

pub const SANDBOX_API_BASE: &str = "https://app.sandbox.midtrans.com";
pub const PRODUCTION_API_BASE: &str = "https://app.midtrans.com";
pub const POSTER_ITEM_ID: &str = "poster-license";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapOrder {
    pub transaction_details: TransactionDetails,
    pub item_details: Vec<ItemDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionDetails {
    pub order_id: String,
    pub gross_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDetails {
    pub id: String,
    pub price: i64,
    pub quantity: u32,
    pub name: String,
}

impl SnapOrder {
    /// One poster license at `amount`.
    pub fn poster_license(order_id: impl Into<String>, name: impl Into<String>, amount: i64) -> Self {
        Self {
            transaction_details: TransactionDetails { order_id: order_id.into(), gross_amount: amount },
            item_details: vec![ItemDetails {
                id: POSTER_ITEM_ID.to_string(),
                price: amount,
                quantity: 1,
                name: name.into(),
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct SnapTransaction {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    redirect_url: Option<String>,
}

/// Creates a checkout session with the payment provider and returns its token.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_transaction(&self, order: &SnapOrder) -> Result<String>;
}

pub struct SnapClient {
    client: Client,
    server_key: String,
    base_url: String,
}

impl SnapClient {
    pub fn new(server_key: String, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            server_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `None` when no server key is configured for the active environment.
    pub fn from_config(config: &Config) -> Option<Self> {
        let server_key = config.midtrans_server_key.clone()?;
        let base_url = config.midtrans_api_base.clone().unwrap_or_else(|| {
            match config.environment {
                Environment::Production => PRODUCTION_API_BASE,
                Environment::Sandbox => SANDBOX_API_BASE,
            }
            .to_string()
        });
        Some(Self::new(server_key, base_url))
    }
}

#[async_trait]
impl PaymentProvider for SnapClient {
    async fn create_transaction(&self, order: &SnapOrder) -> Result<String> {
        let url = format!("{}/snap/v1/transactions", self.base_url);
        info!("🔗 Creating Snap transaction {}", order.transaction_details.order_id);

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(30))
            .basic_auth(&self.server_key, Some(""))
            .header("Accept", "application/json")
            .json(order)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("❌ Midtrans error response (status {}): {}", status, body);
            return Err(Error::Gateway(format!("Midtrans API error (status {})", status.as_u16())));
        }

        let transaction: SnapTransaction = serde_json::from_str(&body)?;
        match transaction.token.filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::debug!("Snap redirect: {:?}", transaction.redirect_url);
                Ok(token)
            }
            None => Err(Error::Gateway("Midtrans response did not contain a token".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order() -> SnapOrder {
        SnapOrder::poster_license("ORDER-1", "Kopi Susu", 7500)
    }

    #[tokio::test]
    async fn posts_order_with_basic_auth() {
        let server = MockServer::start().await;
        let auth = base64::engine::general_purpose::STANDARD.encode("SB-Mid-server-key:");
        Mock::given(method("POST"))
            .and(path("/snap/v1/transactions"))
            .and(header("authorization", format!("Basic {}", auth).as_str()))
            .and(body_partial_json(json!({
                "transaction_details": { "order_id": "ORDER-1", "gross_amount": 7500 },
                "item_details": [{ "id": "poster-license", "price": 7500, "quantity": 1, "name": "Kopi Susu" }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "token": "66e4fa55-fdac-4ef9-91b5-733b97d1b862",
                "redirect_url": "https://app.sandbox.midtrans.com/snap/v4/redirection/66e4fa55"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SnapClient::new("SB-Mid-server-key".into(), server.uri());
        let token = client.create_transaction(&order()).await.unwrap();
        assert_eq!(token, "66e4fa55-fdac-4ef9-91b5-733b97d1b862");
    }

    #[tokio::test]
    async fn unauthorized_is_a_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/snap/v1/transactions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error_messages": ["Access denied due to unauthorized transaction"]
            })))
            .mount(&server)
            .await;

        let client = SnapClient::new("wrong".into(), server.uri());
        let err = client.create_transaction(&order()).await.unwrap_err();
        assert!(matches!(err, Error::Gateway(_)));
    }

    #[test]
    fn from_config_picks_host_by_environment() {
        let mut config = Config::from_lookup(|_| None);
        assert!(SnapClient::from_config(&config).is_none());

        config.midtrans_server_key = Some("key".into());
        assert_eq!(SnapClient::from_config(&config).unwrap().base_url, SANDBOX_API_BASE);

        config.environment = Environment::Production;
        assert_eq!(SnapClient::from_config(&config).unwrap().base_url, PRODUCTION_API_BASE);

        config.midtrans_api_base = Some("http://localhost:9999/".into());
        assert_eq!(SnapClient::from_config(&config).unwrap().base_url, "http://localhost:9999");
    }
}
