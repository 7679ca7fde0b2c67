use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::gateway::TransactionGateway;
use crate::models::{CreateTransactionRequest, CreateTransactionResponse};
use crate::Result;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<TransactionGateway>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/create-transaction", post(create_transaction))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[axum::debug_handler]
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(body): Json<CreateTransactionRequest>,
) -> Result<Json<CreateTransactionResponse>> {
    let label = body.product_name.unwrap_or_default();
    tracing::info!("🧾 Creating transaction for '{}' amount={:?}", label, body.amount);

    let session = state.gateway.create_session(&label, body.amount).await?;
    if session.is_mock() {
        tracing::warn!("Returning mock token for '{}'", session.product_label);
    }
    Ok(Json(CreateTransactionResponse { token: session.token }))
}

pub async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::mock::MockPaymentProvider;
    use crate::models::MOCK_TOKEN;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(provider: Option<MockPaymentProvider>, environment: Environment) -> Router {
        let provider = provider.map(|p| Arc::new(p) as Arc<dyn crate::midtrans::PaymentProvider>);
        router(AppState { gateway: Arc::new(TransactionGateway::new(provider, environment)) })
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/create-transaction")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn returns_token_from_provider() {
        let provider = MockPaymentProvider::new().with_token("snap-abc");
        let response = app(Some(provider.clone()), Environment::Production)
            .oneshot(post_json(json!({ "productName": "Kopi Susu", "amount": 7500 })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!({ "token": "snap-abc" }));
        assert_eq!(provider.last_order().unwrap().item_details[0].name, "Kopi Susu");
    }

    #[tokio::test]
    async fn string_amount_reaches_the_order() {
        let provider = MockPaymentProvider::new().with_token("snap-abc");
        let response = app(Some(provider.clone()), Environment::Sandbox)
            .oneshot(post_json(json!({ "productName": "Kopi Susu", "amount": "15000" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(provider.last_order().unwrap().transaction_details.gross_amount, 15000);
    }

    #[tokio::test]
    async fn sandbox_without_credentials_returns_mock_token() {
        let response = app(None, Environment::Sandbox)
            .oneshot(post_json(json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!({ "token": MOCK_TOKEN }));
    }

    #[tokio::test]
    async fn production_without_credentials_is_500() {
        let response = app(None, Environment::Production)
            .oneshot(post_json(json!({ "productName": "Kopi Susu", "amount": 7500 })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read_json(response).await, json!({ "error": "Failed to create transaction" }));
    }

    #[tokio::test]
    async fn non_json_body_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/create-transaction")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let response = app(None, Environment::Sandbox).oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app(None, Environment::Sandbox).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
