//! Narrow interfaces to the external collaborators used by the controller.
//!
//! Real implementations live in [`crate::gemini`], [`crate::payment`] and
//! [`crate::widget`]; scripted ones in [`crate::mock`].

use async_trait::async_trait;

use crate::models::{GeneratedContent, GenerationRequest, ImageBlob};
use crate::Result;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Turns the form into an image prompt, caption and hashtags.
    async fn generate_content(&self, request: &GenerationRequest) -> Result<GeneratedContent>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Renders a 3:4 poster from `prompt`, optionally guided by a reference image.
    async fn generate_image(&self, prompt: &str, source: Option<&ImageBlob>) -> Result<ImageBlob>;
}

/// What the Transaction Gateway handed back, already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutcome {
    Real(String),
    /// Sentinel token: simulated checkout.
    Mock,
    /// The client cannot reach a gateway in a context that forbids simulation.
    ConfigError(String),
}

#[async_trait]
pub trait PaymentTokenSource: Send + Sync {
    async fn request_token(&self, product_label: &str, amount: i64) -> Result<TokenOutcome>;
}

/// The single result of one payment widget invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success,
    Pending,
    Error(String),
    Closed,
}

#[async_trait]
pub trait PaymentWidget: Send + Sync {
    /// Opens the checkout for `token` and resolves once the user is done with it.
    async fn pay(&self, token: &str) -> PaymentOutcome;
}

/// Stand-in for the modal dialog of the simulated checkout.
#[async_trait]
pub trait PaymentConfirmer: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}
