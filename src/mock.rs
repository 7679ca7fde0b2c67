//! Scripted collaborators for tests and offline demos.
//!
//! Every mock is `Clone` with shared state, so a test can keep a handle for
//! assertions after handing a copy to the controller or gateway.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::gemini::GeminiError;
use crate::midtrans::{PaymentProvider, SnapOrder};
use crate::models::{GeneratedContent, GenerationRequest, ImageBlob};
use crate::services::{
    ImageGenerator, PaymentConfirmer, PaymentOutcome, PaymentTokenSource, PaymentWidget,
    TextGenerator, TokenOutcome,
};
use crate::widget::CallbackBridge;
use crate::{Error, Result};

/// 1x1 PNG.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53,
    0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0x99, 0x63, 0xF8, 0xCF, 0xC0, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0xE2, 0x25, 0x00, 0xBC, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E,
    0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub fn tiny_png() -> ImageBlob {
    ImageBlob::new("image/png", TINY_PNG)
}

/// One scripted reply: after `delay`, the value or an error message.
#[derive(Debug, Clone)]
struct Reply<T> {
    result: std::result::Result<T, String>,
    delay: Duration,
}

#[derive(Debug)]
struct Script<T> {
    replies: VecDeque<Reply<T>>,
    calls: usize,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self { replies: VecDeque::new(), calls: 0 }
    }
}

impl<T> Script<T> {
    fn next(&mut self) -> Option<Reply<T>> {
        self.calls += 1;
        self.replies.pop_front()
    }
}

async fn play<T>(reply: Reply<T>, error: fn(String) -> Error) -> Result<T> {
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    reply.result.map_err(error)
}

#[derive(Clone, Default)]
pub struct MockTextGenerator {
    script: Arc<Mutex<Script<GeneratedContent>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(self, content: GeneratedContent) -> Self {
        self.with_delayed_content(content, Duration::ZERO)
    }

    pub fn with_delayed_content(self, content: GeneratedContent, delay: Duration) -> Self {
        self.script.lock().replies.push_back(Reply { result: Ok(content), delay });
        self
    }

    pub fn with_failure(self, message: &str) -> Self {
        self.script
            .lock()
            .replies
            .push_back(Reply { result: Err(message.to_string()), delay: Duration::ZERO });
        self
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().calls
    }

    /// Product names seen, in call order.
    pub fn requested_products(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

/// Content the mock falls back to once its script runs dry.
pub fn default_content(product_name: &str) -> GeneratedContent {
    GeneratedContent {
        image_prompt: format!("A bright commercial poster of {} on a clean table", product_name),
        caption: format!("Nikmati {} hari ini!", product_name),
        hashtags: "#UMKM #PromoHariIni".to_string(),
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate_content(&self, request: &GenerationRequest) -> Result<GeneratedContent> {
        self.requests.lock().push(request.product_name.clone());
        let reply = self.script.lock().next();
        match reply {
            Some(reply) => play(reply, |m| Error::Gemini(GeminiError::Http(m))).await,
            None => Ok(default_content(&request.product_name)),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockImageGenerator {
    script: Arc<Mutex<Script<ImageBlob>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    panic_on_call: bool,
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, image: ImageBlob) -> Self {
        self.with_delayed_image(image, Duration::ZERO)
    }

    pub fn with_delayed_image(self, image: ImageBlob, delay: Duration) -> Self {
        self.script.lock().replies.push_back(Reply { result: Ok(image), delay });
        self
    }

    pub fn with_failure(self, message: &str) -> Self {
        self.script
            .lock()
            .replies
            .push_back(Reply { result: Err(message.to_string()), delay: Duration::ZERO });
        self
    }

    /// Makes every call panic, as a crashing collaborator would.
    pub fn panicking(mut self) -> Self {
        self.panic_on_call = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().calls
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate_image(&self, prompt: &str, _source: Option<&ImageBlob>) -> Result<ImageBlob> {
        self.prompts.lock().push(prompt.to_string());
        let reply = self.script.lock().next();
        if self.panic_on_call {
            panic!("image generator crashed");
        }
        match reply {
            Some(reply) => play(reply, |m| Error::Gemini(GeminiError::NoImage(m))).await,
            None => Ok(tiny_png()),
        }
    }
}

#[derive(Clone)]
pub struct MockTokenSource {
    outcome: Arc<Mutex<TokenOutcome>>,
    requests: Arc<Mutex<Vec<(String, i64)>>>,
}

impl MockTokenSource {
    pub fn new(outcome: TokenOutcome) -> Self {
        Self { outcome: Arc::new(Mutex::new(outcome)), requests: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn mock() -> Self {
        Self::new(TokenOutcome::Mock)
    }

    pub fn real(token: &str) -> Self {
        Self::new(TokenOutcome::Real(token.to_string()))
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// `(product_label, amount)` pairs, in call order.
    pub fn requests(&self) -> Vec<(String, i64)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PaymentTokenSource for MockTokenSource {
    async fn request_token(&self, product_label: &str, amount: i64) -> Result<TokenOutcome> {
        self.requests.lock().push((product_label.to_string(), amount));
        Ok(self.outcome.lock().clone())
    }
}

/// Fires scripted widget callbacks from a spawned task, the way a browser
/// widget reports back asynchronously.
#[derive(Clone)]
pub struct MockPaymentWidget {
    callbacks: Arc<Vec<PaymentOutcome>>,
    tokens: Arc<Mutex<Vec<String>>>,
}

impl MockPaymentWidget {
    /// `callbacks` fire in order; only the first one counts.
    pub fn firing(callbacks: Vec<PaymentOutcome>) -> Self {
        Self { callbacks: Arc::new(callbacks), tokens: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn succeeding() -> Self {
        Self::firing(vec![PaymentOutcome::Success])
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }
}

#[async_trait]
impl PaymentWidget for MockPaymentWidget {
    async fn pay(&self, token: &str) -> PaymentOutcome {
        self.tokens.lock().push(token.to_string());
        let (callbacks, pending) = CallbackBridge::open();
        let script = Arc::clone(&self.callbacks);
        tokio::spawn(async move {
            for outcome in script.iter() {
                tokio::task::yield_now().await;
                callbacks.settle(outcome.clone());
            }
        });
        pending.outcome().await
    }
}

#[derive(Clone)]
pub struct MockConfirmer {
    answer: bool,
    messages: Arc<Mutex<Vec<String>>>,
}

impl MockConfirmer {
    pub fn accepting() -> Self {
        Self { answer: true, messages: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn declining() -> Self {
        Self { answer: false, messages: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn call_count(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl PaymentConfirmer for MockConfirmer {
    async fn confirm(&self, message: &str) -> bool {
        self.messages.lock().push(message.to_string());
        self.answer
    }
}

#[derive(Clone, Default)]
pub struct MockPaymentProvider {
    token: Option<String>,
    fail: bool,
    orders: Arc<Mutex<Vec<SnapOrder>>>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn last_order(&self) -> Option<SnapOrder> {
        self.orders.lock().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.orders.lock().len()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_transaction(&self, order: &SnapOrder) -> Result<String> {
        self.orders.lock().push(order.clone());
        if self.fail {
            return Err(Error::Gateway("Midtrans API error (status 401)".to_string()));
        }
        Ok(self
            .token
            .clone()
            .unwrap_or_else(|| format!("snap-{}", order.transaction_details.order_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, DisplayStyle};
    use pretty_assertions::assert_eq;

    fn request(name: &str) -> GenerationRequest {
        GenerationRequest::new(name, DisplayStyle::ALL[0], ContentType::ALL[0], tiny_png())
    }

    #[tokio::test]
    async fn text_script_then_default() {
        let custom = GeneratedContent {
            image_prompt: "custom".into(),
            caption: "c".into(),
            hashtags: String::new(),
        };
        let text = MockTextGenerator::new().with_content(custom.clone()).with_failure("quota");

        assert_eq!(text.generate_content(&request("Kopi")).await.unwrap(), custom);
        assert!(text.generate_content(&request("Kopi")).await.is_err());
        let fallback = text.generate_content(&request("Kopi")).await.unwrap();
        assert!(fallback.image_prompt.contains("Kopi"));
        assert_eq!(text.call_count(), 3);
    }

    #[tokio::test]
    async fn widget_reports_first_callback_only() {
        let widget = MockPaymentWidget::firing(vec![
            PaymentOutcome::Closed,
            PaymentOutcome::Success,
        ]);
        assert_eq!(widget.pay("tok").await, PaymentOutcome::Closed);
        assert_eq!(widget.tokens(), vec!["tok".to_string()]);
    }

    #[tokio::test]
    async fn widget_without_callbacks_is_an_error() {
        let widget = MockPaymentWidget::firing(vec![]);
        assert!(matches!(widget.pay("tok").await, PaymentOutcome::Error(_)));
    }

    #[test]
    fn tiny_png_sniffs_as_png() {
        assert_eq!(ImageBlob::from_bytes(TINY_PNG).mime_type, "image/png");
    }
}
