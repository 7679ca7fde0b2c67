//! Drives one poster session: text generation, paywall and image generation.
//!
//! All writes go through [`WorkflowState::apply`] under one lock acquisition; the lock
//! is never held across a collaborator call. Each operation that marks a flag in
//! flight holds a [`FlightGuard`] that releases the flag if the operation future is
//! dropped or unwinds before it records its result.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::{
    GeneratedContent, GenerationRequest, ImageBlob, CLIENT_LICENSE_LABEL, DEFAULT_PRICE,
};
use crate::prompts;
use crate::services::{
    ImageGenerator, PaymentConfirmer, PaymentOutcome, PaymentTokenSource, PaymentWidget,
    TextGenerator, TokenOutcome,
};
use crate::workflow::{Flight, Settlement, WorkflowEvent, WorkflowState};
use crate::{Error, Result};

/// Delay before the simulated checkout dialog is shown.
pub const MODAL_DELAY: Duration = Duration::from_millis(50);

const MSG_GENERATION_FAILED: &str = "Something went wrong during generation.";
const MSG_PROMPT_MISSING: &str = "Image prompt is missing.";
const MSG_NO_PROMPT: &str = "No image prompt found to generate. Please regenerate text first.";
const MSG_NO_IMAGE_TO_PAY: &str = "No poster image to unlock yet. Please generate the poster first.";
const MSG_TEXT_PENDING: &str = "Please wait for the text to finish generating.";
const MSG_PAYMENT_REQUIRED: &str = "Payment required before generating the poster.";
const MSG_PAYMENT_FAILED: &str = "Payment failed. Please try again.";
const MSG_MOCK_IN_PRODUCTION: &str =
    "Payment backend is returning MOCK token in production. Please check the backend environment and Midtrans configuration.";
const MSG_WIDGET_MISSING: &str = "Midtrans Snap is not loaded in production.";
const NOTICE_WIDGET_MISSING: &str = "Snap.js not loaded, simulating a successful payment instead.";

/// Whether image generation starts on its own once the text is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainMode {
    #[default]
    Manual,
    AutoChain,
}

/// The step that requires a paid artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaywallGate {
    #[default]
    ImageGeneration,
    Download,
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub is_production: bool,
    pub chain: ChainMode,
    pub gate: PaywallGate,
    pub price: i64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            is_production: false,
            chain: ChainMode::Manual,
            gate: PaywallGate::ImageGeneration,
            price: DEFAULT_PRICE,
        }
    }
}

impl ControllerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self { is_production: config.is_production(), ..Self::default() }
    }
}

/// External services the controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub tokens: Arc<dyn PaymentTokenSource>,
    /// `None` when no checkout widget is available (e.g. it failed to load).
    pub widget: Option<Arc<dyn PaymentWidget>>,
    pub confirmer: Arc<dyn PaymentConfirmer>,
}

pub struct GenerationController {
    state: Mutex<WorkflowState>,
    services: Collaborators,
    config: ControllerConfig,
}

/// Holds an in-flight flag until [`FlightGuard::complete`] records the result.
struct FlightGuard<'a> {
    state: &'a Mutex<WorkflowState>,
    seq: u64,
    flight: Flight,
    armed: bool,
}

impl<'a> FlightGuard<'a> {
    fn new(state: &'a Mutex<WorkflowState>, seq: u64, flight: Flight) -> Self {
        Self { state, seq, flight, armed: true }
    }

    fn complete(mut self, event: WorkflowEvent) -> WorkflowState {
        self.armed = false;
        dispatch(self.state, event)
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("{:?} operation for generation {} ended without a result", self.flight, self.seq);
            dispatch(self.state, WorkflowEvent::Released { seq: self.seq, flight: self.flight });
        }
    }
}

fn dispatch(state: &Mutex<WorkflowState>, event: WorkflowEvent) -> WorkflowState {
    let mut guard = state.lock();
    let next = guard.apply(event);
    *guard = next.clone();
    next
}

fn user_message(prefix: &str, err: &Error) -> String {
    let detail = err.to_string();
    match (prefix.is_empty(), detail.trim().is_empty()) {
        (true, true) => MSG_GENERATION_FAILED.to_string(),
        (true, false) => detail,
        (false, true) => prefix.trim_end().to_string(),
        (false, false) => format!("{}{}", prefix, detail),
    }
}

impl GenerationController {
    pub fn new(services: Collaborators, config: ControllerConfig) -> Self {
        Self { state: Mutex::new(WorkflowState::default()), services, config }
    }

    /// Snapshot of the workflow record.
    pub fn state(&self) -> WorkflowState {
        self.state.lock().clone()
    }

    fn dispatch(&self, event: WorkflowEvent) -> WorkflowState {
        dispatch(&self.state, event)
    }

    /// Starts a new artifact cycle from the form.
    ///
    /// Rejects a request without product name or product image before any collaborator
    /// is contacted, leaving the state untouched. A submission made while another one is
    /// pending supersedes it: only the most recently started generation is applied.
    pub async fn submit_generation(&self, request: GenerationRequest) -> Result<WorkflowState> {
        let source = request.validate().map_err(Error::Validation)?.clone();

        let seq = {
            let mut state = self.state.lock();
            let seq = state.generation + 1;
            *state = state.apply(WorkflowEvent::TextRequested { seq, source_image: Some(source.clone()) });
            seq
        };
        info!("🚀 Generation {} started for '{}'", seq, request.product_name.trim());

        let guard = FlightGuard::new(&self.state, seq, Flight::Text);
        let event = match self.services.text.generate_content(&request).await {
            Ok(content) => WorkflowEvent::TextGenerated { seq, content },
            Err(e) => {
                error!("❌ Text generation {} failed: {}", seq, e);
                WorkflowEvent::TextFailed { seq, message: user_message("", &e) }
            }
        };
        let state = guard.complete(event);

        if state.generation != seq {
            info!("Generation {} was superseded by {}", seq, state.generation);
            return Ok(state);
        }

        let auto_chain = self.config.chain == ChainMode::AutoChain
            && (self.config.gate != PaywallGate::ImageGeneration || state.has_paid_for_current_artifact);
        if auto_chain {
            if let Some(prompt) = state.generated_content.as_ref().map(|c| c.image_prompt.clone()) {
                return Ok(self.request_image(&prompt, Some(source)).await);
            }
        }
        Ok(state)
    }

    /// Renders the poster for `prompt`. Ignored while another image is in flight.
    ///
    /// Needs finished text for the current cycle, and a paid artifact when the paywall
    /// gates image generation.
    pub async fn request_image(&self, prompt: &str, source_image: Option<ImageBlob>) -> WorkflowState {
        if prompt.trim().is_empty() {
            return self.dispatch(WorkflowEvent::ErrorRaised(MSG_PROMPT_MISSING.to_string()));
        }

        let seq = {
            let mut state = self.state.lock();
            if state.image_generation_in_flight {
                info!("Image generation already running, ignoring request");
                return state.clone();
            }
            let blocked = if state.text_generation_in_flight {
                Some(MSG_TEXT_PENDING)
            } else if state.generated_content.is_none() {
                Some(MSG_NO_PROMPT)
            } else if self.config.gate == PaywallGate::ImageGeneration
                && !state.has_paid_for_current_artifact
            {
                Some(MSG_PAYMENT_REQUIRED)
            } else {
                None
            };
            if let Some(message) = blocked {
                warn!("Image request rejected: {}", message);
                *state = state.apply(WorkflowEvent::ErrorRaised(message.to_string()));
                return state.clone();
            }
            let seq = state.generation;
            *state = state.apply(WorkflowEvent::ImageRequested { seq });
            seq
        };

        let guard = FlightGuard::new(&self.state, seq, Flight::Image);
        let event = match self.services.image.generate_image(prompt, source_image.as_ref()).await {
            Ok(image) => {
                info!("✅ Poster generated for generation {} ({} bytes)", seq, image.data.len());
                WorkflowEvent::ImageGenerated { seq, image }
            }
            Err(e) => {
                error!("❌ Image generation {} failed: {}", seq, e);
                WorkflowEvent::ImageFailed {
                    seq,
                    message: user_message("Failed to generate image. Please try again. ", &e),
                }
            }
        };
        guard.complete(event)
    }

    /// Unlocks the gated step for the current artifact, then proceeds to it.
    ///
    /// Already-paid artifacts skip the gateway entirely. Every path leaves
    /// `payment_in_flight` false.
    pub async fn initiate_payment(&self, amount: i64, product_label: &str) -> WorkflowState {
        let label = match product_label.trim() {
            "" => CLIENT_LICENSE_LABEL.to_string(),
            label => label.to_string(),
        };
        let amount = if amount > 0 { amount } else { self.config.price };

        let (seq, prompt, source, already_paid) = {
            let mut state = self.state.lock();
            let prompt = state.generated_content.as_ref().map(|c| c.image_prompt.clone());
            let missing = match self.config.gate {
                PaywallGate::ImageGeneration => {
                    prompt.as_deref().map_or(true, |p| p.trim().is_empty()).then_some(MSG_NO_PROMPT)
                }
                PaywallGate::Download => state.generated_image.is_none().then_some(MSG_NO_IMAGE_TO_PAY),
            };
            if let Some(message) = missing {
                *state = state.apply(WorkflowEvent::ErrorRaised(message.to_string()));
                return state.clone();
            }

            let seq = state.generation;
            let already_paid = state.has_paid_for_current_artifact;
            if !already_paid {
                if state.payment_in_flight {
                    info!("Payment already in progress, ignoring request");
                    return state.clone();
                }
                *state = state.apply(WorkflowEvent::PaymentStarted { seq });
            }
            (seq, prompt.unwrap_or_default(), state.source_image.clone(), already_paid)
        };

        if already_paid {
            info!("Artifact {} already paid, skipping checkout", seq);
            return self.proceed(&prompt, source).await;
        }

        let guard = FlightGuard::new(&self.state, seq, Flight::Payment);
        let settlement = self.settle_payment(&label, amount).await;
        let paid = settlement == Settlement::Paid;
        let state = guard.complete(WorkflowEvent::PaymentSettled { seq, settlement });

        if paid && state.generation == seq && state.has_paid_for_current_artifact {
            info!("💳 Payment confirmed for generation {}", seq);
            self.proceed(&prompt, source).await
        } else {
            state
        }
    }

    async fn settle_payment(&self, label: &str, amount: i64) -> Settlement {
        let production = self.config.is_production;
        let unable = |detail: &str| Settlement::Failed(format!("Unable to initiate payment: {}", detail));

        match self.services.tokens.request_token(label, amount).await {
            Ok(TokenOutcome::Mock) if production => {
                error!("Mock payment token received in production");
                unable(MSG_MOCK_IN_PRODUCTION)
            }
            Ok(TokenOutcome::Mock) => self.simulate_checkout(label, amount, None).await,
            Ok(TokenOutcome::Real(token)) => match self.services.widget.as_ref() {
                Some(widget) => match widget.pay(&token).await {
                    PaymentOutcome::Success | PaymentOutcome::Pending => Settlement::Paid,
                    PaymentOutcome::Error(reason) => {
                        warn!("Payment error reported by widget: {}", reason);
                        Settlement::Failed(MSG_PAYMENT_FAILED.to_string())
                    }
                    PaymentOutcome::Closed => {
                        info!("Checkout closed by user");
                        Settlement::Declined
                    }
                },
                None if production => unable(MSG_WIDGET_MISSING),
                None => self.simulate_checkout(label, amount, Some(NOTICE_WIDGET_MISSING)).await,
            },
            Ok(TokenOutcome::ConfigError(message)) => unable(&message),
            Err(e) => {
                error!("Payment Error: {}", e);
                unable(&e.to_string())
            }
        }
    }

    async fn simulate_checkout(&self, label: &str, amount: i64, notice: Option<&str>) -> Settlement {
        tokio::time::sleep(MODAL_DELAY).await;
        let message = prompts::payment_simulator(label, amount, notice);
        if self.services.confirmer.confirm(&message).await {
            Settlement::Paid
        } else {
            Settlement::Declined
        }
    }

    async fn proceed(&self, prompt: &str, source: Option<ImageBlob>) -> WorkflowState {
        match self.config.gate {
            PaywallGate::ImageGeneration => self.request_image(prompt, source).await,
            PaywallGate::Download => self.state(),
        }
    }

    /// In-place edit of caption, hashtags or prompt. Keeps the paid flag.
    pub fn edit_content(&self, content: GeneratedContent) -> WorkflowState {
        self.dispatch(WorkflowEvent::ContentEdited(content))
    }

    /// The finished poster, once the current artifact is paid for.
    pub fn download(&self) -> Result<ImageBlob> {
        let state = self.state();
        if !state.has_paid_for_current_artifact {
            return Err(Error::PaymentRequired);
        }
        state
            .generated_image
            .ok_or_else(|| Error::Validation("No poster image to download yet.".to_string()))
    }
}
