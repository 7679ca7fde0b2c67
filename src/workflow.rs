//! Workflow state of one poster session and its reducer.
//!
//! Every async completion is an event stamped with the generation (`seq`) it was started
//! in. [`WorkflowState::apply`] drops events from older generations, so a slow response
//! for a replaced artifact can never overwrite the current one.

use tracing::debug;

use crate::models::{GeneratedContent, ImageBlob};

/// The single mutable record behind the poster form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowState {
    pub text_generation_in_flight: bool,
    pub image_generation_in_flight: bool,
    pub payment_in_flight: bool,
    pub has_paid_for_current_artifact: bool,
    pub last_error: Option<String>,
    pub generated_content: Option<GeneratedContent>,
    pub generated_image: Option<ImageBlob>,
    /// The last image attempt of this cycle failed. Other errors leave it unset.
    pub image_failed: bool,
    /// Product photo of the current cycle, reused as the image reference.
    pub source_image: Option<ImageBlob>,
    /// Sequence number of the current artifact cycle. `0` before the first submission.
    pub generation: u64,
}

/// Which in-flight flag an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flight {
    Text,
    Image,
    Payment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Paid,
    Declined,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    TextRequested { seq: u64, source_image: Option<ImageBlob> },
    TextGenerated { seq: u64, content: GeneratedContent },
    TextFailed { seq: u64, message: String },
    ContentEdited(GeneratedContent),
    ImageRequested { seq: u64 },
    ImageGenerated { seq: u64, image: ImageBlob },
    ImageFailed { seq: u64, message: String },
    PaymentStarted { seq: u64 },
    PaymentSettled { seq: u64, settlement: Settlement },
    /// Clears a flag without recording an error.
    Released { seq: u64, flight: Flight },
    ErrorRaised(String),
}

impl WorkflowEvent {
    fn seq(&self) -> Option<u64> {
        match self {
            WorkflowEvent::TextRequested { .. }
            | WorkflowEvent::ContentEdited(_)
            | WorkflowEvent::ErrorRaised(_) => None,
            WorkflowEvent::TextGenerated { seq, .. }
            | WorkflowEvent::TextFailed { seq, .. }
            | WorkflowEvent::ImageRequested { seq }
            | WorkflowEvent::ImageGenerated { seq, .. }
            | WorkflowEvent::ImageFailed { seq, .. }
            | WorkflowEvent::PaymentStarted { seq }
            | WorkflowEvent::PaymentSettled { seq, .. }
            | WorkflowEvent::Released { seq, .. } => Some(*seq),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPhase {
    Idle,
    Generating,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePhase {
    None,
    Generating,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentPhase {
    Unpaid,
    Pending,
    Paid,
}

impl WorkflowState {
    /// Returns the state after `event`. Stale events yield an unchanged copy.
    pub fn apply(&self, event: WorkflowEvent) -> WorkflowState {
        if let WorkflowEvent::TextRequested { seq, .. } = &event {
            if *seq <= self.generation {
                debug!("Ignoring out-of-order text request {} (current {})", seq, self.generation);
                return self.clone();
            }
        } else if let Some(seq) = event.seq() {
            if seq != self.generation {
                debug!("Discarding stale event for generation {} (current {})", seq, self.generation);
                return self.clone();
            }
        }

        let mut next = self.clone();
        match event {
            WorkflowEvent::TextRequested { seq, source_image } => {
                next = WorkflowState {
                    text_generation_in_flight: true,
                    source_image,
                    generation: seq,
                    ..WorkflowState::default()
                };
            }
            WorkflowEvent::TextGenerated { content, .. } => {
                next.text_generation_in_flight = false;
                next.generated_content = Some(content);
                next.last_error = None;
            }
            WorkflowEvent::TextFailed { message, .. } => {
                next.text_generation_in_flight = false;
                next.image_generation_in_flight = false;
                next.payment_in_flight = false;
                next.last_error = Some(message);
            }
            WorkflowEvent::ContentEdited(content) => {
                if next.generated_content.is_some() {
                    next.generated_content = Some(content);
                }
            }
            WorkflowEvent::ImageRequested { .. } => {
                next.image_generation_in_flight = true;
                next.image_failed = false;
                next.last_error = None;
            }
            WorkflowEvent::ImageGenerated { image, .. } => {
                next.image_generation_in_flight = false;
                next.image_failed = false;
                next.generated_image = Some(image);
            }
            WorkflowEvent::ImageFailed { message, .. } => {
                next.image_generation_in_flight = false;
                next.image_failed = true;
                next.last_error = Some(message);
            }
            WorkflowEvent::PaymentStarted { .. } => {
                next.payment_in_flight = true;
                next.last_error = None;
            }
            WorkflowEvent::PaymentSettled { settlement, .. } => {
                next.payment_in_flight = false;
                match settlement {
                    Settlement::Paid => next.has_paid_for_current_artifact = true,
                    Settlement::Declined => {}
                    Settlement::Failed(message) => next.last_error = Some(message),
                }
            }
            WorkflowEvent::Released { flight, .. } => match flight {
                Flight::Text => next.text_generation_in_flight = false,
                Flight::Image => next.image_generation_in_flight = false,
                Flight::Payment => next.payment_in_flight = false,
            },
            WorkflowEvent::ErrorRaised(message) => {
                next.last_error = Some(message);
            }
        }
        next
    }

    pub fn is_in_flight(&self, flight: Flight) -> bool {
        match flight {
            Flight::Text => self.text_generation_in_flight,
            Flight::Image => self.image_generation_in_flight,
            Flight::Payment => self.payment_in_flight,
        }
    }

    pub fn text_phase(&self) -> TextPhase {
        if self.text_generation_in_flight {
            TextPhase::Generating
        } else if self.generated_content.is_some() {
            TextPhase::Ready
        } else if self.generation > 0 && self.last_error.is_some() {
            TextPhase::Failed
        } else {
            TextPhase::Idle
        }
    }

    pub fn image_phase(&self) -> ImagePhase {
        if self.image_generation_in_flight {
            ImagePhase::Generating
        } else if self.generated_image.is_some() {
            ImagePhase::Ready
        } else if self.image_failed {
            ImagePhase::Failed
        } else {
            ImagePhase::None
        }
    }

    pub fn payment_phase(&self) -> PaymentPhase {
        if self.has_paid_for_current_artifact {
            PaymentPhase::Paid
        } else if self.payment_in_flight {
            PaymentPhase::Pending
        } else {
            PaymentPhase::Unpaid
        }
    }
}
