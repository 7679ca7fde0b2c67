//! Adapts a callback-style checkout widget to a single-resolution future.
//!
//! A widget such as Midtrans Snap reports back through four callbacks of which exactly
//! one is expected to fire. [`CallbackBridge::open`] hands the widget a cloneable
//! [`PaymentCallbacks`] and the controller a [`PendingPayment`] to await. The first
//! callback settles the payment; anything after it is ignored.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::services::PaymentOutcome;

pub struct CallbackBridge;

impl CallbackBridge {
    pub fn open() -> (PaymentCallbacks, PendingPayment) {
        let (tx, rx) = oneshot::channel();
        (
            PaymentCallbacks { slot: Arc::new(Mutex::new(Some(tx))) },
            PendingPayment { rx },
        )
    }
}

#[derive(Clone)]
pub struct PaymentCallbacks {
    slot: Arc<Mutex<Option<oneshot::Sender<PaymentOutcome>>>>,
}

impl PaymentCallbacks {
    pub fn on_success(&self) {
        self.settle(PaymentOutcome::Success);
    }

    pub fn on_pending(&self) {
        self.settle(PaymentOutcome::Pending);
    }

    pub fn on_error(&self, message: impl Into<String>) {
        self.settle(PaymentOutcome::Error(message.into()));
    }

    pub fn on_close(&self) {
        self.settle(PaymentOutcome::Closed);
    }

    /// Returns false when the payment had already been settled.
    pub fn settle(&self, outcome: PaymentOutcome) -> bool {
        let sender = self.slot.lock().take();
        match sender {
            Some(tx) => {
                debug!("Payment widget settled: {:?}", outcome);
                // The receiver may be gone if the controller stopped waiting.
                let _ = tx.send(outcome);
                true
            }
            None => {
                warn!("Ignoring payment callback after settlement: {:?}", outcome);
                false
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slot.lock().is_none()
    }
}

pub struct PendingPayment {
    rx: oneshot::Receiver<PaymentOutcome>,
}

impl PendingPayment {
    /// Waits for the first callback. Dropping every callback handle unsettled counts as an error.
    pub async fn outcome(self) -> PaymentOutcome {
        self.rx.await.unwrap_or_else(|_| {
            PaymentOutcome::Error("payment widget went away without reporting a result".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn first_callback_wins() {
        let (callbacks, pending) = CallbackBridge::open();
        let cloned = callbacks.clone();

        callbacks.on_pending();
        assert!(cloned.is_settled());
        assert!(!cloned.settle(PaymentOutcome::Success));
        cloned.on_error("late");

        assert_eq!(pending.outcome().await, PaymentOutcome::Pending);
    }

    #[tokio::test]
    async fn callback_from_another_task() {
        let (callbacks, pending) = CallbackBridge::open();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            callbacks.on_close();
        });
        assert_eq!(pending.outcome().await, PaymentOutcome::Closed);
    }

    #[tokio::test]
    async fn dropped_callbacks_settle_as_error() {
        let (callbacks, pending) = CallbackBridge::open();
        drop(callbacks);
        assert!(matches!(pending.outcome().await, PaymentOutcome::Error(_)));
    }
}
