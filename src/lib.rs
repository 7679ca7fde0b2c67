//! UMKM Poster Studio.
//!
//! Two halves of one checkout-gated poster flow:
//! - [`controller::GenerationController`] drives text generation, payment and image
//!   generation for one session, recording everything in a [`workflow::WorkflowState`].
//! - [`gateway::TransactionGateway`] behind [`routes::router`] issues Midtrans Snap
//!   tokens, or a sentinel mock token when real payments are not configured.

pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod midtrans;
pub mod mock;
pub mod models;
pub mod payment;
pub mod prompts;
pub mod routes;
pub mod services;
pub mod widget;
pub mod workflow;

pub use error::{Error, Result};
