//! Promotion engine client abstraction.
//!
//! The engine is an opaque oracle: it receives the current cart snapshot and
//! returns the list of effects the cart must be converged to. Implementations
//! must handle retry/backoff for transient transport failures; the bounded
//! stale-session retry lives in the orchestration layer because it needs to
//! clear the locally held session identifier.

use crate::domain::{Effect, ItemPosition, LineItemId};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod http;
pub mod mock;
pub mod profile;
pub mod snapshot;

pub use http::HttpPromotionEngine;
pub use mock::MockPromotionEngine;
pub use profile::{CustomerProfile, ProfileUpdate};
pub use snapshot::{
    build_session_update, AdditionalCosts, CartItemAttributes, CartItemPayload, SessionAttributes,
    SessionState, SessionUpdate,
};

/// One cart item as the engine echoes it back, carrying the position the
/// transcoder assigned and the platform line item it corresponds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoedCartItem {
    pub position: ItemPosition,
    pub line_item_id: LineItemId,
}

/// Successful engine evaluation: the effect list plus the echoed cart items
/// used to correlate positional references back to line items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineResponse {
    pub effects: Vec<Effect>,
    pub cart_items: Vec<EchoedCartItem>,
}

impl EngineResponse {
    pub fn with_effects(effects: Vec<Effect>) -> Self {
        EngineResponse {
            effects,
            cart_items: Vec::new(),
        }
    }
}

/// Error type for promotion engine operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("network error: {0}")]
    Network(String),
    #[error("engine returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("failed to parse engine response: {0}")]
    Parse(String),
    /// The engine no longer accepts the referenced customer session; callers
    /// clear the local session identifier and may retry exactly once.
    #[error("customer session is no longer open on the engine")]
    StaleSession,
    #[error("rate limited by the engine")]
    RateLimited,
}

#[async_trait]
pub trait PromotionEngine: Send + Sync + fmt::Debug {
    /// Send the cart snapshot and receive the effects to converge to.
    ///
    /// Called with `state = open` on every cart mutation and `state = closed`
    /// once at order confirmation.
    async fn evaluate_session(
        &self,
        update: &SessionUpdate,
    ) -> Result<EngineResponse, EngineError>;

    /// Create or update a customer profile on the engine.
    async fn upsert_profile(&self, update: &ProfileUpdate) -> Result<(), EngineError>;
}
