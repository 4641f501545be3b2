//! Per-session state carried through reconciliation passes.
//!
//! One `SessionContext` lives for a shopper's session and is passed
//! explicitly into every operation, instead of ambient session storage.
//! Transient display state has read-once semantics where the original
//! consumer cleared it after reading.

use crate::config::Config;
use crate::domain::{Money, ProfileId, SessionId};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    session_id: Option<SessionId>,
    profile_id: Option<ProfileId>,
    customer_no: Option<String>,
    loyalty_balance: Option<Money>,
    free_item_unavailable: bool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The engine session identifier, minted on first use.
    pub fn session_id(&mut self) -> SessionId {
        self.session_id
            .get_or_insert_with(|| SessionId::new(Uuid::new_v4().to_string()))
            .clone()
    }

    /// Forget the session identifier so the next call mints a fresh one.
    /// Used for the bounded stale-session retry and after closing a session.
    pub fn clear_session_id(&mut self) {
        self.session_id = None;
    }

    /// Record the authenticated customer number; guests leave this unset.
    pub fn set_customer_no(&mut self, customer_no: impl Into<String>) {
        self.customer_no = Some(customer_no.into());
        self.profile_id = None;
    }

    /// The engine profile identifier: configured prefix plus the customer
    /// number, or a generated guest id minted once per session.
    pub fn profile_id(&mut self, config: &Config) -> ProfileId {
        if let Some(customer_no) = &self.customer_no {
            let id = ProfileId::new(format!("{}{}", config.profile_id_prefix, customer_no));
            self.profile_id = Some(id.clone());
            return id;
        }
        self.profile_id
            .get_or_insert_with(|| {
                ProfileId::new(format!("{}{}", config.profile_id_prefix, Uuid::new_v4()))
            })
            .clone()
    }

    pub fn clear_profile_id(&mut self) {
        self.profile_id = None;
    }

    /// Net loyalty change stored by the last classification; `None` when the
    /// last pass netted to zero.
    pub fn loyalty_balance(&self) -> Option<Money> {
        self.loyalty_balance
    }

    pub fn set_loyalty_balance(&mut self, balance: Money) {
        self.loyalty_balance = Some(balance);
    }

    pub fn clear_loyalty_balance(&mut self) {
        self.loyalty_balance = None;
    }

    /// Record that an engine-granted free item could not be added to the cart.
    pub fn flag_free_item_unavailable(&mut self) {
        self.free_item_unavailable = true;
    }

    /// Read-once: returns whether a free item was unavailable since the last
    /// check, clearing the flag.
    pub fn take_free_item_unavailable(&mut self) -> bool {
        std::mem::take(&mut self.free_item_unavailable)
    }
}
