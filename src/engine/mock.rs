//! Mock promotion engine for testing without network calls.

use super::{EngineError, EngineResponse, ProfileUpdate, PromotionEngine, SessionUpdate};
use async_trait::async_trait;
use std::sync::Mutex;

/// Mock engine that replays scripted responses and records every session
/// update it receives.
///
/// Responses are consumed in order; once the script is exhausted the last
/// response keeps repeating (so single-response tests can run many passes).
#[derive(Debug, Default)]
pub struct MockPromotionEngine {
    script: Mutex<Vec<Result<EngineResponse, EngineError>>>,
    requests: Mutex<Vec<SessionUpdate>>,
    profiles: Mutex<Vec<ProfileUpdate>>,
}

impl MockPromotionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn with_response(self, response: EngineResponse) -> Self {
        self.script.lock().unwrap().push(Ok(response));
        self
    }

    /// Queue an error response.
    pub fn with_error(self, error: EngineError) -> Self {
        self.script.lock().unwrap().push(Err(error));
        self
    }

    /// Session updates received so far, in call order.
    pub fn recorded_requests(&self) -> Vec<SessionUpdate> {
        self.requests.lock().unwrap().clone()
    }

    /// Profile upserts received so far.
    pub fn recorded_profiles(&self) -> Vec<ProfileUpdate> {
        self.profiles.lock().unwrap().clone()
    }
}

#[async_trait]
impl PromotionEngine for MockPromotionEngine {
    async fn evaluate_session(
        &self,
        update: &SessionUpdate,
    ) -> Result<EngineResponse, EngineError> {
        self.requests.lock().unwrap().push(update.clone());

        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Ok(EngineResponse::default());
        }
        if script.len() == 1 {
            return script[0].clone();
        }
        script.remove(0)
    }

    async fn upsert_profile(&self, update: &ProfileUpdate) -> Result<(), EngineError> {
        self.profiles.lock().unwrap().push(update.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CampaignId, Effect, EffectKind, Money, RulesetId};

    fn discount_response() -> EngineResponse {
        EngineResponse::with_effects(vec![Effect {
            campaign_id: CampaignId(1),
            ruleset_id: RulesetId(2),
            rule_name: "5 off".into(),
            triggered_by_coupon: None,
            kind: EffectKind::SetDiscount {
                value: Money::from_str_canonical("5").unwrap(),
            },
        }])
    }

    fn empty_update() -> SessionUpdate {
        use crate::engine::snapshot::{AdditionalCosts, SessionAttributes, SessionState};
        use crate::domain::{ProfileId, SessionId};
        SessionUpdate {
            session_id: SessionId::new("s"),
            profile_id: ProfileId::new("p"),
            state: SessionState::Open,
            cart_items: Vec::new(),
            coupon_codes: Vec::new(),
            referral_code: None,
            attributes: SessionAttributes {
                currency: "USD".into(),
                site_id: "site".into(),
                shipping_method: String::new(),
                shipping_city: String::new(),
                payment_method: String::new(),
                rejected_free_items: Vec::new(),
            },
            additional_costs: AdditionalCosts {
                shipping_cost: Money::zero(),
            },
        }
    }

    #[tokio::test]
    async fn test_mock_replays_script_then_repeats_last() {
        let mock = MockPromotionEngine::new()
            .with_error(EngineError::StaleSession)
            .with_response(discount_response());

        let update = empty_update();
        assert_eq!(
            mock.evaluate_session(&update).await,
            Err(EngineError::StaleSession)
        );
        assert_eq!(mock.evaluate_session(&update).await.unwrap().effects.len(), 1);
        // Last scripted response repeats.
        assert_eq!(mock.evaluate_session(&update).await.unwrap().effects.len(), 1);
        assert_eq!(mock.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_defaults_to_empty_response() {
        let mock = MockPromotionEngine::new();
        let response = mock.evaluate_session(&empty_update()).await.unwrap();
        assert!(response.effects.is_empty());
    }
}
