//! HTTP promotion engine client.

use super::{
    EchoedCartItem, EngineError, EngineResponse, ProfileUpdate, PromotionEngine, SessionUpdate,
};
use crate::domain::{Effect, EffectRecord, ItemPosition, LineItemId};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Response sections requested alongside the effect list.
const RESPONSE_CONTENT: [&str; 4] = [
    "customerSession",
    "customerProfile",
    "triggeredCampaigns",
    "coupons",
];

/// Promotion engine client over the integration HTTP API.
#[derive(Debug, Clone)]
pub struct HttpPromotionEngine {
    client: Client,
    base_url: String,
    api_key: String,
    api_key_prefix: String,
}

impl HttpPromotionEngine {
    pub fn new(base_url: String, api_key: String, api_key_prefix: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            api_key_prefix,
        }
    }

    fn auth_header(&self) -> String {
        format!("{} {}", self.api_key_prefix, self.api_key)
    }

    async fn put_json(
        &self,
        url: String,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, EngineError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .put(&url)
                .header("Authorization", self.auth_header())
                .json(&payload)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(EngineError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(EngineError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(EngineError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(backoff::Error::permanent(classify_client_error(
                    status.as_u16(),
                    &body,
                )));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(EngineError::Parse(e.to_string())))
        })
        .await
    }
}

/// A 400 whose message says the session is already closed means our stored
/// session identifier is stale; the caller recovers by clearing it and
/// re-issuing the call once.
fn classify_client_error(status: u16, body: &str) -> EngineError {
    if status == 400 {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_default();
        if message.to_ascii_lowercase().contains("closed") {
            return EngineError::StaleSession;
        }
        return EngineError::Http {
            status,
            message,
        };
    }
    EngineError::Http {
        status,
        message: body.to_string(),
    }
}

#[async_trait]
impl PromotionEngine for HttpPromotionEngine {
    async fn evaluate_session(
        &self,
        update: &SessionUpdate,
    ) -> Result<EngineResponse, EngineError> {
        debug!(
            session_id = %update.session_id,
            state = ?update.state,
            items = update.cart_items.len(),
            "Updating customer session"
        );

        let url = format!(
            "{}/v1/customer_sessions/{}",
            self.base_url, update.session_id
        );
        let payload = serde_json::json!({
            "customerSession": update,
            "responseContent": RESPONSE_CONTENT,
        });

        let response = self.put_json(url, payload).await?;
        parse_engine_response(&response)
    }

    async fn upsert_profile(&self, update: &ProfileUpdate) -> Result<(), EngineError> {
        debug!(profile_id = %update.profile_id, "Upserting customer profile");

        let url = format!(
            "{}/v1/customer_profiles/{}?runRuleEngine=false",
            self.base_url, update.profile_id
        );
        let payload = serde_json::json!({ "attributes": update.attributes });

        self.put_json(url, payload).await?;
        Ok(())
    }
}

fn parse_engine_response(response: &serde_json::Value) -> Result<EngineResponse, EngineError> {
    let effects_json = response
        .get("effects")
        .and_then(|v| v.as_array())
        .ok_or_else(|| EngineError::Parse("Missing effects array".to_string()))?;

    let mut effects = Vec::new();
    for effect_json in effects_json {
        let record: EffectRecord = match serde_json::from_value(effect_json.clone()) {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to parse effect record: {}", e);
                continue;
            }
        };
        match Effect::from_record(&record) {
            Ok(Some(effect)) => effects.push(effect),
            Ok(None) => {
                warn!(effect_type = %record.effect_type, "Skipping unknown effect type");
            }
            Err(e) => {
                warn!("Skipping malformed effect: {}", e);
            }
        }
    }

    let cart_items = response
        .get("customerSession")
        .and_then(|s| s.get("cartItems"))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| parse_echoed_item(item))
                .collect()
        })
        .unwrap_or_default();

    Ok(EngineResponse {
        effects,
        cart_items,
    })
}

fn parse_echoed_item(item: &serde_json::Value) -> Option<EchoedCartItem> {
    let position = item.get("position").and_then(|v| v.as_i64())?;
    let line_item_id = item
        .get("attributes")
        .and_then(|a| a.get("lineItemId"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())?;
    Some(EchoedCartItem {
        position: ItemPosition(position),
        line_item_id: LineItemId(line_item_id),
    })
}
