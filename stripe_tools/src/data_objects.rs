use std::collections::HashMap;

use pbs_common::Cents;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::StripeApiError;

/// The subset of a Stripe `PaymentIntent` object that the bid server cares about.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: Cents,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub created: Option<i64>,
}

impl PaymentIntent {
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// The bid id recorded in the intent metadata when it was created, if present and numeric.
    pub fn bid_id(&self) -> Option<i64> {
        self.metadata_value("bid_id").and_then(|s| s.trim().parse::<i64>().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentIntent {
    pub amount: Cents,
    pub currency: String,
    pub description: Option<String>,
    pub metadata: Vec<(String, String)>,
    pub automatic_payment_methods: bool,
}

impl NewPaymentIntent {
    pub fn new<S: Into<String>>(amount: Cents, currency: S) -> Self {
        Self {
            amount,
            currency: currency.into().to_lowercase(),
            description: None,
            metadata: Vec::new(),
            automatic_payment_methods: true,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.metadata.push((key.into(), value.to_string()));
        self
    }

    /// Stripe takes form-encoded bodies, with nested fields written as `metadata[key]`.
    pub fn to_form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("amount".to_string(), self.amount.value().to_string()),
            ("currency".to_string(), self.currency.clone()),
        ];
        if self.automatic_payment_methods {
            params.push(("automatic_payment_methods[enabled]".to_string(), "true".to_string()));
        }
        if let Some(description) = &self.description {
            params.push(("description".to_string(), description.clone()));
        }
        for (key, value) in &self.metadata {
            params.push((format!("metadata[{key}]"), value.clone()));
        }
        params
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEventData {
    pub object: Value,
}

/// A webhook event envelope. Only payment intent events are interpreted; everything else is carried as raw JSON.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: i64,
    pub data: WebhookEventData,
    #[serde(default)]
    pub livemode: bool,
}

impl WebhookEvent {
    pub fn is_payment_intent_event(&self) -> bool {
        self.event_type.starts_with("payment_intent.")
    }

    pub fn payment_intent(&self) -> Result<PaymentIntent, StripeApiError> {
        match self.data.object["object"].as_str() {
            Some("payment_intent") => {},
            Some(other) => {
                return Err(StripeApiError::InvalidPayload(format!(
                    "Event {} carries a '{other}', not a payment_intent",
                    self.id
                )))
            },
            None => return Err(StripeApiError::InvalidPayload(format!("Event {} has no object type", self.id))),
        }
        serde_json::from_value(self.data.object.clone()).map_err(|e| StripeApiError::JsonError(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StripeErrorResponse {
    pub error: StripeErrorBody,
}
