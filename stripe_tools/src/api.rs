use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::de::DeserializeOwned;

use crate::{
    config::StripeConfig,
    data_objects::{NewPaymentIntent, PaymentIntent, StripeErrorResponse},
    StripeApiError,
};

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let mut val = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    /// Sends a request to the Stripe API. Request bodies are form-encoded, responses are JSON.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !form.is_empty() {
            req = req.form(form);
        }
        let response = req.send().await.map_err(|e| StripeApiError::RestRequestError(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            trace!("💳️ REST query successful. {status}");
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let text = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            let message = serde_json::from_str::<StripeErrorResponse>(&text)
                .ok()
                .and_then(|r| r.error.message)
                .unwrap_or(text);
            Err(StripeApiError::QueryError { status: status.as_u16(), message })
        }
    }

    pub async fn create_payment_intent(&self, intent: &NewPaymentIntent) -> Result<PaymentIntent, StripeApiError> {
        debug!("💳️ Creating payment intent for {} {}", intent.amount, intent.currency);
        let params = intent.to_form_params();
        let result = self.rest_query::<PaymentIntent>(Method::POST, "/v1/payment_intents", &params).await?;
        info!("💳️ Created payment intent {} for {}", result.id, result.amount);
        Ok(result)
    }

    pub async fn get_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeApiError> {
        let path = format!("/v1/payment_intents/{intent_id}");
        debug!("💳️ Fetching payment intent {intent_id}");
        self.rest_query::<PaymentIntent>(Method::GET, &path, &[]).await
    }

    pub async fn cancel_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeApiError> {
        let path = format!("/v1/payment_intents/{intent_id}/cancel");
        debug!("💳️ Cancelling payment intent {intent_id}");
        let result = self.rest_query::<PaymentIntent>(Method::POST, &path, &[]).await?;
        info!("💳️ Cancelled payment intent {intent_id}. Status is now {}", result.status);
        Ok(result)
    }
}
