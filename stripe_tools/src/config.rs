use log::*;
use pbs_common::Secret;

use crate::webhook::DEFAULT_TOLERANCE_SECS;

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub api_base: String,
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    /// Maximum age of a webhook signature timestamp, in seconds.
    pub signature_tolerance: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            secret_key: Secret::default(),
            webhook_secret: Secret::default(),
            signature_tolerance: DEFAULT_TOLERANCE_SECS,
        }
    }
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_base = std::env::var("PBS_STRIPE_API_BASE").unwrap_or_else(|_| {
            info!("🪛️ PBS_STRIPE_API_BASE not set, using {DEFAULT_API_BASE}");
            DEFAULT_API_BASE.to_string()
        });
        let secret_key = Secret::new(std::env::var("PBS_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ PBS_STRIPE_SECRET_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("PBS_STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ PBS_STRIPE_WEBHOOK_SECRET not set, using (probably useless) default");
            "whsec_00000000000000".to_string()
        }));
        let signature_tolerance = std::env::var("PBS_STRIPE_SIGNATURE_TOLERANCE")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid PBS_STRIPE_SIGNATURE_TOLERANCE value '{s}': {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_TOLERANCE_SECS);
        Self { api_base, secret_key, webhook_secret, signature_tolerance }
    }
}
