use std::{env, io::Write};

use bid_engine::fees::{FeeSchedule, DEFAULT_CURRENCY};
use chrono::Duration;
use log::*;
use pbs_common::{
    helpers::{parse_boolean_flag, parse_comma_list},
    Cents,
    Secret,
};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use stripe_tools::StripeConfig;
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_PBS_HOST: &str = "127.0.0.1";
const DEFAULT_PBS_PORT: u16 = 8470;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/bid_store.db";
const DEFAULT_UNPAID_BID_TIMEOUT: Duration = Duration::hours(48);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::hours(24);
const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// Service fee, deposit threshold and deposit rate applied to new bids.
    pub fees: FeeSchedule,
    /// The time before a bid that was never paid is cancelled.
    pub unpaid_bid_timeout: Duration,
    /// Payment processor configuration
    pub stripe_config: StripeConfig,
    /// If false, webhook signatures are not checked. **DANGER**: only ever disable this for local testing.
    pub signature_checks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PBS_HOST.to_string(),
            port: DEFAULT_PBS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            fees: FeeSchedule::default(),
            unpaid_bid_timeout: DEFAULT_UNPAID_BID_TIMEOUT,
            stripe_config: StripeConfig::default(),
            signature_checks: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("PBS_HOST").ok().unwrap_or_else(|| DEFAULT_PBS_HOST.into());
        let port = env::var("PBS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for PBS_PORT. {e} Using the default, {DEFAULT_PBS_PORT}, instead."
                    );
                    DEFAULT_PBS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_PBS_PORT);
        let database_url = env::var("PBS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ PBS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("PBS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("PBS_USE_FORWARDED").ok(), false);
        let fees = configure_fees();
        let unpaid_bid_timeout = configure_unpaid_bid_timeout();
        let stripe_config = StripeConfig::new_from_env_or_default();
        let signature_checks = parse_boolean_flag(env::var("PBS_STRIPE_SIGNATURE_CHECKS").ok(), true);
        if !signature_checks {
            warn!(
                "🚨️ Webhook signature checks are DISABLED. Anyone can mark bids as paid. Never run like this in \
                 production."
            );
        }
        Self {
            host,
            port,
            database_url,
            auth,
            use_x_forwarded_for,
            use_forwarded,
            fees,
            unpaid_bid_timeout,
            stripe_config,
            signature_checks,
        }
    }
}

fn cents_from_env(name: &str, default: Cents) -> Cents {
    env::var(name)
        .ok()
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}"))
                .ok()
                .filter(|v| *v >= 0)
        })
        .map(Cents::from)
        .unwrap_or(default)
}

fn configure_fees() -> FeeSchedule {
    let defaults = FeeSchedule::default();
    let service_fee = cents_from_env("PBS_SERVICE_FEE_CENTS", defaults.service_fee);
    let deposit_threshold = cents_from_env("PBS_DEPOSIT_THRESHOLD_CENTS", defaults.deposit_threshold);
    let deposit_rate_bps = env::var("PBS_DEPOSIT_RATE_BPS")
        .ok()
        .and_then(|s| {
            s.parse::<u32>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for PBS_DEPOSIT_RATE_BPS. {e}"))
                .ok()
                .filter(|v| *v <= 10_000)
        })
        .unwrap_or(defaults.deposit_rate_bps);
    let currency = env::var("PBS_CURRENCY")
        .map(|s| s.trim().to_lowercase())
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    let fees = FeeSchedule { service_fee, deposit_threshold, deposit_rate_bps, currency };
    info!(
        "🪛️ Fee schedule: service fee {}, deposit of {} bps on bids above {} ({})",
        fees.service_fee, fees.deposit_rate_bps, fees.deposit_threshold, fees.currency
    );
    fees
}

fn configure_unpaid_bid_timeout() -> Duration {
    env::var("PBS_UNPAID_BID_TIMEOUT")
        .map_err(|_| {
            info!(
                "🪛️ PBS_UNPAID_BID_TIMEOUT is not set. Using the default value of {} hrs.",
                DEFAULT_UNPAID_BID_TIMEOUT.num_hours()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::hours)
                .map_err(|e| warn!("🪛️ Invalid configuration value for PBS_UNPAID_BID_TIMEOUT. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_UNPAID_BID_TIMEOUT)
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC secret used to sign and verify access tokens.
    pub jwt_secret: Secret<String>,
    /// How long an access token stays valid after it is issued.
    pub token_lifetime: Duration,
    /// Users registering or logging in with one of these emails are granted the admin role.
    pub admin_emails: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate in \
             production like this since every token will be invalidated on restart. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({ "jwt_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, \
                         you are doing it wrong! Set the PBS_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret. ");
            },
        }
        Self { jwt_secret: Secret::new(secret), token_lifetime: DEFAULT_TOKEN_LIFETIME, admin_emails: Vec::new() }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let jwt_secret =
            env::var("PBS_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [PBS_JWT_SECRET]")))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ServerError::ConfigurationError(format!(
                "PBS_JWT_SECRET must be at least {MIN_JWT_SECRET_LENGTH} characters long"
            )));
        }
        let token_lifetime = env::var("PBS_TOKEN_LIFETIME_HOURS")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for PBS_TOKEN_LIFETIME_HOURS. {e}"))
                    .ok()
                    .filter(|h| *h > 0)
            })
            .map(Duration::hours)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let admin_emails = env::var("PBS_ADMIN_EMAILS")
            .map(|s| parse_comma_list(&s).into_iter().map(|e| e.to_lowercase()).collect::<Vec<String>>())
            .unwrap_or_default();
        if admin_emails.is_empty() {
            info!("🪛️ PBS_ADMIN_EMAILS is not set. Nobody will have admin access.");
        } else {
            info!("🪛️ {} admin account(s) configured", admin_emails.len());
        }
        Ok(Self { jwt_secret: Secret::new(jwt_secret), token_lifetime, admin_emails })
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
