use std::{fmt::Display, str::FromStr};

use bid_engine::{
    bid_objects::BidQueryFilter,
    db_types::{BidStatusType, Role, User},
};
use chrono::{DateTime, Utc};
use pbs_common::helpers::parse_comma_list;
use serde::{Deserialize, Serialize};

use crate::{auth::AccessToken, errors::ServerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(flatten)]
    pub token: AccessToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user: User,
    pub roles: Vec<Role>,
}

/// `GET /api/quote?max_bid=3000.00`. The maximum bid is in dollars, as typed into the bid form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuoteParams {
    pub max_bid: f64,
}

/// Query parameters for the admin bid search. `status` takes a comma-separated list, e.g. `status=pending,winning`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BidSearchParams {
    pub user_id: Option<i64>,
    pub lot_number: Option<String>,
    pub status: Option<String>,
    pub payment_intent_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TryFrom<BidSearchParams> for BidQueryFilter {
    type Error = ServerError;

    fn try_from(params: BidSearchParams) -> Result<Self, Self::Error> {
        let statuses = params
            .status
            .map(|s| {
                parse_comma_list(&s)
                    .iter()
                    .map(|v| BidStatusType::from_str(v).map_err(|e| ServerError::InvalidRequestPath(e.to_string())))
                    .collect::<Result<Vec<BidStatusType>, ServerError>>()
            })
            .transpose()?
            .filter(|s| !s.is_empty());
        Ok(BidQueryFilter {
            user_id: params.user_id,
            lot_number: params.lot_number,
            statuses,
            payment_intent_id: params.payment_intent_id,
            since: params.since,
            until: params.until,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: BidStatusType,
    pub reason: String,
}
