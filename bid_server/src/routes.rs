//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a screenful go into their own module.
//!
//! Every handler that touches the database or the payment processor is `async`. Worker threads handle their requests
//! sequentially, so a handler that blocks the thread (e.g. `std::thread::sleep`, or synchronous I/O) stalls every
//! other request on that worker.
//!
//! Handlers are generic over the backend traits so that the endpoint tests can run them against mocks. Actix cannot
//! register generic handlers directly, so each one is wrapped in a route type by the [`route!`](crate::route) macro.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use bid_engine::{
    bid_objects::{BidQueryFilter, BidRequest},
    db_types::Role,
    traits::{BidGatewayDatabase, BidManagement, PaymentProcessor, UserManagement},
    AuthApi,
    BidFlowApi,
    BidsApi,
    ReconciliationApi,
    ReconciliationOutcome,
};
use log::*;
use stripe_tools::WebhookEvent;

use crate::{
    auth::{JwtClaims, TokenIssuer},
    config::ServerOptions,
    data_objects::{
        AuthResponse,
        BidSearchParams,
        JsonResponse,
        LoginRequest,
        QuoteParams,
        RegisterRequest,
        StatusUpdateRequest,
        UserProfile,
    },
    errors::ServerError,
    helpers::get_remote_ip,
    integrations::stripe::notification_from_event,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:path),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Auth  ----------------------------------------------------
route!(register => Post "/auth/register" impl UserManagement);
/// Creates an account and logs the new user in.
///
/// The body is `{"email": "...", "password": "...", "name": "..."}`. The response carries the user record and an
/// access token, exactly like `/auth/login`.
pub async fn register<B: UserManagement>(
    body: web::Json<RegisterRequest>,
    api: web::Data<AuthApi<B>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received registration request");
    let RegisterRequest { email, password, name } = body.into_inner();
    let user = api.register(&email, &password, &name).await?;
    let token = signer.issue_token(&user)?;
    info!("💻️ New account #{} registered", user.id);
    Ok(HttpResponse::Created().json(AuthResponse { user, token }))
}

route!(login => Post "/auth/login" impl UserManagement);
/// Exchanges an email and password for an access token.
///
/// The token is valid for `PBS_TOKEN_LIFETIME_HOURS` and will NOT refresh. Present it in the
/// `Authorization: Bearer` header (or the `pbs_access_token` header) on every `/api` call.
pub async fn login<B: UserManagement>(
    body: web::Json<LoginRequest>,
    api: web::Data<AuthApi<B>>,
    signer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received login request");
    let LoginRequest { email, password } = body.into_inner();
    let user = api.login(&email, &password).await.map_err(|e| {
        debug!("💻️ Login failed. {e}");
        ServerError::from(e)
    })?;
    let token = signer.issue_token(&user)?;
    debug!("💻️ User #{} logged in", user.id);
    Ok(HttpResponse::Ok().json(AuthResponse { user, token }))
}

route!(me => Get "/me" impl UserManagement);
pub async fn me<B: UserManagement>(claims: JwtClaims, api: web::Data<AuthApi<B>>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET me for user #{}", claims.sub);
    let user = api.user_by_id(claims.sub).await?;
    Ok(HttpResponse::Ok().json(UserProfile { user, roles: claims.roles }))
}

//----------------------------------------------   Bids  ----------------------------------------------------
route!(quote => Get "/quote" impl BidGatewayDatabase, PaymentProcessor);
/// Prices a bid without placing it. `max_bid` is given in dollars; every amount in the response is in cents.
pub async fn quote<B, P>(
    query: web::Query<QuoteParams>,
    api: web::Data<BidFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BidGatewayDatabase,
    P: PaymentProcessor,
{
    trace!("💻️ GET quote for a maximum bid of ${:.2}", query.max_bid);
    let quote = api.quote_dollars(query.max_bid)?;
    Ok(HttpResponse::Ok().json(quote))
}

route!(place_bid => Post "/bids" impl BidGatewayDatabase, PaymentProcessor);
/// Places a proxy bid for the logged-in user.
///
/// The body is a [`BidRequest`]. On success the response contains the stored bid, the fee quote and the
/// `client_secret` that the browser needs to complete the payment with the processor. The bid only becomes
/// `pending` once the processor confirms the payment through the webhook.
///
/// If the processor could not be reached, the bid is kept in the `new` state and a 502 is returned. The user can
/// then retry the payment with `/api/bids/{id}/retry_payment`.
pub async fn place_bid<B, P>(
    claims: JwtClaims,
    body: web::Json<BidRequest>,
    api: web::Data<BidFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BidGatewayDatabase,
    P: PaymentProcessor,
{
    let request = body.into_inner();
    debug!("💻️ POST bid on lot {} for user #{}", request.lot_number, claims.sub);
    let placement = api.place_bid(claims.sub, request).await?;
    Ok(HttpResponse::Created().json(placement))
}

route!(my_bids => Get "/bids" impl BidManagement);
/// All of the logged-in user's bids, newest first.
pub async fn my_bids<B: BidManagement>(
    claims: JwtClaims,
    api: web::Data<BidsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_bids for user #{}", claims.sub);
    let bids = api.bids_for_user(claims.sub).await?;
    Ok(HttpResponse::Ok().json(bids))
}

route!(my_bid => Get "/bids/{id}" impl BidManagement);
/// One of the logged-in user's bids. Other users' bids are reported as not found, whether they exist or not.
pub async fn my_bid<B: BidManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<BidsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let bid_id = path.into_inner();
    debug!("💻️ GET bid #{bid_id} for user #{}", claims.sub);
    let bid = api
        .bid_for_user(claims.sub, bid_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Bid #{bid_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(bid))
}

route!(retry_payment => Post "/bids/{id}/retry_payment" impl BidGatewayDatabase, PaymentProcessor);
/// Starts a fresh payment for a bid whose payment failed (or could never be started).
pub async fn retry_payment<B, P>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<BidFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BidGatewayDatabase,
    P: PaymentProcessor,
{
    let bid_id = path.into_inner();
    debug!("💻️ POST retry_payment for bid #{bid_id}");
    let retry = api.retry_payment(claims.sub, bid_id).await?;
    Ok(HttpResponse::Ok().json(retry))
}

route!(cancel_bid => Post "/bids/{id}/cancel" impl BidGatewayDatabase, PaymentProcessor);
/// Cancels one of the user's unpaid bids. Paid bids cannot be cancelled by their owner.
pub async fn cancel_bid<B, P>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<BidFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: BidGatewayDatabase,
    P: PaymentProcessor,
{
    let bid_id = path.into_inner();
    debug!("💻️ POST cancel for bid #{bid_id}");
    let bid = api.cancel_bid(claims.sub, bid_id).await?;
    Ok(HttpResponse::Ok().json(bid))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(search_bids => Get "/search/bids" impl BidManagement where requires [Role::Admin]);
/// Searches all bids. Supported query parameters are `user_id`, `lot_number`, `status` (comma-separated),
/// `payment_intent_id`, `since` and `until` (RFC 3339 timestamps).
pub async fn search_bids<B: BidManagement>(
    query: web::Query<BidSearchParams>,
    api: web::Data<BidsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = BidQueryFilter::try_from(query.into_inner())?;
    debug!("💻️ GET bid search for [{query}]");
    let bids = api.search_bids(query).await.map_err(|e| {
        debug!("💻️ Could not search bids. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(bids))
}

route!(update_bid_status => Patch "/bids/{id}/status" impl BidGatewayDatabase where requires [Role::Admin]);
/// Records auction progress (winning, outbid, won, lost) or cancels a bid.
///
/// Payment states cannot be set here. They are driven by the payment processor only.
pub async fn update_bid_status<B: BidGatewayDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let bid_id = path.into_inner();
    let StatusUpdateRequest { status, reason } = body.into_inner();
    info!("💻️ PATCH bid #{bid_id} to {status} by admin #{}. Reason: {reason}", claims.sub);
    let bid = api.modify_status_for_bid(bid_id, status, &reason).await?;
    Ok(HttpResponse::Ok().json(bid))
}

route!(bid_payment_events => Get "/bids/{id}/payment_events" impl BidManagement where requires [Role::Admin]);
/// Every processor notification received for a bid, with the outcome of reconciling it.
pub async fn bid_payment_events<B: BidManagement>(
    path: web::Path<i64>,
    api: web::Data<BidsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let bid_id = path.into_inner();
    debug!("💻️ GET payment events for bid #{bid_id}");
    let events = api.payment_events_for_bid(bid_id).await?;
    Ok(HttpResponse::Ok().json(events))
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(stripe_webhook => Post "" impl BidGatewayDatabase);
/// Receives payment notifications from the processor. The signature has already been checked by the
/// [`SignatureMiddlewareFactory`](crate::middleware::SignatureMiddlewareFactory) by the time we get here.
///
/// Anything the processor should not send again (applied, ignored, duplicate, rejected or unknown-bid notifications)
/// gets a 200. A payload we cannot read gets a 400. If the backend fails, we return a 500 so that the processor
/// redelivers the event later.
pub async fn stripe_webhook<B: BidGatewayDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    options: web::Data<ServerOptions>,
    api: web::Data<ReconciliationApi<B>>,
) -> HttpResponse {
    trace!("💻️ Received webhook request: {}", req.uri());
    let peer_addr = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    let event = match serde_json::from_slice::<WebhookEvent>(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("💻️ Unreadable webhook payload from {peer_addr:?}. {e}");
            return HttpResponse::BadRequest().json(JsonResponse::failure(format!("Invalid webhook payload. {e}")));
        },
    };
    info!("💻️ Webhook event {} ({}) received from {peer_addr:?}", event.id, event.event_type);
    let notification = match notification_from_event(&event) {
        Ok(Some(notification)) => notification,
        Ok(None) => {
            debug!("💻️ Event type {} is not handled", event.event_type);
            return HttpResponse::Ok().json(JsonResponse::success(format!("Event type {} ignored.", event.event_type)));
        },
        Err(e) => {
            warn!("💻️ Could not read payment intent from event {}. {e}", event.id);
            return HttpResponse::BadRequest().json(JsonResponse::failure(e));
        },
    };
    match api.process_payment_notification(notification).await {
        Ok(outcome @ ReconciliationOutcome::Rejected { .. }) => {
            // Acknowledged so it is not redelivered. It is recorded and needs manual follow-up.
            HttpResponse::Ok().json(JsonResponse::failure(outcome.describe()))
        },
        Ok(outcome) => HttpResponse::Ok().json(JsonResponse::success(outcome.describe())),
        Err(e) => {
            error!("💻️ Could not process webhook event {}. The processor will retry. {e}", event.id);
            HttpResponse::InternalServerError().json(JsonResponse::failure("Could not process event."))
        },
    }
}
