use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use bid_engine::{events::EventProducers, AuthApi, BidFlowApi, BidsApi, ReconciliationApi, SqliteDatabase};
use log::*;

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::stripe::{create_bid_event_handlers, StripeProcessor},
    middleware::{JwtMiddlewareFactory, SignatureMiddlewareFactory},
    routes::{
        health,
        BidPaymentEventsRoute,
        CancelBidRoute,
        LoginRoute,
        MeRoute,
        MyBidRoute,
        MyBidsRoute,
        PlaceBidRoute,
        QuoteRoute,
        RegisterRoute,
        RetryPaymentRoute,
        SearchBidsRoute,
        StripeWebhookRoute,
        UpdateBidStatusRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed. {e}")))?;
    info!("🗃️ Database at {} is ready", config.database_url);
    let processor = StripeProcessor::new(config.stripe_config.clone())?;
    let handlers = create_bid_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let expiry_api = BidFlowApi::new(db.clone(), processor.clone(), config.fees.clone(), producers.clone());
    let _worker = start_expiry_worker(expiry_api, config.unpaid_bid_timeout);
    let srv = create_server_instance(config, db, processor, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    processor: StripeProcessor,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let auth_api = AuthApi::new(db.clone());
        let bids_api = BidsApi::new(db.clone());
        let bid_flow_api = BidFlowApi::new(db.clone(), processor.clone(), config.fees.clone(), producers.clone());
        let reconciliation_api = ReconciliationApi::new(db.clone(), producers.clone());
        let jwt_signer = TokenIssuer::new(&config.auth);
        let jwt_verifier = TokenVerifier::new(&config.auth);
        let stripe = &config.stripe_config;
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("pbs::access_log"))
            .app_data(web::Data::new(auth_api))
            .app_data(web::Data::new(bids_api))
            .app_data(web::Data::new(bid_flow_api))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(jwt_signer))
            .app_data(web::Data::new(options));
        // Routes that require authentication
        let auth_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(jwt_verifier))
            .service(MeRoute::<SqliteDatabase>::new())
            .service(QuoteRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(PlaceBidRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(MyBidsRoute::<SqliteDatabase>::new())
            .service(MyBidRoute::<SqliteDatabase>::new())
            .service(RetryPaymentRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(CancelBidRoute::<SqliteDatabase, StripeProcessor>::new())
            .service(SearchBidsRoute::<SqliteDatabase>::new())
            .service(UpdateBidStatusRoute::<SqliteDatabase>::new())
            .service(BidPaymentEventsRoute::<SqliteDatabase>::new());
        let webhook_scope = web::scope("/webhook")
            .wrap(SignatureMiddlewareFactory::new(
                stripe.webhook_secret.clone(),
                stripe.signature_tolerance,
                config.signature_checks,
            ))
            .service(StripeWebhookRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(RegisterRoute::<SqliteDatabase>::new())
            .service(LoginRoute::<SqliteDatabase>::new())
            .service(auth_scope)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    info!("💻️ Proxy bid server listening on {host}:{port}");
    Ok(srv)
}
