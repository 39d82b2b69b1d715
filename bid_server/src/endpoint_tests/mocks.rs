use bid_engine::{
    bid_objects::BidQueryFilter,
    db_types::{Bid, BidStatusType, NewBid, NewUser, PaymentEventRecord, PaymentNotification, User},
    traits::{
        AuthApiError,
        AuthorizationRequest,
        BidGatewayDatabase,
        BidGatewayError,
        BidManagement,
        PaymentAuthorization,
        PaymentProcessor,
        PaymentProcessorError,
        ReconciliationOutcome,
        UserManagement,
    },
};
use mockall::mock;

mock! {
    pub UserManager {}
    impl UserManagement for UserManager {
        async fn insert_user(&self, user: NewUser) -> Result<User, AuthApiError>;
        async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, AuthApiError>;
        async fn fetch_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthApiError>;
    }
}

mock! {
    pub BidStore {}
    impl Clone for BidStore {
        fn clone(&self) -> Self;
    }
    impl BidManagement for BidStore {
        async fn fetch_bid(&self, bid_id: i64) -> Result<Option<Bid>, BidGatewayError>;
        async fn fetch_bid_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Bid>, BidGatewayError>;
        async fn fetch_bids_for_user(&self, user_id: i64) -> Result<Vec<Bid>, BidGatewayError>;
        async fn search_bids(&self, query: BidQueryFilter) -> Result<Vec<Bid>, BidGatewayError>;
        async fn fetch_payment_events_for_bid(&self, bid_id: i64) -> Result<Vec<PaymentEventRecord>, BidGatewayError>;
    }
    impl BidGatewayDatabase for BidStore {
        fn url(&self) -> &str;
        async fn insert_bid(&self, bid: NewBid) -> Result<Bid, BidGatewayError>;
        async fn attach_payment_authorization(&self, bid_id: i64, expected: BidStatusType, payment_intent_id: &str) -> Result<Bid, BidGatewayError>;
        async fn update_bid_status(&self, bid_id: i64, expected: BidStatusType, new_status: BidStatusType) -> Result<Bid, BidGatewayError>;
        async fn process_payment_notification(&self, notification: PaymentNotification) -> Result<ReconciliationOutcome, BidGatewayError>;
        async fn fetch_abandoned_bids(&self, older_than: std::time::Duration) -> Result<Vec<Bid>, BidGatewayError>;
        async fn close(&mut self) -> Result<(), BidGatewayError>;
    }
}

mock! {
    pub Processor {}
    impl PaymentProcessor for Processor {
        async fn create_authorization(&self, request: AuthorizationRequest) -> Result<PaymentAuthorization, PaymentProcessorError>;
        async fn cancel_authorization(&self, payment_intent_id: &str) -> Result<(), PaymentProcessorError>;
    }
}
