use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::{
    db_types::{Bid, BidStatusType},
    events::{BidPaidEvent, BidStatusChangedEvent, EventHandler, EventProducer, Handler},
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub bid_paid_producer: Vec<EventProducer<BidPaidEvent>>,
    pub status_changed_producer: Vec<EventProducer<BidStatusChangedEvent>>,
}

impl EventProducers {
    /// Notifies subscribers that `bid` has moved out of `old_status`. Moving into `Pending` also counts as the bid
    /// being paid.
    pub async fn publish_status_change(&self, old_status: BidStatusType, bid: &Bid) {
        for emitter in &self.status_changed_producer {
            trace!("📬️ Notifying status change subscribers for bid #{}", bid.id);
            emitter.publish_event(BidStatusChangedEvent::new(old_status, bid.clone())).await;
        }
        if bid.status == BidStatusType::Pending && old_status != BidStatusType::Pending {
            for emitter in &self.bid_paid_producer {
                debug!("📬️ Notifying bid paid subscribers for bid #{}", bid.id);
                emitter.publish_event(BidPaidEvent::new(bid.clone())).await;
            }
        }
    }
}

pub struct EventHandlers {
    pub on_bid_paid: Option<EventHandler<BidPaidEvent>>,
    pub on_status_changed: Option<EventHandler<BidStatusChangedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_bid_paid = hooks.on_bid_paid.map(|f| EventHandler::new(buffer_size, f));
        let on_status_changed = hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_bid_paid, on_status_changed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_bid_paid {
            result.bid_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_bid_paid {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_bid_paid: Option<Handler<BidPaidEvent>>,
    pub on_status_changed: Option<Handler<BidStatusChangedEvent>>,
}

impl EventHooks {
    pub fn on_bid_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BidPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_bid_paid = Some(Arc::new(f));
        self
    }

    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BidStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }
}
