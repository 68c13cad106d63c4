use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::task::JoinHandle;

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    InventoryDiscrepancyEvent,
    PurchaseCompletedEvent,
    PurchaseFailedEvent,
};

/// The publishing side of the event hooks. A coordinator holds one of these and publishes every outcome to all
/// subscribers. An empty set of producers is valid; events are then simply dropped.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub purchase_completed_producer: Vec<EventProducer<PurchaseCompletedEvent>>,
    pub purchase_failed_producer: Vec<EventProducer<PurchaseFailedEvent>>,
    pub inventory_discrepancy_producer: Vec<EventProducer<InventoryDiscrepancyEvent>>,
}

impl EventProducers {
    pub async fn publish_purchase_completed(&self, event: PurchaseCompletedEvent) {
        trace!("📬️ Publishing purchase completed event for order {}", event.purchase.order.order_id);
        for producer in &self.purchase_completed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_purchase_failed(&self, event: PurchaseFailedEvent) {
        trace!("📬️ Publishing purchase failed event ({}) for {}", event.kind, event.item_id);
        for producer in &self.purchase_failed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_inventory_discrepancy(&self, event: InventoryDiscrepancyEvent) {
        trace!("📬️ Publishing inventory discrepancy event for order {}", event.order_id);
        for producer in &self.inventory_discrepancy_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_purchase_completed: Option<EventHandler<PurchaseCompletedEvent>>,
    pub on_purchase_failed: Option<EventHandler<PurchaseFailedEvent>>,
    pub on_inventory_discrepancy: Option<EventHandler<InventoryDiscrepancyEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_purchase_completed = hooks.on_purchase_completed.map(|f| EventHandler::new(buffer_size, f));
        let on_purchase_failed = hooks.on_purchase_failed.map(|f| EventHandler::new(buffer_size, f));
        let on_inventory_discrepancy = hooks.on_inventory_discrepancy.map(|f| EventHandler::new(buffer_size, f));
        Self { on_purchase_completed, on_purchase_failed, on_inventory_discrepancy }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_purchase_completed {
            result.purchase_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_purchase_failed {
            result.purchase_failed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_inventory_discrepancy {
            result.inventory_discrepancy_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns one task per registered hook. Each task ends once every producer for its event has been dropped and all
    /// in-flight handlers have finished, so awaiting the handles after dropping the coordinator drains every event.
    pub fn start_handlers(self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::with_capacity(3);
        if let Some(handler) = self.on_purchase_completed {
            tasks.push(tokio::spawn(handler.start_handler()));
        }
        if let Some(handler) = self.on_purchase_failed {
            tasks.push(tokio::spawn(handler.start_handler()));
        }
        if let Some(handler) = self.on_inventory_discrepancy {
            tasks.push(tokio::spawn(handler.start_handler()));
        }
        tasks
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_purchase_completed: Option<Handler<PurchaseCompletedEvent>>,
    pub on_purchase_failed: Option<Handler<PurchaseFailedEvent>>,
    pub on_inventory_discrepancy: Option<Handler<InventoryDiscrepancyEvent>>,
}

impl EventHooks {
    pub fn on_purchase_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PurchaseCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_purchase_completed = Some(Arc::new(f));
        self
    }

    pub fn on_purchase_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PurchaseFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_purchase_failed = Some(Arc::new(f));
        self
    }

    pub fn on_inventory_discrepancy<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(InventoryDiscrepancyEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_inventory_discrepancy = Some(Arc::new(f));
        self
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;
    use crate::checkout_api::errors::FailureKind;

    #[tokio::test]
    async fn hooks_receive_published_events() {
        let _ = env_logger::try_init();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let mut hooks = EventHooks::default();
        hooks.on_purchase_failed(move |ev| {
            let seen = Arc::clone(&seen2);
            Box::pin(async move {
                seen.lock().unwrap().push(ev.kind);
            })
        });
        let handlers = EventHandlers::new(4, hooks);
        let producers = handlers.producers();
        assert_eq!(producers.purchase_failed_producer.len(), 1);
        assert!(producers.purchase_completed_producer.is_empty());
        let tasks = handlers.start_handlers();
        assert_eq!(tasks.len(), 1);

        let event = PurchaseFailedEvent {
            item_id: "plant-1".into(),
            kind: FailureKind::ChargeFailed,
            detail: "insufficient_funds".into(),
            retryable: true,
            transaction_id: None,
            failed_at: chrono::Utc::now(),
        };
        producers.publish_purchase_failed(event).await;
        drop(producers);
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec![FailureKind::ChargeFailed]);
    }
}
