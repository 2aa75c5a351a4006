use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, GroupKey, Handler, Notification, NotificationEvent};

/// The producer handles the flow APIs publish through. Cheap to clone; one instance is handed to
/// every API value.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub notification_producers: Vec<EventProducer<Notification>>,
}

impl EventProducers {
    /// Queue `event` for delivery to `group` on every registered producer. Fire-and-forget: the
    /// caller's result never depends on delivery.
    pub async fn notify(&self, group: GroupKey, event: NotificationEvent) {
        for producer in &self.notification_producers {
            producer.publish_event(Notification::new(group.clone(), event.clone())).await;
        }
    }
}

pub struct EventHandlers {
    pub on_notification: Option<EventHandler<Notification>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_notification = hooks.on_notification.map(|f| EventHandler::new(buffer_size, f));
        Self { on_notification }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_notification {
            result.notification_producers.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_notification {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

/// Handler functions to run against outbound notifications. The server installs one that forwards
/// into the live-connection hub; tests install collectors.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_notification: Option<Handler<Notification>>,
}

impl EventHooks {
    pub fn on_notification<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(Notification) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_notification = Some(Arc::new(f));
        self
    }
}
