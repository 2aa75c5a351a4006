use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db_types::{Order, OrderStatusType, Payment, PaymentId, PaymentStatus, Role};

//--------------------------------------      GroupKey      ---------------------------------------------------------
/// A named set of live connections. Each authenticated connection belongs to exactly two groups:
/// its per-user group and its per-role group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    User(i64),
    Role(Role),
}

impl GroupKey {
    pub fn user(id: i64) -> Self {
        Self::User(id)
    }

    pub fn role(role: Role) -> Self {
        Self::Role(role)
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKey::User(id) => write!(f, "user:{id}"),
            GroupKey::Role(role) => write!(f, "role:{role}"),
        }
    }
}

//--------------------------------------  Notification kinds  -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderNotificationType {
    OrderCreated,
    NewOrderAvailable,
    WorkerAssigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentNotificationType {
    PaymentSuccess,
    PaymentFailed,
    PaymentRefunded,
}

//--------------------------------------  NotificationEvent  --------------------------------------------------------
/// A tagged event document as delivered to live connections. The `type` tag and field names are
/// the platform's websocket wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    ConnectionEstablished {
        message: String,
    },
    OrderNotification {
        notification_type: OrderNotificationType,
        order_id: i64,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Order>,
        #[serde(skip_serializing_if = "Option::is_none")]
        worker_name: Option<String>,
    },
    PaymentNotification {
        notification_type: PaymentNotificationType,
        order_id: i64,
        payment_id: PaymentId,
        message: String,
        amount: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<PaymentStatus>,
    },
    StatusUpdate {
        order_id: i64,
        new_status: OrderStatusType,
        comment: String,
        message: String,
    },
    /// Keep-alive only; no business semantics. The timestamp is echoed back verbatim.
    Ping {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<Value>,
    },
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<Value>,
    },
}

impl NotificationEvent {
    pub fn connection_established() -> Self {
        Self::ConnectionEstablished { message: "Connected to notifications".to_string() }
    }

    pub fn order_created(order: &Order) -> Self {
        Self::OrderNotification {
            notification_type: OrderNotificationType::OrderCreated,
            order_id: order.id,
            message: format!("Order #{} has been created successfully", order.id),
            data: Some(order.clone()),
            worker_name: None,
        }
    }

    pub fn new_order_available(order: &Order, service_name: &str) -> Self {
        Self::OrderNotification {
            notification_type: OrderNotificationType::NewOrderAvailable,
            order_id: order.id,
            message: format!("New order available: {service_name}"),
            data: Some(order.clone()),
            worker_name: None,
        }
    }

    pub fn worker_assigned(order: &Order, worker_name: &str) -> Self {
        Self::OrderNotification {
            notification_type: OrderNotificationType::WorkerAssigned,
            order_id: order.id,
            message: format!("Worker assigned to your order #{}", order.id),
            data: None,
            worker_name: Some(worker_name.to_string()),
        }
    }

    pub fn payment_success(payment: &Payment) -> Self {
        Self::PaymentNotification {
            notification_type: PaymentNotificationType::PaymentSuccess,
            order_id: payment.order_id,
            payment_id: payment.id.clone(),
            message: format!("Payment for order #{} completed successfully", payment.order_id),
            amount: payment.amount.to_string(),
            status: Some(payment.status),
        }
    }

    pub fn payment_failed(payment: &Payment) -> Self {
        Self::PaymentNotification {
            notification_type: PaymentNotificationType::PaymentFailed,
            order_id: payment.order_id,
            payment_id: payment.id.clone(),
            message: format!("Payment for order #{} failed", payment.order_id),
            amount: payment.amount.to_string(),
            status: Some(payment.status),
        }
    }

    pub fn payment_refunded(payment: &Payment) -> Self {
        Self::PaymentNotification {
            notification_type: PaymentNotificationType::PaymentRefunded,
            order_id: payment.order_id,
            payment_id: payment.id.clone(),
            message: format!("Refund processed for order #{}", payment.order_id),
            amount: payment.amount.to_string(),
            status: None,
        }
    }

    pub fn status_update(order: &Order, new_status: OrderStatusType, comment: &str) -> Self {
        Self::StatusUpdate {
            order_id: order.id,
            new_status,
            comment: comment.to_string(),
            message: format!("Order #{} status updated to {new_status}", order.id),
        }
    }

    pub fn pong(timestamp: Option<Value>) -> Self {
        Self::Pong { timestamp }
    }
}

//--------------------------------------    Notification     --------------------------------------------------------
/// An addressed event: what to deliver and which group of connections to deliver it to. This is
/// the only thing the flow APIs ever hand to the outbound queue; how it reaches the wire is the
/// delivery layer's business.
#[derive(Debug, Clone)]
pub struct Notification {
    pub group: GroupKey,
    pub event: NotificationEvent,
}

impl Notification {
    pub fn new(group: GroupKey, event: NotificationEvent) -> Self {
        Self { group, event }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn group_keys_render_as_wire_names() {
        assert_eq!(GroupKey::user(42).to_string(), "user:42");
        assert_eq!(GroupKey::role(Role::Worker).to_string(), "role:worker");
    }

    #[test]
    fn events_are_tagged_documents() {
        let event = NotificationEvent::StatusUpdate {
            order_id: 7,
            new_status: OrderStatusType::InProgress,
            comment: "on my way".into(),
            message: "Order #7 status updated to in_progress".into(),
        };
        let doc = serde_json::to_value(&event).unwrap();
        assert_eq!(doc["type"], "status_update");
        assert_eq!(doc["new_status"], "in_progress");
    }

    #[test]
    fn pong_echoes_the_original_timestamp() {
        let ping: NotificationEvent =
            serde_json::from_str(r#"{"type":"ping","timestamp":1717171717}"#).unwrap();
        let NotificationEvent::Ping { timestamp } = ping else {
            panic!("expected a ping");
        };
        let pong = serde_json::to_value(NotificationEvent::pong(timestamp)).unwrap();
        assert_eq!(pong["type"], "pong");
        assert_eq!(pong["timestamp"], 1717171717);
    }
}
