//! Authorization predicates for the marketplace flows.
//!
//! Every operation checks the acting user against the target entity through one of these
//! predicates before touching state. The predicates are pure policy: no IO, no panics, and a typed
//! denial reason on failure so callers can surface *why* an actor was refused.

use thiserror::Error;

use crate::db_types::{Order, Payment, Role};

/// The authenticated user an operation is performed as. Constructed by the transport layer from
/// validated credentials; the engine never sees raw tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Permission denied. {0}")]
pub struct PermissionDenied(pub String);

fn denied<T: Into<String>>(reason: T) -> Result<(), PermissionDenied> {
    Err(PermissionDenied(reason.into()))
}

/// Clients create orders and initiate payments for them.
pub fn can_create_order(actor: &Actor) -> Result<(), PermissionDenied> {
    match actor.role {
        Role::Client => Ok(()),
        role => denied(format!("Only clients may place orders, not {role}s")),
    }
}

/// Payment initiation is restricted to the client that owns the order.
pub fn can_initiate_payment(actor: &Actor, order: &Order) -> Result<(), PermissionDenied> {
    can_create_order(actor)?;
    if order.client_id == actor.id {
        Ok(())
    } else {
        denied(format!("Order #{} does not belong to this client", order.id))
    }
}

/// Refunds may be requested by the paying user or an admin.
pub fn can_refund(actor: &Actor, payment: &Payment) -> Result<(), PermissionDenied> {
    if actor.is_admin() || payment.user_id == actor.id {
        Ok(())
    } else {
        denied("Only the paying user or an admin may refund a payment")
    }
}

/// Claiming an order is a worker capability. Fails closed for everyone else, regardless of any
/// other state.
pub fn can_assign(actor: &Actor) -> Result<(), PermissionDenied> {
    match actor.role {
        Role::Worker => Ok(()),
        role => denied(format!("Only workers may accept orders, not {role}s")),
    }
}

/// Status updates are restricted to the order's client, its assigned worker, or an admin.
pub fn can_update_status(actor: &Actor, order: &Order) -> Result<(), PermissionDenied> {
    if actor.is_admin() {
        return Ok(());
    }
    match actor.role {
        Role::Client if order.client_id == actor.id => Ok(()),
        Role::Client => denied(format!("Order #{} does not belong to this client", order.id)),
        Role::Worker if order.worker_id == Some(actor.id) => Ok(()),
        Role::Worker => denied(format!("Order #{} is not assigned to this worker", order.id)),
        _ => denied("Not authorized to update this order"),
    }
}

/// Admins may move an order outside the allowed-transition table; nobody else may.
pub fn can_override_transitions(actor: &Actor) -> bool {
    actor.is_admin()
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use smp_common::Money;

    use super::*;
    use crate::db_types::{OrderStatusType, Payment, PaymentId, PaymentMethod, PaymentStatus};

    fn order(client_id: i64, worker_id: Option<i64>) -> Order {
        Order {
            id: 1,
            client_id,
            worker_id,
            service_id: 1,
            description: String::new(),
            address: String::new(),
            scheduled_date: Utc::now(),
            quantity: 1,
            total_price: Money::from_whole(100),
            status: OrderStatusType::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        }
    }

    fn payment(user_id: i64) -> Payment {
        Payment {
            id: PaymentId::random(),
            order_id: 1,
            user_id,
            amount: Money::from_whole(100),
            currency: "USD".into(),
            payment_method: PaymentMethod::Card,
            status: PaymentStatus::Completed,
            gateway_transaction_id: None,
            gateway_response: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            processed_at: None,
        }
    }

    #[test]
    fn only_owning_client_may_initiate() {
        let order = order(10, None);
        assert!(can_initiate_payment(&Actor::new(10, Role::Client), &order).is_ok());
        assert!(can_initiate_payment(&Actor::new(11, Role::Client), &order).is_err());
        // Role check fails closed even for admins; payments are always made by the order's client.
        assert!(can_initiate_payment(&Actor::new(10, Role::Admin), &order).is_err());
    }

    #[test]
    fn refunds_for_payer_or_admin() {
        let payment = payment(7);
        assert!(can_refund(&Actor::new(7, Role::Client), &payment).is_ok());
        assert!(can_refund(&Actor::new(1, Role::Admin), &payment).is_ok());
        let err = can_refund(&Actor::new(8, Role::Client), &payment).unwrap_err();
        assert!(err.to_string().contains("paying user"));
    }

    #[test]
    fn assignment_is_worker_only() {
        assert!(can_assign(&Actor::new(3, Role::Worker)).is_ok());
        assert!(can_assign(&Actor::new(3, Role::Client)).is_err());
        assert!(can_assign(&Actor::new(3, Role::Admin)).is_err());
    }

    #[test]
    fn status_updates_require_a_relationship() {
        let order = order(10, Some(20));
        assert!(can_update_status(&Actor::new(10, Role::Client), &order).is_ok());
        assert!(can_update_status(&Actor::new(20, Role::Worker), &order).is_ok());
        assert!(can_update_status(&Actor::new(1, Role::Admin), &order).is_ok());
        assert!(can_update_status(&Actor::new(11, Role::Client), &order).is_err());
        assert!(can_update_status(&Actor::new(21, Role::Worker), &order).is_err());
    }
}
