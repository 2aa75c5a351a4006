use std::fmt::Debug;

use log::*;

use crate::{
    api::errors::OrderFlowError,
    authz::{self, Actor},
    db_types::{NewOrder, Order, OrderStatusEntry, OrderStatusType, Role},
    events::{EventProducers, GroupKey, NotificationEvent},
    traits::MarketplaceDatabase,
};

/// `OrderFlowApi` handles order creation, worker assignment and status updates, publishing a
/// notification for every user-visible mutation.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// Place a new order for the acting client.
    ///
    /// The order is owned by the actor regardless of what the request says, the service must
    /// exist and be active, and the total price is computed once from the service's base price
    /// and the quantity when not supplied. Publishes `order_created` to the client's group and a
    /// `new_order_available` broadcast to the worker role group.
    pub async fn create_order(&self, request: NewOrder, actor: &Actor) -> Result<Order, OrderFlowError> {
        authz::can_create_order(actor)?;
        let mut request = request;
        request.client_id = actor.id;
        if request.quantity < 1 {
            return Err(OrderFlowError::Validation("Quantity must be at least 1".to_string()));
        }
        let service = self
            .db
            .fetch_service(request.service_id)
            .await?
            .ok_or_else(|| OrderFlowError::Validation(format!("Service #{} does not exist", request.service_id)))?;
        if !service.is_active {
            return Err(OrderFlowError::Validation(format!("Service '{}' is not currently offered", service.name)));
        }
        let total_price = request.total_price.unwrap_or(service.base_price * request.quantity);
        let order = self.db.insert_order(request, total_price).await?;
        debug!("🔄️📦️ Order #{} created for client #{} (total {total_price})", order.id, order.client_id);
        self.producers.notify(GroupKey::user(order.client_id), NotificationEvent::order_created(&order)).await;
        self.producers
            .notify(GroupKey::role(Role::Worker), NotificationEvent::new_order_available(&order, &service.name))
            .await;
        Ok(order)
    }

    /// Claim a paid order for the acting worker and move it to `in_progress`.
    ///
    /// Only workers may call this, the order must be paid and unassigned, and the worker's
    /// specialization set must include the order's service. The claim itself is guarded at the
    /// storage layer, so two workers racing for the same order cannot both win. Appends an audit
    /// entry and announces the assignment to the client's group.
    pub async fn assign(&self, order_id: i64, actor: &Actor) -> Result<Order, OrderFlowError> {
        authz::can_assign(actor)?;
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::NotFound(order_id))?;
        if !self.db.has_specialization(actor.id, order.service_id).await? {
            return Err(OrderFlowError::Validation("You are not specialized in this service".to_string()));
        }
        let worker = self
            .db
            .fetch_user(actor.id)
            .await?
            .ok_or_else(|| OrderFlowError::Validation(format!("Worker account #{} does not exist", actor.id)))?;
        let comment = format!("Assigned to {}", worker.username);
        let order = self.db.assign_worker(order_id, &worker, &comment).await?;
        info!("🔄️📦️ Order #{} assigned to worker #{}", order.id, worker.id);
        self.producers
            .notify(GroupKey::user(order.client_id), NotificationEvent::worker_assigned(&order, &worker.username))
            .await;
        Ok(order)
    }

    /// Change an order's status.
    ///
    /// The requester must be the order's client, its assigned worker, or an admin. Transitions
    /// are validated against [`OrderStatusType::can_transition_to`]; admins may move an order
    /// outside the table. Appends an audit entry and publishes `status_update` to the client's
    /// and (when assigned) the worker's user groups.
    pub async fn update_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
        comment: &str,
        actor: &Actor,
    ) -> Result<Order, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::NotFound(order_id))?;
        authz::can_update_status(actor, &order)?;
        if !order.status.can_transition_to(new_status) && !authz::can_override_transitions(actor) {
            return Err(OrderFlowError::InvalidTransition { from: order.status, to: new_status });
        }
        let updated = self.db.update_order_status(order_id, new_status, comment, actor.id).await?;
        info!("🔄️📦️ Order #{} status changed {} → {new_status} by #{}", order.id, order.status, actor.id);
        let event = NotificationEvent::status_update(&updated, new_status, comment);
        self.producers.notify(GroupKey::user(updated.client_id), event.clone()).await;
        if let Some(worker_id) = updated.worker_id {
            self.producers.notify(GroupKey::user(worker_id), event).await;
        }
        Ok(updated)
    }

    /// The append-only audit trail for an order, oldest first.
    pub async fn status_history(&self, order_id: i64) -> Result<Vec<OrderStatusEntry>, OrderFlowError> {
        Ok(self.db.fetch_order_status_history(order_id).await?)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
