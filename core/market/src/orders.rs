//! Binding orders created from accepted offers.

use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::dao::{OfferDao, OrderDao, StatusUpdateError};
use crate::db::model::{ListingQuantity, Order, OrderStatus, SessionStatus};
use crate::db::{DbError, DbExecutor};
use crate::error::{ApiError, ErrorKind};
use crate::identity::Actor;
use crate::negotiation::{EventNotifier, MarketEventKind};
use crate::permissions::PermissionEvaluator;
use crate::utils::KeyedLock;

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Order [{0}] not found.")]
    NotFound(String),
    #[error("Offer session [{0}] not found.")]
    SessionNotFound(String),
    #[error("Offer session [{0}] wasn't accepted.")]
    NotAccepted(String),
    #[error("{0}")]
    Permission(String),
    #[error("Can't change Order [{id}] status from {from} to {to}.")]
    InvalidTransition {
        id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    #[error("Order store error: {0}.")]
    Db(#[from] DbError),
}

impl From<StatusUpdateError> for OrderError {
    fn from(e: StatusUpdateError) -> Self {
        match e {
            StatusUpdateError::NotFound(id) => OrderError::NotFound(id),
            StatusUpdateError::InvalidTransition { id, from, to } => {
                OrderError::InvalidTransition { id, from, to }
            }
            StatusUpdateError::Db(e) => OrderError::Db(e),
        }
    }
}

impl ApiError for OrderError {
    fn kind(&self) -> ErrorKind {
        match self {
            OrderError::NotFound(_) | OrderError::SessionNotFound(_) => ErrorKind::NotFoundError,
            OrderError::NotAccepted(_) | OrderError::InvalidTransition { .. } => {
                ErrorKind::StateConflictError
            }
            OrderError::Permission(_) => ErrorKind::PermissionError,
            OrderError::Db(_) => ErrorKind::InternalError,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub market_listings: Vec<ListingQuantity>,
}

#[derive(Clone)]
pub struct OrderMaterializer {
    db: DbExecutor,
    permissions: PermissionEvaluator,
    notifier: EventNotifier,
    order_locks: KeyedLock,
}

impl OrderMaterializer {
    pub fn new(db: DbExecutor, permissions: PermissionEvaluator, notifier: EventNotifier) -> Self {
        counter!("market.orders.status-changed", 0);

        OrderMaterializer {
            db,
            permissions,
            notifier,
            order_locks: KeyedLock::new(),
        }
    }

    /// Customer, seller side and site admins are related to an order.
    pub async fn related_to_order(&self, order: &Order, actor: &Actor) -> Result<bool, OrderError> {
        Ok(self.permissions.may_view(order, actor).await?)
    }

    pub async fn get_order(&self, actor: &Actor, order_id: &str) -> Result<OrderDetails, OrderError> {
        let dao = self.db.as_dao::<OrderDao>();
        let order = dao
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;
        if !self.related_to_order(&order, actor).await? {
            return Err(OrderError::Permission(format!(
                "User [{}] is not related to Order [{}].",
                actor.user_id, order_id
            )));
        }
        let market_listings = dao.listings(order_id).await?;
        Ok(OrderDetails {
            order,
            market_listings,
        })
    }

    /// The seller side may make every transition. The customer may only
    /// cancel an order that hasn't started yet.
    pub async fn set_order_status(
        &self,
        actor: &Actor,
        order_id: &str,
        to: OrderStatus,
    ) -> Result<Order, OrderError> {
        let _guard = self.order_locks.lock(order_id).await;

        let dao = self.db.as_dao::<OrderDao>();
        let order = dao
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

        let relation = self.permissions.relation(&order, actor).await?;
        let seller = relation.seller || actor.is_admin();
        if !relation.customer && !seller {
            return Err(OrderError::Permission(format!(
                "User [{}] is not related to Order [{}].",
                actor.user_id, order_id
            )));
        }
        if !order.status.can_transition(to) {
            return Err(OrderError::InvalidTransition {
                id: order_id.to_string(),
                from: order.status,
                to,
            });
        }
        if !seller && !(order.status == OrderStatus::NotStarted && to == OrderStatus::Cancelled) {
            return Err(OrderError::Permission(format!(
                "Customer can only cancel Order [{}] before it starts.",
                order_id
            )));
        }

        let updated = dao
            .update_status(order_id, order.status, to, Utc::now().naive_utc())
            .await?;
        if updated.status.is_terminal() {
            self.order_locks.clear_locks(order_id).await;
        }

        counter!("market.orders.status-changed", 1);
        log::info!(
            "User [{}] changed Order [{}] status from {} to {}.",
            actor.user_id,
            order_id,
            order.status,
            to
        );
        self.notifier.emit(
            MarketEventKind::OrderStatusChanged,
            order_id,
            Some(&actor.user_id),
        );
        Ok(updated)
    }

    /// Re-applies the accepted revision of a session, e.g. for a replayed
    /// acceptance event. Never creates a second order for one session.
    pub async fn materialize(&self, session_id: &str) -> Result<Order, OrderError> {
        let session = self
            .db
            .as_dao::<OfferDao>()
            .get(session_id)
            .await?
            .ok_or_else(|| OrderError::SessionNotFound(session_id.to_string()))?;
        let offer_id = match (&session.status, &session.current_offer_id) {
            (SessionStatus::Accepted, Some(offer_id)) => offer_id.clone(),
            _ => return Err(OrderError::NotAccepted(session_id.to_string())),
        };

        let (order, created) = self
            .db
            .as_dao::<OrderDao>()
            .materialize_accepted(session, &offer_id, Utc::now().naive_utc())
            .await?;
        if created {
            counter!("market.orders.materialized", 1);
            log::info!(
                "Materialized Order [{}] from offer session [{}].",
                order.order_id,
                session_id
            );
            self.notifier
                .emit(MarketEventKind::OrderCreated, &order.order_id, None);
        } else {
            log::debug!(
                "Order [{}] of offer session [{}] already materialized.",
                order.order_id,
                session_id
            );
        }
        Ok(order)
    }
}
