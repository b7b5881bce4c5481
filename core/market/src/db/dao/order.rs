use chrono::NaiveDateTime;
use diesel::prelude::*;

use scm_persistence::executor::{
    do_with_transaction, readonly_transaction, AsDao, ConnType, PoolType,
};

use crate::db::model::{
    ListingQuantity, OfferListing, OfferRevision, OfferSession, Order, OrderListing, OrderStatus,
};
use crate::db::schema::offer_market_listings::dsl as offer_listing;
use crate::db::schema::order_market_listings::dsl as order_listing;
use crate::db::schema::orders::dsl as order;
use crate::db::schema::order_offers::dsl as revision;
use crate::db::{DbError, DbResult};

#[derive(thiserror::Error, Debug)]
pub enum StatusUpdateError {
    #[error("Order [{0}] not found.")]
    NotFound(String),
    #[error("Can't change Order [{id}] status from {from} to {to}.")]
    InvalidTransition {
        id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<diesel::result::Error> for StatusUpdateError {
    fn from(e: diesel::result::Error) -> Self {
        StatusUpdateError::Db(e.into())
    }
}

pub struct OrderDao<'c> {
    pool: &'c PoolType,
}

impl<'c> AsDao<'c> for OrderDao<'c> {
    fn as_dao(pool: &'c PoolType) -> Self {
        Self { pool }
    }
}

impl<'c> OrderDao<'c> {
    pub async fn get(&self, order_id: &str) -> DbResult<Option<Order>> {
        let order_id = order_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(order::orders
                .filter(order::order_id.eq(&order_id))
                .first(conn)
                .optional()?)
        })
        .await
    }

    pub async fn by_session(&self, session_id: &str) -> DbResult<Option<Order>> {
        let session_id = session_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(order::orders
                .filter(order::offer_session_id.eq(&session_id))
                .first(conn)
                .optional()?)
        })
        .await
    }

    pub async fn count_for_session(&self, session_id: &str) -> DbResult<i64> {
        let session_id = session_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(order::orders
                .filter(order::offer_session_id.eq(&session_id))
                .count()
                .get_result(conn)?)
        })
        .await
    }

    pub async fn listings(&self, order_id: &str) -> DbResult<Vec<ListingQuantity>> {
        let order_id = order_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(order_listing::order_market_listings
                .filter(order_listing::order_id.eq(&order_id))
                .order_by(order_listing::listing_id.asc())
                .load::<OrderListing>(conn)?
                .into_iter()
                .map(|line| ListingQuantity {
                    listing_id: line.listing_id,
                    quantity: line.quantity,
                })
                .collect())
        })
        .await
    }

    /// Re-applies the revision `offer_id` of an accepted session. Idempotent.
    pub async fn materialize_accepted(
        &self,
        session: OfferSession,
        offer_id: &str,
        now: NaiveDateTime,
    ) -> DbResult<(Order, bool)> {
        let offer_id = offer_id.to_string();
        do_with_transaction(self.pool, move |conn| {
            let accepted: OfferRevision = revision::order_offers
                .filter(revision::id.eq(&offer_id))
                .first(conn)?;
            let listings: Vec<OfferListing> = offer_listing::offer_market_listings
                .filter(offer_listing::offer_id.eq(&offer_id))
                .load(conn)?;
            Ok(materialize(conn, &session, &accepted, &listings, now)?)
        })
        .await
    }

    /// Moves the order from `from` to `to`, failing if someone else moved it first.
    pub async fn update_status(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        now: NaiveDateTime,
    ) -> Result<Order, StatusUpdateError> {
        let order_id = order_id.to_string();
        do_with_transaction(self.pool, move |conn| {
            let current: Order = order::orders
                .filter(order::order_id.eq(&order_id))
                .first(conn)
                .optional()?
                .ok_or_else(|| StatusUpdateError::NotFound(order_id.clone()))?;

            if current.status != from || !from.can_transition(to) {
                return Err(StatusUpdateError::InvalidTransition {
                    id: order_id.clone(),
                    from: current.status,
                    to,
                });
            }

            diesel::update(order::orders.filter(order::order_id.eq(&order_id)))
                .set((order::status.eq(to), order::updated_at.eq(now)))
                .execute(conn)?;

            Ok(Order {
                status: to,
                updated_at: now,
                ..current
            })
        })
        .await
    }
}

/// Creates the order bound to `session` from its accepted revision, or rebinds
/// the existing one. Returns whether a new order was created.
pub(crate) fn materialize(
    conn: &ConnType,
    session: &OfferSession,
    accepted: &OfferRevision,
    listings: &[OfferListing],
    now: NaiveDateTime,
) -> QueryResult<(Order, bool)> {
    let existing: Option<Order> = order::orders
        .filter(order::offer_session_id.eq(&session.id))
        .first(conn)
        .optional()?;

    let (bound, created) = match existing {
        Some(existing) if existing.offer_id == accepted.id => return Ok((existing, false)),
        Some(existing) => {
            // Status is kept: an order already underway stays in progress.
            let rebound = Order {
                order_id: existing.order_id.clone(),
                status: existing.status,
                timestamp: existing.timestamp,
                ..Order::from_offer(session, accepted, now)
            };
            diesel::delete(
                order_listing::order_market_listings
                    .filter(order_listing::order_id.eq(&rebound.order_id)),
            )
            .execute(conn)?;
            diesel::replace_into(order::orders)
                .values(&rebound)
                .execute(conn)?;
            (rebound, false)
        }
        None => {
            let order = Order::from_offer(session, accepted, now);
            diesel::insert_into(order::orders)
                .values(&order)
                .execute(conn)?;
            (order, true)
        }
    };

    let lines = listings
        .iter()
        .map(|line| OrderListing {
            order_id: bound.order_id.clone(),
            listing_id: line.listing_id.clone(),
            quantity: line.quantity,
        })
        .collect::<Vec<_>>();
    diesel::insert_into(order_listing::order_market_listings)
        .values(&lines)
        .execute(conn)?;

    Ok((bound, created))
}
