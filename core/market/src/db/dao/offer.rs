use diesel::prelude::*;
use diesel::sqlite::Sqlite;

use scm_persistence::executor::{
    do_with_transaction, readonly_transaction, AsDao, ConnType, PoolType,
};

use crate::db::dao::order::materialize;
use crate::db::model::{
    ContractOffer, ListingQuantity, OfferListing, OfferRevision, OfferSession, Order,
    RevisionStatus, RevisionView, SessionStatus,
};
use crate::db::schema::offer_market_listings::dsl as listing;
use crate::db::schema::offer_sessions;
use crate::db::schema::offer_sessions::dsl as session;
use crate::db::schema::order_offers::dsl as revision;
use crate::db::schema::public_contract_offers::dsl as contract_offer;
use crate::db::{DbError, DbResult};

#[derive(thiserror::Error, Debug)]
pub enum AppendError {
    #[error("Offer session [{0}] was modified concurrently or is no longer active.")]
    Conflict(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<diesel::result::Error> for AppendError {
    fn from(e: diesel::result::Error) -> Self {
        AppendError::Db(e.into())
    }
}

/// Source session closed by a merge, with the revision that cancels it.
pub struct MergeSource {
    pub session_id: String,
    pub expected_offer_id: String,
    pub revision: OfferRevision,
    pub listings: Vec<OfferListing>,
}

#[derive(Clone, Debug, Default)]
pub struct SessionFilter {
    pub customer_id: Option<String>,
    pub assigned_id: Option<String>,
    pub contractor_id: Option<String>,
    pub status: Option<SessionStatus>,
    /// Restricts results to sessions where this user is customer or assigned seller.
    pub participant: Option<String>,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Clone, Debug)]
pub struct SessionPage {
    pub sessions: Vec<OfferSession>,
    pub total: i64,
}

pub struct OfferDao<'c> {
    pool: &'c PoolType,
}

impl<'c> AsDao<'c> for OfferDao<'c> {
    fn as_dao(pool: &'c PoolType) -> Self {
        Self { pool }
    }
}

impl<'c> OfferDao<'c> {
    /// Stores a new session with its first revision, optionally linked to a public contract.
    pub async fn create(
        &self,
        new: OfferSession,
        first: OfferRevision,
        listings: Vec<OfferListing>,
        contract_id: Option<String>,
    ) -> DbResult<OfferSession> {
        do_with_transaction(self.pool, move |conn| {
            let stored = insert_session(conn, new, &first, &listings)?;
            if let Some(contract_id) = contract_id {
                diesel::insert_into(contract_offer::public_contract_offers)
                    .values(&ContractOffer {
                        contract_id,
                        session_id: stored.id.clone(),
                    })
                    .execute(conn)?;
            }
            Ok(stored)
        })
        .await
    }

    pub async fn get(&self, session_id: &str) -> DbResult<Option<OfferSession>> {
        let session_id = session_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(session::offer_sessions
                .filter(session::id.eq(&session_id))
                .first(conn)
                .optional()?)
        })
        .await
    }

    pub async fn get_many(&self, session_ids: Vec<String>) -> DbResult<Vec<OfferSession>> {
        readonly_transaction(self.pool, move |conn| {
            Ok(session::offer_sessions
                .filter(session::id.eq_any(&session_ids))
                .load(conn)?)
        })
        .await
    }

    /// Revision the session's pointer designates, with its listing lines.
    pub async fn current_revision(&self, session_id: &str) -> DbResult<Option<RevisionView>> {
        let session_id = session_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            let current: Option<Option<String>> = session::offer_sessions
                .filter(session::id.eq(&session_id))
                .select(session::current_offer_id)
                .first(conn)
                .optional()?;
            match current.flatten() {
                Some(offer_id) => Ok(Some(revision_view(conn, &offer_id)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Full history in submission order.
    pub async fn revisions(&self, session_id: &str) -> DbResult<Vec<RevisionView>> {
        let session_id = session_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            let revisions: Vec<OfferRevision> = revision::order_offers
                .filter(revision::session_id.eq(&session_id))
                .order_by(revision::seq.asc())
                .load(conn)?;
            revisions
                .into_iter()
                .map(|revision| {
                    let market_listings = revision_listings(conn, &revision.id)?;
                    Ok(RevisionView {
                        revision,
                        market_listings,
                    })
                })
                .collect::<DbResult<Vec<_>>>()
        })
        .await
    }

    /// Appends `new` if the session still points at `expected_offer_id`.
    /// An accepting revision materializes the order in the same transaction.
    pub async fn respond(
        &self,
        expected_offer_id: &str,
        new: OfferRevision,
        listings: Vec<OfferListing>,
    ) -> Result<(OfferSession, Option<(Order, bool)>), AppendError> {
        let expected_offer_id = expected_offer_id.to_string();
        do_with_transaction(self.pool, move |conn| {
            append_revision(conn, &expected_offer_id, &new, &listings)?;

            let updated: OfferSession = session::offer_sessions
                .filter(session::id.eq(&new.session_id))
                .first(conn)?;
            let order = match new.status {
                RevisionStatus::Accepted => {
                    Some(materialize(conn, &updated, &new, &listings, new.timestamp)?)
                }
                _ => None,
            };
            Ok((updated, order))
        })
        .await
    }

    /// Stores the merged session and closes every source, or changes nothing.
    pub async fn merge(
        &self,
        merged: OfferSession,
        first: OfferRevision,
        listings: Vec<OfferListing>,
        sources: Vec<MergeSource>,
    ) -> Result<OfferSession, AppendError> {
        do_with_transaction(self.pool, move |conn| {
            let merged = insert_session(conn, merged, &first, &listings)?;

            for source in &sources {
                append_revision(
                    conn,
                    &source.expected_offer_id,
                    &source.revision,
                    &source.listings,
                )?;
                diesel::update(session::offer_sessions.filter(session::id.eq(&source.session_id)))
                    .set(session::merged_into.eq(&merged.id))
                    .execute(conn)?;
            }

            let source_ids = sources
                .iter()
                .map(|source| source.session_id.clone())
                .collect::<Vec<_>>();
            let mut contracts: Vec<String> = contract_offer::public_contract_offers
                .filter(contract_offer::session_id.eq_any(&source_ids))
                .select(contract_offer::contract_id)
                .load(conn)?;
            contracts.sort();
            contracts.dedup();
            for contract_id in contracts {
                diesel::insert_or_ignore_into(contract_offer::public_contract_offers)
                    .values(&ContractOffer {
                        contract_id,
                        session_id: merged.id.clone(),
                    })
                    .execute(conn)?;
            }
            Ok(merged)
        })
        .await
    }

    pub async fn search(&self, filter: SessionFilter) -> DbResult<SessionPage> {
        readonly_transaction(self.pool, move |conn| {
            let total = filtered(&filter).count().get_result::<i64>(conn)?;
            let sessions = filtered(&filter)
                .order_by((session::updated_at.desc(), session::id.asc()))
                .offset(filter.offset)
                .limit(filter.limit)
                .load::<OfferSession>(conn)?;
            Ok(SessionPage { sessions, total })
        })
        .await
    }

    pub async fn contracts_of(&self, session_id: &str) -> DbResult<Vec<String>> {
        let session_id = session_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(contract_offer::public_contract_offers
                .filter(contract_offer::session_id.eq(&session_id))
                .select(contract_offer::contract_id)
                .load(conn)?)
        })
        .await
    }
}

fn filtered(filter: &SessionFilter) -> offer_sessions::BoxedQuery<'_, Sqlite> {
    let mut query = session::offer_sessions.into_boxed();
    if let Some(customer_id) = &filter.customer_id {
        query = query.filter(session::customer_id.eq(customer_id));
    }
    if let Some(assigned_id) = &filter.assigned_id {
        query = query.filter(session::assigned_id.eq(assigned_id));
    }
    if let Some(contractor_id) = &filter.contractor_id {
        query = query.filter(session::contractor_id.eq(contractor_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(session::status.eq(status));
    }
    if let Some(user_id) = &filter.participant {
        query = query.filter(
            session::customer_id
                .eq(user_id)
                .or(session::assigned_id.eq(user_id)),
        );
    }
    query
}

/// Inserts a session pointing at `first`, then `first` and its listing lines.
pub(crate) fn insert_session(
    conn: &ConnType,
    mut new: OfferSession,
    first: &OfferRevision,
    listings: &[OfferListing],
) -> QueryResult<OfferSession> {
    new.current_offer_id = Some(first.id.clone());
    new.status = first.status.session_status();
    new.updated_at = first.timestamp;

    diesel::insert_into(session::offer_sessions)
        .values(&new)
        .execute(conn)?;
    diesel::insert_into(revision::order_offers)
        .values(first)
        .execute(conn)?;
    diesel::insert_into(listing::offer_market_listings)
        .values(listings)
        .execute(conn)?;
    Ok(new)
}

/// Moves the session pointer from `expected_offer_id` to `new` (compare-and-swap), then stores `new`.
fn append_revision(
    conn: &ConnType,
    expected_offer_id: &str,
    new: &OfferRevision,
    listings: &[OfferListing],
) -> Result<(), AppendError> {
    let moved = diesel::update(
        session::offer_sessions
            .filter(session::id.eq(&new.session_id))
            .filter(session::status.eq(SessionStatus::Active))
            .filter(session::current_offer_id.eq(expected_offer_id)),
    )
    .set((
        session::current_offer_id.eq(&new.id),
        session::status.eq(new.status.session_status()),
        session::updated_at.eq(new.timestamp),
    ))
    .execute(conn)?;
    if moved == 0 {
        return Err(AppendError::Conflict(new.session_id.clone()));
    }

    diesel::insert_into(revision::order_offers)
        .values(new)
        .execute(conn)?;
    diesel::insert_into(listing::offer_market_listings)
        .values(listings)
        .execute(conn)?;
    Ok(())
}

fn revision_view(conn: &ConnType, offer_id: &str) -> DbResult<RevisionView> {
    let revision: OfferRevision = revision::order_offers
        .filter(revision::id.eq(offer_id))
        .first(conn)?;
    let market_listings = revision_listings(conn, offer_id)?;
    Ok(RevisionView {
        revision,
        market_listings,
    })
}

fn revision_listings(conn: &ConnType, offer_id: &str) -> QueryResult<Vec<ListingQuantity>> {
    Ok(listing::offer_market_listings
        .filter(listing::offer_id.eq(offer_id))
        .order_by(listing::listing_id.asc())
        .load::<OfferListing>(conn)?
        .into_iter()
        .map(|line| ListingQuantity {
            listing_id: line.listing_id,
            quantity: line.quantity,
        })
        .collect())
}

