use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::db::dao::{
    ContractDao, ContractorDao, MergeSource, OfferDao, OrderDao, SessionFilter,
};
use crate::db::model::{
    ContractStatus, OfferSession, OfferTerms, Order, Permission, RevisionStatus, RevisionView,
    SellerRef, SessionStatus, Side,
};
use crate::db::DbExecutor;
use crate::identity::Actor;
use crate::permissions::PermissionEvaluator;
use crate::utils::KeyedLock;

use super::error::OfferError;
use super::merge::{check_compatible, compose};
use super::notifier::{EventNotifier, MarketEventKind};

#[derive(Clone, Debug, Deserialize)]
pub struct NewOffer {
    pub customer_id: String,
    #[serde(default)]
    pub assigned_id: Option<String>,
    #[serde(default)]
    pub contractor_id: Option<String>,
    pub terms: OfferTerms,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Counteroffered,
    Accepted,
    Rejected,
    Cancelled,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RespondRequest {
    pub status: ResponseStatus,
    #[serde(default)]
    pub terms: Option<OfferTerms>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MergeRequest {
    pub session_ids: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContractOfferRequest {
    /// Offer on behalf of this contractor instead of the acting user.
    #[serde(default)]
    pub contractor_id: Option<String>,
    /// Counter terms. The contract's own terms are offered when absent.
    #[serde(default)]
    pub terms: Option<OfferTerms>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub customer_id: Option<String>,
    pub assigned_id: Option<String>,
    pub contractor_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub index: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResult {
    pub items: Vec<OfferSession>,
    pub total: i64,
    pub index: i64,
    pub page_size: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionDetails {
    #[serde(flatten)]
    pub session: OfferSession,
    pub revisions: Vec<RevisionView>,
    pub order: Option<Order>,
    /// Public contracts this session answers.
    pub contract_ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Responded {
    pub session: OfferSession,
    pub revision: RevisionView,
    pub order: Option<Order>,
}

/// Offer session state machine.
///
/// Every mutation of one session runs under that session's lock and moves the
/// session pointer with a compare-and-swap, so two concurrent responses can't
/// both be appended.
#[derive(Clone)]
pub struct OfferBroker {
    db: DbExecutor,
    permissions: PermissionEvaluator,
    notifier: EventNotifier,
    session_locks: KeyedLock,
    config: Arc<Config>,
}

impl OfferBroker {
    pub fn new(
        db: DbExecutor,
        permissions: PermissionEvaluator,
        notifier: EventNotifier,
        config: Arc<Config>,
    ) -> OfferBroker {
        // Initialize counters to 0 value. Otherwise they won't appear on metrics endpoint
        // until first change to value will be made.
        counter!("market.offers.opened", 0);
        counter!("market.offers.countered", 0);
        counter!("market.offers.accepted", 0);
        counter!("market.offers.rejected", 0);
        counter!("market.offers.cancelled", 0);
        counter!("market.offers.merged", 0);
        counter!("market.orders.materialized", 0);

        OfferBroker {
            db,
            permissions,
            notifier,
            session_locks: KeyedLock::new(),
            config,
        }
    }

    pub fn notifier(&self) -> &EventNotifier {
        &self.notifier
    }

    /// Opens a negotiation. The acting user must be the customer or act for the seller.
    pub async fn open(&self, actor: &Actor, offer: NewOffer) -> Result<OfferSession, OfferError> {
        let seller = SellerRef::from_fields(offer.assigned_id, offer.contractor_id)
            .ok_or_else(|| {
                OfferError::validation(
                    "assigned_id",
                    "exactly one of assigned_id and contractor_id must be set",
                )
            })?;
        validate_terms(&offer.terms)?;
        if seller.assigned_id().as_deref() == Some(offer.customer_id.as_str()) {
            return Err(OfferError::validation(
                "assigned_id",
                "customer can't negotiate with themselves",
            ));
        }
        if let SellerRef::Contractor(contractor_id) = &seller {
            self.ensure_contractor(contractor_id).await?;
        }

        let now = Utc::now().naive_utc();
        let session = OfferSession::new(offer.customer_id, &seller, now);
        let relation = self.permissions.relation(&session, actor).await?;
        let side = if relation.customer {
            Side::Customer
        } else if relation.seller {
            Side::Seller
        } else {
            return Err(OfferError::Permission(format!(
                "User [{}] can't open offers between these parties.",
                actor.user_id
            )));
        };

        self.store_new(actor, session, side, offer.terms, None).await
    }

    /// Opens a negotiation with the customer of a public contract.
    pub async fn offer_on_contract(
        &self,
        actor: &Actor,
        contract_id: &str,
        request: ContractOfferRequest,
    ) -> Result<OfferSession, OfferError> {
        let contract = self
            .db
            .as_dao::<ContractDao>()
            .get(contract_id)
            .await?
            .ok_or_else(|| OfferError::NotFound {
                entity: "Public contract",
                id: contract_id.to_string(),
            })?;
        if contract.status != ContractStatus::Active {
            return Err(OfferError::NotActive {
                entity: "Public contract",
                id: contract_id.to_string(),
            });
        }

        let seller = match request.contractor_id {
            Some(contractor_id) => {
                self.ensure_contractor(&contractor_id).await?;
                if !self
                    .permissions
                    .has_permission(&contractor_id, &actor.user_id, Permission::ManageOrders)
                    .await?
                {
                    return Err(OfferError::Permission(format!(
                        "User [{}] can't manage orders of Contractor [{}].",
                        actor.user_id, contractor_id
                    )));
                }
                SellerRef::Contractor(contractor_id)
            }
            None if actor.user_id == contract.customer_id => {
                return Err(OfferError::validation(
                    "assigned_id",
                    "customer can't negotiate with themselves",
                ))
            }
            None => SellerRef::Assigned(actor.user_id.clone()),
        };

        let terms = request.terms.unwrap_or_else(|| contract.terms());
        validate_terms(&terms)?;

        let session = OfferSession::new(
            contract.customer_id.clone(),
            &seller,
            Utc::now().naive_utc(),
        );
        self.store_new(actor, session, Side::Seller, terms, Some(contract.id))
            .await
    }

    async fn store_new(
        &self,
        actor: &Actor,
        session: OfferSession,
        side: Side,
        terms: OfferTerms,
        contract_id: Option<String>,
    ) -> Result<OfferSession, OfferError> {
        let (first, listings) = terms.into_revision(
            &session.id,
            1,
            Some(actor.user_id.as_str()),
            side,
            RevisionStatus::Pending,
            session.created_at,
        );
        let session = self
            .db
            .as_dao::<OfferDao>()
            .create(session, first, listings, contract_id)
            .await?;

        counter!("market.offers.opened", 1);
        log::info!(
            "User [{}] opened offer session [{}] as {}.",
            actor.user_id,
            session.id,
            side
        );
        self.notifier
            .emit(MarketEventKind::OfferCreated, &session.id, Some(&actor.user_id));
        Ok(session)
    }

    /// Appends a revision answering the current one.
    ///
    /// Relation is checked first, then state, then turn, then the body.
    /// Cancellation is allowed regardless of whose turn it is.
    pub async fn respond(
        &self,
        actor: &Actor,
        session_id: &str,
        request: RespondRequest,
    ) -> Result<Responded, OfferError> {
        let _guard = self.session_locks.lock(session_id).await;

        let dao = self.db.as_dao::<OfferDao>();
        let session = dao
            .get(session_id)
            .await?
            .ok_or_else(|| OfferError::session_not_found(session_id))?;

        let relation = self.permissions.relation(&session, actor).await?;
        if !relation.any() {
            return Err(OfferError::Permission(format!(
                "User [{}] is not a party of offer session [{}].",
                actor.user_id, session_id
            )));
        }
        if session.status.is_terminal() {
            return Err(OfferError::session_not_active(session_id));
        }

        let current = dao
            .current_revision(session_id)
            .await?
            .ok_or_else(|| OfferError::session_not_found(session_id))?;
        let turn = current.revision.actor_side.opposite();
        let side = match request.status {
            ResponseStatus::Cancelled if relation.holds(turn) => turn,
            ResponseStatus::Cancelled => turn.opposite(),
            _ if relation.holds(turn) => turn,
            _ => {
                return Err(OfferError::Permission(format!(
                    "It is not the turn of User [{}] in offer session [{}].",
                    actor.user_id, session_id
                )))
            }
        };

        let (terms, status) = match (request.status, request.terms) {
            (ResponseStatus::Counteroffered, Some(terms)) => {
                validate_terms(&terms)?;
                (terms, RevisionStatus::Pending)
            }
            (ResponseStatus::Counteroffered, None) => {
                return Err(OfferError::validation(
                    "terms",
                    "a counteroffer must carry new terms",
                ))
            }
            (_, Some(_)) => {
                return Err(OfferError::validation(
                    "terms",
                    "terms are accepted only with a counteroffer",
                ))
            }
            (ResponseStatus::Accepted, None) => (
                current.revision.terms(current.market_listings.clone()),
                RevisionStatus::Accepted,
            ),
            (ResponseStatus::Rejected, None) => (
                current.revision.terms(current.market_listings.clone()),
                RevisionStatus::Rejected,
            ),
            (ResponseStatus::Cancelled, None) => (
                current.revision.terms(current.market_listings.clone()),
                RevisionStatus::Cancelled,
            ),
        };

        let market_listings = terms.market_listings.clone();
        let (revision, listings) = terms.into_revision(
            session_id,
            current.revision.seq + 1,
            Some(actor.user_id.as_str()),
            side,
            status,
            Utc::now().naive_utc(),
        );
        let stored = revision.clone();
        let (session, order) = dao
            .respond(&current.revision.id, revision, listings)
            .await?;

        if session.status.is_terminal() {
            self.session_locks.clear_locks(session_id).await;
        }

        let event = match status {
            RevisionStatus::Pending => MarketEventKind::OfferCountered,
            RevisionStatus::Accepted => MarketEventKind::OfferAccepted,
            RevisionStatus::Rejected => MarketEventKind::OfferRejected,
            RevisionStatus::Cancelled => MarketEventKind::OfferCancelled,
        };
        match status {
            RevisionStatus::Pending => counter!("market.offers.countered", 1),
            RevisionStatus::Accepted => counter!("market.offers.accepted", 1),
            RevisionStatus::Rejected => counter!("market.offers.rejected", 1),
            RevisionStatus::Cancelled => counter!("market.offers.cancelled", 1),
        }
        log::info!(
            "User [{}] {} offer session [{}] with revision [{}].",
            actor.user_id,
            past_tense(status),
            session_id,
            stored.id
        );
        self.notifier.emit(event, session_id, Some(&actor.user_id));

        let order = match order {
            Some((order, created)) => {
                if created {
                    counter!("market.orders.materialized", 1);
                    log::info!(
                        "Materialized Order [{}] from offer session [{}].",
                        order.order_id,
                        session_id
                    );
                    self.notifier.emit(
                        MarketEventKind::OrderCreated,
                        &order.order_id,
                        Some(actor.user_id.as_str()),
                    );
                }
                Some(order)
            }
            None => None,
        };

        Ok(Responded {
            session,
            revision: RevisionView {
                revision: stored,
                market_listings,
            },
            order,
        })
    }

    /// Consolidates active sessions with the same parties into one new session.
    ///
    /// Every source is checked before anything is written; the merged session is
    /// stored and all sources are closed in one transaction.
    pub async fn merge(
        &self,
        actor: &Actor,
        session_ids: Vec<String>,
    ) -> Result<SessionDetails, OfferError> {
        if session_ids.len() < 2 {
            return Err(OfferError::validation(
                "session_ids",
                "at least two sessions are required",
            ));
        }
        let max = self.config.offers.merge_max_sessions;
        if session_ids.len() > max {
            return Err(OfferError::validation(
                "session_ids",
                format!("at most {} sessions can be merged at once", max),
            ));
        }
        let mut unique = HashSet::new();
        if !session_ids.iter().all(|id| unique.insert(id.as_str())) {
            return Err(OfferError::validation("session_ids", "duplicate session id"));
        }

        let _guards = self.session_locks.lock_all(&session_ids).await;

        let dao = self.db.as_dao::<OfferDao>();
        let mut stored = dao.get_many(session_ids.clone()).await?;
        let mut sessions = Vec::with_capacity(session_ids.len());
        for id in &session_ids {
            let position = stored
                .iter()
                .position(|session| &session.id == id)
                .ok_or_else(|| OfferError::session_not_found(id))?;
            sessions.push(stored.swap_remove(position));
        }
        if let Some(inactive) = sessions.iter().find(|session| session.status.is_terminal()) {
            return Err(OfferError::session_not_active(&inactive.id));
        }

        for session in &sessions {
            let relation = self.permissions.relation(session, actor).await?;
            if relation.customer {
                return Err(OfferError::Permission(format!(
                    "Customer can't merge offers. User [{}] is the customer of offer session [{}].",
                    actor.user_id, session.id
                )));
            }
            if !relation.seller {
                return Err(OfferError::Permission(format!(
                    "User [{}] can't act for the seller of offer session [{}].",
                    actor.user_id, session.id
                )));
            }
        }

        let mut candidates = Vec::with_capacity(sessions.len());
        for session in sessions {
            let current = dao
                .current_revision(&session.id)
                .await?
                .ok_or_else(|| OfferError::session_not_found(&session.id))?;
            candidates.push((session, current));
        }
        check_compatible(&candidates).map_err(OfferError::Mismatch)?;

        let (first_session, _) = &candidates[0];
        let seller = first_session
            .seller()
            .ok_or_else(|| OfferError::validation("session_ids", "session without a seller"))?;
        let now = Utc::now().naive_utc();

        let terms = compose(&candidates.iter().map(|(_, current)| current).collect::<Vec<_>>());
        let merged = OfferSession::new(first_session.customer_id.clone(), &seller, now);
        let market_listings = terms.market_listings.clone();
        let (first, listings) = terms.into_revision(
            &merged.id,
            1,
            Some(actor.user_id.as_str()),
            Side::Seller,
            RevisionStatus::Pending,
            now,
        );
        let first_view = RevisionView {
            revision: first.clone(),
            market_listings,
        };

        let sources = candidates
            .iter()
            .map(|(session, current)| {
                let (revision, listings) = current
                    .revision
                    .terms(current.market_listings.clone())
                    .into_revision(
                        &session.id,
                        current.revision.seq + 1,
                        Some(actor.user_id.as_str()),
                        Side::Seller,
                        RevisionStatus::Cancelled,
                        now,
                    );
                MergeSource {
                    session_id: session.id.clone(),
                    expected_offer_id: current.revision.id.clone(),
                    revision,
                    listings,
                }
            })
            .collect::<Vec<_>>();

        let merged = dao.merge(merged, first, listings, sources).await?;

        counter!("market.offers.merged", 1);
        log::info!(
            "User [{}] merged offer sessions {:?} into [{}].",
            actor.user_id,
            session_ids,
            merged.id
        );
        self.notifier
            .emit(MarketEventKind::OffersMerged, &merged.id, Some(&actor.user_id));
        for id in &session_ids {
            self.session_locks.clear_locks(id).await;
            self.notifier.emit_merged(id, &merged.id, &actor.user_id);
        }

        Ok(SessionDetails {
            session: merged,
            revisions: vec![first_view],
            order: None,
            contract_ids: vec![],
        })
    }

    /// Session with its whole history. Visible to related parties and admins.
    pub async fn get_session(
        &self,
        actor: &Actor,
        session_id: &str,
    ) -> Result<SessionDetails, OfferError> {
        let dao = self.db.as_dao::<OfferDao>();
        let session = dao
            .get(session_id)
            .await?
            .ok_or_else(|| OfferError::session_not_found(session_id))?;
        if !self.permissions.may_view(&session, actor).await? {
            return Err(OfferError::Permission(format!(
                "User [{}] can't view offer session [{}].",
                actor.user_id, session_id
            )));
        }

        let revisions = dao.revisions(session_id).await?;
        let order = self.db.as_dao::<OrderDao>().by_session(session_id).await?;
        let contract_ids = dao.contracts_of(session_id).await?;
        Ok(SessionDetails {
            session,
            revisions,
            order,
            contract_ids,
        })
    }

    /// Newest activity first. Non-admins only see sessions they take part in.
    pub async fn search(
        &self,
        actor: &Actor,
        query: SearchQuery,
    ) -> Result<SearchResult, OfferError> {
        let limits = &self.config.offers;
        let page_size = query.page_size.unwrap_or(limits.page_size_default);
        if page_size < 1 || page_size > limits.page_size_max {
            return Err(OfferError::validation(
                "page_size",
                format!("must be between 1 and {}", limits.page_size_max),
            ));
        }
        let index = query.index.unwrap_or(0);
        if index < 0 {
            return Err(OfferError::validation("index", "must not be negative"));
        }
        let offset = index
            .checked_mul(page_size)
            .ok_or_else(|| OfferError::validation("index", "is out of range"))?;

        let mut filter = SessionFilter {
            customer_id: query.customer_id,
            assigned_id: query.assigned_id,
            contractor_id: query.contractor_id,
            status: query.status,
            participant: None,
            offset,
            limit: page_size,
        };

        if !actor.is_admin() {
            let own = |user_filter: &Option<String>| {
                user_filter.as_ref().map_or(true, |id| id == &actor.user_id)
            };
            if !own(&filter.customer_id) || !own(&filter.assigned_id) {
                return Err(OfferError::Permission(format!(
                    "User [{}] can only search their own offers.",
                    actor.user_id
                )));
            }
            if let Some(contractor_id) = &filter.contractor_id {
                if !self
                    .permissions
                    .has_permission(contractor_id, &actor.user_id, Permission::ManageOrders)
                    .await?
                {
                    return Err(OfferError::Permission(format!(
                        "User [{}] can't manage orders of Contractor [{}].",
                        actor.user_id, contractor_id
                    )));
                }
            }
            if filter.customer_id.is_none()
                && filter.assigned_id.is_none()
                && filter.contractor_id.is_none()
            {
                filter.participant = Some(actor.user_id.clone());
            }
        }

        let page = self.db.as_dao::<OfferDao>().search(filter).await?;
        Ok(SearchResult {
            items: page.sessions,
            total: page.total,
            index,
            page_size,
        })
    }

    async fn ensure_contractor(&self, contractor_id: &str) -> Result<(), OfferError> {
        match self.db.as_dao::<ContractorDao>().get(contractor_id).await? {
            Some(_) => Ok(()),
            None => Err(OfferError::NotFound {
                entity: "Contractor",
                id: contractor_id.to_string(),
            }),
        }
    }
}

fn validate_terms(terms: &OfferTerms) -> Result<(), OfferError> {
    match terms.invalid_field() {
        Some(field) => Err(OfferError::validation(field, "missing or out of range")),
        None => Ok(()),
    }
}

fn past_tense(status: RevisionStatus) -> &'static str {
    match status {
        RevisionStatus::Pending => "countered",
        RevisionStatus::Accepted => "accepted",
        RevisionStatus::Rejected => "rejected",
        RevisionStatus::Cancelled => "cancelled",
    }
}
