//! In-process timers resolving auctions and expiring listings at their deadline.
//!
//! Timers live only in this process. The periodic poll re-scans every unresolved
//! listing, so deadlines missed by a crash or restart are caught on the next tick.

use chrono::Utc;
use metrics::counter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::SchedulerConfig;
use crate::db::dao::{AuctionOutcome, Deadline, ListingDao};
use crate::db::model::SaleType;
use crate::db::{DbError, DbExecutor};
use crate::negotiation::{EventNotifier, MarketEventKind};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Listing store error: {0}.")]
    Db(#[from] DbError),
}

#[derive(Clone)]
pub struct AuctionScheduler {
    db: DbExecutor,
    notifier: EventNotifier,
    config: SchedulerConfig,
    timers: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    poller: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AuctionScheduler {
    pub fn new(db: DbExecutor, notifier: EventNotifier, config: SchedulerConfig) -> Self {
        counter!("market.auctions.resolved", 0);
        counter!("market.listings.expired", 0);

        AuctionScheduler {
            db,
            notifier,
            config,
            timers: Arc::new(Mutex::new(HashMap::new())),
            poller: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawns the poll loop. The first scan runs immediately.
    pub fn start(&self) {
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(scheduler.config.poll_interval);
            loop {
                interval.tick().await;
                log::debug!("Auction scheduler scan started");
                if let Err(e) = scheduler.poll_once().await {
                    log::error!("Auction scheduler scan failed: {}", e);
                }
            }
        });
        if let Some(previous) = self.poller.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Aborts the poll loop and every pending timer.
    pub fn shutdown(&self) {
        if let Some(poller) = self.poller.lock().take() {
            poller.abort();
        }
        for (_, timer) in self.timers.lock().drain() {
            timer.abort();
        }
        log::debug!("Auction scheduler stopped");
    }

    /// Schedules a timer for every deadline without a live timer. Returns how many were added.
    pub async fn poll_once(&self) -> Result<usize, SchedulerError> {
        let deadlines = self.db.as_dao::<ListingDao>().pending_deadlines().await?;

        let mut timers = self.timers.lock();
        timers.retain(|_, timer| !timer.is_finished());

        let mut scheduled = 0;
        for deadline in deadlines {
            if timers.contains_key(&deadline.listing_id) {
                continue;
            }
            let listing_id = deadline.listing_id.clone();
            timers.insert(listing_id, self.schedule(deadline));
            scheduled += 1;
        }
        Ok(scheduled)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers
            .lock()
            .values()
            .filter(|timer| !timer.is_finished())
            .count()
    }

    fn schedule(&self, deadline: Deadline) -> JoinHandle<()> {
        let delay = (deadline.at - Utc::now().naive_utc())
            .to_std()
            .unwrap_or(Duration::ZERO);
        log::trace!(
            "Listing [{}] deadline in {}.",
            deadline.listing_id,
            humantime::format_duration(delay)
        );

        let scheduler = self.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            scheduler.fire(deadline).await;
        })
    }

    /// Errors never leave a timer. The next poll picks the listing up again.
    async fn fire(&self, deadline: Deadline) {
        let result = match deadline.sale_type {
            SaleType::Auction => self.resolve(&deadline.listing_id).await.map(|_| ()),
            SaleType::Sale => self.expire(&deadline.listing_id).await.map(|_| ()),
        };
        if let Err(e) = result {
            log::error!(
                "Failed to process deadline of listing [{}]: {}",
                deadline.listing_id,
                e
            );
        }
    }

    /// Concludes the auction if it is due. Idempotent.
    pub async fn resolve(&self, listing_id: &str) -> Result<AuctionOutcome, SchedulerError> {
        let outcome = self
            .db
            .as_dao::<ListingDao>()
            .resolve_auction(listing_id, Utc::now().naive_utc())
            .await?;

        match &outcome {
            AuctionOutcome::Sold { session, winner } => {
                counter!("market.auctions.resolved", 1);
                log::info!(
                    "Auction [{}] won by [{}] for {}. Opened offer session [{}].",
                    listing_id,
                    winner.user_bidder_id,
                    winner.bid,
                    session.id
                );
                self.notifier
                    .emit(MarketEventKind::AuctionResolved, listing_id, None);
                self.notifier
                    .emit(MarketEventKind::OfferCreated, &session.id, None);
            }
            AuctionOutcome::NoBids => {
                counter!("market.auctions.resolved", 1);
                log::info!("Auction [{}] ended without bids.", listing_id);
                self.notifier
                    .emit(MarketEventKind::AuctionResolved, listing_id, None);
            }
            AuctionOutcome::AlreadyResolved => {
                log::debug!("Auction [{}] already resolved.", listing_id)
            }
            AuctionOutcome::NotDue(at) => {
                log::debug!("Auction [{}] not due until {}.", listing_id, at)
            }
            AuctionOutcome::Missing => log::warn!("Auction [{}] not found.", listing_id),
        }
        Ok(outcome)
    }

    /// Deactivates the listing if it is past its expiration.
    pub async fn expire(&self, listing_id: &str) -> Result<bool, SchedulerError> {
        let expired = self
            .db
            .as_dao::<ListingDao>()
            .expire_listing(listing_id, Utc::now().naive_utc())
            .await?;
        if expired {
            counter!("market.listings.expired", 1);
            log::info!("Listing [{}] expired.", listing_id);
            self.notifier
                .emit(MarketEventKind::ListingExpired, listing_id, None);
        }
        Ok(expired)
    }
}
