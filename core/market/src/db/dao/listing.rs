use chrono::NaiveDateTime;
use diesel::prelude::*;

use scm_persistence::executor::{
    do_with_transaction, readonly_transaction, AsDao, ConnType, PoolType,
};
use scm_persistence::types::BigDecimalField;

use crate::db::dao::offer::insert_session;
use crate::db::model::{
    AuctionDetails, AuctionStatus, Bid, ListingQuantity, ListingStatus, MarketListing,
    OfferSession, OfferTerms, PaymentType, RevisionStatus, SaleType, SellerRef, Side,
    winning_bid,
};
use crate::db::schema::market_auction_details::dsl as auction;
use crate::db::schema::market_bids::dsl as bid;
use crate::db::schema::market_listings::dsl as listing;
use crate::db::DbResult;

/// Point in time at which a listing needs attention from the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deadline {
    pub listing_id: String,
    pub sale_type: SaleType,
    pub at: NaiveDateTime,
}

#[derive(Clone, Debug)]
pub enum AuctionOutcome {
    /// Listing or its auction details don't exist.
    Missing,
    /// Already concluded by an earlier run.
    AlreadyResolved,
    NotDue(NaiveDateTime),
    /// Concluded without a winner; the listing is archived.
    NoBids,
    Sold { session: OfferSession, winner: Bid },
}

pub struct ListingDao<'c> {
    pool: &'c PoolType,
}

impl<'c> AsDao<'c> for ListingDao<'c> {
    fn as_dao(pool: &'c PoolType) -> Self {
        Self { pool }
    }
}

impl<'c> ListingDao<'c> {
    pub async fn insert(
        &self,
        new: MarketListing,
        details: Option<AuctionDetails>,
    ) -> DbResult<MarketListing> {
        do_with_transaction(self.pool, move |conn| {
            diesel::insert_into(listing::market_listings)
                .values(&new)
                .execute(conn)?;
            if let Some(details) = details {
                diesel::insert_into(auction::market_auction_details)
                    .values(&details)
                    .execute(conn)?;
            }
            Ok(new)
        })
        .await
    }

    pub async fn place_bid(&self, new: Bid) -> DbResult<Bid> {
        do_with_transaction(self.pool, move |conn| {
            diesel::insert_into(bid::market_bids)
                .values(&new)
                .execute(conn)?;
            Ok(new)
        })
        .await
    }

    pub async fn get(&self, listing_id: &str) -> DbResult<Option<MarketListing>> {
        let listing_id = listing_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(listing::market_listings
                .filter(listing::listing_id.eq(&listing_id))
                .first(conn)
                .optional()?)
        })
        .await
    }

    /// Deadlines of every active auction and every active plain listing.
    pub async fn pending_deadlines(&self) -> DbResult<Vec<Deadline>> {
        readonly_transaction(self.pool, move |conn| {
            let auctions: Vec<(String, NaiveDateTime)> = listing::market_listings
                .inner_join(auction::market_auction_details)
                .filter(listing::status.eq(ListingStatus::Active))
                .filter(listing::sale_type.eq(SaleType::Auction))
                .filter(auction::status.eq(AuctionStatus::Active))
                .select((listing::listing_id, auction::end_time))
                .load(conn)?;
            let sales: Vec<(String, NaiveDateTime)> = listing::market_listings
                .filter(listing::status.eq(ListingStatus::Active))
                .filter(listing::sale_type.eq(SaleType::Sale))
                .select((listing::listing_id, listing::expiration))
                .load(conn)?;

            let deadlines = auctions
                .into_iter()
                .map(|(listing_id, at)| Deadline {
                    listing_id,
                    sale_type: SaleType::Auction,
                    at,
                })
                .chain(sales.into_iter().map(|(listing_id, at)| Deadline {
                    listing_id,
                    sale_type: SaleType::Sale,
                    at,
                }))
                .collect();
            Ok(deadlines)
        })
        .await
    }

    /// Concludes the auction: picks the winner, opens the offer to them and
    /// archives the listing. Safe to call again for an already resolved auction.
    pub async fn resolve_auction(
        &self,
        listing_id: &str,
        now: NaiveDateTime,
    ) -> DbResult<AuctionOutcome> {
        let listing_id = listing_id.to_string();
        do_with_transaction(self.pool, move |conn| {
            let found: Option<MarketListing> = listing::market_listings
                .filter(listing::listing_id.eq(&listing_id))
                .first(conn)
                .optional()?;
            let details: Option<AuctionDetails> = auction::market_auction_details
                .filter(auction::listing_id.eq(&listing_id))
                .first(conn)
                .optional()?;
            let (found, details) = match (found, details) {
                (Some(found), Some(details)) => (found, details),
                _ => return Ok(AuctionOutcome::Missing),
            };

            if found.status == ListingStatus::Archived || details.status == AuctionStatus::Concluded
            {
                return Ok(AuctionOutcome::AlreadyResolved);
            }
            if details.end_time > now {
                return Ok(AuctionOutcome::NotDue(details.end_time));
            }

            let seller = found.seller();
            let mut bids: Vec<Bid> = bid::market_bids
                .filter(bid::listing_id.eq(&listing_id))
                .load(conn)?;
            // A seller can't win their own auction.
            if let Some(SellerRef::Assigned(user_id)) = &seller {
                bids.retain(|placed| &placed.user_bidder_id != user_id);
            }
            let outcome = match (winning_bid(&bids), seller) {
                (None, _) => AuctionOutcome::NoBids,
                (Some(winner), Some(seller)) => AuctionOutcome::Sold {
                    session: open_winning_offer(conn, &found, &seller, winner, now)?,
                    winner: winner.clone(),
                },
                (Some(_), None) => {
                    log::warn!("Auction [{}] has no seller, archiving.", listing_id);
                    AuctionOutcome::NoBids
                }
            };

            conclude(conn, &listing_id)?;
            Ok(outcome)
        })
        .await
    }

    /// Moves an active listing past its expiration to `inactive`.
    pub async fn expire_listing(&self, listing_id: &str, now: NaiveDateTime) -> DbResult<bool> {
        let listing_id = listing_id.to_string();
        do_with_transaction(self.pool, move |conn| {
            let found: Option<MarketListing> = listing::market_listings
                .filter(listing::listing_id.eq(&listing_id))
                .first(conn)
                .optional()?;
            match found {
                Some(found) if found.status == ListingStatus::Active && found.expiration <= now => {
                    let updated = diesel::update(
                        listing::market_listings
                            .filter(listing::listing_id.eq(&listing_id))
                            .filter(listing::status.eq(ListingStatus::Active)),
                    )
                    .set(listing::status.eq(ListingStatus::Inactive))
                    .execute(conn)?;
                    Ok(updated > 0)
                }
                _ => Ok(false),
            }
        })
        .await
    }
}

fn open_winning_offer(
    conn: &ConnType,
    found: &MarketListing,
    seller: &SellerRef,
    winner: &Bid,
    now: NaiveDateTime,
) -> QueryResult<OfferSession> {
    let market_listings = match found.quantity_available {
        quantity if quantity > 0 => vec![ListingQuantity {
            listing_id: found.listing_id.clone(),
            quantity,
        }],
        _ => vec![],
    };
    let terms = OfferTerms {
        title: format!("Auction: {}", found.title),
        description: format!("Winning bid on auction listing {}.", found.listing_id),
        kind: "Auction".to_string(),
        cost: winner.bid.clone(),
        collateral: BigDecimalField::default(),
        payment_type: PaymentType::OneTime,
        departure: None,
        destination: None,
        service_id: None,
        market_listings,
    };

    let session = OfferSession::new(winner.user_bidder_id.clone(), seller, now);
    // Contractor sales are issued by the market, not by any member.
    let actor_id = match seller {
        SellerRef::Assigned(user_id) => Some(user_id.as_str()),
        SellerRef::Contractor(_) => None,
    };
    let (first, lines) = terms.into_revision(
        &session.id,
        1,
        actor_id,
        Side::Seller,
        RevisionStatus::Pending,
        now,
    );
    insert_session(conn, session, &first, &lines)
}

fn conclude(conn: &ConnType, listing_id: &str) -> QueryResult<()> {
    diesel::update(auction::market_auction_details.filter(auction::listing_id.eq(listing_id)))
        .set(auction::status.eq(AuctionStatus::Concluded))
        .execute(conn)?;
    diesel::update(listing::market_listings.filter(listing::listing_id.eq(listing_id)))
        .set(listing::status.eq(ListingStatus::Archived))
        .execute(conn)?;
    Ok(())
}
