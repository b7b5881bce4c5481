use chrono::{Duration, NaiveDateTime, Utc};
use std::time::Duration as StdDuration;

use scm_market::negotiation::MarketEventKind;
use scm_market::testing::{
    decimal, AuctionOutcome, AuctionStatus, ListingDao, ListingStatus, MarketFixture, OfferDao,
    SaleType, SellerRef, SessionStatus, Side,
};

fn past() -> NaiveDateTime {
    (Utc::now() - Duration::minutes(5)).naive_utc()
}

fn future() -> NaiveDateTime {
    (Utc::now() + Duration::days(1)).naive_utc()
}

fn bob() -> SellerRef {
    SellerRef::Assigned("bob".to_string())
}

#[actix_rt::test]
async fn test_highest_bid_wins() {
    let _ = env_logger::builder().try_init();
    let fixture = MarketFixture::new("test_highest_bid_wins");
    fixture.user("bob").await;
    let first = fixture.user("first").await;
    let second = fixture.user("second").await;
    let third = fixture.user("third").await;
    let mut events = fixture.market.notifier.subscribe();

    let listing = fixture.listing(&bob(), SaleType::Auction, past()).await;
    fixture.bid(&listing.listing_id, &first, "10").await;
    fixture.bid(&listing.listing_id, &second, "25").await;
    fixture.bid(&listing.listing_id, &third, "17").await;

    let scheduler = &fixture.market.scheduler;
    let (session, winner) = match scheduler.resolve(&listing.listing_id).await.unwrap() {
        AuctionOutcome::Sold { session, winner } => (session, winner),
        other => panic!("expected a sale, got {:?}", other),
    };
    assert_eq!(winner.user_bidder_id, "second");
    assert_eq!(winner.bid, decimal("25"));
    assert_eq!(session.customer_id, "second");
    assert_eq!(session.assigned_id.as_deref(), Some("bob"));
    assert_eq!(session.status, SessionStatus::Active);

    let current = fixture
        .db
        .as_dao::<OfferDao>()
        .current_revision(&session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.revision.cost, decimal("25"));
    assert_eq!(current.revision.actor_side, Side::Seller);
    assert_eq!(current.market_listings.len(), 1);
    assert_eq!(current.market_listings[0].quantity, 3);

    let listings = fixture.db.as_dao::<ListingDao>();
    let stored = listings.get(&listing.listing_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ListingStatus::Archived);
    assert_eq!(
        fixture.auction_status(&listing.listing_id),
        AuctionStatus::Concluded
    );

    assert_eq!(
        events.recv().await.unwrap().kind,
        MarketEventKind::AuctionResolved
    );
    let created = events.recv().await.unwrap();
    assert_eq!(created.kind, MarketEventKind::OfferCreated);
    assert_eq!(created.entity_id, session.id);

    // A second run (another instance, a late timer) changes nothing.
    assert!(matches!(
        scheduler.resolve(&listing.listing_id).await.unwrap(),
        AuctionOutcome::AlreadyResolved
    ));
    let page = fixture
        .market
        .offers
        .search(&second, Default::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[actix_rt::test]
async fn test_auction_without_bids_is_archived() {
    let fixture = MarketFixture::new("test_auction_without_bids_is_archived");
    fixture.user("bob").await;
    let listing = fixture.listing(&bob(), SaleType::Auction, past()).await;

    let scheduler = &fixture.market.scheduler;
    assert!(matches!(
        scheduler.resolve(&listing.listing_id).await.unwrap(),
        AuctionOutcome::NoBids
    ));
    let stored = fixture
        .db
        .as_dao::<ListingDao>()
        .get(&listing.listing_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ListingStatus::Archived);
    assert!(matches!(
        scheduler.resolve(&listing.listing_id).await.unwrap(),
        AuctionOutcome::AlreadyResolved
    ));
}

#[actix_rt::test]
async fn test_auction_not_due_is_left_alone() {
    let fixture = MarketFixture::new("test_auction_not_due_is_left_alone");
    fixture.user("bob").await;
    let bidder = fixture.user("bidder").await;
    let listing = fixture.listing(&bob(), SaleType::Auction, future()).await;
    fixture.bid(&listing.listing_id, &bidder, "50").await;

    let scheduler = &fixture.market.scheduler;
    assert!(matches!(
        scheduler.resolve(&listing.listing_id).await.unwrap(),
        AuctionOutcome::NotDue(_)
    ));
    assert!(matches!(
        scheduler.resolve("no-such-listing").await.unwrap(),
        AuctionOutcome::Missing
    ));
    let stored = fixture
        .db
        .as_dao::<ListingDao>()
        .get(&listing.listing_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ListingStatus::Active);
}

#[actix_rt::test]
async fn test_expire_listing() {
    let fixture = MarketFixture::new("test_expire_listing");
    fixture.user("bob").await;
    let expired = fixture.listing(&bob(), SaleType::Sale, past()).await;
    let fresh = fixture.listing(&bob(), SaleType::Sale, future()).await;

    let scheduler = &fixture.market.scheduler;
    assert!(scheduler.expire(&expired.listing_id).await.unwrap());
    assert!(!scheduler.expire(&expired.listing_id).await.unwrap());
    assert!(!scheduler.expire(&fresh.listing_id).await.unwrap());

    let listings = fixture.db.as_dao::<ListingDao>();
    let stored = listings.get(&expired.listing_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ListingStatus::Inactive);
    let stored = listings.get(&fresh.listing_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ListingStatus::Active);
}

#[actix_rt::test]
async fn test_poll_schedules_every_deadline_once() {
    let _ = env_logger::builder().try_init();
    let fixture = MarketFixture::new("test_poll_schedules_every_deadline_once");
    fixture.user("bob").await;
    let due = fixture.listing(&bob(), SaleType::Sale, past()).await;
    let pending = fixture.listing(&bob(), SaleType::Auction, future()).await;

    let scheduler = &fixture.market.scheduler;
    assert_eq!(scheduler.poll_once().await.unwrap(), 2);
    assert_eq!(scheduler.poll_once().await.unwrap(), 0);

    let listings = fixture.db.as_dao::<ListingDao>();
    let mut status = ListingStatus::Active;
    for _ in 0..100 {
        status = listings.get(&due.listing_id).await.unwrap().unwrap().status;
        if status != ListingStatus::Active && scheduler.pending_timers() == 1 {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    assert_eq!(status, ListingStatus::Inactive);
    assert_eq!(scheduler.pending_timers(), 1);
    assert_eq!(scheduler.poll_once().await.unwrap(), 0);
    let stored = listings.get(&pending.listing_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ListingStatus::Active);

    scheduler.shutdown();
    assert_eq!(scheduler.pending_timers(), 0);
}

#[actix_rt::test]
async fn test_seller_bids_never_win() {
    let fixture = MarketFixture::new("test_seller_bids_never_win");
    let seller = fixture.user("bob").await;
    let bidder = fixture.user("bidder").await;
    let scheduler = &fixture.market.scheduler;

    let listing = fixture.listing(&bob(), SaleType::Auction, past()).await;
    fixture.bid(&listing.listing_id, &seller, "500").await;
    fixture.bid(&listing.listing_id, &bidder, "40").await;
    let (session, winner) = match scheduler.resolve(&listing.listing_id).await.unwrap() {
        AuctionOutcome::Sold { session, winner } => (session, winner),
        other => panic!("expected a sale, got {:?}", other),
    };
    assert_eq!(winner.user_bidder_id, "bidder");
    assert_eq!(session.customer_id, "bidder");

    let own_only = fixture.listing(&bob(), SaleType::Auction, past()).await;
    fixture.bid(&own_only.listing_id, &seller, "500").await;
    assert!(matches!(
        scheduler.resolve(&own_only.listing_id).await.unwrap(),
        AuctionOutcome::NoBids
    ));
}

#[actix_rt::test]
async fn test_contractor_auction_has_no_user_actor() {
    let fixture = MarketFixture::new("test_contractor_auction_has_no_user_actor");
    let owner = fixture.user("owner").await;
    let bidder = fixture.user("bidder").await;
    let org = fixture.contractor(&owner, "ORG").await;

    let seller = SellerRef::Contractor(org.contractor_id.clone());
    let listing = fixture.listing(&seller, SaleType::Auction, past()).await;
    fixture.bid(&listing.listing_id, &bidder, "75").await;

    let session = match fixture
        .market
        .scheduler
        .resolve(&listing.listing_id)
        .await
        .unwrap()
    {
        AuctionOutcome::Sold { session, .. } => session,
        other => panic!("expected a sale, got {:?}", other),
    };
    assert_eq!(
        session.contractor_id.as_deref(),
        Some(org.contractor_id.as_str())
    );
    assert_eq!(session.assigned_id, None);

    let current = fixture
        .db
        .as_dao::<OfferDao>()
        .current_revision(&session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.revision.actor_id, None);
    assert_eq!(current.revision.actor_side, Side::Seller);
}
