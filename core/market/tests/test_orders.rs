use scm_market::negotiation::{NewOffer, RespondRequest, ResponseStatus};
use scm_market::orders::OrderError;
use scm_market::testing::{
    sample_terms, Actor, ListingQuantity, MarketFixture, Order, OrderDao, OrderStatus,
    PaymentType, SaleType,
};

use chrono::{Duration, Utc};

/// Negotiates `alice` <-> `bob` to an accepted offer and returns the order.
async fn accepted_order(fixture: &MarketFixture, alice: &Actor, bob: &Actor) -> Order {
    let offers = &fixture.market.offers;
    let session = offers
        .open(
            alice,
            NewOffer {
                customer_id: alice.user_id.clone(),
                assigned_id: Some(bob.user_id.clone()),
                contractor_id: None,
                terms: sample_terms("Hauling", "100", PaymentType::OneTime),
            },
        )
        .await
        .unwrap();
    offers
        .respond(
            bob,
            &session.id,
            RespondRequest {
                status: ResponseStatus::Accepted,
                terms: None,
            },
        )
        .await
        .unwrap()
        .order
        .unwrap()
}

#[actix_rt::test]
async fn test_materialize_is_idempotent() {
    let _ = env_logger::builder().try_init();
    let fixture = MarketFixture::new("test_materialize_is_idempotent");
    let alice = fixture.user("alice").await;
    let bob = fixture.user("bob").await;

    let order = accepted_order(&fixture, &alice, &bob).await;
    let orders = &fixture.market.orders;

    let replayed = orders.materialize(&order.offer_session_id).await.unwrap();
    assert_eq!(replayed.order_id, order.order_id);
    let again = orders.materialize(&order.offer_session_id).await.unwrap();
    assert_eq!(again.order_id, order.order_id);

    let count = fixture
        .db
        .as_dao::<OrderDao>()
        .count_for_session(&order.offer_session_id)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[actix_rt::test]
async fn test_materialize_requires_acceptance() {
    let fixture = MarketFixture::new("test_materialize_requires_acceptance");
    let alice = fixture.user("alice").await;
    fixture.user("bob").await;

    let session = fixture
        .market
        .offers
        .open(
            &alice,
            NewOffer {
                customer_id: "alice".to_string(),
                assigned_id: Some("bob".to_string()),
                contractor_id: None,
                terms: sample_terms("Hauling", "100", PaymentType::OneTime),
            },
        )
        .await
        .unwrap();

    let orders = &fixture.market.orders;
    assert!(matches!(
        orders.materialize(&session.id).await,
        Err(OrderError::NotAccepted(_))
    ));
    assert!(matches!(
        orders.materialize("no-such-session").await,
        Err(OrderError::SessionNotFound(_))
    ));
}

#[actix_rt::test]
async fn test_order_carries_listing_lines() {
    let fixture = MarketFixture::new("test_order_carries_listing_lines");
    let alice = fixture.user("alice").await;
    let bob = fixture.user("bob").await;
    let seller = scm_market::testing::SellerRef::Assigned("bob".to_string());
    let listing = fixture
        .listing(
            &seller,
            SaleType::Sale,
            (Utc::now() + Duration::days(7)).naive_utc(),
        )
        .await;

    let mut terms = sample_terms("Quantanium", "250", PaymentType::OneTime);
    terms.market_listings = vec![ListingQuantity {
        listing_id: listing.listing_id.clone(),
        quantity: 2,
    }];
    let offers = &fixture.market.offers;
    let session = offers
        .open(
            &alice,
            NewOffer {
                customer_id: "alice".to_string(),
                assigned_id: Some("bob".to_string()),
                contractor_id: None,
                terms,
            },
        )
        .await
        .unwrap();
    let order = offers
        .respond(
            &bob,
            &session.id,
            RespondRequest {
                status: ResponseStatus::Accepted,
                terms: None,
            },
        )
        .await
        .unwrap()
        .order
        .unwrap();

    let details = fixture
        .market
        .orders
        .get_order(&alice, &order.order_id)
        .await
        .unwrap();
    assert_eq!(
        details.market_listings,
        vec![ListingQuantity {
            listing_id: listing.listing_id,
            quantity: 2,
        }]
    );
}

#[actix_rt::test]
async fn test_seller_drives_order_lifecycle() {
    let fixture = MarketFixture::new("test_seller_drives_order_lifecycle");
    let alice = fixture.user("alice").await;
    let bob = fixture.user("bob").await;
    let orders = &fixture.market.orders;
    let mut events = fixture.market.notifier.subscribe();

    let order = accepted_order(&fixture, &alice, &bob).await;

    // Fulfilling needs the order to be in progress first.
    assert!(matches!(
        orders
            .set_order_status(&bob, &order.order_id, OrderStatus::Fulfilled)
            .await,
        Err(OrderError::InvalidTransition { .. })
    ));

    let started = orders
        .set_order_status(&bob, &order.order_id, OrderStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(started.status, OrderStatus::InProgress);

    let fulfilled = orders
        .set_order_status(&bob, &order.order_id, OrderStatus::Fulfilled)
        .await
        .unwrap();
    assert_eq!(fulfilled.status, OrderStatus::Fulfilled);

    assert!(matches!(
        orders
            .set_order_status(&bob, &order.order_id, OrderStatus::Cancelled)
            .await,
        Err(OrderError::InvalidTransition { .. })
    ));

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind.to_string());
    }
    assert_eq!(
        kinds,
        vec![
            "offer_created",
            "offer_accepted",
            "order_created",
            "order_status_changed",
            "order_status_changed",
        ]
    );
}

#[actix_rt::test]
async fn test_customer_may_only_cancel_before_start() {
    let fixture = MarketFixture::new("test_customer_may_only_cancel_before_start");
    let alice = fixture.user("alice").await;
    let bob = fixture.user("bob").await;
    let mallory = fixture.user("mallory").await;
    let orders = &fixture.market.orders;

    let first = accepted_order(&fixture, &alice, &bob).await;
    assert!(matches!(
        orders
            .set_order_status(&alice, &first.order_id, OrderStatus::InProgress)
            .await,
        Err(OrderError::Permission(_))
    ));
    assert!(matches!(
        orders
            .set_order_status(&mallory, &first.order_id, OrderStatus::Cancelled)
            .await,
        Err(OrderError::Permission(_))
    ));
    let cancelled = orders
        .set_order_status(&alice, &first.order_id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let second = accepted_order(&fixture, &alice, &bob).await;
    orders
        .set_order_status(&bob, &second.order_id, OrderStatus::InProgress)
        .await
        .unwrap();
    assert!(matches!(
        orders
            .set_order_status(&alice, &second.order_id, OrderStatus::Cancelled)
            .await,
        Err(OrderError::Permission(_))
    ));

    assert!(matches!(
        orders
            .set_order_status(&bob, "no-such-order", OrderStatus::InProgress)
            .await,
        Err(OrderError::NotFound(_))
    ));
}

#[actix_rt::test]
async fn test_order_visibility() {
    let fixture = MarketFixture::new("test_order_visibility");
    let alice = fixture.user("alice").await;
    let bob = fixture.user("bob").await;
    let mallory = fixture.user("mallory").await;
    let root = fixture.admin("root").await;
    let orders = &fixture.market.orders;

    let order = accepted_order(&fixture, &alice, &bob).await;
    assert!(orders.get_order(&alice, &order.order_id).await.is_ok());
    assert!(orders.get_order(&bob, &order.order_id).await.is_ok());
    assert!(orders.get_order(&root, &order.order_id).await.is_ok());
    assert!(matches!(
        orders.get_order(&mallory, &order.order_id).await,
        Err(OrderError::Permission(_))
    ));
    assert!(matches!(
        orders.get_order(&alice, "no-such-order").await,
        Err(OrderError::NotFound(_))
    ));
}
