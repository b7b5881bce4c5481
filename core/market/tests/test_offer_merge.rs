use scm_market::negotiation::{MarketEventKind, MismatchKind, NewOffer, OfferError};
use scm_market::testing::{
    decimal, sample_terms, Actor, MarketFixture, OfferSession, OfferTerms, PaymentType,
    RevisionStatus, SessionStatus, Side,
};

async fn open(
    fixture: &MarketFixture,
    seller: &Actor,
    customer: &str,
    terms: OfferTerms,
) -> OfferSession {
    fixture
        .market
        .offers
        .open(
            seller,
            NewOffer {
                customer_id: customer.to_string(),
                assigned_id: Some(seller.user_id.clone()),
                contractor_id: None,
                terms,
            },
        )
        .await
        .unwrap()
}

#[actix_rt::test]
async fn test_merge_sums_terms_and_closes_sources() {
    let _ = env_logger::builder().try_init();
    let fixture = MarketFixture::new("test_merge_sums_terms_and_closes_sources");
    fixture.user("alice").await;
    let bob = fixture.user("bob").await;
    let offers = &fixture.market.offers;

    let first = open(
        &fixture,
        &bob,
        "alice",
        sample_terms("Hauling", "10.5", PaymentType::OneTime),
    )
    .await;
    let second = open(
        &fixture,
        &bob,
        "alice",
        sample_terms("Escort", "20", PaymentType::OneTime),
    )
    .await;

    let mut events = offers.notifier().subscribe();
    let merged = offers
        .merge(&bob, vec![first.id.clone(), second.id.clone()])
        .await
        .unwrap();
    assert_eq!(merged.session.status, SessionStatus::Active);

    let event = events.recv().await.unwrap();
    assert_eq!(event.kind, MarketEventKind::OffersMerged);
    assert_eq!(event.entity_id, merged.session.id);
    for source in [&first, &second] {
        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, MarketEventKind::OfferMerged);
        assert_eq!(event.entity_id, source.id);
        assert_eq!(event.related_id.as_deref(), Some(merged.session.id.as_str()));
    }
    assert_eq!(merged.session.customer_id, "alice");
    assert_eq!(merged.session.assigned_id.as_deref(), Some("bob"));
    assert_eq!(merged.revisions.len(), 1);

    let revision = &merged.revisions[0].revision;
    assert_eq!(revision.cost, decimal("30.5"));
    assert_eq!(revision.title, "Hauling + Escort");
    assert_eq!(revision.payment_type, PaymentType::OneTime);
    assert_eq!(revision.actor_side, Side::Seller);
    assert_eq!(revision.status, RevisionStatus::Pending);

    for source in [&first, &second] {
        let details = offers.get_session(&bob, &source.id).await.unwrap();
        assert_eq!(details.session.status, SessionStatus::Cancelled);
        assert_eq!(
            details.session.merged_into.as_deref(),
            Some(merged.session.id.as_str())
        );
        assert_eq!(details.revisions.len(), 2);
        assert_eq!(details.revisions[1].revision.status, RevisionStatus::Cancelled);
    }

    // Merged-away sessions no longer negotiate.
    assert!(matches!(
        offers
            .merge(&bob, vec![first.id.clone(), merged.session.id.clone()])
            .await,
        Err(OfferError::NotActive { .. })
    ));
}

#[actix_rt::test]
async fn test_mismatch_leaves_sessions_untouched() {
    let fixture = MarketFixture::new("test_mismatch_leaves_sessions_untouched");
    fixture.user("alice").await;
    fixture.user("carol").await;
    let bob = fixture.user("bob").await;
    let offers = &fixture.market.offers;

    let one_time = open(
        &fixture,
        &bob,
        "alice",
        sample_terms("Hauling", "10", PaymentType::OneTime),
    )
    .await;
    let hourly = open(
        &fixture,
        &bob,
        "alice",
        sample_terms("Mining", "20", PaymentType::Hourly),
    )
    .await;
    let other_customer = open(
        &fixture,
        &bob,
        "carol",
        sample_terms("Hauling", "30", PaymentType::OneTime),
    )
    .await;

    let error = offers
        .merge(&bob, vec![one_time.id.clone(), hourly.id.clone()])
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        OfferError::Mismatch(MismatchKind::DifferentPaymentType)
    ));

    assert!(matches!(
        offers
            .merge(&bob, vec![one_time.id.clone(), other_customer.id.clone()])
            .await,
        Err(OfferError::Mismatch(MismatchKind::DifferentCustomer))
    ));

    for source in [&one_time, &hourly, &other_customer] {
        let details = offers.get_session(&bob, &source.id).await.unwrap();
        assert_eq!(details.session.status, SessionStatus::Active);
        assert_eq!(details.session.merged_into, None);
        assert_eq!(details.revisions.len(), 1);
    }
}

#[actix_rt::test]
async fn test_merge_refuses_services() {
    let fixture = MarketFixture::new("test_merge_refuses_services");
    fixture.user("alice").await;
    let bob = fixture.user("bob").await;

    let mut with_service = sample_terms("Repair", "40", PaymentType::OneTime);
    with_service.service_id = Some("service-1".to_string());
    let serviced = open(&fixture, &bob, "alice", with_service).await;
    let plain = open(
        &fixture,
        &bob,
        "alice",
        sample_terms("Repair", "40", PaymentType::OneTime),
    )
    .await;

    assert!(matches!(
        fixture
            .market
            .offers
            .merge(&bob, vec![plain.id.clone(), serviced.id.clone()])
            .await,
        Err(OfferError::Mismatch(MismatchKind::HasServices))
    ));
}

#[actix_rt::test]
async fn test_merge_is_seller_only() {
    let fixture = MarketFixture::new("test_merge_is_seller_only");
    let alice = fixture.user("alice").await;
    let bob = fixture.user("bob").await;
    let mallory = fixture.user("mallory").await;
    let offers = &fixture.market.offers;

    let first = open(
        &fixture,
        &bob,
        "alice",
        sample_terms("Hauling", "10", PaymentType::OneTime),
    )
    .await;
    let second = open(
        &fixture,
        &bob,
        "alice",
        sample_terms("Hauling", "10", PaymentType::OneTime),
    )
    .await;
    let ids = vec![first.id.clone(), second.id.clone()];

    assert!(matches!(
        offers.merge(&alice, ids.clone()).await,
        Err(OfferError::Permission(_))
    ));
    assert!(matches!(
        offers.merge(&mallory, ids.clone()).await,
        Err(OfferError::Permission(_))
    ));

    let details = offers.get_session(&bob, &first.id).await.unwrap();
    assert_eq!(details.session.status, SessionStatus::Active);
}

#[actix_rt::test]
async fn test_merge_request_validation() {
    let fixture = MarketFixture::new("test_merge_request_validation");
    fixture.user("alice").await;
    let bob = fixture.user("bob").await;
    let offers = &fixture.market.offers;

    let first = open(
        &fixture,
        &bob,
        "alice",
        sample_terms("Hauling", "10", PaymentType::OneTime),
    )
    .await;

    assert!(matches!(
        offers.merge(&bob, vec![first.id.clone()]).await,
        Err(OfferError::Validation { .. })
    ));
    assert!(matches!(
        offers
            .merge(&bob, vec![first.id.clone(), first.id.clone()])
            .await,
        Err(OfferError::Validation { .. })
    ));
    assert!(matches!(
        offers
            .merge(&bob, vec![first.id.clone(), "no-such-session".to_string()])
            .await,
        Err(OfferError::NotFound { .. })
    ));

    let too_many = (0..21).map(|i| format!("session-{}", i)).collect();
    assert!(matches!(
        offers.merge(&bob, too_many).await,
        Err(OfferError::Validation { .. })
    ));
}

#[actix_rt::test]
async fn test_contractor_manager_merges() {
    let fixture = MarketFixture::new("test_contractor_manager_merges");
    let alice = fixture.user("alice").await;
    let owner = fixture.user("owner").await;
    let org = fixture.contractor(&owner, "ORG").await;
    let manager = fixture.order_manager(&org.contractor_id, "manager").await;
    let offers = &fixture.market.offers;

    let mut sessions = Vec::new();
    for (cost, payment_type) in [
        ("40", PaymentType::Hourly),
        ("60", PaymentType::Daily),
        ("15.25", PaymentType::OneTime),
        ("4.75", PaymentType::OneTime),
    ] {
        let session = offers
            .open(
                &alice,
                NewOffer {
                    customer_id: "alice".to_string(),
                    assigned_id: None,
                    contractor_id: Some(org.contractor_id.clone()),
                    terms: sample_terms("Salvage", cost, payment_type),
                },
            )
            .await
            .unwrap();
        sessions.push(session.id);
    }

    assert!(matches!(
        offers
            .merge(&manager, vec![sessions[0].clone(), sessions[1].clone()])
            .await,
        Err(OfferError::Mismatch(MismatchKind::DifferentPaymentType))
    ));
    for id in &sessions[..2] {
        let details = offers.get_session(&manager, id).await.unwrap();
        assert_eq!(details.session.status, SessionStatus::Active);
        assert_eq!(details.revisions.len(), 1);
    }

    let merged = offers
        .merge(&manager, vec![sessions[2].clone(), sessions[3].clone()])
        .await
        .unwrap();
    assert_eq!(
        merged.session.contractor_id.as_deref(),
        Some(org.contractor_id.as_str())
    );
    assert_eq!(merged.revisions[0].revision.cost, decimal("20"));
    assert_eq!(merged.revisions[0].revision.title, "Salvage");
    for id in &sessions[2..] {
        let details = offers.get_session(&alice, id).await.unwrap();
        assert_eq!(details.session.status, SessionStatus::Cancelled);
    }
}
