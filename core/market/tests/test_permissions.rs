use scm_market::contractors::{ContractorError, NewContractor};
use scm_market::testing::{MarketFixture, Permission};

#[actix_rt::test]
async fn test_permission_is_union_of_held_roles() {
    let _ = env_logger::builder().try_init();
    let fixture = MarketFixture::new("test_permission_is_union_of_held_roles");
    let owner = fixture.user("owner").await;
    let bob = fixture.user("bob").await;
    let org = fixture.contractor(&owner, "ORG").await;

    let roles = fixture
        .role(&org.contractor_id, "Roles", 5, &[Permission::ManageRoles])
        .await;
    let orders = fixture
        .role(&org.contractor_id, "Orders", 6, &[Permission::ManageOrders])
        .await;
    fixture.grant(&bob, &roles).await;
    fixture.grant(&bob, &orders).await;

    let permissions = &fixture.market.permissions;
    let id = &org.contractor_id;
    assert!(permissions
        .has_permission(id, "bob", Permission::ManageRoles)
        .await
        .unwrap());
    assert!(permissions
        .has_permission(id, "bob", Permission::ManageOrders)
        .await
        .unwrap());
    assert!(!permissions
        .has_permission(id, "bob", Permission::KickMembers)
        .await
        .unwrap());
    assert!(permissions
        .has_permission(id, "owner", Permission::ManageWebhooks)
        .await
        .unwrap());
}

#[actix_rt::test]
async fn test_non_member_holds_nothing_but_admin_holds_everything() {
    let fixture = MarketFixture::new("test_non_member_holds_nothing_but_admin_holds_everything");
    let owner = fixture.user("owner").await;
    fixture.user("stranger").await;
    fixture.admin("root").await;
    let org = fixture.contractor(&owner, "ORG").await;

    let permissions = &fixture.market.permissions;
    let id = &org.contractor_id;
    assert!(!permissions
        .has_permission(id, "stranger", Permission::ManageOrders)
        .await
        .unwrap());
    assert!(!permissions
        .has_permission(id, "unknown-user", Permission::ManageOrders)
        .await
        .unwrap());
    assert!(permissions
        .has_permission(id, "root", Permission::ManageRoles)
        .await
        .unwrap());

    // Site admins hold capabilities, not rank.
    assert!(!permissions.outranks(id, "owner", "root").await.unwrap());
    assert!(!permissions.is_member(id, "root").await.unwrap());
}

#[actix_rt::test]
async fn test_outranks_by_lowest_position() {
    let fixture = MarketFixture::new("test_outranks_by_lowest_position");
    let owner = fixture.user("owner").await;
    let officer = fixture.user("officer").await;
    let peer = fixture.user("peer").await;
    fixture.user("outsider").await;
    let org = fixture.contractor(&owner, "ORG").await;

    let rank = fixture.role(&org.contractor_id, "Officer", 3, &[]).await;
    let low = fixture.role(&org.contractor_id, "Crew", 8, &[]).await;
    fixture.grant(&officer, &rank).await;
    fixture.grant(&officer, &low).await;
    fixture.grant(&peer, &rank).await;

    let permissions = &fixture.market.permissions;
    let id = &org.contractor_id;
    assert!(permissions.outranks(id, "officer", "owner").await.unwrap());
    assert!(!permissions.outranks(id, "owner", "officer").await.unwrap());
    assert!(!permissions.outranks(id, "peer", "officer").await.unwrap());
    assert!(!permissions.outranks(id, "officer", "peer").await.unwrap());

    // Members rank above users without roles, never the other way around.
    assert!(permissions.outranks(id, "outsider", "peer").await.unwrap());
    assert!(!permissions.outranks(id, "peer", "outsider").await.unwrap());
    assert!(!permissions
        .outranks(id, "outsider", "outsider")
        .await
        .unwrap());
}

#[actix_rt::test]
async fn test_can_manage_role() {
    let fixture = MarketFixture::new("test_can_manage_role");
    let owner = fixture.user("owner").await;
    let other_owner = fixture.user("other-owner").await;
    let details = fixture
        .market
        .contractors
        .create_contractor(
            &owner,
            NewContractor {
                spectrum_id: "ORG".to_string(),
                name: "Org".to_string(),
            },
        )
        .await
        .unwrap();
    let other = fixture.contractor(&other_owner, "OTHER").await;

    let id = &details.contractor.contractor_id;
    let owner_role = details.contractor.owner_role.clone().unwrap();
    let member_role = details.contractor.default_role.clone().unwrap();
    let foreign_role = other.default_role.clone().unwrap();

    let permissions = &fixture.market.permissions;
    assert!(permissions
        .can_manage_role(id, &member_role, "owner")
        .await
        .unwrap());
    assert!(!permissions
        .can_manage_role(id, &owner_role, "owner")
        .await
        .unwrap());
    assert!(!permissions
        .can_manage_role(id, &foreign_role, "owner")
        .await
        .unwrap());
    assert!(!permissions
        .can_manage_role(id, "no-such-role", "owner")
        .await
        .unwrap());
    assert!(!permissions
        .can_manage_role(id, &member_role, "other-owner")
        .await
        .unwrap());
}

#[actix_rt::test]
async fn test_create_contractor_seeds_roles() {
    let fixture = MarketFixture::new("test_create_contractor_seeds_roles");
    let owner = fixture.user("owner").await;
    let contractors = &fixture.market.contractors;

    let details = contractors
        .create_contractor(
            &owner,
            NewContractor {
                spectrum_id: "ORG".to_string(),
                name: " Org ".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(details.contractor.name, "Org");
    let positions = details
        .roles
        .iter()
        .map(|role| (role.name.as_str(), role.position))
        .collect::<Vec<_>>();
    assert_eq!(positions, vec![("Owner", 0), ("Admin", 1), ("Member", 10)]);
    assert!(fixture
        .market
        .permissions
        .is_member(&details.contractor.contractor_id, "owner")
        .await
        .unwrap());

    let duplicate = contractors
        .create_contractor(
            &owner,
            NewContractor {
                spectrum_id: "ORG".to_string(),
                name: "Again".to_string(),
            },
        )
        .await;
    assert!(matches!(duplicate, Err(ContractorError::Conflict(_))));

    let empty = contractors
        .create_contractor(
            &owner,
            NewContractor {
                spectrum_id: " ".to_string(),
                name: "Nameless".to_string(),
            },
        )
        .await;
    assert!(matches!(
        empty,
        Err(ContractorError::Validation {
            field: "spectrum_id",
            ..
        })
    ));
}

#[actix_rt::test]
async fn test_member_management() {
    let _ = env_logger::builder().try_init();
    let fixture = MarketFixture::new("test_member_management");
    let owner = fixture.user("owner").await;
    let bob = fixture.user("bob").await;
    fixture.user("carol").await;
    let org = fixture.contractor(&owner, "ORG").await;
    let id = org.contractor_id.as_str();
    let member_role = org.default_role.clone().unwrap();
    let contractors = &fixture.market.contractors;
    let permissions = &fixture.market.permissions;

    contractors.add_member(&owner, id, "bob").await.unwrap();
    assert!(permissions.is_member(id, "bob").await.unwrap());
    assert!(matches!(
        contractors.add_member(&owner, id, "bob").await,
        Err(ContractorError::Conflict(_))
    ));
    assert!(matches!(
        contractors.add_member(&owner, id, "nobody").await,
        Err(ContractorError::NotFound { .. })
    ));

    // Plain members can't invite, kick or hand out roles.
    assert!(matches!(
        contractors.add_member(&bob, id, "carol").await,
        Err(ContractorError::Permission(_))
    ));
    assert!(matches!(
        contractors.kick_member(&bob, id, "owner").await,
        Err(ContractorError::Permission(_))
    ));
    assert!(matches!(
        contractors.assign_role(&bob, id, "owner", &member_role).await,
        Err(ContractorError::Permission(_))
    ));

    // The default role stays until the member is kicked.
    assert!(matches!(
        contractors.remove_role(&owner, id, "bob", &member_role).await,
        Err(ContractorError::Validation { .. })
    ));

    let officer = fixture
        .role(id, "Officer", 4, &[Permission::ManageOrders])
        .await;
    contractors
        .assign_role(&owner, id, "bob", &officer.role_id)
        .await
        .unwrap();
    assert!(matches!(
        contractors
            .assign_role(&owner, id, "bob", &officer.role_id)
            .await,
        Err(ContractorError::Conflict(_))
    ));
    assert!(permissions
        .has_permission(id, "bob", Permission::ManageOrders)
        .await
        .unwrap());
    contractors
        .remove_role(&owner, id, "bob", &officer.role_id)
        .await
        .unwrap();
    assert!(!permissions
        .has_permission(id, "bob", Permission::ManageOrders)
        .await
        .unwrap());

    assert!(matches!(
        contractors.kick_member(&owner, id, "carol").await,
        Err(ContractorError::NotFound { .. })
    ));
    contractors.kick_member(&owner, id, "bob").await.unwrap();
    assert!(!permissions.is_member(id, "bob").await.unwrap());
}

#[actix_rt::test]
async fn test_kick_requires_outranking() {
    let fixture = MarketFixture::new("test_kick_requires_outranking");
    let owner = fixture.user("owner").await;
    let first = fixture.user("first").await;
    let second = fixture.user("second").await;
    let org = fixture.contractor(&owner, "ORG").await;
    let id = org.contractor_id.as_str();

    let bouncer = fixture
        .role(id, "Bouncer", 5, &[Permission::KickMembers])
        .await;
    fixture.grant(&first, &bouncer).await;
    fixture.grant(&second, &bouncer).await;

    let contractors = &fixture.market.contractors;
    assert!(matches!(
        contractors.kick_member(&first, id, "second").await,
        Err(ContractorError::Permission(_))
    ));
    assert!(matches!(
        contractors.kick_member(&first, id, "owner").await,
        Err(ContractorError::Permission(_))
    ));
    contractors.kick_member(&owner, id, "second").await.unwrap();
}
