//! Fixtures shared by unit and integration tests.

use chrono::{NaiveDateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;

use scm_persistence::types::BigDecimalField;

pub use crate::config::Config;
pub use crate::db::dao::{
    AccountDao, AuctionOutcome, ContractDao, ContractorDao, ListingDao, OfferDao, OrderDao,
};
pub use crate::db::model::*;
pub use crate::db::{DbError, DbExecutor};
pub use crate::identity::Actor;
pub use crate::market::MarketService;

/// Market over a private in-memory database.
pub struct MarketFixture {
    pub db: DbExecutor,
    pub market: Arc<MarketService>,
}

impl MarketFixture {
    /// `name` must be unique per test, since in-memory databases are shared by name.
    pub fn new(name: &str) -> MarketFixture {
        let config = Config::from_env().expect("default config");
        Self::with_config(name, config)
    }

    pub fn with_config(name: &str, config: Config) -> MarketFixture {
        let db = DbExecutor::in_memory(name).expect("in-memory database");
        let market = MarketService::new(&db, Arc::new(config)).expect("market service");
        MarketFixture {
            db,
            market: Arc::new(market),
        }
    }

    pub async fn user(&self, user_id: &str) -> Actor {
        self.account(user_id, AccountRole::User, false).await
    }

    pub async fn admin(&self, user_id: &str) -> Actor {
        self.account(user_id, AccountRole::Admin, false).await
    }

    pub async fn account(&self, user_id: &str, role: AccountRole, banned: bool) -> Actor {
        let account = Account {
            user_id: user_id.to_string(),
            username: user_id.to_string(),
            role,
            banned,
            rsi_confirmed: true,
            created_at: Utc::now().naive_utc(),
        };
        let account = self
            .db
            .as_dao::<AccountDao>()
            .upsert(account)
            .await
            .expect("account stored");
        Actor::from(&account)
    }

    /// Contractor owned by `owner`, with the default `Owner`, `Admin` and `Member` roles.
    pub async fn contractor(&self, owner: &Actor, spectrum_id: &str) -> Contractor {
        self.market
            .contractors
            .create_contractor(
                owner,
                crate::contractors::NewContractor {
                    spectrum_id: spectrum_id.to_string(),
                    name: format!("{} Industries", spectrum_id),
                },
            )
            .await
            .expect("contractor created")
            .contractor
    }

    /// Adds a role granting exactly `permissions`.
    pub async fn role(
        &self,
        contractor_id: &str,
        name: &str,
        position: i32,
        permissions: &[Permission],
    ) -> ContractorRole {
        let mut role = ContractorRole::uniform(contractor_id, name, position, false);
        for permission in permissions {
            match permission {
                Permission::ManageRoles => role.manage_roles = true,
                Permission::ManageOrders => role.manage_orders = true,
                Permission::KickMembers => role.kick_members = true,
                Permission::ManageInvites => role.manage_invites = true,
                Permission::ManageOrgDetails => role.manage_org_details = true,
                Permission::ManageStock => role.manage_stock = true,
                Permission::ManageMarket => role.manage_market = true,
                Permission::ManageRecruiting => role.manage_recruiting = true,
                Permission::ManageWebhooks => role.manage_webhooks = true,
            }
        }
        self.db
            .as_dao::<ContractorDao>()
            .insert_role(role)
            .await
            .expect("role stored")
    }

    pub async fn grant(&self, user: &Actor, role: &ContractorRole) {
        self.db
            .as_dao::<ContractorDao>()
            .grant_role(&user.user_id, &role.role_id)
            .await
            .expect("role granted");
    }

    /// Member of `contractor_id` holding a fresh role with `manage_orders`.
    pub async fn order_manager(&self, contractor_id: &str, user_id: &str) -> Actor {
        let user = self.user(user_id).await;
        let role = self
            .role(
                contractor_id,
                &format!("Orders {}", user_id),
                5,
                &[Permission::ManageOrders],
            )
            .await;
        self.grant(&user, &role).await;
        user
    }

    pub async fn listing(
        &self,
        seller: &SellerRef,
        sale_type: SaleType,
        expiration: NaiveDateTime,
    ) -> MarketListing {
        let listing = MarketListing {
            listing_id: new_id(),
            sale_type,
            title: "Quantanium".to_string(),
            price: decimal("100"),
            quantity_available: 3,
            user_seller_id: seller.assigned_id(),
            contractor_seller_id: seller.contractor_id(),
            status: ListingStatus::Active,
            expiration,
            timestamp: Utc::now().naive_utc(),
        };
        let details = match sale_type {
            SaleType::Auction => Some(AuctionDetails {
                listing_id: listing.listing_id.clone(),
                end_time: expiration,
                minimum_bid_increment: decimal("1"),
                status: AuctionStatus::Active,
            }),
            SaleType::Sale => None,
        };
        self.db
            .as_dao::<ListingDao>()
            .insert(listing, details)
            .await
            .expect("listing stored")
    }

    /// Status of the auction behind `listing_id`, read straight from the table.
    pub fn auction_status(&self, listing_id: &str) -> AuctionStatus {
        use crate::db::schema::market_auction_details::dsl as auction;
        use diesel::prelude::*;

        let conn = self.db.conn().expect("connection");
        auction::market_auction_details
            .filter(auction::listing_id.eq(listing_id))
            .select(auction::status)
            .first(&*conn)
            .expect("auction stored")
    }

    pub async fn bid(&self, listing_id: &str, bidder: &Actor, amount: &str) -> Bid {
        self.db
            .as_dao::<ListingDao>()
            .place_bid(Bid {
                bid_id: new_id(),
                listing_id: listing_id.to_string(),
                user_bidder_id: bidder.user_id.clone(),
                bid: decimal(amount),
                timestamp: Utc::now().naive_utc(),
            })
            .await
            .expect("bid stored")
    }
}

pub fn decimal(value: &str) -> BigDecimalField {
    BigDecimalField::from_str(value).expect("valid decimal")
}

pub fn sample_terms(title: &str, cost: &str, payment_type: PaymentType) -> OfferTerms {
    OfferTerms {
        title: title.to_string(),
        description: format!("{} from Lorville to Area18.", title),
        kind: "Hauling".to_string(),
        cost: decimal(cost),
        collateral: decimal("0"),
        payment_type,
        departure: Some("Lorville".to_string()),
        destination: Some("Area18".to_string()),
        service_id: None,
        market_listings: vec![],
    }
}
