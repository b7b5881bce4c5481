table! {
    accounts (user_id) {
        user_id -> Text,
        username -> Text,
        role -> Text,
        banned -> Bool,
        rsi_confirmed -> Bool,
        created_at -> Timestamp,
    }
}

table! {
    contractors (contractor_id) {
        contractor_id -> Text,
        spectrum_id -> Text,
        name -> Text,
        owner_role -> Nullable<Text>,
        default_role -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

table! {
    contractor_roles (role_id) {
        role_id -> Text,
        contractor_id -> Text,
        name -> Text,
        position -> Integer,
        manage_roles -> Bool,
        manage_orders -> Bool,
        kick_members -> Bool,
        manage_invites -> Bool,
        manage_org_details -> Bool,
        manage_stock -> Bool,
        manage_market -> Bool,
        manage_recruiting -> Bool,
        manage_webhooks -> Bool,
    }
}

table! {
    contractor_member_roles (user_id, role_id) {
        user_id -> Text,
        role_id -> Text,
    }
}

table! {
    offer_sessions (id) {
        id -> Text,
        customer_id -> Text,
        assigned_id -> Nullable<Text>,
        contractor_id -> Nullable<Text>,
        status -> Text,
        current_offer_id -> Nullable<Text>,
        merged_into -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    order_offers (id) {
        id -> Text,
        session_id -> Text,
        seq -> Integer,
        actor_id -> Nullable<Text>,
        actor_side -> Text,
        title -> Text,
        description -> Text,
        kind -> Text,
        cost -> Text,
        collateral -> Text,
        payment_type -> Text,
        departure -> Nullable<Text>,
        destination -> Nullable<Text>,
        service_id -> Nullable<Text>,
        status -> Text,
        timestamp -> Timestamp,
    }
}

table! {
    offer_market_listings (offer_id, listing_id) {
        offer_id -> Text,
        listing_id -> Text,
        quantity -> Integer,
    }
}

table! {
    orders (order_id) {
        order_id -> Text,
        offer_session_id -> Text,
        offer_id -> Text,
        customer_id -> Text,
        assigned_id -> Nullable<Text>,
        contractor_id -> Nullable<Text>,
        title -> Text,
        description -> Text,
        kind -> Text,
        cost -> Text,
        collateral -> Text,
        payment_type -> Text,
        departure -> Nullable<Text>,
        destination -> Nullable<Text>,
        status -> Text,
        timestamp -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    order_market_listings (order_id, listing_id) {
        order_id -> Text,
        listing_id -> Text,
        quantity -> Integer,
    }
}

table! {
    public_contracts (id) {
        id -> Text,
        customer_id -> Text,
        title -> Text,
        description -> Text,
        kind -> Text,
        cost -> Text,
        collateral -> Text,
        payment_type -> Text,
        departure -> Nullable<Text>,
        destination -> Nullable<Text>,
        status -> Text,
        timestamp -> Timestamp,
    }
}

table! {
    public_contract_offers (contract_id, session_id) {
        contract_id -> Text,
        session_id -> Text,
    }
}

table! {
    market_listings (listing_id) {
        listing_id -> Text,
        sale_type -> Text,
        title -> Text,
        price -> Text,
        quantity_available -> Integer,
        user_seller_id -> Nullable<Text>,
        contractor_seller_id -> Nullable<Text>,
        status -> Text,
        expiration -> Timestamp,
        timestamp -> Timestamp,
    }
}

table! {
    market_auction_details (listing_id) {
        listing_id -> Text,
        end_time -> Timestamp,
        minimum_bid_increment -> Text,
        status -> Text,
    }
}

table! {
    market_bids (bid_id) {
        bid_id -> Text,
        listing_id -> Text,
        user_bidder_id -> Text,
        bid -> Text,
        timestamp -> Timestamp,
    }
}

joinable!(contractor_roles -> contractors (contractor_id));
joinable!(contractor_member_roles -> contractor_roles (role_id));
joinable!(order_offers -> offer_sessions (session_id));
joinable!(market_auction_details -> market_listings (listing_id));

allow_tables_to_appear_in_same_query!(
    accounts,
    contractors,
    contractor_roles,
    contractor_member_roles,
    offer_sessions,
    order_offers,
    offer_market_listings,
    orders,
    order_market_listings,
    public_contracts,
    public_contract_offers,
    market_listings,
    market_auction_details,
    market_bids,
);
