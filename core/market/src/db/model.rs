/// Implements text (de)serialization for enums that carry `Display` + `FromStr`
/// (strum), so they can be used directly as `Text` columns.
macro_rules! text_enum_sql {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<DB> diesel::serialize::ToSql<diesel::sql_types::Text, DB> for $ty
            where
                DB: diesel::backend::Backend,
                String: diesel::serialize::ToSql<diesel::sql_types::Text, DB>,
            {
                fn to_sql<W: std::io::Write>(
                    &self,
                    out: &mut diesel::serialize::Output<W, DB>,
                ) -> diesel::serialize::Result {
                    <String as diesel::serialize::ToSql<diesel::sql_types::Text, DB>>::to_sql(
                        &self.to_string(),
                        out,
                    )
                }
            }

            impl<DB> diesel::deserialize::FromSql<diesel::sql_types::Text, DB> for $ty
            where
                DB: diesel::backend::Backend,
                String: diesel::deserialize::FromSql<diesel::sql_types::Text, DB>,
            {
                fn from_sql(bytes: Option<&DB::RawValue>) -> diesel::deserialize::Result<Self> {
                    let value =
                        <String as diesel::deserialize::FromSql<diesel::sql_types::Text, DB>>::from_sql(
                            bytes,
                        )?;
                    Ok(value.parse::<$ty>()?)
                }
            }
        )*
    };
}

mod account;
mod contract;
mod contractor;
mod listing;
mod offer;
mod order;

pub use account::{Account, AccountRole};
pub use contract::{ContractOffer, ContractStatus, PublicContract};
pub use contractor::{Contractor, ContractorRole, MemberRole, Permission};
pub use listing::{
    AuctionDetails, AuctionStatus, Bid, ListingStatus, MarketListing, SaleType, winning_bid,
};
pub use offer::{
    ListingQuantity, OfferListing, OfferRevision, OfferSession, OfferTerms, PaymentType,
    RevisionStatus, RevisionView, SellerRef, SessionStatus, Side,
};
pub use order::{Order, OrderListing, OrderStatus};

pub type UserId = String;
pub type ContractorId = String;
pub type SessionId = String;
pub type OrderId = String;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
