mod account;
mod contract;
mod contractor;
mod listing;
mod offer;
mod order;

pub use account::AccountDao;
pub use contract::ContractDao;
pub use contractor::{ContractorDao, CreateContractorError};
pub use listing::{AuctionOutcome, Deadline, ListingDao};
pub use offer::{AppendError, MergeSource, OfferDao, SessionFilter, SessionPage};
pub use order::{OrderDao, StatusUpdateError};
