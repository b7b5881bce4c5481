pub mod error;
mod merge;
mod notifier;
mod offers;

pub use error::{MismatchKind, OfferError};
pub use merge::{check_compatible, compose};
pub use notifier::{EventNotifier, MarketEvent, MarketEventKind};
pub use offers::{
    ContractOfferRequest, MergeRequest, NewOffer, OfferBroker, RespondRequest, Responded,
    ResponseStatus, SearchQuery, SearchResult, SessionDetails,
};
