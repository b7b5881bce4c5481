use serde::Serialize;
use strum_macros::Display;
use tokio::sync::broadcast::{channel, Receiver, Sender};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MarketEventKind {
    OfferCreated,
    OfferCountered,
    OfferAccepted,
    OfferRejected,
    OfferCancelled,
    /// A source session was closed by folding it into another one.
    OfferMerged,
    OffersMerged,
    OrderCreated,
    OrderStatusChanged,
    AuctionResolved,
    ListingExpired,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MarketEvent {
    pub kind: MarketEventKind,
    pub entity_id: String,
    /// `None` for transitions made by the scheduler.
    pub actor_id: Option<String>,
    /// Session a merged source was folded into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
}

/// Fire-and-forget fan-out of state transitions to whoever delivers notifications.
#[derive(Clone)]
pub struct EventNotifier {
    sender: Sender<MarketEvent>,
}

impl Default for EventNotifier {
    fn default() -> Self {
        EventNotifier::new()
    }
}

impl EventNotifier {
    pub fn new() -> EventNotifier {
        // Receivers are created on demand by subscribers.
        let (sender, _receiver) = channel(256);
        EventNotifier { sender }
    }

    pub fn subscribe(&self) -> Receiver<MarketEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, kind: MarketEventKind, entity_id: &str, actor_id: Option<&str>) {
        self.send(MarketEvent {
            kind,
            entity_id: entity_id.to_string(),
            actor_id: actor_id.map(str::to_string),
            related_id: None,
        })
    }

    pub fn emit_merged(&self, source_id: &str, merged_into: &str, actor_id: &str) {
        self.send(MarketEvent {
            kind: MarketEventKind::OfferMerged,
            entity_id: source_id.to_string(),
            actor_id: Some(actor_id.to_string()),
            related_id: Some(merged_into.to_string()),
        })
    }

    fn send(&self, event: MarketEvent) {
        log::trace!("Emitting {} for [{}].", event.kind, event.entity_id);
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}
