// FILE: crates/library/src/events.rs

//! Catalogue change notifications

use folio_core::{BookId, TagId};
use log::debug;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogueEvent {
    /// A book finished publishing
    Published { book: BookId, slug: String },
    /// HTML and fragments of a book were rebuilt
    HtmlBuilt { book: BookId },
    BookDeleted { book: BookId, slug: String },
    /// A tag's cached count was dropped
    TagTouched { tag: TagId },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CatalogueEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogueEvent> {
        self.sender.subscribe()
    }

    /// Sends an event; having no subscribers is fine
    pub fn emit(&self, event: CatalogueEvent) {
        debug!("Event: {:?}", event);
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
