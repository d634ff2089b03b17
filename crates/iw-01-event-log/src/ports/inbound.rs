//! # Inbound Port - EventLogApi
//!
//! What the inspection surface and the relay handler drive.

use crate::stream::EventStream;
use shared_types::{IndexedIpcEvent, IpcEvent, PanelMessage, PanelRequest};

pub trait EventLogApi: Send + Sync {
    /// Index, correlate and store `event`, then push it to subscribers.
    fn record(&self, event: IpcEvent) -> IndexedIpcEvent;

    /// The current window, oldest first.
    fn get_all(&self) -> Vec<IndexedIpcEvent>;

    /// Empty the log. Serial numbers keep counting.
    fn clear(&self);

    /// Answer one inspection-surface request.
    fn handle_panel_request(&self, request: PanelRequest) -> PanelMessage;

    /// Live feed of pushed panel messages.
    fn subscribe(&self) -> EventStream;
}
