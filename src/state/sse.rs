use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Dashboard streams keyed by organizer id.
///
/// Hubs are created on first subscription and dropped once their last
/// subscriber disconnects.
pub struct OrganizerHubs {
    hubs: DashMap<String, SseHub>,
    capacity: usize,
}

impl OrganizerHubs {
    /// Registry whose hubs buffer up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to the organizer's stream, creating the hub when needed.
    pub fn subscribe(&self, organizer_id: &str) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(organizer_id.to_owned())
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Send an event to the organizer's subscribers, if any.
    pub fn broadcast(&self, organizer_id: &str, event: ServerEvent) {
        if let Some(hub) = self.hubs.get(organizer_id) {
            hub.broadcast(event);
        }
    }

    /// Send an event to every organizer stream.
    pub fn broadcast_all(&self, event: ServerEvent) {
        for hub in self.hubs.iter() {
            hub.broadcast(event.clone());
        }
    }

    /// Drop the organizer's hub when nobody listens anymore.
    pub fn release(&self, organizer_id: &str) {
        self.hubs
            .remove_if(organizer_id, |_, hub| hub.receiver_count() == 0);
    }

    /// Number of organizers with a live hub.
    pub fn len(&self) -> usize {
        self.hubs.len()
    }

    /// Whether no organizer is subscribed.
    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
