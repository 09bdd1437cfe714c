pub mod connection;
pub mod handler;
pub mod protocol;

pub use handler::ws_handler;
pub use protocol::{ClientMessage, ServerMessage};

use crate::discovery::DiscoveryStatus;
use crate::repositories::devices::TemperatureDevice;
use tokio::sync::broadcast;

/// Publish side of the fan-out: every connected WebSocket client holds a
/// receiver. Delivery is best-effort; lagging or disconnected clients are
/// simply skipped.
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<ServerMessage>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    fn broadcast(&self, msg: ServerMessage) {
        // Err means no receivers, which is fine.
        let _ = self.tx.send(msg);
    }

    pub fn notify_current_readings_changed(&self) {
        self.broadcast(ServerMessage::UpdateCurrentReadings);
    }

    pub fn notify_new_discovery(&self, device: &TemperatureDevice) {
        self.broadcast(ServerMessage::NewDiscoveryMessage {
            device: device.clone(),
        });
    }

    pub fn notify_categories_changed(&self) {
        self.broadcast(ServerMessage::UpdateCategories);
    }

    pub fn notify_discovery_status(&self, status: DiscoveryStatus) {
        self.broadcast(ServerMessage::UpdateDiscoveryStatus { status });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let hub = Hub::new(16);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.notify_current_readings_changed();

        assert!(matches!(
            a.try_recv().unwrap(),
            ServerMessage::UpdateCurrentReadings
        ));
        assert!(matches!(
            b.try_recv().unwrap(),
            ServerMessage::UpdateCurrentReadings
        ));
    }

    #[test]
    fn broadcast_without_subscribers_is_a_no_op() {
        let hub = Hub::new(16);
        hub.notify_categories_changed();
        hub.notify_discovery_status(DiscoveryStatus::TornDown);
    }
}
