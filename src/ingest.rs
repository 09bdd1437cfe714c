use crate::decode;
use crate::error::Result;
use crate::repositories::readings::NewReading;
use crate::repositories::{
    DevicesRepository, LocationsRepository, ReadingsRepository, WaterLeakRepository,
};
use crate::ws::Hub;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Turns raw MQTT messages into persisted readings and fan-out notifications.
/// Per-message failures are returned to the session loop, which logs and
/// continues; nothing here is fatal.
#[derive(Clone)]
pub struct Ingestor {
    devices: Arc<DevicesRepository>,
    locations: Arc<LocationsRepository>,
    leaks: Arc<WaterLeakRepository>,
    readings: Arc<ReadingsRepository>,
    hub: Hub,
}

impl Ingestor {
    pub fn new(
        devices: Arc<DevicesRepository>,
        locations: Arc<LocationsRepository>,
        leaks: Arc<WaterLeakRepository>,
        readings: Arc<ReadingsRepository>,
        hub: Hub,
    ) -> Self {
        Self {
            devices,
            locations,
            leaks,
            readings,
            hub,
        }
    }

    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> Result<()> {
        // Leak sensors are registered manually; any message on their topic is
        // a heartbeat for the inactivity sweep.
        if self.leaks.touch(topic, Utc::now()).await? {
            debug!(topic = %topic, "leak sensor heartbeat");
            return Ok(());
        }

        let candidate = decode::decode(topic, payload)?;

        let (mut device, is_new) = self
            .devices
            .resolve_or_create(topic, &candidate.display_name())
            .await?;
        if is_new {
            info!(topic = %topic, device = %device.name, "discovered new device");
        }

        // Self-reported location names create the registry entry on first
        // sight; an operator-assigned location is never overwritten.
        if device.location_id.is_none() {
            if let Some(location_name) = &candidate.location {
                if let Ok(location) = self.locations.resolve_or_create(location_name).await {
                    if self
                        .devices
                        .assign_location_if_unset(device.id, location.id)
                        .await?
                    {
                        device.location_id = Some(location.id);
                    }
                }
            }
        }

        self.readings
            .insert(&NewReading {
                time: candidate.time,
                device_id: device.id,
                location_id: device.location_id,
                temperature_c: candidate.temperature_c,
                humidity: candidate.humidity,
                battery_level: candidate.battery_level,
                status: candidate.status.clone(),
            })
            .await?;

        if is_new {
            self.hub.notify_new_discovery(&device);
        }
        self.hub.notify_current_readings_changed();

        Ok(())
    }
}
