pub mod categories;
pub mod devices;
pub mod discovery;
pub mod health;
pub mod leak;
pub mod locations;
pub mod readings;

use crate::discovery::DiscoveryService;
use crate::repositories::{
    CategoriesRepository, DevicesRepository, LocationsRepository, ReadingsRepository,
    WaterLeakRepository,
};
use crate::ws::Hub;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub readings: Arc<ReadingsRepository>,
    pub devices: Arc<DevicesRepository>,
    pub locations: Arc<LocationsRepository>,
    pub categories: Arc<CategoriesRepository>,
    pub leaks: Arc<WaterLeakRepository>,
    pub discovery: Arc<DiscoveryService>,
    pub hub: Hub,
}
