pub mod categories;
pub mod devices;
pub mod leak;
pub mod locations;
pub mod readings;

pub use categories::CategoriesRepository;
pub use devices::DevicesRepository;
pub use leak::WaterLeakRepository;
pub use locations::LocationsRepository;
pub use readings::ReadingsRepository;
