pub mod analytics;
pub mod asset;
pub mod configuration;
pub mod favorites;
pub mod user;

pub use analytics::AnalyticsRepository;
pub use asset::AssetRepository;
pub use configuration::ConfigurationRepository;
pub use favorites::FavoritesRepository;
pub use user::UserRepository;
