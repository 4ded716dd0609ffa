pub mod loader;

pub use loader::{ConfigurationLoader, ConfigurationLoaderError, ConfigurationRecord, LoadSummary};
