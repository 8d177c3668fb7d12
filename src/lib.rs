pub mod clock;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod models;
pub mod providers;
pub mod scheduler;
pub mod service;

pub use error::{JourneyError, JourneyResult};
pub use service::JourneyService;
