pub mod aggregate;
pub mod api;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod metrics_server;
pub mod normalize;
pub mod observability;
pub mod reader;
pub mod store;

pub use domain::{CanonicalRecord, PlantAggregate};
pub use error::ServiceError;
