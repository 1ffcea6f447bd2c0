pub mod backend;
pub mod config;

pub use backend::{Backend, BackendInput, BackendOutput, MaterializationStats};
pub use config::{LazyObjectsConfig, SerializerConfig};
