pub mod clock;
pub mod config;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod server;
pub mod store;
pub mod telemetry;
mod text;

// Re-export the request core for convenient access
pub use error::{ErrorCode, Failure, Outcome};
pub use pipeline::Pipeline;
