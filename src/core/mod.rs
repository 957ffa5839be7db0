

pub mod agent;
pub mod config;
pub mod error;

pub use agent::MovieAgent;
pub use config::MovieAgentConfig;
pub use error::{MovieAgentError, Result};
