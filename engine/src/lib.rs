pub mod autoplay;
pub mod bracket;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod people;
pub mod resolver;

pub use config::{ConfigError, EngineConfig};
pub use dispatch::{ChannelPublisher, Dispatcher, LogPublisher, Notifier, Outbox, Publisher};
pub use error::{EngineError, ErrorCategory, PublishError};
pub use orchestrator::{Orchestrator, Snapshot};
