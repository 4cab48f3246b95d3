/// OmniOne Chat Client Library
/// Real-time chat dock synchronization for the coaching platform

pub mod cli;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{ClientError, Result};
pub use services::{ChatDock, ChatEvent, ConnectionManager, ServerClient};
pub use storage::SessionStore;
