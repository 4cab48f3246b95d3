/// Service layer for the OmniOne chat client.
/// Real-time synchronization engine plus the REST collaborator layer.

pub mod connection;
pub mod dock;
pub mod message_store;
pub mod pagination;
pub mod server_client;
pub mod unread;
pub mod viewport;

pub use connection::{ChatEvent, ConnectionManager, ConnectionState, PendingSend, SendState};
pub use dock::{ChatDock, PAGE_SIZE};
pub use message_store::MessageStore;
pub use pagination::{PaginationManager, PagingState};
pub use server_client::ServerClient;
pub use unread::UnreadTracker;
pub use viewport::{ScrollAnchor, ViewportCoordinator};
