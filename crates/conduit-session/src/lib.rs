//! Session Transport and Session Pool (spec.md §4.3, §4.4).

pub mod pool;
pub mod protocol;
pub mod transport;

pub use pool::{ProviderCapacity, ProviderStatus, SessionGuard, SessionPool};
pub use protocol::{PermissionMode, SpawnOpts};
pub use transport::{spawn_transport, CloseReason, SendQueryError, TransportEvent, TransportHandle};
