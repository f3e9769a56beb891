//! Authoritative server side of the state-synchronization layer: client
//! sessions, command replay, divergence detection and correction dispatch,
//! bulk world transfer, and the registry listing endpoint.

pub mod context;
pub mod reconciliation;
pub mod registry;
pub mod session;
pub mod world_transfer;

pub use context::{ServerContext, ServerEvent, ServerOptions};
pub use reconciliation::STATE_EPSILON;
pub use registry::{RegistryServer, ServerListing};
pub use session::{ClientTable, JoinError, RemoteClient, SyncState};
pub use world_transfer::WorldTransfer;
