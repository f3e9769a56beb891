//! Client side of the state-synchronization layer: local prediction at input
//! latency, snapshot handling with hard correction and happy-path merge, and
//! interpolation of other clients' state.

pub mod context;
pub mod download;
pub mod interpolation;
pub mod predictor;
pub mod session;
pub mod snapshot;

pub use context::{ClientContext, ClientEvent};
pub use download::WorldDownload;
pub use interpolation::{InterpolationQueue, RemotePlayers};
pub use predictor::Predictor;
pub use session::{ClientSession, ClientSessionState};
pub use snapshot::handle_snapshot;
