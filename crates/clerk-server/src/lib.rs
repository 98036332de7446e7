pub mod registrar;
pub mod server;
pub mod settings;
pub mod status;
pub mod sync;
pub mod telemetry;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use registrar::{Outcome, Registrar};
pub use server::{Server, ServerError, ServerOptions, handle_event};
pub use settings::Settings;
pub use sync::{SyncEngine, SyncError, SyncPlan, SyncReport};
pub use tracker::{TrackMessage, TrackerError, TrackerHandle};
