//! The runtime controller: global lifecycle state machine, property
//! reconciliation, and process-level settings.

pub mod controller;
pub mod reconcile;
pub mod settings;

pub use controller::Runtime;
pub use settings::RuntimeSettings;
