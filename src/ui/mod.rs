// Terminal concerns
//
// - confirm.rs: the per-device "yes" gate
// - logging.rs: tracing subscriber with the shared append-only log file

pub mod confirm;
pub mod logging;

pub use confirm::{AlwaysConfirm, Confirmer, PromptConfirmer};
pub use logging::{LogSettings, DEFAULT_LOG_FILE};
