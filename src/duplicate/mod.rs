pub mod fingerprint;
pub mod gate;

pub use fingerprint::{Fingerprint, generate, normalize};
pub use gate::{CacheEntry, DuplicateGate, GateDecision, GateEvaluation, GateStatus};
