pub mod classify;
pub mod guard;
pub mod score;

pub use classify::{Sensitivity, classify_sensitivity, detect_injection};
pub use guard::{SafetyDecision, SafetyGuard, SafetyVerdict};
pub use score::confidence;
