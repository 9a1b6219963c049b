mod attempt;
mod scheduler;

pub use attempt::{ActivationAttempt, AttemptContext, Cancellation, Completion};
pub use scheduler::HotspotActivationScheduler;
