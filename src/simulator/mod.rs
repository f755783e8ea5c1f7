mod context;
mod invariants;
mod sim;

pub use context::Context;
pub use invariants::InvariantChecker;
pub use sim::{ProcessSnapshot, RunReport, Simulation, StopReason, TokenSnapshot, INITIAL_HOLDER};
