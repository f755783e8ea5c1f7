mod bus;
mod common;
mod process;
mod token;

pub use bus::{Bus, PendingDelivery};
pub use common::*;
pub use process::{ProcState, Process, RequestOutcome};
pub use token::{Token, TokenCell, TokenQueue};
