//! User-facing operations, each run on one scoped session.

mod autoload;
mod restore;
mod save;

pub use autoload::{AutoloadFlow, parse_interfaces};
pub use restore::RestoreFlow;
pub use save::SaveFlow;
