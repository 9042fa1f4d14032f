//! Device operations built on command templates.

mod system;
mod url;

pub use system::{LOAD_TIMEOUT, SAVE_TIMEOUT, SystemActions, prepare_action_map};
pub use url::TransferUrl;
