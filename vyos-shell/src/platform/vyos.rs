//! VyOS platform definition.
//!
//! # Prompt Examples
//!
//! ```text
//! vyos@vyos:~$              # default (operational) mode
//! [edit]
//! vyos@vyos#                # configuration mode
//! ```
//!
//! # Mode Graph
//!
//! ```text
//! ┌─────────┐  configure   ┌────────┐
//! │ default ├──────────────► config │
//! │    $    │     exit     │   #    │
//! └─────────┘◄─────────────┴────────┘
//! ```

use crate::error::{PlatformError, Result};
use crate::platform::{CommandMode, ModeGraph};

/// Name of the operational mode.
pub const DEFAULT_MODE: &str = "default";

/// Name of the configuration mode.
pub const CONFIG_MODE: &str = "config";

/// Build the VyOS command mode tree.
pub fn mode_graph() -> Result<ModeGraph> {
    let invalid = |e: regex::Error| PlatformError::InvalidDefinition {
        message: e.to_string(),
    };

    let default = CommandMode::new(DEFAULT_MODE, r"\$")
        .map_err(invalid)?
        .with_exit("\x03");

    let config = CommandMode::new(CONFIG_MODE, r"#")
        .map_err(invalid)?
        .with_parent(DEFAULT_MODE)
        .with_enter("configure")
        .with_exit("exit");

    ModeGraph::new([default, config])
}
