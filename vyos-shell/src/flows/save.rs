use log::info;

use crate::actions::{SystemActions, prepare_action_map};
use crate::error::Result;
use crate::handler::CliHandler;

/// Save the running configuration to a file.
pub struct SaveFlow {
    handler: CliHandler,
}

impl SaveFlow {
    pub fn new(handler: CliHandler) -> Self {
        Self { handler }
    }

    /// Save `configuration_type` to `folder_path`, a full destination path.
    pub async fn execute(&self, folder_path: &str, configuration_type: &str) -> Result<()> {
        let mut session = self.handler.config_session().await?;
        let action_map = prepare_action_map(configuration_type, folder_path)?;

        SystemActions::new(&mut session)
            .save(folder_path, &action_map, None, None)
            .await?;
        info!("configuration saved to {}", folder_path);
        Ok(())
    }
}
