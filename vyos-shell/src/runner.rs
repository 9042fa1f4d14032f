//! Runners put flows under the retry policy and add naming conventions.

use std::sync::Arc;

use chrono::Local;
use log::info;

use crate::config::ResourceConfig;
use crate::error::{DriverError, Result};
use crate::flows::{AutoloadFlow, RestoreFlow, SaveFlow};
use crate::handler::CliHandler;
use crate::models::AutoloadDetails;
use crate::retry::{RetryPolicy, retry_on_session_failure};

/// Configuration type used when none is given.
pub const DEFAULT_CONFIGURATION_TYPE: &str = "running";

fn resolve_configuration_type(value: Option<&str>) -> Result<&str> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_CONFIGURATION_TYPE),
        Some(v) if v.eq_ignore_ascii_case("running") => Ok("running"),
        Some(v) if v.eq_ignore_ascii_case("startup") => Ok("startup"),
        Some(v) => Err(DriverError::InvalidArgument {
            message: format!("configuration type '{}' is not one of: running, startup", v),
        }
        .into()),
    }
}

/// Save and restore of configuration files.
pub struct ConfigurationRunner {
    config: Arc<ResourceConfig>,
    save_flow: SaveFlow,
    restore_flow: RestoreFlow,
    retry: RetryPolicy,
}

impl ConfigurationRunner {
    pub fn new(handler: CliHandler, config: Arc<ResourceConfig>, retry: RetryPolicy) -> Self {
        Self {
            config,
            save_flow: SaveFlow::new(handler.clone()),
            restore_flow: RestoreFlow::new(handler),
            retry,
        }
    }

    /// Save to a generated file under `folder_path` and return its name.
    ///
    /// The name is `<resource>-<configuration type>-<ddmmyy-HHMMSS>`.
    pub async fn save(
        &self,
        folder_path: &str,
        configuration_type: Option<&str>,
    ) -> Result<String> {
        let configuration_type = resolve_configuration_type(configuration_type)?;
        let file_name = format!(
            "{}-{}-{}",
            self.config.name.replace(' ', "_"),
            configuration_type,
            Local::now().format("%d%m%y-%H%M%S")
        );
        let destination = format!("{}/{}", folder_path.trim_end_matches('/'), file_name);
        info!("saving {} configuration to {}", configuration_type, destination);

        let flow = &self.save_flow;
        let destination = destination.as_str();
        retry_on_session_failure(self.retry, move || flow.execute(destination, configuration_type))
            .await?;
        Ok(file_name)
    }

    /// Restore the configuration from `path`.
    pub async fn restore(&self, path: &str, configuration_type: Option<&str>) -> Result<()> {
        let path = path.trim();
        if path.is_empty() {
            return Err(DriverError::InvalidArgument {
                message: "restore path is empty".into(),
            }
            .into());
        }
        let configuration_type = resolve_configuration_type(configuration_type)?;
        info!("restoring {} configuration from {}", configuration_type, path);

        let flow = &self.restore_flow;
        retry_on_session_failure(self.retry, move || flow.execute(path, configuration_type)).await
    }
}

/// Discovery of the resource structure.
pub struct AutoloadRunner {
    flow: AutoloadFlow,
    retry: RetryPolicy,
}

impl AutoloadRunner {
    pub fn new(handler: CliHandler, config: Arc<ResourceConfig>, retry: RetryPolicy) -> Self {
        Self {
            flow: AutoloadFlow::new(handler, config),
            retry,
        }
    }

    pub async fn discover(&self) -> Result<AutoloadDetails> {
        let flow = &self.flow;
        retry_on_session_failure(self.retry, move || flow.execute()).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::channel::mock::{CONFIG_PROMPT, MockFactory, MockSession};
    use crate::config::{ResourceContext, SHELL_NAME};
    use crate::error::Error;
    use crate::handler::SessionPool;
    use crate::platform::vyos;

    fn runner(factory: MockFactory) -> ConfigurationRunner {
        let pool = SessionPool::new(
            Arc::new(factory),
            Arc::new(vyos::mode_graph().unwrap()),
            1,
            Duration::from_secs(5),
        );
        let context = ResourceContext {
            name: "vyos 1".into(),
            ..Default::default()
        };
        ConfigurationRunner::new(
            CliHandler::new(Arc::new(pool)),
            Arc::new(ResourceConfig::from_context(&context, SHELL_NAME).unwrap()),
            RetryPolicy::new(Duration::from_secs(2), Duration::from_millis(10)),
        )
    }

    #[test]
    fn test_configuration_type() {
        assert_eq!(resolve_configuration_type(None).unwrap(), "running");
        assert_eq!(resolve_configuration_type(Some("")).unwrap(), "running");
        assert_eq!(resolve_configuration_type(Some("Startup")).unwrap(), "startup");
        assert!(resolve_configuration_type(Some("candidate")).is_err());
    }

    #[tokio::test]
    async fn test_restore_rejects_empty_path() {
        let err = runner(MockFactory::new()).restore(" ", None).await.unwrap_err();
        assert!(matches!(err, Error::Driver(DriverError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_save_retries_until_session_is_up() {
        let mock = MockSession::new(CONFIG_PROMPT);
        let sent = mock.sent();
        let factory = MockFactory::new().fail_once().fail_once().session(mock);
        let attempts = factory.attempts();
        let runner = runner(factory);

        // Nothing answers the save, so it times out once connected
        let err = runner.save("/config/", None).await.unwrap_err();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("save /config/vyos_1-running-"));
        assert!(matches!(err, Error::Channel(_)));
    }
}
