//! Driver entry points called by the orchestration platform.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::channel::SessionFactory;
use crate::config::{ResourceConfig, ResourceContext, SHELL_NAME};
use crate::error::Result;
use crate::handler::{CliHandler, SessionPool};
use crate::models::AutoloadDetails;
use crate::platform::{ModeGraph, vyos};
use crate::retry::RetryPolicy;
use crate::runner::{AutoloadRunner, ConfigurationRunner};
use crate::transport::SshSessionFactory;

/// Tunables not carried by resource attributes.
#[derive(Debug, Clone, Copy)]
pub struct DriverOptions {
    /// Default timeout for a command to return its prompt.
    pub command_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Shell driver for a deployed VyOS VM.
///
/// # Example
///
/// ```rust,no_run
/// use vyos_shell::{ResourceContext, VyosDriver};
///
/// # async fn example(context: ResourceContext) -> Result<(), vyos_shell::Error> {
/// let driver = VyosDriver::initialize(&context)?;
/// let details = driver.get_inventory(&context).await?;
/// for port in &details.resources {
///     println!("{} {}", port.relative_address, port.name);
/// }
/// driver.cleanup().await;
/// # Ok(())
/// # }
/// ```
pub struct VyosDriver {
    connector: Connector,
    graph: Arc<ModeGraph>,
    // Pool for the connection attributes of the latest call
    pool: Mutex<Option<(ConnectionKey, Arc<SessionPool>)>>,
    options: DriverOptions,
    // Restore and inventory change device state and must not overlap
    lock: Mutex<()>,
}

/// Builds the session source for a resource's connection attributes.
type Connector = Box<dyn Fn(&ResourceConfig) -> Result<Arc<dyn SessionFactory>> + Send + Sync>;

/// Connection attributes a pool is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConnectionKey {
    address: String,
    port: u16,
    user: Option<String>,
    password_digest: Option<Vec<u8>>,
    limit: usize,
}

impl ConnectionKey {
    fn new(config: &ResourceConfig) -> Self {
        Self {
            address: config.address.clone(),
            port: config.cli_tcp_port,
            user: config.user.clone(),
            password_digest: config
                .password
                .as_ref()
                .map(|p| Sha256::digest(p.expose_secret().as_bytes()).to_vec()),
            limit: config.sessions_concurrency_limit,
        }
    }
}

impl VyosDriver {
    /// Build the driver for the resource in `context` with default options.
    pub fn initialize(context: &ResourceContext) -> Result<Self> {
        Self::initialize_with(context, DriverOptions::default())
    }

    /// Build the SSH driver, validating the connection attributes in `context`.
    ///
    /// Each later call connects with the attributes of its own context.
    pub fn initialize_with(context: &ResourceContext, options: DriverOptions) -> Result<Self> {
        let config = ResourceConfig::from_context(context, SHELL_NAME)?;
        config.ssh_config(options.command_timeout)?;

        let timeout = options.command_timeout;
        let driver = Self::with_connector(
            move |config: &ResourceConfig| -> Result<Arc<dyn SessionFactory>> {
                Ok(Arc::new(SshSessionFactory::new(config.ssh_config(timeout)?)))
            },
            options,
        )?;
        info!(
            "initialized driver for {} ({} concurrent sessions)",
            config.address, config.sessions_concurrency_limit
        );
        Ok(driver)
    }

    /// Build the driver over one fixed session source.
    pub fn with_factory(factory: Arc<dyn SessionFactory>, options: DriverOptions) -> Result<Self> {
        Self::with_connector(
            move |_: &ResourceConfig| -> Result<Arc<dyn SessionFactory>> { Ok(factory.clone()) },
            options,
        )
    }

    /// Build the driver over a session source derived from each call's
    /// resource attributes.
    pub fn with_connector<F>(connector: F, options: DriverOptions) -> Result<Self>
    where
        F: Fn(&ResourceConfig) -> Result<Arc<dyn SessionFactory>> + Send + Sync + 'static,
    {
        Ok(Self {
            connector: Box::new(connector),
            graph: Arc::new(vyos::mode_graph()?),
            pool: Mutex::new(None),
            options,
            lock: Mutex::new(()),
        })
    }

    /// Handler over the pool for `config`'s connection attributes.
    ///
    /// The pool is rebuilt when they differ from the previous call's.
    async fn handler(&self, config: &ResourceConfig) -> Result<CliHandler> {
        let key = ConnectionKey::new(config);
        let mut current = self.pool.lock().await;
        if let Some((bound, pool)) = current.as_ref() {
            if *bound == key {
                return Ok(CliHandler::new(pool.clone()));
            }
        }

        let pool = Arc::new(SessionPool::new(
            (self.connector)(config)?,
            self.graph.clone(),
            config.sessions_concurrency_limit,
            self.options.command_timeout,
        ));
        if let Some((previous, stale)) = current.replace((key, pool.clone())) {
            info!(
                "connection attributes changed, closing sessions to {}:{}",
                previous.address, previous.port
            );
            stale.close_idle().await;
        }
        Ok(CliHandler::new(pool))
    }

    fn config(context: &ResourceContext) -> Result<Arc<ResourceConfig>> {
        ResourceConfig::from_context(context, SHELL_NAME).map(Arc::new)
    }

    /// Discover the VM's ports, restoring `Configuration File` first if set.
    pub async fn get_inventory(&self, context: &ResourceContext) -> Result<AutoloadDetails> {
        let _guard = self.lock.lock().await;
        info!("autoload started");
        log_outcome("autoload", self.inventory(context).await)
    }

    async fn inventory(&self, context: &ResourceContext) -> Result<AutoloadDetails> {
        let config = Self::config(context)?;
        let handler = self.handler(&config).await?;

        if let Some(path) = config.config_file.as_deref() {
            info!("loading configuration file {}", path);
            ConfigurationRunner::new(handler.clone(), config.clone(), self.options.retry)
                .restore(path, None)
                .await?;
            info!("configuration file loaded");
        }

        AutoloadRunner::new(handler, config, self.options.retry)
            .discover()
            .await
    }

    /// Save the configuration under `folder_path`; returns the file name.
    pub async fn save(
        &self,
        context: &ResourceContext,
        folder_path: &str,
        configuration_type: Option<&str>,
    ) -> Result<String> {
        info!("save started");
        log_outcome("save", self.save_with(context, folder_path, configuration_type).await)
    }

    async fn save_with(
        &self,
        context: &ResourceContext,
        folder_path: &str,
        configuration_type: Option<&str>,
    ) -> Result<String> {
        let config = Self::config(context)?;
        let handler = self.handler(&config).await?;
        ConfigurationRunner::new(handler, config, self.options.retry)
            .save(folder_path, configuration_type)
            .await
    }

    /// Restore the configuration from `path`.
    pub async fn restore(
        &self,
        context: &ResourceContext,
        path: &str,
        configuration_type: Option<&str>,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        info!("restore started");
        log_outcome("restore", self.restore_with(context, path, configuration_type).await)
    }

    async fn restore_with(
        &self,
        context: &ResourceContext,
        path: &str,
        configuration_type: Option<&str>,
    ) -> Result<()> {
        let config = Self::config(context)?;
        let handler = self.handler(&config).await?;
        ConfigurationRunner::new(handler, config, self.options.retry)
            .restore(path, configuration_type)
            .await
    }

    /// Close idle sessions.
    pub async fn cleanup(&self) {
        if let Some((_, pool)) = self.pool.lock().await.as_ref() {
            pool.close_idle().await;
        }
    }
}

fn log_outcome<T>(operation: &str, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => info!("{} completed", operation),
        Err(e) => error!("{} failed: {}", operation, e),
    }
    result
}
