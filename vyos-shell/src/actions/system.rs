//! Configuration file operations: `load`, `save`, `commit`.

use std::borrow::Cow;
use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, error};
use regex::Regex;
use secrecy::ExposeSecret;

use super::url::TransferUrl;
use crate::command::{Action, ActionMap, CommandTemplate, CommandTemplateExecutor, ErrorMap};
use crate::error::{ChannelError, DriverError, Result};
use crate::handler::ScopedSession;

/// Default timeout for `save`.
pub const SAVE_TIMEOUT: Duration = Duration::from_secs(180);

/// Default timeout for `load`.
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(300);

static SAVE_CONFIGURATION: LazyLock<CommandTemplate> = LazyLock::new(|| {
    CommandTemplate::new(
        "save {destination_file_path}",
        ErrorMap::new()
            .with("[Ee]rror saving", "Failed to save configuration file")
            .expect("save error pattern is valid"),
    )
});

static LOAD_CONFIGURATION: LazyLock<CommandTemplate> = LazyLock::new(|| {
    CommandTemplate::new(
        "load {source_file_path}",
        ErrorMap::new()
            .with(
                "[Cc]an ?not open",
                "Unable to open remote configuration file. \
                 Please check that config file link is correct",
            )
            .expect("load error pattern is valid"),
    )
});

static COMMIT: LazyLock<CommandTemplate> =
    LazyLock::new(|| CommandTemplate::new("commit", ErrorMap::new()));

static SHOW_INTERFACES: LazyLock<CommandTemplate> =
    LazyLock::new(|| CommandTemplate::new("show interfaces", ErrorMap::new()));

static FAILURE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)error|failed|can(not|'t| not) open").expect("failure marker is valid")
});

static DONE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)done").expect("done marker is valid"));

/// A quoted file name, as in `Saving configuration to '/config/x.boot'...`.
/// The quote must follow whitespace so `can't` is left alone.
static QUOTED_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)'[^'\r\n]*'").expect("quoted path pattern is valid"));

/// Build the prompt answers for a transfer from `source` to `destination`.
///
/// The device asks differently depending on direction, so the remote end
/// decides which URL supplies the password:
/// - remote destination (`save scp://...`): the destination
/// - local destination (`load scp://...`): the source
///
/// Entries, in priority order:
/// - confirmations quoting either filename in brackets or parentheses,
///   answered with an empty line
/// - `[Pp]assword:` answered with the password, if the URL carries one
/// - any mention of the remote host not followed by `/` (host key
///   confirmation), answered with an empty line
pub fn prepare_action_map(source: &str, destination: &str) -> Result<ActionMap> {
    let src = TransferUrl::parse(source)?;
    let dst = TransferUrl::parse(destination)?;

    let (relevant, other) = if dst.is_remote() {
        (&dst, &src)
    } else {
        (&src, &dst)
    };

    let mut filename_patterns = Vec::with_capacity(2);
    if !dst.filename.is_empty() {
        let name = regex::escape(&dst.filename);
        filename_patterns.push(if dst.is_remote() {
            format!(r"[\[\(].*{}[\)\]]", name)
        } else {
            format!(r"[\[\(]{}[\)\]]", name)
        });
    }
    if !src.filename.is_empty() {
        filename_patterns.push(format!(r"[\[\(]{}[\)\]]", regex::escape(&src.filename)));
    }

    let mut action_map = ActionMap::new();
    for pattern in filename_patterns {
        action_map.insert(&pattern, Action::new(&pattern, "").map_err(ChannelError::from)?);
    }

    if let Some(password) = &relevant.password {
        let pattern = "[Pp]assword:";
        action_map.insert(
            pattern,
            Action::hidden(pattern, password.expose_secret()).map_err(ChannelError::from)?,
        );
    }

    if let Some(host) = relevant.host.as_ref().or(other.host.as_ref()) {
        let pattern = format!("{}[^/:]", regex::escape(host));
        action_map.insert(&pattern, Action::new(&pattern, "").map_err(ChannelError::from)?);
    }

    debug!(
        "action map for {:?} -> {:?}: {:?}",
        source,
        destination,
        action_map.patterns().collect::<Vec<_>>()
    );
    Ok(action_map)
}

/// Configuration file operations on a session in configuration mode.
pub struct SystemActions<'a> {
    session: &'a mut ScopedSession,
}

impl<'a> SystemActions<'a> {
    pub fn new(session: &'a mut ScopedSession) -> Self {
        Self { session }
    }

    /// Replace the candidate configuration with the file at `path`.
    ///
    /// Nothing is applied until [`commit`](Self::commit). Transfers print
    /// progress markers repeatedly, so loop detection is off.
    pub async fn load(
        &mut self,
        path: &str,
        action_map: &ActionMap,
        error_map: Option<&ErrorMap>,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let mut executor = CommandTemplateExecutor::new(self.session, &LOAD_CONFIGURATION)
            .action_map(action_map)
            .timeout(timeout.unwrap_or(LOAD_TIMEOUT))
            .check_action_loop(false);
        if let Some(error_map) = error_map {
            executor = executor.error_map(error_map);
        }
        let response = executor.execute(&[("source_file_path", path)]).await?;

        check_failure_markers(&response.command, &response.result)?;
        Ok(response.result)
    }

    /// Write the running configuration to `destination`.
    ///
    /// An empty destination saves to the device's boot configuration.
    /// Succeeds only if the device reports `done` and no failure marker.
    pub async fn save(
        &mut self,
        destination: &str,
        action_map: &ActionMap,
        error_map: Option<&ErrorMap>,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let mut executor = CommandTemplateExecutor::new(self.session, &SAVE_CONFIGURATION)
            .action_map(action_map)
            .timeout(timeout.unwrap_or(SAVE_TIMEOUT));
        if let Some(error_map) = error_map {
            executor = executor.error_map(error_map);
        }
        let response = executor
            .execute(&[("destination_file_path", destination)])
            .await?;

        check_failure_markers(&response.command, &response.result)?;
        if !DONE_MARKER.is_match(&without_quoted_paths(&response.result)) {
            error!("{:?} gave no completion marker:\n{}", response.command, response.result);
            return Err(DriverError::SilentFailure {
                command: response.command,
            }
            .into());
        }
        Ok(response.result)
    }

    /// Apply the candidate configuration.
    pub async fn commit(&mut self) -> Result<String> {
        let response = CommandTemplateExecutor::new(self.session, &COMMIT)
            .execute(&[])
            .await?;

        check_failure_markers(&response.command, &response.result)?;
        Ok(response.result)
    }

    /// The interface table printed by `show interfaces`.
    pub async fn show_interfaces(&mut self) -> Result<String> {
        let response = CommandTemplateExecutor::new(self.session, &SHOW_INTERFACES)
            .execute(&[])
            .await?;
        Ok(response.result)
    }
}

/// Fail when output reports an error the error map did not catch.
fn check_failure_markers(command: &str, output: &str) -> Result<()> {
    match FAILURE_MARKER.find(&without_quoted_paths(output)) {
        Some(m) => {
            error!("{:?} reported a failure:\n{}", command, output);
            Err(DriverError::CommandFailed {
                command: command.to_string(),
                reason: format!("output contains '{}', see logs for details", m.as_str()),
            }
            .into())
        }
        None => Ok(()),
    }
}

/// Output with quoted file names blanked, so a path never decides a verdict.
fn without_quoted_paths(output: &str) -> Cow<'_, str> {
    QUOTED_PATH.replace_all(output, "$1''")
}
