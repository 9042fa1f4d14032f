//! Executes one command template against a live session.
//!
//! Output is scanned as it arrives, in priority order:
//! 1. the error map (a match fails the command immediately),
//! 2. the action map (a match sends the mapped response and keeps reading),
//! 3. the prompt of the current mode (a match completes the command).

use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use tokio::time::Instant;

use super::action_map::ActionMap;
use super::response::Response;
use super::template::{CommandTemplate, ErrorMap};
use crate::channel::{CliSession, PatternBuffer, normalize_output};
use crate::error::{ChannelError, DriverError, Error, Result};
use crate::handler::ScopedSession;

/// How many times an action combination may repeat back to back.
const MAX_LOOPS: usize = 3;

/// Longest action combination checked for repetition.
const MAX_COMBINATION_LENGTH: usize = 4;

/// Detects the same prompt/response exchange repeating without progress.
#[derive(Debug)]
pub struct ActionLoopDetector {
    history: Vec<usize>,
    max_loops: usize,
    max_combination_length: usize,
}

impl ActionLoopDetector {
    pub fn new(max_loops: usize, max_combination_length: usize) -> Self {
        Self {
            history: Vec::new(),
            max_loops,
            max_combination_length,
        }
    }

    /// Record a fired action; true when a loop is detected.
    pub fn record(&mut self, action: usize) -> bool {
        self.history.push(action);
        (1..=self.max_combination_length).any(|len| self.repeats(len))
    }

    /// Whether the last `max_loops` windows of `len` actions are identical.
    fn repeats(&self, len: usize) -> bool {
        let needed = len * self.max_loops;
        if self.history.len() < needed {
            return false;
        }
        let tail = &self.history[self.history.len() - needed..];
        let first = &tail[..len];
        tail.chunks(len).all(|window| window == first)
    }
}

impl Default for ActionLoopDetector {
    fn default() -> Self {
        Self::new(MAX_LOOPS, MAX_COMBINATION_LENGTH)
    }
}

/// One execution of a [`CommandTemplate`].
///
/// # Example
///
/// ```rust,no_run
/// # use vyos_shell::command::{ActionMap, CommandTemplate, CommandTemplateExecutor, ErrorMap};
/// # use vyos_shell::handler::ScopedSession;
/// # async fn example(session: &mut ScopedSession) -> Result<(), Box<dyn std::error::Error>> {
/// let template = CommandTemplate::new("load {source_file_path}", ErrorMap::new());
/// let actions = ActionMap::new().with_hidden_response(r"[Pp]assword:", "secret")?;
/// let response = CommandTemplateExecutor::new(session, &template)
///     .action_map(&actions)
///     .timeout(std::time::Duration::from_secs(300))
///     .check_action_loop(false)
///     .execute(&[("source_file_path", "scp://vyos@10.0.0.1/config.boot")])
///     .await?;
/// println!("{}", response.result);
/// # Ok(())
/// # }
/// ```
pub struct CommandTemplateExecutor<'a> {
    session: &'a mut ScopedSession,
    template: &'a CommandTemplate,
    action_map: Option<&'a ActionMap>,
    error_map: Option<&'a ErrorMap>,
    timeout: Option<Duration>,
    check_action_loop: bool,
}

impl<'a> CommandTemplateExecutor<'a> {
    pub fn new(session: &'a mut ScopedSession, template: &'a CommandTemplate) -> Self {
        Self {
            session,
            template,
            action_map: None,
            error_map: None,
            timeout: None,
            check_action_loop: true,
        }
    }

    /// Prompts to answer while the command runs.
    pub fn action_map(mut self, action_map: &'a ActionMap) -> Self {
        self.action_map = Some(action_map);
        self
    }

    /// Extra error patterns, checked before the template's own.
    pub fn error_map(mut self, error_map: &'a ErrorMap) -> Self {
        self.error_map = Some(error_map);
        self
    }

    /// Override the session's default timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable or disable the action loop detector (enabled by default).
    pub fn check_action_loop(mut self, enabled: bool) -> Self {
        self.check_action_loop = enabled;
        self
    }

    /// Format the template with `params`, send it and wait for completion.
    pub async fn execute(self, params: &[(&str, &str)]) -> Result<Response> {
        let command = self.template.format(params)?;

        let error_map = self
            .error_map
            .cloned()
            .unwrap_or_default()
            .merged(self.template.error_map())
            .merged(ErrorMap::defaults());
        let empty = ActionMap::new();
        let action_map = self.action_map.unwrap_or(&empty);
        let timeout = self.timeout.unwrap_or(self.session.timeout());
        let check_action_loop = self.check_action_loop;

        let session = self.session;
        let prompt = session.mode()?.prompt.clone();

        debug!(
            "executing {:?} in mode '{}' (timeout {:?})",
            command,
            session.mode_name(),
            timeout
        );

        let start = std::time::Instant::now();
        let mut exchange = Exchange {
            command: &command,
            prompt: &prompt,
            error_map: &error_map,
            action_map,
            detector: check_action_loop.then(ActionLoopDetector::default),
            buffer: PatternBuffer::default(),
            actions_fired: 0,
        };

        if let Err(e) = exchange.run(session.cli()?, timeout).await {
            if matches!(
                e,
                Error::Channel(_)
                    | Error::Transport(_)
                    | Error::Driver(DriverError::ActionLoop { .. })
            ) {
                // Device state is unknown, do not hand this session out again
                session.mark_broken();
            }
            debug!("{:?} failed: {}", command, e);
            return Err(e);
        }

        let actions_fired = exchange.actions_fired;
        let buffer = exchange.buffer;
        let raw_result = buffer.as_str_lossy().into_owned();
        let result = normalize_output(&raw_result, &command);
        let elapsed = start.elapsed();
        debug!("{:?} completed in {:?}", command, elapsed);

        Ok(Response {
            command,
            result,
            raw_result,
            elapsed,
            actions_fired,
        })
    }
}

/// State of one command/response exchange.
struct Exchange<'a> {
    command: &'a str,
    prompt: &'a Regex,
    error_map: &'a ErrorMap,
    action_map: &'a ActionMap,
    detector: Option<ActionLoopDetector>,
    buffer: PatternBuffer,
    actions_fired: usize,
}

impl Exchange<'_> {
    async fn run(&mut self, cli: &mut dyn CliSession, timeout: Duration) -> Result<()> {
        cli.send_line(self.command).await?;

        let mut deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ChannelError::PatternTimeout(timeout).into());
            }

            let chunk = cli
                .read_chunk(remaining)
                .await?
                .ok_or(ChannelError::PatternTimeout(timeout))?;
            trace!("{:?}: {} bytes", self.command, chunk.len());
            self.buffer.extend(&chunk);

            if let Some(reason) = self.error_map.find(self.buffer.as_slice()) {
                return Err(DriverError::CommandFailed {
                    command: self.command.to_string(),
                    reason: reason.to_string(),
                }
                .into());
            }

            while let Some(matched) = self.action_map.find(self.buffer.pending()) {
                if let Some(detector) = self.detector.as_mut() {
                    if detector.record(matched.index) {
                        return Err(DriverError::ActionLoop {
                            command: self.command.to_string(),
                        }
                        .into());
                    }
                }
                debug!(
                    "{:?}: prompt {:?} answered with {:?}",
                    self.command,
                    matched.action.pattern.as_str(),
                    matched.action.loggable_response()
                );
                let response = matched.action.response.clone();
                self.buffer.consume_pending(matched.end);
                cli.send_line(&response).await?;
                self.actions_fired += 1;
                // Each answered prompt restarts the timeout
                deadline = Instant::now() + timeout;
            }

            // Only a prompt printed after the last answered action ends the command
            if self.buffer.pending_contains(self.prompt) {
                return Ok(());
            }
        }
    }
}
