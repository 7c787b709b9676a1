//! Outcome of running one action or a chain of actions.
use std::fmt;
use std::ops::AddAssign;
use std::time::Duration;

use serde_json::Value;

use crate::logging::Log;

/// Severity of an action message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Detail only shown with `--verbose` (always written to the log file).
    Debug,
    /// Normal progress.
    Info,
    /// Something went wrong but the action still succeeded.
    Warning,
    /// The action failed.
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A message produced by an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Severity.
    pub level: Level,
    /// Message text.
    pub text: String,
    /// Module that produced the message.
    pub source: String,
}

/// What an action reports back: whether the chain may continue, the messages
/// it produced, an optional value, and the time it took.
///
/// Results of a chain are combined with `+=`: messages concatenate, elapsed
/// times add up, the chain stays `ok` only while every step is, and the last
/// value returned wins.
#[derive(Debug, Clone, Default)]
pub struct ActionResult {
    /// Whether the next action in the chain should run.
    pub ok: bool,
    /// Messages in the order they were produced.
    pub messages: Vec<Message>,
    /// Data returned by the action (`None` when nothing flowed back).
    pub value: Option<Value>,
    /// Wall-clock time spent.
    pub elapsed: Duration,
    source: String,
}

impl ActionResult {
    /// A result for `source` that has not succeeded yet.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// A successful, empty result for `source`; the seed of a chain.
    #[must_use]
    pub fn success(source: impl Into<String>) -> Self {
        Self {
            ok: true,
            ..Self::new(source)
        }
    }

    /// Module that produced this result.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    fn push(&mut self, level: Level, text: impl Into<String>) -> &mut Self {
        self.messages.push(Message {
            level,
            text: text.into(),
            source: self.source.clone(),
        });
        self
    }

    /// Add a debug message.
    pub fn debug(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(Level::Debug, text)
    }

    /// Add an informational message.
    pub fn info(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(Level::Info, text)
    }

    /// Add a warning.
    pub fn warning(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(Level::Warning, text)
    }

    /// Add an error and mark the result as not ok.
    pub fn error(&mut self, text: impl Into<String>) -> &mut Self {
        self.ok = false;
        self.push(Level::Error, text)
    }

    /// Mark the result as ok.
    pub fn succeed(&mut self) -> &mut Self {
        self.ok = true;
        self
    }

    /// Move the result out, leaving an empty one behind.
    #[must_use]
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Whether any error was recorded.
    ///
    /// A result can be not `ok` without errors: a condition that was not met
    /// stops the chain but is not a failure.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.messages.iter().any(|m| m.level == Level::Error)
    }

    /// Text of the first error, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.level == Level::Error)
            .map(|m| m.text.as_str())
    }

    /// Send every message to `log` at its own level, prefixed by its source.
    pub fn replay(&self, log: &dyn Log) {
        for message in &self.messages {
            let line = if message.source.is_empty() {
                message.text.clone()
            } else {
                format!("{}: {}", message.source, message.text)
            };
            match message.level {
                Level::Debug => log.debug(&line),
                Level::Info => log.info(&line),
                Level::Warning => log.warn(&line),
                Level::Error => log.error(&line),
            }
        }
    }
}

impl AddAssign for ActionResult {
    fn add_assign(&mut self, other: Self) {
        self.ok = self.ok && other.ok;
        self.messages.extend(other.messages);
        self.elapsed += other.elapsed;
        if other.value.is_some() {
            self.value = other.value;
        }
    }
}
