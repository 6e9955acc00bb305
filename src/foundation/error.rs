use std::{backtrace::Backtrace, fmt};

/// Convenience result type used across framechain.
pub type ChainResult<T> = Result<T, ChainError>;

/// Alias keeping `thiserror` from treating these fields as nightly-only `provide` backtraces.
type CapturedBacktrace = Backtrace;

/// Top-level error taxonomy used by graph, chain and cache APIs.
///
/// Every variant keeps a backtrace: string variants capture one when built, wrapped errors carry
/// the one captured by their source.
#[derive(thiserror::Error, Debug)]
pub enum ChainError {
    /// Malformed graph or chain input (unknown node, bad parameters, bad config).
    #[error("validation error: {message}")]
    Validation {
        /// What was rejected.
        message: String,
        /// Where the error was raised.
        backtrace: CapturedBacktrace,
    },

    /// A core invariant was violated by the caller (render before initialize, use after dispose).
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Which invariant was violated.
        message: String,
        /// Where the error was raised.
        backtrace: CapturedBacktrace,
    },

    /// An artifact compile function failed; `key` is the cache signature of the request.
    #[error("Compilation Error in {key}\n\n{source}")]
    Compile {
        /// Cache signature of the failed request.
        key: String,
        /// Failure reported by the compiler.
        #[source]
        source: anyhow::Error,
    },

    /// A filter transformation failed while rendering a frame.
    #[error("render error in {filter}: {source}")]
    Render {
        /// Type name of the failing filter.
        filter: String,
        /// Failure reported by the filter.
        #[source]
        source: anyhow::Error,
    },

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {message}")]
    Serde {
        /// Parser or serializer message.
        message: String,
        /// Where the error was raised.
        backtrace: CapturedBacktrace,
    },

    /// Local file access failures.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
        /// Where the error was converted.
        backtrace: CapturedBacktrace,
    },

    /// Wrapped lower-level error from collaborators.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ChainError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            backtrace: Backtrace::capture(),
        }
    }
}

impl ChainError {
    /// Build a [`ChainError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Build a [`ChainError::InvalidOperation`] value.
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: msg.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Build a [`ChainError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde {
            message: msg.into(),
            backtrace: Backtrace::capture(),
        }
    }

    /// Build a [`ChainError::Compile`] value for the request signed `key`.
    pub fn compile(key: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Compile {
            key: key.into(),
            source,
        }
    }

    /// Build a [`ChainError::Render`] value for the filter named `filter`.
    pub fn render(filter: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Render {
            filter: filter.into(),
            source,
        }
    }

    /// Type name of the filter that failed, for render failures.
    pub fn failing_filter(&self) -> Option<&str> {
        match self {
            Self::Render { filter, .. } => Some(filter),
            _ => None,
        }
    }

    /// Backtrace captured where the innermost failure was raised.
    pub fn trace(&self) -> &Backtrace {
        match self {
            Self::Validation { backtrace, .. }
            | Self::InvalidOperation { backtrace, .. }
            | Self::Serde { backtrace, .. }
            | Self::Io { backtrace, .. } => backtrace,
            Self::Compile { source, .. } | Self::Render { source, .. } | Self::Other(source) => {
                source.backtrace()
            }
        }
    }
}

/// Human-readable failure description handed to the error reporter.
///
/// Always describes the innermost failure of the chain: its message and, when one was captured,
/// its backtrace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorReport {
    /// Type name the failure is attributed to.
    pub type_name: String,
    /// Message of the innermost failure.
    pub message: String,
    /// Backtrace of the innermost failure.
    pub trace: String,
}

impl ErrorReport {
    /// Build a report for `err`, attributing it to the failing filter when known and to
    /// `fallback_type` otherwise.
    pub fn new(fallback_type: &str, err: &ChainError) -> Self {
        let type_name = err.failing_filter().unwrap_or(fallback_type).to_string();
        let message = match err {
            ChainError::Render { source, .. } | ChainError::Other(source) => {
                source.root_cause().to_string()
            }
            ChainError::Compile { key, source } => {
                format!("Compilation Error in {key}\n\n{}", source.root_cause())
            }
            other => innermost(other).to_string(),
        };
        Self {
            type_name,
            message,
            trace: err.trace().to_string(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error in {}:\n\n{}\n\n~\nStack Trace:\n{}",
            self.type_name, self.message, self.trace
        )
    }
}

type DynError = dyn std::error::Error + 'static;

fn innermost(err: &DynError) -> &DynError {
    let mut cur = err;
    while let Some(next) = cur.source() {
        cur = next;
    }
    cur
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
