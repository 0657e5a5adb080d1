//! Error Types
//!
//! Two families of errors exist in the engine:
//!
//! - [`ReactiveError`]: misuse of the reactive primitives (for example calling
//!   `on_cleanup` while no computation is running).
//! - [`RenderError`]: anything that aborts a render, most importantly a
//!   component failing synchronously while the tree is being expanded.

use thiserror::Error;

/// Misuse of the reactive primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// An operation that needs an active computation was called outside one.
    #[error("`{operation}` called outside of an active computation")]
    NoActiveComputation {
        /// The name of the operation that was attempted.
        operation: &'static str,
    },
}

/// An error that aborts rendering, either on the client or the server.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// A component failed while producing its output.
    #[error("component `{component}` failed: {message}")]
    Component {
        /// Name of the failing component.
        component: String,
        /// Human readable description of the failure.
        message: String,
    },

    /// A reactive primitive was misused during rendering.
    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    /// A structural DOM operation was invalid.
    #[error("dom error: {0}")]
    Dom(String),

    /// A computation panicked while the scheduler was flushing it.
    #[error("computation panicked: {0}")]
    Panicked(String),

    /// Render options could not be parsed.
    #[error("invalid render options: {0}")]
    Config(String),
}

impl RenderError {
    /// Shorthand for a component failure.
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// The human readable part of the error, without the component prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Component { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
