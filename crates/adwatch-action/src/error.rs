/// Errors raised by alert actions.
///
/// # Examples
///
/// ```rust
/// use adwatch_action::error::ActionError;
///
/// let err = ActionError::UnknownActionClass("Pager".to_string());
/// assert!(err.to_string().contains("Pager"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// No action is registered under this class name.
    #[error("Action: unknown action class '{0}'")]
    UnknownActionClass(String),

    /// The action's configuration object is missing keys or has bad values.
    #[error("Action: invalid configuration for {action}: {reason}")]
    InvalidConfig { action: String, reason: String },

    /// `process_row` or `finalize` was called on an action that is not open.
    #[error("Action: {0} used before initialize")]
    NotInitialized(String),

    #[error("Action: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Action: database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Action: email error: {0}")]
    Email(String),
}

impl ActionError {
    pub fn invalid_config(action: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidConfig {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<lettre::error::Error> for ActionError {
    fn from(e: lettre::error::Error) -> Self {
        Self::Email(e.to_string())
    }
}

impl From<lettre::address::AddressError> for ActionError {
    fn from(e: lettre::address::AddressError) -> Self {
        Self::Email(e.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for ActionError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        Self::Email(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;
