use thiserror::Error;
use uuid::Uuid;

/// Main error type for the cyclewise engine
#[derive(Error, Debug)]
pub enum CoachError {
    #[error("Check-in is missing required field: {field}")]
    IncompleteState { field: String },

    #[error("No applicable action for state: {state}")]
    NoApplicableAction { state: String },

    #[error("Recommendation {id} is unknown or already resolved")]
    UnknownOrResolvedRecommendation { id: Uuid },

    #[error("Unknown user: {user_id}")]
    UnknownUser { user_id: String },

    #[error("Storage failure: {message}")]
    Storage { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl CoachError {
    /// Create a new incomplete state error for a missing or out-of-range field
    pub fn incomplete_state(field: impl Into<String>) -> Self {
        Self::IncompleteState {
            field: field.into(),
        }
    }

    /// Create a new no-applicable-action error
    pub fn no_applicable_action(state: impl Into<String>) -> Self {
        Self::NoApplicableAction {
            state: state.into(),
        }
    }

    /// Create a new unknown-or-resolved recommendation error
    pub fn unknown_recommendation(id: Uuid) -> Self {
        Self::UnknownOrResolvedRecommendation { id }
    }

    /// Create a new unknown user error
    pub fn unknown_user(user_id: impl Into<String>) -> Self {
        Self::UnknownUser {
            user_id: user_id.into(),
        }
    }

    /// Create a new storage failure error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for CoachError {
    fn from(error: rusqlite::Error) -> Self {
        CoachError::storage(error.to_string())
    }
}

impl From<serde_json::Error> for CoachError {
    fn from(error: serde_json::Error) -> Self {
        CoachError::storage(error.to_string())
    }
}

impl From<toml::de::Error> for CoachError {
    fn from(error: toml::de::Error) -> Self {
        CoachError::invalid_config(error.to_string())
    }
}

/// Result type alias using CoachError
pub type Result<T> = std::result::Result<T, CoachError>;
