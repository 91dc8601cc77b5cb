use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Player-observable error taxonomy. Every variant carries the stable
/// `code()` string that crosses the wire in an `error` event; nothing here
/// is ever logged as a success path.
#[derive(Debug, Error)]
pub enum DuelError {
    #[error("authentication required")]
    AuthRequired,
    #[error("not authorized for this action")]
    Unauthorized,
    #[error("match not found")]
    MatchNotFound,
    #[error("match is not active")]
    MatchNotActive,
    #[error("match is not completed")]
    MatchNotCompleted,
    #[error("solution already submitted")]
    AlreadySubmitted,
    #[error("invalid match state for this action")]
    InvalidMatchState,
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("code exceeds maximum length")]
    CodeTooLong,
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("no charges remaining for this power-up")]
    NoPowerup,
    #[error("power-up on cooldown")]
    OnCooldown { remaining: Duration },
    #[error("power-up activation failed")]
    ActivationFailed,
    #[error("hint limit reached")]
    HintLimitReached,
    #[error("hint on cooldown")]
    HintOnCooldown { remaining: Duration },
    #[error("judging timed out")]
    JudgingTimeout,
    #[error("judging failed")]
    JudgingFailed,
    #[error("rate limited")]
    RateLimited,
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("ghost race not found")]
    RaceNotFound,
    #[error("ghost race is not active")]
    RaceNotActive,
    #[error("no ghost recording available for this challenge")]
    NoGhostAvailable,
}

impl DuelError {
    /// Stable machine-readable discriminant, matching §7's error-kind catalog.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::MatchNotFound => "MATCH_NOT_FOUND",
            Self::MatchNotActive => "MATCH_NOT_ACTIVE",
            Self::MatchNotCompleted => "MATCH_NOT_COMPLETED",
            Self::AlreadySubmitted => "ALREADY_SUBMITTED",
            Self::InvalidMatchState => "INVALID_MATCH_STATE",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::CodeTooLong => "CODE_TOO_LONG",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::NoPowerup => "NO_POWERUP",
            Self::OnCooldown { .. } => "ON_COOLDOWN",
            Self::ActivationFailed => "ACTIVATION_FAILED",
            Self::HintLimitReached => "HINT_LIMIT_REACHED",
            Self::HintOnCooldown { .. } => "HINT_ON_COOLDOWN",
            Self::JudgingTimeout => "JUDGING_TIMEOUT",
            Self::JudgingFailed => "JUDGING_FAILED",
            Self::RateLimited => "RATE_LIMITED",
            Self::ExecutionFailed(_) => "EXECUTION_FAILED",
            Self::RaceNotFound => "RACE_NOT_FOUND",
            Self::RaceNotActive => "RACE_NOT_ACTIVE",
            Self::NoGhostAvailable => "NO_GHOST_AVAILABLE",
        }
    }

    /// Render as the wire payload for an `error` server event.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.to_string(),
            cooldown_remaining_ms: match self {
                Self::OnCooldown { remaining } | Self::HintOnCooldown { remaining } => {
                    Some(remaining.as_millis() as u64)
                }
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_remaining_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_errors_carry_remaining_millis() {
        let err = DuelError::OnCooldown {
            remaining: Duration::from_secs(5),
        };
        let payload = err.to_payload();
        assert_eq!(payload.code, "ON_COOLDOWN");
        assert_eq!(payload.cooldown_remaining_ms, Some(5_000));
    }

    #[test]
    fn plain_errors_have_no_cooldown() {
        let err = DuelError::MatchNotFound;
        assert_eq!(err.to_payload().cooldown_remaining_ms, None);
    }
}
