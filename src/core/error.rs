//! Position error types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure category reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionErrorKind {
    /// The user or platform refused access to location
    PermissionDenied,
    /// No fix could be acquired
    PositionUnavailable,
    /// The configured timeout elapsed before a fix arrived
    Timeout,
    /// Any failure the platform does not classify
    Unknown,
}

impl PositionErrorKind {
    /// Numeric code as used by platform geolocation APIs
    pub fn code(&self) -> u16 {
        match self {
            PositionErrorKind::PermissionDenied => 1,
            PositionErrorKind::PositionUnavailable => 2,
            PositionErrorKind::Timeout => 3,
            PositionErrorKind::Unknown => 0,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            1 => PositionErrorKind::PermissionDenied,
            2 => PositionErrorKind::PositionUnavailable,
            3 => PositionErrorKind::Timeout,
            _ => PositionErrorKind::Unknown,
        }
    }
}

impl fmt::Display for PositionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PositionErrorKind::PermissionDenied => "permission denied",
            PositionErrorKind::PositionUnavailable => "position unavailable",
            PositionErrorKind::Timeout => "timeout",
            PositionErrorKind::Unknown => "unknown error",
        };
        f.write_str(name)
    }
}

/// Error reported by the platform for a fix request or a watch
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} (code {code}): {message}", code = .kind.code())]
pub struct PositionError {
    pub kind: PositionErrorKind,
    pub message: String,
}

impl PositionError {
    pub fn new(kind: PositionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(PositionErrorKind::PermissionDenied, message)
    }

    pub fn position_unavailable(message: impl Into<String>) -> Self {
        Self::new(PositionErrorKind::PositionUnavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PositionErrorKind::Timeout, message)
    }
}

/// Failure of a one-shot fix request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FindError {
    /// The platform has no geolocation capability at all
    #[error("Geolocation is not supported on this platform")]
    CapabilityAbsent,

    #[error(transparent)]
    Position(#[from] PositionError),

    /// The provider dropped the request without answering it
    #[error("Geolocation provider abandoned the fix request")]
    Abandoned,
}

impl FindError {
    /// Kind of the underlying platform error, if the platform answered
    pub fn position_error_kind(&self) -> Option<PositionErrorKind> {
        match self {
            FindError::Position(error) => Some(error.kind),
            _ => None,
        }
    }
}
