use std::fmt;

use crate::error::ProbeError;

/// Status string persisted for a healthy verdict
pub const OK_STATUS: &str = "OK";

/// Outcome of one probe iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    /// Unhealthy, with a human-readable diagnostic
    Error(String),
}

impl Verdict {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Value written to the `status` column
    pub fn status(&self) -> &str {
        match self {
            Self::Ok => OK_STATUS,
            Self::Error(message) => message,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status())
    }
}

impl From<ProbeError> for Verdict {
    fn from(error: ProbeError) -> Self {
        Self::Error(error.to_string())
    }
}
