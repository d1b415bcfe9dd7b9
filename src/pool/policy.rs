//! Reset Policy
//!
//! What the pool does with a connection that failed its health check and
//! could not be reset.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

// == Reset Policy ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Hand the connection out anyway, flagged unhealthy. The next acquirer
    /// of the same connection retries the reset.
    ReturnAnyway,
    /// Close the connection and run with one connection fewer.
    DiscardAndShrink,
    /// Close the connection and open a fresh one in its place, shrinking
    /// only if that open fails too.
    #[default]
    DiscardAndReplace,
}

impl ResetPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetPolicy::ReturnAnyway => "return_anyway",
            ResetPolicy::DiscardAndShrink => "discard_and_shrink",
            ResetPolicy::DiscardAndReplace => "discard_and_replace",
        }
    }
}

impl fmt::Display for ResetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "return_anyway" => Ok(ResetPolicy::ReturnAnyway),
            "discard_and_shrink" => Ok(ResetPolicy::DiscardAndShrink),
            "discard_and_replace" => Ok(ResetPolicy::DiscardAndReplace),
            other => Err(format!("unknown reset policy '{}'", other)),
        }
    }
}
