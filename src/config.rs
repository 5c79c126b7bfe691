use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ScreenPilotError, ScreenPilotResult};

/// Virtual screen size the planning service reasons in, independent of the
/// real display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualResolution {
    pub width: u32,
    pub height: u32,
}

impl Default for VirtualResolution {
    fn default() -> Self {
        Self { width: 1024, height: 768 }
    }
}

impl FromStr for VirtualResolution {
    type Err = ScreenPilotError;

    /// Parses a `WxH` string such as `1024x768`. Invalid input is a fatal
    /// configuration error, not a silent fallback.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ScreenPilotError::Config(format!(
                "invalid resolution '{s}', expected WxH (e.g. 1024x768)"
            ))
        };
        let (w, h) = s.split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(ScreenPilotError::Config(format!(
                "resolution '{s}' has a zero dimension"
            )));
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for VirtualResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which planning service deployment to talk to, with its credentials.
#[derive(Debug, Clone)]
pub enum ServiceEndpoint {
    Azure { endpoint: String, api_key: String },
    OpenAi { api_key: String },
}

impl ServiceEndpoint {
    /// Resolve credentials from the environment for the given endpoint kind
    /// (`azure` or `openai`). Missing variables are fatal before any task
    /// starts.
    pub fn from_env(kind: &str) -> ScreenPilotResult<Self> {
        match kind {
            "azure" => {
                let endpoint = require_env("AZURE_OPENAI_ENDPOINT")?;
                let api_key = require_env("AZURE_OPENAI_API_KEY")?;
                Ok(Self::Azure {
                    endpoint: endpoint.trim_end_matches('/').to_string(),
                    api_key,
                })
            }
            "openai" => Ok(Self::OpenAi {
                api_key: require_env("OPENAI_API_KEY")?,
            }),
            other => Err(ScreenPilotError::Config(format!(
                "unknown endpoint '{other}', expected 'azure' or 'openai'"
            ))),
        }
    }
}

fn require_env(name: &str) -> ScreenPilotResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ScreenPilotError::Config(format!(
            "environment variable {name} is not set (set it in the environment or a .env file)"
        ))),
    }
}

/// Validated runtime settings, assembled from CLI arguments and environment
/// variables before anything else is constructed.
#[derive(Debug, Clone)]
pub struct Settings {
    pub model: String,
    pub endpoint: ServiceEndpoint,
    /// Environment tag advertised to the planner ("linux", "windows", "mac",
    /// "browser").
    pub environment: String,
    pub resolution: VirtualResolution,
    /// Execute actions without pausing the caller loop for confirmation.
    pub autoplay: bool,
    /// Acknowledge safety checks without asking the user. Never silent.
    pub bypass_safety_checks: bool,
    pub log_tokens: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resolution() {
        let r: VirtualResolution = "1024x768".parse().unwrap();
        assert_eq!(r, VirtualResolution { width: 1024, height: 768 });
    }

    #[test]
    fn parse_resolution_capital_x() {
        let r: VirtualResolution = "1280X1024".parse().unwrap();
        assert_eq!(r, VirtualResolution { width: 1280, height: 1024 });
    }

    #[test]
    fn parse_resolution_rejects_garbage() {
        assert!("fullscreen".parse::<VirtualResolution>().is_err());
        assert!("1024".parse::<VirtualResolution>().is_err());
        assert!("1024xtall".parse::<VirtualResolution>().is_err());
    }

    #[test]
    fn parse_resolution_rejects_zero_dimension() {
        assert!("0x768".parse::<VirtualResolution>().is_err());
        assert!("1024x0".parse::<VirtualResolution>().is_err());
    }

    #[test]
    fn resolution_display_round_trips() {
        let r = VirtualResolution::default();
        assert_eq!(r.to_string().parse::<VirtualResolution>().unwrap(), r);
    }
}
