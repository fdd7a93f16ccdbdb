//! Process-wide configuration assembled once at startup from environment
//! variables layered over safety-profile defaults, then passed by
//! reference (`Arc<Config>`) to every component. No global mutable state.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyProfile {
    Strict,
    Normal,
    Dev,
}

impl SafetyProfile {
    fn from_env(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "strict" => SafetyProfile::Strict,
            "dev" => SafetyProfile::Dev,
            _ => SafetyProfile::Normal,
        }
    }

    /// Whether skills flagged `dangerous=true` are suppressed at registration.
    pub fn suppresses_dangerous(&self) -> bool {
        matches!(self, SafetyProfile::Strict)
    }

    /// Failure threshold for the circuit breaker, tighter under `strict`.
    pub fn breaker_failure_threshold(&self) -> u32 {
        match self {
            SafetyProfile::Strict => 2,
            SafetyProfile::Normal => 5,
            SafetyProfile::Dev => 10,
        }
    }

    /// Burst size for the rate limiter, looser under `dev`.
    pub fn rate_limiter_burst(&self) -> u32 {
        match self {
            SafetyProfile::Strict => 5,
            SafetyProfile::Normal => 20,
            SafetyProfile::Dev => 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_port: u16,
    pub ws_port: Option<u16>,
    pub safety_profile: SafetyProfile,
    pub aurora_cut_cooldown_ms: u64,
    pub run_dir: PathBuf,
    pub max_concurrent_dangerous: usize,
}

impl Config {
    /// Assemble configuration from the process environment. Recognized
    /// variables are documented in the README environment table.
    pub fn from_env() -> Self {
        let api_port = env::var("API_PORT")
            .or_else(|_| env::var("PORT"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3333);

        let ws_port = env::var("WS_PORT").ok().and_then(|v| v.parse().ok());

        let safety_profile = env::var("SAFETY_PROFILE")
            .map(|v| SafetyProfile::from_env(&v))
            .unwrap_or(SafetyProfile::Normal);

        let aurora_cut_cooldown_ms = env::var("AURORA_CUT_COOLDOWN_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30_000);

        let run_dir = env::var("RUN_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("runs"));

        let max_concurrent_dangerous = env::var("MAX_CONCURRENT_DANGEROUS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        Self {
            api_port,
            ws_port,
            safety_profile,
            aurora_cut_cooldown_ms,
            run_dir,
            max_concurrent_dangerous,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_port: 3333,
            ws_port: None,
            safety_profile: SafetyProfile::Normal,
            aurora_cut_cooldown_ms: 30_000,
            run_dir: PathBuf::from("runs"),
            max_concurrent_dangerous: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_profile_suppresses_dangerous_skills() {
        assert!(SafetyProfile::Strict.suppresses_dangerous());
        assert!(!SafetyProfile::Normal.suppresses_dangerous());
        assert!(!SafetyProfile::Dev.suppresses_dangerous());
    }

    #[test]
    fn default_config_matches_documented_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.api_port, 3333);
        assert_eq!(cfg.max_concurrent_dangerous, 1);
    }
}
