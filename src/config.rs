//! Application-level configuration loading: scoring rules, session lifetime and token packs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_ARENA_CONFIG_PATH";

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_IDENT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_TEAM_MEMBERS: usize = 6;
const DEFAULT_PRACTICE_QUESTIONS: usize = 10;
const DEFAULT_PRACTICE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// League points awarded per match outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    /// Points credited to the winner of a match.
    pub win_points: u32,
    /// Points credited to both teams on a draw.
    pub draw_points: u32,
    /// Points credited to the loser of a match.
    pub loss_points: u32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            win_points: 3,
            draw_points: 1,
            loss_points: 0,
        }
    }
}

/// A purchasable bundle of practice tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPack {
    /// Stable identifier used by clients when purchasing.
    pub id: String,
    /// Number of practice tokens credited on purchase.
    pub tokens: u32,
    /// Simulated price in cents.
    pub price_cents: u32,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    scoring: ScoringRules,
    session_ttl: Duration,
    max_team_members: usize,
    practice_questions: usize,
    practice_ttl: Duration,
    token_packs: Vec<TokenPack>,
    ws_identification_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        packs = app_config.token_packs.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document, filling unspecified entries with defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Win/draw/loss point rules used by standings.
    pub fn scoring(&self) -> ScoringRules {
        self.scoring
    }

    /// Lifetime of a login session.
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Maximum number of members a team may hold.
    pub fn max_team_members(&self) -> usize {
        self.max_team_members
    }

    /// Number of questions drawn for a practice session.
    pub fn practice_questions(&self) -> usize {
        self.practice_questions
    }

    /// How long a practice session is kept after it was started.
    pub fn practice_ttl(&self) -> Duration {
        self.practice_ttl
    }

    /// Token packs offered by the simulated shop.
    pub fn token_packs(&self) -> &[TokenPack] {
        &self.token_packs
    }

    /// Look up a token pack by identifier.
    pub fn token_pack(&self, id: &str) -> Option<&TokenPack> {
        self.token_packs.iter().find(|pack| pack.id == id)
    }

    /// How long a match socket may stay silent before identifying itself.
    pub fn ws_identification_timeout(&self) -> Duration {
        self.ws_identification_timeout
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringRules::default(),
            session_ttl: DEFAULT_SESSION_TTL,
            max_team_members: DEFAULT_MAX_TEAM_MEMBERS,
            practice_questions: DEFAULT_PRACTICE_QUESTIONS,
            practice_ttl: DEFAULT_PRACTICE_TTL,
            token_packs: default_token_packs(),
            ws_identification_timeout: DEFAULT_IDENT_TIMEOUT,
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    scoring: Option<ScoringRules>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    session_ttl_secs: Option<Duration>,
    max_team_members: Option<usize>,
    practice: Option<RawPractice>,
    token_packs: Option<Vec<TokenPack>>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    ws_identification_timeout_ms: Option<Duration>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPractice {
    questions_per_session: Option<usize>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    session_ttl_secs: Option<Duration>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let practice = value.practice.unwrap_or_default();
        Self {
            scoring: value.scoring.unwrap_or(defaults.scoring),
            session_ttl: value.session_ttl_secs.unwrap_or(defaults.session_ttl),
            max_team_members: value
                .max_team_members
                .filter(|max| *max > 0)
                .unwrap_or(defaults.max_team_members),
            practice_questions: practice
                .questions_per_session
                .filter(|count| *count > 0)
                .unwrap_or(defaults.practice_questions),
            practice_ttl: practice.session_ttl_secs.unwrap_or(defaults.practice_ttl),
            token_packs: value
                .token_packs
                .filter(|packs| !packs.is_empty())
                .unwrap_or(defaults.token_packs),
            ws_identification_timeout: value
                .ws_identification_timeout_ms
                .unwrap_or(defaults.ws_identification_timeout),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in shop catalogue shipped with the binary.
fn default_token_packs() -> Vec<TokenPack> {
    vec![
        TokenPack {
            id: "starter".into(),
            tokens: 5,
            price_cents: 499,
        },
        TokenPack {
            id: "regular".into(),
            tokens: 15,
            price_cents: 1299,
        },
        TokenPack {
            id: "pro".into(),
            tokens: 40,
            price_cents: 2999,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.scoring(), ScoringRules::default());
        assert_eq!(config.session_ttl(), DEFAULT_SESSION_TTL);
        assert_eq!(config.token_packs().len(), 3);
        assert!(config.token_pack("starter").is_some());
    }

    #[test]
    fn partial_document_overrides_only_given_fields() {
        let config = AppConfig::from_json(
            r#"{
                "scoring": { "win_points": 2 },
                "session_ttl_secs": 60,
                "practice": { "questions_per_session": 3 },
                "token_packs": [{ "id": "mini", "tokens": 1, "price_cents": 99 }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.scoring().win_points, 2);
        assert_eq!(config.scoring().draw_points, 1);
        assert_eq!(config.session_ttl(), Duration::from_secs(60));
        assert_eq!(config.practice_questions(), 3);
        assert_eq!(config.practice_ttl(), DEFAULT_PRACTICE_TTL);
        assert_eq!(config.max_team_members(), DEFAULT_MAX_TEAM_MEMBERS);
        assert_eq!(config.token_pack("mini").map(|p| p.tokens), Some(1));
        assert!(config.token_pack("starter").is_none());
    }

    #[test]
    fn zero_limits_fall_back_to_defaults() {
        let config =
            AppConfig::from_json(r#"{ "max_team_members": 0, "token_packs": [] }"#).unwrap();
        assert_eq!(config.max_team_members(), DEFAULT_MAX_TEAM_MEMBERS);
        assert_eq!(config.token_packs().len(), 3);
    }
}
