use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::scoring::ScoringRule;
use crate::session::SessionSettings;

/// Which map win condition to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuleKind {
    /// 13 rounds, win by two, 3-round overtime halves
    Standard,
    /// Superseded: scores only need to differ, 4-round overtime
    Legacy,
}

impl RuleKind {
    pub fn rule(self) -> ScoringRule {
        match self {
            RuleKind::Standard => ScoringRule::STANDARD,
            RuleKind::Legacy => ScoringRule::LEGACY,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RuleKind::Standard => "standard",
            RuleKind::Legacy => "legacy",
        }
    }
}

/// Telegram bot that follows live HLTV matches
#[derive(Parser, Debug, Clone)]
#[command(name = "hltv-watch-bot", version, about)]
pub struct Config {
    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: String,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    /// HLTV base URL
    #[arg(long, env = "HLTV_BASE_URL", default_value = "https://www.hltv.org")]
    pub hltv_base_url: String,

    /// Scoreboard polling interval in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value = "1000")]
    pub poll_interval_ms: u64,

    /// How long to wait for a match page to show up before giving up
    #[arg(long, env = "LOOKUP_TIMEOUT_SECS", default_value = "10")]
    pub lookup_timeout_secs: u64,

    /// Consecutive failed polls tolerated before a session gives up
    #[arg(long, env = "MAX_CONSECUTIVE_FAILURES", default_value = "30")]
    pub max_consecutive_failures: u32,

    /// Map win condition
    #[arg(long, env = "SCORING_RULE", value_enum, default_value = "standard")]
    pub scoring_rule: RuleKind,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "10")]
    pub http_timeout_secs: u64,

    /// Status dashboard listen address (disabled when unset)
    #[arg(long, env = "STATUS_ADDR")]
    pub status_addr: Option<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.telegram_bot_token.trim().is_empty() {
            anyhow::bail!("TELEGRAM_BOT_TOKEN must not be empty");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be positive");
        }
        if self.lookup_timeout_secs == 0 {
            anyhow::bail!("lookup_timeout_secs must be positive");
        }
        if self.max_consecutive_failures == 0 {
            anyhow::bail!("max_consecutive_failures must be at least 1");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_consecutive_failures: self.max_consecutive_failures,
            rule: self.scoring_rule.rule(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}
