//! Configuration: `~/.agendabot/config.toml` plus environment overrides.
//!
//! Secrets and deployment identity (bot token, recipient, timezone, calendar
//! token) are usually injected through the environment, so env always wins
//! over the file.

use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AgendaError, Result};
use crate::types::time::{TimeOfDay, parse_timezone};

fn tod(hour: u32, minute: u32) -> TimeOfDay {
    TimeOfDay::new(hour, minute).unwrap_or_else(|| unreachable!("constant time {hour}:{minute}"))
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgendaConfig {
    /// IANA timezone all wall-clock triggers are evaluated in.
    pub timezone: String,
    /// The only recipient notices go to. Unset disables outbound sends.
    pub authorized_recipient: Option<String>,
    pub schedule: ScheduleConfig,
    pub jobs: JobsConfig,
    pub doses: DoseConfig,
    pub calendar: CalendarConfig,
    pub channel: ChannelConfig,
}

impl Default for AgendaConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Argentina/Buenos_Aires".into(),
            authorized_recipient: None,
            schedule: ScheduleConfig::default(),
            jobs: JobsConfig::default(),
            doses: DoseConfig::default(),
            calendar: CalendarConfig::default(),
            channel: ChannelConfig::default(),
        }
    }
}

/// When each trigger fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Fixed daily agenda digests, in priority order for startup catchup.
    pub digest_times: Vec<TimeOfDay>,
    /// Near-term scan interval.
    pub scan_interval_minutes: u32,
    /// End-of-day renewal sweep.
    pub renewal_time: TimeOfDay,
    /// A process started at or before this time renews yesterday's tasks.
    pub early_morning_cutoff: TimeOfDay,
    pub catchup_lookback_minutes: u32,
    /// Digests outside `[start, end]` are skipped; the window may wrap past midnight.
    pub active_window_start: TimeOfDay,
    pub active_window_end: TimeOfDay,
    pub weekly_rollup: WeeklySlot,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let mut digest_times: Vec<TimeOfDay> = (0..9).map(|i| tod(6 + 2 * i, 30)).collect();
        digest_times.push(tod(0, 0));
        Self {
            digest_times,
            scan_interval_minutes: 15,
            renewal_time: tod(23, 55),
            early_morning_cutoff: tod(4, 0),
            catchup_lookback_minutes: 30,
            active_window_start: tod(6, 30),
            active_window_end: tod(0, 0),
            weekly_rollup: WeeklySlot::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklySlot {
    pub weekday: Weekday,
    pub time: TimeOfDay,
}

impl Default for WeeklySlot {
    fn default() -> Self {
        Self { weekday: Weekday::Sun, time: tod(20, 0) }
    }
}

/// Job execution and classification knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Engine heartbeat; dose scans run on every tick.
    pub tick_secs: u64,
    /// Upper bound for a single job invocation.
    pub timeout_secs: u64,
    /// Anti-duplicate deferral after a dose notice, and the snooze button length.
    pub snooze_minutes: i64,
    /// Timed items at least this long stay visible after they started.
    pub long_item_hours: i64,
    pub recent_grace_minutes: i64,
    pub upcoming_horizon_minutes: i64,
    pub catchup_digest_delay_secs: u64,
    pub catchup_renewal_delay_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            timeout_secs: 60,
            snooze_minutes: 30,
            long_item_hours: 12,
            recent_grace_minutes: 60,
            upcoming_horizon_minutes: 120,
            catchup_digest_delay_secs: 10,
            catchup_renewal_delay_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoseConfig {
    pub path: String,
}

impl Default for DoseConfig {
    fn default() -> Self {
        Self { path: "~/.agendabot/doses.json".into() }
    }
}

impl DoseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// `google` or `memory`.
    pub backend: String,
    pub calendar_id: String,
    pub base_url: String,
    /// OAuth bearer token; normally provided via `GOOGLE_ACCESS_TOKEN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            backend: "google".into(),
            calendar_id: "primary".into(),
            base_url: "https://www.googleapis.com/calendar/v3".into(),
            access_token: None,
            request_timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub telegram: Option<TelegramConfig>,
    pub webhook: Option<WebhookConfig>,
}

fn default_true() -> bool { true }

fn default_telegram_api() -> String {
    "https://api.telegram.org".into()
}

/// Telegram Bot API channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
    /// Long-poll timeout for the callback listener.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_poll_timeout() -> u64 { 30 }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            enabled: true,
            api_base: default_telegram_api(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// Outbound JSON webhook channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// URL to send outbound notices to.
    pub outbound_url: Option<String>,
    /// Shared secret; outbound bodies are signed with it when set.
    pub secret: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AgendaConfig {
    /// Root directory for agendabot state.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agendabot")
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Load from the default path, falling back to defaults, then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::read_file(&path)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path (must exist), then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AgendaError::config(format!("config file not found: {}", path.display())));
        }
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| AgendaError::config(format!("{}: {e}", path.display())))
    }

    /// Write to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AgendaError::config(format!("serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup; empty values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(tz) = get("TIMEZONE") {
            self.timezone = tz;
        }
        if let Some(recipient) = get("AUTHORIZED_USER_ID") {
            self.authorized_recipient = Some(recipient);
        }
        if let Some(token) = get("GOOGLE_ACCESS_TOKEN") {
            self.calendar.access_token = Some(token);
        }
        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.channel.telegram.get_or_insert_with(TelegramConfig::default).bot_token = token;
        }
        if let Some(url) = get("AGENDABOT_WEBHOOK_URL") {
            let webhook = self.channel.webhook.get_or_insert(WebhookConfig {
                outbound_url: None,
                secret: None,
                enabled: true,
            });
            webhook.outbound_url = Some(url);
        }
    }

    /// The configured timezone, validated.
    pub fn tz(&self) -> Result<Tz> {
        parse_timezone(&self.timezone)
    }

    /// Copy with tokens and secrets masked, for display.
    pub fn redacted(&self) -> Self {
        const MASK: &str = "********";
        let mut out = self.clone();
        if let Some(token) = out.calendar.access_token.as_mut() {
            *token = MASK.into();
        }
        if let Some(tg) = out.channel.telegram.as_mut().filter(|t| !t.bot_token.is_empty()) {
            tg.bot_token = MASK.into();
        }
        if let Some(secret) = out.channel.webhook.as_mut().and_then(|w| w.secret.as_mut()) {
            *secret = MASK.into();
        }
        out
    }

    /// Reject configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        if self.schedule.scan_interval_minutes == 0 {
            return Err(AgendaError::config("schedule.scan_interval_minutes must be > 0"));
        }
        if self.jobs.tick_secs == 0 || self.jobs.timeout_secs == 0 {
            return Err(AgendaError::config("jobs.tick_secs and jobs.timeout_secs must be > 0"));
        }
        if self.jobs.snooze_minutes <= 0 {
            return Err(AgendaError::config("jobs.snooze_minutes must be > 0"));
        }
        if self.jobs.long_item_hours <= 0 {
            return Err(AgendaError::config("jobs.long_item_hours must be > 0"));
        }
        Ok(())
    }
}
