use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_MATCH_COUNT: usize = 13;
pub const DEFAULT_LOG_FILE: &str = "custombet_terminal.log";

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const PRO_THINKING_BUDGET: u32 = 2000;

/// Which prediction shape a deployment asks the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionVariant {
    /// Two-market composite bet per match.
    CustomBet,
    /// Single 1/X/2 outcome with a kickoff time.
    Outcome,
}

/// What an accepted but empty match list turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyPolicy {
    Error,
    EmptyGrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    Pt,
    En,
}

#[derive(Debug, Clone)]
pub struct PredictionConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub thinking_budget: u32,
    pub variant: PredictionVariant,
    pub match_count: usize,
    pub timeout: Duration,
    pub empty_policy: EmptyPolicy,
    pub locale: Locale,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            thinking_budget: default_thinking_budget(DEFAULT_MODEL),
            variant: PredictionVariant::CustomBet,
            match_count: DEFAULT_MATCH_COUNT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            empty_policy: EmptyPolicy::Error,
            locale: Locale::Pt,
        }
    }
}

impl PredictionConfig {
    pub fn from_env() -> Self {
        let api_key = non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("API_KEY"));
        let api_base = non_empty_env("CUSTOMBET_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let model = non_empty_env("CUSTOMBET_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let thinking_budget = env::var("CUSTOMBET_THINKING_BUDGET")
            .ok()
            .and_then(|val| val.trim().parse::<u32>().ok())
            .unwrap_or_else(|| default_thinking_budget(&model));
        let variant = non_empty_env("CUSTOMBET_VARIANT")
            .and_then(|val| parse_variant(&val))
            .unwrap_or(PredictionVariant::CustomBet);
        let match_count = env::var("CUSTOMBET_MATCH_COUNT")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_MATCH_COUNT)
            .clamp(1, 30);
        let timeout_secs = env::var("CUSTOMBET_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(5, 300);
        let empty_policy = non_empty_env("CUSTOMBET_EMPTY_POLICY")
            .and_then(|val| parse_empty_policy(&val))
            .unwrap_or(EmptyPolicy::Error);
        let locale = non_empty_env("CUSTOMBET_LOCALE")
            .and_then(|val| parse_locale(&val))
            .unwrap_or(Locale::Pt);

        Self {
            api_key,
            api_base,
            model,
            thinking_budget,
            variant,
            match_count,
            timeout: Duration::from_secs(timeout_secs),
            empty_policy,
            locale,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

pub fn log_file_path() -> String {
    non_empty_env("CUSTOMBET_LOG").unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
}

/// Pro models get a reasoning budget so 13 analyses in one call hold up.
pub fn default_thinking_budget(model: &str) -> u32 {
    if model.to_ascii_lowercase().contains("pro") {
        PRO_THINKING_BUDGET
    } else {
        0
    }
}

pub fn parse_variant(raw: &str) -> Option<PredictionVariant> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "custombet" | "custom" | "bet" => Some(PredictionVariant::CustomBet),
        "outcome" | "1x2" | "result" => Some(PredictionVariant::Outcome),
        _ => None,
    }
}

pub fn parse_empty_policy(raw: &str) -> Option<EmptyPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "error" => Some(EmptyPolicy::Error),
        "grid" | "empty" | "silent" => Some(EmptyPolicy::EmptyGrid),
        _ => None,
    }
}

pub fn parse_locale(raw: &str) -> Option<Locale> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pt" | "pt-br" | "pt_br" => Some(Locale::Pt),
        "en" | "en-us" | "en_us" | "en-gb" => Some(Locale::En),
        _ => None,
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
