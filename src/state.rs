use std::collections::VecDeque;

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate};
use serde::Serialize;

use crate::config::{EmptyPolicy, Locale, PredictionConfig, PredictionVariant};
use crate::error::{PredictionError, user_message};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
}

impl Outcome {
    pub fn from_code(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "1" | "HOME" | "HOMEWIN" | "HOME_WIN" => Some(Outcome::HomeWin),
            "X" | "DRAW" => Some(Outcome::Draw),
            "2" | "AWAY" | "AWAYWIN" | "AWAY_WIN" => Some(Outcome::AwayWin),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Outcome::HomeWin => "1",
            Outcome::Draw => "X",
            Outcome::AwayWin => "2",
        }
    }
}

/// The prediction carried by one card. A response only ever uses one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Pick {
    #[serde(rename_all = "camelCase")]
    Outcome { outcome: Outcome, start_time: String },
    #[serde(rename_all = "camelCase")]
    CustomBet { market1: String, market2: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub pick: Pick,
    pub confidence: u8,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// Everything one successful provider call yields, in response order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PredictionBatch {
    pub matches: Vec<Match>,
    pub sources: Vec<GroundingSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Loading,
    Success,
    Failure,
}

/// Which of the three main views is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Loading,
    Error,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub date: NaiveDate,
    pub phase: FetchPhase,
    pub loading: bool,
    pub error: Option<String>,
    pub last_error: Option<PredictionError>,
    pub matches: Vec<Match>,
    pub sources: Vec<GroundingSource>,
    pub summary: Option<String>,
    pub fetched_at: Option<DateTime<Local>>,
    pub generation: u64,
    pub in_flight: Option<NaiveDate>,
    pub selected: usize,
    pub sources_expanded: bool,
    pub sources_scroll: usize,
    pub help_overlay: bool,
    pub date_input: Option<String>,
    pub logs: VecDeque<String>,
    pub variant: PredictionVariant,
    pub empty_policy: EmptyPolicy,
    pub locale: Locale,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::for_date(local_today(), &PredictionConfig::default())
    }

    pub fn from_config(config: &PredictionConfig) -> Self {
        Self::for_date(local_today(), config)
    }

    /// Fresh session state. It starts out loading: the first fetch fires on
    /// mount, before anything else is drawn.
    pub fn for_date(date: NaiveDate, config: &PredictionConfig) -> Self {
        Self {
            date,
            phase: FetchPhase::Loading,
            loading: true,
            error: None,
            last_error: None,
            matches: Vec::with_capacity(config.match_count),
            sources: Vec::new(),
            summary: None,
            fetched_at: None,
            generation: 0,
            in_flight: None,
            selected: 0,
            sources_expanded: false,
            sources_scroll: 0,
            help_overlay: false,
            date_input: None,
            logs: VecDeque::with_capacity(200),
            variant: config.variant,
            empty_policy: config.empty_policy,
            locale: config.locale,
        }
    }

    pub fn display_mode(&self) -> DisplayMode {
        if self.loading {
            DisplayMode::Loading
        } else if self.error.is_some() {
            DisplayMode::Error
        } else {
            DisplayMode::Results
        }
    }

    /// Starts a fetch cycle for `date`.
    ///
    /// Returns `None` when a fetch for the same date is already pending. A
    /// different date always supersedes the pending one: the generation is
    /// bumped and only that newest request may commit.
    pub fn request_fetch(&mut self, date: NaiveDate) -> Option<FetchRequest> {
        if self.in_flight == Some(date) {
            self.push_log(format!(
                "[INFO] Fetch for {} already running",
                date.format(DATE_FORMAT)
            ));
            return None;
        }
        self.generation += 1;
        self.date = date;
        self.phase = FetchPhase::Loading;
        self.loading = true;
        self.error = None;
        self.last_error = None;
        self.in_flight = Some(date);
        Some(FetchRequest {
            generation: self.generation,
            date,
        })
    }

    pub fn refresh(&mut self) -> Option<FetchRequest> {
        self.request_fetch(self.date)
    }

    pub fn change_date(&mut self, date: NaiveDate) -> Option<FetchRequest> {
        self.request_fetch(date)
    }

    pub fn shift_date(&mut self, days: i64) -> Option<FetchRequest> {
        let date = self.date + ChronoDuration::days(days);
        self.change_date(date)
    }

    /// Marks a request as undeliverable (worker gone) so the UI does not spin
    /// forever.
    pub fn abandon_request(&mut self, request: FetchRequest, reason: &str) {
        if request.generation != self.generation {
            return;
        }
        self.push_log(format!("[WARN] Fetch request failed: {reason}"));
        self.fail(PredictionError::Unknown(reason.to_string()));
    }

    /// The request still waiting on the worker, if any.
    pub fn pending_request(&self) -> Option<FetchRequest> {
        self.in_flight.map(|date| FetchRequest {
            generation: self.generation,
            date,
        })
    }

    /// The delta channel closed: nothing will ever answer the pending request.
    pub fn worker_lost(&mut self) {
        if let Some(request) = self.pending_request() {
            self.abandon_request(request, "prediction worker stopped");
        }
    }

    pub fn begin_date_input(&mut self) {
        self.date_input = Some(self.date.format(DATE_FORMAT).to_string());
    }

    pub fn cancel_date_input(&mut self) {
        self.date_input = None;
    }

    pub fn push_date_char(&mut self, ch: char) {
        if let Some(input) = self.date_input.as_mut()
            && (ch.is_ascii_digit() || ch == '-')
            && input.len() < 10
        {
            input.push(ch);
        }
    }

    pub fn pop_date_char(&mut self) {
        if let Some(input) = self.date_input.as_mut() {
            input.pop();
        }
    }

    pub fn submit_date_input(&mut self) -> Option<FetchRequest> {
        let raw = self.date_input.take()?;
        match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
            Ok(date) => self.change_date(date),
            Err(_) => {
                self.push_log(format!("[WARN] Invalid date '{raw}', expected YYYY-MM-DD"));
                None
            }
        }
    }

    pub fn select_next(&mut self) {
        if self.matches.is_empty() {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1).min(self.matches.len() - 1);
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn toggle_sources(&mut self) {
        self.sources_expanded = !self.sources_expanded;
        self.sources_scroll = 0;
    }

    pub fn scroll_sources_down(&mut self) {
        if !self.sources_expanded || self.sources.is_empty() {
            return;
        }
        self.sources_scroll = (self.sources_scroll + 1).min(self.sources.len() - 1);
    }

    pub fn scroll_sources_up(&mut self) {
        self.sources_scroll = self.sources_scroll.saturating_sub(1);
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn date_label(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    fn succeed(&mut self, batch: PredictionBatch) {
        self.in_flight = None;
        self.loading = false;
        self.fetched_at = Some(Local::now());
        self.selected = 0;
        self.sources_scroll = 0;
        self.matches = batch.matches;
        self.sources = batch.sources;
        self.summary = batch.summary.filter(|s| !s.trim().is_empty());
        if self.matches.is_empty() && self.empty_policy == EmptyPolicy::Error {
            self.phase = FetchPhase::Failure;
            self.error = Some(user_message(&PredictionError::NoMatchesFound, self.locale));
            self.last_error = Some(PredictionError::NoMatchesFound);
            return;
        }
        self.phase = FetchPhase::Success;
        self.error = None;
        self.last_error = None;
    }

    fn fail(&mut self, error: PredictionError) {
        self.in_flight = None;
        self.loading = false;
        self.phase = FetchPhase::Failure;
        self.error = Some(user_message(&error, self.locale));
        self.last_error = Some(error);
    }
}

#[derive(Debug, Clone)]
pub enum Delta {
    PredictionsLoaded {
        generation: u64,
        date: NaiveDate,
        batch: PredictionBatch,
    },
    PredictionsFailed {
        generation: u64,
        date: NaiveDate,
        error: PredictionError,
    },
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    FetchPredictions { generation: u64, date: NaiveDate },
}

impl From<FetchRequest> for ProviderCommand {
    fn from(request: FetchRequest) -> Self {
        ProviderCommand::FetchPredictions {
            generation: request.generation,
            date: request.date,
        }
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::PredictionsLoaded {
            generation,
            date,
            batch,
        } => {
            if generation != state.generation {
                state.push_log(format!(
                    "[INFO] Dropped superseded result for {}",
                    date.format(DATE_FORMAT)
                ));
                return;
            }
            state.push_log(format!(
                "[INFO] {} predictions for {} ({} sources)",
                batch.matches.len(),
                date.format(DATE_FORMAT),
                batch.sources.len()
            ));
            state.succeed(batch);
        }
        Delta::PredictionsFailed {
            generation,
            date,
            error,
        } => {
            if generation != state.generation {
                state.push_log(format!(
                    "[INFO] Dropped superseded failure for {}",
                    date.format(DATE_FORMAT)
                ));
                return;
            }
            state.push_log(format!(
                "[WARN] Fetch for {} failed: {} ({error})",
                date.format(DATE_FORMAT),
                error.kind_code()
            ));
            state.fail(error);
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::HomeWin => "Home Win",
        Outcome::Draw => "Draw",
        Outcome::AwayWin => "Away Win",
    }
}

pub fn pick_text(pick: &Pick) -> String {
    match pick {
        Pick::Outcome { outcome, .. } => {
            format!("{} {}", outcome.code(), outcome_label(*outcome))
        }
        Pick::CustomBet { market1, market2 } => format!("{market1} + {market2}"),
    }
}

pub fn variant_label(variant: PredictionVariant) -> &'static str {
    match variant {
        PredictionVariant::CustomBet => "CUSTOMBET",
        PredictionVariant::Outcome => "1X2",
    }
}
