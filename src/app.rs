use std::time::Instant;

use ratatui::layout::Rect;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::gemini::{GeminiClient, GeminiError, SearchResponse};
use crate::search::{ResultState, SearchVariant};

/// Fallback shown when a search task dies without a recognized error.
pub const UNKNOWN_ERROR: &str = "Unknown error.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    Query,
    Url,
}

/// Epoch tag plus the call's settlement, produced by a spawned search task.
type SearchOutcome = (u64, Result<SearchResponse, GeminiError>);

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focused_field: InputField,

    // Form state
    pub query_input: String,
    pub query_cursor: usize,
    pub url_input: String,
    pub url_cursor: usize,

    // Search state. `pending` tracks which variants of the current epoch
    // have not settled; `is_searching` releases only when all three have.
    pub is_searching: bool,
    search_epoch: u64,
    pending: [bool; 3],
    pub search_started: Option<Instant>,

    pub results: [ResultState; 3],
    tasks: [Option<JoinHandle<SearchOutcome>>; 3],

    // Panel state
    pub selected_panel: usize,
    pub panel_scroll: [u16; 3],
    pub panel_lines: [u16; 3],
    pub panel_viewport: [u16; 3],

    // Panel areas for mouse hit-testing (updated during render)
    pub panel_areas: [Option<Rect>; 3],

    // Animation state
    pub animation_frame: u8,

    client: Option<GeminiClient>,
}

impl App {
    pub fn new(config: Config) -> Self {
        // Env var wins over the config file
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| config.gemini_api_key.clone());

        let client = api_key.map(|key| {
            GeminiClient::new(&key).with_models(config.flash_model.clone(), config.pro_model.clone())
        });

        Self::with_client(client)
    }

    fn with_client(client: Option<GeminiClient>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focused_field: InputField::Query,

            query_input: String::new(),
            query_cursor: 0,
            url_input: String::new(),
            url_cursor: 0,

            is_searching: false,
            search_epoch: 0,
            pending: [false; 3],
            search_started: None,

            results: Default::default(),
            tasks: [None, None, None],

            selected_panel: 0,
            panel_scroll: [0; 3],
            panel_lines: [0; 3],
            panel_viewport: [0; 3],
            panel_areas: [None; 3],

            animation_frame: 0,

            client,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.client.is_some()
    }

    /// Whether any search has ever been accepted this session.
    pub fn has_searched(&self) -> bool {
        self.search_epoch > 0
    }

    /// Kick off the three backend calls for the current form contents.
    ///
    /// A blank query or an in-flight search makes this a no-op; nothing is
    /// reset and no network activity happens.
    pub fn start_search(&mut self) {
        if self.query_input.trim().is_empty() || self.is_searching {
            return;
        }

        let epoch = self.begin_search_epoch();
        tracing::info!(epoch, query = %self.query_input, "starting search");

        let Some(client) = self.client.clone() else {
            // Missing credential fails this search only; the process keeps running
            let message = GeminiError::MissingApiKey.to_string();
            tracing::warn!(epoch, "search attempted without an API key");
            for variant in SearchVariant::ALL {
                self.apply_outcome(variant, epoch, Err(message.clone()));
            }
            return;
        };

        for variant in SearchVariant::ALL {
            let client = client.clone();
            let query = self.query_input.clone();
            let url = self.url_input.clone();
            self.tasks[variant.index()] = Some(tokio::spawn(async move {
                let outcome = match variant {
                    SearchVariant::Grounded => client.grounded_search(&query, &url).await,
                    SearchVariant::Analysis => client.deep_analysis(&query, &url).await,
                    SearchVariant::Conversational => {
                        client.conversational_explanation(&query, &url).await
                    }
                };
                (epoch, outcome)
            }));
        }
    }

    /// Open a new search epoch: bump the counter, raise the gate, reset the
    /// elapsed timer, and put every panel into loading.
    fn begin_search_epoch(&mut self) -> u64 {
        self.search_epoch += 1;
        self.is_searching = true;
        self.search_started = Some(Instant::now());
        self.pending = [true; 3];
        self.panel_scroll = [0; 3];
        for state in &mut self.results {
            state.begin_loading();
        }
        self.search_epoch
    }

    /// Apply one call's settlement. Outcomes from superseded epochs are
    /// discarded so a stale late write cannot overwrite newer results.
    fn apply_outcome(
        &mut self,
        variant: SearchVariant,
        epoch: u64,
        outcome: Result<SearchResponse, String>,
    ) {
        if epoch != self.search_epoch {
            tracing::debug!(
                epoch,
                current = self.search_epoch,
                variant = variant.as_str(),
                "discarding stale search outcome"
            );
            return;
        }

        let state = &mut self.results[variant.index()];
        match outcome {
            Ok(response) => {
                tracing::info!(variant = variant.as_str(), "search settled successfully");
                state.settle_success(response);
            }
            Err(message) => {
                tracing::warn!(variant = variant.as_str(), %message, "search settled with error");
                state.settle_error(message);
            }
        }

        self.pending[variant.index()] = false;
        if self.is_searching && !self.pending.iter().any(|pending| *pending) {
            self.is_searching = false;
            tracing::info!(epoch, "all searches settled");
        }
    }

    /// Collect settlements from finished tasks. Called on every tick.
    pub async fn poll_search_tasks(&mut self) {
        for variant in SearchVariant::ALL {
            let idx = variant.index();
            let finished = self.tasks[idx]
                .as_ref()
                .map(|task| task.is_finished())
                .unwrap_or(false);
            if !finished {
                continue;
            }

            let Some(task) = self.tasks[idx].take() else {
                continue;
            };
            let (epoch, outcome) = match task.await {
                Ok((epoch, outcome)) => (epoch, outcome.map_err(|err| err.to_string())),
                Err(join_error) => {
                    tracing::warn!(
                        variant = variant.as_str(),
                        %join_error,
                        "search task terminated abnormally"
                    );
                    (self.search_epoch, Err(UNKNOWN_ERROR.to_string()))
                }
            };
            self.apply_outcome(variant, epoch, outcome);
        }
    }

    /// Whole seconds since the current search started.
    pub fn elapsed_seconds(&self) -> u64 {
        self.search_started
            .map(|started| started.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_searching {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn focused_input(&mut self) -> (&mut String, &mut usize) {
        match self.focused_field {
            InputField::Query => (&mut self.query_input, &mut self.query_cursor),
            InputField::Url => (&mut self.url_input, &mut self.url_cursor),
        }
    }

    pub fn toggle_field(&mut self) {
        self.focused_field = match self.focused_field {
            InputField::Query => InputField::Url,
            InputField::Url => InputField::Query,
        };
    }

    // Panel navigation
    pub fn select_next_panel(&mut self) {
        self.selected_panel = (self.selected_panel + 1) % 3;
    }

    pub fn select_prev_panel(&mut self) {
        self.selected_panel = (self.selected_panel + 2) % 3;
    }

    pub fn scroll_panel_down(&mut self, panel: usize, lines: u16) {
        let max_scroll = self.panel_lines[panel].saturating_sub(self.panel_viewport[panel]);
        self.panel_scroll[panel] = self.panel_scroll[panel].saturating_add(lines).min(max_scroll);
    }

    pub fn scroll_panel_up(&mut self, panel: usize, lines: u16) {
        self.panel_scroll[panel] = self.panel_scroll[panel].saturating_sub(lines);
    }

    pub fn scroll_panel_to_top(&mut self, panel: usize) {
        self.panel_scroll[panel] = 0;
    }

    pub fn scroll_panel_to_bottom(&mut self, panel: usize) {
        self.panel_scroll[panel] =
            self.panel_lines[panel].saturating_sub(self.panel_viewport[panel]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::Citation;
    use crate::search::SearchVariant::{Analysis, Conversational, Grounded};

    fn sample_response(text: &str) -> SearchResponse {
        SearchResponse {
            text: text.to_string(),
            citations: Vec::new(),
        }
    }

    fn cited_response(text: &str) -> SearchResponse {
        SearchResponse {
            text: text.to_string(),
            citations: vec![Citation {
                uri: "https://example.com/source".to_string(),
                title: Some("Source".to_string()),
            }],
        }
    }

    #[test]
    fn blank_query_issues_nothing_and_changes_nothing() {
        let mut app = App::with_client(None);
        for query in ["", "   ", "\t\n"] {
            app.query_input = query.to_string();
            app.start_search();

            assert!(!app.is_searching);
            assert_eq!(app.search_epoch, 0);
            for state in &app.results {
                assert!(!state.is_loading);
                assert!(state.content.is_none());
                assert!(state.error.is_none());
            }
            assert!(app.tasks.iter().all(|task| task.is_none()));
        }
    }

    #[test]
    fn search_without_api_key_settles_every_panel_with_config_error() {
        let mut app = App::with_client(None);
        app.query_input = "capital of France".to_string();
        app.start_search();

        assert!(!app.is_searching, "all panels settled immediately");
        assert_eq!(app.search_epoch, 1);
        for state in &app.results {
            let error = state.error.as_deref().expect("config error recorded");
            assert!(error.contains("GEMINI_API_KEY"));
            assert!(state.content.is_none());
            assert!(state.score.is_none());
        }
    }

    #[test]
    fn resubmission_while_searching_is_a_no_op() {
        let mut app = App::with_client(None);
        app.query_input = "first".to_string();
        let epoch = app.begin_search_epoch();
        assert!(app.is_searching);

        app.query_input = "second".to_string();
        app.start_search();

        assert_eq!(app.search_epoch, epoch, "no new epoch opened");
        assert!(app.results.iter().all(|state| state.is_loading));
        assert!(app.pending.iter().all(|pending| *pending));
    }

    #[test]
    fn busy_gate_holds_until_the_last_settlement() {
        let mut app = App::with_client(None);
        app.query_input = "question".to_string();
        let epoch = app.begin_search_epoch();

        app.apply_outcome(Grounded, epoch, Ok(cited_response("summary")));
        assert!(app.is_searching, "two calls still pending");

        app.apply_outcome(Analysis, epoch, Err("Quota exceeded".to_string()));
        assert!(app.is_searching, "one call still pending");

        app.apply_outcome(Conversational, epoch, Ok(sample_response("explanation")));
        assert!(!app.is_searching, "gate releases after the last settlement");
    }

    #[test]
    fn one_failure_never_touches_the_other_panels() {
        let mut app = App::with_client(None);
        app.query_input = "question".to_string();
        let epoch = app.begin_search_epoch();

        app.apply_outcome(Grounded, epoch, Err("Quota exceeded".to_string()));
        app.apply_outcome(Analysis, epoch, Ok(sample_response("analysis text")));
        app.apply_outcome(Conversational, epoch, Ok(sample_response("friendly text")));

        let grounded = &app.results[Grounded.index()];
        assert_eq!(grounded.error.as_deref(), Some("Quota exceeded"));
        assert!(grounded.content.is_none());

        let analysis = &app.results[Analysis.index()];
        assert_eq!(analysis.content.as_deref(), Some("analysis text"));
        assert!(analysis.error.is_none());
        assert!(analysis.score.is_some());

        let conversational = &app.results[Conversational.index()];
        assert_eq!(conversational.content.as_deref(), Some("friendly text"));
        assert!(conversational.error.is_none());
    }

    #[test]
    fn stale_epoch_outcomes_are_discarded() {
        let mut app = App::with_client(None);
        app.query_input = "question".to_string();
        let first = app.begin_search_epoch();
        app.apply_outcome(Grounded, first, Ok(sample_response("old")));
        app.apply_outcome(Analysis, first, Ok(sample_response("old")));
        app.apply_outcome(Conversational, first, Ok(sample_response("old")));

        let second = app.begin_search_epoch();
        assert_ne!(first, second);

        // A late write from the superseded search arrives mid-flight.
        app.apply_outcome(Grounded, first, Ok(sample_response("stale late write")));

        let grounded = &app.results[Grounded.index()];
        assert!(grounded.is_loading, "stale outcome must not settle the panel");
        assert!(grounded.content.is_none());
        assert!(app.is_searching);
        assert!(app.pending.iter().all(|pending| *pending));
    }

    #[test]
    fn new_search_resets_prior_results_to_loading() {
        let mut app = App::with_client(None);
        app.query_input = "question".to_string();
        let epoch = app.begin_search_epoch();
        app.apply_outcome(Grounded, epoch, Ok(cited_response("answer")));
        app.apply_outcome(Analysis, epoch, Err("boom".to_string()));
        app.apply_outcome(Conversational, epoch, Ok(sample_response("answer")));

        app.begin_search_epoch();
        for state in &app.results {
            assert!(state.is_loading);
            assert!(state.content.is_none());
            assert!(state.error.is_none());
            assert!(state.sources.is_empty());
            assert!(state.score.is_none());
        }
        assert!(app.search_started.is_some());
    }
}
