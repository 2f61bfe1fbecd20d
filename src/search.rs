//! Display-model types shared by the orchestrator and the UI: the three
//! backend variants, the per-variant settlement state, and the cosmetic
//! quality score.

use rand::Rng;

use crate::gemini::{Citation, SearchResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchVariant {
    Grounded,
    Analysis,
    Conversational,
}

impl SearchVariant {
    pub const ALL: [SearchVariant; 3] = [
        SearchVariant::Grounded,
        SearchVariant::Analysis,
        SearchVariant::Conversational,
    ];

    pub fn index(&self) -> usize {
        match self {
            SearchVariant::Grounded => 0,
            SearchVariant::Analysis => 1,
            SearchVariant::Conversational => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchVariant::Grounded => "grounded",
            SearchVariant::Analysis => "analysis",
            SearchVariant::Conversational => "conversational",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SearchVariant::Grounded => "Grounded Search",
            SearchVariant::Analysis => "Deep Analysis",
            SearchVariant::Conversational => "Conversational",
        }
    }
}

/// State of one result panel. At steady state exactly one of loading,
/// content, or error holds.
#[derive(Debug, Clone, Default)]
pub struct ResultState {
    pub content: Option<String>,
    pub sources: Vec<Citation>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub score: Option<f64>,
}

impl ResultState {
    /// Reset to loading at the start of a search, clearing stale fields.
    pub fn begin_loading(&mut self) {
        *self = ResultState {
            is_loading: true,
            ..ResultState::default()
        };
    }

    pub fn settle_success(&mut self, response: SearchResponse) {
        *self = ResultState {
            content: Some(response.text),
            sources: response.citations,
            is_loading: false,
            error: None,
            score: Some(generate_score()),
        };
    }

    pub fn settle_error(&mut self, message: String) {
        *self = ResultState {
            error: Some(message),
            ..ResultState::default()
        };
    }

    pub fn is_settled_success(&self) -> bool {
        !self.is_loading && self.error.is_none() && self.content.is_some()
    }

    /// Citations with a usable address. The normalizer already filters these,
    /// but the render boundary filters again.
    pub fn valid_sources(&self) -> impl Iterator<Item = &Citation> {
        self.sources.iter().filter(|source| !source.uri.is_empty())
    }
}

/// Uniform draw in [3.5, 5.0). Purely decorative; not derived from the
/// response in any way.
pub fn generate_score() -> f64 {
    rand::thread_rng().gen_range(3.5..5.0)
}

/// Filled-star count for a score, rounded and clamped to the 0..=5 range.
pub fn star_count(score: f64) -> usize {
    (score.round() as i64).clamp(0, 5) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response(text: &str) -> SearchResponse {
        SearchResponse {
            text: text.to_string(),
            citations: vec![Citation {
                uri: "https://example.com".to_string(),
                title: Some("Example".to_string()),
            }],
        }
    }

    #[test]
    fn score_stays_in_band() {
        for _ in 0..200 {
            let score = generate_score();
            assert!((3.5..5.0).contains(&score), "score {} out of band", score);
        }
    }

    #[test]
    fn stars_round_and_clamp() {
        assert_eq!(star_count(3.5), 4);
        assert_eq!(star_count(4.4), 4);
        assert_eq!(star_count(4.5), 5);
        assert_eq!(star_count(4.99), 5);
        assert_eq!(star_count(0.2), 0);
        assert_eq!(star_count(7.3), 5);
        assert_eq!(star_count(-1.0), 0);
    }

    #[test]
    fn begin_loading_clears_previous_settlement() {
        let mut state = ResultState::default();
        state.settle_success(sample_response("old answer"));
        assert!(state.is_settled_success());

        state.begin_loading();
        assert!(state.is_loading);
        assert!(state.content.is_none());
        assert!(state.sources.is_empty());
        assert!(state.error.is_none());
        assert!(state.score.is_none());
    }

    #[test]
    fn settle_success_sets_content_and_score() {
        let mut state = ResultState::default();
        state.begin_loading();
        state.settle_success(sample_response("fresh answer"));

        assert!(!state.is_loading);
        assert_eq!(state.content.as_deref(), Some("fresh answer"));
        assert_eq!(state.sources.len(), 1);
        assert!(state.error.is_none());
        let score = state.score.expect("score assigned on success");
        assert!((3.5..5.0).contains(&score));
    }

    #[test]
    fn settle_error_keeps_only_the_message() {
        let mut state = ResultState::default();
        state.settle_success(sample_response("stale"));
        state.begin_loading();
        state.settle_error("Quota exceeded".to_string());

        assert!(!state.is_loading);
        assert!(state.content.is_none());
        assert!(state.sources.is_empty());
        assert!(state.score.is_none());
        assert_eq!(state.error.as_deref(), Some("Quota exceeded"));
    }

    #[test]
    fn valid_sources_drops_empty_uris() {
        let mut state = ResultState::default();
        state.sources = vec![
            Citation {
                uri: "https://a.example".to_string(),
                title: None,
            },
            Citation {
                uri: String::new(),
                title: Some("no address".to_string()),
            },
        ];
        let valid: Vec<_> = state.valid_sources().collect();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].uri, "https://a.example");
    }
}
