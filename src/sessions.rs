use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use serde::Serialize;
use tokio::sync::watch;

use crate::{
    assistants::AssistantClient,
    configs::AppConfig,
    languages::Language,
    models::ModelBackend,
    predictors::{DebouncedPredictor, PredictorPhase, SuggestionSink, TextChange},
    translations::{Suggestion, TranslationResult},
};

/// Everything the front-end renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub source_language: Language,
    pub target_language: Language,
    pub input_text: String,
    pub suggestions: Vec<Suggestion>,
    pub translation: Option<TranslationResult>,
    pub is_predicting: bool,
    pub is_translating: bool,
}

impl SessionState {
    pub fn new(source_language: Language, target_language: Language) -> Self {
        Self {
            source_language,
            target_language,
            input_text: String::new(),
            suggestions: Vec::new(),
            translation: None,
            is_predicting: false,
            is_translating: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationOutcome {
    Applied,
    /// The model gave nothing usable; the previous translation stays.
    Failed,
    /// A newer translate request or a clear happened while this one ran.
    Superseded,
    /// Nothing to translate.
    Skipped,
}

struct StateCell(watch::Sender<SessionState>);

impl StateCell {
    fn update(&self, modify: impl FnOnce(&mut SessionState)) {
        self.0.send_modify(modify);
    }
}

impl SuggestionSink for StateCell {
    fn source_language(&self) -> Language {
        self.0.borrow().source_language
    }

    fn prediction_started(&self) {
        self.update(|s| s.is_predicting = true);
    }

    fn publish(&self, suggestions: Vec<Suggestion>) {
        self.update(|s| {
            s.suggestions = suggestions;
            s.is_predicting = false;
        });
    }

    fn withdraw(&self) {
        self.update(|s| {
            s.suggestions.clear();
            s.is_predicting = false;
        });
    }
}

/// Owns the session state and turns user actions into model calls.
///
/// Each handler runs to completion except while awaiting the model, so the
/// only interleaving comes from overlapping requests. Those are resolved by
/// tickets: a translation is applied only if no newer translate request and
/// no `clear` happened since it was issued.
pub struct SessionController<B> {
    client: Arc<AssistantClient<B>>,
    predictor: DebouncedPredictor<B>,
    state: Arc<StateCell>,
    translate_ticket: AtomicU64,
    clear_epoch: AtomicU64,
}

impl<B: ModelBackend + 'static> SessionController<B> {
    pub fn new(client: Arc<AssistantClient<B>>, config: &AppConfig) -> Self {
        let (tx, _) = watch::channel(SessionState::new(
            config.session.source_language,
            config.session.target_language,
        ));
        let state = Arc::new(StateCell(tx));
        let predictor = DebouncedPredictor::new(
            Arc::clone(&client),
            Arc::clone(&state) as Arc<dyn SuggestionSink>,
            &config.predictor,
        );

        Self {
            client,
            predictor,
            state,
            translate_ticket: AtomicU64::new(0),
            clear_epoch: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.0.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.0.subscribe()
    }

    pub fn predictor_phase(&self) -> PredictorPhase {
        self.predictor.phase()
    }

    /// Takes effect for the next prediction that fires; does not schedule one.
    pub fn set_source_language(&self, language: Language) {
        self.state.update(|s| s.source_language = language);
    }

    pub fn set_target_language(&self, language: Language) {
        self.state.update(|s| s.target_language = language);
    }

    pub fn set_input_text(&self, text: impl Into<String>) -> TextChange {
        let text = text.into();
        self.state.update(|s| s.input_text.clone_from(&text));
        self.predictor.on_text_change(&text)
    }

    pub async fn select_suggestion(&self, suggestion: &Suggestion) -> TranslationOutcome {
        self.predictor.cancel();
        let sentence = suggestion.native_script.clone();
        self.state.update(|s| s.input_text.clone_from(&sentence));
        self.run_translation(sentence).await
    }

    pub async fn manual_translate(&self) -> TranslationOutcome {
        let sentence = self.state.0.borrow().input_text.clone();
        if sentence.trim().is_empty() {
            return TranslationOutcome::Skipped;
        }
        self.run_translation(sentence).await
    }

    /// Wipes text, suggestions and translation. Language choices stay, and a
    /// translation still in flight will not be shown when it lands.
    pub fn clear(&self) {
        self.predictor.cancel();
        self.clear_epoch.fetch_add(1, Ordering::SeqCst);
        self.state.update(|s| {
            s.input_text.clear();
            s.suggestions.clear();
            s.translation = None;
        });
    }

    async fn run_translation(&self, sentence: String) -> TranslationOutcome {
        let ticket = self.translate_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let epoch = self.clear_epoch.load(Ordering::SeqCst);

        let (source, target) = {
            let state = self.state.0.borrow();
            (state.source_language, state.target_language)
        };
        self.state.update(|s| s.is_translating = true);

        let result = self.client.translate(&sentence, source, target).await;

        let latest = self.translate_ticket.load(Ordering::SeqCst) == ticket;
        let current = latest && self.clear_epoch.load(Ordering::SeqCst) == epoch;
        let outcome = match (&result, current) {
            (_, false) => TranslationOutcome::Superseded,
            (None, true) => TranslationOutcome::Failed,
            (Some(_), true) => TranslationOutcome::Applied,
        };
        if outcome == TranslationOutcome::Superseded {
            tracing::debug!(ticket, "dropping stale translation");
        }

        self.state.update(|s| {
            if latest {
                s.is_translating = false;
            }
            if current && result.is_some() {
                s.translation = result;
            }
        });

        outcome
    }
}
