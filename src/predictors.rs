use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::task::JoinHandle;

use crate::{
    assistants::AssistantClient,
    configs::PredictorConfig,
    languages::Language,
    models::ModelBackend,
    translations::Suggestion,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorPhase {
    Idle,
    /// Waiting out the debounce delay.
    Pending,
    /// A predict call is in flight.
    Predicting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextChange {
    /// Too short to be worth predicting; suggestions were withdrawn.
    BelowThreshold,
    Scheduled { token: u64 },
}

/// Where predictions end up. Called with the predictor's internal lock held,
/// so implementations must not call back into the predictor.
pub trait SuggestionSink: Send + Sync + 'static {
    /// Read when the timer fires, not when the text changed.
    fn source_language(&self) -> Language;
    fn prediction_started(&self);
    fn publish(&self, suggestions: Vec<Suggestion>);
    /// Drops suggestions that belong to older text.
    fn withdraw(&self);
}

struct Slot {
    token: u64,
    phase: PredictorPhase,
    task: Option<JoinHandle<()>>,
}

/// Turns a stream of text changes into at most one predict call per pause
/// in typing.
///
/// Every change bumps a request token. A reply is only published if its
/// token is still the latest, so an older request finishing late can never
/// replace suggestions for newer text. Must be used inside a tokio runtime.
pub struct DebouncedPredictor<B> {
    client: Arc<AssistantClient<B>>,
    sink: Arc<dyn SuggestionSink>,
    delay: Duration,
    min_chars: usize,
    slot: Arc<Mutex<Slot>>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: ModelBackend + 'static> DebouncedPredictor<B> {
    pub fn new(
        client: Arc<AssistantClient<B>>,
        sink: Arc<dyn SuggestionSink>,
        config: &PredictorConfig,
    ) -> Self {
        Self {
            client,
            sink,
            delay: config.debounce(),
            min_chars: config.min_chars,
            slot: Arc::new(Mutex::new(Slot {
                token: 0,
                phase: PredictorPhase::Idle,
                task: None,
            })),
        }
    }

    pub fn phase(&self) -> PredictorPhase {
        lock(&self.slot).phase
    }

    pub fn on_text_change(&self, text: &str) -> TextChange {
        let mut slot = lock(&self.slot);
        let token = supersede(&mut slot);
        self.sink.withdraw();

        if text.trim().chars().count() < self.min_chars {
            return TextChange::BelowThreshold;
        }

        slot.phase = PredictorPhase::Pending;
        slot.task = Some(tokio::spawn(fire(
            Arc::clone(&self.client),
            Arc::clone(&self.sink),
            Arc::clone(&self.slot),
            token,
            text.to_string(),
            self.delay,
        )));
        tracing::debug!(token, "prediction scheduled");

        TextChange::Scheduled { token }
    }

    /// Forgets any pending or in-flight prediction and withdraws suggestions.
    pub fn cancel(&self) {
        let mut slot = lock(&self.slot);
        supersede(&mut slot);
        self.sink.withdraw();
    }
}

fn supersede(slot: &mut Slot) -> u64 {
    slot.token += 1;
    if let Some(task) = slot.task.take() {
        match slot.phase {
            PredictorPhase::Pending => {
                task.abort();
                tracing::debug!(token = slot.token - 1, "pending prediction superseded");
            }
            // In-flight requests run to completion; the reply is dropped on arrival.
            PredictorPhase::Predicting | PredictorPhase::Idle => {}
        }
    }
    slot.phase = PredictorPhase::Idle;
    slot.token
}

async fn fire<B: ModelBackend>(
    client: Arc<AssistantClient<B>>,
    sink: Arc<dyn SuggestionSink>,
    slot: Arc<Mutex<Slot>>,
    token: u64,
    text: String,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;

    let language = {
        let mut slot = lock(&slot);
        if slot.token != token {
            return;
        }
        slot.phase = PredictorPhase::Predicting;
        sink.prediction_started();
        sink.source_language()
    };

    let response = client.predict(&text, language).await;

    let mut slot = lock(&slot);
    if slot.token != token {
        tracing::debug!(token, latest = slot.token, "dropping stale prediction");
        return;
    }
    slot.phase = PredictorPhase::Idle;
    slot.task = None;
    sink.publish(response.suggestions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Reply, ScriptedBackend, suggestion};
    use tokio::time::sleep;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Started,
        Published(Vec<Suggestion>),
        Withdrawn,
    }

    struct RecordingSink {
        language: Mutex<Language>,
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                language: Mutex::new(Language::English),
                events: Mutex::new(Vec::new()),
            })
        }

        fn published(&self) -> Vec<Vec<Suggestion>> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    Event::Published(s) => Some(s.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl SuggestionSink for RecordingSink {
        fn source_language(&self) -> Language {
            *self.language.lock().unwrap()
        }
        fn prediction_started(&self) {
            self.events.lock().unwrap().push(Event::Started);
        }
        fn publish(&self, suggestions: Vec<Suggestion>) {
            self.events.lock().unwrap().push(Event::Published(suggestions));
        }
        fn withdraw(&self) {
            self.events.lock().unwrap().push(Event::Withdrawn);
        }
    }

    fn predictor(
        backend: &ScriptedBackend,
        sink: &Arc<RecordingSink>,
    ) -> DebouncedPredictor<ScriptedBackend> {
        let client = Arc::new(AssistantClient::new(
            backend.clone(),
            Duration::from_secs(30),
        ));
        DebouncedPredictor::new(client, sink.clone(), &PredictorConfig::default())
    }

    const fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn short_input_never_calls_the_model() {
        let backend = ScriptedBackend::new();
        let sink = RecordingSink::new();
        let predictor = predictor(&backend, &sink);

        for text in ["H", "Hi", "  Hi  ", ""] {
            assert_eq!(predictor.on_text_change(text), TextChange::BelowThreshold);
        }
        sleep(ms(5_000)).await;

        assert!(backend.calls().is_empty());
        assert_eq!(predictor.phase(), PredictorPhase::Idle);
        assert_eq!(*sink.events.lock().unwrap(), vec![Event::Withdrawn; 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_counts_characters_not_bytes() {
        let backend = ScriptedBackend::repeating(Reply::predictions(&[]));
        let sink = RecordingSink::new();
        let predictor = predictor(&backend, &sink);

        // Two Tamil letters are six bytes.
        assert_eq!(predictor.on_text_change("வண"), TextChange::BelowThreshold);
        assert!(matches!(
            predictor.on_text_change("வணக"),
            TextChange::Scheduled { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn fires_only_after_the_delay() {
        let backend = ScriptedBackend::new();
        backend.push(Reply::predictions(&[suggestion("Hello there")]));
        let sink = RecordingSink::new();
        let predictor = predictor(&backend, &sink);

        predictor.on_text_change("Hello");
        assert_eq!(predictor.phase(), PredictorPhase::Pending);

        sleep(ms(599)).await;
        assert!(backend.calls().is_empty());

        sleep(ms(2)).await;
        assert_eq!(backend.inputs(), vec!["Hello"]);
        assert_eq!(sink.published(), vec![vec![suggestion("Hello there")]]);
        assert_eq!(predictor.phase(), PredictorPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_typing_collapses_into_one_call() {
        let backend = ScriptedBackend::repeating(Reply::predictions(&[suggestion("x")]));
        let sink = RecordingSink::new();
        let predictor = predictor(&backend, &sink);

        for text in ["Hel", "Hell", "Hello", "Hello h", "Hello how"] {
            predictor.on_text_change(text);
            sleep(ms(200)).await;
        }
        sleep(ms(1_000)).await;

        assert_eq!(backend.inputs(), vec!["Hello how"]);
        assert_eq!(sink.published().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_for_older_text_is_dropped() {
        let backend = ScriptedBackend::new();
        backend.push(Reply::predictions(&[suggestion("stale")]).after(ms(2_000)));
        backend.push(Reply::predictions(&[suggestion("fresh")]).after(ms(10)));
        let sink = RecordingSink::new();
        let predictor = predictor(&backend, &sink);

        predictor.on_text_change("first");
        sleep(ms(650)).await;
        assert_eq!(predictor.phase(), PredictorPhase::Predicting);

        predictor.on_text_change("second");
        sleep(ms(5_000)).await;

        assert_eq!(backend.inputs(), vec!["first", "second"]);
        assert_eq!(sink.published(), vec![vec![suggestion("fresh")]]);
        assert_eq!(predictor.phase(), PredictorPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn language_is_read_when_the_timer_fires() {
        let backend = ScriptedBackend::repeating(Reply::predictions(&[]));
        let sink = RecordingSink::new();
        let predictor = predictor(&backend, &sink);

        predictor.on_text_change("Vanakkam");
        sleep(ms(300)).await;
        *sink.language.lock().unwrap() = Language::Tamil;
        sleep(ms(400)).await;

        assert_eq!(backend.calls()[0].envelope["source_language"], "Tamil");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_a_pending_prediction() {
        let backend = ScriptedBackend::repeating(Reply::predictions(&[suggestion("x")]));
        let sink = RecordingSink::new();
        let predictor = predictor(&backend, &sink);

        predictor.on_text_change("Hello");
        sleep(ms(100)).await;
        predictor.cancel();
        sleep(ms(2_000)).await;

        assert!(backend.calls().is_empty());
        assert!(sink.published().is_empty());
        assert_eq!(predictor.phase(), PredictorPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_prediction_publishes_nothing_to_show() {
        let backend = ScriptedBackend::new();
        backend.push(Reply::failure("503"));
        let sink = RecordingSink::new();
        let predictor = predictor(&backend, &sink);

        predictor.on_text_change("Hello");
        sleep(ms(700)).await;

        assert_eq!(
            *sink.events.lock().unwrap(),
            vec![Event::Withdrawn, Event::Started, Event::Published(vec![])]
        );
    }
}
