//! The conversation controller.
//!
//! Owns the application state (current image, transcript, busy flag, last analysis,
//! init error) and drives the [`VisionClient`]. Every remote failure is absorbed here
//! into either an assistant turn or the init error; nothing propagates to the caller
//! except [`VislensError::Busy`] for overlapping operations.
//!
//! The busy flag is a single gate: at most one operation runs at a time. It is taken
//! with a compare-and-swap at the start of an operation and released by a guard when
//! the operation's future completes or is dropped.

use crate::config::DEFAULT_IMAGE_CANDIDATES;
use crate::conversation::events::ConversationEvent;
use crate::conversation::models::{ConversationState, ConversationTurn, OperationState};
use crate::conversation::texts::{
    welcome_message, ANALYSIS_FAILED_APOLOGY, CHAT_FAILED_APOLOGY, DEFAULT_IMAGE_NOT_FOUND,
};
use crate::error::{Result, VislensError};
use crate::image::{load_first, ImageFetcher, ImageHandle, ImageLoader, ImageSource};
use crate::vision::VisionClient;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// Events buffered per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 64;

pub struct ConversationController {
    client: Arc<dyn VisionClient>,
    fetcher: Arc<dyn ImageFetcher>,
    default_sources: Vec<ImageSource>,
    state: Mutex<ConversationState>,
    busy: AtomicBool,
    events: broadcast::Sender<ConversationEvent>,
}

struct BusyGuard<'a> {
    busy: &'a AtomicBool,
    events: &'a broadcast::Sender<ConversationEvent>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        let _ = self.events.send(ConversationEvent::BusyChanged(false));
    }
}

impl ConversationController {
    pub fn builder(client: Arc<dyn VisionClient>) -> ConversationControllerBuilder {
        ConversationControllerBuilder::new(client)
    }

    /// Receive every state change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// A copy of the current state for rendering
    pub async fn snapshot(&self) -> ConversationState {
        let mut snapshot = self.state.lock().await.clone();
        snapshot.busy = self.is_busy();
        if snapshot.busy {
            snapshot.status = OperationState::Loading;
        }
        snapshot
    }

    /// Probe the default image candidates in order and analyze the first that loads.
    ///
    /// If none loads, the init error is set and the controller waits for a manual upload.
    pub async fn bootstrap(&self) -> Result<OperationState> {
        let guard = self.try_begin().ok_or(VislensError::Busy)?;

        match load_first(self.fetcher.as_ref(), &self.default_sources).await {
            Some(image) => {
                self.set_image(image.clone()).await;
                Ok(self.run_analysis(&image, &guard).await)
            }
            None => {
                warn!("No default image could be loaded; waiting for manual upload");
                self.set_init_error(Some(DEFAULT_IMAGE_NOT_FOUND.to_string())).await;
                Ok(self.finish(OperationState::Error).await)
            }
        }
    }

    /// Analyze an image and append a welcome (or apology) turn.
    pub async fn analyze(&self, image: &ImageHandle) -> Result<OperationState> {
        let guard = self.try_begin().ok_or(VislensError::Busy)?;
        Ok(self.run_analysis(image, &guard).await)
    }

    /// Analyze the current image again; `Idle` when there is none.
    pub async fn reanalyze(&self) -> Result<OperationState> {
        let guard = self.try_begin().ok_or(VislensError::Busy)?;

        let current = self.state.lock().await.current_image.clone();
        match current {
            Some(image) => Ok(self.run_analysis(&image, &guard).await),
            None => Ok(OperationState::Idle),
        }
    }

    /// Switch to a new image and analyze it.
    ///
    /// The transcript is kept; the new welcome turn is appended after existing history.
    pub async fn replace_image(&self, image: ImageHandle) -> Result<OperationState> {
        let guard = self.try_begin().ok_or(VislensError::Busy)?;

        self.set_image(image.clone()).await;
        Ok(self.run_analysis(&image, &guard).await)
    }

    /// Ask a question about the current image.
    ///
    /// Skipped (`Idle`) when there is no image, another operation is running, or the
    /// text is blank. The user turn is appended before the remote call and is kept even
    /// if the call fails.
    pub async fn submit_user_message(&self, text: &str) -> OperationState {
        if text.trim().is_empty() {
            return OperationState::Idle;
        }

        let image = match self.state.lock().await.current_image.clone() {
            Some(image) => image,
            None => {
                debug!("Ignoring message: no image loaded");
                return OperationState::Idle;
            }
        };

        let Some(_guard) = self.try_begin() else {
            debug!("Ignoring message: another operation is in progress");
            return OperationState::Idle;
        };

        let user_turn = ConversationTurn::user(text);
        let prior_turns = {
            let mut state = self.state.lock().await;
            let prior = state.turns.iter().map(ConversationTurn::as_prior).collect::<Vec<_>>();
            state.turns.push(user_turn.clone());
            prior
        };
        self.emit(ConversationEvent::TurnAppended(user_turn));

        let outcome = match self.client.respond(&image, text, &prior_turns).await {
            Ok(answer) => {
                self.append_turn(ConversationTurn::assistant(answer)).await;
                OperationState::Ready
            }
            Err(e) => {
                warn!("Chat request failed: {}", e);
                self.append_turn(ConversationTurn::assistant(CHAT_FAILED_APOLOGY)).await;
                OperationState::Error
            }
        };
        self.finish(outcome).await
    }

    async fn run_analysis(&self, image: &ImageHandle, _guard: &BusyGuard<'_>) -> OperationState {
        self.set_init_error(None).await;
        info!("Analyzing {}", image.display_reference());

        let outcome = match self.client.summarize(image).await {
            Ok(outcome) => {
                if outcome.is_degraded() {
                    warn!("Analysis returned unparsable content; using fallback summary");
                }
                let summary = outcome.into_summary();
                let welcome = welcome_message(&summary.summary);

                self.state.lock().await.analysis = Some(summary.clone());
                self.emit(ConversationEvent::AnalysisUpdated(summary));
                self.append_turn(ConversationTurn::assistant(welcome)).await;
                OperationState::Ready
            }
            Err(e) => {
                warn!("AI analysis error: {}", e);
                self.append_turn(ConversationTurn::assistant(ANALYSIS_FAILED_APOLOGY)).await;
                OperationState::Error
            }
        };
        self.finish(outcome).await
    }

    async fn finish(&self, outcome: OperationState) -> OperationState {
        self.state.lock().await.status = outcome;
        outcome
    }

    fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.emit(ConversationEvent::BusyChanged(true));

        Some(BusyGuard {
            busy: &self.busy,
            events: &self.events,
        })
    }

    async fn set_image(&self, image: ImageHandle) {
        let display_reference = image.display_reference().to_string();
        self.state.lock().await.current_image = Some(image);
        self.emit(ConversationEvent::ImageChanged { display_reference });
    }

    async fn set_init_error(&self, init_error: Option<String>) {
        let changed = {
            let mut state = self.state.lock().await;
            let changed = state.init_error != init_error;
            state.init_error = init_error.clone();
            changed
        };
        if changed {
            self.emit(ConversationEvent::InitErrorChanged(init_error));
        }
    }

    async fn append_turn(&self, turn: ConversationTurn) {
        self.state.lock().await.turns.push(turn.clone());
        self.emit(ConversationEvent::TurnAppended(turn));
    }

    fn emit(&self, event: ConversationEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Builder for [`ConversationController`]
pub struct ConversationControllerBuilder {
    client: Arc<dyn VisionClient>,
    fetcher: Option<Arc<dyn ImageFetcher>>,
    default_sources: Vec<ImageSource>,
}

impl ConversationControllerBuilder {
    fn new(client: Arc<dyn VisionClient>) -> Self {
        Self {
            client,
            fetcher: None,
            default_sources: ImageSource::parse_list(DEFAULT_IMAGE_CANDIDATES),
        }
    }

    /// Where default images are fetched from (defaults to [`ImageLoader`])
    pub fn fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Ordered candidates probed by [`ConversationController::bootstrap`]
    pub fn default_sources(mut self, sources: Vec<ImageSource>) -> Self {
        self.default_sources = sources;
        self
    }

    pub fn build(self) -> Result<ConversationController> {
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(ImageLoader::new()?),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(ConversationController {
            client: self.client,
            fetcher,
            default_sources: self.default_sources,
            state: Mutex::new(ConversationState::default()),
            busy: AtomicBool::new(false),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::models::{AnalysisSummary, PriorTurn, Speaker};
    use crate::vision::prompts::FALLBACK_SUMMARY;
    use crate::vision::SummaryOutcome;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeVision {
        summaries: std::sync::Mutex<VecDeque<Result<SummaryOutcome>>>,
        answers: std::sync::Mutex<VecDeque<Result<String>>>,
        summarize_calls: AtomicUsize,
        respond_calls: std::sync::Mutex<Vec<(String, Vec<PriorTurn>)>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeVision {
        fn summary_ok(self, summary: &str, tags: &[&str]) -> Self {
            self.summaries.lock().unwrap().push_back(Ok(SummaryOutcome::Structured(
                AnalysisSummary {
                    summary: summary.to_string(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                },
            )));
            self
        }

        fn summary_degraded(self) -> Self {
            self.summaries.lock().unwrap().push_back(Ok(SummaryOutcome::Degraded {
                reason: "expected value".to_string(),
            }));
            self
        }

        fn summary_err(self) -> Self {
            self.summaries
                .lock()
                .unwrap()
                .push_back(Err(VislensError::GatewayError("401 Unauthorized".to_string())));
            self
        }

        fn answer_ok(self, answer: &str) -> Self {
            self.answers.lock().unwrap().push_back(Ok(answer.to_string()));
            self
        }

        fn answer_err(self) -> Self {
            self.answers
                .lock()
                .unwrap()
                .push_back(Err(VislensError::GatewayError("network unreachable".to_string())));
            self
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn respond_count(&self) -> usize {
            self.respond_calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl VisionClient for FakeVision {
        async fn summarize(&self, _image: &ImageHandle) -> Result<SummaryOutcome> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.summarize_calls.fetch_add(1, Ordering::SeqCst);
            self.summaries
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(VislensError::GatewayError("unscripted".to_string())))
        }

        async fn respond(
            &self,
            _image: &ImageHandle,
            question: &str,
            prior_turns: &[PriorTurn],
        ) -> Result<String> {
            self.respond_calls
                .lock()
                .unwrap()
                .push((question.to_string(), prior_turns.to_vec()));
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(VislensError::GatewayError("unscripted".to_string())))
        }
    }

    struct FakeFetcher {
        available: Vec<ImageSource>,
        attempts: std::sync::Mutex<Vec<ImageSource>>,
    }

    impl FakeFetcher {
        fn with_available(available: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                available: available.iter().map(|s| ImageSource::parse(s)).collect(),
                attempts: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<ImageSource> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, source: &ImageSource) -> Result<ImageHandle> {
            self.attempts.lock().unwrap().push(source.clone());
            if self.available.contains(source) {
                Ok(ImageHandle::from_encoded("aGk=", "image/jpeg", source.to_string()))
            } else {
                Err(VislensError::ImageError(format!("{} returned 404 Not Found", source)))
            }
        }
    }

    fn controller(vision: Arc<FakeVision>, fetcher: Arc<FakeFetcher>) -> ConversationController {
        ConversationController::builder(vision)
            .fetcher(fetcher)
            .default_sources(ImageSource::parse_list("./photo.jpg,./cover.jpg"))
            .build()
            .unwrap()
    }

    fn image(name: &str) -> ImageHandle {
        ImageHandle::from_encoded("aGk=", "image/png", name)
    }

    fn drain(rx: &mut broadcast::Receiver<ConversationEvent>) -> Vec<ConversationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn busy_transitions(events: &[ConversationEvent]) -> Vec<bool> {
        events
            .iter()
            .filter_map(|e| match e {
                ConversationEvent::BusyChanged(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_submit_without_image_is_noop() {
        let vision = Arc::new(FakeVision::default().answer_ok("unused"));
        let ctrl = controller(vision.clone(), FakeFetcher::with_available(&[]));
        let mut rx = ctrl.subscribe();

        for text in ["what is this?", "hello", "anything?"] {
            assert_eq!(ctrl.submit_user_message(text).await, OperationState::Idle);
        }

        assert_eq!(vision.respond_count(), 0);
        assert!(ctrl.snapshot().await.turns.is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_submit_blank_text_is_noop() {
        let vision = Arc::new(FakeVision::default().summary_ok("a cat", &[]).answer_ok("x"));
        let ctrl = controller(vision.clone(), FakeFetcher::with_available(&[]));
        ctrl.replace_image(image("cat.png")).await.unwrap();

        assert_eq!(ctrl.submit_user_message("   \n\t").await, OperationState::Idle);
        assert_eq!(ctrl.submit_user_message("").await, OperationState::Idle);

        assert_eq!(vision.respond_count(), 0);
        assert_eq!(ctrl.snapshot().await.turns.len(), 1);
    }

    #[tokio::test]
    async fn test_successful_analysis() {
        let vision = Arc::new(FakeVision::default().summary_ok("a red bicycle", &["bicycle"]));
        let ctrl = controller(vision, FakeFetcher::with_available(&[]));
        let mut rx = ctrl.subscribe();

        let state = ctrl.analyze(&image("bike.png")).await.unwrap();

        assert_eq!(state, OperationState::Ready);
        let snapshot = ctrl.snapshot().await;
        assert_eq!(snapshot.turns.len(), 1);
        assert_eq!(snapshot.turns[0].speaker, Speaker::Assistant);
        assert_eq!(snapshot.turns[0].text, welcome_message("a red bicycle"));
        assert_eq!(
            snapshot.analysis,
            Some(AnalysisSummary {
                summary: "a red bicycle".to_string(),
                tags: vec!["bicycle".to_string()],
            })
        );
        assert!(!snapshot.busy);
        assert_eq!(snapshot.status, OperationState::Ready);
        assert_eq!(busy_transitions(&drain(&mut rx)), vec![true, false]);
    }

    #[tokio::test]
    async fn test_failed_analysis_keeps_prior_summary() {
        let vision = Arc::new(
            FakeVision::default()
                .summary_ok("a red bicycle", &["bicycle", "red"])
                .summary_err(),
        );
        let ctrl = controller(vision, FakeFetcher::with_available(&[]));
        ctrl.analyze(&image("bike.png")).await.unwrap();
        let before = ctrl.snapshot().await.analysis;
        let mut rx = ctrl.subscribe();

        let state = ctrl.analyze(&image("bike.png")).await.unwrap();

        assert_eq!(state, OperationState::Error);
        let snapshot = ctrl.snapshot().await;
        assert_eq!(snapshot.turns.len(), 2);
        assert_eq!(snapshot.turns[1].speaker, Speaker::Assistant);
        assert_eq!(snapshot.turns[1].text, ANALYSIS_FAILED_APOLOGY);
        assert_eq!(snapshot.analysis, before);
        assert!(snapshot.init_error.is_none());
        assert!(!snapshot.busy);
        assert_eq!(busy_transitions(&drain(&mut rx)), vec![true, false]);
    }

    #[tokio::test]
    async fn test_degraded_analysis_uses_fallback_summary() {
        let vision = Arc::new(FakeVision::default().summary_degraded());
        let ctrl = controller(vision, FakeFetcher::with_available(&[]));

        let state = ctrl.analyze(&image("noise.png")).await.unwrap();

        assert_eq!(state, OperationState::Ready);
        let snapshot = ctrl.snapshot().await;
        let analysis = snapshot.analysis.unwrap();
        assert_eq!(analysis.summary, FALLBACK_SUMMARY);
        assert!(analysis.tags.is_empty());
        assert!(snapshot.turns[0].text.contains(FALLBACK_SUMMARY));
    }

    #[tokio::test]
    async fn test_bootstrap_short_circuits_on_first_success() {
        let vision = Arc::new(FakeVision::default().summary_ok("a red bicycle", &[]));
        let fetcher = FakeFetcher::with_available(&["./photo.jpg", "./cover.jpg"]);
        let ctrl = controller(vision, fetcher.clone());

        ctrl.bootstrap().await.unwrap();

        assert_eq!(fetcher.attempts(), vec![ImageSource::parse("./photo.jpg")]);
        let snapshot = ctrl.snapshot().await;
        assert_eq!(snapshot.current_image.unwrap().display_reference(), "./photo.jpg");
    }

    #[tokio::test]
    async fn test_bootstrap_falls_back_to_second_candidate() {
        let vision = Arc::new(FakeVision::default().summary_ok("a book cover", &[]));
        let fetcher = FakeFetcher::with_available(&["./cover.jpg"]);
        let ctrl = controller(vision, fetcher.clone());

        let state = ctrl.bootstrap().await.unwrap();

        assert_eq!(state, OperationState::Ready);
        assert_eq!(fetcher.attempts().len(), 2);
        let snapshot = ctrl.snapshot().await;
        assert_eq!(snapshot.current_image.unwrap().display_reference(), "./cover.jpg");
    }

    #[tokio::test]
    async fn test_scenario_both_default_paths_fail() {
        let vision = Arc::new(FakeVision::default());
        let ctrl = controller(vision.clone(), FakeFetcher::with_available(&[]));

        let state = ctrl.bootstrap().await.unwrap();

        assert_eq!(state, OperationState::Error);
        let snapshot = ctrl.snapshot().await;
        assert_eq!(snapshot.init_error.as_deref(), Some(DEFAULT_IMAGE_NOT_FOUND));
        assert!(!snapshot.busy);
        assert!(snapshot.turns.is_empty());
        assert!(snapshot.current_image.is_none());
        assert_eq!(vision.summarize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scenario_default_image_analyzed() {
        let vision = Arc::new(
            FakeVision::default().summary_ok("a red bicycle", &["bicycle", "red", "outdoor"]),
        );
        let ctrl = controller(vision, FakeFetcher::with_available(&["./photo.jpg"]));

        ctrl.bootstrap().await.unwrap();

        let snapshot = ctrl.snapshot().await;
        assert_eq!(snapshot.turns[0].speaker, Speaker::Assistant);
        assert!(snapshot.turns[0].text.contains("a red bicycle"));
        assert_eq!(
            crate::render::tag_chips(snapshot.analysis.as_ref()),
            vec!["bicycle", "red", "outdoor"]
        );
    }

    #[tokio::test]
    async fn test_scenario_chat_failure_appends_apology() {
        let vision = Arc::new(FakeVision::default().summary_ok("a red bicycle", &[]).answer_err());
        let ctrl = controller(vision, FakeFetcher::with_available(&["./photo.jpg"]));
        ctrl.bootstrap().await.unwrap();

        let state = ctrl.submit_user_message("what color is it?").await;

        assert_eq!(state, OperationState::Error);
        let snapshot = ctrl.snapshot().await;
        let n = snapshot.turns.len();
        assert_eq!(snapshot.turns[n - 2].speaker, Speaker::User);
        assert_eq!(snapshot.turns[n - 2].text, "what color is it?");
        assert_eq!(snapshot.turns[n - 1].speaker, Speaker::Assistant);
        assert_eq!(snapshot.turns[n - 1].text, CHAT_FAILED_APOLOGY);
        assert!(!snapshot.busy);
    }

    #[tokio::test]
    async fn test_chat_remains_usable_after_failure() {
        let vision = Arc::new(
            FakeVision::default().summary_ok("a cat", &[]).answer_err().answer_ok("Orange."),
        );
        let ctrl = controller(vision, FakeFetcher::with_available(&["./photo.jpg"]));
        ctrl.bootstrap().await.unwrap();

        ctrl.submit_user_message("what color?").await;
        let state = ctrl.submit_user_message("what color, again?").await;

        assert_eq!(state, OperationState::Ready);
        let snapshot = ctrl.snapshot().await;
        assert_eq!(snapshot.turns.last().unwrap().text, "Orange.");
    }

    #[tokio::test]
    async fn test_scenario_new_upload_overwrites_analysis_keeps_history() {
        let vision = Arc::new(
            FakeVision::default()
                .summary_ok("a red bicycle", &["bicycle"])
                .answer_ok("Red.")
                .summary_ok("a blue car", &["car", "blue"]),
        );
        let ctrl = controller(vision, FakeFetcher::with_available(&["./photo.jpg"]));
        ctrl.bootstrap().await.unwrap();
        ctrl.submit_user_message("what color is it?").await;
        let before = ctrl.snapshot().await.turns;

        let state = ctrl.replace_image(image("car.png")).await.unwrap();

        assert_eq!(state, OperationState::Ready);
        let snapshot = ctrl.snapshot().await;
        assert_eq!(
            snapshot.analysis,
            Some(AnalysisSummary {
                summary: "a blue car".to_string(),
                tags: vec!["car".to_string(), "blue".to_string()],
            })
        );
        assert_eq!(&snapshot.turns[..before.len()], &before[..]);
        assert_eq!(snapshot.turns.len(), before.len() + 1);
        assert!(snapshot.turns.last().unwrap().text.contains("a blue car"));
        assert_eq!(snapshot.current_image.unwrap().display_reference(), "car.png");
    }

    #[tokio::test]
    async fn test_transcript_has_two_turns_per_exchange() {
        let vision = Arc::new(
            FakeVision::default()
                .summary_ok("a red bicycle", &[])
                .answer_ok("Red.")
                .answer_ok("On a street.")
                .answer_ok("Yes."),
        );
        let ctrl = controller(vision, FakeFetcher::with_available(&["./photo.jpg"]));
        ctrl.bootstrap().await.unwrap();

        let questions = ["what color?", "where?", "is it parked?"];
        for q in questions {
            assert_eq!(ctrl.submit_user_message(q).await, OperationState::Ready);
        }

        let turns = ctrl.snapshot().await.turns;
        assert_eq!(turns.len(), 2 * questions.len() + 1);
        assert_eq!(turns[0].speaker, Speaker::Assistant);
        for (i, q) in questions.iter().enumerate() {
            assert_eq!(turns[1 + 2 * i].speaker, Speaker::User);
            assert_eq!(turns[1 + 2 * i].text, *q);
            assert_eq!(turns[2 + 2 * i].speaker, Speaker::Assistant);
        }
        assert!(turns.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn test_prior_turns_exclude_current_question() {
        let vision = Arc::new(
            FakeVision::default().summary_ok("a red bicycle", &[]).answer_ok("Red.").answer_ok("Yes."),
        );
        let ctrl = controller(vision.clone(), FakeFetcher::with_available(&["./photo.jpg"]));
        ctrl.bootstrap().await.unwrap();

        ctrl.submit_user_message("what color?").await;
        ctrl.submit_user_message("is it new?").await;

        let calls = vision.respond_calls.lock().unwrap();
        assert_eq!(calls[0].0, "what color?");
        assert_eq!(calls[0].1.len(), 1);
        assert_eq!(calls[0].1[0].speaker, Speaker::Assistant);
        assert_eq!(calls[1].0, "is it new?");
        assert_eq!(
            calls[1].1.iter().map(|t| t.text.as_str()).collect::<Vec<_>>(),
            vec![welcome_message("a red bicycle").as_str(), "what color?", "Red."]
        );
    }

    #[tokio::test]
    async fn test_analysis_clears_init_error() {
        let vision = Arc::new(FakeVision::default().summary_ok("a dog", &["dog"]));
        let ctrl = controller(vision, FakeFetcher::with_available(&[]));
        ctrl.bootstrap().await.unwrap();
        assert!(ctrl.snapshot().await.init_error.is_some());

        ctrl.replace_image(image("dog.png")).await.unwrap();

        assert!(ctrl.snapshot().await.init_error.is_none());
    }

    #[tokio::test]
    async fn test_reanalyze_without_image_is_idle() {
        let vision = Arc::new(FakeVision::default());
        let ctrl = controller(vision.clone(), FakeFetcher::with_available(&[]));

        assert_eq!(ctrl.reanalyze().await.unwrap(), OperationState::Idle);
        assert_eq!(vision.summarize_calls.load(Ordering::SeqCst), 0);
        assert!(!ctrl.is_busy());
    }

    #[tokio::test]
    async fn test_reanalyze_replaces_summary() {
        let vision = Arc::new(
            FakeVision::default().summary_ok("a cat", &["cat"]).summary_ok("a sleeping cat", &["cat"]),
        );
        let ctrl = controller(vision, FakeFetcher::with_available(&["./photo.jpg"]));
        ctrl.bootstrap().await.unwrap();

        ctrl.reanalyze().await.unwrap();

        let snapshot = ctrl.snapshot().await;
        assert_eq!(snapshot.analysis.unwrap().summary, "a sleeping cat");
        assert_eq!(snapshot.turns.len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_operations_are_rejected() {
        let gate = Arc::new(Notify::new());
        let vision = Arc::new(
            FakeVision::default()
                .summary_ok("a red bicycle", &[])
                .answer_ok("unused")
                .gated(gate.clone()),
        );
        let ctrl = controller(vision.clone(), FakeFetcher::with_available(&["./photo.jpg"]));

        let (first, (second, chat)) = tokio::join!(ctrl.bootstrap(), async {
            while !ctrl.is_busy() {
                tokio::task::yield_now().await;
            }
            assert_eq!(ctrl.snapshot().await.status, OperationState::Loading);
            let second = ctrl.replace_image(image("other.png")).await;
            let chat = ctrl.submit_user_message("what is it?").await;
            gate.notify_one();
            (second, chat)
        });

        assert_eq!(first.unwrap(), OperationState::Ready);
        assert!(matches!(second, Err(VislensError::Busy)));
        assert_eq!(chat, OperationState::Idle);
        assert_eq!(vision.summarize_calls.load(Ordering::SeqCst), 1);
        assert_eq!(vision.respond_count(), 0);

        let snapshot = ctrl.snapshot().await;
        assert_eq!(snapshot.current_image.unwrap().display_reference(), "./photo.jpg");
        assert_eq!(snapshot.turns.len(), 1);
        assert!(!snapshot.busy);
    }

    #[tokio::test]
    async fn test_events_follow_chat_turn() {
        let vision = Arc::new(FakeVision::default().summary_ok("a cat", &[]).answer_ok("Orange."));
        let ctrl = controller(vision, FakeFetcher::with_available(&["./photo.jpg"]));
        ctrl.bootstrap().await.unwrap();
        let mut rx = ctrl.subscribe();

        ctrl.submit_user_message("what color?").await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], ConversationEvent::BusyChanged(true));
        assert!(matches!(&events[1], ConversationEvent::TurnAppended(t) if t.speaker == Speaker::User));
        assert!(matches!(&events[2], ConversationEvent::TurnAppended(t) if t.text == "Orange."));
        assert_eq!(events[3], ConversationEvent::BusyChanged(false));
    }
}
