//! Runs the generation sequence against the shared [`UiState`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::error::ChitrakarError;
use crate::services::{GenerationRequest, ImageRequester, Operation, PromptEnhancer};
use crate::state::{Effect, Event, UiState, step};

/// Shared UI state plus the services the sequence calls out to.
///
/// Every mutation goes through [`step`] under the write lock. Nothing orders
/// one sequence against another: overlapping generations each apply their own
/// outcome, and the last response to arrive wins.
#[derive(Clone)]
pub struct Studio {
    state: Arc<RwLock<UiState>>,
    enhancer: Arc<dyn PromptEnhancer>,
    images: Arc<dyn ImageRequester>,
    call_timeout: Option<Duration>,
}

impl Studio {
    /// New studio in the idle state.
    pub fn new(
        enhancer: Arc<dyn PromptEnhancer>,
        images: Arc<dyn ImageRequester>,
        enhancement_enabled: bool,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(UiState::new(enhancement_enabled))),
            enhancer,
            images,
            call_timeout: None,
        }
    }

    /// Aborts each external call that runs longer than `limit`.
    pub fn with_call_timeout(mut self, limit: Option<Duration>) -> Self {
        self.call_timeout = limit;
        self
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> UiState {
        self.state.read().await.clone()
    }

    /// Applies one event and returns the effects it produced.
    pub async fn dispatch(&self, event: Event) -> Vec<Effect> {
        let mut state = self.state.write().await;
        let (next, effects) = step(std::mem::take(&mut *state), event);
        *state = next;
        effects
    }

    /// Replaces the working prompt.
    pub async fn edit_prompt(&self, prompt: impl Into<String>) {
        self.dispatch(Event::PromptEdited(prompt.into())).await;
    }

    /// Flips the enhancement toggle.
    pub async fn set_enhancement(&self, enabled: bool) {
        self.dispatch(Event::EnhancementToggled(enabled)).await;
    }

    /// Clears prompt and results.
    pub async fn reset(&self) {
        self.dispatch(Event::Reset).await;
    }

    /// Sets the loading flag and starts the sequence on its own task.
    ///
    /// The loading flag is already set when this returns. Aborting the
    /// returned operation stops the call in flight and puts the studio back
    /// to idle.
    pub async fn start(&self) -> Operation<()> {
        self.launch(Event::GenerateRequested).await
    }

    /// Like [`Studio::start`], but takes the prompt and toggle from a single
    /// form submission under the same lock that starts the sequence.
    pub async fn submit(&self, prompt: impl Into<String>, enhance: bool) -> Operation<()> {
        self.launch(Event::GenerateSubmitted {
            prompt: prompt.into(),
            enhance,
        })
        .await
    }

    async fn launch(&self, event: Event) -> Operation<()> {
        let effects = self.dispatch(event).await;
        let guard = SequenceGuard {
            studio: self.clone(),
            finished: false,
        };
        Operation::spawn(async move {
            guard.studio.run(effects).await;
            guard.finish();
        })
    }

    /// Runs a whole sequence and returns once it is back to idle.
    pub async fn generate(&self) {
        if let Err(err) = self.start().await.wait().await {
            error!("Generation sequence ended abnormally: {err}");
        }
    }

    async fn run(&self, effects: Vec<Effect>) {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            if let Some(event) = self.perform(effect).await {
                queue.extend(self.dispatch(event).await);
            }
        }
    }

    /// Returns the studio to idle without awaiting. Runs from `Drop`, so the
    /// lock is only tried; under contention the update goes to a new task.
    fn abandon(&self) {
        let effects = match self.state.try_write() {
            Ok(mut state) => {
                let (next, effects) = step(std::mem::take(&mut *state), Event::SequenceAborted);
                *state = next;
                effects
            }
            Err(_) => {
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    let studio = self.clone();
                    runtime.spawn(async move {
                        for effect in studio.dispatch(Event::SequenceAborted).await {
                            report(&effect);
                        }
                    });
                }
                return;
            }
        };
        for effect in effects {
            report(&effect);
        }
    }

    async fn perform(&self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::Enhance { text } => {
                let enhancer = self.enhancer.clone();
                let call = Operation::spawn(async move { enhancer.enhance(&text).await });
                let _abort = call.abort_on_drop();
                let outcome = call
                    .wait_for(self.call_timeout)
                    .await
                    .and_then(|result| result);
                Some(match outcome {
                    Ok(prompt) => Event::EnhancementSucceeded(prompt),
                    Err(err) => Event::EnhancementFailed(err.to_string()),
                })
            }
            Effect::RequestImages { prompt } => {
                let images = self.images.clone();
                let request = GenerationRequest::for_prompt(prompt);
                let call = Operation::spawn(async move { images.generate(&request).await });
                let _abort = call.abort_on_drop();
                let outcome = call
                    .wait_for(self.call_timeout)
                    .await
                    .and_then(|result| result);
                Some(match outcome {
                    Ok(images) => {
                        debug!("Generation returned {} images", images.len());
                        Event::ImagesReceived(images)
                    }
                    Err(ChitrakarError::MalformedResponse(message)) => {
                        Event::ImagesMalformed(message)
                    }
                    Err(err) => Event::ImagesFailed(err.to_string()),
                })
            }
            report_only @ (Effect::ReportFailure { .. } | Effect::ReportIgnored { .. }) => {
                report(&report_only);
                None
            }
        }
    }
}

fn report(effect: &Effect) {
    match effect {
        Effect::ReportFailure { stage, message } => {
            error!("API call failed during {stage}: {message}");
        }
        Effect::ReportIgnored { message } => {
            warn!("Ignoring image response: {message}");
        }
        Effect::Enhance { .. } | Effect::RequestImages { .. } => {}
    }
}

/// Owned by a sequence task. If the task is dropped before [`finish`] runs
/// (aborted, panicked or never polled) the studio goes back to idle.
///
/// [`finish`]: SequenceGuard::finish
struct SequenceGuard {
    studio: Studio,
    finished: bool,
}

impl SequenceGuard {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for SequenceGuard {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Generation sequence dropped before completion");
            self.studio.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::oneshot;

    use super::*;
    use crate::services::BoxFuture;
    use crate::services::fakes::{FakeEnhancer, FakeImages, Reply};
    use crate::state::Phase;

    fn build(
        enhancer: Arc<FakeEnhancer>,
        images: Arc<FakeImages>,
        enhancement_enabled: bool,
    ) -> Studio {
        Studio::new(enhancer, images, enhancement_enabled)
    }

    #[tokio::test]
    async fn raw_prompt_is_sent_when_enhancement_is_off() {
        let enhancer = FakeEnhancer::new(Reply::Ok("ignored".to_string()));
        let images = FakeImages::returning(&["AAA"]);
        let studio = build(enhancer.clone(), images.clone(), false);

        studio.edit_prompt("a cat").await;
        studio.generate().await;

        assert_eq!(enhancer.calls(), 0);
        assert_eq!(images.prompts(), vec!["a cat".to_string()]);
    }

    #[tokio::test]
    async fn enhanced_prompt_replaces_raw_text() {
        let enhancer = FakeEnhancer::new(Reply::Ok("a fluffy cat, golden hour".to_string()));
        let images = FakeImages::returning(&["AAA"]);
        let studio = build(enhancer.clone(), images.clone(), true);

        studio.edit_prompt("eine Katze").await;
        studio.generate().await;

        assert_eq!(
            enhancer.seen.lock().unwrap().clone(),
            vec!["eine Katze".to_string()]
        );
        assert_eq!(images.prompts(), vec!["a fluffy cat, golden hour".to_string()]);
        let state = studio.snapshot().await;
        assert_eq!(state.prompt, "a fluffy cat, golden hour");
        assert_eq!(state.images, vec!["AAA".to_string()]);
    }

    #[tokio::test]
    async fn failed_enhancement_never_requests_images() {
        let enhancer = FakeEnhancer::new(Reply::Fail("unauthorized"));
        let images = FakeImages::returning(&["AAA"]);
        let studio = build(enhancer.clone(), images.clone(), true);

        studio.edit_prompt("a cat").await;
        studio.generate().await;

        assert_eq!(enhancer.calls(), 1);
        assert_eq!(images.calls(), 0);
        let state = studio.snapshot().await;
        assert!(!state.is_loading());
        assert_eq!(state.prompt, "a cat");
    }

    #[tokio::test]
    async fn failed_generation_keeps_previous_results() {
        let images = FakeImages::new(Reply::Fail("boom"));
        let studio = build(
            FakeEnhancer::new(Reply::Ok(String::new())),
            images.clone(),
            false,
        );
        studio
            .dispatch(Event::ImagesReceived(vec!["OLD".to_string()]))
            .await;

        studio.edit_prompt("a cat").await;
        studio.generate().await;

        assert_eq!(images.calls(), 1);
        let state = studio.snapshot().await;
        assert_eq!(state.images, vec!["OLD".to_string()]);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn malformed_response_leaves_results_alone() {
        let studio = build(
            FakeEnhancer::new(Reply::Ok(String::new())),
            FakeImages::new(Reply::Malformed("no artifacts")),
            false,
        );
        studio
            .dispatch(Event::ImagesReceived(vec!["OLD".to_string()]))
            .await;

        studio.generate().await;

        let state = studio.snapshot().await;
        assert_eq!(state.images, vec!["OLD".to_string()]);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn loading_is_set_on_start_and_cleared_on_completion() {
        let studio = build(
            FakeEnhancer::new(Reply::Ok(String::new())),
            FakeImages::returning(&["AAA", "BBB"]),
            false,
        );

        let op = studio.start().await;
        // the flag is set before the sequence task gets a chance to run
        assert!(studio.snapshot().await.is_loading());
        op.wait().await.unwrap();

        let state = studio.snapshot().await;
        assert!(!state.is_loading());
        assert_eq!(state.images, vec!["AAA".to_string(), "BBB".to_string()]);
    }

    #[tokio::test]
    async fn hung_call_is_aborted_after_the_time_limit() {
        let enhancer = FakeEnhancer::new(Reply::Hang);
        let images = FakeImages::returning(&["AAA"]);
        let studio = build(enhancer.clone(), images.clone(), true)
            .with_call_timeout(Some(Duration::from_millis(20)));

        studio.edit_prompt("a cat").await;
        studio.generate().await;

        assert_eq!(enhancer.calls(), 1);
        assert_eq!(images.calls(), 0);
        assert_eq!(studio.snapshot().await.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn hung_image_call_times_out_and_keeps_previous_results() {
        let images = FakeImages::new(Reply::Hang);
        let studio = build(
            FakeEnhancer::new(Reply::Ok(String::new())),
            images.clone(),
            false,
        )
        .with_call_timeout(Some(Duration::from_millis(20)));
        studio
            .dispatch(Event::ImagesReceived(vec!["OLD".to_string()]))
            .await;

        studio.edit_prompt("a cat").await;
        studio.generate().await;

        assert_eq!(images.calls(), 1);
        let state = studio.snapshot().await;
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.images, vec!["OLD".to_string()]);
    }

    #[tokio::test]
    async fn submit_sends_the_submitted_prompt() {
        let enhancer = FakeEnhancer::new(Reply::Ok("a fluffy cat".to_string()));
        let images = FakeImages::returning(&["AAA"]);
        let studio = build(enhancer.clone(), images.clone(), false);
        studio.edit_prompt("stale text").await;

        studio.submit("eine Katze", true).await.wait().await.unwrap();

        assert_eq!(
            enhancer.seen.lock().unwrap().clone(),
            vec!["eine Katze".to_string()]
        );
        assert_eq!(images.prompts(), vec!["a fluffy cat".to_string()]);
        assert!(studio.snapshot().await.enhancement_enabled);
    }

    #[tokio::test]
    async fn reset_clears_after_generation() {
        let studio = build(
            FakeEnhancer::new(Reply::Ok(String::new())),
            FakeImages::returning(&["AAA"]),
            false,
        );
        studio.edit_prompt("a cat").await;
        studio.generate().await;
        studio.reset().await;

        let state = studio.snapshot().await;
        assert!(state.prompt.is_empty());
        assert!(state.images.is_empty());
    }

    /// Image requester whose calls block until the test releases them.
    struct GatedImages {
        calls: AtomicUsize,
        gates: Mutex<Vec<oneshot::Receiver<Vec<String>>>>,
    }

    impl ImageRequester for GatedImages {
        fn generate<'a>(
            &'a self,
            _request: &'a GenerationRequest,
        ) -> BoxFuture<'a, Result<Vec<String>, ChitrakarError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gates.lock().ok().and_then(|mut gates| {
                if gates.is_empty() {
                    None
                } else {
                    Some(gates.remove(0))
                }
            });
            Box::pin(async move {
                match gate {
                    Some(gate) => gate.await.map_err(|_| ChitrakarError::Aborted),
                    None => Err(ChitrakarError::Aborted),
                }
            })
        }
    }

    #[tokio::test]
    async fn overlapping_sequences_last_response_wins() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let images = Arc::new(GatedImages {
            calls: AtomicUsize::new(0),
            gates: Mutex::new(vec![first_rx, second_rx]),
        });
        let studio = Studio::new(
            FakeEnhancer::new(Reply::Ok(String::new())),
            images.clone(),
            false,
        );

        let first = studio.start().await;
        while images.calls.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }
        let second = studio.start().await;
        while images.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        // the second request answers first, the first request answers last
        second_tx.send(vec!["SECOND".to_string()]).unwrap();
        second.wait().await.unwrap();
        first_tx.send(vec!["FIRST".to_string()]).unwrap();
        first.wait().await.unwrap();

        let state = studio.snapshot().await;
        assert_eq!(state.images, vec!["FIRST".to_string()]);
        assert!(!state.is_loading());
    }

    /// Image requester that never answers and drops `released` once its call
    /// is torn down.
    struct HeldImages {
        calls: AtomicUsize,
        released: Mutex<Option<oneshot::Sender<()>>>,
    }

    impl ImageRequester for HeldImages {
        fn generate<'a>(
            &'a self,
            _request: &'a GenerationRequest,
        ) -> BoxFuture<'a, Result<Vec<String>, ChitrakarError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let held = self.released.lock().ok().and_then(|mut slot| slot.take());
            Box::pin(async move {
                let _held = held;
                std::future::pending::<Result<Vec<String>, ChitrakarError>>().await
            })
        }
    }

    #[tokio::test]
    async fn aborted_sequence_returns_to_idle_and_stops_the_call() {
        let (released_tx, released_rx) = oneshot::channel();
        let images = Arc::new(HeldImages {
            calls: AtomicUsize::new(0),
            released: Mutex::new(Some(released_tx)),
        });
        let studio = Studio::new(
            FakeEnhancer::new(Reply::Ok(String::new())),
            images.clone(),
            false,
        );
        studio
            .dispatch(Event::ImagesReceived(vec!["OLD".to_string()]))
            .await;

        let op = studio.start().await;
        while images.calls.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }
        op.abort();
        assert!(matches!(op.wait().await, Err(ChitrakarError::Aborted)));

        let state = studio.snapshot().await;
        assert!(!state.is_loading());
        assert_eq!(state.images, vec!["OLD".to_string()]);
        // the sender is dropped only when the image call itself is torn down
        let released = tokio::time::timeout(Duration::from_secs(1), released_rx).await;
        assert!(released.is_ok());
    }

    #[tokio::test]
    async fn sequence_aborted_before_it_runs_returns_to_idle() {
        let images = FakeImages::new(Reply::Hang);
        let studio = build(
            FakeEnhancer::new(Reply::Ok(String::new())),
            images.clone(),
            false,
        );

        let op = studio.start().await;
        assert!(studio.snapshot().await.is_loading());
        op.abort();
        assert!(op.wait().await.is_err());

        assert!(!studio.snapshot().await.is_loading());
    }
}
