use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::snapshot::{PollOutcome, PollPhase, PollSnapshot, error_message};
use crate::api::{JobState, JobStatus, StatusSource};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

pub type CompleteCallback = Arc<dyn Fn(JobStatus) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Polling cadence and terminal callbacks.
#[derive(Clone)]
pub struct PollOptions {
    /// Delay between status requests, also used after a failed request.
    pub interval: Duration,
    pub on_complete: Option<CompleteCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            on_complete: None,
            on_error: None,
        }
    }
}

impl PollOptions {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn on_complete(mut self, f: impl Fn(JobStatus) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

/// Polls a backend job until it completes or fails.
///
/// Polling is requested with [`start_polling`](Self::start_polling) but only
/// runs once both the run id and the user id are known; ids that arrive later
/// through [`set_ids`](Self::set_ids) start the session without another call.
/// Each session runs as one spawned task guarded by a [`CancellationToken`].
/// Stopping or dropping the poller cancels the token, and the task checks it
/// before every update, so late responses are discarded.
pub struct JobPoller<S> {
    source: Arc<S>,
    run_id: Option<String>,
    user_id: Option<String>,
    options: PollOptions,
    snapshot: Arc<watch::Sender<PollSnapshot>>,
    session: Option<CancellationToken>,
}

impl<S: StatusSource + 'static> JobPoller<S> {
    pub fn new(
        source: Arc<S>,
        run_id: Option<String>,
        user_id: Option<String>,
        options: PollOptions,
    ) -> Self {
        let (tx, _rx) = watch::channel(PollSnapshot::default());
        Self {
            source,
            run_id,
            user_id,
            options,
            snapshot: Arc::new(tx),
            session: None,
        }
    }

    /// Records the intent to poll and starts if both ids are present.
    ///
    /// A no-op while a session is already running.
    pub fn start_polling(&mut self) {
        if self.is_polling() {
            return;
        }
        self.snapshot.send_modify(|s| s.armed = true);
        self.launch();
    }

    /// Cancels the intent and the running session, if any.
    pub fn stop_polling(&mut self) {
        self.cancel_session();
        self.snapshot.send_modify(|s| {
            s.armed = false;
            if s.phase == PollPhase::Polling {
                s.phase = PollPhase::Idle;
            }
        });
    }

    /// Updates the ids. A running session restarts against the new ids, and a
    /// pending intent starts once both are present.
    pub fn set_ids(&mut self, run_id: Option<String>, user_id: Option<String>) {
        if run_id == self.run_id && user_id == self.user_id {
            return;
        }
        self.run_id = run_id;
        self.user_id = user_id;

        if self.is_polling() {
            self.cancel_session();
            self.snapshot.send_modify(|s| s.phase = PollPhase::Idle);
        }
        self.launch();
    }

    pub fn is_polling(&self) -> bool {
        self.snapshot.borrow().phase == PollPhase::Polling
    }

    /// Last status seen by the current or previous session.
    pub fn status(&self) -> Option<JobStatus> {
        self.snapshot.borrow().status.clone()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshot.subscribe()
    }

    /// Waits for the session to end, calling `on_update` with every snapshot.
    ///
    /// Returns `None` when polling was never requested or was stopped.
    pub async fn wait(&self, mut on_update: impl FnMut(&PollSnapshot)) -> Option<PollOutcome> {
        let mut rx = self.subscribe();
        loop {
            {
                let snap = rx.borrow_and_update();
                on_update(&snap);
                if let Some(outcome) = snap.outcome() {
                    return Some(outcome);
                }
                if !snap.armed {
                    return None;
                }
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    fn launch(&mut self) {
        if !self.snapshot.borrow().armed {
            return;
        }
        let (Some(run_id), Some(user_id)) = (self.run_id.clone(), self.user_id.clone()) else {
            debug!("polling requested before run id and user id are known");
            return;
        };

        self.cancel_session();
        let cancel = CancellationToken::new();
        self.session = Some(cancel.clone());
        self.snapshot.send_modify(|s| {
            s.phase = PollPhase::Polling;
            s.attempts = 0;
        });

        debug!(%run_id, interval_ms = self.options.interval.as_millis() as u64, "starting job polling");
        tokio::spawn(poll_loop(
            Arc::clone(&self.source),
            run_id,
            user_id,
            self.options.clone(),
            Arc::clone(&self.snapshot),
            cancel,
        ));
    }

    fn cancel_session(&mut self) {
        if let Some(token) = self.session.take() {
            token.cancel();
        }
    }
}

impl<S> Drop for JobPoller<S> {
    fn drop(&mut self) {
        if let Some(token) = self.session.take() {
            token.cancel();
        }
    }
}

async fn poll_loop<S: StatusSource>(
    source: Arc<S>,
    run_id: String,
    user_id: String,
    options: PollOptions,
    snapshot: Arc<watch::Sender<PollSnapshot>>,
    cancel: CancellationToken,
) {
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return;
        }
        attempt += 1;

        // In-flight requests are not aborted; the token decides whether the
        // result is applied.
        match source.job_status(&run_id, &user_id).await {
            Ok(status) => {
                let state = status.status;
                let seen = status.clone();
                let applied = snapshot.send_if_modified(|s| {
                    if cancel.is_cancelled() {
                        return false;
                    }
                    s.attempts = attempt;
                    s.status = Some(seen);
                    match state {
                        JobState::Complete => s.phase = PollPhase::Complete,
                        JobState::Error => s.phase = PollPhase::Failed,
                        JobState::Processing => {}
                    }
                    if state.is_terminal() {
                        s.armed = false;
                    }
                    true
                });
                if !applied {
                    return;
                }

                // A stop that lands after the update still silences the callbacks.
                if state.is_terminal() && cancel.is_cancelled() {
                    return;
                }
                match state {
                    JobState::Complete => {
                        info!(%run_id, attempt, "job complete");
                        if let Some(on_complete) = &options.on_complete {
                            on_complete(status);
                        }
                        return;
                    }
                    JobState::Error => {
                        let message = error_message(Some(&status));
                        warn!(%run_id, attempt, error = %message, "job failed");
                        if let Some(on_error) = &options.on_error {
                            on_error(message);
                        }
                        return;
                    }
                    JobState::Processing => {
                        debug!(
                            %run_id,
                            attempt,
                            stage = status.current_stage.as_deref().unwrap_or("-"),
                            "job still processing",
                        );
                    }
                }
            }
            Err(e) => {
                let applied = snapshot.send_if_modified(|s| {
                    if cancel.is_cancelled() {
                        return false;
                    }
                    s.attempts = attempt;
                    true
                });
                if !applied {
                    return;
                }
                warn!(%run_id, attempt, error = %e, "status request failed, retrying");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(options.interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Scene;
    use crate::api::{ApiError, StoryScript};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{Instant, sleep};

    const INTERVAL: Duration = Duration::from_millis(1000);

    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<JobStatus, ApiError>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<JobStatus, ApiError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl StatusSource for ScriptedSource {
        async fn job_status(&self, run_id: &str, user_id: &str) -> Result<JobStatus, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push((run_id.to_string(), user_id.to_string()));
            let next = self.responses.lock().unwrap().pop_front();
            // Once the script runs out the job keeps processing forever.
            next.unwrap_or_else(|| Ok(job(run_id, JobState::Processing)))
        }
    }

    /// Answers `complete` after a fixed delay.
    struct SlowSource {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StatusSource for SlowSource {
        async fn job_status(&self, run_id: &str, _user_id: &str) -> Result<JobStatus, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            Ok(JobStatus {
                run_id: run_id.to_string(),
                ..completed_story()
            })
        }
    }

    fn slow_poller(completions: &Arc<AtomicUsize>) -> (Arc<SlowSource>, JobPoller<SlowSource>) {
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(500),
            calls: AtomicUsize::new(0),
        });
        let counter = Arc::clone(completions);
        let options = PollOptions::with_interval(INTERVAL).on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let p = JobPoller::new(
            Arc::clone(&source),
            Some("run123".into()),
            Some("user123".into()),
            options,
        );
        (source, p)
    }

    fn job(run_id: &str, state: JobState) -> JobStatus {
        JobStatus {
            run_id: run_id.to_string(),
            user_id: "user123".into(),
            status: state,
            current_stage: Some("story".into()),
            error: None,
            drawing_analysis: None,
            story_script: None,
            images: None,
            video: None,
            updated_at: None,
        }
    }

    fn completed_story() -> JobStatus {
        JobStatus {
            current_stage: Some("story_complete".into()),
            story_script: Some(StoryScript {
                title: None,
                scenes: vec![Scene {
                    number: 1,
                    text: "Test scene".into(),
                }],
                total_scenes: 1,
            }),
            ..job("run123", JobState::Complete)
        }
    }

    fn transport_error() -> ApiError {
        ApiError::Status {
            status: 503,
            message: "upstream unavailable".into(),
        }
    }

    fn poller(
        source: &Arc<ScriptedSource>,
        run_id: Option<&str>,
        user_id: Option<&str>,
        options: PollOptions,
    ) -> JobPoller<ScriptedSource> {
        JobPoller::new(
            Arc::clone(source),
            run_id.map(str::to_string),
            user_id.map(str::to_string),
            options,
        )
    }

    async fn settle() {
        sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_poll_without_run_id() {
        let source = ScriptedSource::new(vec![]);
        let mut p = poller(&source, None, Some("user123"), PollOptions::with_interval(INTERVAL));

        p.start_polling();
        assert!(!p.is_polling());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(source.call_count(), 0);
        assert!(!p.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_poll_without_user_id() {
        let source = ScriptedSource::new(vec![]);
        let mut p = poller(&source, Some("run123"), None, PollOptions::with_interval(INTERVAL));

        p.start_polling();
        assert!(!p.is_polling());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_with_both_ids() {
        let source = ScriptedSource::new(vec![]);
        let mut p = poller(
            &source,
            Some("run123"),
            Some("user123"),
            PollOptions::with_interval(INTERVAL),
        );

        p.start_polling();
        assert!(p.is_polling());

        settle().await;
        assert_eq!(source.calls(), vec![("run123".to_string(), "user123".to_string())]);
        assert_eq!(p.status().unwrap().status, JobState::Processing);
    }

    #[tokio::test(start_paused = true)]
    async fn start_polling_is_idempotent() {
        let source = ScriptedSource::new(vec![]);
        let mut p = poller(
            &source,
            Some("run123"),
            Some("user123"),
            PollOptions::with_interval(INTERVAL),
        );

        p.start_polling();
        p.start_polling();
        p.start_polling();
        settle().await;
        assert_eq!(source.call_count(), 1);

        sleep(INTERVAL).await;
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn processing_then_complete_calls_on_complete_once() {
        let source = ScriptedSource::new(vec![
            Ok(job("run123", JobState::Processing)),
            Ok(completed_story()),
        ]);
        let completions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&completions);
        let options = PollOptions::with_interval(INTERVAL)
            .on_complete(move |status| sink.lock().unwrap().push(status));
        let mut p = poller(&source, Some("run123"), Some("user123"), options);

        p.start_polling();
        let outcome = p.wait(|_| {}).await;

        assert_eq!(outcome, Some(PollOutcome::Complete(completed_story())));
        assert_eq!(source.call_count(), 2);
        assert_eq!(*completions.lock().unwrap(), vec![completed_story()]);
        assert!(!p.is_polling());

        // Terminal states are absorbing.
        sleep(Duration::from_secs(30)).await;
        assert_eq!(source.call_count(), 2);
        assert_eq!(completions.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_calls_on_error_once() {
        let failed = JobStatus {
            error: Some("Something went wrong".into()),
            ..job("run123", JobState::Error)
        };
        let source = ScriptedSource::new(vec![Ok(failed)]);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let options = PollOptions::with_interval(INTERVAL)
            .on_error(move |message| sink.lock().unwrap().push(message));
        let mut p = poller(&source, Some("run123"), Some("user123"), options);

        p.start_polling();
        let outcome = p.wait(|_| {}).await;

        assert_eq!(outcome, Some(PollOutcome::Failed("Something went wrong".into())));
        assert_eq!(*errors.lock().unwrap(), vec!["Something went wrong".to_string()]);
        assert!(!p.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_without_message_uses_fallback() {
        let source = ScriptedSource::new(vec![Ok(job("run123", JobState::Error))]);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let options = PollOptions::with_interval(INTERVAL)
            .on_error(move |message| sink.lock().unwrap().push(message));
        let mut p = poller(&source, Some("run123"), Some("user123"), options);

        p.start_polling();
        p.wait(|_| {}).await;

        assert_eq!(*errors.lock().unwrap(), vec!["Unknown error".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_starts_when_run_id_arrives_later() {
        let source = ScriptedSource::new(vec![]);
        let mut p = poller(&source, None, Some("user123"), PollOptions::with_interval(INTERVAL));

        p.start_polling();
        settle().await;
        assert!(!p.is_polling());
        assert_eq!(source.call_count(), 0);

        p.set_ids(Some("run123".into()), Some("user123".into()));
        assert!(p.is_polling());

        settle().await;
        assert_eq!(source.calls(), vec![("run123".to_string(), "user123".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn ids_without_intent_do_not_start() {
        let source = ScriptedSource::new(vec![]);
        let mut p = poller(&source, None, None, PollOptions::with_interval(INTERVAL));

        p.set_ids(Some("run123".into()), Some("user123".into()));
        settle().await;
        assert!(!p.is_polling());
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_polling_prevents_scheduled_requests() {
        let source = ScriptedSource::new(vec![]);
        let mut p = poller(
            &source,
            Some("run123"),
            Some("user123"),
            PollOptions::with_interval(INTERVAL),
        );

        p.start_polling();
        assert!(p.is_polling());
        settle().await;
        assert_eq!(source.call_count(), 1);

        p.stop_polling();
        assert!(!p.is_polling());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(source.call_count(), 1);
        assert_eq!(p.wait(|_| {}).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_intent_is_not_rearmed_by_ids() {
        let source = ScriptedSource::new(vec![]);
        let mut p = poller(&source, None, Some("user123"), PollOptions::with_interval(INTERVAL));

        p.start_polling();
        p.stop_polling();
        p.set_ids(Some("run123".into()), Some("user123".into()));

        settle().await;
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried_after_interval() {
        let source = ScriptedSource::new(vec![Err(transport_error()), Ok(completed_story())]);
        let mut p = poller(
            &source,
            Some("run123"),
            Some("user123"),
            PollOptions::with_interval(INTERVAL),
        );

        let started = Instant::now();
        p.start_polling();
        let outcome = p.wait(|_| {}).await;

        assert!(matches!(outcome, Some(PollOutcome::Complete(_))));
        assert_eq!(source.call_count(), 2);
        assert!(started.elapsed() >= INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_keeps_polling_state() {
        let source = ScriptedSource::new(vec![Err(transport_error())]);
        let mut p = poller(
            &source,
            Some("run123"),
            Some("user123"),
            PollOptions::with_interval(INTERVAL),
        );

        p.start_polling();
        settle().await;
        assert!(p.is_polling());
        assert_eq!(p.subscribe().borrow().attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_poller_stops_requests() {
        let source = ScriptedSource::new(vec![]);
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completions);
        let options = PollOptions::with_interval(INTERVAL).on_complete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut p = poller(&source, Some("run123"), Some("user123"), options);

        p.start_polling();
        settle().await;
        drop(p);

        sleep(Duration::from_secs(30)).await;
        assert_eq!(source.call_count(), 1);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn response_landing_after_stop_is_discarded() {
        let completions = Arc::new(AtomicUsize::new(0));
        let (source, mut p) = slow_poller(&completions);

        p.start_polling();
        settle().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        p.stop_polling();

        sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
        assert!(p.status().is_none());
        assert!(!p.is_polling());
        assert_eq!(p.subscribe().borrow().phase, PollPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn response_landing_after_drop_is_discarded() {
        let completions = Arc::new(AtomicUsize::new(0));
        let (source, mut p) = slow_poller(&completions);

        p.start_polling();
        settle().await;
        let rx = p.subscribe();
        drop(p);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
        assert!(rx.borrow().status.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn changing_ids_restarts_session() {
        let source = ScriptedSource::new(vec![]);
        let mut p = poller(
            &source,
            Some("run123"),
            Some("user123"),
            PollOptions::with_interval(INTERVAL),
        );

        p.start_polling();
        settle().await;
        p.set_ids(Some("run456".into()), Some("user123".into()));
        assert!(p.is_polling());
        assert_eq!(p.run_id(), Some("run456"));
        settle().await;

        sleep(INTERVAL).await;
        let runs: Vec<String> = source.calls().into_iter().map(|(run, _)| run).collect();
        assert_eq!(runs, vec!["run123", "run456", "run456"]);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_start_after_terminal_polls_again() {
        let source = ScriptedSource::new(vec![Ok(completed_story()), Ok(completed_story())]);
        let mut p = poller(
            &source,
            Some("run123"),
            Some("user123"),
            PollOptions::with_interval(INTERVAL),
        );

        p.start_polling();
        p.wait(|_| {}).await;
        assert_eq!(source.call_count(), 1);

        p.start_polling();
        let outcome = p.wait(|_| {}).await;
        assert!(matches!(outcome, Some(PollOutcome::Complete(_))));
        assert_eq!(source.call_count(), 2);
    }
}
