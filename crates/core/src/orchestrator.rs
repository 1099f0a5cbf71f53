//! Preload Orchestrator
//!
//! Drives preload attempts for one launcher screen:
//! - a single dispatch task owns every state transition
//! - each attempt runs the pipeline on its own blocking worker
//! - transient failures are retried after a delay, up to a fixed cap
//! - destroying the screen abandons pending work without interrupting it

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::PreloadConfig,
    error::{PreloadError, Result},
    events::{Event, EventBus},
    request::{LaunchBundle, PreloadRequest},
};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadState {
    /// Created, not started
    Idle,
    /// A worker is running the pipeline
    Preloading,
    /// Waiting out the delay before the next attempt
    RetryScheduled,
    /// Game is ready to launch
    Succeeded,
    /// Gave up, or the screen went away
    Failed,
}

impl PreloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PreloadState::Succeeded | PreloadState::Failed)
    }
}

/// Retry bookkeeping of the current screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreloadAttemptState {
    pub retry_count: u32,
    pub is_in_flight: bool,
}

/// Blocking body of a preload attempt
pub trait PreloadPipeline: Send + Sync + 'static {
    /// Run one attempt. Called on a worker thread, never on the dispatch task.
    fn run(&self, request: &PreloadRequest) -> Result<LaunchBundle>;
}

/// Final result reported to the caller, exactly once
#[derive(Debug)]
pub enum PreloadOutcome {
    /// Libraries loaded; start the game with this bundle
    Ready(LaunchBundle),
    /// Terminal failure after `retries` automatic retries
    Failed { error: PreloadError, retries: u32 },
    /// The owning screen was destroyed first
    Abandoned,
}

/// Single-shot completion callback
pub type CompletionCallback = Box<dyn FnOnce(PreloadOutcome) + Send + 'static>;

enum Message {
    Start,
    Finished(Result<LaunchBundle>),
    RetryElapsed,
    Destroy,
}

/// State shared between the dispatch task, workers and handles
struct Shared {
    state: RwLock<PreloadState>,
    retry_count: AtomicU32,
    in_flight: AtomicBool,
    workers_started: AtomicU32,
}

/// Clears the in-flight flag when the worker finishes, however it finishes
struct InFlightGuard(Arc<Shared>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}

/// Handle to a running orchestrator
pub struct OrchestratorHandle {
    sender: mpsc::UnboundedSender<Message>,
    shared: Arc<Shared>,
    screen: CancellationToken,
    task: JoinHandle<()>,
}

impl OrchestratorHandle {
    /// Request a preload. No-op unless the orchestrator is idle.
    pub fn start(&self) {
        let _ = self.sender.send(Message::Start);
    }

    /// The owning screen is gone: drop pending results and retries
    pub fn destroy(&self) {
        self.screen.cancel();
        self.shared.in_flight.store(false, Ordering::SeqCst);
        let _ = self.sender.send(Message::Destroy);
    }

    /// Whether the owning screen is still alive
    pub fn is_active(&self) -> bool {
        !self.screen.is_cancelled()
    }

    pub fn state(&self) -> PreloadState {
        *self.shared.state.read()
    }

    pub fn attempt_state(&self) -> PreloadAttemptState {
        PreloadAttemptState {
            retry_count: self.shared.retry_count.load(Ordering::SeqCst),
            is_in_flight: self.shared.in_flight.load(Ordering::SeqCst),
        }
    }

    /// Automatic retries consumed by the current screen
    pub fn retry_count(&self) -> u32 {
        self.shared.retry_count.load(Ordering::SeqCst)
    }

    pub fn is_in_flight(&self) -> bool {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Number of pipeline workers launched so far
    pub fn workers_started(&self) -> u32 {
        self.shared.workers_started.load(Ordering::SeqCst)
    }

    /// Wait for the dispatch task to end
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Orchestrator task failed: {}", e);
        }
    }
}

/// Builds and spawns the dispatch task
pub struct PreloadOrchestrator;

impl PreloadOrchestrator {
    /// Spawn the dispatch task on the current tokio runtime.
    ///
    /// Nothing runs until [`OrchestratorHandle::start`] is called.
    pub fn spawn(
        config: PreloadConfig,
        request: PreloadRequest,
        pipeline: Arc<dyn PreloadPipeline>,
        events: Arc<EventBus>,
        callback: CompletionCallback,
    ) -> OrchestratorHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: RwLock::new(PreloadState::Idle),
            retry_count: AtomicU32::new(0),
            in_flight: AtomicBool::new(false),
            workers_started: AtomicU32::new(0),
        });
        let screen = CancellationToken::new();

        let dispatcher = Dispatcher {
            config,
            request,
            pipeline,
            events,
            shared: Arc::clone(&shared),
            sender: sender.clone(),
            screen: screen.clone(),
            callback: Some(callback),
            retry_count: 0,
        };
        let task = tokio::spawn(dispatcher.run(receiver));

        OrchestratorHandle {
            sender,
            shared,
            screen,
            task,
        }
    }
}

/// Owner of all state transitions
struct Dispatcher {
    config: PreloadConfig,
    request: PreloadRequest,
    pipeline: Arc<dyn PreloadPipeline>,
    events: Arc<EventBus>,
    shared: Arc<Shared>,
    sender: mpsc::UnboundedSender<Message>,
    screen: CancellationToken,
    callback: Option<CompletionCallback>,
    retry_count: u32,
}

impl Dispatcher {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = receiver.recv().await {
            let done = match message {
                Message::Start => {
                    if self.state() == PreloadState::Idle {
                        self.launch_worker();
                    } else {
                        debug!("Ignoring start request in state {:?}", self.state());
                    }
                    false
                }
                Message::Finished(result) => self.on_finished(result),
                Message::RetryElapsed => {
                    if self.screen.is_cancelled() {
                        self.abandon();
                        true
                    } else {
                        if self.state() == PreloadState::RetryScheduled {
                            self.launch_worker();
                        }
                        false
                    }
                }
                Message::Destroy => {
                    self.abandon();
                    true
                }
            };

            if done {
                break;
            }
        }
        debug!("Orchestrator dispatch task finished");
    }

    fn state(&self) -> PreloadState {
        *self.shared.state.read()
    }

    fn set_state(&self, state: PreloadState) {
        {
            let mut current = self.shared.state.write();
            debug!("State transition: {:?} -> {:?}", *current, state);
            *current = state;
        }
        self.events.emit(Event::StateChanged(state));
    }

    fn launch_worker(&mut self) {
        if self.shared.in_flight.swap(true, Ordering::SeqCst) {
            debug!("Preload already in flight");
            return;
        }

        let attempt = self.shared.workers_started.fetch_add(1, Ordering::SeqCst) + 1;
        let attempt_id = uuid::Uuid::new_v4();
        self.set_state(PreloadState::Preloading);
        self.events.emit(Event::PreloadStarted { attempt });
        info!(
            "Starting preload attempt {} ({}) for {}",
            attempt, attempt_id, self.request.package_name
        );

        let pipeline = Arc::clone(&self.pipeline);
        let request = self.request.clone();
        let guard = InFlightGuard(Arc::clone(&self.shared));
        let sender = self.sender.clone();

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                let _guard = guard;
                pipeline.run(&request)
            })
            .await
            .unwrap_or_else(|e| Err(PreloadError::Preload(format!("preload worker died: {}", e))));

            debug!("Preload attempt {} finished (ok: {})", attempt_id, result.is_ok());
            let _ = sender.send(Message::Finished(result));
        });
    }

    /// Returns true when the orchestrator reached a terminal state
    fn on_finished(&mut self, result: Result<LaunchBundle>) -> bool {
        if self.screen.is_cancelled() {
            debug!("Dropping preload result for destroyed screen");
            self.abandon();
            return true;
        }

        match result {
            Ok(bundle) => {
                info!("Preload succeeded; game ready to start");
                self.retry_count = 0;
                self.shared.retry_count.store(0, Ordering::SeqCst);
                self.set_state(PreloadState::Succeeded);
                self.events.emit(Event::GameReady);
                self.complete(PreloadOutcome::Ready(bundle));
                true
            }
            Err(error) if error.is_retryable() && self.retry_count < self.config.max_retries => {
                self.retry_count += 1;
                self.shared.retry_count.store(self.retry_count, Ordering::SeqCst);
                warn!(
                    "Preload failed: {}. Retrying (attempt {} of {})",
                    error, self.retry_count, self.config.max_retries
                );
                self.set_state(PreloadState::RetryScheduled);
                self.events.emit(Event::RetryScheduled {
                    attempt: self.retry_count,
                    max: self.config.max_retries,
                });
                self.schedule_retry();
                false
            }
            Err(error) => {
                error!("Preload failed permanently: {}", error);
                self.set_state(PreloadState::Failed);
                self.events.emit(Event::PreloadFailed {
                    message: error.user_message(),
                    terminal: true,
                });
                let retries = self.retry_count;
                self.complete(PreloadOutcome::Failed { error, retries });
                true
            }
        }
    }

    fn schedule_retry(&self) {
        let sender = self.sender.clone();
        let screen = self.screen.clone();
        let delay = self.config.retry_delay();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let _ = sender.send(Message::RetryElapsed);
                }
                _ = screen.cancelled() => {
                    debug!("Retry cancelled: screen destroyed");
                }
            }
        });
    }

    /// Silent teardown: no notice, pending results are dropped
    fn abandon(&mut self) {
        self.shared.in_flight.store(false, Ordering::SeqCst);
        if !self.state().is_terminal() {
            info!("Preload abandoned in state {:?}", self.state());
            self.set_state(PreloadState::Failed);
        }
        self.complete(PreloadOutcome::Abandoned);
    }

    fn complete(&mut self, outcome: PreloadOutcome) {
        if let Some(callback) = self.callback.take() {
            callback(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, VecDeque};
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn bundle() -> LaunchBundle {
        LaunchBundle {
            package_name: "com.example.game".into(),
            mods_enabled: false,
            extras: BTreeMap::new(),
            version_isolation: None,
            abi: "x86_64".into(),
            library_dir: PathBuf::from("/cache/lib/x86_64"),
            asset_paths: Vec::new(),
            loaded_libraries: Vec::new(),
            verified: 7,
            prepared_at: chrono::Utc::now(),
        }
    }

    /// Pipeline that replays scripted results, then keeps failing
    #[derive(Default)]
    struct ScriptedPipeline {
        results: parking_lot::Mutex<VecDeque<Result<LaunchBundle>>>,
        runs: AtomicU32,
    }

    impl ScriptedPipeline {
        fn new(results: Vec<Result<LaunchBundle>>) -> Arc<Self> {
            Arc::new(Self {
                results: parking_lot::Mutex::new(results.into()),
                runs: AtomicU32::new(0),
            })
        }

        fn runs(&self) -> u32 {
            self.runs.load(Ordering::SeqCst)
        }
    }

    impl PreloadPipeline for ScriptedPipeline {
        fn run(&self, _request: &PreloadRequest) -> Result<LaunchBundle> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(PreloadError::Preload("cold cache".into())))
        }
    }

    fn fast_config() -> PreloadConfig {
        PreloadConfig {
            retry_delay_ms: 10,
            ..PreloadConfig::default()
        }
    }

    fn spawn(
        config: PreloadConfig,
        pipeline: Arc<dyn PreloadPipeline>,
        events: Arc<EventBus>,
    ) -> (OrchestratorHandle, oneshot::Receiver<PreloadOutcome>) {
        let (tx, rx) = oneshot::channel();
        let handle = PreloadOrchestrator::spawn(
            config,
            PreloadRequest::new("com.example.game"),
            pipeline,
            events,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        (handle, rx)
    }

    async fn outcome(rx: oneshot::Receiver<PreloadOutcome>) -> PreloadOutcome {
        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("orchestrator did not complete")
            .expect("callback dropped")
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let pipeline = ScriptedPipeline::new(vec![Ok(bundle())]);
        let (handle, rx) = spawn(fast_config(), pipeline.clone(), Arc::new(EventBus::new()));
        assert_eq!(handle.state(), PreloadState::Idle);

        handle.start();

        assert!(matches!(outcome(rx).await, PreloadOutcome::Ready(_)));
        assert_eq!(handle.state(), PreloadState::Succeeded);
        assert_eq!(handle.retry_count(), 0);
        assert_eq!(pipeline.runs(), 1);
    }

    #[tokio::test]
    async fn test_retry_cap() {
        let events = Arc::new(EventBus::new());
        let subscription = events.subscribe();
        let pipeline = ScriptedPipeline::new(Vec::new());
        let (handle, rx) = spawn(fast_config(), pipeline.clone(), events);

        handle.start();

        match outcome(rx).await {
            PreloadOutcome::Failed { error, retries } => {
                assert!(error.is_retryable());
                assert_eq!(retries, 2);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        handle.join().await;
        assert_eq!(pipeline.runs(), 3);

        let notices: Vec<_> = subscription
            .drain()
            .into_iter()
            .filter(|e| matches!(e, Event::RetryScheduled { .. } | Event::PreloadFailed { .. }))
            .collect();
        assert_eq!(
            notices,
            vec![
                Event::RetryScheduled { attempt: 1, max: 2 },
                Event::RetryScheduled { attempt: 2, max: 2 },
                Event::PreloadFailed {
                    message: PreloadError::Preload(String::new()).user_message(),
                    terminal: true,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let pipeline = ScriptedPipeline::new(vec![Err(PreloadError::SdkInit("race".into())), Ok(bundle())]);
        let (handle, rx) = spawn(fast_config(), pipeline.clone(), Arc::new(EventBus::new()));

        handle.start();

        assert!(matches!(outcome(rx).await, PreloadOutcome::Ready(_)));
        assert_eq!(pipeline.runs(), 2);
        assert_eq!(handle.attempt_state().retry_count, 0);
    }

    #[tokio::test]
    async fn test_missing_package_is_not_retried() {
        let events = Arc::new(EventBus::new());
        let subscription = events.subscribe();
        let pipeline = ScriptedPipeline::new(vec![Err(PreloadError::PackageNotInstalled("com.example.game".into()))]);
        let (handle, rx) = spawn(fast_config(), pipeline.clone(), events);

        handle.start();

        match outcome(rx).await {
            PreloadOutcome::Failed { error, retries } => {
                assert!(matches!(error, PreloadError::PackageNotInstalled(_)));
                assert_eq!(retries, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(pipeline.runs(), 1);
        assert!(!subscription
            .drain()
            .iter()
            .any(|e| matches!(e, Event::RetryScheduled { .. })));
    }

    /// Pipeline that blocks until released
    struct GatedPipeline {
        gate: crossbeam_channel::Receiver<()>,
        runs: AtomicU32,
    }

    impl PreloadPipeline for GatedPipeline {
        fn run(&self, _request: &PreloadRequest) -> Result<LaunchBundle> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.recv();
            Ok(bundle())
        }
    }

    async fn wait_for(handle: &OrchestratorHandle, state: PreloadState) {
        for _ in 0..500 {
            if handle.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("state {:?} never reached, stuck in {:?}", state, handle.state());
    }

    #[tokio::test]
    async fn test_concurrent_starts_launch_one_worker() {
        let (release, gate) = crossbeam_channel::bounded(1);
        let pipeline = Arc::new(GatedPipeline {
            gate,
            runs: AtomicU32::new(0),
        });
        let (handle, rx) = spawn(fast_config(), pipeline.clone(), Arc::new(EventBus::new()));

        handle.start();
        wait_for(&handle, PreloadState::Preloading).await;
        for _ in 0..5 {
            handle.start();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(handle.is_in_flight());
        assert_eq!(handle.workers_started(), 1);

        release.send(()).unwrap();
        assert!(matches!(outcome(rx).await, PreloadOutcome::Ready(_)));
        assert_eq!(pipeline.runs.load(Ordering::SeqCst), 1);
        assert!(!handle.is_in_flight());
    }

    #[tokio::test]
    async fn test_destroy_during_retry_delay_abandons() {
        let pipeline = ScriptedPipeline::new(Vec::new());
        let config = PreloadConfig {
            retry_delay_ms: 60_000,
            ..PreloadConfig::default()
        };
        let (handle, rx) = spawn(config, pipeline.clone(), Arc::new(EventBus::new()));

        handle.start();
        wait_for(&handle, PreloadState::RetryScheduled).await;
        handle.destroy();

        assert!(matches!(outcome(rx).await, PreloadOutcome::Abandoned));
        assert_eq!(handle.state(), PreloadState::Failed);
        assert!(!handle.is_active());
        assert_eq!(pipeline.runs(), 1);
    }

    #[tokio::test]
    async fn test_result_for_destroyed_screen_is_dropped() {
        let (release, gate) = crossbeam_channel::bounded(1);
        let pipeline = Arc::new(GatedPipeline {
            gate,
            runs: AtomicU32::new(0),
        });
        let (handle, rx) = spawn(fast_config(), pipeline, Arc::new(EventBus::new()));

        handle.start();
        wait_for(&handle, PreloadState::Preloading).await;
        handle.destroy();
        assert!(!handle.is_in_flight());
        release.send(()).unwrap();

        assert!(matches!(outcome(rx).await, PreloadOutcome::Abandoned));
    }

    struct PanickingPipeline;

    impl PreloadPipeline for PanickingPipeline {
        fn run(&self, _request: &PreloadRequest) -> Result<LaunchBundle> {
            panic!("native crash stand-in");
        }
    }

    #[tokio::test]
    async fn test_worker_panic_is_a_preload_failure() {
        let config = PreloadConfig {
            max_retries: 0,
            ..fast_config()
        };
        let (handle, rx) = spawn(config, Arc::new(PanickingPipeline), Arc::new(EventBus::new()));

        handle.start();

        match outcome(rx).await {
            PreloadOutcome::Failed { error, retries } => {
                assert!(matches!(error, PreloadError::Preload(_)));
                assert_eq!(retries, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!handle.is_in_flight());
    }
}
