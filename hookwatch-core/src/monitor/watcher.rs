//! Directory watcher orchestrating the event-to-webhook pipeline

use crate::config::{WatchConfig, expand_env};
use crate::dispatch::Dispatcher;
use crate::monitor::{
    Debouncer, EventPipeline, NotifySource, Result, SourceStreams, WatchError, WatchSource,
    WatcherState,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Watches the configured roots and forwards matching events to the webhook
///
/// Every directory below each root gets its own registration on the source;
/// files are never registered. Events are consumed by a single background
/// task, and each accepted event is dispatched without being awaited.
pub struct DirectoryWatcher<S: WatchSource = NotifySource> {
    config: Arc<WatchConfig>,
    source: S,
    streams: Option<SourceStreams>,
    pipeline: EventPipeline,
    state: WatcherState,
    watched: Vec<PathBuf>,
    shutdown: Option<oneshot::Sender<()>>,
    event_task: Option<JoinHandle<()>>,
    housekeeping: Option<JoinHandle<()>>,
}

impl DirectoryWatcher<NotifySource> {
    /// Create a watcher on the platform notification source
    pub fn from_config(config: WatchConfig) -> Result<Self> {
        let (source, streams) = NotifySource::new().map_err(WatchError::Source)?;
        let dispatcher = Dispatcher::from_config(&config)?;
        let debouncer = Arc::new(Debouncer::default());
        Ok(Self::new(config, source, streams, debouncer, dispatcher))
    }
}

impl<S: WatchSource> DirectoryWatcher<S> {
    pub fn new(
        config: WatchConfig,
        source: S,
        streams: SourceStreams,
        debouncer: Arc<Debouncer>,
        dispatcher: Dispatcher,
    ) -> Self {
        let pipeline = EventPipeline::new(&config, debouncer, dispatcher);

        Self {
            config: Arc::new(config),
            source,
            streams: Some(streams),
            pipeline,
            state: WatcherState::Created,
            watched: Vec::new(),
            shutdown: None,
            event_task: None,
            housekeeping: None,
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Directories registered during startup
    pub fn watched_directories(&self) -> &[PathBuf] {
        &self.watched
    }

    pub fn debouncer(&self) -> &Arc<Debouncer> {
        self.pipeline.debouncer()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        self.pipeline.dispatcher()
    }

    /// Whether the event loop task is still alive
    pub fn is_consuming(&self) -> bool {
        self.event_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Register all roots and start consuming events
    ///
    /// Must be called from within a tokio runtime. A root that does not
    /// exist is skipped with a warning; failing to register any directory
    /// inside an existing root aborts startup.
    pub fn start(&mut self) -> Result<()> {
        self.transition(WatcherState::Starting)?;

        let roots: Vec<PathBuf> = self
            .config
            .directories
            .iter()
            .map(|dir| PathBuf::from(expand_env(dir)))
            .collect();

        for root in &roots {
            match std::fs::metadata(root) {
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("Directory does not exist: {}", root.display());
                    continue;
                }
                _ => {}
            }

            info!("Adding directory to watch: {}", root.display());
            if let Err(e) = self.register_tree(root) {
                error!("Failed to register {}: {}", root.display(), e);
                self.stop();
                return Err(e);
            }
        }

        if let Some(streams) = self.streams.take() {
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let pipeline = self.pipeline.clone();
            self.shutdown = Some(shutdown_tx);
            self.event_task = Some(tokio::spawn(run_event_loop(
                pipeline,
                streams,
                shutdown_rx,
            )));
        }
        self.housekeeping = Some(self.pipeline.debouncer().spawn_housekeeping());

        self.transition(WatcherState::Running)?;
        info!("Watcher started ({} directories)", self.watched.len());
        Ok(())
    }

    /// Release the source and stop consuming; in-flight deliveries are not awaited
    pub fn stop(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        if let Some(shutdown) = self.shutdown.take() {
            // The loop may already have exited on its own.
            let _ = shutdown.send(());
        }
        if let Some(housekeeping) = self.housekeeping.take() {
            housekeeping.abort();
        }

        self.source.close();
        self.pipeline.dispatcher().close();
        self.state = WatcherState::Stopped;
        info!("Watcher stopped");
    }

    fn register_tree(&mut self, root: &Path) -> Result<()> {
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|source| WatchError::Walk {
                root: root.to_path_buf(),
                source,
            })?;

            if !entry.file_type().is_dir() {
                continue;
            }

            let dir = entry.into_path();
            self.source
                .watch(&dir)
                .map_err(|source| WatchError::Register {
                    path: dir.clone(),
                    source,
                })?;
            debug!("Watching directory: {}", dir.display());
            self.pipeline.track_directory(&dir);
            self.watched.push(dir);
        }

        Ok(())
    }

    fn transition(&mut self, to: WatcherState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(WatchError::InvalidTransition {
                from: self.state,
                to,
            });
        }

        debug!("Watcher state {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }
}

impl<S: WatchSource> Drop for DirectoryWatcher<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Consume raw events and source errors until shutdown or the source closes
async fn run_event_loop(
    pipeline: EventPipeline,
    streams: SourceStreams,
    mut shutdown: oneshot::Receiver<()>,
) {
    let SourceStreams {
        mut events,
        mut errors,
    } = streams;
    let mut errors_open = true;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Event loop shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(event) => {
                    pipeline.handle(event);
                }
                None => {
                    debug!("Event stream closed");
                    break;
                }
            },
            err = errors.recv(), if errors_open => match err {
                Some(e) => error!("Watch error: {}", e),
                None => errors_open = false,
            },
        }
    }
}
