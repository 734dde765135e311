pub mod clock;
pub mod notifier;
pub mod queue;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::repository::{Store, WorkshopDirectory};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub directory: WorkshopDirectory,
    pub engine: queue::QueueEngine,
}

impl AppState {
    /// Wire the default stack: system clock, log-backed notifier with its
    /// worker running on the current runtime.
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let notifier = notifier::Notifier::new(config.notifier_queue_size);
        notifier.spawn_worker(Arc::new(notifier::LogSink));
        Self::with_parts(store, config, Arc::new(clock::SystemClock), notifier)
    }

    /// Assembly seam for tests: inject clock and notifier.
    pub fn with_parts(
        store: Arc<dyn Store>,
        config: Config,
        clock: Arc<dyn clock::Clock>,
        notifier: notifier::Notifier,
    ) -> Self {
        let deadline = Duration::from_millis(config.request_deadline_ms);
        let engine = queue::QueueEngine::new(store.clone(), clock, notifier, deadline);
        let directory = WorkshopDirectory::new(store.clone());
        Self {
            config,
            store,
            directory,
            engine,
        }
    }
}
