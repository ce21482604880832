use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use haven_core::{AppConfig, Store};
use haven_crypto::TidGenerator;

use crate::firehose::dispatch::FirehoseHandle;
use crate::proxy::pipethrough::AppviewProxy;

/// Everything a request handler needs: the storage backend, the static
/// config, and the two process-singleton background services (firehose
/// dispatch, appview proxy).
#[derive(Clone)]
pub struct AppState<S: Store> {
    pub store: S,
    pub config: Arc<AppConfig>,
    pub firehose: Arc<FirehoseHandle>,
    pub appview: Arc<AppviewProxy>,
    /// TIDs are only monotonic if the same generator's internal atomic
    /// state is reused across requests, so one is cached per actor for the
    /// life of the process rather than constructed fresh per call.
    tid_generators: Arc<Mutex<HashMap<String, Arc<TidGenerator>>>>,
}

impl<S: Store> AppState<S> {
    pub fn new(
        store: S,
        config: Arc<AppConfig>,
        firehose: Arc<FirehoseHandle>,
        appview: Arc<AppviewProxy>,
    ) -> Self {
        Self {
            store,
            config,
            firehose,
            appview,
            tid_generators: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn tid_generator(&self, did: &str) -> Arc<TidGenerator> {
        let mut generators = self.tid_generators.lock().await;
        generators
            .entry(did.to_string())
            .or_insert_with(|| Arc::new(TidGenerator::new()))
            .clone()
    }
}
