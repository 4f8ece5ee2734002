// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model loading
//!
//! [`ModelLoader`] turns bytes or a URL into a [`ModelHandle`]. Loads are
//! futures that own everything they touch, so the host can run them on any
//! executor. Starting a new load or calling [`ModelLoader::cancel`] aborts
//! the previous one; a cancelled load resolves to [`LoadError::Cancelled`]
//! even if parsing had already finished.

use crate::config::RetryPolicy;
use crate::error::{FetchError, LoadError, Result};
use crate::events::{LoadProgress, LoadStage, ProgressSink};
use futures::future::{AbortHandle, Abortable, BoxFuture};
use futures::{Future, FutureExt};
use ifc_lite_model::{IfcModel, IfcParser, ModelMetadata};
use ifc_lite_parser::StepParser;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Where the model bytes come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelSource {
    Bytes(Vec<u8>),
    Url(String),
}

impl ModelSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, ModelSource::Url(_))
    }
}

impl From<Vec<u8>> for ModelSource {
    fn from(bytes: Vec<u8>) -> Self {
        ModelSource::Bytes(bytes)
    }
}

/// Body of a successful fetch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchedBytes {
    pub bytes: Vec<u8>,
    /// Value of the Content-Length header, if the server sent one
    pub content_length: Option<u64>,
}

/// Host-provided transport for URL sources
pub trait ModelFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, std::result::Result<FetchedBytes, FetchError>>;
}

/// Async sleep supplied by the host, used between retries
pub type Sleeper = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

/// Exclusive owner of a parsed model
///
/// The model is released by [`close`](Self::close), exactly once.
pub struct ModelHandle {
    model: Option<Arc<dyn IfcModel>>,
    byte_len: usize,
}

impl ModelHandle {
    pub fn new(model: Arc<dyn IfcModel>, byte_len: usize) -> Self {
        Self {
            model: Some(model),
            byte_len,
        }
    }

    /// The parsed model, `None` once closed
    pub fn model(&self) -> Option<&Arc<dyn IfcModel>> {
        self.model.as_ref()
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.model.as_ref().map(|m| m.metadata())
    }

    /// Size of the file the model was parsed from
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn is_open(&self) -> bool {
        self.model.is_some()
    }

    /// Release the model; returns false if it was already closed
    pub fn close(&mut self) -> bool {
        match self.model.take() {
            Some(_) => {
                log::debug!("Closed model handle ({} bytes)", self.byte_len);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("open", &self.is_open())
            .field("byte_len", &self.byte_len)
            .finish()
    }
}

/// Result of a load, tagged with the load it belongs to
pub struct LoadOutcome {
    pub generation: u64,
    pub result: Result<ModelHandle>,
}

/// A load in flight
///
/// Resolves to a [`LoadOutcome`]; compare its generation against
/// [`ModelLoader::generation`] to drop results of superseded loads.
pub struct PendingLoad {
    generation: u64,
    future: BoxFuture<'static, Result<ModelHandle>>,
}

impl PendingLoad {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Future for PendingLoad {
    type Output = LoadOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<LoadOutcome> {
        let generation = self.generation;
        self.future
            .as_mut()
            .poll(cx)
            .map(|result| LoadOutcome { generation, result })
    }
}

/// Fetches and parses models, one at a time
pub struct ModelLoader {
    parser: Arc<dyn IfcParser>,
    fetcher: Option<Arc<dyn ModelFetcher>>,
    abort: Option<AbortHandle>,
    generation: u64,
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLoader {
    /// Loader with the STEP parser and no fetcher (bytes only)
    pub fn new() -> Self {
        Self::with_parser(Arc::new(StepParser::new()))
    }

    pub fn with_parser(parser: Arc<dyn IfcParser>) -> Self {
        Self {
            parser,
            fetcher: None,
            abort: None,
            generation: 0,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ModelFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn set_fetcher(&mut self, fetcher: Arc<dyn ModelFetcher>) {
        self.fetcher = Some(fetcher);
    }

    /// Id of the most recently started load
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mark a load as installed so a later [`cancel`](Self::cancel) has
    /// nothing to abort; outcomes of other generations are ignored
    pub fn complete(&mut self, generation: u64) {
        if generation == self.generation {
            self.abort = None;
        }
    }

    /// Abort the load in flight, if any
    ///
    /// Bumps the generation so a late completion is recognisably stale.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.abort.take() {
            handle.abort();
            self.generation += 1;
            log::info!("Cancelled model load");
        }
    }

    /// Start loading a model, aborting any load still in flight
    pub fn load(&mut self, source: ModelSource, progress: Option<ProgressSink>) -> PendingLoad {
        let task = attempt(
            Arc::clone(&self.parser),
            self.fetcher.clone(),
            source,
            progress,
        );
        self.start(task)
    }

    /// Like [`load`](Self::load), retrying URL sources on transient failures
    ///
    /// Waits `policy.delay(n)` between attempts. Byte sources and failures
    /// that another attempt cannot fix (corrupt or oversized files) are
    /// returned immediately. When attempts run out the error is
    /// [`LoadError::RetriesExhausted`].
    pub fn load_with_retry(
        &mut self,
        source: ModelSource,
        progress: Option<ProgressSink>,
        policy: RetryPolicy,
        sleep: Sleeper,
    ) -> PendingLoad {
        let parser = Arc::clone(&self.parser);
        let fetcher = self.fetcher.clone();

        let task = async move {
            let max_attempts = policy.max_attempts.max(1);
            let mut attempt_no = 0;
            loop {
                let result = attempt(
                    Arc::clone(&parser),
                    fetcher.clone(),
                    source.clone(),
                    progress.clone(),
                )
                .await;
                attempt_no += 1;

                let err = match result {
                    Ok(handle) => return Ok(handle),
                    Err(err) => err,
                };
                if !source.is_remote() || !err.is_retryable() {
                    return Err(err);
                }
                if attempt_no >= max_attempts {
                    return Err(LoadError::RetriesExhausted {
                        attempts: attempt_no,
                        last: Box::new(err),
                    });
                }

                let delay = policy.delay(attempt_no - 1);
                log::warn!(
                    "Load attempt {attempt_no}/{max_attempts} failed ({err}), retrying in {delay:?}"
                );
                sleep(delay).await;
            }
        };
        self.start(task)
    }

    fn start<F>(&mut self, task: F) -> PendingLoad
    where
        F: Future<Output = Result<ModelHandle>> + Send + 'static,
    {
        self.cancel();
        let (handle, registration) = AbortHandle::new_pair();
        let guard = handle.clone();
        self.abort = Some(handle);
        self.generation += 1;

        let future = Abortable::new(task, registration)
            .map(move |result| match result {
                // Parsing runs inside a single poll; catch aborts that land during it
                Ok(_) if guard.is_aborted() => Err(LoadError::Cancelled),
                Ok(inner) => inner,
                Err(_aborted) => Err(LoadError::Cancelled),
            })
            .boxed();

        PendingLoad {
            generation: self.generation,
            future,
        }
    }
}

fn emit(progress: &Option<ProgressSink>, event: LoadProgress) {
    if let Some(sink) = progress {
        sink(&event);
    }
}

/// One fetch + parse
async fn attempt(
    parser: Arc<dyn IfcParser>,
    fetcher: Option<Arc<dyn ModelFetcher>>,
    source: ModelSource,
    progress: Option<ProgressSink>,
) -> Result<ModelHandle> {
    let (bytes, content_length) = match source {
        ModelSource::Bytes(bytes) => {
            let len = bytes.len() as u64;
            (bytes, Some(len))
        }
        ModelSource::Url(url) => {
            let fetcher = fetcher.ok_or_else(|| LoadError::NoFetcher(url.clone()))?;
            log::info!("Fetching {url}");
            emit(
                &progress,
                LoadProgress::stage(LoadStage::Fetching).with_message(format!("Fetching {url}")),
            );
            let fetched = fetcher.fetch(&url).await?;
            (fetched.bytes, fetched.content_length)
        }
    };

    log::info!("Parsing {} bytes", bytes.len());
    emit(
        &progress,
        LoadProgress::stage(LoadStage::Parsing).with_content_length(content_length),
    );

    // Parser phases report 0..100; they occupy the 30..50 band overall
    let parse_sink = progress.clone();
    let on_parse: ifc_lite_model::ProgressCallback = Box::new(move |phase, percent| {
        if let Some(sink) = &parse_sink {
            let overall = LoadStage::Parsing.percent()
                + (LoadStage::Opening.percent() - LoadStage::Parsing.percent()) * percent / 100.0;
            sink(&LoadProgress::stage(LoadStage::Parsing)
                .with_percent(overall)
                .with_message(format!("Parsing IFC file: {phase}"))
                .with_content_length(content_length));
        }
    });
    let model = parser.parse_with_progress(&bytes, on_parse)?;

    log::info!(
        "Parsed {} model with {} entities",
        model.metadata().schema_version,
        model.resolver().entity_count()
    );
    emit(
        &progress,
        LoadProgress::stage(LoadStage::Opening).with_content_length(content_length),
    );

    Ok(ModelHandle::new(model, bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureCause;
    use crate::test_support::TEST_IFC;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails with a network error `failures` times, then serves the fixture
    struct FlakyFetcher {
        failures: u32,
        calls: AtomicU32,
        body: &'static str,
    }

    impl FlakyFetcher {
        fn new(failures: u32, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                body,
            })
        }
    }

    impl ModelFetcher for FlakyFetcher {
        fn fetch(
            &self,
            _url: &str,
        ) -> BoxFuture<'static, std::result::Result<FetchedBytes, FetchError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if call < self.failures {
                Err(FetchError::Network("connection refused".into()))
            } else {
                Ok(FetchedBytes {
                    bytes: self.body.as_bytes().to_vec(),
                    content_length: Some(self.body.len() as u64),
                })
            };
            futures::future::ready(result).boxed()
        }
    }

    struct NeverFetcher;

    impl ModelFetcher for NeverFetcher {
        fn fetch(
            &self,
            _url: &str,
        ) -> BoxFuture<'static, std::result::Result<FetchedBytes, FetchError>> {
            futures::future::pending().boxed()
        }
    }

    fn no_sleep() -> Sleeper {
        Arc::new(|_| futures::future::ready(()).boxed())
    }

    #[test]
    fn test_load_bytes_reports_stages() {
        let _ = env_logger::builder().is_test(true).try_init();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink_stages = Arc::clone(&stages);
        let sink: ProgressSink = Arc::new(move |p: &LoadProgress| {
            sink_stages.lock().unwrap().push((p.stage, p.percent));
        });

        let mut loader = ModelLoader::new();
        let outcome = block_on(loader.load(TEST_IFC.as_bytes().to_vec().into(), Some(sink)));
        assert_eq!(outcome.generation, loader.generation());

        let mut handle = outcome.result.unwrap();
        assert!(handle.is_open());
        assert_eq!(handle.metadata().unwrap().schema_version, "IFC4");

        let stages = stages.lock().unwrap();
        assert_eq!(stages.first().map(|s| s.0), Some(LoadStage::Parsing));
        assert_eq!(stages.last().map(|s| s.0), Some(LoadStage::Opening));
        assert!(stages.iter().all(|(_, p)| (30.0..=50.0).contains(p)));

        assert!(handle.close());
        assert!(!handle.close());
        assert!(handle.model().is_none());
    }

    #[test]
    fn test_malformed_bytes_are_corrupted() {
        let mut loader = ModelLoader::new();
        let outcome = block_on(loader.load(b"not a model".to_vec().into(), None));
        let err = outcome.result.unwrap_err();
        assert_eq!(err.cause(), FailureCause::Corrupted);
    }

    #[test]
    fn test_url_without_fetcher() {
        let mut loader = ModelLoader::new();
        let outcome = block_on(loader.load(ModelSource::Url("https://x/model.ifc".into()), None));
        assert!(matches!(outcome.result, Err(LoadError::NoFetcher(_))));
    }

    #[test]
    fn test_missing_fetcher_is_not_retried() {
        let sleeps = Arc::new(AtomicU32::new(0));
        let counted = Arc::clone(&sleeps);
        let sleep: Sleeper = Arc::new(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(()).boxed()
        });

        let mut loader = ModelLoader::new();
        let outcome = block_on(loader.load_with_retry(
            ModelSource::Url("https://x/model.ifc".into()),
            None,
            RetryPolicy::default(),
            sleep,
        ));

        let err = outcome.result.unwrap_err();
        assert!(matches!(err, LoadError::NoFetcher(_)));
        assert!(!err.suggests_manual_download());
        assert_eq!(sleeps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_url_load_reports_fetch_and_content_length() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink_stages = Arc::clone(&stages);
        let sink: ProgressSink = Arc::new(move |p: &LoadProgress| {
            sink_stages.lock().unwrap().push((p.stage, p.content_length));
        });

        let fetcher = FlakyFetcher::new(0, TEST_IFC);
        let mut loader = ModelLoader::new().with_fetcher(fetcher);
        let outcome = block_on(loader.load_with_retry(
            ModelSource::Url("https://x/model.ifc".into()),
            Some(sink),
            RetryPolicy::default(),
            no_sleep(),
        ));
        assert!(outcome.result.is_ok());

        let expected = Some(TEST_IFC.len() as u64);
        let stages = stages.lock().unwrap();
        assert_eq!(stages.first().map(|s| s.0), Some(LoadStage::Fetching));
        assert_eq!(stages.last().map(|s| s.0), Some(LoadStage::Opening));
        assert!(stages
            .iter()
            .filter(|(stage, _)| *stage != LoadStage::Fetching)
            .all(|(_, length)| *length == expected));
        assert!(stages.iter().any(|(stage, _)| *stage == LoadStage::Parsing));
    }

    #[test]
    fn test_cancel_after_completion_keeps_generation() {
        let mut loader = ModelLoader::new();
        let outcome = block_on(loader.load(TEST_IFC.as_bytes().to_vec().into(), None));
        loader.complete(outcome.generation);

        let generation = loader.generation();
        loader.cancel();
        assert_eq!(loader.generation(), generation);
    }

    #[test]
    fn test_retry_recovers_from_transient_failures() {
        let fetcher = FlakyFetcher::new(2, TEST_IFC);
        let mut loader = ModelLoader::new().with_fetcher(fetcher.clone());
        let outcome = block_on(loader.load_with_retry(
            ModelSource::Url("https://x/model.ifc".into()),
            None,
            RetryPolicy::default(),
            no_sleep(),
        ));
        assert!(outcome.result.is_ok());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_gives_up_after_max_attempts() {
        let fetcher = FlakyFetcher::new(10, TEST_IFC);
        let delays = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&delays);
        let sleep: Sleeper = Arc::new(move |d| {
            recorded.lock().unwrap().push(d);
            futures::future::ready(()).boxed()
        });

        let mut loader = ModelLoader::new().with_fetcher(fetcher.clone());
        let outcome = block_on(loader.load_with_retry(
            ModelSource::Url("https://x/model.ifc".into()),
            None,
            RetryPolicy::default(),
            sleep,
        ));

        let err = outcome.result.unwrap_err();
        assert!(matches!(err, LoadError::RetriesExhausted { attempts: 3, .. }));
        assert!(err.suggests_manual_download());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *delays.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_corrupt_download_is_not_retried() {
        let fetcher = FlakyFetcher::new(0, "garbage");
        let mut loader = ModelLoader::new().with_fetcher(fetcher.clone());
        let outcome = block_on(loader.load_with_retry(
            ModelSource::Url("https://x/model.ifc".into()),
            None,
            RetryPolicy::default(),
            no_sleep(),
        ));
        assert_eq!(outcome.result.unwrap_err().cause(), FailureCause::Corrupted);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_aborts_pending_fetch() {
        let mut loader = ModelLoader::new().with_fetcher(Arc::new(NeverFetcher));
        let pending = loader.load(ModelSource::Url("https://x/slow.ifc".into()), None);
        let started = pending.generation();
        loader.cancel();
        assert!(loader.generation() > started);

        let outcome = block_on(pending);
        assert!(matches!(outcome.result, Err(LoadError::Cancelled)));
    }

    #[test]
    fn test_new_load_supersedes_previous() {
        let mut loader = ModelLoader::new().with_fetcher(Arc::new(NeverFetcher));
        let first = loader.load(ModelSource::Url("https://x/slow.ifc".into()), None);
        let second = loader.load(TEST_IFC.as_bytes().to_vec().into(), None);

        assert!(matches!(block_on(first).result, Err(LoadError::Cancelled)));
        let outcome = block_on(second);
        assert_eq!(outcome.generation, loader.generation());
        assert!(outcome.result.is_ok());
    }
}
