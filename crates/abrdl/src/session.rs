use std::{
    collections::{HashSet, VecDeque},
    num::NonZeroU32,
    sync::Arc,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    address::{AddressResolver, SegmentAddress},
    catalog::{Representation, RepresentationCatalog},
    error::{AbrError, AbrResult, ErrorKind},
    estimator::{observed_kbps, BandwidthEstimator},
    selector::{RepresentationSelector, ThroughputSelector},
    storage::SegmentStorage,
    transport::{fetch_with_retry, FetchedSegment, RetryPolicy, SegmentTransport},
};

/// Segments downloaded when neither the caller nor the manifest tells how many there are.
pub const DEFAULT_SEGMENT_COUNT: u64 = 10;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bandwidth assumed before the first segment completes, in Kbps.
    pub initial_bandwidth_kbps: f64,
    /// Number of segments to download. Derived from the manifest when `None`.
    pub segment_count: Option<u64>,
    /// First segment number. Defaults to the `startNumber` of the first representation.
    pub start_number: Option<u64>,
    /// Maximum number of segments in flight.
    pub lookahead: NonZeroU32,
    /// Payloads of at most this many bytes are treated as error pages.
    pub min_segment_size: usize,
    pub retry: RetryPolicy,
    /// Download the initialization segment of every representation the first time it is used.
    pub fetch_initialization: bool,
}

impl SessionConfig {
    pub fn start_number_for(&self, catalog: &RepresentationCatalog) -> u64 {
        self.start_number
            .unwrap_or_else(|| catalog.first().start_number)
    }

    pub fn segment_count_for(&self, catalog: &RepresentationCatalog) -> u64 {
        self.segment_count
            .or_else(|| catalog.segment_count())
            .unwrap_or(DEFAULT_SEGMENT_COUNT)
    }

    pub fn validate(&self) -> AbrResult<()> {
        if !self.initial_bandwidth_kbps.is_finite() || self.initial_bandwidth_kbps < 0.0 {
            return Err(AbrError::InvalidConfig(format!(
                "initial bandwidth must be a non-negative number, got {}",
                self.initial_bandwidth_kbps
            )));
        }
        if let (Some(start_number), Some(segment_count)) = (self.start_number, self.segment_count) {
            if segment_count > 0 && start_number.checked_add(segment_count - 1).is_none() {
                return Err(AbrError::InvalidConfig(format!(
                    "{segment_count} segment(s) from #{start_number} exceed the segment number range"
                )));
            }
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_bandwidth_kbps: 5000.0,
            segment_count: None,
            start_number: None,
            lookahead: NonZeroU32::MIN,
            min_segment_size: 50,
            retry: RetryPolicy::none(),
            fetch_initialization: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SegmentFailure {
    pub number: u64,
    pub url: String,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Outcome of a whole session.
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub succeeded: u64,
    pub failed: u64,
    /// Segments aborted in flight by cancellation.
    pub cancelled: u64,
    /// Segments never dispatched because the session was cancelled.
    pub skipped: u64,
    pub bytes: u64,
    pub final_estimate_kbps: f64,
    pub failures: Vec<SegmentFailure>,
}

impl SessionSummary {
    pub fn attempted(&self) -> u64 {
        self.succeeded + self.failed + self.cancelled
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.cancelled == 0 && self.skipped == 0
    }
}

struct SegmentAttempt {
    number: u64,
    representation_id: String,
    address: SegmentAddress,
    result: AbrResult<FetchedSegment>,
}

/// Drives select → resolve → fetch → validate → persist → estimate for a range of segments.
///
/// ```text
///              dispatch (estimate at dispatch time)
///  ┌──────────┐   #n, #n+1, ... #n+lookahead-1    ┌───────────────┐
///  │ selector ├──────────────────────────────────►│ fetch tasks   │
///  └────▲─────┘                                   └──────┬────────┘
///       │ estimate                                       │ joined in index order
///  ┌────┴──────┐   update      ┌──────────┐   write  ┌───▼───────┐
///  │ estimator │◄──────────────┤ validate ├─────────►│  storage  │
///  └───────────┘               └──────────┘          └───────────┘
/// ```
///
/// Segments are committed in increasing number order whatever order their fetches complete in,
/// and the estimator is only touched from [`SegmentFetchLoop::run`]. A `lookahead` of one gives
/// the plain sequential fetch-then-adapt cycle.
pub struct SegmentFetchLoop<T, S, P = ThroughputSelector>
where
    T: SegmentTransport,
    S: SegmentStorage,
    P: RepresentationSelector,
{
    transport: Arc<T>,
    storage: S,
    selector: P,
    resolver: AddressResolver,
    config: SessionConfig,
    estimator: BandwidthEstimator,
    cancel: CancellationToken,
    initialized: HashSet<String>,
}

impl<T, S> SegmentFetchLoop<T, S, ThroughputSelector>
where
    T: SegmentTransport,
    S: SegmentStorage,
{
    pub fn new(transport: T, storage: S, resolver: AddressResolver, config: SessionConfig) -> Self {
        let estimator = BandwidthEstimator::new(config.initial_bandwidth_kbps);
        Self {
            transport: Arc::new(transport),
            storage,
            selector: ThroughputSelector,
            resolver,
            config,
            estimator,
            cancel: CancellationToken::new(),
            initialized: HashSet::new(),
        }
    }
}

impl<T, S, P> SegmentFetchLoop<T, S, P>
where
    T: SegmentTransport,
    S: SegmentStorage,
    P: RepresentationSelector,
{
    pub fn with_selector<Q>(self, selector: Q) -> SegmentFetchLoop<T, S, Q>
    where
        Q: RepresentationSelector,
    {
        SegmentFetchLoop {
            transport: self.transport,
            storage: self.storage,
            selector,
            resolver: self.resolver,
            config: self.config,
            estimator: self.estimator,
            cancel: self.cancel,
            initialized: self.initialized,
        }
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn estimator(&self) -> &BandwidthEstimator {
        &self.estimator
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Runs over the segment range the configuration and manifest describe.
    pub async fn run_catalog(&mut self, catalog: &RepresentationCatalog) -> SessionSummary {
        let start_number = self.config.start_number_for(catalog);
        let segment_count = self.config.segment_count_for(catalog);
        self.run(catalog, start_number, segment_count).await
    }

    /// Downloads segments `start_number .. start_number + segment_count`.
    ///
    /// Individual segment failures are recorded in the summary and never stop the session.
    pub async fn run(
        &mut self,
        catalog: &RepresentationCatalog,
        start_number: u64,
        segment_count: u64,
    ) -> SessionSummary {
        let lookahead = self.config.lookahead.get() as usize;
        let reachable = (u64::MAX - start_number).saturating_add(1);
        if segment_count > reachable {
            tracing::warn!(
                "Only {reachable} segment(s) can be numbered from #{start_number}, the rest is skipped."
            );
        }
        let requested = segment_count;
        let segment_count = segment_count.min(reachable);
        tracing::info!(
            "Start downloading {segment_count} segment(s) from #{start_number} with {} representation(s), lookahead {lookahead}.",
            catalog.len()
        );

        let mut summary = SessionSummary::default();
        let mut in_flight: VecDeque<(u64, JoinHandle<SegmentAttempt>)> = VecDeque::new();
        let mut dispatched = 0;

        loop {
            while in_flight.len() < lookahead
                && dispatched < segment_count
                && !self.cancel.is_cancelled()
            {
                let number = start_number + dispatched;
                let estimate = self.estimator.estimate();
                let representation = self.selector.select(catalog, estimate);
                tracing::debug!(
                    "Segment #{number}: estimate {estimate:.2} Kbps, selected {} ({} bps)",
                    representation.id,
                    representation.bandwidth
                );

                self.ensure_initialization(representation).await;
                in_flight.push_back((number, self.spawn_fetch(representation, number)));
                dispatched += 1;
            }

            let Some((number, handle)) = in_flight.pop_front() else {
                break;
            };
            match handle.await {
                Ok(attempt) => self.commit(attempt, &mut summary).await,
                Err(e) => {
                    tracing::error!("Fetch task of segment #{number} failed: {e}");
                    summary.failed += 1;
                    summary.failures.push(SegmentFailure {
                        number,
                        url: String::new(),
                        kind: ErrorKind::Transport,
                        reason: e.to_string(),
                    });
                }
            }
        }

        summary.skipped = requested - dispatched;
        summary.final_estimate_kbps = self.estimator.estimate();

        if self.cancel.is_cancelled() {
            tracing::warn!(
                "Session cancelled, {} segment(s) aborted and {} never started.",
                summary.cancelled,
                summary.skipped
            );
        }
        tracing::info!(
            "Downloaded {} / {segment_count} segment(s), {} failed. Final estimate {:.2} Kbps.",
            summary.succeeded,
            summary.failed,
            summary.final_estimate_kbps
        );
        for failure in summary.failures.iter() {
            tracing::warn!("  - #{} {}: {}", failure.number, failure.url, failure.reason);
        }

        summary
    }

    fn spawn_fetch(
        &self,
        representation: &Representation,
        number: u64,
    ) -> JoinHandle<SegmentAttempt> {
        let address = self.resolver.resolve(representation, number);
        let representation_id = representation.id.clone();
        let transport = self.transport.clone();
        let token = self.cancel.clone();
        let retry = self.config.retry;

        tracing::info!("Downloading segment #{number} ({representation_id}): {}", address.url);
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => Err(AbrError::Cancelled),
                result = fetch_with_retry(transport.as_ref(), &address.url, retry) => result,
            };
            SegmentAttempt {
                number,
                representation_id,
                address,
                result,
            }
        })
    }

    async fn commit(&mut self, attempt: SegmentAttempt, summary: &mut SessionSummary) {
        let SegmentAttempt {
            number,
            representation_id,
            address,
            result,
        } = attempt;

        let fetched = match result.and_then(|fetched| self.validate(fetched)) {
            Ok(fetched) => fetched,
            Err(AbrError::Cancelled) => {
                tracing::debug!("Segment #{number} cancelled.");
                summary.cancelled += 1;
                return;
            }
            Err(e) => return record_failure(summary, number, &address, e),
        };

        let size = fetched.len();
        if let Err(e) = self.storage.write(&address.name, fetched.data).await {
            return record_failure(summary, number, &address, e);
        }

        if let Some(kbps) = observed_kbps(size, fetched.elapsed) {
            self.estimator.update(kbps);
        }

        summary.succeeded += 1;
        summary.bytes += size as u64;
        tracing::info!(
            "Segment #{number} ({representation_id}) saved to {}: {:.2} KB in {:.3}s, estimated bandwidth {:.2} Kbps",
            address.name,
            size as f64 / 1024.0,
            fetched.elapsed.as_secs_f64(),
            self.estimator.estimate()
        );
    }

    fn validate(&self, fetched: FetchedSegment) -> AbrResult<FetchedSegment> {
        if fetched.len() <= self.config.min_segment_size {
            return Err(AbrError::SegmentTooSmall {
                size: fetched.len(),
                min: self.config.min_segment_size,
            });
        }
        Ok(fetched)
    }

    async fn ensure_initialization(&mut self, representation: &Representation) {
        if !self.config.fetch_initialization || self.initialized.contains(&representation.id) {
            return;
        }
        let Some(address) = self.resolver.resolve_initialization(representation) else {
            self.initialized.insert(representation.id.clone());
            return;
        };

        let result = tokio::select! {
            _ = self.cancel.cancelled() => Err(AbrError::Cancelled),
            result = fetch_with_retry(self.transport.as_ref(), &address.url, self.config.retry) => result,
        };
        let result = match result.and_then(|fetched| self.validate(fetched)) {
            Ok(fetched) => self.storage.write(&address.name, fetched.data).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    "Initialization segment of {} saved to {}",
                    representation.id,
                    address.name
                );
                self.initialized.insert(representation.id.clone());
            }
            Err(AbrError::Cancelled) => {}
            Err(e) => tracing::warn!(
                "Failed to download initialization segment {}: {e}",
                address.url
            ),
        }
    }
}

fn record_failure(summary: &mut SessionSummary, number: u64, address: &SegmentAddress, e: AbrError) {
    tracing::warn!("Failed to download segment #{number} {}: {e}", address.url);
    summary.failed += 1;
    summary.failures.push(SegmentFailure {
        number,
        url: address.url.clone(),
        kind: e.kind(),
        reason: e.to_string(),
    });
}
