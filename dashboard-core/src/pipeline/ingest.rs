//! Dashboard pipeline
//!
//! Composes decoder, smoother, aggregator and read model for one session.
//! Every accepted frame is decoded, smoothed, aggregated and published exactly
//! once, synchronously, in arrival order. Dropped frames leave all derived
//! state untouched.

use super::aggregator::{AggregateStats, Aggregator, DEFAULT_TREND_CAPACITY};
use super::decoder::{ClassCountPolicy, ConfigMismatch, Decoded, FrameDecoder, FrameError};
use super::frame::Frame;
use super::smoothing::{SmoothedSignal, SmoothingEngine, DEFAULT_ALPHA, DEFAULT_WINDOW};
use super::state::{
    DashboardSnapshot, DashboardState, DashboardSummary, Observer, PublishCause, SnapshotReader,
    SubscriptionId,
};
use crate::time::{Clock, SystemClock, Timestamp};
use crate::transport::{ConnectionState, RawMessage};
use crate::usecase::UseCaseConfig;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tunables for one pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub smoothing_window: usize,
    pub smoothing_alpha: f64,
    /// `None` keeps every event
    pub event_log_capacity: Option<usize>,
    pub trend_capacity: usize,
    pub class_count_policy: ClassCountPolicy,
}

impl PipelineSettings {
    pub fn validate(&self) -> crate::Result<()> {
        if self.smoothing_window == 0 {
            return Err(crate::Error::Config(
                "smoothing window must be > 0".to_string(),
            ));
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(crate::Error::Config(format!(
                "smoothing alpha must be in (0, 1], got {}",
                self.smoothing_alpha
            )));
        }
        if self.trend_capacity == 0 {
            return Err(crate::Error::Config(
                "trend capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            smoothing_window: DEFAULT_WINDOW,
            smoothing_alpha: DEFAULT_ALPHA,
            event_log_capacity: None,
            trend_capacity: DEFAULT_TREND_CAPACITY,
            class_count_policy: ClassCountPolicy::Strict,
        }
    }
}

/// Per-session ingestion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub malformed: u64,
    pub config_mismatches: u64,
    /// Sequence numbers skipped within one link
    pub sequence_gaps: u64,
}

/// Result of offering one message to the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Accepted {
        sequence: u64,
        revision: u64,
        mismatch: Option<ConfigMismatch>,
    },
    Dropped {
        sequence: u64,
        reason: FrameError,
    },
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted { .. })
    }

    pub fn sequence(&self) -> u64 {
        match self {
            IngestOutcome::Accepted { sequence, .. } | IngestOutcome::Dropped { sequence, .. } => {
                *sequence
            }
        }
    }
}

/// Link id used for values fed directly rather than through a transport
const DIRECT_LINK: u64 = u64::MAX;

/// Owned session state: decoder, smoother, aggregator and read model
pub struct DashboardPipeline {
    session_id: Uuid,
    use_case: Arc<UseCaseConfig>,
    settings: PipelineSettings,
    decoder: FrameDecoder,
    smoother: SmoothingEngine,
    aggregator: Aggregator,
    state: DashboardState,
    clock: Arc<dyn Clock>,
    latest_frame: Option<Arc<Frame>>,
    latest_smoothed: Option<SmoothedSignal>,
    connection: ConnectionState,
    last_cause: PublishCause,
    last_position: Option<(u64, u64)>,
    stats: IngestStats,
}

impl DashboardPipeline {
    /// Start a session for `use_case`, stamping frames with the system clock
    pub fn new(
        use_case: impl Into<Arc<UseCaseConfig>>,
        settings: PipelineSettings,
    ) -> crate::Result<Self> {
        let use_case = use_case.into();
        use_case.validate()?;
        settings.validate()?;

        let session_id = Uuid::new_v4();
        info!(
            session_id = %session_id,
            use_case = %use_case.id,
            window = settings.smoothing_window,
            alpha = settings.smoothing_alpha,
            "Starting dashboard session"
        );

        Ok(Self {
            session_id,
            decoder: FrameDecoder::new(Arc::clone(&use_case), settings.class_count_policy),
            smoother: SmoothingEngine::new(settings.smoothing_window, settings.smoothing_alpha),
            aggregator: Aggregator::new(
                &use_case,
                settings.event_log_capacity,
                settings.trend_capacity,
            ),
            state: DashboardState::new(),
            clock: Arc::new(SystemClock),
            latest_frame: None,
            latest_smoothed: None,
            connection: ConnectionState::Closed,
            last_cause: PublishCause::SessionReset,
            last_position: None,
            stats: IngestStats::default(),
            use_case,
            settings,
        })
    }

    /// Replace the clock used to stamp directly fed values
    ///
    /// Messages from a transport keep the arrival time the link assigned.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Ingest a payload delivered by the transport
    pub fn ingest(&mut self, message: &RawMessage) -> IngestOutcome {
        self.process(
            message.link_id,
            message.sequence,
            message.received_at,
            &message.payload,
        )
    }

    /// Ingest a JSON value fed directly
    pub fn ingest_value(&mut self, sequence: u64, value: &Value) -> IngestOutcome {
        let received_at = self.clock.now();
        self.process(DIRECT_LINK, sequence, received_at, value)
    }

    /// Ingest one JSON document fed directly
    pub fn ingest_text(&mut self, sequence: u64, text: &str) -> IngestOutcome {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                let received_at = self.clock.now();
                self.process(DIRECT_LINK, sequence, received_at, &value)
            }
            Err(e) => {
                self.track_sequence(DIRECT_LINK, sequence);
                self.drop_frame(sequence, FrameError::Undecodable(e.to_string()))
            }
        }
    }

    /// Record a connection-state change and publish it
    pub fn on_connection_state(&mut self, state: ConnectionState) {
        if self.connection == state {
            return;
        }
        self.connection = state;
        self.publish(PublishCause::Connection);
    }

    /// End the current session and start a new one for `use_case`
    ///
    /// Smoothing window, statistics and counters start over; observers stay
    /// subscribed and revisions keep counting.
    pub fn reset(&mut self, use_case: impl Into<Arc<UseCaseConfig>>) -> crate::Result<()> {
        let use_case = use_case.into();
        use_case.validate()?;

        let previous = std::mem::replace(&mut self.session_id, Uuid::new_v4());
        info!(
            previous_session = %previous,
            session_id = %self.session_id,
            use_case = %use_case.id,
            accepted = self.stats.accepted,
            "Resetting dashboard session"
        );

        self.decoder = FrameDecoder::new(Arc::clone(&use_case), self.settings.class_count_policy);
        self.smoother.reset();
        self.aggregator = Aggregator::new(
            &use_case,
            self.settings.event_log_capacity,
            self.settings.trend_capacity,
        );
        self.use_case = use_case;
        self.latest_frame = None;
        self.latest_smoothed = None;
        self.last_position = None;
        self.stats = IngestStats::default();
        self.publish(PublishCause::SessionReset);
        Ok(())
    }

    pub fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        self.state.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }

    /// Thread-safe reader of the latest published summary
    pub fn reader(&self) -> SnapshotReader {
        self.state.reader()
    }

    /// Current read model without publishing
    pub fn summary(&self) -> DashboardSummary {
        DashboardSnapshot {
            revision: self.state.revision(),
            session_id: self.session_id,
            cause: self.last_cause,
            use_case: &self.use_case,
            latest_frame: self.latest_frame.as_deref(),
            smoothed: self.latest_smoothed.as_ref(),
            stats: self.aggregator.stats(),
            connection: self.connection,
        }
        .summary()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn use_case(&self) -> &Arc<UseCaseConfig> {
        &self.use_case
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn aggregate_stats(&self) -> &AggregateStats {
        self.aggregator.stats()
    }

    pub fn latest_frame(&self) -> Option<&Arc<Frame>> {
        self.latest_frame.as_ref()
    }

    pub fn smoothed(&self) -> Option<&SmoothedSignal> {
        self.latest_smoothed.as_ref()
    }

    pub fn smoother(&self) -> &SmoothingEngine {
        &self.smoother
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn revision(&self) -> u64 {
        self.state.revision()
    }

    fn process(
        &mut self,
        link_id: u64,
        sequence: u64,
        received_at: Timestamp,
        value: &Value,
    ) -> IngestOutcome {
        self.track_sequence(link_id, sequence);
        match self.decoder.decode(value, sequence, received_at) {
            Ok(decoded) => self.accept(decoded),
            Err(reason) => self.drop_frame(sequence, reason),
        }
    }

    fn accept(&mut self, decoded: Decoded) -> IngestOutcome {
        let Decoded { frame, mismatch } = decoded;
        let sequence = frame.sequence();

        if let Some(mismatch) = mismatch {
            self.stats.config_mismatches += 1;
            warn!(
                sequence,
                kind = %mismatch.kind(),
                expected = mismatch.expected,
                actual = mismatch.actual,
                "Class count differs from use case"
            );
        }

        let smoothed = self.smoother.update(frame.class_probabilities());
        self.aggregator.record(&frame);
        self.stats.accepted += 1;
        debug!(
            sequence,
            samples = self.aggregator.stats().sample_count(),
            "Frame accepted"
        );

        self.latest_frame = Some(Arc::new(frame));
        self.latest_smoothed = Some(smoothed);
        let revision = self.publish(PublishCause::Frame { sequence });

        IngestOutcome::Accepted {
            sequence,
            revision,
            mismatch,
        }
    }

    fn drop_frame(&mut self, sequence: u64, reason: FrameError) -> IngestOutcome {
        self.stats.malformed += 1;
        warn!(
            sequence,
            kind = %reason.kind(),
            error = %reason,
            "Dropping frame"
        );
        IngestOutcome::Dropped { sequence, reason }
    }

    fn track_sequence(&mut self, link_id: u64, sequence: u64) {
        if let Some((last_link, last_sequence)) = self.last_position {
            let expected = last_sequence.checked_add(1);
            if last_link == link_id && expected.is_some_and(|next| sequence > next) {
                let skipped = sequence - last_sequence - 1;
                self.stats.sequence_gaps += skipped;
                debug!(link_id, last_sequence, sequence, skipped, "Sequence gap");
            }
        }
        self.last_position = Some((link_id, sequence));
    }

    fn publish(&mut self, cause: PublishCause) -> u64 {
        self.last_cause = cause;
        self.state.publish(DashboardSnapshot {
            revision: 0,
            session_id: self.session_id,
            cause,
            use_case: &self.use_case,
            latest_frame: self.latest_frame.as_deref(),
            smoothed: self.latest_smoothed.as_ref(),
            stats: self.aggregator.stats(),
            connection: self.connection,
        })
    }
}

impl std::fmt::Debug for DashboardPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardPipeline")
            .field("session_id", &self.session_id)
            .field("use_case", &self.use_case.id)
            .field("connection", &self.connection)
            .field("stats", &self.stats)
            .field("state", &self.state)
            .finish()
    }
}
