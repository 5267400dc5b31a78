use chrono::Local;
use incentives::workflows::reviews::{AuditedProcessor, InboundEvent, Transition};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const LANE_CAPACITY: usize = 64;

/// Totals for one consumer run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConsumerStats {
    pub(crate) applied: usize,
    pub(crate) ignored: usize,
    pub(crate) malformed: usize,
    pub(crate) failed: usize,
}

impl ConsumerStats {
    fn absorb(&mut self, other: ConsumerStats) {
        self.applied += other.applied;
        self.ignored += other.ignored;
        self.malformed += other.malformed;
        self.failed += other.failed;
    }
}

enum Outcome {
    Applied,
    Ignored,
    Failed,
}

/// Reads newline-delimited events until end of input.
///
/// Events are routed to one queue per prisoner number, drained by its own task: events of
/// one prisoner apply in input order while different prisoners proceed concurrently.
pub(crate) async fn consume<R>(
    processor: Arc<AuditedProcessor>,
    input: R,
) -> std::io::Result<ConsumerStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut lanes: HashMap<String, mpsc::Sender<InboundEvent>> = HashMap::new();
    let mut tasks = JoinSet::new();
    let mut stats = ConsumerStats::default();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event: InboundEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                warn!(line = line_number, error = %err, "discarding malformed event");
                stats.malformed += 1;
                continue;
            }
        };

        let lane = lanes
            .entry(event.prisoner_number.clone())
            .or_insert_with(|| {
                let (sender, receiver) = mpsc::channel(LANE_CAPACITY);
                tasks.spawn(drain(Arc::clone(&processor), receiver));
                sender
            });
        if let Err(err) = lane.send(event).await {
            error!(line = line_number, error = %err, "prisoner event queue closed");
            stats.failed += 1;
        }
    }
    // closing every queue lets its task finish
    drop(lanes);

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(lane) => stats.absorb(lane),
            Err(err) => {
                error!(error = %err, "event task aborted");
                stats.failed += 1;
            }
        }
    }

    info!(
        applied = stats.applied,
        ignored = stats.ignored,
        malformed = stats.malformed,
        failed = stats.failed,
        "event input closed"
    );
    Ok(stats)
}

async fn drain(
    processor: Arc<AuditedProcessor>,
    mut receiver: mpsc::Receiver<InboundEvent>,
) -> ConsumerStats {
    let mut stats = ConsumerStats::default();
    while let Some(event) = receiver.recv().await {
        match handle(&processor, event).await {
            Outcome::Applied => stats.applied += 1,
            Outcome::Ignored => stats.ignored += 1,
            Outcome::Failed => stats.failed += 1,
        }
    }
    stats
}

async fn handle(processor: &AuditedProcessor, event: InboundEvent) -> Outcome {
    let now = Local::now().naive_local();
    match processor.process(&event, now).await {
        Ok(Transition::Ignored(reason)) => {
            debug!(prisoner_number = %event.prisoner_number, ?reason, "event ignored");
            Outcome::Ignored
        }
        Ok(transition) => {
            info!(
                prisoner_number = %event.prisoner_number,
                reason = ?event.reason_code,
                transition = transition.label(),
                "event applied"
            );
            Outcome::Applied
        }
        Err(err) => {
            let kind = err.kind();
            error!(
                prisoner_number = %event.prisoner_number,
                reason = ?event.reason_code,
                kind = kind.label(),
                retryable = kind.is_retryable(),
                error = %err,
                "event processing failed"
            );
            Outcome::Failed
        }
    }
}
