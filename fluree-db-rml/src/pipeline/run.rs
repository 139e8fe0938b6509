//! Mapping run execution
//!
//! One driver task per TriplesMap pulls records from its logical source,
//! maps them and sends the resulting quads to a bounded channel. When a
//! driver's stream is exhausted it marks its map complete; joins whose
//! parent and child are both complete are resolved by that driver.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::Instrument;

use super::plan::{MappingPlan, TriplesMapPlan};
use crate::error::{RmlError, RmlResult};
use crate::materialize::MappedQuad;
use crate::source::{LogicalSourceResolver, RecordSource};

/// Shared state of one run
struct RunContext {
    plan: MappingPlan,
    resolver: Arc<dyn LogicalSourceResolver>,
    semaphore: Arc<Semaphore>,
    tx: mpsc::Sender<RmlResult<MappedQuad>>,
    cancel: Arc<watch::Sender<bool>>,
    batch_size: usize,
    emitted: AtomicUsize,
}

impl RunContext {
    async fn send(&self, quad: MappedQuad, cancel: &mut watch::Receiver<bool>) -> RmlResult<()> {
        tokio::select! {
            biased;
            _ = cancel.wait_for(|c| *c) => Err(RmlError::Cancelled),
            sent = self.tx.send(Ok(quad)) => {
                sent.map_err(|_| RmlError::Cancelled)?;
                self.emitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    async fn send_all(
        &self,
        quads: Vec<MappedQuad>,
        cancel: &mut watch::Receiver<bool>,
    ) -> RmlResult<()> {
        for quad in quads {
            self.send(quad, cancel).await?;
        }
        Ok(())
    }
}

/// Start a run; requires a Tokio runtime
pub(super) fn start(
    plan: MappingPlan,
    resolver: Arc<dyn LogicalSourceResolver>,
    batch_size: usize,
    channel_capacity: usize,
    max_concurrent_sources: usize,
) -> MappingRun {
    let (tx, receiver) = mpsc::channel(channel_capacity);
    let (cancel_tx, _) = watch::channel(false);
    let cancel = Arc::new(cancel_tx);

    let run_span = tracing::info_span!(
        "rml_mapping_run",
        triples_maps = plan.triples_map_count(),
        joins = plan.join_count(),
    );

    let ctx = Arc::new(RunContext {
        plan,
        resolver,
        semaphore: Arc::new(Semaphore::new(max_concurrent_sources)),
        tx,
        cancel: Arc::clone(&cancel),
        batch_size,
        emitted: AtomicUsize::new(0),
    });

    let mut drivers = JoinSet::new();
    for idx in 0..ctx.plan.maps().len() {
        let map = &ctx.plan.maps()[idx];
        let span = tracing::debug_span!(
            parent: &run_span,
            "rml_triples_map",
            triples_map = %map.iri,
            source = %map.logical_source.source,
        );
        drivers.spawn(drive(Arc::clone(&ctx), idx).instrument(span));
    }

    tokio::spawn(supervise(ctx, drivers).instrument(run_span));

    MappingRun {
        receiver,
        cancel,
        finished: false,
    }
}

/// Wait for every driver and report the run's outcome
async fn supervise(ctx: Arc<RunContext>, mut drivers: JoinSet<RmlResult<()>>) {
    let mut failure: Option<RmlError> = None;
    while let Some(joined) = drivers.join_next().await {
        let err = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(join_err) => RmlError::Internal(format!("triples map driver failed: {join_err}")),
        };
        ctx.cancel.send_replace(true);
        // The root cause wins over the cancellations it triggers
        let replace = match &failure {
            None => true,
            Some(RmlError::Cancelled) => !matches!(err, RmlError::Cancelled),
            Some(_) => false,
        };
        if replace {
            failure = Some(err);
        }
    }

    let emitted = ctx.emitted.load(Ordering::Relaxed);
    match failure {
        None => tracing::info!(quads = emitted, "RML mapping run completed"),
        Some(err) => {
            tracing::warn!(quads = emitted, error = %err, "RML mapping run failed");
            // The consumer may already be gone
            let _ = ctx.tx.send(Err(err)).await;
        }
    }
}

async fn drive(ctx: Arc<RunContext>, idx: usize) -> RmlResult<()> {
    let mut cancel = ctx.cancel.subscribe();
    let result = drive_map(&ctx, idx, &mut cancel).await;
    if let Err(e) = &result {
        if !matches!(e, RmlError::Cancelled) {
            ctx.cancel.send_replace(true);
        }
    }
    result
}

async fn drive_map(
    ctx: &RunContext,
    idx: usize,
    cancel: &mut watch::Receiver<bool>,
) -> RmlResult<()> {
    let map = &ctx.plan.maps()[idx];

    let permit = tokio::select! {
        biased;
        _ = cancel.wait_for(|c| *c) => return Err(RmlError::Cancelled),
        permit = Arc::clone(&ctx.semaphore).acquire_owned() => {
            permit.map_err(|_| RmlError::Cancelled)?
        }
    };

    let mut source = tokio::select! {
        biased;
        _ = cancel.wait_for(|c| *c) => return Err(RmlError::Cancelled),
        opened = ctx.resolver.open(&map.logical_source) => opened?,
    };

    let pumped = pump(ctx, map, source.as_mut(), cancel).await;
    let closed = source.close().await;
    drop(permit);

    let records = pumped?;
    closed?;
    tracing::debug!(records, "logical source exhausted");

    let joins = ctx.plan.joins();
    for join in joins.mark_map_complete(map.id) {
        let quads = joins.resolve(join)?;
        ctx.send_all(quads, cancel).await?;
    }
    Ok(())
}

/// Pull records until the source is exhausted; returns the record count
async fn pump(
    ctx: &RunContext,
    map: &TriplesMapPlan,
    source: &mut dyn RecordSource,
    cancel: &mut watch::Receiver<bool>,
) -> RmlResult<usize> {
    let joins = ctx.plan.joins();
    let emit_class_triples = ctx.plan.emit_class_triples();
    let mut records = 0usize;

    loop {
        let batch = tokio::select! {
            biased;
            _ = cancel.wait_for(|c| *c) => return Err(RmlError::Cancelled),
            batch = source.request(ctx.batch_size) => batch?,
        };
        if batch.is_empty() {
            return Ok(records);
        }
        records += batch.len();

        for record in batch {
            let quads = map.process(record.as_ref(), joins, emit_class_triples)?;
            ctx.send_all(quads, cancel).await?;
        }
    }
}

/// Stream of quads produced by a mapping run
///
/// The stream ends after the first error. Dropping the run cancels it:
/// drivers stop and every open source is closed.
pub struct MappingRun {
    receiver: mpsc::Receiver<RmlResult<MappedQuad>>,
    cancel: Arc<watch::Sender<bool>>,
    finished: bool,
}

impl MappingRun {
    /// Cancel the run
    ///
    /// Already buffered quads are still delivered; the stream then ends
    /// with [`RmlError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Drain the run, failing on the first error
    pub async fn collect(mut self) -> RmlResult<Vec<MappedQuad>> {
        let mut quads = Vec::new();
        while let Some(item) = self.next().await {
            quads.push(item?);
        }
        Ok(quads)
    }
}

impl Stream for MappingRun {
    type Item = RmlResult<MappedQuad>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                this.cancel.send_replace(true);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for MappingRun {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}
