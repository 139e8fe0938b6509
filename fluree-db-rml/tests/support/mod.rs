//! Shared harness for fluree-db-rml integration tests.

#![allow(dead_code)]

pub mod span_capture;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fluree_db_rml::{
    InMemoryResolver, JsonRecord, LogicalSource, LogicalSourceResolver, MappedQuad, Record,
    RecordSource, RmlError, RmlResult,
};
use serde_json::json;

/// Locator of a source that never runs out of records
pub const ENDLESS: &str = "endless";
/// Locator of a source that fails on its second pull
pub const FAILING: &str = "failing";

/// Resolver that counts opens and closes and serves synthetic sources
#[derive(Debug, Clone)]
pub struct TrackingResolver {
    inner: InMemoryResolver,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl TrackingResolver {
    pub fn new(inner: InMemoryResolver) -> Self {
        Self {
            inner,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogicalSourceResolver for TrackingResolver {
    async fn open(&self, source: &LogicalSource) -> RmlResult<Box<dyn RecordSource>> {
        let inner: Box<dyn RecordSource> = match source.source.as_str() {
            ENDLESS => Box::new(Synthetic {
                next: 0,
                fail_after: None,
            }),
            FAILING => Box::new(Synthetic {
                next: 0,
                fail_after: Some(1),
            }),
            _ => self.inner.open(source).await?,
        };
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Tracked {
            inner,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct Tracked {
    inner: Box<dyn RecordSource>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl RecordSource for Tracked {
    async fn request(&mut self, n: usize) -> RmlResult<Vec<Record>> {
        self.inner.request(n).await
    }

    async fn close(&mut self) -> RmlResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

/// Records `{"id": n}` for increasing n
struct Synthetic {
    next: u64,
    fail_after: Option<usize>,
}

#[async_trait]
impl RecordSource for Synthetic {
    async fn request(&mut self, n: usize) -> RmlResult<Vec<Record>> {
        if let Some(remaining) = self.fail_after.as_mut() {
            if *remaining == 0 {
                return Err(RmlError::Source("connection reset".to_string()));
            }
            *remaining -= 1;
        }
        tokio::task::yield_now().await;
        let batch = (0..n)
            .map(|_| {
                self.next += 1;
                Box::new(JsonRecord::new(json!({ "id": self.next }))) as Record
            })
            .collect();
        Ok(batch)
    }

    async fn close(&mut self) -> RmlResult<()> {
        Ok(())
    }
}

/// N-Triples lines of a run, sorted
pub fn ntriples(quads: &[MappedQuad]) -> Vec<String> {
    let mut lines: Vec<String> = quads.iter().map(|q| q.to_string()).collect();
    lines.sort();
    lines
}
