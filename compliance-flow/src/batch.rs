use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

/// Runs many independent async operations in fixed-size chunks.
///
/// Every operation of a chunk is started together and the chunk is only
/// considered done once all of them have settled, so one failure never
/// cancels its siblings. Failed items are dropped without a placeholder and
/// never retried. Chunks run strictly one after another with `delay` between
/// them (not after the last one).
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    batch_size: usize,
    delay: Duration,
}

impl BatchRunner {
    pub fn new(batch_size: usize, delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            delay,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn batch_count(&self, items: usize) -> usize {
        items.div_ceil(self.batch_size)
    }

    /// Results are the fulfilled outcomes of each chunk, concatenated in
    /// chunk order.
    pub async fn run<T, R, E, F, Fut>(&self, items: Vec<T>, op: F) -> Vec<R>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Display,
    {
        let total = self.batch_count(items.len());
        let mut results = Vec::with_capacity(items.len());
        let mut remaining = items.into_iter().peekable();
        let mut batch_index = 0;

        while remaining.peek().is_some() {
            batch_index += 1;
            let chunk: Vec<T> = remaining.by_ref().take(self.batch_size).collect();
            let chunk_len = chunk.len();
            debug!(batch = batch_index, of = total, size = chunk_len, "Starting batch");

            let outcomes = join_all(chunk.into_iter().map(&op)).await;

            let mut failed = 0;
            for outcome in outcomes {
                match outcome {
                    Ok(value) => results.push(value),
                    Err(e) => {
                        failed += 1;
                        warn!(batch = batch_index, "Batch item failed: {}", e);
                    }
                }
            }
            info!(
                batch = batch_index,
                of = total,
                succeeded = chunk_len - failed,
                failed,
                "Batch settled"
            );

            if remaining.peek().is_some() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        results
    }
}
