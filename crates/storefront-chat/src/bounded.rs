//! Bounded-concurrency map over a list of work items.

use futures::stream::{self, StreamExt};
use std::fmt::Display;
use std::future::Future;

/// Run `f` over `items` with at most `limit` futures in flight.
///
/// Successful outputs come back in input order. Failed items are logged at
/// debug level and dropped, so one bad URL never aborts the batch.
pub async fn map_bounded<I, T, E, F, Fut>(items: I, limit: usize, f: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .filter_map(|result| async move {
            match result {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!(error = %e, "bounded task failed, dropping item");
                    None
                }
            }
        })
        .collect()
        .await
}
