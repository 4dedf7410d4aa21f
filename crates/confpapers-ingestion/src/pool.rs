//! Bounded concurrent dispatch with index-tagged results.
//!
//! Every task is tagged with its input position before it is handed to the
//! stream, and results are put back in input order by that tag. Output
//! alignment therefore never depends on completion order.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Default number of in-flight requests per batch.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Run `task` over `items` with at most `width` futures in flight and
/// return the outputs in input order.
pub async fn scatter_indexed<T, O, F, Fut>(items: Vec<T>, width: usize, mut task: F) -> Vec<O>
where
    F: FnMut(usize, T) -> Fut,
    Fut: Future<Output = O>,
{
    let mut tagged: Vec<(usize, O)> = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let fut = task(index, item);
            async move { (index, fut.await) }
        })
        .buffer_unordered(width.max(1))
        .collect()
        .await;

    tagged.sort_unstable_by_key(|(index, _)| *index);
    tagged.into_iter().map(|(_, out)| out).collect()
}
