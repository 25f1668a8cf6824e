//! Bounded-concurrency execution of async work.
//!
//! All work runs as futures polled by the caller's task; "concurrency"
//! means overlapping in-flight I/O, not parallel threads.

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

/// Runs `work` over every input with at most `limit` futures in flight.
///
/// The returned vector has one slot per input, in input order, regardless
/// of completion order. A task that returns `Err` or panics leaves `None`
/// in its slot; the rest of the batch is unaffected. A `limit` of zero is
/// treated as one.
///
/// # Example
///
/// ```
/// use threatscan::runner::run_bounded;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let results = run_bounded(vec![1, 2, 3], 2, |n| async move {
///     if n == 2 { Err("boom") } else { Ok(n * 10) }
/// })
/// .await;
/// assert_eq!(results, vec![Some(10), None, Some(30)]);
/// # });
/// ```
pub async fn run_bounded<I, T, E, F, Fut>(inputs: I, limit: usize, mut work: F) -> Vec<Option<T>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let tasks: Vec<_> = inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            let task = work(input);
            async move { (index, AssertUnwindSafe(task).catch_unwind().await) }
        })
        .collect();

    let mut results: Vec<Option<T>> = std::iter::repeat_with(|| None).take(tasks.len()).collect();

    // Completion order; a slot frees up as soon as any task finishes.
    let mut completed = stream::iter(tasks).buffer_unordered(limit.max(1));
    while let Some((index, outcome)) = completed.next().await {
        results[index] = match outcome {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                debug!(index, error = %e, "task failed");
                None
            }
            Err(_) => {
                warn!(index, "task panicked");
                None
            }
        };
    }

    results
}
