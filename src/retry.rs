// src/retry.rs
//! Two-pass "retry the missing entities" collection.
//!
//! A pass is any async function that takes the entity keys to visit and
//! returns whatever rows it managed to produce. The first pass visits every
//! expected key; the second visits only the keys that produced nothing.

use anyhow::Result;
use std::{collections::HashSet, future::Future, hash::Hash};
use tracing::{info, warn};

/// Outcome counts of [`collect_with_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport<K> {
    /// Distinct keys obtained by the first pass.
    pub first_pass_obtained: usize,
    /// Keys handed to the retry pass (empty when it was skipped).
    pub retried: Vec<K>,
    /// Keys still absent after both passes.
    pub still_missing: Vec<K>,
}

/// Expected keys that were not obtained, in expected order.
pub fn deficit<K: Eq + Hash + Clone>(expected: &[K], obtained: &HashSet<K>) -> Vec<K> {
    expected
        .iter()
        .filter(|k| !obtained.contains(*k))
        .cloned()
        .collect()
}

/// Run `pass` over `expected`, then once more over the deficit if any.
///
/// `key_of` maps a produced item back to the entity it belongs to. Errors
/// returned by `pass` itself are fatal; per-entity failures are expected to
/// be swallowed inside the pass.
pub async fn collect_with_retry<K, R, F, Fut>(
    expected: &[K],
    key_of: impl Fn(&R) -> K,
    mut pass: F,
) -> Result<(Vec<R>, RetryReport<K>)>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    F: FnMut(Vec<K>) -> Fut,
    Fut: Future<Output = Result<Vec<R>>>,
{
    let mut items = pass(expected.to_vec()).await?;
    let mut obtained: HashSet<K> = items.iter().map(&key_of).collect();
    let first_pass_obtained = obtained.len();

    let retried = deficit(expected, &obtained);
    if retried.is_empty() {
        info!(obtained = first_pass_obtained, "first pass complete; no retry needed");
    } else {
        info!(missing = retried.len(), "retrying missing entities");
        let more = pass(retried.clone()).await?;
        obtained.extend(more.iter().map(&key_of));
        items.extend(more);
    }

    let still_missing = deficit(expected, &obtained);
    if !still_missing.is_empty() {
        warn!(
            dropped = still_missing.len(),
            keys = ?still_missing,
            "entities missing after retry pass"
        );
    }

    Ok((
        items,
        RetryReport {
            first_pass_obtained,
            retried,
            still_missing,
        },
    ))
}
