//! Correlator: finds the CI run a token triggered.
//!
//! Only a bounded window of the most recent dispatch-triggered runs is
//! searched; tokens are always fresh, so older history never matters. The
//! window is sorted oldest-first before any strategy runs, which makes "first
//! match" and "earliest match" the same thing and resolves duplicate
//! dispatches deterministically.

use std::sync::Arc;

use buildrelay_types::config::MatcherStrategy;
use buildrelay_types::error::CiError;
use buildrelay_types::run::ExternalRun;
use buildrelay_types::token::CorrelationToken;

use crate::ci::CiQuery;
use crate::relay::dispatcher::CORRELATION_FIELD;
use crate::retry::RetryPolicy;

/// Keep the newest `window` runs and order them oldest first.
///
/// Ties on creation time fall back to the run id, which providers assign
/// monotonically.
pub fn sort_oldest_first(mut runs: Vec<ExternalRun>, window: usize) -> Vec<ExternalRun> {
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    runs.truncate(window);
    runs.reverse();
    runs
}

/// Whether a payload carries `token`.
///
/// True when the `correlation_id` field equals the token, or when any string
/// anywhere in the payload equals or contains it.
pub fn payload_embeds(payload: &serde_json::Value, token: &CorrelationToken) -> bool {
    if payload.get(CORRELATION_FIELD).and_then(|v| v.as_str()) == Some(token.as_str()) {
        return true;
    }
    contains_leaf(payload, token.as_str())
}

fn contains_leaf(value: &serde_json::Value, needle: &str) -> bool {
    match value {
        serde_json::Value::String(s) => s.contains(needle),
        serde_json::Value::Array(items) => items.iter().any(|v| contains_leaf(v, needle)),
        serde_json::Value::Object(map) => map.values().any(|v| contains_leaf(v, needle)),
        _ => false,
    }
}

/// Apply one snapshot-only strategy to an oldest-first window.
///
/// `DetailFetch` needs per-run lookups and never matches here.
pub fn match_snapshot<'a>(
    token: &CorrelationToken,
    strategy: MatcherStrategy,
    runs: &'a [ExternalRun],
) -> Option<&'a ExternalRun> {
    match strategy {
        MatcherStrategy::PayloadField => runs.iter().find(|run| {
            run.payload
                .as_ref()
                .and_then(|p| p.get(CORRELATION_FIELD))
                .and_then(|v| v.as_str())
                == Some(token.as_str())
        }),
        MatcherStrategy::TitleSubstring => runs.iter().find(|run| {
            run.title
                .as_deref()
                .is_some_and(|title| title.contains(token.as_str()))
        }),
        MatcherStrategy::DetailFetch => None,
    }
}

/// Resolves tokens to runs against a [`CiQuery`].
pub struct Correlator<Q: CiQuery> {
    query: Arc<Q>,
    window: usize,
    strategies: Vec<MatcherStrategy>,
    retry: RetryPolicy,
}

impl<Q: CiQuery> Correlator<Q> {
    pub fn new(query: Arc<Q>, window: usize, strategies: Vec<MatcherStrategy>, retry: RetryPolicy) -> Self {
        Self {
            query,
            window,
            strategies,
            retry,
        }
    }

    /// Find the run for `token`, or `None` if it is not visible yet.
    ///
    /// Errors only when the run listing itself fails; an exhausted window is
    /// a normal `None`.
    pub async fn correlate(&self, token: &CorrelationToken) -> Result<Option<ExternalRun>, CiError> {
        let runs = self
            .retry
            .run("list_recent_runs", || self.query.list_recent_runs(self.window))
            .await?;
        let runs = sort_oldest_first(runs, self.window);

        for strategy in &self.strategies {
            let found = match strategy {
                MatcherStrategy::DetailFetch => self.match_by_detail(token, &runs).await,
                snapshot => match_snapshot(token, *snapshot, &runs).cloned(),
            };
            if let Some(run) = found {
                tracing::debug!(token = %token, run_id = run.id, strategy = %strategy, "run correlated");
                return Ok(Some(run));
            }
        }

        tracing::debug!(token = %token, window = runs.len(), "no run matched yet");
        Ok(None)
    }

    /// Re-read an already bound run without re-matching.
    pub async fn refresh(&self, run_id: u64) -> Result<Option<ExternalRun>, CiError> {
        self.retry
            .run("get_run", || self.query.get_run(run_id))
            .await
    }

    /// Fetch run details one at a time, oldest first, until one embeds the token.
    async fn match_by_detail(&self, token: &CorrelationToken, runs: &[ExternalRun]) -> Option<ExternalRun> {
        for run in runs {
            let detail = match self
                .retry
                .run("get_run_detail", || self.query.get_run_detail(run.id))
                .await
            {
                Ok(detail) => detail,
                Err(e) => {
                    tracing::warn!(run_id = run.id, error = %e, "skipping run, detail fetch failed");
                    continue;
                }
            };
            if payload_embeds(&detail.payload, token) {
                return Some(run.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeCi, run_at};
    use buildrelay_types::run::RunStatus;
    use serde_json::json;
    use std::time::Duration;

    fn token() -> CorrelationToken {
        "0192f5a0-7c3e-7b11-9d4e-5a6b7c8d9e0f".parse().unwrap()
    }

    fn correlator(ci: &FakeCi, strategies: Vec<MatcherStrategy>) -> Correlator<FakeCi> {
        Correlator::new(
            Arc::new(ci.clone()),
            20,
            strategies,
            RetryPolicy::single_attempt(Duration::from_secs(1)),
        )
    }

    fn all_strategies() -> Vec<MatcherStrategy> {
        vec![
            MatcherStrategy::PayloadField,
            MatcherStrategy::TitleSubstring,
            MatcherStrategy::DetailFetch,
        ]
    }

    #[test]
    fn test_window_keeps_newest_and_orders_oldest_first() {
        let runs = vec![run_at(3, 30), run_at(1, 10), run_at(2, 20)];
        let sorted = sort_oldest_first(runs, 2);
        let ids: Vec<u64> = sorted.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_equal_timestamps_break_on_id() {
        let runs = vec![run_at(9, 10), run_at(4, 10)];
        let sorted = sort_oldest_first(runs, 10);
        assert_eq!(sorted[0].id, 4);
    }

    #[test]
    fn test_payload_embeds_nested_leaf() {
        let t = token();
        assert!(payload_embeds(&json!({"correlation_id": t.as_str()}), &t));
        assert!(payload_embeds(
            &json!({"jobs": [{"steps": [format!("Correlation {t}")]}]}),
            &t
        ));
        assert!(!payload_embeds(&json!({"jobs": [{"name": "build"}], "n": 7}), &t));
    }

    #[test]
    fn test_payload_field_tie_break_prefers_earliest() {
        let t = token();
        let mut later = run_at(20, 200);
        later.payload = Some(json!({"correlation_id": t.as_str()}));
        let mut earlier = run_at(10, 100);
        earlier.payload = Some(json!({"correlation_id": t.as_str()}));

        let window = sort_oldest_first(vec![later, earlier], 20);
        let found = match_snapshot(&t, MatcherStrategy::PayloadField, &window).unwrap();
        assert_eq!(found.id, 10);
    }

    #[test]
    fn test_title_substring_when_payload_unavailable() {
        let t = token();
        let mut run = run_at(5, 50);
        run.title = Some(format!("Demo [{t}]"));
        let window = vec![run_at(4, 40), run];

        assert!(match_snapshot(&t, MatcherStrategy::PayloadField, &window).is_none());
        let found = match_snapshot(&t, MatcherStrategy::TitleSubstring, &window).unwrap();
        assert_eq!(found.id, 5);
    }

    #[tokio::test]
    async fn test_correlate_earliest_of_duplicate_dispatches() {
        let t = token();
        let ci = FakeCi::new();
        for (id, secs) in [(31, 300), (30, 290), (12, 100)] {
            let mut run = run_at(id, secs);
            if id != 12 {
                run.title = Some(format!("Demo [{t}]"));
            }
            ci.push_run(run);
        }

        let found = correlator(&ci, all_strategies()).correlate(&t).await.unwrap().unwrap();
        assert_eq!(found.id, 30);
    }

    #[tokio::test]
    async fn test_detail_fetch_stops_at_first_match() {
        let t = token();
        let ci = FakeCi::new();
        for id in 1..=4 {
            ci.push_run(run_at(id, id as i64 * 10));
        }
        ci.set_detail(1, json!({"jobs": ["build"]}));
        ci.set_detail(2, json!({"jobs": [{"steps": [format!("id {t}")]}]}));
        ci.set_detail(3, json!({"correlation_id": t.as_str()}));

        let found = correlator(&ci, vec![MatcherStrategy::DetailFetch])
            .correlate(&t)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, 2);
        assert_eq!(ci.detail_calls(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_detail_fetch_skips_failing_runs() {
        let t = token();
        let ci = FakeCi::new();
        ci.push_run(run_at(1, 10));
        ci.push_run(run_at(2, 20));
        // Run 1 has no detail registered, so the fake reports it as missing.
        ci.set_detail(2, json!({"correlation_id": t.as_str()}));

        let found = correlator(&ci, vec![MatcherStrategy::DetailFetch])
            .correlate(&t)
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.id), Some(2));
    }

    #[tokio::test]
    async fn test_exhausted_window_is_not_an_error() {
        let ci = FakeCi::new();
        ci.push_run(run_at(1, 10));
        let found = correlator(&ci, all_strategies()).correlate(&token()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let ci = FakeCi::new();
        ci.fail_queries(CiError::Timeout);
        let result = correlator(&ci, all_strategies()).correlate(&token()).await;
        assert!(matches!(result, Err(CiError::Timeout)));
    }

    #[tokio::test]
    async fn test_refresh_reads_bound_run() {
        let ci = FakeCi::new();
        let mut run = run_at(8, 80);
        run.status = RunStatus::InProgress;
        ci.push_run(run);

        let c = correlator(&ci, all_strategies());
        assert_eq!(c.refresh(8).await.unwrap().map(|r| r.status), Some(RunStatus::InProgress));
        assert!(c.refresh(99).await.unwrap().is_none());
    }
}
