//! BuildRelay: the submit / status / callback operations.
//!
//! Wires the stager, dispatcher, correlator, projector and registry together.
//! Submission is strict and surfaces every failure; status queries never
//! fail and degrade to `in_progress` when the CI system is unreachable.

use std::sync::Arc;

use chrono::Utc;

use buildrelay_types::config::RelayConfig;
use buildrelay_types::error::{CiError, RelayError};
use buildrelay_types::request::{BuildRequest, SubmitBuildRequest};
use buildrelay_types::status::{BuildStatus, CallbackNotification, RegistryEntry, StatusView};
use buildrelay_types::token::CorrelationToken;

use crate::ci::{CiQuery, CiTrigger};
use crate::registry::store::RegistryStore;
use crate::registry::{Recorded, RequestRegistry};
use crate::relay::correlator::Correlator;
use crate::relay::dispatcher::Dispatcher;
use crate::relay::projector::Projector;
use crate::relay::stager::{AssetStager, parse_icon};
use crate::retry::RetryPolicy;
use crate::storage::asset_store::AssetStore;

/// The relay service, generic over its four ports.
pub struct BuildRelay<A, T, Q, S>
where
    A: AssetStore,
    T: CiTrigger,
    Q: CiQuery,
    S: RegistryStore,
{
    stager: AssetStager<A>,
    dispatcher: Dispatcher<T>,
    correlator: Correlator<Q>,
    projector: Projector<Q>,
    registry: RequestRegistry<S>,
    fresh_token_secs: i64,
}

impl<A, T, Q, S> BuildRelay<A, T, Q, S>
where
    A: AssetStore,
    T: CiTrigger,
    Q: CiQuery,
    S: RegistryStore,
{
    pub fn from_config(config: &RelayConfig, store: A, trigger: T, query: Q, registry: S) -> Self {
        let ci_retry = RetryPolicy::from_ci(&config.ci);
        let query = Arc::new(query);

        Self {
            stager: AssetStager::new(
                store,
                config.storage.max_icon_bytes,
                RetryPolicy::from_storage(&config.storage),
            ),
            dispatcher: Dispatcher::new(trigger, config.ci.event_type.clone(), ci_retry.clone()),
            correlator: Correlator::new(
                Arc::clone(&query),
                config.ci.run_window,
                config.ci.strategies.clone(),
                ci_retry.clone(),
            ),
            projector: Projector::new(query, config.ci.clone(), ci_retry),
            registry: RequestRegistry::new(registry),
            fresh_token_secs: i64::try_from(config.registry.fresh_token_secs).unwrap_or(i64::MAX),
        }
    }

    /// Validate, stage the icon, mint a token and dispatch exactly once.
    ///
    /// The registry write happens after dispatch and is best-effort: a lost
    /// entry is re-derived from CI on the next status query.
    pub async fn submit(&self, submission: &SubmitBuildRequest) -> Result<BuildRequest, RelayError> {
        let target = submission.target()?;
        let icon = parse_icon(submission.icon()?)?;

        let token = CorrelationToken::new();
        let icon_url = self.stager.stage(&token, icon).await?;

        let request = BuildRequest {
            token,
            target,
            icon_url,
            features: submission.features(),
            created_at: Utc::now(),
        };
        self.dispatcher.dispatch(&request).await?;

        if let Err(e) = self.registry.record_dispatch(&request.token).await {
            tracing::warn!(token = %request.token, error = %e, "failed to record dispatch");
        }

        Ok(request)
    }

    /// Current status for `token`. Never fails.
    ///
    /// Terminal cache hits return immediately. Everything else is re-derived
    /// from CI; a successfully projected view is written back, a degraded one
    /// is not.
    pub async fn status(&self, token: &CorrelationToken) -> StatusView {
        let cached = match self.registry.get(token).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(token = %token, error = %e, "registry read failed, deriving from CI");
                None
            }
        };

        if let Some(entry) = &cached {
            if entry.view.is_terminal() {
                return entry.view.clone();
            }
        }

        let bound = cached.as_ref().and_then(|e| e.run_id);
        match self.derive(token, bound).await {
            Ok(Some((run_id, view))) => match self.registry.record_run(token, cached, run_id, view.clone()).await {
                Ok(recorded) => recorded.view,
                Err(e) => {
                    tracing::warn!(token = %token, error = %e, "failed to cache status");
                    view
                }
            },
            Ok(None) => match cached {
                Some(entry) => entry.view,
                None => self.unmatched_view(token),
            },
            Err(e) => {
                tracing::warn!(token = %token, error = %e, "CI unavailable, reporting in_progress");
                degraded(cached.as_ref())
            }
        }
    }

    /// Derive the status straight from CI, without reading or writing the
    /// registry.
    pub async fn resolve(&self, token: &CorrelationToken) -> StatusView {
        match self.derive(token, None).await {
            Ok(Some((_, view))) => view,
            Ok(None) => self.unmatched_view(token),
            Err(e) => {
                tracing::warn!(token = %token, error = %e, "CI unavailable, reporting in_progress");
                StatusView::in_progress()
            }
        }
    }

    /// Apply a pushed status notification, bypassing the correlator.
    pub async fn apply_callback(&self, notification: CallbackNotification) -> Result<Recorded, RelayError> {
        let token: CorrelationToken = notification.token.parse().map_err(|message| RelayError::InvalidField {
            field: "token",
            message,
        })?;

        if !matches!(
            notification.status,
            BuildStatus::InProgress | BuildStatus::Completed | BuildStatus::Failed
        ) {
            return Err(RelayError::InvalidField {
                field: "status",
                message: format!(
                    "'{}' cannot be pushed; expected in_progress, completed or failed",
                    notification.status
                ),
            });
        }

        let view = StatusView {
            status: notification.status,
            conclusion: notification.conclusion,
            download_url: notification.download_url,
            run_id: notification.run_id,
            run_url: None,
        };

        let previous = self.registry.get(&token).await?;
        let recorded = self.registry.record(&token, previous, notification.run_id, view).await?;

        tracing::info!(
            token = %token,
            status = %recorded.view.status,
            applied = recorded.applied,
            "callback applied"
        );
        Ok(recorded)
    }

    /// Find and project the run for `token`.
    ///
    /// The window is scanned on every call so the earliest matching run wins
    /// even when it became visible after a later duplicate. A bound run that
    /// has left the window is re-read by id.
    async fn derive(
        &self,
        token: &CorrelationToken,
        bound: Option<u64>,
    ) -> Result<Option<(u64, StatusView)>, CiError> {
        let run = match self.correlator.correlate(token).await? {
            Some(run) => Some(run),
            None => match bound {
                Some(run_id) => self.correlator.refresh(run_id).await?,
                None => None,
            },
        };

        match run {
            Some(run) => {
                let view = self.projector.project(&run).await?;
                Ok(Some((run.id, view)))
            }
            None => Ok(None),
        }
    }

    /// View for a token with no cache entry and no matching run.
    fn unmatched_view(&self, token: &CorrelationToken) -> StatusView {
        let fresh = token
            .minted_at()
            .is_some_and(|minted| (Utc::now() - minted).num_seconds() <= self.fresh_token_secs);
        if fresh {
            StatusView::queued()
        } else {
            StatusView::not_found()
        }
    }
}

fn degraded(cached: Option<&RegistryEntry>) -> StatusView {
    let mut view = StatusView::in_progress();
    view.run_id = cached.and_then(|e| e.run_id);
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeAssetStore, FakeCi, run_at};
    use crate::registry::memory::MemoryRegistryStore;
    use buildrelay_types::config::MatcherStrategy;
    use buildrelay_types::run::{ReleaseAsset, RunConclusion, RunStatus};
    use buildrelay_types::status::BuildStatus;
    use serde_json::json;

    type TestRelay = BuildRelay<FakeAssetStore, FakeCi, FakeCi, MemoryRegistryStore>;

    struct Harness {
        relay: TestRelay,
        ci: FakeCi,
        store: FakeAssetStore,
        registry: MemoryRegistryStore,
    }

    fn harness() -> Harness {
        let mut config = RelayConfig::default();
        config.ci.max_retries = 0;
        config.storage.max_retries = 0;
        config.storage.max_icon_bytes = 64;

        let ci = FakeCi::new();
        let store = FakeAssetStore::new("https://bucket.test");
        let registry = MemoryRegistryStore::new();
        let relay = BuildRelay::from_config(&config, store.clone(), ci.clone(), ci.clone(), registry.clone());
        Harness {
            relay,
            ci,
            store,
            registry,
        }
    }

    fn submission() -> SubmitBuildRequest {
        SubmitBuildRequest {
            name: Some("Demo".to_string()),
            package_id: Some("com.demo.app".to_string()),
            source_url: Some("https://demo.test".to_string()),
            // 10 bytes of image data.
            icon: Some("data:image/png;base64,iVBORw0KGgoAAA==".to_string()),
            features: None,
        }
    }

    fn successful_run(id: u64, token: &CorrelationToken) -> buildrelay_types::run::ExternalRun {
        let mut run = run_at(id, 100);
        run.payload = Some(json!({"correlation_id": token.as_str()}));
        run.status = RunStatus::Completed;
        run.conclusion = Some(RunConclusion::Success);
        run
    }

    #[tokio::test]
    async fn test_end_to_end_submit_then_poll() {
        let h = harness();
        let request = h.relay.submit(&submission()).await.unwrap();
        let token = request.token.clone();

        assert_eq!(h.store.uploads(), vec![(format!("icons/{token}.png"), 10)]);
        assert_eq!(h.ci.dispatched().len(), 1);

        let view = h.relay.status(&token).await;
        assert_eq!(view.status, BuildStatus::Queued);

        h.ci.push_run(successful_run(42, &token));
        h.ci.set_assets(
            "build-42",
            vec![ReleaseAsset {
                name: "app-release.apk".to_string(),
                download_url: "https://dl.test/42/app-release.apk".to_string(),
            }],
        );

        let view = h.relay.status(&token).await;
        assert_eq!(view.status, BuildStatus::Completed);
        assert_eq!(view.download_url.as_deref(), Some("https://dl.test/42/app-release.apk"));
    }

    #[tokio::test]
    async fn test_missing_package_is_rejected_before_side_effects() {
        let h = harness();
        let mut bad = submission();
        bad.package_id = None;

        let err = h.relay.submit(&bad).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingField("package_id")));
        assert!(h.store.uploads().is_empty());
        assert!(h.ci.dispatched().is_empty());
    }

    #[tokio::test]
    async fn test_oversize_icon_is_not_dispatched() {
        let h = harness();
        let mut big = submission();
        // 96 zero bytes against a 64 byte limit.
        big.icon = Some("A".repeat(128));

        let err = h.relay.submit(&big).await.unwrap_err();
        assert!(matches!(err, RelayError::PayloadTooLarge { .. }));
        assert!(h.ci.dispatched().is_empty());
    }

    #[tokio::test]
    async fn test_icon_url_passes_through_to_dispatch() {
        let h = harness();
        let mut req = submission();
        req.icon = Some("https://cdn.test/icon.png".to_string());

        h.relay.submit(&req).await.unwrap();
        assert!(h.store.uploads().is_empty());
        assert_eq!(h.ci.dispatched()[0].client_payload["icon_url"], "https://cdn.test/icon.png");
    }

    #[tokio::test]
    async fn test_dispatch_failure_surfaces() {
        let h = harness();
        h.ci.fail_dispatch(CiError::Unavailable("connection refused".to_string()));
        let err = h.relay.submit(&submission()).await.unwrap_err();
        assert!(matches!(err, RelayError::Dependency { service: "CI", .. }));
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_status_is_idempotent() {
        let h = harness();
        let token = h.relay.submit(&submission()).await.unwrap().token;
        h.ci.push_run(successful_run(5, &token));

        let first = h.relay.status(&token).await;
        // Even if CI stops answering, the cached terminal view is returned.
        h.ci.fail_queries(CiError::Timeout);
        let second = h.relay.status(&token).await;

        assert_eq!(first.status, BuildStatus::Completed);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_ci_outage_degrades_to_in_progress_uncached() {
        let h = harness();
        let token = h.relay.submit(&submission()).await.unwrap().token;
        h.ci.fail_queries(CiError::Timeout);

        let view = h.relay.status(&token).await;
        assert_eq!(view.status, BuildStatus::InProgress);

        let entry = h.registry.get(&token).await.unwrap().unwrap();
        assert_eq!(entry.view.status, BuildStatus::Queued);
    }

    #[tokio::test]
    async fn test_unknown_tokens() {
        let h = harness();
        // Registry lost (e.g. restart) but the token was minted just now.
        let fresh = CorrelationToken::new();
        assert_eq!(h.relay.status(&fresh).await.status, BuildStatus::Queued);

        let bogus: CorrelationToken = "never-issued".parse().unwrap();
        assert_eq!(h.relay.status(&bogus).await.status, BuildStatus::NotFound);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_status_rederives_after_registry_loss() {
        let h = harness();
        let token = CorrelationToken::new();
        h.ci.push_run(successful_run(9, &token));

        let view = h.relay.resolve(&token).await;
        assert_eq!(view.status, BuildStatus::Completed);
        assert_eq!(view.download_url, None);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_title_only_provider_still_correlates() {
        let mut config = RelayConfig::default();
        config.ci.strategies = vec![MatcherStrategy::TitleSubstring];
        let ci = FakeCi::new();
        let relay = BuildRelay::from_config(
            &config,
            FakeAssetStore::new("https://bucket.test"),
            ci.clone(),
            ci.clone(),
            MemoryRegistryStore::new(),
        );

        let token = CorrelationToken::new();
        let mut run = run_at(3, 30);
        run.status = RunStatus::InProgress;
        run.title = Some(format!("Demo [{token}]"));
        ci.push_run(run);

        let view = relay.status(&token).await;
        assert_eq!(view.status, BuildStatus::InProgress);
        assert_eq!(view.run_id, Some(3));
    }

    #[tokio::test]
    async fn test_callback_updates_and_terminal_wins() {
        let h = harness();
        let token = h.relay.submit(&submission()).await.unwrap().token;

        let done = h
            .relay
            .apply_callback(CallbackNotification {
                token: token.to_string(),
                status: BuildStatus::Completed,
                download_url: Some("https://dl.test/pushed.apk".to_string()),
                conclusion: Some("success".to_string()),
                run_id: Some(77),
            })
            .await
            .unwrap();
        assert!(done.applied);

        let late = h
            .relay
            .apply_callback(CallbackNotification {
                token: token.to_string(),
                status: BuildStatus::InProgress,
                download_url: None,
                conclusion: None,
                run_id: Some(77),
            })
            .await
            .unwrap();
        assert!(!late.applied);
        assert_eq!(late.view.status, BuildStatus::Completed);

        let view = h.relay.status(&token).await;
        assert_eq!(view.download_url.as_deref(), Some("https://dl.test/pushed.apk"));
    }

    fn running(id: u64, secs: i64, token: &CorrelationToken) -> buildrelay_types::run::ExternalRun {
        let mut run = run_at(id, secs);
        run.payload = Some(json!({"correlation_id": token.as_str()}));
        run.status = RunStatus::InProgress;
        run
    }

    #[tokio::test]
    async fn test_poll_rebinds_when_bound_run_is_gone() {
        let h = harness();
        let token = h.relay.submit(&submission()).await.unwrap().token;

        // Bind to a run CI never lists.
        h.relay
            .apply_callback(CallbackNotification {
                token: token.to_string(),
                status: BuildStatus::InProgress,
                download_url: None,
                conclusion: None,
                run_id: Some(99),
            })
            .await
            .unwrap();
        assert_eq!(h.registry.get(&token).await.unwrap().unwrap().run_id, Some(99));

        h.ci.push_run(running(6, 60, &token));
        for _ in 0..2 {
            let view = h.relay.status(&token).await;
            assert_eq!(view.run_id, Some(6));
            let entry = h.registry.get(&token).await.unwrap().unwrap();
            assert_eq!(entry.run_id, Some(6));
        }
    }

    #[tokio::test]
    async fn test_earlier_duplicate_wins_across_polls() {
        let h = harness();
        let token = h.relay.submit(&submission()).await.unwrap().token;

        h.ci.push_run(running(8, 80, &token));
        assert_eq!(h.relay.status(&token).await.run_id, Some(8));

        // An earlier dispatch shows up late in the listing.
        h.ci.push_run(running(4, 40, &token));
        let view = h.relay.status(&token).await;
        assert_eq!(view.run_id, Some(4));
        assert_eq!(h.registry.get(&token).await.unwrap().unwrap().run_id, Some(4));
    }

    #[tokio::test]
    async fn test_callback_rejects_non_progress_statuses() {
        let h = harness();
        let token = h.relay.submit(&submission()).await.unwrap().token;
        h.ci.push_run(running(6, 60, &token));
        let before = h.relay.status(&token).await;
        assert_eq!(before.status, BuildStatus::InProgress);

        for status in [BuildStatus::Queued, BuildStatus::NotFound] {
            let err = h
                .relay
                .apply_callback(CallbackNotification {
                    token: token.to_string(),
                    status,
                    download_url: None,
                    conclusion: None,
                    run_id: None,
                })
                .await
                .unwrap_err();
            assert_eq!(err.field(), Some("status"));
        }

        let entry = h.registry.get(&token).await.unwrap().unwrap();
        assert_eq!(entry.view, before);
    }

    #[tokio::test]
    async fn test_callback_rejects_blank_token() {
        let h = harness();
        let err = h
            .relay
            .apply_callback(CallbackNotification {
                token: "  ".to_string(),
                status: BuildStatus::Completed,
                download_url: None,
                conclusion: None,
                run_id: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("token"));
    }
}
