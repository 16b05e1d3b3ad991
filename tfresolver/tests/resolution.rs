mod common;

use common::{providers, section, settings, FakeProvider, FakeValidator, Mode};
use std::time::Duration;
use tfresolver::{FailureReason, MusicService, ResolveError, ServiceError};
use tfsource::{Platform, TrackKey};
use tokio::time::{sleep, timeout, Instant};

fn netease(id: &str) -> TrackKey {
    TrackKey::new(Platform::Netease, id)
}

#[tokio::test(start_paused = true)]
async fn test_failover_promotes_the_provider_that_answered() {
    let a = FakeProvider::new("a", Platform::Netease).mode(Mode::Fail).arc();
    let b = FakeProvider::new("b", Platform::Netease).arc();
    let c = FakeProvider::new("c", Platform::Netease).arc();
    let service = MusicService::new(settings(), providers(&[&a, &b, &c]), FakeValidator::accept_all());

    let resolved = service.resolve("1", "netease").await.unwrap();
    assert_eq!(resolved.provider, "b");
    assert_eq!(resolved.url, b.url_for("1"));
    assert!(resolved.validated);
    assert_eq!(service.registry().order(Platform::Netease), vec!["b", "a", "c"]);

    // next resolution goes straight to the promoted provider
    service.resolve("2", "netease").await.unwrap();
    assert_eq!(a.resolve_calls(), 1);
    assert_eq!(b.resolved_ids(), vec!["1", "2"]);
    assert_eq!(c.resolve_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_third_provider_promoted_after_two_rejected_urls() {
    let a = FakeProvider::new("a", Platform::Netease).arc();
    let b = FakeProvider::new("b", Platform::Netease).arc();
    let c = FakeProvider::new("c", Platform::Netease).arc();
    let validator = FakeValidator::rejecting(&["http://a/", "http://b/"]);
    let service = MusicService::new(settings(), providers(&[&a, &b, &c]), validator.clone());

    let resolved = service.resolve("1", "netease").await.unwrap();
    assert_eq!(resolved.provider, "c");
    assert_eq!(resolved.url, c.url_for("1"));
    assert_eq!(validator.probes(), 3);
    assert_eq!(service.registry().order(Platform::Netease)[0], "c");

    // a different id starts with c and stops there
    let resolved = service.resolve("2", "netease").await.unwrap();
    assert_eq!(resolved.provider, "c");
    assert_eq!(c.resolved_ids(), vec!["1", "2"]);
    assert_eq!(a.resolved_ids(), vec!["1"]);
    assert_eq!(b.resolved_ids(), vec!["1"]);
    assert_eq!(validator.probes(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_url_falls_through_to_next_provider() {
    let a = FakeProvider::new("a", Platform::Netease).arc();
    let b = FakeProvider::new("b", Platform::Netease).arc();
    let validator = FakeValidator::rejecting(&["http://a/"]);
    let service = MusicService::new(settings(), providers(&[&a, &b]), validator.clone());

    let resolved = service.resolve_key(&netease("7")).await.unwrap();
    assert_eq!(resolved.provider, "b");
    assert_eq!(validator.probes(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_reports_every_attempt_in_order() {
    let a = FakeProvider::new("a", Platform::Netease).mode(Mode::Fail).arc();
    let b = FakeProvider::new("b", Platform::Netease).mode(Mode::Hang).arc();
    let c = FakeProvider::new("c", Platform::Netease).arc();
    let validator = FakeValidator::rejecting(&["http://c/"]);
    let service = MusicService::new(settings(), providers(&[&a, &b, &c]), validator);

    let err = service.resolve_key(&netease("9")).await.unwrap_err();
    let ServiceError::Resolution(ResolveError::ResolutionFailed { key, attempts }) = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(key, netease("9"));

    let summary: Vec<(&str, &FailureReason)> =
        attempts.iter().map(|a| (a.provider.as_str(), &a.reason)).collect();
    assert_eq!(summary.len(), 3);
    assert_eq!(summary[0].0, "a");
    assert!(matches!(summary[0].1, FailureReason::ProviderUnavailable(_)));
    assert_eq!(summary[1], ("b", &FailureReason::TimedOut));
    assert_eq!(summary[2], ("c", &FailureReason::ValidationFailed));

    // failures are not cached
    assert_eq!(service.stats().cache.entries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_attempts_capped_by_max_providers() {
    let all: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|id| FakeProvider::new(id, Platform::Netease).mode(Mode::Fail).arc())
        .collect();
    let refs: Vec<_> = all.iter().collect();
    let settings = tfconfig::EngineSection {
        maxprovidersperrequest: Some(3),
        ..section()
    }
    .into_settings();
    let service = MusicService::new(settings, providers(&refs), FakeValidator::accept_all());

    let err = service.resolve_key(&netease("1")).await.unwrap_err();
    let ServiceError::Resolution(ResolveError::ResolutionFailed { attempts, .. }) = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(attempts.len(), 3);
    assert_eq!(all[3].resolve_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_total_latency_is_bounded_when_every_provider_hangs() {
    let hanging: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|id| FakeProvider::new(id, Platform::Netease).mode(Mode::Hang).arc())
        .collect();
    let refs: Vec<_> = hanging.iter().collect();
    let service = MusicService::new(settings(), providers(&refs), FakeValidator::accept_all());

    let started = Instant::now();
    let err = service.resolve_key(&netease("1")).await.unwrap_err();
    let elapsed = started.elapsed();

    // 3 x (timeout + backoff) + 3 x validation timeout
    let bound = 3 * (Duration::from_millis(1_000) + Duration::from_millis(100)) + 3 * Duration::from_millis(500);
    assert!(elapsed <= bound, "took {:?}", elapsed);
    assert!(matches!(err, ServiceError::Resolution(ResolveError::ResolutionFailed { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_platform_has_no_providers() {
    let a = FakeProvider::new("a", Platform::Netease).arc();
    let service = MusicService::new(settings(), providers(&[&a]), FakeValidator::accept_all());

    let err = service.resolve("1", "kugou").await.unwrap_err();
    assert_eq!(
        err,
        ServiceError::Resolution(ResolveError::NoProviders {
            platform: Platform::Kugou
        })
    );

    assert!(matches!(
        service.resolve("has space", "netease").await,
        Err(ServiceError::InvalidTrackId(_))
    ));
    assert!(matches!(
        service.resolve("1", "napster").await,
        Err(ServiceError::UnknownPlatform(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_share_one_resolution() {
    let a = FakeProvider::new("a", Platform::Netease)
        .delay(Duration::from_millis(500))
        .arc();
    let service = MusicService::new(settings(), providers(&[&a]), FakeValidator::accept_all());
    let key = netease("42");

    let (first, second) = tokio::join!(service.resolve_key(&key), service.resolve_key(&key));

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(a.resolve_calls(), 1);
    assert_eq!(service.stats().in_flight, 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_request_still_fills_the_cache() {
    let a = FakeProvider::new("a", Platform::Netease)
        .delay(Duration::from_millis(500))
        .arc();
    let service = MusicService::new(settings(), providers(&[&a]), FakeValidator::accept_all());
    let key = netease("42");

    let abandoned = timeout(Duration::from_millis(100), service.resolve_key(&key)).await;
    assert!(abandoned.is_err());

    sleep(Duration::from_secs(1)).await;
    assert_eq!(service.stats().cache.entries, 1);

    service.resolve_key(&key).await.unwrap();
    assert_eq!(a.resolve_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cache_hit_then_expiry() {
    let a = FakeProvider::new("a", Platform::Netease).arc();
    let settings = tfconfig::EngineSection {
        cachettlms: Some(60_000),
        ..section()
    }
    .into_settings();
    let service = MusicService::new(settings, providers(&[&a]), FakeValidator::accept_all());
    let key = netease("5");

    service.resolve_key(&key).await.unwrap();
    service.resolve_key(&key).await.unwrap();
    assert_eq!(a.resolve_calls(), 1);

    let stats = service.stats().cache;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    sleep(Duration::from_secs(61)).await;
    service.resolve_key(&key).await.unwrap();
    assert_eq!(a.resolve_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_forces_a_new_resolution() {
    let a = FakeProvider::new("a", Platform::Netease).arc();
    let service = MusicService::new(settings(), providers(&[&a]), FakeValidator::accept_all());
    let key = netease("5");

    service.resolve_key(&key).await.unwrap();
    assert!(service.invalidate(&key));
    assert!(!service.invalidate(&key));

    service.resolve_key(&key).await.unwrap();
    assert_eq!(a.resolve_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_failures_demote_the_first_provider() {
    let a = FakeProvider::new("a", Platform::Netease)
        .fail_on("1")
        .fail_on("2")
        .arc();
    let b = FakeProvider::new("b", Platform::Netease)
        .fail_on("1")
        .fail_on("4")
        .arc();
    let settings = tfconfig::EngineSection {
        demoteafterfailures: Some(2),
        ..section()
    }
    .into_settings();
    let service = MusicService::new(settings, providers(&[&a, &b]), FakeValidator::accept_all());

    assert!(service.resolve("1", "netease").await.is_err());
    assert_eq!(service.registry().order(Platform::Netease), vec!["a", "b"]);

    // second failure in a row moves "a" to the back
    let resolved = service.resolve("2", "netease").await.unwrap();
    assert_eq!(resolved.provider, "b");
    assert_eq!(service.registry().order(Platform::Netease), vec!["b", "a"]);

    // still registered, and promoted back once it answers
    let resolved = service.resolve("4", "netease").await.unwrap();
    assert_eq!(resolved.provider, "a");
    assert_eq!(service.registry().order(Platform::Netease), vec!["a", "b"]);
}
