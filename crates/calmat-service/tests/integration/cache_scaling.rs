//! Cache pressure degrades expansion without failing the call; work grows
//! linearly with input.

use std::time::{Duration, Instant};

use super::helpers::*;

#[test_log::test(tokio::test)]
async fn small_cache_reports_eviction() {
    let ics = many_series(20, 2);
    let result = pipeline_with(|c| c.cache_total_capacity = 10)
        .parse(&ics, options())
        .await;

    assert!(result.success);
    assert!(has_warning(&result, WarningKind::CacheEviction));
    // Evicted series keep their unexpanded first occurrence.
    for i in 0..20 {
        assert!(!events_of(&result, &format!("series-{i}")).is_empty());
    }
    assert!(result.events.len() < 40);
}

#[test_log::test(tokio::test)]
async fn zero_capacity_keeps_stubs_only() {
    let ics = many_series(5, 3);
    let result = pipeline_with(|c| c.cache_total_capacity = 0)
        .parse(&ics, options())
        .await;

    assert!(result.success);
    assert_eq!(result.events.len(), 5);
    assert!(
        result
            .events
            .iter()
            .all(|e| e.start == utc(2025, 11, 1, 9, 0))
    );
}

/// Best of `samples` timings, each covering `repeats` back-to-back parses.
async fn fastest_of(series: usize, samples: usize, repeats: usize) -> Duration {
    let ics = many_series(series, 10);
    let pipeline = pipeline();
    let mut best = Duration::MAX;
    for _ in 0..samples {
        let started = Instant::now();
        for _ in 0..repeats {
            let result = pipeline.parse(&ics, options()).await;
            assert_eq!(result.events.len(), series * 10);
        }
        best = best.min(started.elapsed());
    }
    best
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn parse_time_scales_linearly() {
    // Warm-up.
    fastest_of(50, 1, 5).await;

    let timings = [
        fastest_of(50, 5, 20).await,
        fastest_of(100, 5, 20).await,
        fastest_of(200, 5, 20).await,
    ];

    for pair in timings.windows(2) {
        let ratio = pair[1].as_secs_f64() / pair[0].as_secs_f64();
        assert!(
            ratio < 3.5,
            "doubling the input took {ratio:.2}x longer ({:?} -> {:?})",
            pair[0],
            pair[1]
        );
    }
}
