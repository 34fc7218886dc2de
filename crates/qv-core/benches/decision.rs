//! Benchmark for the synchronous early-load decision path.
//!
//! This path runs on every page load before any page script; it has to be
//! cheap even with a large user pattern list.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use qv_core::cache::{apply_refresh, CacheRefresh, MemoryStore};
use qv_core::clock::ManualClock;
use qv_core::pattern;
use qv_core::protection::ProtectionController;

fn bench_pattern_match(c: &mut Criterion) {
    let url = "https://deep.sub.example.com/courses/42/quizzes/7?attempt=1";

    c.bench_function("pattern_exact_domain", |b| {
        b.iter(|| pattern::matches(black_box(url), black_box("example.com")))
    });
    c.bench_function("pattern_wildcard", |b| {
        b.iter(|| pattern::matches(black_box(url), black_box("*.example.com")))
    });
    c.bench_function("pattern_html_fragment", |b| {
        b.iter(|| pattern::matches(black_box(url), black_box("quiz.html")))
    });
}

fn bench_decide(c: &mut Criterion) {
    let store = MemoryStore::new();
    let clock = ManualClock::new(1_000_000);

    let sites: Vec<String> = (0..50)
        .map(|i| format!("site-{i}.example.org"))
        .chain(["example.com".to_string()])
        .collect();
    apply_refresh(
        &store,
        &CacheRefresh { sites, extension_enabled: true },
        1_000_000,
    );

    c.bench_function("decide_custom_site_50_patterns", |b| {
        b.iter(|| {
            ProtectionController::decide(
                black_box("https://example.com/lesson"),
                &store,
                &clock,
            )
        })
    });

    c.bench_function("decide_lms_host", |b| {
        b.iter(|| {
            ProtectionController::decide(
                black_box("https://mycourse.instructure.com/quizzes/1"),
                &store,
                &clock,
            )
        })
    });
}

criterion_group!(benches, bench_pattern_match, bench_decide);
criterion_main!(benches);
