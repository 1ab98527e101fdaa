//! Integration tests for the crawler
//!
//! Most tests drive the orchestrator with scripted `MockSource` adapters
//! under paused tokio time; the last one crawls a wiremock server through
//! the real arXiv adapter.

use biblio_ripple::config::parse_config;
use biblio_ripple::crawler::{crawl, Orchestrator, RetryPolicy};
use biblio_ripple::sources::mock::{detail_url, make_record};
use biblio_ripple::sources::{AdapterError, MockSource};
use biblio_ripple::storage::{open_storage, RecordStore, RunStatus, SqliteStorage};
use biblio_ripple::{CrawlState, SourceId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INTERVAL: Duration = Duration::from_secs(1);

fn retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
    }
}

fn orchestrator(store: Arc<dyn RecordStore>) -> Orchestrator {
    Orchestrator::new(store, retry_policy()).with_config_hash("integration")
}

/// Two pages, three records: the canonical "kubernetes" search
fn kubernetes_source(source: SourceId) -> MockSource {
    MockSource::new(source)
        .with_records_page(
            vec![
                make_record(source, "10.1000/k8s-1", "Kubernetes Scheduling"),
                make_record(source, "10.1000/k8s-2", "Kubernetes Networking"),
            ],
            true,
        )
        .with_records_page(
            vec![make_record(source, "10.1000/k8s-3", "Kubernetes Storage")],
            false,
        )
}

#[tokio::test(start_paused = true)]
async fn test_kubernetes_end_to_end() {
    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let mock = Arc::new(kubernetes_source(SourceId::Acm));

    let mut orchestrator = orchestrator(store.clone());
    orchestrator.register(mock.clone(), 2, INTERVAL);

    let report = orchestrator
        .run("kubernetes", &[SourceId::Acm], &CancellationToken::new())
        .await;

    let acm = &report.sources[&SourceId::Acm];
    assert_eq!(acm.state, CrawlState::Done);
    assert_eq!(acm.count, 3);
    assert_eq!(acm.stats.pages_fetched, 2);
    assert_eq!(acm.stats.inserted, 3);
    assert_eq!(mock.page_requests(), vec![0, 1]);
    assert_eq!(mock.sessions_begun(), 1);
    assert_eq!(mock.sessions_ended(), 1);

    let titles: Vec<_> = acm.records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Kubernetes Scheduling", "Kubernetes Networking", "Kubernetes Storage"]
    );

    assert_eq!(store.count_records().unwrap(), 3);
    let stored = store
        .get_record(SourceId::Acm, "10.1000/k8s-2")
        .unwrap()
        .unwrap();
    assert_eq!(stored.url, detail_url(SourceId::Acm, "10.1000/k8s-2"));
    assert_eq!(stored.authors, vec!["Jane Doe"]);

    let runs = store.latest_runs(5).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Done);
    assert_eq!(runs[0].config_hash, "integration");
}

#[tokio::test(start_paused = true)]
async fn test_second_crawl_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("records.db");

    let mut first_keys = Vec::new();
    for round in 0..2 {
        // Reopen the file each round, as two separate invocations would
        let store = Arc::new(open_storage(&db_path).unwrap());
        let mut orchestrator = orchestrator(store.clone());
        orchestrator.register(Arc::new(kubernetes_source(SourceId::Arxiv)), 2, INTERVAL);

        let report = orchestrator
            .run("kubernetes", &[SourceId::Arxiv], &CancellationToken::new())
            .await;
        let arxiv = &report.sources[&SourceId::Arxiv];

        assert_eq!(arxiv.state, CrawlState::Done);
        assert_eq!(arxiv.count, 3);
        assert_eq!(store.count_records().unwrap(), 3);

        let keys: Vec<_> = arxiv.records.iter().map(|r| r.natural_key.clone()).collect();
        if round == 0 {
            assert_eq!(arxiv.stats.inserted, 3);
            first_keys = keys;
        } else {
            assert_eq!(arxiv.stats.inserted, 0);
            assert_eq!(arxiv.stats.duplicates, 3);
            assert_eq!(keys, first_keys);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_requests_to_a_source_are_spaced() {
    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let source = SourceId::Ieee;
    let flaky = detail_url(source, "10.1000/k8s-1");
    let mock = Arc::new(kubernetes_source(source).fail_detail(
        &flaky,
        1,
        AdapterError::Status {
            status: 503,
            url: flaky.clone(),
        },
    ));

    let mut orchestrator = orchestrator(store);
    orchestrator.register(mock.clone(), 2, INTERVAL);

    let report = orchestrator
        .run("kubernetes", &[source], &CancellationToken::new())
        .await;
    assert_eq!(report.sources[&source].count, 3);

    // 2 pages, 3 details and 1 retried detail
    let times = mock.request_times();
    assert_eq!(times.len(), 6);
    for pair in times.windows(2) {
        assert!(
            pair[1] - pair[0] >= INTERVAL,
            "requests only {:?} apart",
            pair[1] - pair[0]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() {
    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let source = SourceId::ScienceDirect;
    let down = detail_url(source, "10.1000/k8s-2");
    let mock = Arc::new(kubernetes_source(source).fail_detail_always(
        &down,
        AdapterError::Timeout { url: down.clone() },
    ));

    let mut orchestrator = orchestrator(store.clone());
    orchestrator.register(mock.clone(), 2, INTERVAL);

    let report = orchestrator
        .run("kubernetes", &[source], &CancellationToken::new())
        .await;
    let sd = &report.sources[&source];

    let attempts = mock
        .detail_requests()
        .iter()
        .filter(|url| **url == down)
        .count();
    assert_eq!(attempts, 3);
    assert_eq!(sd.state, CrawlState::Done);
    assert_eq!(sd.count, 2);
    assert_eq!(sd.stats.exhausted, 1);
    assert_eq!(store.get_record(source, "10.1000/k8s-2").unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_retry_backoff_doubles() {
    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let source = SourceId::Acm;
    let down = detail_url(source, "10.1000/down");
    let mock = Arc::new(
        MockSource::new(source)
            .with_records_page(vec![make_record(source, "10.1000/down", "Down")], false)
            .fail_detail_always(&down, AdapterError::Timeout { url: down.clone() }),
    );

    let mut orchestrator = orchestrator(store);
    orchestrator.register(mock.clone(), 2, Duration::ZERO);
    orchestrator
        .run("kubernetes", &[source], &CancellationToken::new())
        .await;

    // Page request, then three detail attempts
    let times = mock.request_times();
    assert_eq!(times.len(), 4);
    let first_gap = times[2] - times[1];
    let second_gap = times[3] - times[2];
    assert!(first_gap >= Duration::from_millis(100) && first_gap < Duration::from_millis(150));
    assert!(second_gap >= Duration::from_millis(200) && second_gap < Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_limits_are_per_source() {
    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let acm = Arc::new(kubernetes_source(SourceId::Acm));
    let arxiv = Arc::new(kubernetes_source(SourceId::Arxiv));

    let mut orchestrator = orchestrator(store);
    orchestrator.register(acm.clone(), 2, INTERVAL);
    orchestrator.register(arxiv.clone(), 2, INTERVAL);

    let started = tokio::time::Instant::now();
    orchestrator
        .run("kubernetes", &[SourceId::Acm, SourceId::Arxiv], &CancellationToken::new())
        .await;

    // Both sources start at once and finish in the time one of them needs
    assert_eq!(acm.request_times()[0], started);
    assert_eq!(arxiv.request_times()[0], started);
    assert!(started.elapsed() < INTERVAL * 5);
}

#[tokio::test(start_paused = true)]
async fn test_bad_items_are_skipped_not_fatal() {
    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let source = SourceId::SpringerLink;
    let untitled = {
        let mut raw = make_record(source, "10.1007/untitled", "");
        raw.title = None;
        raw
    };
    let garbled = detail_url(source, "10.1000/k8s-3");
    let mock = Arc::new(
        MockSource::new(source)
            .with_records_page(
                vec![
                    make_record(source, "10.1000/k8s-1", "Kubernetes Scheduling"),
                    untitled,
                ],
                true,
            )
            .with_records_page(
                vec![make_record(source, "10.1000/k8s-3", "Kubernetes Storage")],
                false,
            )
            .fail_detail_always(
                &garbled,
                AdapterError::Malformed {
                    url: garbled.clone(),
                    reason: "no title element".to_string(),
                },
            ),
    );

    let mut orchestrator = orchestrator(store.clone());
    orchestrator.register(mock.clone(), 2, INTERVAL);

    let report = orchestrator
        .run("kubernetes", &[source], &CancellationToken::new())
        .await;
    let springer = &report.sources[&source];

    assert_eq!(springer.state, CrawlState::Done);
    assert_eq!(springer.count, 1);
    assert_eq!(springer.stats.skipped, 2);
    assert_eq!(springer.stats.items_dropped(), 2);
    // A permanent failure is not retried
    assert_eq!(
        mock.detail_requests().iter().filter(|u| **u == garbled).count(),
        1
    );
    assert_eq!(store.count_records().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sources_are_isolated() {
    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let broken = Arc::new(
        MockSource::new(SourceId::Ieee)
            .with_latency(Duration::from_millis(300))
            .fail_page_always(
                0,
                AdapterError::Status {
                    status: 503,
                    url: "ieee search".to_string(),
                },
            ),
    );
    let healthy = Arc::new(kubernetes_source(SourceId::Acm).with_latency(Duration::from_millis(300)));
    let second = Arc::new(kubernetes_source(SourceId::Arxiv));

    let mut orchestrator = orchestrator(store.clone());
    orchestrator.register(broken.clone(), 2, INTERVAL);
    orchestrator.register(healthy, 2, INTERVAL);
    orchestrator.register(second, 2, INTERVAL);

    let report = orchestrator
        .run(
            "kubernetes",
            &[SourceId::Acm, SourceId::Arxiv, SourceId::Ieee],
            &CancellationToken::new(),
        )
        .await;

    let ieee = &report.sources[&SourceId::Ieee];
    assert_eq!(ieee.state, CrawlState::Failed);
    assert_eq!(ieee.count, 0);
    assert!(ieee.error.as_deref().unwrap_or_default().contains("503"));
    assert_eq!(broken.page_requests(), vec![0, 0, 0]);

    assert_eq!(report.sources[&SourceId::Acm].state, CrawlState::Done);
    assert_eq!(report.sources[&SourceId::Acm].count, 3);
    assert_eq!(report.sources[&SourceId::Arxiv].count, 3);
    assert_eq!(report.total_records(), 6);
    assert_eq!(report.sources_in(CrawlState::Failed), vec![SourceId::Ieee]);

    let by_source = store.count_records_by_source().unwrap();
    assert_eq!(by_source.get(&SourceId::Acm), Some(&3));
    assert_eq!(by_source.get(&SourceId::Ieee), None);

    let failed_run = store
        .latest_runs(10)
        .unwrap()
        .into_iter()
        .find(|run| run.source == SourceId::Ieee)
        .unwrap();
    assert_eq!(failed_run.status, RunStatus::Failed);
    assert!(failed_run.error_message.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_keeps_persisted_records() {
    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let endless = Arc::new(MockSource::new(SourceId::Acm).with_endless_pages());
    let finite = Arc::new(kubernetes_source(SourceId::Arxiv));

    let mut orchestrator = orchestrator(store.clone());
    orchestrator.register(endless.clone(), 1, INTERVAL);
    orchestrator.register(finite, 2, INTERVAL);

    let cancel = CancellationToken::new();
    let deadline = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        deadline.cancel();
    });

    let report = orchestrator
        .run("kubernetes", &[SourceId::Acm, SourceId::Arxiv], &cancel)
        .await;

    let acm = &report.sources[&SourceId::Acm];
    assert_eq!(acm.state, CrawlState::Cancelled);
    assert!(acm.count > 0);
    assert_eq!(endless.sessions_ended(), 1);

    // The finite source finished long before the deadline
    assert_eq!(report.sources[&SourceId::Arxiv].state, CrawlState::Done);

    assert_eq!(store.count_records().unwrap(), (acm.count + 3) as u64);
}

const ARXIV_RESULTS: &str = r#"
<ol class="breathe-horizontal">
  <li class="arxiv-result">
    <p class="list-title is-inline-block"><a href="/abs/2101.00001">arXiv:2101.00001</a></p>
  </li>
  <li class="arxiv-result">
    <p class="list-title is-inline-block"><a href="/abs/2101.00002">arXiv:2101.00002</a></p>
  </li>
</ol>
<nav class="pagination">
  <a class="pagination-next is-invisible">Next</a>
</nav>
"#;

const ARXIV_PREPRINT: &str = r#"
<div id="abs">
  <div class="dateline">[Submitted on 3 Mar 2021]</div>
  <h1 class="title mathjax"><span class="descriptor">Title:</span>Kubernetes on the Edge</h1>
  <div class="authors"><span class="descriptor">Authors:</span><a href="/a/1">Grace Hopper</a></div>
</div>
"#;

const ARXIV_PUBLISHED: &str = r#"
<div id="abs">
  <div class="dateline">[Submitted on 4 Mar 2021]</div>
  <h1 class="title mathjax"><span class="descriptor">Title:</span>Kubernetes in Production</h1>
  <div class="authors"><span class="descriptor">Authors:</span><a href="/a/2">Barbara Liskov</a></div>
  <span class="tablecell doi"><a data-doi="10.1109/CLOUD.2021.7" href="https://doi.org/10.1109/CLOUD.2021.7">10.1109/CLOUD.2021.7</a></span>
</div>
"#;

#[tokio::test]
async fn test_crawl_arxiv_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/"))
        .and(query_param("query", "kubernetes"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARXIV_RESULTS))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/abs/2101.00001"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARXIV_PREPRINT))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/abs/2101.00002"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARXIV_PUBLISHED))
        .mount(&server)
        .await;

    let config = parse_config(&format!(
        r#"
[crawler]
max-attempts = 2
base-delay-ms = 10
max-delay-ms = 10

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "./unused.db"
summary-path = "./unused.md"

[sources.arxiv]
base-url = "{}"
min-interval-ms = 0
"#,
        server.uri()
    ))
    .unwrap();

    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let report = crawl(
        &config,
        "hash",
        store.clone(),
        "kubernetes",
        &[SourceId::Arxiv],
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let arxiv = &report.sources[&SourceId::Arxiv];
    assert_eq!(arxiv.state, CrawlState::Done, "error: {:?}", arxiv.error);
    assert_eq!(arxiv.count, 2);
    assert_eq!(report.sources.len(), 1);

    let preprint = store
        .get_record(SourceId::Arxiv, "arXiv:2101.00001")
        .unwrap()
        .unwrap();
    assert_eq!(preprint.title, "Kubernetes on the Edge");
    assert_eq!(preprint.url, format!("{}/abs/2101.00001", server.uri()));

    let published = store
        .get_record(SourceId::Arxiv, "10.1109/CLOUD.2021.7")
        .unwrap()
        .unwrap();
    assert_eq!(published.authors, vec!["Barbara Liskov"]);
    assert_eq!(
        published.publication_date,
        chrono::NaiveDate::from_ymd_opt(2021, 3, 4)
    );
}

#[tokio::test]
async fn test_crawl_arxiv_block_page_fails_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><h1>Access denied</h1><p>Please verify you are a human</p></body></html>",
        ))
        // Permanent, so the page is not retried
        .expect(1)
        .mount(&server)
        .await;

    let config = parse_config(&format!(
        r#"
[crawler]
max-attempts = 3
base-delay-ms = 10
max-delay-ms = 10

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "./unused.db"
summary-path = "./unused.md"

[sources.arxiv]
base-url = "{}"
min-interval-ms = 0
"#,
        server.uri()
    ))
    .unwrap();

    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let report = crawl(
        &config,
        "hash",
        store.clone(),
        "kubernetes",
        &[SourceId::Arxiv],
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let arxiv = &report.sources[&SourceId::Arxiv];
    assert_eq!(arxiv.state, CrawlState::Failed);
    assert_eq!(arxiv.count, 0);
    assert!(arxiv
        .error
        .as_deref()
        .is_some_and(|error| error.contains("Malformed response")));
    assert_eq!(store.count_records().unwrap(), 0);
}
