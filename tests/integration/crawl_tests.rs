//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small site and run the full crawl
//! cycle end-to-end: frontier, fetcher, extractor, store and snapshot.

use site_trawler::config::{Config, CrawlerConfig, OutputConfig, ScopeConfig, UserAgentConfig};
use site_trawler::crawler::Coordinator;
use site_trawler::output::export_from_storage;
use site_trawler::storage::{open_storage, PageRecord, Storage, WritePolicy};
use site_trawler::TrawlError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration rooted at `seed` writing into `dir`
fn create_test_config(seed: &str, max_depth: u32, dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            seed: seed.to_string(),
            max_depth,
            workers: 4,
            per_domain_parallelism: 2,
            min_delay_ms: 0,
            max_delay_ms: 0,
            request_timeout_secs: 5,
            setup_timeout_secs: 5,
            max_retries: 0,
        },
        scope: ScopeConfig {
            allowed_domains: vec!["127.0.0.1".to_string()],
            exclude_pattern: None,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.test/contact".to_string(),
            contact_email: "test@example.test".to_string(),
        },
        output: OutputConfig {
            database_path: path_string(&dir.join("trawl.db")),
            export_path: path_string(&dir.join("results.json")),
            write_policy: WritePolicy::Upsert,
        },
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, at: &str, body: &str, expected_hits: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html(body))
        .expect(expected_hits)
        .mount(server)
        .await;
}

fn read_snapshot(path: &Path) -> Vec<PageRecord> {
    let json = std::fs::read_to_string(path).expect("snapshot should exist");
    serde_json::from_str(&json).expect("snapshot should be valid JSON")
}

fn export_path(config: &Config) -> PathBuf {
    PathBuf::from(&config.output.export_path)
}

async fn crawl(config: Config) -> site_trawler::CrawlReport {
    Coordinator::new(config, false)
        .await
        .expect("setup should succeed")
        .run()
        .await
        .expect("crawl should succeed")
}

#[tokio::test]
async fn test_crawl_stores_and_exports_every_page() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><head><title>Home</title>
            <meta name="description" content="Landing page"></head>
            <body><img src="/logo.png"><a href="/about">About</a></body></html>"#,
        1,
    )
    .await;
    mount_page(
        &server,
        "/about",
        r#"<html><head><title>About</title></head><body><p>Hi</p></body></html>"#,
        1,
    )
    .await;

    let config = create_test_config(&format!("{}/", base), 2, dir.path());
    let snapshot = export_path(&config);
    let report = crawl(config).await;

    assert_eq!(report.dispatched, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.exported, 2);

    let records = read_snapshot(&snapshot);
    assert_eq!(records.len(), 2);

    let home = &records[0];
    assert_eq!(home.url, format!("{}/", base));
    assert_eq!(home.title, "Home");
    assert_eq!(home.description, "Landing page");
    assert_eq!(home.images, vec![format!("{}/logo.png", base)]);
    assert_eq!(home.links, vec![format!("{}/about", base)]);

    assert_eq!(records[1].url, format!("{}/about", base));
    assert_eq!(records[1].title, "About");
    assert!(records[1].links.is_empty());

    let raw = std::fs::read_to_string(&snapshot).unwrap();
    assert!(raw.contains("\"fetchedAt\""));
    assert!(raw.ends_with("]\n"));
}

#[tokio::test]
async fn test_shared_link_is_fetched_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<a href="/a">A</a><a href="/b">B</a><a href="/shared">S</a>"#,
        1,
    )
    .await;
    mount_page(&server, "/a", r#"<a href="/shared">S</a><a href="/">Home</a>"#, 1).await;
    mount_page(&server, "/b", r#"<a href="/shared#top">S</a>"#, 1).await;
    mount_page(&server, "/shared", r#"<title>Shared</title>"#, 1).await;

    let config = create_test_config(&format!("{}/", base), 3, dir.path());
    let snapshot = export_path(&config);
    let report = crawl(config).await;

    assert_eq!(report.dispatched, 4);
    assert_eq!(read_snapshot(&snapshot).len(), 4);
    assert!(report.dropped >= 3);
}

#[tokio::test]
async fn test_depth_limit_is_respected() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<a href="/level1">Next</a>"#, 1).await;
    mount_page(&server, "/level1", r#"<a href="/level2">Next</a>"#, 1).await;
    mount_page(&server, "/level2", r#"<title>Too deep</title>"#, 0).await;

    let config = create_test_config(&format!("{}/", base), 1, dir.path());
    let snapshot = export_path(&config);
    let report = crawl(config).await;

    assert_eq!(report.dispatched, 2);
    let urls: Vec<String> = read_snapshot(&snapshot).into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec![format!("{}/", base), format!("{}/level1", base)]);
}

#[tokio::test]
async fn test_depth_zero_fetches_only_seed() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<a href="/child">Child</a>"#, 1).await;
    mount_page(&server, "/child", "child", 0).await;

    let config = create_test_config(&format!("{}/", base), 0, dir.path());
    let report = site_trawler::crawler::crawl(config, false).await.unwrap();

    assert_eq!(report.dispatched, 1);
    assert_eq!(report.exported, 1);
}

#[tokio::test]
async fn test_out_of_scope_and_excluded_links_are_not_fetched() {
    let server = MockServer::start().await;
    let base = server.uri();
    let port = url::Url::parse(&base).unwrap().port().unwrap();
    let dir = TempDir::new().unwrap();

    let home = format!(
        r#"<a href="http://localhost:{}/elsewhere">Other host</a>
           <a href="/private/secret">Excluded</a>
           <a href="/public">Public</a>"#,
        port
    );
    mount_page(&server, "/", &home, 1).await;
    mount_page(&server, "/elsewhere", "elsewhere", 0).await;
    mount_page(&server, "/private/secret", "secret", 0).await;
    mount_page(&server, "/public", "public", 1).await;

    let mut config = create_test_config(&format!("{}/", base), 2, dir.path());
    config.scope.exclude_pattern = Some("/private/".to_string());
    let snapshot = export_path(&config);
    let report = crawl(config).await;

    assert_eq!(report.dispatched, 2);
    assert_eq!(read_snapshot(&snapshot).len(), 2);

    // Links are still recorded on the page even when they are not followed
    let records = read_snapshot(&snapshot);
    assert_eq!(records[0].links.len(), 3);
}

#[tokio::test]
async fn test_offsite_redirect_is_not_followed() {
    let server = MockServer::start().await;
    let port = server.address().port();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<a href="/go">Go</a><a href="/stay">Stay</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "location",
            format!("http://127.0.0.1:{}/offsite", port).as_str(),
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/offsite", "<title>Offsite</title>", 0).await;
    mount_page(&server, "/stay", "<title>Stay</title>", 1).await;

    let seed = format!("http://localhost:{}/", port);
    let mut config = create_test_config(&seed, 2, dir.path());
    config.scope.allowed_domains = vec!["localhost".to_string()];
    let snapshot = export_path(&config);
    let report = crawl(config).await;

    assert_eq!(report.dispatched, 3);
    assert_eq!(report.failed, 1);

    let records = read_snapshot(&snapshot);
    let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![seed.clone(), format!("http://localhost:{}/stay", port)]
    );
    assert!(records.iter().all(|r| r.title != "Offsite"));
}

#[tokio::test]
async fn test_failed_page_produces_no_record() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<a href="/broken">A</a><a href="/ok">B</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/ok", "<title>Fine</title>", 1).await;

    let config = create_test_config(&format!("{}/", base), 2, dir.path());
    let snapshot = export_path(&config);
    let report = crawl(config).await;

    assert_eq!(report.dispatched, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 2);

    let urls: Vec<String> = read_snapshot(&snapshot).into_iter().map(|r| r.url).collect();
    assert!(!urls.contains(&format!("{}/broken", base)));
    assert_eq!(urls.len(), 2);
}

#[tokio::test]
async fn test_non_html_page_is_stored_degraded() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<title>Home</title><a href="/file.pdf">PDF</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/file.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4 \0\0".to_vec(), "application/pdf"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&format!("{}/", base), 2, dir.path());
    let snapshot = export_path(&config);
    let report = crawl(config).await;

    assert_eq!(report.degraded, 1);
    let records = read_snapshot(&snapshot);
    let pdf = records
        .iter()
        .find(|r| r.url.ends_with("/file.pdf"))
        .expect("degraded record should be stored");
    assert!(pdf.title.is_empty());
    assert!(pdf.links.is_empty());
}

#[tokio::test]
async fn test_reexport_is_byte_identical() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<a href="/x">X</a><a href="/y">Y</a>"#, 1).await;
    mount_page(&server, "/x", "<title>X</title>", 1).await;
    mount_page(&server, "/y", "<title>Y</title>", 1).await;

    let config = create_test_config(&format!("{}/", base), 1, dir.path());
    let snapshot = export_path(&config);
    let db_path = PathBuf::from(&config.output.database_path);
    crawl(config).await;

    let first = std::fs::read(&snapshot).unwrap();

    let storage = open_storage(&db_path).unwrap();
    let count = export_from_storage(&storage, &snapshot).unwrap();
    let second = std::fs::read(&snapshot).unwrap();

    assert_eq!(count, 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_write_policy_across_runs() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let seed = format!("{}/", base);

    mount_page(&server, "/", "<title>First</title>", 1).await;
    crawl(create_test_config(&seed, 0, dir.path())).await;

    server.reset().await;
    mount_page(&server, "/", "<title>Second</title>", 1).await;
    let mut config = create_test_config(&seed, 0, dir.path());
    config.output.write_policy = WritePolicy::Ignore;
    let report = crawl(config).await;

    assert_eq!(report.duplicates, 1);
    assert_eq!(report.saved, 0);
    let db_path = dir.path().join("trawl.db");
    {
        let storage = open_storage(&db_path).unwrap();
        assert_eq!(storage.get_page(&seed).unwrap().unwrap().title, "First");
    }

    server.reset().await;
    mount_page(&server, "/", "<title>Third</title>", 1).await;
    let report = crawl(create_test_config(&seed, 0, dir.path())).await;

    assert_eq!(report.saved, 1);
    let storage = open_storage(&db_path).unwrap();
    assert_eq!(storage.count_pages().unwrap(), 1);
    assert_eq!(storage.get_page(&seed).unwrap().unwrap().title, "Third");
    assert_eq!(storage.get_latest_run().unwrap().unwrap().pages_dispatched, 1);
}

#[tokio::test]
async fn test_fresh_crawl_clears_previous_pages() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<a href="/old">Old</a>"#, 1).await;
    mount_page(&server, "/old", "old", 1).await;
    crawl(create_test_config(&format!("{}/", base), 1, dir.path())).await;

    server.reset().await;
    mount_page(&server, "/", "no links any more", 1).await;
    let config = create_test_config(&format!("{}/", base), 1, dir.path());
    let snapshot = export_path(&config);
    Coordinator::new(config, true)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(read_snapshot(&snapshot).len(), 1);
}

#[tokio::test]
async fn test_unwritable_export_path_fails_setup() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config("http://127.0.0.1:9/", 1, dir.path());
    config.output.export_path = path_string(&dir.path().join("missing").join("results.json"));

    let result = Coordinator::new(config, false).await;

    assert!(matches!(result, Err(TrawlError::Output(_))));
}

#[tokio::test]
async fn test_out_of_scope_seed_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("https://elsewhere.test/", 1, dir.path());

    let result = Coordinator::new(config, false).await;

    assert!(matches!(result, Err(TrawlError::SeedRejected { .. })));
}
