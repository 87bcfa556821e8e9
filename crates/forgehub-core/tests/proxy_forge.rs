mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use forgehub_core::{
    BufferingCache, Forge, ForgeError, InMemoryCache, ModuleQuery, ProxyForge, ReleaseFilter,
};
use serde_json::json;

use common::{FakeHttpClient, UPSTREAM, init_tracing, module_document, page, release_document};

fn proxy(client: &Arc<FakeHttpClient>) -> ProxyForge {
    ProxyForge::new(&format!("{UPSTREAM}/"))
        .expect("valid url")
        .with_http_client(client.clone())
}

#[tokio::test]
async fn repeated_query_hits_upstream_once() {
    init_tracing();
    let client = FakeHttpClient::new();
    client.respond_json(
        "/v3/modules/alice-foo",
        module_document("alice", "foo", &["2.0.0", "1.0.0"]),
    );
    let forge = proxy(&client);

    let first = forge.get_module_metadata("alice", "foo").await.expect("module");
    let second = forge.get_module_metadata("alice", "foo").await.expect("module");

    assert_eq!(first.current_release().version(), "2.0.0");
    assert_eq!(second.releases().len(), 2);
    assert_eq!(client.calls("/v3/modules/alice-foo"), 1);
}

#[tokio::test]
async fn query_cache_expires_after_ttl() {
    let client = FakeHttpClient::new();
    client.respond_json("/v3/modules/alice-foo", module_document("alice", "foo", &["1.0.0"]));
    let forge = proxy(&client).with_query_cache(Arc::new(InMemoryCache::<Bytes>::new(
        Duration::from_millis(20),
    )));

    forge.get_module_metadata("alice", "foo").await.expect("module");
    tokio::time::sleep(Duration::from_millis(40)).await;
    forge.get_module_metadata("alice", "foo").await.expect("module");

    assert_eq!(client.calls("/v3/modules/alice-foo"), 2);
}

#[tokio::test]
async fn clear_cache_forces_refetch() {
    let client = FakeHttpClient::new();
    client.respond_json("/v3/modules/alice-foo", module_document("alice", "foo", &["1.0.0"]));
    let forge = proxy(&client);

    forge.get_module_metadata("alice", "foo").await.expect("module");
    forge.clear_cache().await;
    forge.get_module_metadata("alice", "foo").await.expect("module");

    assert_eq!(client.calls("/v3/modules/alice-foo"), 2);
}

#[tokio::test]
async fn search_follows_pagination_to_the_end() {
    let client = FakeHttpClient::new();
    client.respond_json(
        "/v3/modules?query=foo",
        page(
            vec![module_document("alice", "foo", &["1.0.0"])],
            Some("/v3/modules?query=foo&offset=1"),
        ),
    );
    client.respond_json(
        "/v3/modules?query=foo&offset=1",
        page(
            vec![module_document("bob", "foobar", &["0.2.0"])],
            Some(format!("{UPSTREAM}/v3/modules?query=foo&offset=2").as_str()),
        ),
    );
    client.respond_json("/v3/modules?query=foo&offset=2", page(vec![], None));
    let forge = proxy(&client);

    let modules = forge
        .search_modules(&ModuleQuery::matching("foo"))
        .await
        .expect("search");

    let names: Vec<String> = modules.iter().map(|m| m.full_name()).collect();
    assert_eq!(names, vec!["alice-foo", "bob-foobar"]);
    assert_eq!(client.calls("/v3/modules?query=foo&offset=2"), 1);
}

#[tokio::test]
async fn pagination_cycle_between_pages_terminates() {
    let client = FakeHttpClient::new();
    client.respond_json(
        "/v3/modules?query=foo",
        page(
            vec![module_document("alice", "foo", &["1.0.0"])],
            Some("/v3/modules?query=foo&offset=1"),
        ),
    );
    client.respond_json(
        "/v3/modules?query=foo&offset=1",
        page(
            vec![module_document("bob", "foobar", &["0.2.0"])],
            Some(format!("{UPSTREAM}/v3/modules?query=foo").as_str()),
        ),
    );
    let forge = proxy(&client);

    let modules = tokio::time::timeout(
        Duration::from_secs(5),
        forge.search_modules(&ModuleQuery::matching("foo")),
    )
    .await
    .expect("pagination terminates")
    .expect("search");

    let names: Vec<String> = modules.iter().map(|m| m.full_name()).collect();
    assert_eq!(names, vec!["alice-foo", "bob-foobar"]);
    assert_eq!(client.calls("/v3/modules?query=foo"), 1);
    assert_eq!(client.calls("/v3/modules?query=foo&offset=1"), 1);
}

#[tokio::test]
async fn release_search_passes_module_filter() {
    let client = FakeHttpClient::new();
    client.respond_json(
        "/v3/releases?module=alice-foo",
        page(
            vec![
                release_document("alice", "foo", "1.0.0"),
                release_document("alice", "foo", "1.1.0"),
            ],
            None,
        ),
    );
    let forge = proxy(&client);

    let releases = forge
        .search_releases(&ReleaseFilter::for_module("alice/foo"))
        .await
        .expect("releases");
    assert_eq!(releases.len(), 2);
}

#[tokio::test]
async fn upstream_errors_are_classified() {
    let client = FakeHttpClient::new();
    client.respond_status("/v3/modules/alice-gone", 410);
    client.respond_status("/v3/modules/alice-flaky", 502);
    let forge = proxy(&client);

    let missing = forge.get_module_metadata("alice", "missing").await;
    assert!(matches!(missing, Err(ForgeError::NotFound(_))));

    let gone = forge.get_module_metadata("alice", "gone").await;
    assert!(matches!(gone, Err(ForgeError::NotFound(_))));

    let flaky = forge.get_module_metadata("alice", "flaky").await;
    assert!(matches!(flaky, Err(ForgeError::Transport(_))));
}

#[tokio::test]
async fn failed_query_is_not_cached() {
    let client = FakeHttpClient::new();
    client.respond_status("/v3/modules/alice-foo", 503);
    let forge = proxy(&client);

    assert!(forge.get_module_metadata("alice", "foo").await.is_err());
    client.respond_json("/v3/modules/alice-foo", module_document("alice", "foo", &["1.0.0"]));
    assert!(forge.get_module_metadata("alice", "foo").await.is_ok());
    assert_eq!(client.calls("/v3/modules/alice-foo"), 2);
}

#[tokio::test]
async fn buffer_downloads_release_file() {
    let client = FakeHttpClient::new();
    client.respond_json(
        "/v3/releases/alice-foo-1.0.0",
        release_document("alice", "foo", "1.0.0"),
    );
    client.respond_bytes("/v3/files/alice-foo-1.0.0.tar.gz", &b"package bytes"[..]);
    let forge = proxy(&client);

    for _ in 0..2 {
        let buffer = forge
            .get_module_buffer("alice", "foo", "1.0.0")
            .await
            .expect("buffer");
        assert_eq!(buffer.size(), Some(13));
        assert_eq!(buffer.into_bytes().await.expect("bytes").as_ref(), b"package bytes");
    }
    // downloads are streamed, not cached, by default
    assert_eq!(client.calls("/v3/files/alice-foo-1.0.0.tar.gz"), 2);
}

#[tokio::test]
async fn buffering_download_cache_reuses_package() {
    let client = FakeHttpClient::new();
    client.respond_json(
        "/v3/releases/alice-foo-1.0.0",
        release_document("alice", "foo", "1.0.0"),
    );
    client.respond_bytes("/v3/files/alice-foo-1.0.0.tar.gz", &b"package bytes"[..]);
    let forge = proxy(&client)
        .with_download_cache(Arc::new(BufferingCache::new(Duration::from_secs(60))));

    for _ in 0..2 {
        forge
            .get_module_buffer("alice", "foo", "1.0.0")
            .await
            .expect("buffer");
    }
    assert_eq!(client.calls("/v3/files/alice-foo-1.0.0.tar.gz"), 1);
}

#[tokio::test]
async fn release_listing_uses_legacy_endpoint() {
    let client = FakeHttpClient::new();
    client.respond_json(
        "/api/v1/releases.json?module=bob%2Fbar",
        json!({
            "bob/bar": [
                { "file": "/system/releases/b/bob/bob-bar-1.1.0.tar.gz", "version": "1.1.0", "dependencies": [] },
                { "file": "/system/releases/b/bob/bob-bar-1.2.0.tar.gz", "version": "1.2.0",
                  "dependencies": [["carol/baz", ">= 2.0.0"]] }
            ],
            "carol/baz": [
                { "file": "/system/releases/c/carol/carol-baz-2.0.0.tar.gz", "version": "2.0.0", "dependencies": [] }
            ]
        }),
    );
    let forge = proxy(&client);

    let releases = forge.list_releases("bob", "bar").await.expect("releases");
    let versions: Vec<&str> = releases.iter().map(|r| r.version()).collect();
    assert_eq!(versions, vec!["1.1.0", "1.2.0"]);
    assert_eq!(releases[1].dependencies()[0].full_name(), "carol-baz");
}

#[tokio::test]
async fn release_listing_falls_back_to_v3() {
    let client = FakeHttpClient::new();
    client.respond_json(
        "/v3/releases?module=bob-bar",
        page(vec![release_document("bob", "bar", "1.3.0")], None),
    );
    let forge = proxy(&client);

    let releases = forge.list_releases("bob", "bar").await.expect("releases");
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].version(), "1.3.0");

    let unknown = forge.list_releases("nobody", "nothing").await;
    assert!(matches!(unknown, Err(ForgeError::NotFound(_))));
}

#[test]
fn invalid_url_is_rejected_at_construction() {
    assert!(matches!(
        ProxyForge::new("forge.example.com"),
        Err(ForgeError::InvalidConfig(_))
    ));
}
