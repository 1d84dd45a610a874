//! End-to-end behaviour of the caching decorator against a real origin.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use revalidate::cache::{CacheError, CacheResult};
use revalidate::transport::BoxFuture;
use revalidate::{
    CacheConfig, CacheEntry, CacheKey, CacheStore, CachedTransport, MemoryStore, Method,
    RequestOptions, TcpTransport, Transport,
};

use common::{A_HTML, BASELINE, LATER, Origin, spawn_origin};

fn client_with(config: CacheConfig) -> (CachedTransport, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let client = CachedTransport::with_store(TcpTransport::new(), config, store.clone());
    (client, store)
}

fn client() -> (CachedTransport, Arc<MemoryStore>) {
    client_with(CacheConfig::default())
}

fn get(origin: &Origin, path: &str) -> RequestOptions {
    RequestOptions::get("127.0.0.1", origin.port(), path).cacheable(true)
}

/// Sends `options` and reads the whole body.
async fn fetch(client: &CachedTransport, options: RequestOptions) -> (u16, bool, Bytes) {
    let response = client.request(options).end().await.expect("exchange failed");
    let status = response.status_code();
    let cached = response.is_cached();
    let body = response.into_body().bytes().await.expect("body failed");
    (status, cached, body)
}

#[tokio::test]
async fn first_request_is_stored_in_full() {
    let origin = spawn_origin().await;
    let (client, store) = client();
    let options = get(&origin, "/A.html");

    let (status, cached, body) = fetch(&client, options.clone()).await;
    assert_eq!(status, 200);
    assert!(!cached);
    assert_eq!(body, A_HTML);
    assert!(origin.last_seen().if_modified_since.is_none());

    let entry = store
        .get(&client.cache_key(&options))
        .await
        .unwrap()
        .expect("entry stored after body end");
    assert_eq!(entry.data, A_HTML);
    assert_eq!(entry.last_modified(), Some(BASELINE));
    assert_eq!(entry.headers.get("content-type").map(String::as_str), Some("text/html"));
    assert_eq!(entry.method.as_deref(), Some("GET"));
    assert_eq!(entry.url.as_deref(), Some("/A.html"));
}

#[tokio::test]
async fn unchanged_resource_is_served_from_cache() {
    let origin = spawn_origin().await;
    let (client, _) = client();

    let (_, _, first) = fetch(&client, get(&origin, "/A.html")).await;

    let response = client.request(get(&origin, "/A.html")).end().await.unwrap();
    assert_eq!(response.status_code(), 304);
    assert!(response.is_cached());
    assert_eq!(response.header("x-cached"), Some("true"));
    assert_eq!(response.header("last-modified"), Some(BASELINE));
    assert!(response.cached_entry().is_some());
    let second = response.into_body().bytes().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(origin.last_seen().if_modified_since.as_deref(), Some(BASELINE));
    assert_eq!(origin.seen().len(), 2);
}

#[tokio::test]
async fn changed_resource_replaces_the_entry() {
    let origin = spawn_origin().await;
    let (client, store) = client();
    let options = get(&origin, "/B.html");

    let (_, _, v0) = fetch(&client, options.clone()).await;
    let (status, cached, again) = fetch(&client, options.clone()).await;
    assert_eq!((status, cached), (304, true));
    assert_eq!(v0, again);

    origin.update_b();

    let (status, cached, v1) = fetch(&client, options.clone()).await;
    assert_eq!(status, 200);
    assert!(!cached);
    assert_ne!(v0, v1);
    assert_eq!(v1, origin.b_html());

    let entry = store.get(&client.cache_key(&options)).await.unwrap().unwrap();
    assert_eq!(entry.data, v1);
    assert_eq!(entry.last_modified(), Some(LATER));

    let (status, cached, hit) = fetch(&client, options).await;
    assert_eq!((status, cached), (304, true));
    assert_eq!(hit, v1);
    assert_eq!(origin.last_seen().if_modified_since.as_deref(), Some(LATER));
}

#[tokio::test]
async fn live_resource_is_refreshed_every_time() {
    let origin = spawn_origin().await;
    let (client, _) = client();

    let (_, _, first) = fetch(&client, get(&origin, "/C")).await;
    let (status, cached, second) = fetch(&client, get(&origin, "/C")).await;

    assert_eq!(status, 200);
    assert!(!cached);
    assert_eq!(first, second);
    assert_eq!(origin.last_seen().if_modified_since.as_deref(), Some(BASELINE));
}

#[tokio::test]
async fn resource_without_last_modified_is_never_cached() {
    let origin = spawn_origin().await;
    let (client, store) = client();
    let options = get(&origin, "/D.html");

    for _ in 0..2 {
        let (status, cached, _) = fetch(&client, options.clone()).await;
        assert_eq!(status, 200);
        assert!(!cached);
        assert!(origin.last_seen().if_modified_since.is_none());
    }
    assert!(store.get(&client.cache_key(&options)).await.unwrap().is_none());
}

#[tokio::test]
async fn errors_pass_through_and_are_not_stored() {
    let origin = spawn_origin().await;
    let (client, store) = client();

    for path in ["/F", "/missing.html"] {
        let options = get(&origin, path);
        let response = client.request(options.clone()).end().await.unwrap();
        let status = response.status_code();
        assert!(status == 500 || status == 404, "unexpected {status} for {path}");
        assert!(!response.is_cached());
        response.into_body().bytes().await.unwrap();

        assert!(store.get(&client.cache_key(&options)).await.unwrap().is_none());
    }

    let (status, _, body) = fetch(&client, get(&origin, "/F")).await;
    assert_eq!(status, 500);
    assert_eq!(body, "boom");
    assert!(origin.last_seen().if_modified_since.is_none());
}

#[tokio::test]
async fn binary_bodies_survive_the_cache_intact() {
    let origin = spawn_origin().await;
    let (client, _) = client();
    let expected = common::jpeg_bytes();

    let (_, _, live) = fetch(&client, get(&origin, "/E.jpg")).await;
    assert_eq!(&live[..], &expected[..]);

    let (status, cached, hit) = fetch(&client, get(&origin, "/E.jpg")).await;
    assert_eq!((status, cached), (304, true));
    assert_eq!(&hit[..], &expected[..]);
}

#[tokio::test]
async fn body_is_stored_even_when_the_caller_never_reads_it() {
    let origin = spawn_origin().await;
    let (client, store) = client();
    let options = get(&origin, "/E.jpg");

    let response = client.request(options.clone()).end().await.unwrap();
    assert_eq!(response.status_code(), 200);
    drop(response);

    let key = client.cache_key(&options);
    let mut stored = None;
    for _ in 0..50 {
        stored = store.get(&key).await.unwrap();
        if stored.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let entry = stored.expect("entry stored without the body being read");
    assert_eq!(&entry.data[..], &common::jpeg_bytes()[..]);

    let (status, cached, hit) = fetch(&client, options).await;
    assert_eq!((status, cached), (304, true));
    assert_eq!(&hit[..], &common::jpeg_bytes()[..]);
}

#[tokio::test]
async fn chunked_body_and_trailers_are_replayed() {
    let origin = spawn_origin().await;
    let (client, store) = client();
    let options = get(&origin, "/T.txt");

    let mut live = client.request(options.clone()).end().await.unwrap();
    assert_eq!(live.body_mut().read_to_end().await.unwrap(), "chunked text");
    assert_eq!(live.trailers().and_then(|t| t.get("x-checksum")), Some("abc123"));

    let entry = store.get(&client.cache_key(&options)).await.unwrap().unwrap();
    assert_eq!(entry.data, "chunked text");
    assert_eq!(entry.trailers.get("x-checksum").map(String::as_str), Some("abc123"));

    let mut hit = client.request(options).end().await.unwrap();
    assert!(hit.is_cached());
    assert_eq!(hit.body_mut().read_to_end().await.unwrap(), "chunked text");
}

#[tokio::test]
async fn non_cacheable_requests_bypass_the_cache() {
    let origin = spawn_origin().await;
    let (client, store) = client();

    let plain = RequestOptions::get("127.0.0.1", origin.port(), "/A.html");
    for _ in 0..2 {
        let (status, cached, _) = fetch(&client, plain.clone()).await;
        assert_eq!((status, cached), (200, false));
        assert!(origin.last_seen().if_modified_since.is_none());
    }
    assert!(store.get(&client.cache_key(&plain)).await.unwrap().is_none());

    let post = RequestOptions::new(Method::Post, "127.0.0.1", origin.port(), "/A.html").cacheable(true);
    let mut request = client.request(post.clone());
    assert!(!request.is_cacheable());
    request.write("payload");
    request.end().await.unwrap().into_body().bytes().await.unwrap();
    assert_eq!(origin.last_seen().method, "POST");
    assert!(store.get(&client.cache_key(&post)).await.unwrap().is_none());
}

#[tokio::test]
async fn head_requests_are_cached_separately() {
    let origin = spawn_origin().await;
    let (client, store) = client();
    let head = RequestOptions::new(Method::Head, "127.0.0.1", origin.port(), "/A.html").cacheable(true);

    let (status, cached, body) = fetch(&client, head.clone()).await;
    assert_eq!((status, cached), (200, false));
    assert!(body.is_empty());
    assert!(store.get(&client.cache_key(&head)).await.unwrap().is_some());

    let (status, cached, _) = fetch(&client, head).await;
    assert_eq!((status, cached), (304, true));
    assert_eq!(origin.last_seen().method, "HEAD");

    // The GET slot is untouched by HEAD traffic.
    let (status, cached, body) = fetch(&client, get(&origin, "/A.html")).await;
    assert_eq!((status, cached), (200, false));
    assert_eq!(body, A_HTML);
}

#[tokio::test]
async fn hosts_get_separate_slots_by_default() {
    let origin = spawn_origin().await;
    let (client, _) = client();

    fetch(&client, get(&origin, "/A.html")).await;

    let other_host = RequestOptions::get("localhost", origin.port(), "/A.html").cacheable(true);
    let (status, cached, _) = fetch(&client, other_host).await;
    assert_eq!((status, cached), (200, false));
    assert!(origin.last_seen().if_modified_since.is_none());
}

#[tokio::test]
async fn hosts_share_slots_when_host_is_left_out_of_the_key() {
    let origin = spawn_origin().await;
    let (client, _) = client_with(CacheConfig::default().include_host_in_key(false));

    fetch(&client, get(&origin, "/A.html")).await;

    let other_host = RequestOptions::get("localhost", origin.port(), "/A.html").cacheable(true);
    let (status, cached, body) = fetch(&client, other_host).await;
    assert_eq!((status, cached), (304, true));
    assert_eq!(body, A_HTML);
}

#[tokio::test]
async fn authorization_partitions_the_cache() {
    let origin = spawn_origin().await;
    let (client, _) = client();

    fetch(&client, get(&origin, "/A.html").header("Authorization", "Bearer alice")).await;

    let (status, cached, _) =
        fetch(&client, get(&origin, "/A.html").header("Authorization", "Bearer bob")).await;
    assert_eq!((status, cached), (200, false));

    let (status, cached, _) =
        fetch(&client, get(&origin, "/A.html").header("Authorization", "Bearer alice")).await;
    assert_eq!((status, cached), (304, true));
}

#[tokio::test]
async fn expired_entries_are_not_revalidated() {
    let origin = spawn_origin().await;
    let (client, _) = client_with(CacheConfig::default().cache_ttl(1));

    fetch(&client, get(&origin, "/A.html")).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let (status, cached, body) = fetch(&client, get(&origin, "/A.html")).await;
    assert_eq!((status, cached), (200, false));
    assert_eq!(body, A_HTML);
    assert!(origin.last_seen().if_modified_since.is_none());
}

#[tokio::test]
async fn decorators_without_a_store_share_the_global_one() {
    let origin = spawn_origin().await;
    let first = CachedTransport::new(TcpTransport::new(), CacheConfig::default());
    let second = CachedTransport::for_protocol("http", CacheConfig::default()).unwrap();

    fetch(&first, get(&origin, "/A.html")).await;
    let (status, cached, body) = fetch(&second, get(&origin, "/A.html")).await;
    assert_eq!((status, cached), (304, true));
    assert_eq!(body, A_HTML);

    // An injected store sees none of it.
    let (isolated, _) = client();
    let (status, cached, _) = fetch(&isolated, get(&origin, "/A.html")).await;
    assert_eq!((status, cached), (200, false));
}

#[tokio::test]
async fn decorator_can_be_used_as_a_plain_transport() {
    let origin = spawn_origin().await;
    let (client, _) = client();
    let transport: Arc<dyn Transport> = Arc::new(client);

    for expected in [200, 304] {
        let response = transport.send(get(&origin, "/A.html"), Bytes::new()).await.unwrap();
        assert_eq!(response.status_code(), expected);
        assert_eq!(response.into_body().bytes().await.unwrap(), A_HTML);
    }
}

/// A store that is always down.
struct UnavailableStore;

impl CacheStore for UnavailableStore {
    fn get<'a>(&'a self, _key: &'a CacheKey) -> BoxFuture<'a, CacheResult<Option<Arc<CacheEntry>>>> {
        Box::pin(async { Err(CacheError::Unavailable("connection refused".into())) })
    }

    fn set(
        &self,
        _key: CacheKey,
        _entry: Arc<CacheEntry>,
        _ttl: Option<Duration>,
    ) -> BoxFuture<'_, CacheResult<()>> {
        Box::pin(async { Err(CacheError::Unavailable("connection refused".into())) })
    }
}

#[tokio::test]
async fn store_failures_never_reach_the_caller() {
    let origin = spawn_origin().await;
    let client = CachedTransport::with_store(
        TcpTransport::new(),
        CacheConfig::default(),
        Arc::new(UnavailableStore),
    );

    for _ in 0..2 {
        let (status, cached, body) = fetch(&client, get(&origin, "/A.html")).await;
        assert_eq!((status, cached), (200, false));
        assert_eq!(body, A_HTML);
        assert!(origin.last_seen().if_modified_since.is_none());
    }
}

#[tokio::test]
async fn transport_errors_are_returned_unchanged() {
    common::init_tracing();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (client, _) = client();
    let options = RequestOptions::get("127.0.0.1", port, "/A.html").cacheable(true);
    let err = client.request(options).end().await.unwrap_err();
    assert!(matches!(err, revalidate::TransportError::Connect { .. }), "{err}");
}
