//! End-to-end tests for URL dispatch
//!
//! These drive the public API against local listeners and in-memory
//! candidate sources.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};

use urlconnect::{
    CandidateSource, ConnectError, ConnectResult, Context, DiscoveryProvider, Dispatcher,
    MemorySource, Node, Provider, Registry, SourceResult, Target,
};

/// Provider that counts invocations and never connects
#[derive(Default)]
struct CountingProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl Provider for CountingProvider {
    async fn connect(&self, _ctx: &Context, target: &Target) -> ConnectResult<TcpStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ConnectError::no_candidates(target.path()))
    }
}

/// Candidate source whose reads never complete
struct StalledSource;

#[async_trait]
impl CandidateSource for StalledSource {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn read(&self, _path: &str, _revision: Option<i64>) -> SourceResult<Node> {
        std::future::pending().await
    }

    async fn list_children(&self, _path: &str, _revision: Option<i64>) -> SourceResult<Vec<String>> {
        std::future::pending().await
    }
}

fn dispatcher_with(scheme: &str, provider: Arc<dyn Provider>) -> Dispatcher {
    let registry = Registry::with_defaults();
    registry.register(scheme, provider);
    Dispatcher::new(Arc::new(registry))
}

async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

async fn closed_port_url() -> String {
    format!("tcp://{}", closed_port().await)
}

#[tokio::test]
async fn test_unregistered_scheme() {
    let counting = Arc::new(CountingProvider::default());
    let dispatcher = dispatcher_with("svc", counting.clone());

    for url in ["gopher://host/1", "etcd:///services/api", "dz:///services/api"] {
        let err = dispatcher.connect(url).await.unwrap_err();
        match err {
            ConnectError::NoHandler { scheme } => assert!(url.starts_with(&scheme)),
            other => panic!("unexpected error for {url}: {other:?}"),
        }
    }
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_relative_url_rejected_before_lookup() {
    let counting = Arc::new(CountingProvider::default());
    let dispatcher = dispatcher_with("svc", counting.clone());

    for url in ["/services/api", "localhost", ""] {
        let err = dispatcher
            .connect_timeout(url, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::AbsoluteUrlRequired), "{url:?}: {err:?}");
    }

    let err = dispatcher.connect("svc://[::1:80").await.unwrap_err();
    assert!(matches!(err, ConnectError::InvalidUrl(_)), "{err:?}");
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_tcp_host_port_and_path_forms() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let dispatcher = Dispatcher::new(Arc::new(Registry::with_defaults()));

    let a = dispatcher
        .connect(&format!("tcp://127.0.0.1:{port}"))
        .await
        .unwrap();
    let b = dispatcher
        .connect_timeout(&format!("tcp://127.0.0.1/{port}"), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(a.peer_addr().unwrap(), b.peer_addr().unwrap());
}

#[tokio::test]
async fn test_tcp_ipv6_loopback() {
    // Hosts without IPv6 loopback cannot run this test
    let Ok(listener) = TcpListener::bind("[::1]:0").await else {
        return;
    };
    let port = listener.local_addr().unwrap().port();
    let dispatcher = Dispatcher::new(Arc::new(Registry::with_defaults()));

    for url in [format!("tcp://[::1]:{port}"), format!("tcp://[::1]/{port}")] {
        let stream = dispatcher.connect(&url).await.unwrap();
        let peer = stream.peer_addr().unwrap();
        assert!(peer.is_ipv6());
        assert_eq!(peer.port(), port);
    }
}

#[tokio::test]
async fn test_discovery_reaches_the_live_candidate() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live = listener.local_addr().unwrap();

    let source = MemorySource::new();
    source.put("/services/api/live", live.to_string());
    for i in 0..4 {
        source.put(format!("/services/api/dead{i}"), closed_port().await);
    }
    let dispatcher = dispatcher_with("mem", Arc::new(DiscoveryProvider::new(source)));

    for _ in 0..10 {
        let stream = dispatcher
            .connect_timeout("mem:///services/api", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(stream.peer_addr().unwrap(), live);
    }
}

#[tokio::test]
async fn test_discovery_path_is_decoded() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live = listener.local_addr().unwrap();

    let source = MemorySource::new();
    source.put("/services/my api", live.to_string());
    let dispatcher = dispatcher_with("mem", Arc::new(DiscoveryProvider::new(source)));

    for url in ["mem:///services/my api", "mem:///services/my%20api"] {
        let stream = dispatcher.connect(url).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), live);
    }
}

#[tokio::test]
async fn test_discovery_without_candidates() {
    let source = MemorySource::new();
    source.put("/services/api/blank", "");
    let dispatcher = dispatcher_with("mem", Arc::new(DiscoveryProvider::new(source)));

    for _ in 0..3 {
        let err = dispatcher.connect("mem:///services/api").await.unwrap_err();
        match err {
            ConnectError::NoCandidates { path } => assert_eq!(path, "/services/api"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_discovery_unavailable_is_distinct() {
    let dispatcher = dispatcher_with(
        "mem",
        Arc::new(DiscoveryProvider::new(MemorySource::new())),
    );

    let err = dispatcher.connect("mem:///services/missing").await.unwrap_err();
    assert!(err.is_discovery(), "{err:?}");
    assert!(!matches!(err, ConnectError::NoCandidates { .. }));
}

#[tokio::test]
async fn test_all_candidates_failing_reports_a_dial_error() {
    let source = MemorySource::new();
    source.put("/services/api/a", closed_port().await);
    source.put("/services/api/b", closed_port().await);
    let dispatcher = dispatcher_with("mem", Arc::new(DiscoveryProvider::new(source)));

    let err = dispatcher.connect("mem:///services/api").await.unwrap_err();
    assert!(matches!(err, ConnectError::Dial { .. }), "{err:?}");
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn test_timeout_bounds_a_stalled_lookup() {
    let dispatcher = dispatcher_with("stall", Arc::new(DiscoveryProvider::new(StalledSource)));
    let timeout = Duration::from_millis(100);

    let started = Instant::now();
    let err = dispatcher
        .connect_timeout("stall:///services/api", timeout)
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectError::DeadlineExceeded), "{err:?}");
    assert!(err.is_timeout());
    assert!(started.elapsed() < timeout + Duration::from_secs(1));
}

#[tokio::test]
async fn test_unbounded_timeout_still_connects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let dispatcher = Dispatcher::new(Arc::new(Registry::with_defaults()));

    let stream = dispatcher
        .connect_timeout(&format!("tcp://127.0.0.1:{port}"), Duration::MAX)
        .await
        .unwrap();
    assert_eq!(stream.peer_addr().unwrap().port(), port);

    let err = dispatcher
        .connect_timeout(&closed_port_url().await, Duration::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectError::Dial { .. }), "{err:?}");
}

#[tokio::test]
async fn test_caller_context_cancellation() {
    let dispatcher = dispatcher_with("stall", Arc::new(DiscoveryProvider::new(StalledSource)));
    let ctx = Context::background().with_cancel();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = dispatcher
        .connect_context(&ctx, "stall:///services/api")
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectError::Cancelled), "{err:?}");
}

#[tokio::test]
async fn test_reregistration_replaces_provider() {
    let registry = Arc::new(Registry::with_defaults());
    let dispatcher = Dispatcher::new(Arc::clone(&registry));

    let old = Arc::new(CountingProvider::default());
    registry.register("svc", old.clone());
    let _ = dispatcher.connect("svc:///a").await;
    assert_eq!(old.calls.load(Ordering::SeqCst), 1);

    let new = Arc::new(CountingProvider::default());
    registry.register("svc", new.clone());
    for _ in 0..3 {
        let _ = dispatcher.connect("svc:///a").await;
    }

    assert_eq!(old.calls.load(Ordering::SeqCst), 1);
    assert_eq!(new.calls.load(Ordering::SeqCst), 3);
}
