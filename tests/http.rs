use std::net::SocketAddr;
use std::sync::Arc;

use larder::Server;
use larder::app::build_router;
use larder::cache::{Cache, KeyNamespace, MemoryStore};
use larder::cookbook::Cookbook;
use larder::database::{Database, seed_demo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn spawn_app() -> (SocketAddr, oneshot::Sender<()>) {
    let db = Database::open_in_memory().unwrap();
    seed_demo(&db).unwrap();
    let cache = Cache::new(Arc::new(MemoryStore::new()), KeyNamespace::default(), None);
    let router = Arc::new(build_router(Arc::new(Cookbook::new(db, cache, true))));

    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .run_until(
                move |req| {
                    let router = Arc::clone(&router);
                    async move { router.dispatch(req).await }
                },
                async {
                    let _ = rx.await;
                },
            )
            .await
            .unwrap();
    });
    (addr, tx)
}

async fn send(addr: SocketAddr, method: &str, path: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request =
        format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();

    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|line| line.split(' ').nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap();
    let headers = lines
        .filter_map(|line| line.split_once(": "))
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
    Reply {
        status,
        headers,
        body: body.to_owned(),
    }
}

#[tokio::test]
async fn cached_endpoint_hits_after_first_request() {
    let (addr, _shutdown) = spawn_app().await;

    let first = send(addr, "GET", "/recipes").await;
    assert_eq!(first.status, 200);
    assert_eq!(first.header("X-Query-Count"), Some("3"));
    assert_eq!(first.header("X-Cache"), Some("miss"));
    assert_eq!(first.header("Content-Type"), Some("application/json"));

    let second = send(addr, "GET", "/recipes").await;
    assert_eq!(second.header("X-Query-Count"), Some("0"));
    assert_eq!(second.header("X-Cache"), Some("hit"));
    assert_eq!(second.body, first.body);
}

#[tokio::test]
async fn uncached_endpoint_always_queries() {
    let (addr, _shutdown) = spawn_app().await;
    for _ in 0..2 {
        let reply = send(addr, "GET", "/recipes/uncached").await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.header("X-Query-Count"), Some("3"));
        assert_eq!(reply.header("X-Cache"), Some("bypass"));
    }
}

#[tokio::test]
async fn clear_endpoint_resets_the_cache() {
    let (addr, _shutdown) = spawn_app().await;
    send(addr, "GET", "/recipes").await;

    let cleared = send(addr, "POST", "/cache/clear").await;
    assert_eq!(cleared.status, 204);
    assert_eq!(cleared.header("X-Cache-Ops"), Some("1"));

    let reply = send(addr, "GET", "/recipes").await;
    assert_eq!(reply.header("X-Cache"), Some("miss"));
    assert_eq!(reply.header("X-Query-Count"), Some("3"));
}

#[tokio::test]
async fn keep_alive_connection_serves_several_requests() {
    let (addr, _shutdown) = spawn_app().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"GET /recipes HTTP/1.1\r\nHost: localhost\r\n\r\n\
              GET /recipes HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await
        .unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();
    assert_eq!(text.matches("HTTP/1.1 200 OK\r\n").count(), 2);
    assert!(text.contains("X-Cache: miss\r\n"));
    assert!(text.contains("X-Cache: hit\r\n"));
}

#[tokio::test]
async fn unknown_path_is_404() {
    let (addr, _shutdown) = spawn_app().await;
    let reply = send(addr, "GET", "/foods").await;
    assert_eq!(reply.status, 404);
}

#[tokio::test]
async fn oversized_content_length_is_refused() {
    let (addr, _shutdown) = spawn_app().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"POST /cache/clear HTTP/1.1\r\nHost: localhost\r\n\
              Content-Length: 18446744073709551615\r\n\r\n",
        )
        .await
        .unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();
    assert!(text.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    assert!(text.contains("Connection: close\r\n"));

    let reply = send(addr, "GET", "/recipes").await;
    assert_eq!(reply.status, 200);
}

#[tokio::test]
async fn unknown_method_is_501() {
    let (addr, _shutdown) = spawn_app().await;
    let reply = send(addr, "BREW", "/recipes").await;
    assert_eq!(reply.status, 501);
}

#[tokio::test]
async fn text_listing_names_the_recipe_on_each_line() {
    let (addr, _shutdown) = spawn_app().await;
    let reply = send(addr, "GET", "/recipes?format=text").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body.lines().next(), Some("Pancakes: 1.500 cup Flour"));
}
