// One-time server bootstrap shared by the integration tests in a binary.
use std::{
    // `OnceLock` slots are written once and then read by every test.
    sync::{Arc, OnceLock},
    // Poll intervals for the readiness loops below.
    time::Duration,
};

// Base URL of the shared server, set once it has bound a port.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// Guards the bootstrap so concurrent tests start a single server.
static SERVER_READY: OnceLock<()> = OnceLock::new();

// Start the server on first use and return its base URL.
pub fn ensure_server() -> &'static str {
    // The first caller boots the server; later callers block here until it is up.
    SERVER_READY.get_or_init(|| {
        // Slot the server thread fills with the address it bound.
        let published_url = Arc::new(OnceLock::<String>::new());
        // Second handle moved into the server thread.
        let published_url_thread = Arc::clone(&published_url);
        // The server gets its own thread and runtime so it outlives each `#[tokio::test]`.
        std::thread::spawn(move || {
            // Dedicated multi-threaded runtime for the display sessions and axum.
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Ephemeral port; upstream endpoints stay at their defaults and are
                // expected to be unreachable, so sessions run on the local clock.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                // Read back the port the OS picked.
                let addr = listener.local_addr().expect("get local addr");
                // Hand the address to the waiting test thread.
                let _ = published_url_thread.set(format!("http://{}", addr));
                // Serves until the test binary exits.
                draw_sync::run(listener).await.expect("server failed");
            });
        });
        // Returns once the address is known and the socket accepts connections.
        wait_for_server_url_and_readiness(published_url);
    });

    // Every test in the binary talks to the same server.
    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

// Wait for the bound address, then for the listener to accept TCP connections.
fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    // The server thread publishes the URL right after binding.
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        // Short sleep instead of spinning on the slot.
        std::thread::sleep(Duration::from_millis(10));
    };

    // Share the URL with every later `ensure_server` call.
    let _ = SERVER_URL.set(base_url.clone());

    // Plain host:port for the raw TCP check.
    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    // Bounded retries: binding and serving start on another thread.
    for _ in 0..100 {
        // A successful connect means axum is accepting.
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    // Startup never reached an accepting socket.
    panic!("server did not become ready in time");
}

// Poll GET /state until the first frame has been rendered.
pub async fn wait_for_state(client: &reqwest::Client, base_url: &str) -> serde_json::Value {
    // `/state` answers 503 until the display session renders its first tick.
    for _ in 0..100 {
        let res = client
            .get(format!("{base_url}/state"))
            .send()
            .await
            .expect("state request should succeed");
        if res.status() == reqwest::StatusCode::OK {
            return res.json().await.expect("state body should be json");
        }
        // Ticks are one second apart in the real server.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("no frame rendered in time");
}
