mod upstream;

use std::net::SocketAddr;
use std::time::Duration;

use config::Config;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use server::ServeConfig;
use tokio::net::TcpListener;
use tokio::time::timeout;

pub use upstream::{MockUpstream, ReceivedRequest, RunningUpstream};

/// Test client for making HTTP requests to the test server
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    /// Create a new test client for the given base URL
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Send a POST request to the given path with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    /// Send a POST request and collect the data of every server-sent event in the response.
    pub async fn post_events<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> Vec<String> {
        self.post(path, body)
            .await
            .bytes_stream()
            .eventsource()
            .map(|event| event.unwrap().data)
            .collect()
            .await
    }
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    pub client: TestClient,
    pub address: SocketAddr,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with the given TOML configuration
    pub async fn start(config_toml: &str) -> Self {
        // Parse the configuration from TOML
        let config: Config = toml::from_str(config_toml).unwrap();

        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let serve_config = ServeConfig {
            listen_address: address,
            config,
        };

        // Start the server in a background task
        let (tx, mut rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(async move {
            // Drop the listener so the server can bind to the address
            drop(listener);

            let _ = tx.send(server::serve(serve_config).await);
        });

        // Wait for the server to start up or fail
        tokio::time::sleep(Duration::from_millis(100)).await;

        if let Ok(Err(e)) = rx.try_recv() {
            eprintln!("Server failed to start: {e}");
            std::process::exit(1);
        }

        let client = TestClient::new(format!("http://{address}"));

        // Verify the server is actually running by making a simple request
        let mut retries = 10;
        while retries > 0 {
            if timeout(Duration::from_millis(100), client.get("/")).await.is_ok() {
                break;
            }
            retries -= 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestServer {
            client,
            address,
            _handle: handle,
        }
    }

    /// Start a proxy in front of `upstream`, with `extra_toml` appended to the configuration.
    pub async fn in_front_of(upstream: &RunningUpstream, extra_toml: &str) -> Self {
        let config = format!("[upstream]\nurl = \"{}\"\n\n{extra_toml}", upstream.url());
        Self::start(&config).await
    }
}
