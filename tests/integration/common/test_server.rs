use agent_relay::adapters::metrics_handler::MetricsCollector;
use agent_relay::adapters::scripted_runtime::ScriptedRuntime;
use agent_relay::config::Settings;
use agent_relay::AppState;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct TestServer {
    pub addr: SocketAddr,
    pub base_url: String,
    pub runtime: Arc<ScriptedRuntime>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_runtime(ScriptedRuntime::chunks(&["Hello", ", world"])).await
    }

    pub async fn with_runtime(runtime: ScriptedRuntime) -> Self {
        // Create test configuration
        let mut settings = Settings::default();
        settings.server.host = "127.0.0.1".to_string();

        let runtime = Arc::new(runtime);
        let metrics = Arc::new(MetricsCollector::new().unwrap());

        // Create app
        let app = agent_relay::create_app(AppState::new(runtime.clone(), settings, metrics));

        // Start server on random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to be ready
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestServer {
            addr,
            base_url,
            runtime,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
