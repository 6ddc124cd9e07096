#[cfg(test)]
mod tests {
    use crate::app::{create_app, AppState};
    use axum::http::StatusCode;
    use axum::Router;
    use axum_test::TestServer;
    use serde_json::Value;
    use switchyard_core::{Config, Settings};

    fn test_config(backends: Vec<String>) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            backends,
            settings: Settings::default(),
        }
    }

    async fn test_state(backends: Vec<String>) -> AppState {
        AppState::new(test_config(backends)).await.unwrap()
    }

    fn demote(state: &AppState, address: &str) {
        let registry = state.service.registry();
        for _ in 0..3 {
            registry.record_probe_result(address, false);
        }
    }

    async fn free_port_address() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        address
    }

    async fn spawn_backend() -> (String, tokio::task::JoinHandle<()>) {
        let app = Router::new().fallback(|| async { "hello from backend" });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (address, handle)
    }

    #[tokio::test]
    async fn lb_health_reports_healthy_for_a_fresh_pool() {
        let state = test_state(vec!["127.0.0.1:8001".to_string()]).await;
        let server = TestServer::new(create_app(state)).unwrap();

        let response = server.get("/lb-health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend_servers"], 1);
    }

    #[tokio::test]
    async fn lb_health_reports_degraded_when_all_backends_are_down() {
        let address = "127.0.0.1:8001".to_string();
        let state = test_state(vec![address.clone()]).await;
        demote(&state, &address);
        let server = TestServer::new(create_app(state)).unwrap();

        let response = server.get("/lb-health").await;
        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.json::<Value>()["status"], "degraded");
    }

    #[tokio::test]
    async fn proxy_returns_503_with_json_body_when_no_backend_is_healthy() {
        let address = "127.0.0.1:8001".to_string();
        let state = test_state(vec![address.clone()]).await;
        demote(&state, &address);
        let server = TestServer::new(create_app(state)).unwrap();

        let response = server.get("/profile").await;
        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("no healthy backend"));
    }

    #[tokio::test]
    async fn proxy_returns_502_when_the_backend_refuses_connections() {
        let address = free_port_address().await;
        let state = test_state(vec![address]).await;
        let server = TestServer::new(create_app(state)).unwrap();

        let response = server.get("/anything").await;
        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["error"]["status"], 502);
    }

    #[tokio::test]
    async fn proxy_passes_the_backend_response_through_with_proxy_headers() {
        let (address, backend) = spawn_backend().await;
        let state = test_state(vec![address.clone()]).await;
        let server = TestServer::new(create_app(state)).unwrap();

        let response = server.get("/some/deep/path").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "hello from backend");
        assert_eq!(
            response.headers().get("x-backend-server").unwrap(),
            address.as_str()
        );
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );

        backend.abort();
    }

    #[tokio::test]
    async fn stats_count_proxied_traffic_and_failures() {
        let (address, backend) = spawn_backend().await;
        let state = test_state(vec![address]).await;
        let server = TestServer::new(create_app(state)).unwrap();

        for _ in 0..3 {
            server.get("/page").await;
        }

        let response = server.get("/lb-stats").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        // three proxied requests plus this stats call
        assert_eq!(body["load_balancer"]["total_requests"], 4);
        assert_eq!(body["load_balancer"]["failed_requests"], 0);
        assert_eq!(body["load_balancer"]["success_rate"], 100.0);
        assert_eq!(body["load_balancer"]["requests_per_second"], 0.4);
        assert_eq!(body["health_check"]["healthy_servers"], 1);

        backend.abort();
    }

    #[tokio::test]
    async fn failed_forwards_show_up_in_the_success_rate() {
        let address = free_port_address().await;
        let state = test_state(vec![address]).await;
        let server = TestServer::new(create_app(state)).unwrap();

        let response = server.get("/x").await;
        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);

        let body: Value = server.get("/lb-stats").await.json::<Value>();
        assert_eq!(body["load_balancer"]["total_requests"], 2);
        assert_eq!(body["load_balancer"]["failed_requests"], 1);
        assert_eq!(body["load_balancer"]["success_rate"], 50.0);
    }

    #[tokio::test]
    async fn reset_stats_zeroes_counters_but_leaves_health_alone() {
        let address = "127.0.0.1:8001".to_string();
        let state = test_state(vec![address.clone()]).await;
        demote(&state, &address);
        let server = TestServer::new(create_app(state)).unwrap();

        // generate some failed traffic first
        server.get("/a").await;
        server.get("/b").await;

        let response = server.post("/reset-stats").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>()["status"], "ok");

        let body: Value = server.get("/lb-stats").await.json::<Value>();
        // only the stats call itself has been counted since the reset
        assert_eq!(body["load_balancer"]["total_requests"], 1);
        assert_eq!(body["load_balancer"]["failed_requests"], 0);
        // the demoted backend is still demoted
        assert_eq!(body["health_check"]["healthy_servers"], 0);

        let health = server.get("/lb-health").await;
        assert_eq!(health.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn requests_rotate_across_the_healthy_pool() {
        let (addr_a, backend_a) = spawn_backend().await;
        let (addr_b, backend_b) = spawn_backend().await;
        let state = test_state(vec![addr_a.clone(), addr_b.clone()]).await;
        let server = TestServer::new(create_app(state)).unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            let response = server.get("/rotate").await;
            seen.push(
                response
                    .headers()
                    .get("x-backend-server")
                    .unwrap()
                    .to_str()
                    .unwrap()
                    .to_string(),
            );
        }
        assert_eq!(seen, vec![addr_a.clone(), addr_b.clone(), addr_a, addr_b]);

        backend_a.abort();
        backend_b.abort();
    }
}
