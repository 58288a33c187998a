#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use arena_server::collaborators::memory::MemoryCollaborators;
use arena_server::config::Config;
use arena_server::state::AppState;

pub struct TestApp {
    pub app: Router,
    pub state: Arc<AppState>,
    pub memory: MemoryCollaborators,
}

/// App on an in-memory database with recording collaborators.
pub async fn test_app() -> TestApp {
    test_app_with(Config::in_memory()).await
}

pub async fn test_app_with(config: Config) -> TestApp {
    let memory = MemoryCollaborators::default();
    let (app, state) = arena_server::build_app(config, memory.collaborators())
        .await
        .unwrap();
    TestApp { app, state, memory }
}

/// Serve the app on a random port, return the base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{}", port)
}
