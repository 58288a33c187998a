pub mod collaborators;
pub mod completion;
pub mod config;
pub mod db;
pub mod matchmaker;
pub mod routes;
pub mod state;
pub mod tournament;
pub mod watchdog;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;

use crate::collaborators::memory::{
    MemoryChatService, MemoryNotificationService, MemoryStatService,
};
use crate::collaborators::{
    ChatService, Collaborators, HttpChatService, HttpNotificationService, HttpStatService,
    NotificationService, StatService,
};
use crate::config::Config;
use crate::state::AppState;

/// Build a fully configured Router + shared state.
pub async fn build_app(
    config: Config,
    collaborators: Collaborators,
) -> Result<(Router, Arc<AppState>), sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    db::init_db(&pool).await?;

    let state = Arc::new(AppState::new(pool, config, collaborators));

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/sessions", get(routes::list_ongoing_sessions))
        .route("/sessions/queue", post(routes::join_queue))
        .route("/sessions/friend", post(routes::create_friend_session))
        .route("/sessions/invite", post(routes::invite_friend))
        .route("/sessions/{id}", get(routes::get_session))
        .route("/sessions/{id}/state", put(routes::update_state))
        .route("/sessions/{id}/finish", post(routes::finish_session))
        .route(
            "/sessions/{id}/events",
            get(routes::list_events).post(routes::append_event),
        )
        .route("/players/{id}/session", get(routes::open_session_for_player))
        .route(
            "/tournaments",
            get(routes::list_rooms).post(routes::create_room),
        )
        .route(
            "/tournaments/{id}",
            get(routes::get_room).patch(routes::update_room),
        )
        .route(
            "/tournaments/{id}/users",
            get(routes::list_tournament_users).post(routes::register_user),
        )
        .route(
            "/tournaments/{id}/games",
            get(routes::list_tournament_games).post(routes::create_tournament_game),
        )
        .route("/tournaments/{id}/round", get(routes::round_status))
        .route(
            "/tournament-users/{id}",
            get(routes::get_tournament_user)
                .patch(routes::update_tournament_user)
                .delete(routes::unregister_user),
        )
        .route("/tournament-games/{id}", get(routes::get_tournament_game))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    Ok((app, state))
}

/// HTTP clients for every collaborator with a configured URL; the rest fall
/// back to in-memory recorders.
pub fn collaborators_from_config(config: &Config) -> Result<Collaborators, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(config.collaborator_timeout)
        .build()?;

    let stat: Arc<dyn StatService> = match &config.stat_url {
        Some(url) => Arc::new(HttpStatService::new(client.clone(), url.as_str())),
        None => {
            tracing::warn!("ARENA_STAT_URL unset, stats are kept in memory");
            Arc::new(MemoryStatService::default())
        }
    };
    let chat: Arc<dyn ChatService> = match &config.chat_url {
        Some(url) => Arc::new(HttpChatService::new(client.clone(), url.as_str())),
        None => {
            tracing::warn!("ARENA_CHAT_URL unset, chat rooms are kept in memory");
            Arc::new(MemoryChatService::default())
        }
    };
    let notification: Arc<dyn NotificationService> = match &config.notification_url {
        Some(url) => Arc::new(HttpNotificationService::new(client, url.as_str())),
        None => {
            tracing::warn!("ARENA_NOTIFICATION_URL unset, notifications are kept in memory");
            Arc::new(MemoryNotificationService::default())
        }
    };

    Ok(Collaborators {
        stat,
        chat,
        notification,
    })
}
