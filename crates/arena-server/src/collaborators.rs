//! Outbound calls to the stat, chat and notification services.
//!
//! Every call made from here is best-effort from the core's point of view:
//! local state is committed before any collaborator is contacted, and
//! failures are retried a bounded number of times before being logged.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arena_core::ArenaError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: i64,
    pub name: String,
    /// Session the room belongs to; 0 for rooms not bound to a session.
    #[serde(default)]
    pub game_id: i64,
}

#[async_trait]
pub trait StatService: Send + Sync {
    async fn create_stat(&self, game_id: i64, winner_id: i64, loser_id: i64)
    -> Result<i64, ArenaError>;
}

#[async_trait]
pub trait ChatService: Send + Sync {
    async fn create(&self, name: &str, game_id: i64) -> Result<ChatRoom, ArenaError>;
    async fn add_user(&self, chat_room_id: i64, user_id: i64) -> Result<(), ArenaError>;
    async fn destroy(&self, chat_room_id: i64) -> Result<(), ArenaError>;
    async fn list_rooms(&self) -> Result<Vec<ChatRoom>, ArenaError>;
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn create(&self, user_id: i64, message: &str) -> Result<(), ArenaError>;
}

/// The set of collaborators the core talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub stat: Arc<dyn StatService>,
    pub chat: Arc<dyn ChatService>,
    pub notification: Arc<dyn NotificationService>,
}

/// Index rooms by the session they belong to. Rooms without a session are
/// skipped; when several rooms claim one session the first one wins.
pub fn rooms_by_game(rooms: Vec<ChatRoom>) -> HashMap<i64, ChatRoom> {
    let mut index = HashMap::new();
    for room in rooms.into_iter().filter(|r| r.game_id != 0) {
        index.entry(room.game_id).or_insert(room);
    }
    index
}

/// Run `op` up to `attempts` times, sleeping briefly between tries.
pub async fn with_retry<T, F, Fut>(
    label: &str,
    attempts: u32,
    mut op: F,
) -> Result<T, ArenaError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ArenaError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts => {
                tracing::debug!(call = label, attempt, error = %e, "collaborator call failed, retrying");
                tokio::time::sleep(retry_delay()).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn retry_delay() -> Duration {
    use rand::RngExt;
    let mut rng = rand::rng();
    Duration::from_millis(rng.random_range(20..80u64))
}

fn http_err(call: &str, e: reqwest::Error) -> ArenaError {
    ArenaError::Internal(format!("{} failed: {}", call, e))
}

// ── HTTP clients ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: i64,
}

/// Stat service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStatService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStatService {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl StatService for HttpStatService {
    async fn create_stat(
        &self,
        game_id: i64,
        winner_id: i64,
        loser_id: i64,
    ) -> Result<i64, ArenaError> {
        let body: IdResponse = self
            .client
            .post(format!("{}/stats", self.base_url))
            .json(&serde_json::json!({
                "game_id": game_id,
                "winner_id": winner_id,
                "loser_id": loser_id,
            }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_err("create_stat", e))?
            .json()
            .await
            .map_err(|e| http_err("create_stat", e))?;
        Ok(body.id)
    }
}

/// Chat service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChatService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatService {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ChatService for HttpChatService {
    async fn create(&self, name: &str, game_id: i64) -> Result<ChatRoom, ArenaError> {
        self.client
            .post(format!("{}/rooms", self.base_url))
            .json(&serde_json::json!({ "name": name, "game_id": game_id }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_err("chat create", e))?
            .json()
            .await
            .map_err(|e| http_err("chat create", e))
    }

    async fn add_user(&self, chat_room_id: i64, user_id: i64) -> Result<(), ArenaError> {
        self.client
            .post(format!("{}/rooms/{}/users", self.base_url, chat_room_id))
            .json(&serde_json::json!({ "user_id": user_id }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_err("chat add_user", e))?;
        Ok(())
    }

    async fn destroy(&self, chat_room_id: i64) -> Result<(), ArenaError> {
        self.client
            .delete(format!("{}/rooms/{}", self.base_url, chat_room_id))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_err("chat destroy", e))?;
        Ok(())
    }

    async fn list_rooms(&self) -> Result<Vec<ChatRoom>, ArenaError> {
        self.client
            .get(format!("{}/rooms", self.base_url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_err("chat list_rooms", e))?
            .json()
            .await
            .map_err(|e| http_err("chat list_rooms", e))
    }
}

/// Notification service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpNotificationService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotificationService {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl NotificationService for HttpNotificationService {
    async fn create(&self, user_id: i64, message: &str) -> Result<(), ArenaError> {
        self.client
            .post(format!("{}/notifications", self.base_url))
            .json(&serde_json::json!({ "user_id": user_id, "message": message }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_err("notification create", e))?;
        Ok(())
    }
}

// ── In-memory collaborators ─────────────────────────────────────────────

/// Recording stand-ins for the remote services, used by tests and by the
/// binary when no service URLs are configured.
pub mod memory {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatRecord {
        pub id: i64,
        pub game_id: i64,
        pub winner_id: i64,
        pub loser_id: i64,
    }

    #[derive(Debug, Default)]
    pub struct MemoryStatService {
        next_id: AtomicI64,
        records: Mutex<Vec<StatRecord>>,
        failing: AtomicBool,
    }

    impl MemoryStatService {
        pub fn records(&self) -> Vec<StatRecord> {
            self.records.lock().map(|r| r.clone()).unwrap_or_default()
        }

        /// Make every subsequent call fail.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl StatService for MemoryStatService {
        async fn create_stat(
            &self,
            game_id: i64,
            winner_id: i64,
            loser_id: i64,
        ) -> Result<i64, ArenaError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ArenaError::Internal("stat service unavailable".into()));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let mut records = self
                .records
                .lock()
                .map_err(|_| ArenaError::Internal("stat records poisoned".into()))?;
            records.push(StatRecord {
                id,
                game_id,
                winner_id,
                loser_id,
            });
            Ok(id)
        }
    }

    #[derive(Debug, Default)]
    struct ChatState {
        rooms: Vec<ChatRoom>,
        members: Vec<(i64, i64)>,
        destroyed: Vec<i64>,
    }

    #[derive(Debug, Default)]
    pub struct MemoryChatService {
        next_id: AtomicI64,
        state: Mutex<ChatState>,
        failing: AtomicBool,
    }

    impl MemoryChatService {
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn rooms(&self) -> Vec<ChatRoom> {
            self.state
                .lock()
                .map(|s| s.rooms.clone())
                .unwrap_or_default()
        }

        /// `(chat_room_id, user_id)` pairs in insertion order.
        pub fn members(&self) -> Vec<(i64, i64)> {
            self.state
                .lock()
                .map(|s| s.members.clone())
                .unwrap_or_default()
        }

        pub fn destroyed(&self) -> Vec<i64> {
            self.state
                .lock()
                .map(|s| s.destroyed.clone())
                .unwrap_or_default()
        }

        fn check(&self) -> Result<(), ArenaError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(ArenaError::Internal("chat service unavailable".into()))
            } else {
                Ok(())
            }
        }

        fn lock(&self) -> Result<std::sync::MutexGuard<'_, ChatState>, ArenaError> {
            self.state
                .lock()
                .map_err(|_| ArenaError::Internal("chat state poisoned".into()))
        }
    }

    #[async_trait]
    impl ChatService for MemoryChatService {
        async fn create(&self, name: &str, game_id: i64) -> Result<ChatRoom, ArenaError> {
            self.check()?;
            let room = ChatRoom {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                name: name.to_string(),
                game_id,
            };
            self.lock()?.rooms.push(room.clone());
            Ok(room)
        }

        async fn add_user(&self, chat_room_id: i64, user_id: i64) -> Result<(), ArenaError> {
            self.check()?;
            self.lock()?.members.push((chat_room_id, user_id));
            Ok(())
        }

        async fn destroy(&self, chat_room_id: i64) -> Result<(), ArenaError> {
            self.check()?;
            let mut state = self.lock()?;
            state.rooms.retain(|r| r.id != chat_room_id);
            state.destroyed.push(chat_room_id);
            Ok(())
        }

        async fn list_rooms(&self) -> Result<Vec<ChatRoom>, ArenaError> {
            self.check()?;
            Ok(self.lock()?.rooms.clone())
        }
    }

    #[derive(Debug, Default)]
    pub struct MemoryNotificationService {
        sent: Mutex<Vec<(i64, String)>>,
    }

    impl MemoryNotificationService {
        pub fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl NotificationService for MemoryNotificationService {
        async fn create(&self, user_id: i64, message: &str) -> Result<(), ArenaError> {
            self.sent
                .lock()
                .map_err(|_| ArenaError::Internal("notifications poisoned".into()))?
                .push((user_id, message.to_string()));
            Ok(())
        }
    }

    /// Concrete handles to the in-memory services, for assertions.
    #[derive(Clone, Default)]
    pub struct MemoryCollaborators {
        pub stat: Arc<MemoryStatService>,
        pub chat: Arc<MemoryChatService>,
        pub notification: Arc<MemoryNotificationService>,
    }

    impl MemoryCollaborators {
        pub fn collaborators(&self) -> Collaborators {
            Collaborators {
                stat: self.stat.clone(),
                chat: self.chat.clone(),
                notification: self.notification.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn retry_gives_up_after_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ArenaError> = with_retry("test", 2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ArenaError::Internal("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", 3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ArenaError::Internal("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rooms_index_skips_unbound_rooms() {
        let rooms = vec![
            ChatRoom {
                id: 1,
                name: "lobby".into(),
                game_id: 0,
            },
            ChatRoom {
                id: 2,
                name: "7 vs 9".into(),
                game_id: 12,
            },
            ChatRoom {
                id: 3,
                name: "dup".into(),
                game_id: 12,
            },
        ];
        let index = rooms_by_game(rooms);
        assert_eq!(index.len(), 1);
        assert_eq!(index[&12].id, 2);
    }
}
