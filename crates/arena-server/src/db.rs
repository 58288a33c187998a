use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use arena_core::{
    ArenaError, Session, SessionEvent, SessionState, TournamentGameMapping, TournamentRoom,
    TournamentUser, TournamentUserState,
};

/// Create all tables if they don't exist.
pub async fn init_db(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY,
            state TEXT NOT NULL,
            points_a INTEGER NOT NULL DEFAULT 0,
            points_b INTEGER NOT NULL DEFAULT 0,
            player_a_id INTEGER NOT NULL,
            player_b_id INTEGER,
            finished INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS sessions_open_idx
         ON sessions (finished, state, player_b_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS session_events (
            id INTEGER PRIMARY KEY,
            session_id INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            event_data TEXT NOT NULL DEFAULT '',
            timestamp TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tournament_rooms (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            size INTEGER NOT NULL,
            chat_room_id INTEGER NOT NULL,
            started INTEGER NOT NULL DEFAULT 0,
            start_time TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tournament_users (
            id INTEGER PRIMARY KEY,
            room_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            play_order INTEGER NOT NULL,
            games_played INTEGER NOT NULL DEFAULT 0,
            state TEXT NOT NULL DEFAULT 'WAITING',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (room_id, user_id),
            UNIQUE (room_id, play_order),
            FOREIGN KEY (room_id) REFERENCES tournament_rooms(id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tournament_game_mappings (
            id INTEGER PRIMARY KEY,
            room_id INTEGER NOT NULL,
            session_id INTEGER NOT NULL UNIQUE,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (room_id) REFERENCES tournament_rooms(id),
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Map a storage failure into the caller-facing taxonomy.
pub fn db_err(e: sqlx::Error) -> ArenaError {
    ArenaError::Internal(format!("database error: {}", e))
}

pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|d| d.is_unique_violation())
        .unwrap_or(false)
}

pub fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ArenaError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ArenaError::Internal(format!("corrupt timestamp {:?}: {}", raw, e)))
}

// ── Sessions ────────────────────────────────────────────────────────────

const SESSION_COLUMNS: &str = "id, state, points_a, points_b, player_a_id, player_b_id, \
     finished, version, created_at, updated_at";

fn session_from_row(r: &SqliteRow) -> Result<Session, ArenaError> {
    Ok(Session {
        id: r.get("id"),
        state: r.get::<String, _>("state").parse()?,
        points_a: r.get("points_a"),
        points_b: r.get("points_b"),
        player_a_id: r.get("player_a_id"),
        player_b_id: r.get::<Option<i64>, _>("player_b_id"),
        finished: r.get("finished"),
        version: r.get("version"),
        created_at: parse_timestamp(&r.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&r.get::<String, _>("updated_at"))?,
    })
}

fn sessions_from_rows(rows: &[SqliteRow]) -> Result<Vec<Session>, ArenaError> {
    rows.iter().map(session_from_row).collect()
}

pub async fn get_session(pool: &SqlitePool, id: i64) -> Result<Option<Session>, ArenaError> {
    let row = sqlx::query(&format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)?;

    row.as_ref().map(session_from_row).transpose()
}

/// The player's unfinished queue (non-FRIEND) session, if any.
pub async fn find_open_queue_session(
    pool: &SqlitePool,
    player_id: i64,
) -> Result<Option<Session>, ArenaError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sessions
         WHERE finished = 0 AND state != 'FRIEND'
           AND (player_a_id = ?1 OR player_b_id = ?1)
         ORDER BY id ASC LIMIT 1",
        SESSION_COLUMNS
    ))
    .bind(player_id)
    .fetch_optional(pool)
    .await
    .map_err(db_err)?;

    row.as_ref().map(session_from_row).transpose()
}

/// The player's most recent unfinished session of any kind.
pub async fn find_open_session(
    pool: &SqlitePool,
    player_id: i64,
) -> Result<Option<Session>, ArenaError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sessions
         WHERE finished = 0 AND (player_a_id = ?1 OR player_b_id = ?1)
         ORDER BY id DESC LIMIT 1",
        SESSION_COLUMNS
    ))
    .bind(player_id)
    .fetch_optional(pool)
    .await
    .map_err(db_err)?;

    row.as_ref().map(session_from_row).transpose()
}

/// Every unfinished session either player takes part in.
pub async fn list_open_sessions_for_players(
    pool: &SqlitePool,
    a: i64,
    b: i64,
) -> Result<Vec<Session>, ArenaError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sessions
         WHERE finished = 0
           AND (player_a_id IN (?1, ?2) OR player_b_id IN (?1, ?2))
         ORDER BY id ASC",
        SESSION_COLUMNS
    ))
    .bind(a)
    .bind(b)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    sessions_from_rows(&rows)
}

/// Open WAITING sessions with a free second slot, oldest first.
pub async fn list_waiting_sessions(
    pool: &SqlitePool,
    exclude_player: i64,
    limit: i64,
) -> Result<Vec<Session>, ArenaError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sessions
         WHERE finished = 0 AND state = 'WAITING' AND player_b_id IS NULL
           AND player_a_id != ?1
         ORDER BY id ASC LIMIT ?2",
        SESSION_COLUMNS
    ))
    .bind(exclude_player)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    sessions_from_rows(&rows)
}

pub async fn list_ongoing_sessions(pool: &SqlitePool) -> Result<Vec<Session>, ArenaError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE finished = 0 ORDER BY id ASC",
        SESSION_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    sessions_from_rows(&rows)
}

/// Claim the free slot of a WAITING session. Returns false if another
/// writer got there first or the player already holds a queue session.
pub async fn claim_waiting_session(
    pool: &SqlitePool,
    session_id: i64,
    expected_version: i64,
    player_id: i64,
    now: DateTime<Utc>,
) -> Result<bool, ArenaError> {
    let result = sqlx::query(
        "UPDATE sessions
         SET player_b_id = ?1, state = 'READY', version = version + 1, updated_at = ?2
         WHERE id = ?3 AND version = ?4
           AND state = 'WAITING' AND player_b_id IS NULL AND finished = 0
           AND NOT EXISTS (
               SELECT 1 FROM sessions
               WHERE finished = 0 AND state != 'FRIEND'
                 AND (player_a_id = ?1 OR player_b_id = ?1)
           )",
    )
    .bind(player_id)
    .bind(timestamp(now))
    .bind(session_id)
    .bind(expected_version)
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() == 1)
}

/// Insert a fresh WAITING session unless the player already holds an open
/// queue session. Returns the new id.
pub async fn insert_waiting_session(
    pool: &SqlitePool,
    player_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<i64>, ArenaError> {
    let result = sqlx::query(
        "INSERT INTO sessions
            (state, points_a, points_b, player_a_id, player_b_id, finished, version, created_at, updated_at)
         SELECT 'WAITING', 0, 0, ?1, NULL, 0, 0, ?2, ?2
         WHERE NOT EXISTS (
             SELECT 1 FROM sessions
             WHERE finished = 0 AND state != 'FRIEND'
               AND (player_a_id = ?1 OR player_b_id = ?1)
         )",
    )
    .bind(player_id)
    .bind(timestamp(now))
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok((result.rows_affected() == 1).then(|| result.last_insert_rowid()))
}

/// Insert a FRIEND session unless either player holds any open session.
pub async fn insert_friend_session(
    pool: &SqlitePool,
    player_a: i64,
    player_b: i64,
    now: DateTime<Utc>,
) -> Result<Option<i64>, ArenaError> {
    let result = sqlx::query(
        "INSERT INTO sessions
            (state, points_a, points_b, player_a_id, player_b_id, finished, version, created_at, updated_at)
         SELECT 'FRIEND', 0, 0, ?1, ?2, 0, 0, ?3, ?3
         WHERE NOT EXISTS (
             SELECT 1 FROM sessions
             WHERE finished = 0
               AND (player_a_id IN (?1, ?2) OR player_b_id IN (?1, ?2))
         )",
    )
    .bind(player_a)
    .bind(player_b)
    .bind(timestamp(now))
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok((result.rows_affected() == 1).then(|| result.last_insert_rowid()))
}

/// Compare-and-swap a session's state.
pub async fn update_session_state(
    pool: &SqlitePool,
    session_id: i64,
    expected_version: i64,
    state: SessionState,
    now: DateTime<Utc>,
) -> Result<bool, ArenaError> {
    let result = sqlx::query(
        "UPDATE sessions
         SET state = ?1, finished = ?2, version = version + 1, updated_at = ?3
         WHERE id = ?4 AND version = ?5 AND finished = 0",
    )
    .bind(state.as_str())
    .bind(state.is_terminal())
    .bind(timestamp(now))
    .bind(session_id)
    .bind(expected_version)
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() == 1)
}

/// Record the final score. Succeeds for exactly one caller per session.
pub async fn finish_session(
    pool: &SqlitePool,
    session_id: i64,
    expected_version: i64,
    points_a: i32,
    points_b: i32,
    state: SessionState,
    now: DateTime<Utc>,
) -> Result<bool, ArenaError> {
    let result = sqlx::query(
        "UPDATE sessions
         SET points_a = ?1, points_b = ?2, state = ?3, finished = 1,
             version = version + 1, updated_at = ?4
         WHERE id = ?5 AND version = ?6 AND finished = 0",
    )
    .bind(points_a)
    .bind(points_b)
    .bind(state.as_str())
    .bind(timestamp(now))
    .bind(session_id)
    .bind(expected_version)
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() == 1)
}

// ── Session events ──────────────────────────────────────────────────────

fn event_from_row(r: &SqliteRow) -> Result<SessionEvent, ArenaError> {
    Ok(SessionEvent {
        id: r.get("id"),
        session_id: r.get("session_id"),
        event_type: r.get("event_type"),
        event_data: r.get("event_data"),
        timestamp: parse_timestamp(&r.get::<String, _>("timestamp"))?,
    })
}

pub async fn insert_event(
    pool: &SqlitePool,
    session_id: i64,
    event_type: &str,
    event_data: &str,
    now: DateTime<Utc>,
) -> Result<SessionEvent, ArenaError> {
    let result = sqlx::query(
        "INSERT INTO session_events (session_id, event_type, event_data, timestamp)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(session_id)
    .bind(event_type)
    .bind(event_data)
    .bind(timestamp(now))
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok(SessionEvent {
        id: result.last_insert_rowid(),
        session_id,
        event_type: event_type.to_string(),
        event_data: event_data.to_string(),
        timestamp: now,
    })
}

pub async fn list_events(
    pool: &SqlitePool,
    session_id: i64,
) -> Result<Vec<SessionEvent>, ArenaError> {
    let rows = sqlx::query(
        "SELECT id, session_id, event_type, event_data, timestamp
         FROM session_events WHERE session_id = ?1 ORDER BY id ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.iter().map(event_from_row).collect()
}

// ── Tournament rooms ────────────────────────────────────────────────────

const ROOM_COLUMNS: &str =
    "id, name, size, chat_room_id, started, start_time, active, created_at, updated_at";

fn room_from_row(r: &SqliteRow) -> Result<TournamentRoom, ArenaError> {
    Ok(TournamentRoom {
        id: r.get("id"),
        name: r.get("name"),
        size: r.get("size"),
        chat_room_id: r.get("chat_room_id"),
        started: r.get("started"),
        start_time: parse_timestamp(&r.get::<String, _>("start_time"))?,
        active: r.get("active"),
        created_at: parse_timestamp(&r.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&r.get::<String, _>("updated_at"))?,
    })
}

pub async fn insert_room(
    pool: &SqlitePool,
    name: &str,
    size: i32,
    chat_room_id: i64,
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<TournamentRoom, ArenaError> {
    let result = sqlx::query(
        "INSERT INTO tournament_rooms
            (name, size, chat_room_id, started, start_time, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, ?4, 1, ?5, ?5)",
    )
    .bind(name)
    .bind(size)
    .bind(chat_room_id)
    .bind(timestamp(start_time))
    .bind(timestamp(now))
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok(TournamentRoom {
        id: result.last_insert_rowid(),
        name: name.to_string(),
        size,
        chat_room_id,
        started: false,
        start_time,
        active: true,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_room(pool: &SqlitePool, id: i64) -> Result<Option<TournamentRoom>, ArenaError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tournament_rooms WHERE id = ?1",
        ROOM_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(db_err)?;

    row.as_ref().map(room_from_row).transpose()
}

pub async fn list_rooms(pool: &SqlitePool) -> Result<Vec<TournamentRoom>, ArenaError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tournament_rooms ORDER BY id ASC",
        ROOM_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.iter().map(room_from_row).collect()
}

/// Write back the mutable fields of a room.
pub async fn update_room(pool: &SqlitePool, room: &TournamentRoom) -> Result<(), ArenaError> {
    sqlx::query(
        "UPDATE tournament_rooms
         SET name = ?1, started = ?2, active = ?3, updated_at = ?4
         WHERE id = ?5",
    )
    .bind(&room.name)
    .bind(room.started)
    .bind(room.active)
    .bind(timestamp(room.updated_at))
    .bind(room.id)
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok(())
}

// ── Tournament users ────────────────────────────────────────────────────

const USER_COLUMNS: &str =
    "id, room_id, user_id, play_order, games_played, state, created_at, updated_at";

fn user_from_row(r: &SqliteRow) -> Result<TournamentUser, ArenaError> {
    Ok(TournamentUser {
        id: r.get("id"),
        room_id: r.get("room_id"),
        user_id: r.get("user_id"),
        play_order: r.get("play_order"),
        games_played: r.get("games_played"),
        state: r.get::<String, _>("state").parse()?,
        created_at: parse_timestamp(&r.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&r.get::<String, _>("updated_at"))?,
    })
}

/// Register a user with the next play order of the room, computed inside
/// the insert itself. Unique violations are returned untouched so the
/// caller can tell a duplicate user from a play order collision.
pub async fn insert_tournament_user(
    pool: &SqlitePool,
    room_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO tournament_users
            (room_id, user_id, play_order, games_played, state, created_at, updated_at)
         SELECT ?1, ?2, COALESCE(MAX(play_order), 0) + 1, 0, 'WAITING', ?3, ?3
         FROM tournament_users WHERE room_id = ?1",
    )
    .bind(room_id)
    .bind(user_id)
    .bind(timestamp(now))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn get_tournament_user(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<TournamentUser>, ArenaError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tournament_users WHERE id = ?1",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(db_err)?;

    row.as_ref().map(user_from_row).transpose()
}

pub async fn find_tournament_user(
    pool: &SqlitePool,
    room_id: i64,
    user_id: i64,
) -> Result<Option<TournamentUser>, ArenaError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tournament_users WHERE room_id = ?1 AND user_id = ?2",
        USER_COLUMNS
    ))
    .bind(room_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(db_err)?;

    row.as_ref().map(user_from_row).transpose()
}

pub async fn list_tournament_users(
    pool: &SqlitePool,
    room_id: i64,
) -> Result<Vec<TournamentUser>, ArenaError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tournament_users WHERE room_id = ?1 ORDER BY play_order ASC",
        USER_COLUMNS
    ))
    .bind(room_id)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.iter().map(user_from_row).collect()
}

/// Write back every mutable field of a tournament user.
pub async fn update_tournament_user(
    pool: &SqlitePool,
    user: &TournamentUser,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE tournament_users
         SET play_order = ?1, games_played = ?2, state = ?3, updated_at = ?4
         WHERE id = ?5",
    )
    .bind(user.play_order)
    .bind(user.games_played)
    .bind(user.state.as_str())
    .bind(timestamp(user.updated_at))
    .bind(user.id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Count a won game for `user_id` and put them back in the waiting pool.
/// Eliminated users are left alone.
pub async fn advance_tournament_winner(
    pool: &SqlitePool,
    room_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<bool, ArenaError> {
    let result = sqlx::query(
        "UPDATE tournament_users
         SET games_played = games_played + 1, state = 'WAITING', updated_at = ?1
         WHERE room_id = ?2 AND user_id = ?3 AND state != 'ELIMINATED'",
    )
    .bind(timestamp(now))
    .bind(room_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_tournament_user_state(
    pool: &SqlitePool,
    room_id: i64,
    user_id: i64,
    state: TournamentUserState,
    now: DateTime<Utc>,
) -> Result<bool, ArenaError> {
    let result = sqlx::query(
        "UPDATE tournament_users SET state = ?1, updated_at = ?2
         WHERE room_id = ?3 AND user_id = ?4",
    )
    .bind(state.as_str())
    .bind(timestamp(now))
    .bind(room_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok(result.rows_affected() == 1)
}

/// Remove a tournament user. Returns false if there was none.
pub async fn delete_tournament_user(pool: &SqlitePool, id: i64) -> Result<bool, ArenaError> {
    let result = sqlx::query("DELETE FROM tournament_users WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_err)?;

    Ok(result.rows_affected() == 1)
}

// ── Tournament game mappings ────────────────────────────────────────────

fn mapping_from_row(r: &SqliteRow) -> Result<TournamentGameMapping, ArenaError> {
    Ok(TournamentGameMapping {
        id: r.get("id"),
        room_id: r.get("room_id"),
        session_id: r.get("session_id"),
        user_id: r.get("user_id"),
        created_at: parse_timestamp(&r.get::<String, _>("created_at"))?,
    })
}

pub async fn insert_mapping(
    pool: &SqlitePool,
    room_id: i64,
    session_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<TournamentGameMapping, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO tournament_game_mappings (room_id, session_id, user_id, created_at)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(room_id)
    .bind(session_id)
    .bind(user_id)
    .bind(timestamp(now))
    .execute(pool)
    .await?;

    Ok(TournamentGameMapping {
        id: result.last_insert_rowid(),
        room_id,
        session_id,
        user_id,
        created_at: now,
    })
}

pub async fn get_mapping(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<TournamentGameMapping>, ArenaError> {
    let row = sqlx::query(
        "SELECT id, room_id, session_id, user_id, created_at
         FROM tournament_game_mappings WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(db_err)?;

    row.as_ref().map(mapping_from_row).transpose()
}

pub async fn find_mapping_by_session(
    pool: &SqlitePool,
    session_id: i64,
) -> Result<Option<TournamentGameMapping>, ArenaError> {
    let row = sqlx::query(
        "SELECT id, room_id, session_id, user_id, created_at
         FROM tournament_game_mappings WHERE session_id = ?1",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
    .map_err(db_err)?;

    row.as_ref().map(mapping_from_row).transpose()
}

pub async fn list_mappings(
    pool: &SqlitePool,
    room_id: i64,
) -> Result<Vec<TournamentGameMapping>, ArenaError> {
    let rows = sqlx::query(
        "SELECT id, room_id, session_id, user_id, created_at
         FROM tournament_game_mappings WHERE room_id = ?1 ORDER BY id ASC",
    )
    .bind(room_id)
    .fetch_all(pool)
    .await
    .map_err(db_err)?;

    rows.iter().map(mapping_from_row).collect()
}
