// 🗄️ Persistence - grocery lists in SQLite (WAL) with an audit trail
//
// Item ledgers are stored as JSON. Reading goes through the tolerant
// GroceryItem deserializer, so pre-ledger rows load without migration.

use crate::error::Result;
use crate::grocery::{GroceryItem, GroceryList};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Event for audit trail: every persisted change is recorded
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

const ENTITY_GROCERY_LIST: &str = "grocery_list";

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Grocery Lists (item ledgers as JSON)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grocery_lists (
            id TEXT PRIMARY KEY,
            week_identifier TEXT NOT NULL,
            meal_plan_id TEXT,
            items TEXT NOT NULL,
            extra_items TEXT NOT NULL DEFAULT '[]',
            estimated_total REAL,
            content_hash TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lists_week ON grocery_lists(week_identifier, created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut events = Vec::with_capacity(rows.len());
    for (event_id, timestamp, event_type, entity_type, entity_id, data, actor) in rows {
        events.push(Event {
            event_id,
            timestamp: parse_timestamp(&timestamp),
            event_type,
            entity_type,
            entity_id,
            data: serde_json::from_str(&data)?,
            actor,
        });
    }

    Ok(events)
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

// ============================================================================
// GROCERY LISTS
// ============================================================================

/// Raw row, decoded outside the rusqlite closure so JSON errors propagate
struct StoredList {
    id: String,
    week_identifier: String,
    meal_plan_id: Option<String>,
    items: String,
    extra_items: String,
    estimated_total: Option<f64>,
    created_at: String,
    updated_at: String,
}

const LIST_COLUMNS: &str = "id, week_identifier, meal_plan_id, items, extra_items,
                            estimated_total, created_at, updated_at";

fn read_stored_list(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredList> {
    Ok(StoredList {
        id: row.get(0)?,
        week_identifier: row.get(1)?,
        meal_plan_id: row.get(2)?,
        items: row.get(3)?,
        extra_items: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        estimated_total: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn decode_items(json: &str) -> Result<Vec<GroceryItem>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(json)?)
}

impl StoredList {
    fn into_list(self) -> Result<GroceryList> {
        let items = decode_items(&self.items)?;
        let extra_items = decode_items(&self.extra_items)?;

        Ok(GroceryList::from_stored(
            self.id,
            self.week_identifier,
            self.meal_plan_id,
            items,
            extra_items,
            self.estimated_total,
            parse_timestamp(&self.created_at),
            parse_timestamp(&self.updated_at),
        ))
    }
}

fn upsert_list(conn: &Connection, list: &GroceryList, content_hash: &str) -> Result<()> {
    let items_json = serde_json::to_string(list.items())?;
    let extra_json = serde_json::to_string(list.extra_items())?;

    conn.execute(
        "INSERT INTO grocery_lists (
            id, week_identifier, meal_plan_id, items, extra_items,
            estimated_total, content_hash, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            week_identifier = excluded.week_identifier,
            meal_plan_id = excluded.meal_plan_id,
            items = excluded.items,
            extra_items = excluded.extra_items,
            estimated_total = excluded.estimated_total,
            content_hash = excluded.content_hash,
            updated_at = excluded.updated_at",
        params![
            list.id,
            list.week_identifier,
            list.meal_plan_id,
            items_json,
            extra_json,
            list.estimated_total,
            content_hash,
            list.created_at.to_rfc3339(),
            list.updated_at.to_rfc3339(),
        ],
    )?;

    Ok(())
}

/// Persist a list and its audit event in one transaction.
///
/// Returns `false` when the stored ledger already matches (nothing written).
pub fn save_grocery_list(conn: &Connection, list: &mut GroceryList, reason: &str) -> Result<bool> {
    let content_hash = list.fingerprint();

    let stored_hash: Option<String> = conn
        .query_row(
            "SELECT content_hash FROM grocery_lists WHERE id = ?1",
            [&list.id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?
        .flatten();

    if stored_hash.as_deref() == Some(content_hash.as_str()) {
        return Ok(false);
    }

    list.updated_at = Utc::now();

    let tx = conn.unchecked_transaction()?;
    upsert_list(&tx, list, &content_hash)?;
    insert_event(
        &tx,
        &Event::new(
            reason,
            ENTITY_GROCERY_LIST,
            &list.id,
            serde_json::json!({
                "week_identifier": list.week_identifier,
                "items": list.items().len(),
                "extra_items": list.extra_items().len(),
                "content_hash": content_hash,
            }),
            "grocery_list",
        ),
    )?;
    tx.commit()?;

    info!(list_id = %list.id, reason, items = list.items().len(), "saved grocery list");
    Ok(true)
}

pub fn get_grocery_list(conn: &Connection, id: &str) -> Result<Option<GroceryList>> {
    let stored = conn
        .query_row(
            &format!("SELECT {} FROM grocery_lists WHERE id = ?1", LIST_COLUMNS),
            [id],
            read_stored_list,
        )
        .optional()?;

    stored.map(StoredList::into_list).transpose()
}

/// Most recently created list for a week
pub fn get_latest_grocery_list_for_week(
    conn: &Connection,
    week_identifier: &str,
) -> Result<Option<GroceryList>> {
    let stored = conn
        .query_row(
            &format!(
                "SELECT {} FROM grocery_lists
                 WHERE week_identifier = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                LIST_COLUMNS
            ),
            [week_identifier],
            read_stored_list,
        )
        .optional()?;

    stored.map(StoredList::into_list).transpose()
}

/// All lists for a week, newest first
pub fn list_grocery_lists_for_week(
    conn: &Connection,
    week_identifier: &str,
) -> Result<Vec<GroceryList>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM grocery_lists
         WHERE week_identifier = ?1
         ORDER BY created_at DESC, rowid DESC",
        LIST_COLUMNS
    ))?;

    let stored = stmt
        .query_map([week_identifier], read_stored_list)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    stored.into_iter().map(StoredList::into_list).collect()
}

pub fn count_grocery_lists(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM grocery_lists", [], |row| row.get(0))?;
    Ok(count)
}

fn has_legacy_items(json: &str) -> bool {
    serde_json::from_str::<Vec<serde_json::Value>>(json)
        .map(|items| items.iter().any(|item| item.get("contributions").is_none()))
        .unwrap_or(false)
}

/// Rewrite pre-ledger rows into the contribution schema.
/// Safe to run repeatedly; already-migrated rows are left alone.
pub fn migrate_legacy_lists(conn: &Connection) -> Result<usize> {
    let candidates: Vec<String> = {
        let mut stmt = conn.prepare("SELECT id, items, extra_items FROM grocery_lists")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .filter(|(_, items, extra)| has_legacy_items(items) || has_legacy_items(extra))
            .map(|(id, _, _)| id)
            .collect()
    };

    let mut migrated = 0;

    for id in candidates {
        let Some(list) = get_grocery_list(conn, &id)? else {
            continue;
        };

        let content_hash = list.fingerprint();
        let tx = conn.unchecked_transaction()?;
        upsert_list(&tx, &list, &content_hash)?;
        insert_event(
            &tx,
            &Event::new(
                "legacy_migrated",
                ENTITY_GROCERY_LIST,
                &list.id,
                serde_json::json!({ "content_hash": content_hash }),
                "migration",
            ),
        )?;
        tx.commit()?;

        migrated += 1;
    }

    info!(migrated, "legacy grocery list migration complete");
    Ok(migrated)
}

// ============================================================================
// SHARED STORE
// ============================================================================

/// One SQLite connection shared between threads.
///
/// The connection lock covers a single read or a single write. Whole
/// read-modify-write cycles are serialized per plan by the coordinator.
#[derive(Clone)]
pub struct GroceryStore {
    conn: Arc<Mutex<Connection>>,
}

impl GroceryStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(GroceryStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        // SQLite keeps its own state consistent across a panicked holder
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }

    pub fn load(&self, id: &str) -> Result<Option<GroceryList>> {
        self.with_conn(|conn| get_grocery_list(conn, id))
    }

    pub fn latest_for_week(&self, week_identifier: &str) -> Result<Option<GroceryList>> {
        self.with_conn(|conn| get_latest_grocery_list_for_week(conn, week_identifier))
    }

    pub fn lists_for_week(&self, week_identifier: &str) -> Result<Vec<GroceryList>> {
        self.with_conn(|conn| list_grocery_lists_for_week(conn, week_identifier))
    }

    pub fn save(&self, list: &mut GroceryList, reason: &str) -> Result<bool> {
        self.with_conn(|conn| save_grocery_list(conn, list, reason))
    }

    pub fn events_for_list(&self, list_id: &str) -> Result<Vec<Event>> {
        self.with_conn(|conn| get_events_for_entity(conn, ENTITY_GROCERY_LIST, list_id))
    }

    pub fn migrate_legacy(&self) -> Result<usize> {
        self.with_conn(migrate_legacy_lists)
    }

    pub fn count(&self) -> Result<i64> {
        self.with_conn(count_grocery_lists)
    }
}
