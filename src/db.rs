//! Local SQLite store for persisted client state.
//!
//! Uses rusqlite with WAL mode. Holds the `local_settings` key-value table
//! that backs the cart snapshot, the last placed order id and (when the
//! `Local` token backend is selected) the session tokens.

use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{ClientError, ClientResult};

/// Shared handle to the database connection.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 1;

const DB_FILE_NAME: &str = "foodhub.db";

/// Initialize the database at `{data_dir}/foodhub.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. On corruption or open failure,
/// deletes the file and retries once.
pub fn init(data_dir: &Path) -> ClientResult<DbState> {
    fs::create_dir_all(data_dir)
        .map_err(|e| ClientError::Storage(format!("Failed to create data dir: {e}")))?;

    let db_path = data_dir.join(DB_FILE_NAME);
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), deleting and retrying once",
                first_err
            );
            if db_path.exists() {
                let _ = fs::remove_file(&db_path);
                let _ = fs::remove_file(db_path.with_extension("db-wal"));
                let _ = fs::remove_file(db_path.with_extension("db-shm"));
            }
            open_and_configure(&db_path).map_err(|e| {
                ClientError::Storage(format!("Database open failed after retry: {e}"))
            })?
        }
    };

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// Open a migrated in-memory database. Nothing survives the handle; used by
/// tests and by surfaces that run without a data directory.
pub fn open_in_memory() -> ClientResult<DbState> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    run_migrations(&conn)?;
    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> ClientResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| ClientError::Storage(format!("create schema_version: {e}")))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Migration v1: category/key/value settings store. Lookups go through the
/// `UNIQUE(setting_category, setting_key)` index.
fn migrate_v1(conn: &Connection) -> ClientResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS local_settings (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now')),
            UNIQUE(setting_category, setting_key)
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| {
        error!("Migration v1 failed: {e}");
        ClientError::Storage(format!("migration v1: {e}"))
    })?;

    info!("Applied migration v1 (local_settings)");
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

/// Get a single setting value.
pub fn get_setting(conn: &Connection, category: &str, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT setting_value FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
        |row| row.get(0),
    )
    .ok()
}

/// Insert or update a setting.
pub fn set_setting(conn: &Connection, category: &str, key: &str, value: &str) -> ClientResult<()> {
    conn.execute(
        "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(setting_category, setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            updated_at = excluded.updated_at",
        params![category, key, value],
    )
    .map_err(|e| ClientError::Storage(format!("set_setting: {e}")))?;
    Ok(())
}

/// Delete a single setting. Missing keys are not an error.
pub fn delete_setting(conn: &Connection, category: &str, key: &str) -> ClientResult<()> {
    conn.execute(
        "DELETE FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
    )
    .map_err(|e| ClientError::Storage(format!("delete_setting: {e}")))?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare table list");
        stmt.query_map([], |row| row.get(0))
            .expect("query tables")
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_migrations_to_latest() {
        let db = open_in_memory().expect("open");
        let conn = db.conn.lock().unwrap();
        let tables = table_names(&conn);
        assert!(tables.contains(&"local_settings".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = open_in_memory().expect("open");
        let conn = db.conn.lock().unwrap();
        run_migrations(&conn).expect("second run");
        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_settings_lookup_uses_unique_index() {
        let db = open_in_memory().expect("open");
        let conn = db.conn.lock().unwrap();
        let indexes: Vec<String> = {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master
                     WHERE type='index' AND tbl_name='local_settings' ORDER BY name",
                )
                .expect("prepare index list");
            stmt.query_map([], |row| row.get(0))
                .expect("query indexes")
                .filter_map(|r| r.ok())
                .collect()
        };
        assert!(indexes.iter().all(|n| n.starts_with("sqlite_autoindex_local_settings")));
        assert_eq!(CURRENT_SCHEMA_VERSION, 1);

        let plan: String = conn
            .query_row(
                "EXPLAIN QUERY PLAN SELECT setting_value FROM local_settings
                 WHERE setting_category = 'session' AND setting_key = 'admin_token'",
                [],
                |row| row.get(3),
            )
            .unwrap();
        assert!(plan.contains("INDEX"), "unexpected plan: {plan}");
    }

    #[test]
    fn test_wal_mode_on_file_db() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = init(dir.path()).expect("init");
        let conn = db.conn.lock().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(db.db_path.ends_with(DB_FILE_NAME));
    }

    #[test]
    fn test_settings_crud() {
        let db = open_in_memory().expect("open");
        let conn = db.conn.lock().unwrap();

        set_setting(&conn, "storefront", "last_order_id", "ORD-1").expect("set");
        assert_eq!(
            get_setting(&conn, "storefront", "last_order_id"),
            Some("ORD-1".to_string())
        );

        set_setting(&conn, "storefront", "last_order_id", "ORD-2").expect("update");
        assert_eq!(
            get_setting(&conn, "storefront", "last_order_id"),
            Some("ORD-2".to_string())
        );

        delete_setting(&conn, "storefront", "last_order_id").expect("delete");
        assert!(get_setting(&conn, "storefront", "last_order_id").is_none());
        delete_setting(&conn, "storefront", "last_order_id").expect("delete missing");
    }
}
