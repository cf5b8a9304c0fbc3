use super::DurableStore;
use crate::error::{PixelError, Result};
use crate::types::{Alliance, AllianceRole, AllianceStats, Cell, CellKey, User, DEFAULT_DROPLETS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pixels (
        key TEXT PRIMARY KEY,
        color TEXT NOT NULL,
        owner TEXT,
        alliance_id TEXT,
        timestamp TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS pixels_alliance ON pixels (alliance_id);
    CREATE TABLE IF NOT EXISTS users (
        wallet_address TEXT PRIMARY KEY,
        username TEXT,
        avatar TEXT,
        droplets INTEGER NOT NULL,
        max_droplets INTEGER NOT NULL,
        last_refill TEXT NOT NULL,
        total_pixels INTEGER NOT NULL DEFAULT 0,
        alliance_id TEXT,
        alliance_role TEXT NOT NULL DEFAULT 'Member',
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS alliances (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        tag TEXT NOT NULL UNIQUE,
        leader TEXT NOT NULL,
        members TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        color TEXT NOT NULL UNIQUE,
        avatar TEXT NOT NULL,
        total_pixels INTEGER NOT NULL DEFAULT 0,
        rank INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );
";

const USER_COLUMNS: &str = "wallet_address, username, avatar, droplets, max_droplets, \
     last_refill, total_pixels, alliance_id, alliance_role, created_at";

const ALLIANCE_COLUMNS: &str =
    "id, name, tag, leader, members, description, color, avatar, total_pixels, rank, created_at";

/// [`DurableStore`] backed by a single SQLite database.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and its schema.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn cell_from_row(row: &Row<'_>) -> rusqlite::Result<Cell> {
    Ok(Cell {
        key: CellKey::new(row.get::<_, String>(0)?),
        color: row.get(1)?,
        owner: row.get(2)?,
        alliance_id: row.get(3)?,
        timestamp: parse_ts(4, row.get(4)?)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(8)?;
    Ok(User {
        wallet_address: row.get(0)?,
        username: row.get(1)?,
        avatar: row.get(2)?,
        droplets: row.get(3)?,
        max_droplets: row.get(4)?,
        last_refill: parse_ts(5, row.get(5)?)?,
        total_pixels: row.get(6)?,
        alliance_id: row.get(7)?,
        alliance_role: AllianceRole::from_name(&role),
        created_at: parse_ts(9, row.get(9)?)?,
    })
}

fn alliance_from_row(row: &Row<'_>) -> rusqlite::Result<Alliance> {
    let members_json: String = row.get(4)?;
    let members: Vec<String> = serde_json::from_str(&members_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(Alliance {
        id: row.get(0)?,
        name: row.get(1)?,
        tag: row.get(2)?,
        leader: row.get(3)?,
        members,
        description: row.get(5)?,
        color: row.get(6)?,
        avatar: row.get(7)?,
        stats: AllianceStats {
            total_pixels: row.get(8)?,
            rank: row.get(9)?,
        },
        created_at: parse_ts(10, row.get(10)?)?,
    })
}

/// Create the user row with model defaults if it does not exist yet.
fn ensure_user(conn: &Connection, wallet: &str) -> rusqlite::Result<()> {
    let now = ts(&Utc::now());
    conn.execute(
        "INSERT OR IGNORE INTO users (wallet_address, droplets, max_droplets, last_refill, created_at)
         VALUES (?1, ?2, ?2, ?3, ?3)",
        params![wallet, DEFAULT_DROPLETS, now],
    )?;
    Ok(())
}

fn select_user(conn: &Connection, wallet: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE wallet_address = ?1"),
        params![wallet],
        user_from_row,
    )
    .optional()
}

fn select_alliance(conn: &Connection, clause: &str, value: &str) -> rusqlite::Result<Option<Alliance>> {
    conn.query_row(
        &format!("SELECT {ALLIANCE_COLUMNS} FROM alliances WHERE {clause} = ?1"),
        params![value],
        alliance_from_row,
    )
    .optional()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn load_cells(&self) -> Result<Vec<Cell>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT key, color, owner, alliance_id, timestamp FROM pixels")?;
        let cells = stmt
            .query_map([], cell_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cells)
    }

    async fn upsert_cell(&self, cell: &Cell) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO pixels (key, color, owner, alliance_id, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(key) DO UPDATE SET
                color = excluded.color,
                owner = excluded.owner,
                alliance_id = excluded.alliance_id,
                timestamp = excluded.timestamp",
            params![
                cell.key.as_str(),
                cell.color,
                cell.owner,
                cell.alliance_id,
                ts(&cell.timestamp)
            ],
        )?;
        Ok(())
    }

    async fn delete_cell(&self, key: &CellKey) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM pixels WHERE key = ?1", params![key.as_str()])?;
        Ok(())
    }

    async fn count_cells_by_alliance(&self) -> Result<Vec<(String, u64)>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT alliance_id, COUNT(*) FROM pixels
             WHERE alliance_id IS NOT NULL
             GROUP BY alliance_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((id, count.max(0) as u64))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn find_user(&self, wallet: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        Ok(select_user(&conn, wallet)?)
    }

    async fn upsert_profile(&self, wallet: &str, username: &str, avatar: &str) -> Result<User> {
        let conn = self.conn.lock().await;
        ensure_user(&conn, wallet)?;
        conn.execute(
            "UPDATE users SET username = ?2, avatar = ?3 WHERE wallet_address = ?1",
            params![wallet, username, avatar],
        )?;
        select_user(&conn, wallet)?
            .ok_or_else(|| PixelError::Persistence(format!("user {} vanished after upsert", wallet)))
    }

    async fn adjust_total_pixels(
        &self,
        wallet: &str,
        delta: i64,
        create_missing: bool,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        if create_missing {
            ensure_user(&conn, wallet)?;
        }
        conn.execute(
            "UPDATE users SET total_pixels = total_pixels + ?2 WHERE wallet_address = ?1",
            params![wallet, delta],
        )?;
        Ok(())
    }

    async fn set_user_alliance(
        &self,
        wallet: &str,
        membership: Option<(&str, AllianceRole)>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        ensure_user(&conn, wallet)?;
        let (alliance_id, role) = match membership {
            Some((id, role)) => (Some(id), role),
            None => (None, AllianceRole::Member),
        };
        conn.execute(
            "UPDATE users SET alliance_id = ?2, alliance_role = ?3 WHERE wallet_address = ?1",
            params![wallet, alliance_id, role.as_str()],
        )?;
        Ok(())
    }

    async fn insert_alliance(&self, alliance: &Alliance) -> Result<()> {
        let members = serde_json::to_string(&alliance.members)?;
        let conn = self.conn.lock().await;
        conn.execute(
            &format!("INSERT INTO alliances ({ALLIANCE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
            params![
                alliance.id,
                alliance.name,
                alliance.tag,
                alliance.leader,
                members,
                alliance.description,
                alliance.color,
                alliance.avatar,
                alliance.stats.total_pixels,
                alliance.stats.rank,
                ts(&alliance.created_at)
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                PixelError::Conflict("Name, Tag or Color taken".into())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn save_alliance(&self, alliance: &Alliance) -> Result<()> {
        let members = serde_json::to_string(&alliance.members)?;
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE alliances SET name = ?2, tag = ?3, leader = ?4, members = ?5,
                description = ?6, color = ?7, avatar = ?8, total_pixels = ?9, rank = ?10
             WHERE id = ?1",
            params![
                alliance.id,
                alliance.name,
                alliance.tag,
                alliance.leader,
                members,
                alliance.description,
                alliance.color,
                alliance.avatar,
                alliance.stats.total_pixels,
                alliance.stats.rank
            ],
        )?;
        if updated == 0 {
            return Err(PixelError::NotFound("Alliance not found".into()));
        }
        Ok(())
    }

    async fn find_alliance(&self, id: &str) -> Result<Option<Alliance>> {
        let conn = self.conn.lock().await;
        Ok(select_alliance(&conn, "id", id)?)
    }

    async fn find_alliance_by_tag(&self, tag: &str) -> Result<Option<Alliance>> {
        let conn = self.conn.lock().await;
        Ok(select_alliance(&conn, "tag", tag)?)
    }

    async fn find_conflicting_alliance(
        &self,
        name: &str,
        tag: &str,
        color: &str,
    ) -> Result<Option<Alliance>> {
        let conn = self.conn.lock().await;
        let found = conn
            .query_row(
                &format!(
                    "SELECT {ALLIANCE_COLUMNS} FROM alliances
                     WHERE name = ?1 OR tag = ?2 OR color = ?3 LIMIT 1"
                ),
                params![name, tag, color],
                alliance_from_row,
            )
            .optional()?;
        Ok(found)
    }

    async fn list_alliances(&self) -> Result<Vec<Alliance>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("SELECT {ALLIANCE_COLUMNS} FROM alliances"))?;
        let alliances = stmt
            .query_map([], alliance_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(alliances)
    }
}
