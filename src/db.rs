use crate::errors::{EngineError, EngineResult};
use crate::models::OptionSide;
use crate::position::enrichment::enrich_position;
use crate::position::{PositionInput, PositionSnapshot};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub type DbPool = Arc<Mutex<Connection>>;

const SCHEMA: &str = include_str!("../migrations/001_init.sql");

const POSITION_COLUMNS: &str = "id, symbol, strike, expiration_date, current_underlying_price, side, quantity, premium_collected, current_value, days_to_expiration, unrealized_pnl, is_in_the_money, assignment_probability, created_at, updated_at";

pub fn init_db(db_path: &Path) -> EngineResult<DbPool> {
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)
            .map_err(|e| EngineError::Database(format!("create dir: {e}")))?;
    }
    let conn = Connection::open(db_path)?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA cache_size=-64000;")?;
    conn.execute_batch(SCHEMA)?;

    tracing::info!("database initialized at {}", db_path.display());
    Ok(Arc::new(Mutex::new(conn)))
}

#[cfg(test)]
pub fn init_in_memory() -> EngineResult<DbPool> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn lock(db: &DbPool) -> EngineResult<MutexGuard<'_, Connection>> {
    db.lock()
        .map_err(|e| EngineError::Database(format!("lock poisoned: {e}")))
}

// ── Write path: every write enriches before persisting ──

pub fn create_position(
    db: &DbPool,
    input: PositionInput,
    now: DateTime<Utc>,
) -> EngineResult<PositionSnapshot> {
    let id = uuid::Uuid::new_v4().to_string();
    let snapshot = enrich_position(input.into_snapshot(id, now)?, now);

    let conn = lock(db)?;
    conn.execute(
        &format!(
            "INSERT INTO positions ({POSITION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        rusqlite::params![
            snapshot.id,
            snapshot.symbol,
            snapshot.strike,
            snapshot.expiration_date.to_rfc3339(),
            snapshot.current_underlying_price,
            snapshot.side.to_string(),
            snapshot.quantity,
            snapshot.premium_collected,
            snapshot.current_value,
            snapshot.days_to_expiration,
            snapshot.unrealized_pnl,
            snapshot.is_in_the_money,
            snapshot.assignment_probability,
            snapshot.created_at.to_rfc3339(),
            snapshot.updated_at.to_rfc3339(),
        ],
    )?;

    tracing::info!(id = %snapshot.id, symbol = %snapshot.symbol, "position created");
    Ok(snapshot)
}

/// Read-modify-write under one lock so concurrent updates serialize.
pub fn update_position(
    db: &DbPool,
    id: &str,
    input: PositionInput,
    now: DateTime<Utc>,
) -> EngineResult<PositionSnapshot> {
    let conn = lock(db)?;
    let mut existing = fetch_position(&conn, id)?
        .ok_or_else(|| EngineError::NotFound(format!("position {id}")))?;

    input.apply_to(&mut existing, now)?;
    let snapshot = enrich_position(existing, now);
    write_derived_and_fields(&conn, &snapshot)?;

    tracing::info!(id = %snapshot.id, "position updated");
    Ok(snapshot)
}

fn write_derived_and_fields(conn: &Connection, s: &PositionSnapshot) -> EngineResult<()> {
    conn.execute(
        "UPDATE positions SET symbol = ?1, strike = ?2, expiration_date = ?3, current_underlying_price = ?4,
             side = ?5, quantity = ?6, premium_collected = ?7, current_value = ?8, days_to_expiration = ?9,
             unrealized_pnl = ?10, is_in_the_money = ?11, assignment_probability = ?12, updated_at = ?13
         WHERE id = ?14",
        rusqlite::params![
            s.symbol,
            s.strike,
            s.expiration_date.to_rfc3339(),
            s.current_underlying_price,
            s.side.to_string(),
            s.quantity,
            s.premium_collected,
            s.current_value,
            s.days_to_expiration,
            s.unrealized_pnl,
            s.is_in_the_money,
            s.assignment_probability,
            s.updated_at.to_rfc3339(),
            s.id,
        ],
    )?;
    Ok(())
}

pub fn delete_position(db: &DbPool, id: &str) -> EngineResult<()> {
    let conn = lock(db)?;
    let deleted = conn.execute("DELETE FROM positions WHERE id = ?1", rusqlite::params![id])?;
    if deleted == 0 {
        return Err(EngineError::NotFound(format!("position {id}")));
    }
    tracing::info!(id = %id, "position deleted");
    Ok(())
}

// ── Query helpers ──

pub fn get_position(db: &DbPool, id: &str) -> EngineResult<PositionSnapshot> {
    let conn = lock(db)?;
    fetch_position(&conn, id)?.ok_or_else(|| EngineError::NotFound(format!("position {id}")))
}

/// Stored records, nearest expiration first.
pub fn list_positions(db: &DbPool, limit: usize) -> EngineResult<Vec<PositionSnapshot>> {
    let conn = lock(db)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {POSITION_COLUMNS} FROM positions ORDER BY expiration_date ASC LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![limit as i64], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(PositionRow::into_snapshot).collect()
}

fn fetch_position(conn: &Connection, id: &str) -> EngineResult<Option<PositionSnapshot>> {
    let row = conn
        .query_row(
            &format!("SELECT {POSITION_COLUMNS} FROM positions WHERE id = ?1"),
            rusqlite::params![id],
            read_row,
        )
        .optional()?;
    row.map(PositionRow::into_snapshot).transpose()
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PositionRow> {
    Ok(PositionRow {
        id: row.get(0)?,
        symbol: row.get(1)?,
        strike: row.get(2)?,
        expiration_date: row.get(3)?,
        current_underlying_price: row.get(4)?,
        side: row.get(5)?,
        quantity: row.get(6)?,
        premium_collected: row.get(7)?,
        current_value: row.get(8)?,
        days_to_expiration: row.get(9)?,
        unrealized_pnl: row.get(10)?,
        is_in_the_money: row.get(11)?,
        assignment_probability: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

// ── Row types ──

#[derive(Debug, Clone)]
struct PositionRow {
    id: String,
    symbol: String,
    strike: f64,
    expiration_date: String,
    current_underlying_price: Option<f64>,
    side: String,
    quantity: i64,
    premium_collected: f64,
    current_value: f64,
    days_to_expiration: i64,
    unrealized_pnl: f64,
    is_in_the_money: bool,
    assignment_probability: f64,
    created_at: String,
    updated_at: String,
}

fn parse_ts(column: &str, raw: &str) -> EngineResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::Database(format!("bad {column} `{raw}`: {e}")))
}

impl PositionRow {
    fn into_snapshot(self) -> EngineResult<PositionSnapshot> {
        let side = self
            .side
            .parse::<OptionSide>()
            .map_err(|e| EngineError::Database(format!("stored side for {}: {e}", self.id)))?;
        Ok(PositionSnapshot {
            expiration_date: parse_ts("expiration_date", &self.expiration_date)?,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            id: self.id,
            symbol: self.symbol,
            strike: self.strike,
            current_underlying_price: self.current_underlying_price,
            side,
            quantity: self.quantity,
            premium_collected: self.premium_collected,
            current_value: self.current_value,
            days_to_expiration: self.days_to_expiration,
            unrealized_pnl: self.unrealized_pnl,
            is_in_the_money: self.is_in_the_money,
            assignment_probability: self.assignment_probability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 15, 30, 0).unwrap()
    }

    fn input(days_out: i64, price: Option<f64>) -> PositionInput {
        PositionInput {
            symbol: "aapl".into(),
            strike: 150.0,
            expiration_date: now() + Duration::days(days_out),
            current_underlying_price: price,
            side: "put".into(),
            quantity: 1,
            premium_collected: 4.0,
            current_value: 1.5,
        }
    }

    #[test]
    fn test_create_enriches_before_persisting() {
        let db = init_in_memory().unwrap();
        let created = create_position(&db, input(5, Some(140.0)), now()).unwrap();
        assert!(created.is_in_the_money);

        let stored = get_position(&db, &created.id).unwrap();
        assert_eq!(stored.days_to_expiration, 5);
        assert!(stored.is_in_the_money);
        assert!((stored.unrealized_pnl - 2.5).abs() < 1e-12);
        assert!((stored.assignment_probability - 0.3).abs() < 1e-12);
        assert_eq!(stored, created);
    }

    #[test]
    fn test_update_re_enriches() {
        let db = init_in_memory().unwrap();
        let created = create_position(&db, input(5, Some(140.0)), now()).unwrap();

        let later = now() + Duration::days(1);
        let updated = update_position(&db, &created.id, input(5, Some(160.0)), later).unwrap();
        assert_eq!(updated.days_to_expiration, 4);
        assert!(!updated.is_in_the_money, "price above strike, put is OTM");
        assert!((updated.assignment_probability - 0.2).abs() < 1e-12);
        assert_eq!(updated.created_at, created.created_at);

        let stored = get_position(&db, &created.id).unwrap();
        assert_eq!(stored, updated);
    }

    #[test]
    fn test_update_without_price_keeps_moneyness() {
        let db = init_in_memory().unwrap();
        let created = create_position(&db, input(20, Some(140.0)), now()).unwrap();
        let updated = update_position(&db, &created.id, input(20, None), now()).unwrap();
        assert!(updated.is_in_the_money);
        assert!((updated.assignment_probability - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_missing_records_are_not_found() {
        let db = init_in_memory().unwrap();
        assert!(matches!(get_position(&db, "nope"), Err(EngineError::NotFound(_))));
        assert!(matches!(delete_position(&db, "nope"), Err(EngineError::NotFound(_))));
        assert!(matches!(
            update_position(&db, "nope", input(5, None), now()),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_orders_by_expiration_and_delete() {
        let db = init_in_memory().unwrap();
        let far = create_position(&db, input(60, None), now()).unwrap();
        let near = create_position(&db, input(2, None), now()).unwrap();

        let all = list_positions(&db, 10).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, near.id);
        assert_eq!(all[1].id, far.id);

        delete_position(&db, &near.id).unwrap();
        assert_eq!(list_positions(&db, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_input_never_persists() {
        let db = init_in_memory().unwrap();
        let mut bad = input(5, None);
        bad.side = "straddle".into();
        assert!(create_position(&db, bad, now()).is_err());
        assert!(list_positions(&db, 10).unwrap().is_empty());
    }
}
