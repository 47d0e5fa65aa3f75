use crate::models::{
    MessageRow, RippleFieldsRow, StatsSnapshotRow, format_timestamp, parse_id, parse_timestamp,
};
use crate::Database;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use ripple_types::models::{Category, CountUpdate, Message, MessageCounts, RippleFields};
use ripple_types::stats::StatsSnapshot;
use rusqlite::{Connection, Row};
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "id, message, category, category_label, country, created_at, \
     ripple_parent_id, ripple_depth, ripple_count, inspired_by_message_id";

impl Database {
    // -- Messages --

    pub fn insert_message(&self, msg: &Message) -> Result<()> {
        self.with_conn(|conn| write_message(conn, INSERT_MESSAGE, msg))
    }

    /// Store copies of messages that live in another store, keeping their ids
    /// and timestamps. A copy that already exists only takes the incoming
    /// `ripple_count`.
    pub fn upsert_messages(&self, messages: &[Message]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let sql = format!(
                "{} ON CONFLICT(id) DO UPDATE SET ripple_count = excluded.ripple_count",
                INSERT_MESSAGE
            );
            for msg in messages {
                write_message(&tx, &sql, msg)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &Uuid) -> Result<Option<Message>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM gratitude_messages WHERE id = ?1", MESSAGE_COLUMNS);
            let row = conn
                .query_row(&sql, [id.to_string()], map_message_row)
                .optional()?;
            row.map(Message::try_from).transpose()
        })
    }

    /// Set `ripple_count` to `new` only if it still equals `expected`.
    /// The check and the write are one statement, so two writers that read
    /// the same value cannot both succeed.
    pub fn update_ripple_count(&self, id: &Uuid, expected: u64, new: u64) -> Result<CountUpdate> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE gratitude_messages SET ripple_count = ?3
                 WHERE id = ?1 AND ripple_count = ?2",
                rusqlite::params![id.to_string(), to_sql_count(expected)?, to_sql_count(new)?],
            )?;
            Ok(if changed == 1 { CountUpdate::Applied } else { CountUpdate::Stale })
        })
    }

    /// Unconditional write, for copying a count decided elsewhere.
    pub fn set_ripple_count(&self, id: &Uuid, count: u64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE gratitude_messages SET ripple_count = ?2 WHERE id = ?1",
                rusqlite::params![id.to_string(), to_sql_count(count)?],
            )?;
            Ok(())
        })
    }

    pub fn get_children(&self, parent_id: &Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM gratitude_messages
                 WHERE ripple_parent_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
                MESSAGE_COLUMNS
            );
            query_messages(conn, &sql, rusqlite::params![parent_id.to_string()])
        })
    }

    pub fn count_messages(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM gratitude_messages", [], |r| r.get(0))?;
            Ok(count as u64)
        })
    }

    /// Message at a stable position in insertion order; paired with
    /// `count_messages` for uniform random picks.
    pub fn get_message_at(&self, offset: u64) -> Result<Option<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM gratitude_messages ORDER BY rowid LIMIT 1 OFFSET ?1",
                MESSAGE_COLUMNS
            );
            let row = conn
                .query_row(&sql, [to_sql_count(offset)?], map_message_row)
                .optional()?;
            row.map(Message::try_from).transpose()
        })
    }

    pub fn get_top_by_ripple_count(&self, limit: usize) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM gratitude_messages
                 ORDER BY ripple_count DESC, created_at ASC, rowid ASC
                 LIMIT ?1",
                MESSAGE_COLUMNS
            );
            query_messages(conn, &sql, rusqlite::params![limit as i64])
        })
    }

    pub fn aggregate_counts(&self, since: &DateTime<Utc>) -> Result<MessageCounts> {
        self.with_conn(|conn| {
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM gratitude_messages", [], |r| r.get(0))?;

            let created_since: i64 = conn.query_row(
                "SELECT COUNT(*) FROM gratitude_messages WHERE created_at >= ?1",
                [format_timestamp(since)],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT category, COUNT(*) FROM gratitude_messages GROUP BY category",
            )?;
            let grouped = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut per_category = std::collections::BTreeMap::new();
            for (raw, count) in grouped {
                let category: Category = raw.parse()?;
                per_category.insert(category, count as u64);
            }

            Ok(MessageCounts {
                total: total as u64,
                per_category,
                created_since: created_since as u64,
            })
        })
    }

    pub fn get_ripple_fields(&self) -> Result<Vec<RippleFields>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ripple_count, ripple_depth FROM gratitude_messages ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(RippleFieldsRow {
                        id: row.get(0)?,
                        ripple_count: row.get(1)?,
                        ripple_depth: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|row| {
                    Ok(RippleFields {
                        id: parse_id(&row.id)?,
                        ripple_count: u64::try_from(row.ripple_count)?,
                        ripple_depth: u32::try_from(row.ripple_depth)?,
                    })
                })
                .collect()
        })
    }

    // -- App stats --

    pub fn upsert_stats_snapshot(&self, snapshot: &StatsSnapshot) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO app_stats (id, total_messages, active_users, updated_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     total_messages = excluded.total_messages,
                     active_users = excluded.active_users,
                     updated_at = excluded.updated_at",
                rusqlite::params![
                    to_sql_count(snapshot.total_messages)?,
                    to_sql_count(snapshot.active_users)?,
                    format_timestamp(&snapshot.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_stats_snapshot(&self) -> Result<Option<StatsSnapshot>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT total_messages, active_users, updated_at FROM app_stats WHERE id = 1",
                    [],
                    |row| {
                        Ok(StatsSnapshotRow {
                            total_messages: row.get(0)?,
                            active_users: row.get(1)?,
                            updated_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;

            row.map(|row| {
                Ok(StatsSnapshot {
                    total_messages: row.total_messages as u64,
                    active_users: row.active_users as u64,
                    updated_at: parse_timestamp(&row.updated_at)?,
                })
            })
            .transpose()
        })
    }
}

const INSERT_MESSAGE: &str = "INSERT INTO gratitude_messages
         (id, message, category, category_label, country, created_at,
          ripple_parent_id, ripple_depth, ripple_count, inspired_by_message_id)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

fn write_message(conn: &Connection, sql: &str, msg: &Message) -> Result<()> {
    conn.execute(
        sql,
        rusqlite::params![
            msg.id.to_string(),
            msg.text,
            msg.category.as_str(),
            msg.category_label,
            msg.country,
            format_timestamp(&msg.created_at),
            msg.ripple_parent_id.map(|id| id.to_string()),
            i64::from(msg.ripple_depth),
            to_sql_count(msg.ripple_count)?,
            msg.inspired_by_message_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

fn map_message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        message: row.get(1)?,
        category: row.get(2)?,
        category_label: row.get(3)?,
        country: row.get(4)?,
        created_at: row.get(5)?,
        ripple_parent_id: row.get(6)?,
        ripple_depth: row.get(7)?,
        ripple_count: row.get(8)?,
        inspired_by_message_id: row.get(9)?,
    })
}

fn query_messages(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(Message::try_from).collect()
}

fn to_sql_count(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("Counter out of range: {}", value))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
