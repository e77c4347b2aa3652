//! SQLite station table.
use std::path::{Path, PathBuf};

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, ToSql};
use tracing::{trace, trace_span};

use super::{Query, Row, StationTable, Value};
use crate::Result;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Int(v) => ToSqlOutput::from(*v),
            Self::Text(v) => ToSqlOutput::from(v.as_str()),
        })
    }
}

/// A station database on disk.
///
/// The database is opened (read-only) for every query and closed again afterwards, so this is
/// cheap to keep around and never holds a connection between lookups.
#[derive(Debug, Clone)]
pub struct SqliteStations {
    path: PathBuf,
}

impl SqliteStations {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?)
    }
}

impl StationTable for SqliteStations {
    fn query(&self, query: &Query) -> Result<Vec<Row>> {
        let span = trace_span!("SqliteStations", path = ?self.path);
        let _enter = span.enter();

        let conn = self.connect()?;
        query_rows(&conn, query)
    }
}

/// Renders a query as SQL, with one positional parameter per filter.
pub fn to_sql(query: &Query) -> String {
    let columns = query
        .columns
        .iter()
        .map(|c| format!("\"{}\"", c.name()))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("SELECT {} FROM \"{}\"", columns, query.table.name());
    if !query.filter.is_empty() {
        let filter = query
            .filter
            .iter()
            .map(|(c, _)| format!("\"{}\" = ?", c.name()))
            .collect::<Vec<_>>()
            .join(" AND ");
        sql += &format!(" WHERE {}", filter);
    }
    sql += &format!(" ORDER BY \"{}\"", query.order_by.name());
    if let Some(limit) = query.limit {
        sql += &format!(" LIMIT {}", limit);
    }
    sql
}

/// Runs a query against an open connection.
pub fn query_rows(conn: &Connection, query: &Query) -> Result<Vec<Row>> {
    let sql = to_sql(query);
    trace!(%sql, "Querying");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(query.filter.iter().map(|(_, v)| v)), |row| {
            let mut values = Vec::with_capacity(query.columns.len());
            for (i, column) in query.columns.iter().enumerate() {
                values.push((*column, text(row.get_ref(i)?)));
            }
            Ok(Row { values })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Everything comes back as text. Some copies of the database store coordinates as REAL.
fn text(v: ValueRef<'_>) -> Option<String> {
    match v {
        ValueRef::Null => None,
        ValueRef::Integer(v) => Some(v.to_string()),
        ValueRef::Real(v) => Some(v.to_string()),
        ValueRef::Text(v) | ValueRef::Blob(v) => Some(String::from_utf8_lossy(v).into_owned()),
    }
}
