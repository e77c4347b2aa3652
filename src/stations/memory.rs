//! In-memory station table, for tests and for callers that bring their own station list.
use std::cmp::Ordering;
use std::collections::HashMap;

use super::{Column, Query, Row, StationTable, Table};
use crate::Result;

#[derive(Debug, Default, Clone)]
pub struct MemoryStations {
    tables: HashMap<Table, Vec<HashMap<Column, String>>>,
}

impl MemoryStations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row. Columns that aren't given are NULL.
    pub fn insert<'a, I>(&mut self, table: Table, fields: I)
    where
        I: IntoIterator<Item = (Column, &'a str)>,
    {
        self.tables
            .entry(table)
            .or_default()
            .push(fields.into_iter().map(|(c, v)| (c, v.to_owned())).collect());
    }

    pub fn len(&self, table: Table) -> usize {
        self.tables.get(&table).map(Vec::len).unwrap_or_default()
    }
}

/// Orders numerically if both sides are numbers, like SQLite would for an INTEGER column.
fn compare(a: Option<&str>, b: Option<&str>) -> Ordering {
    let num = |v: Option<&str>| v.and_then(|v| v.parse::<i64>().ok());
    match (num(a), num(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(&b),
    }
}

impl StationTable for MemoryStations {
    fn query(&self, query: &Query) -> Result<Vec<Row>> {
        let mut rows: Vec<_> = self
            .tables
            .get(&query.table)
            .into_iter()
            .flatten()
            .filter(|row| {
                query
                    .filter
                    .iter()
                    .all(|(column, value)| row.get(column) == Some(&value.to_string()))
            })
            .collect();
        rows.sort_by(|a, b| {
            compare(
                a.get(&query.order_by).map(String::as_str),
                b.get(&query.order_by).map(String::as_str),
            )
        });

        Ok(rows
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|row| Row {
                values: query
                    .columns
                    .iter()
                    .map(|column| (*column, row.get(column).cloned()))
                    .collect(),
            })
            .collect())
    }
}
