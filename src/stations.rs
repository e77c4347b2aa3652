//! Station code resolution.
//!
//! Cards only record numeric codes for where things happened. Turning those into names needs a
//! station database; the one everyone uses is the `felica_stations.db` that's floated around
//! since the nfc-felica days, which is what the column names here follow.
//!
//! The database is treated as an opaque lookup service ([StationTable]), with a SQLite adapter
//! ([sqlite::SqliteStations]) for the real thing and an in-memory one ([memory::MemoryStations])
//! for everything else.
pub mod memory;
pub mod sqlite;

pub use memory::MemoryStations;
pub use sqlite::SqliteStations;

use std::fmt;

use tracing::{debug, error, trace_span, warn};

use crate::felica::cybernet::StationCode;
use crate::{Error, Result};

/// Which station table to look things up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Rail stations, keyed by area, line and station.
    Rail,
    /// Bus stops (from IruCa-type cards), keyed by line and stop.
    Bus,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rail => "StationCode",
            Self::Bus => "IruCaStationCode",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    AreaCode,
    LineCode,
    StationCode,
    CompanyName,
    CompanyNameEn,
    LineName,
    LineNameEn,
    StationName,
    StationNameEn,
    Latitude,
    Longitude,
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::AreaCode => "AreaCode",
            Self::LineCode => "LineCode",
            Self::StationCode => "StationCode",
            Self::CompanyName => "CompanyName",
            Self::CompanyNameEn => "CompanyName_en",
            Self::LineName => "LineName",
            Self::LineNameEn => "LineName_en",
            Self::StationName => "StationName",
            Self::StationNameEn => "StationName_en",
            Self::Latitude => "Latitude",
            Self::Longitude => "Longitude",
        }
    }
}

pub const RAIL_COLUMNS: &[Column] = &[
    Column::Id,
    Column::CompanyName,
    Column::LineName,
    Column::StationName,
    Column::CompanyNameEn,
    Column::LineNameEn,
    Column::StationNameEn,
    Column::Latitude,
    Column::Longitude,
];

pub const BUS_COLUMNS: &[Column] = &[
    Column::Id,
    Column::CompanyName,
    Column::StationName,
    Column::CompanyNameEn,
    Column::StationNameEn,
];

/// A query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// A query against a station table: `SELECT columns FROM table WHERE filter ORDER BY order_by`.
/// Filters are all equality, joined with AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: Table,
    pub columns: &'static [Column],
    pub filter: Vec<(Column, Value)>,
    pub order_by: Column,
    pub limit: Option<usize>,
}

/// A result row. Values are kept as text, since that's how the station database stores
/// everything that matters (coordinates included).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Row {
    pub values: Vec<(Column, Option<String>)>,
}

impl Row {
    pub fn get(&self, column: Column) -> Option<&str> {
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .and_then(|(_, v)| v.as_deref())
    }
}

/// A station database. Implementations must be safe to query from multiple threads at once.
pub trait StationTable: Send + Sync {
    fn query(&self, query: &Query) -> Result<Vec<Row>>;
}

impl<T: StationTable + ?Sized> StationTable for &T {
    fn query(&self, query: &Query) -> Result<Vec<Row>> {
        (**self).query(query)
    }
}

impl<T: StationTable + ?Sized> StationTable for Box<T> {
    fn query(&self, query: &Query) -> Result<Vec<Row>> {
        (**self).query(query)
    }
}

/// Which set of names to return. The database has Japanese names, and (mostly) English ones.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// Japanese.
    Native,
    /// English.
    #[default]
    Alternate,
}

impl Language {
    /// Picks a language from a POSIX-ish locale tag, eg. `ja_JP.UTF-8` or `en-GB`.
    pub fn from_locale(tag: &str) -> Self {
        let lang = tag.split(['_', '-', '.', '@']).next().unwrap_or_default();
        if lang.eq_ignore_ascii_case("ja") {
            Self::Native
        } else {
            Self::Alternate
        }
    }

    fn pick(self, native: Column, alternate: Column) -> Column {
        match self {
            Self::Native => native,
            Self::Alternate => alternate,
        }
    }
}

/// A location code, as found in a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationKey {
    /// The record's region byte. Only the top two bits (the "area") matter for rail lookups.
    pub region: u8,
    pub line: u16,
    pub station: u16,
    pub is_bus: bool,
}

impl LocationKey {
    pub fn rail(region: u8, code: StationCode) -> Self {
        Self {
            region,
            line: code.line,
            station: code.station,
            is_bus: false,
        }
    }

    pub fn bus(region: u8, code: StationCode) -> Self {
        Self {
            region,
            line: code.line,
            station: code.station,
            is_bus: true,
        }
    }

    pub fn area(&self) -> u8 {
        self.region >> 6
    }

    /// Builds the lookup query for this key. Bus codes are matched as (lowercase, unpadded) hex
    /// strings, because that's how the bus table stores them.
    pub fn query(&self) -> Query {
        if self.is_bus {
            Query {
                table: Table::Bus,
                columns: BUS_COLUMNS,
                filter: vec![
                    (Column::LineCode, Value::Text(format!("{:x}", self.line))),
                    (Column::StationCode, Value::Text(format!("{:x}", self.station))),
                ],
                order_by: Column::Id,
                limit: Some(1),
            }
        } else {
            Query {
                table: Table::Rail,
                columns: RAIL_COLUMNS,
                filter: vec![
                    (Column::AreaCode, Value::Int((self.area() & 0xFF).into())),
                    (Column::LineCode, Value::Int((self.line & 0xFF).into())),
                    (Column::StationCode, Value::Int((self.station & 0xFF).into())),
                ],
                order_by: Column::Id,
                limit: Some(1),
            }
        }
    }
}

/// A resolved station (or bus stop).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Station {
    pub company_name: Option<String>,
    /// Always None for bus stops.
    pub line_name: Option<String>,
    pub station_name: Option<String>,
    /// Coordinates, verbatim from the database. Always None for bus stops.
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl Station {
    fn from_row(row: &Row, is_bus: bool, lang: Language) -> Self {
        let text = |column| row.get(column).map(str::to_owned);
        if is_bus {
            Self {
                company_name: text(lang.pick(Column::CompanyName, Column::CompanyNameEn)),
                station_name: text(lang.pick(Column::StationName, Column::StationNameEn)),
                ..Default::default()
            }
        } else {
            Self {
                company_name: text(lang.pick(Column::CompanyName, Column::CompanyNameEn)),
                line_name: text(lang.pick(Column::LineName, Column::LineNameEn)),
                station_name: text(lang.pick(Column::StationName, Column::StationNameEn)),
                latitude: text(Column::Latitude),
                longitude: text(Column::Longitude),
            }
        }
    }
}

/// The outcome of a lookup.
#[derive(Debug)]
pub enum Resolution {
    Found(Station),
    /// The database doesn't know about this station. This is pretty common.
    NotFound,
    /// The database couldn't be queried.
    Fault(Error),
}

impl Resolution {
    pub fn ok(self) -> Option<Station> {
        match self {
            Self::Found(station) => Some(station),
            Self::NotFound | Self::Fault(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Resolves [LocationKey]s against a [StationTable].
#[derive(Debug, Clone)]
pub struct StationResolver<T> {
    table: T,
}

impl<T: StationTable> StationResolver<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Looks up a station. Misses and database errors are logged here, so callers can just
    /// use [Resolution::ok] if they don't care why a station couldn't be found.
    pub fn resolve(&self, key: &LocationKey, lang: Language) -> Resolution {
        let span = trace_span!("resolve", ?key, ?lang);
        let _enter = span.enter();

        let query = key.query();
        debug!(?query, "Querying station table");
        match self.table.query(&query) {
            Ok(rows) => match rows.into_iter().next() {
                Some(row) => Resolution::Found(Station::from_row(&row, key.is_bus, lang)),
                None => {
                    warn!(
                        "Unknown {} station: r: 0x{:x} a: 0x{:x} l: 0x{:x} s: 0x{:x}",
                        if key.is_bus { "bus" } else { "rail" },
                        key.region,
                        key.area(),
                        key.line,
                        key.station,
                    );
                    Resolution::NotFound
                }
            },
            Err(err) => {
                error!(%err, table = query.table.name(), "Couldn't query station table");
                Resolution::Fault(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn odakyu() -> MemoryStations {
        let mut db = MemoryStations::default();
        db.insert(
            Table::Rail,
            [
                (Column::Id, "4242"),
                (Column::AreaCode, "0"),
                (Column::LineCode, "224"),
                (Column::StationCode, "46"),
                (Column::CompanyName, "小田急電鉄"),
                (Column::LineName, "小田原"),
                (Column::StationName, "東海大学前"),
                (Column::CompanyNameEn, "Odakyu Electric Railway"),
                (Column::LineNameEn, "Odawara"),
                (Column::StationNameEn, "Tokaidaigaku-mae"),
                (Column::Latitude, "35.3667"),
                (Column::Longitude, "139.2544"),
            ],
        );
        // Same codes, later ID; should never win.
        db.insert(
            Table::Rail,
            [
                (Column::Id, "9999"),
                (Column::AreaCode, "0"),
                (Column::LineCode, "224"),
                (Column::StationCode, "46"),
                (Column::StationNameEn, "Impostor"),
            ],
        );
        db.insert(
            Table::Bus,
            [
                (Column::Id, "1"),
                (Column::LineCode, "12c"),
                (Column::StationCode, "3f"),
                (Column::CompanyName, "琴平バス"),
                (Column::StationName, "琴平駅"),
                (Column::CompanyNameEn, "Kotohira Bus"),
                (Column::StationNameEn, "Kotohira Station"),
            ],
        );
        db
    }

    fn rail_key() -> LocationKey {
        LocationKey::rail(
            0x00,
            StationCode {
                line: 0xE0,
                station: 0x2E,
            },
        )
    }

    fn bus_key() -> LocationKey {
        LocationKey::bus(
            0x40,
            StationCode {
                line: 0x012C,
                station: 0x003F,
            },
        )
    }

    #[test]
    fn test_language_from_locale() {
        assert_eq!(Language::from_locale("ja"), Language::Native);
        assert_eq!(Language::from_locale("ja_JP.UTF-8"), Language::Native);
        assert_eq!(Language::from_locale("JA-jp"), Language::Native);
        assert_eq!(Language::from_locale("en_GB.UTF-8"), Language::Alternate);
        assert_eq!(Language::from_locale("jam"), Language::Alternate);
        assert_eq!(Language::from_locale(""), Language::Alternate);
    }

    #[test]
    fn test_location_key_area() {
        assert_eq!(LocationKey::rail(0x00, StationCode { line: 1, station: 1 }).area(), 0);
        assert_eq!(LocationKey::rail(0x40, StationCode { line: 1, station: 1 }).area(), 1);
        assert_eq!(LocationKey::rail(0xFF, StationCode { line: 1, station: 1 }).area(), 3);
    }

    #[test]
    fn test_rail_query() {
        let query = LocationKey::rail(
            0xC3,
            StationCode {
                line: 0x1E0,
                station: 0x2E,
            },
        )
        .query();
        assert_eq!(query.table, Table::Rail);
        assert_eq!(
            query.filter,
            vec![
                (Column::AreaCode, Value::Int(3)),
                (Column::LineCode, Value::Int(0xE0)),
                (Column::StationCode, Value::Int(0x2E)),
            ]
        );
        assert_eq!(query.order_by, Column::Id);
    }

    #[test]
    fn test_bus_query() {
        let query = bus_key().query();
        assert_eq!(query.table, Table::Bus);
        assert_eq!(query.columns, BUS_COLUMNS);
        assert_eq!(
            query.filter,
            vec![
                (Column::LineCode, Value::Text("12c".into())),
                (Column::StationCode, Value::Text("3f".into())),
            ]
        );
    }

    #[test]
    fn test_resolve_rail_native() {
        let resolver = StationResolver::new(odakyu());
        assert_eq!(
            resolver.resolve(&rail_key(), Language::Native).ok(),
            Some(Station {
                company_name: Some("小田急電鉄".into()),
                line_name: Some("小田原".into()),
                station_name: Some("東海大学前".into()),
                latitude: Some("35.3667".into()),
                longitude: Some("139.2544".into()),
            })
        );
    }

    #[test]
    fn test_resolve_rail_alternate() {
        let resolver = StationResolver::new(odakyu());
        assert_eq!(
            resolver.resolve(&rail_key(), Language::Alternate).ok(),
            Some(Station {
                company_name: Some("Odakyu Electric Railway".into()),
                line_name: Some("Odawara".into()),
                station_name: Some("Tokaidaigaku-mae".into()),
                latitude: Some("35.3667".into()),
                longitude: Some("139.2544".into()),
            })
        );
    }

    #[test]
    fn test_resolve_bus() {
        let resolver = StationResolver::new(odakyu());
        assert_eq!(
            resolver.resolve(&bus_key(), Language::Alternate).ok(),
            Some(Station {
                company_name: Some("Kotohira Bus".into()),
                station_name: Some("Kotohira Station".into()),
                ..Default::default()
            })
        );
        assert_eq!(
            resolver.resolve(&bus_key(), Language::Native).ok(),
            Some(Station {
                company_name: Some("琴平バス".into()),
                station_name: Some("琴平駅".into()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_resolve_not_found() {
        let resolver = StationResolver::new(odakyu());
        let key = LocationKey::rail(
            0x40,
            StationCode {
                line: 0xE0,
                station: 0x2E,
            },
        );
        assert!(matches!(
            resolver.resolve(&key, Language::Native),
            Resolution::NotFound
        ));
        // Rail codes don't leak into the bus table, or vice versa.
        let key = LocationKey::bus(
            0x00,
            StationCode {
                line: 0xE0,
                station: 0x2E,
            },
        );
        assert!(matches!(
            resolver.resolve(&key, Language::Native),
            Resolution::NotFound
        ));
    }

    #[test]
    fn test_resolve_idempotent() {
        let resolver = StationResolver::new(odakyu());
        let first = resolver.resolve(&rail_key(), Language::Native).ok();
        for _ in 0..3 {
            assert_eq!(resolver.resolve(&rail_key(), Language::Native).ok(), first);
        }
    }

    struct Broken;

    impl StationTable for Broken {
        fn query(&self, _query: &Query) -> Result<Vec<Row>> {
            Err(Error::SQLite(rusqlite::Error::InvalidQuery))
        }
    }

    #[test]
    fn test_resolve_fault() {
        let resolver = StationResolver::new(Broken);
        match resolver.resolve(&rail_key(), Language::Native) {
            Resolution::Fault(Error::SQLite(rusqlite::Error::InvalidQuery)) => {}
            v => panic!("wrong result: {:?}", v),
        }
    }

    #[test]
    fn test_resolve_through_reference() {
        let db = odakyu();
        let resolver = StationResolver::new(&db);
        assert!(resolver.resolve(&rail_key(), Language::Native).is_found());
    }

    #[test]
    fn test_resolve_from_threads() {
        let db = odakyu();
        let resolver = StationResolver::new(&db);
        let expected = (
            resolver.resolve(&rail_key(), Language::Native).ok(),
            resolver.resolve(&bus_key(), Language::Alternate).ok(),
        );
        assert!(expected.0.is_some() && expected.1.is_some());

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        (0..32)
                            .map(|_| {
                                (
                                    resolver.resolve(&rail_key(), Language::Native).ok(),
                                    resolver.resolve(&bus_key(), Language::Alternate).ok(),
                                )
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            for handle in handles {
                for got in handle.join().unwrap() {
                    assert_eq!(got, expected);
                }
            }
        });
    }
}
