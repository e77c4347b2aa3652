//! Decoder for Suica-family (FeliCa) transit card history records.
//!
//! [felica::cybernet] turns raw 16-byte history blocks into [felica::cybernet::HistoryRecord]s,
//! and [stations] resolves the station codes embedded in them against a station database.
pub mod bits;
pub mod felica;
pub mod stations;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid date: {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("invalid time: {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },

    #[error("couldn't parse record: {0:?}")]
    Parse(nom::error::ErrorKind),

    #[error("record truncated: {0:?}")]
    Incomplete(nom::Needed),

    #[error("station database: {0}")]
    SQLite(#[from] rusqlite::Error),
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match err {
            nom::Err::Error(err) | nom::Err::Failure(err) => Self::Parse(err.code),
            nom::Err::Incomplete(needed) => Self::Incomplete(needed),
        }
    }
}
