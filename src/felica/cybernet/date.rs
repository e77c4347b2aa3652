//! Packed dates and times.
//!
//! Dates are packed into a big-endian word as `YYYYYYYM MMMDDDDD`, where the year is an offset
//! from 2000 and the month is 1-based. Product sales also record a time, packed the same way as
//! `HHHHHMMM MMM?????` (the low 5 bits are presumably seconds/2, but nobody's confirmed that).
//!
//! The card doesn't know what timezone it's in; it's whatever the terminal's clock said, which
//! for all practical purposes is JST. We hand back naive timestamps and let the caller decide.
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::trace;

use crate::bits::word_at;
use crate::felica::Block;
use crate::{Error, Result};

pub const DATE_OFFSET: usize = 4;
pub const TIME_OFFSET: usize = 6;

/// Unpacks a date word into (year, month, day), without validating it.
pub fn unpack_date(v: u16) -> (i32, u32, u32) {
    (
        2000 + (v >> 9) as i32,
        ((v >> 5) & 0x000f).into(),
        (v & 0x001f).into(),
    )
}

/// Unpacks a time word into (hour, minute), without validating it.
pub fn unpack_time(v: u16) -> (u32, u32) {
    ((v >> 11).into(), ((v >> 5) & 0x003f).into())
}

/// Extracts the timestamp of a history record.
///
/// Returns `Ok(None)` if no date was recorded (the date word is zero). Only product sales carry
/// a time of day; everything else is stamped at midnight, whatever bytes 6-7 happen to contain.
///
/// Nothing stops a terminal from writing 31st of February, and we don't paper over it: dates and
/// times that don't exist are rejected with [Error::InvalidDate] or [Error::InvalidTime].
pub fn extract_date(is_product_sale: bool, block: &Block) -> Result<Option<NaiveDateTime>> {
    let data = block.as_bytes();
    let v = word_at(data, DATE_OFFSET);
    if v == 0 {
        return Ok(None);
    }

    let (year, month, day) = unpack_date(v);
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(Error::InvalidDate { year, month, day })?;

    let (hour, minute) = if is_product_sale {
        unpack_time(word_at(data, TIME_OFFSET))
    } else {
        (0, 0)
    };
    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or(Error::InvalidTime { hour, minute })?;

    trace!(%date, %time, is_product_sale, "Extracted date");
    Ok(Some(date.and_time(time)))
}
