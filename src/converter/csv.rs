//! Geo-IP CSV dataset parser.
//!
//! One range per line, ten columns, usually double quoted:
//!
//! ```text
//! "low","high","cc","country","state","city","lat","lon","zip","tz"
//! ```
//!
//! Addresses may be dotted quads or decimal integers. A CIDR block in the
//! low column with an empty high column is accepted as well.

use flate2::read::GzDecoder;
use ipnet::Ipv4Net;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::Path;

use crate::coordinate::Coordinates;
use crate::range::{Range, IPV4_LEN};
use crate::{Entry, Error, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a dataset file, decompressing it if it is gzip encoded.
pub fn open_dataset(path: &Path) -> Result<Box<dyn BufRead>> {
    let mut reader = BufReader::new(File::open(path)?);
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if is_gzip {
        log::debug!("Reading gzip dataset {}", path.display());
        Ok(Box::new(BufReader::new(GzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Parse an IPv4 address in dotted or decimal integer form.
pub fn parse_address(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Ok(addr) = s.parse::<Ipv4Addr>() {
        return Ok(u32::from(addr));
    }
    s.parse::<u32>()
        .map_err(|_| Error::InvalidAddress(s.to_string()))
}

/// Geo-IP CSV dataset parser.
pub struct CsvParser;

impl CsvParser {
    /// Parse every row of a dataset.
    ///
    /// Blank lines and `#` comments are ignored. Malformed rows are logged
    /// and skipped; read errors abort the parse.
    pub fn parse<R: BufRead>(reader: R) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match Self::parse_line(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    skipped += 1;
                    log::warn!("Skipping dataset line {}: {}", idx + 1, e);
                }
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {} malformed dataset rows", skipped);
        }
        Ok(entries)
    }

    /// Parse a dataset file, gzip or plain.
    pub fn parse_file(path: &Path) -> Result<Vec<Entry>> {
        Self::parse(open_dataset(path)?)
    }

    /// Parse a single row into an entry.
    pub fn parse_line(line: &str) -> Result<Entry> {
        let mut columns = split_columns(line).into_iter();
        let mut next = || columns.next().unwrap_or_default();

        let low = next();
        let high = next();
        let range = parse_range(&low, &high)?;

        let country_code = next();
        let country = next();
        let state = next();
        let city = next();
        let latitude = next();
        let longitude = next();
        let zip = next();
        let tz = next();

        Ok(Entry {
            range,
            country_code,
            country,
            state,
            city,
            zip,
            tz,
            coordinates: Coordinates::parse(&latitude, &longitude)?,
        })
    }
}

fn parse_range(low: &str, high: &str) -> Result<Range> {
    if high.is_empty() && low.contains('/') {
        let net: Ipv4Net = low
            .parse()
            .map_err(|_| Error::InvalidAddress(low.to_string()))?;
        return Ok(Range::from(net));
    }
    if low.is_empty() {
        return Err(Error::InvalidAddress("missing low address".to_string()));
    }
    if high.is_empty() {
        return Err(Error::InvalidAddress(format!("missing high address for {}", low)));
    }
    Ok(Range::new(IPV4_LEN, parse_address(low)?, parse_address(high)?))
}

/// Split a row into trimmed columns.
///
/// Quoted columns may contain commas and `""` escapes.
fn split_columns(line: &str) -> Vec<String> {
    let mut columns = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                columns.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    columns.push(current.trim().to_string());
    columns
}
