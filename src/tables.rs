//! The string lookup tables between the ASCII header and the bit-packed
//! data.
//!
//! Stations refer to their units, timezone, country, datum, and so on by
//! small indices into fixed-slot string tables. The tables sit back to
//! back after the header (and a four-byte checksum), in a defined order,
//! and walking them is also how the byte offsets of the constituent
//! matrices and the station records are found: there is no directory in
//! the file, only arithmetic.

use crate::header::TableLayout;
use crate::{Error, Header, Result};
use byteorder::{BigEndian, ReadBytesExt};
use log::debug;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// The slot contents that end a sentinel-shaped table early.
const END_SLOT: &str = "__END__";

/// Every decoded lookup table, plus the section offsets found along the
/// way.
#[derive(Clone, Debug)]
pub(crate) struct Tables {
    pub level_units: Vec<String>,
    pub direction_units: Vec<String>,
    pub restrictions: Vec<String>,
    pub timezones: Vec<String>,
    pub countries: Vec<String>,
    pub datums: Vec<String>,
    pub legaleses: Vec<String>,
    pub constituent_names: Vec<String>,
    pub checksum: u32,
    pub constituent_data_offset: u64,
    pub station_records_offset: u64,
}

impl Tables {
    /// Reads all tables, leaving the source positioned wherever the last
    /// read put it. Callers seek to the returned offsets instead.
    pub fn read_from<R: Read + Seek>(read: &mut R, header: &Header) -> Result<Tables> {
        let _ = read.seek(SeekFrom::Start(u64::from(header.header_size())))?;
        let checksum = match read.read_u32::<BigEndian>() {
            Ok(checksum) => checksum,
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Err(Error::Truncated),
            Err(err) => return Err(err.into()),
        };

        let level_units = read_exact_table(read, header.level_units_layout())?;
        let direction_units = read_exact_table(read, header.direction_units_layout())?;
        let restrictions = read_sentinel_table(read, header.restrictions_layout())?;
        if let Some(pedigrees) = header.pedigrees_layout() {
            // Pre-v2 pedigree strings are dead weight; skip the allocation.
            let _ = read.seek(SeekFrom::Current(pedigrees.byte_len() as i64))?;
        }
        let timezones = read_sentinel_table(read, header.timezones_layout())?
            .into_iter()
            .map(|timezone| {
                timezone
                    .strip_prefix(':')
                    .map(String::from)
                    .unwrap_or(timezone)
            })
            .collect();
        let countries = read_sentinel_table(read, header.countries_layout())?;
        let datums = read_sentinel_table(read, header.datums_layout())?;
        let legaleses = match header.legaleses_layout() {
            Some(layout) => read_sentinel_table(read, layout)?,
            None => vec!["NULL".to_string()],
        };
        let constituent_names = read_exact_table(read, header.constituent_names_layout())?;

        let constituent_data_offset = read.stream_position()?;
        let constituents = u64::from(header.constituent_count());
        let years = u64::from(header.number_of_years());
        let station_records_offset = constituent_data_offset
            + section_bytes(constituents * u64::from(header.speed().bits), header)
            + section_bytes(constituents * years * u64::from(header.equilibrium().bits), header)
            + section_bytes(constituents * years * u64::from(header.node_factor().bits), header);
        debug!(
            "lookup tables read: constituent data at {}, station records at {}",
            constituent_data_offset, station_records_offset
        );

        Ok(Tables {
            level_units,
            direction_units,
            restrictions,
            timezones,
            countries,
            datums,
            legaleses,
            constituent_names,
            checksum,
            constituent_data_offset,
            station_records_offset,
        })
    }

    /// The string a station's decoded index points at, or empty if the
    /// index runs past the table.
    pub fn lookup(table: &[String], index: u32) -> String {
        table.get(index as usize).cloned().unwrap_or_default()
    }
}

/// Bytes each bit-packed constituent section occupies on disk.
///
/// v2 rounds up; v1 always pads with one whole byte per section, even when
/// the bits already fill the last byte exactly.
fn section_bytes(bits: u64, header: &Header) -> u64 {
    if header.is_v1() {
        bits / 8 + 1
    } else {
        bits.div_ceil(8)
    }
}

fn read_slot<R: Read>(read: &mut R, buf: &mut [u8]) -> Result<String> {
    read.read_exact(buf).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            Error::Truncated
        } else {
            Error::Io(err)
        }
    })?;
    Ok(decode_slot(buf))
}

/// ISO-8859-1, truncated at the first zero byte.
fn decode_slot(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end].iter().map(|&b| char::from(b)).collect()
}

fn read_exact_table<R: Read>(read: &mut R, layout: TableLayout) -> Result<Vec<String>> {
    let mut buf = vec![0; layout.slot_size as usize];
    let mut table = Vec::with_capacity(layout.slots as usize);
    for _ in 0..layout.slots {
        table.push(read_slot(read, &mut buf)?);
    }
    Ok(table)
}

/// Reads slots until the `__END__` sentinel, but always consumes the full
/// allocation: slots past the sentinel still occupy file space.
fn read_sentinel_table<R: Read + Seek>(read: &mut R, layout: TableLayout) -> Result<Vec<String>> {
    let mut buf = vec![0; layout.slot_size as usize];
    let mut table = Vec::new();
    for index in 0..layout.slots {
        let slot = read_slot(read, &mut buf)?;
        if slot.trim() == END_SLOT {
            let unused = (layout.slots - index - 1) * u64::from(layout.slot_size);
            let _ = read.seek(SeekFrom::Current(unused as i64))?;
            break;
        }
        table.push(slot);
    }
    Ok(table)
}
