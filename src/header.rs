//! The ASCII header that leads every TCD file.
//!
//! A TCD file is self-describing: an ASCII block of `[KEY] = VALUE` lines,
//! closed by `[END OF ASCII HEADER DATA]`, carries every field width, scale
//! divisor, and table size used by the bit-packed sections that follow. No
//! width in this crate is a constant; they all come from here.
//!
//! # Examples
//!
//! ```
//! use tcd::Header;
//!
//! let text = "\
//! [VERSION] = harmonics-dwf-20071228-free
//! [MAJOR REV] = 2
//! [MINOR REV] = 2
//! [HEADER SIZE] = 4096
//! [NUMBER OF RECORDS] = 3351
//! [START YEAR] = 1970
//! [NUMBER OF YEARS] = 68
//! [CONSTITUENTS] = 2
//! [CONSTITUENT BITS] = 8
//! [CONSTITUENT SIZE] = 10
//! [SPEED BITS] = 31
//! [SPEED SCALE] = 10000000
//! [SPEED OFFSET] = -410667
//! [EQUILIBRIUM BITS] = 16
//! [EQUILIBRIUM SCALE] = 100
//! [NODE BITS] = 15
//! [NODE SCALE] = 10000
//! [AMPLITUDE BITS] = 19
//! [AMPLITUDE SCALE] = 10000
//! [EPOCH BITS] = 16
//! [EPOCH SCALE] = 100
//! [RECORD SIZE BITS] = 16
//! [RECORD TYPE BITS] = 4
//! [STATION BITS] = 18
//! [LATITUDE BITS] = 25
//! [LATITUDE SCALE] = 100000
//! [LONGITUDE BITS] = 26
//! [LONGITUDE SCALE] = 100000
//! [DATUM OFFSET BITS] = 28
//! [DATUM OFFSET SCALE] = 10000
//! [DATE BITS] = 27
//! [MONTHS ON STATION BITS] = 10
//! [CONFIDENCE VALUE BITS] = 4
//! [TIME BITS] = 13
//! [LEVEL ADD BITS] = 16
//! [LEVEL ADD SCALE] = 100
//! [LEVEL MULTIPLY BITS] = 16
//! [LEVEL MULTIPLY SCALE] = 1000
//! [DIRECTION BITS] = 9
//! [LEVEL UNIT BITS] = 3
//! [LEVEL UNIT TYPES] = 6
//! [LEVEL UNIT SIZE] = 15
//! [DIRECTION UNIT BITS] = 2
//! [DIRECTION UNIT TYPES] = 3
//! [DIRECTION UNIT SIZE] = 15
//! [RESTRICTION BITS] = 4
//! [RESTRICTION SIZE] = 30
//! [TZFILE BITS] = 10
//! [TZFILE SIZE] = 30
//! [COUNTRY BITS] = 9
//! [COUNTRY SIZE] = 50
//! [DATUM BITS] = 7
//! [DATUM SIZE] = 70
//! [LEGALESE BITS] = 4
//! [LEGALESE SIZE] = 70
//! [END OF ASCII HEADER DATA]
//! ";
//! let header = Header::read_from(&mut text.as_bytes()).unwrap();
//! assert_eq!(3351, header.number_of_records());
//! assert_eq!(1970..2038, header.year_range());
//! ```

use crate::{Error, Result};
use byteorder::ReadBytesExt;
use std::collections::{HashMap, HashSet};
use std::io::{ErrorKind, Read};

/// The line that closes the ASCII region.
const END_OF_ASCII: &str = "[END OF ASCII HEADER DATA]";

/// A header value the decoder does not recognize.
///
/// Recognized keys are parsed into typed [Header] fields; everything else
/// lands in a side map, typed by shape: an optional sign followed by digits
/// is an integer, a parseable value containing a decimal point is a float,
/// anything else is text.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// An integer value.
    Integer(i64),
    /// A floating-point value.
    Float(f64),
    /// A text value.
    Text(String),
}

impl Value {
    fn parse(s: &str) -> Value {
        let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
        if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = s.parse() {
                return Value::Integer(n);
            }
        }
        if s.contains('.') {
            if let Ok(n) = s.parse() {
                return Value::Float(n);
            }
        }
        Value::Text(s.to_string())
    }
}

/// The width, pre-divisor addend, and divisor of one packed numeric field.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FieldCoding {
    pub bits: u32,
    pub offset: f64,
    pub scale: f64,
}

/// Allocated slot count, per-slot byte size, and index width of one
/// lookup table.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TableLayout {
    pub slots: u64,
    pub slot_size: u32,
    /// Width of the indices station records use to reference this table.
    pub index_bits: u32,
}

impl TableLayout {
    /// Total file bytes the table occupies.
    pub fn byte_len(&self) -> u64 {
        self.slots * u64::from(self.slot_size)
    }
}

/// The parsed ASCII header.
///
/// Construction validates the required keys (header size, record count,
/// constituent count, start year, number of years) and every field width;
/// a header that fails validation never reaches the later decode stages.
#[derive(Clone, Debug)]
pub struct Header {
    version: String,
    last_modified: String,
    major_rev: u32,
    minor_rev: u32,
    header_size: u32,
    number_of_records: u32,
    start_year: i32,
    number_of_years: u32,
    constituent_count: u32,
    end_of_file: Option<u64>,

    speed: FieldCoding,
    equilibrium: FieldCoding,
    node_factor: FieldCoding,
    amplitude: FieldCoding,
    epoch: FieldCoding,
    datum_offset: FieldCoding,
    level_add: FieldCoding,
    level_multiply: FieldCoding,
    latitude: FieldCoding,
    longitude: FieldCoding,

    record_size_bits: u32,
    record_type_bits: u32,
    station_bits: u32,
    time_bits: u32,
    date_bits: u32,
    months_on_station_bits: u32,
    confidence_value_bits: u32,
    constituent_bits: u32,
    direction_bits: u32,

    level_units: TableLayout,
    direction_units: TableLayout,
    restrictions: TableLayout,
    pedigrees: Option<TableLayout>,
    timezones: TableLayout,
    countries: TableLayout,
    datums: TableLayout,
    legaleses: Option<TableLayout>,
    constituent_names: TableLayout,

    extra: HashMap<String, Value>,
}

impl Header {
    /// Reads the ASCII header from the start of a TCD source.
    ///
    /// Consumes bytes up to and including the `[END OF ASCII HEADER DATA]`
    /// line; callers seek to [header_size](Self::header_size) afterwards
    /// rather than relying on the read position.
    ///
    /// # Examples
    ///
    /// ```
    /// use tcd::Header;
    /// let text = "[HEADER SIZE] = 100\n[END OF ASCII HEADER DATA]\n";
    /// // Fails: most of the required keys are missing.
    /// assert!(Header::read_from(&mut text.as_bytes()).is_err());
    /// ```
    pub fn read_from<R: Read>(read: &mut R) -> Result<Header> {
        let mut fields = Fields::read_from(read)?;
        let header_size = fields.required_u32("header_size")?;
        let number_of_records = fields.required_u32("number_of_records")?;
        let constituent_count = fields.required_u32("constituents")?;
        let start_year = fields.required_i32("start_year")?;
        let number_of_years = fields.required_u32("number_of_years")?;

        let major_rev = fields.optional_u32("major_rev")?.unwrap_or(0);
        let minor_rev = fields.optional_u32("minor_rev")?.unwrap_or(0);
        let pre_v2 = major_rev < 2;

        let constituent_bits = fields.bits("constituent_bits")?;
        let level_units = TableLayout {
            slots: u64::from(fields.required_u32("level_unit_types")?),
            slot_size: fields.required_u32("level_unit_size")?,
            index_bits: fields.bits("level_unit_bits")?,
        };
        let direction_units = TableLayout {
            slots: u64::from(fields.required_u32("direction_unit_types")?),
            slot_size: fields.required_u32("direction_unit_size")?,
            index_bits: fields.bits("direction_unit_bits")?,
        };
        let restrictions = fields.sentinel_layout("restriction")?;
        let pedigrees = if pre_v2 {
            Some(fields.sentinel_layout("pedigree")?)
        } else {
            // Harmless leftover keys in a v2 file describe no table.
            let _ = fields.optional_u32("pedigree_bits")?;
            let _ = fields.optional_u32("pedigree_size")?;
            None
        };
        let timezones = fields.sentinel_layout("tzfile")?;
        let countries = fields.sentinel_layout("country")?;
        let datums = fields.sentinel_layout("datum")?;
        let legaleses = if pre_v2 {
            let _ = fields.optional_u32("legalese_bits")?;
            let _ = fields.optional_u32("legalese_size")?;
            None
        } else if fields.has("legalese_bits") {
            Some(fields.sentinel_layout("legalese")?)
        } else {
            None
        };
        let constituent_names = TableLayout {
            slots: u64::from(constituent_count),
            slot_size: fields.required_u32("constituent_size")?,
            index_bits: constituent_bits,
        };

        let header = Header {
            version: fields.text("version"),
            last_modified: fields.text("last_modified"),
            major_rev,
            minor_rev,
            header_size,
            number_of_records,
            start_year,
            number_of_years,
            constituent_count,
            end_of_file: fields.optional_u64("end_of_file")?,
            speed: fields.coding("speed")?,
            equilibrium: fields.coding("equilibrium")?,
            node_factor: fields.coding("node")?,
            amplitude: fields.coding("amplitude")?,
            epoch: fields.coding("epoch")?,
            datum_offset: fields.coding("datum_offset")?,
            level_add: fields.coding("level_add")?,
            level_multiply: fields.coding("level_multiply")?,
            latitude: fields.coding("latitude")?,
            longitude: fields.coding("longitude")?,
            record_size_bits: fields.bits("record_size_bits")?,
            record_type_bits: fields.bits("record_type_bits")?,
            station_bits: fields.bits("station_bits")?,
            time_bits: fields.bits("time_bits")?,
            date_bits: fields.bits("date_bits")?,
            months_on_station_bits: fields.bits("months_on_station_bits")?,
            confidence_value_bits: fields.bits("confidence_value_bits")?,
            constituent_bits,
            direction_bits: fields.bits("direction_bits")?,
            level_units,
            direction_units,
            restrictions,
            pedigrees,
            timezones,
            countries,
            datums,
            legaleses,
            constituent_names,
            extra: HashMap::new(),
        };
        Ok(Header {
            extra: fields.into_extra(),
            ..header
        })
    }

    /// Returns the version text, e.g. the producing library and the
    /// harmonics data release.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the free-form last-modified text.
    pub fn last_modified(&self) -> &str {
        &self.last_modified
    }

    /// Returns the format major revision.
    ///
    /// Files without a `[MAJOR REV]` key report 0 and are treated as
    /// pre-v2.
    pub fn major_rev(&self) -> u32 {
        self.major_rev
    }

    /// Returns the format minor revision.
    pub fn minor_rev(&self) -> u32 {
        self.minor_rev
    }

    /// Returns true if this file predates format v2.
    ///
    /// Pre-v2 files carry a pedigree table and use the "wasted byte"
    /// rounding for the constituent matrices; their station records are
    /// not decoded by this crate.
    pub fn is_v1(&self) -> bool {
        self.major_rev < 2
    }

    /// Returns the byte size of the ASCII header region.
    ///
    /// The binary sections start at this offset regardless of where the
    /// terminator line ends.
    pub fn header_size(&self) -> u32 {
        self.header_size
    }

    /// Returns the number of station records in the file.
    pub fn number_of_records(&self) -> u32 {
        self.number_of_records
    }

    /// Returns the number of harmonic constituents.
    pub fn constituent_count(&self) -> u32 {
        self.constituent_count
    }

    /// Returns the first year covered by the per-year tables.
    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    /// Returns the number of years covered by the per-year tables.
    pub fn number_of_years(&self) -> u32 {
        self.number_of_years
    }

    /// Returns the half-open range of years covered by the per-year
    /// equilibrium argument and node factor tables.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use tcd::Database;
    /// let mut database = Database::from_path("harmonics.tcd").unwrap();
    /// assert!(database.header().year_range().contains(&2026));
    /// ```
    pub fn year_range(&self) -> std::ops::Range<i32> {
        self.start_year..self.start_year + self.number_of_years as i32
    }

    /// Returns the declared end-of-file byte size, if the header carries
    /// one.
    pub fn end_of_file(&self) -> Option<u64> {
        self.end_of_file
    }

    /// Returns the value of an unrecognized header key, if present.
    ///
    /// Keys are normalized the same way as recognized ones: lowercased,
    /// with whitespace runs folded to `_`.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub(crate) fn speed(&self) -> FieldCoding {
        self.speed
    }

    pub(crate) fn equilibrium(&self) -> FieldCoding {
        self.equilibrium
    }

    pub(crate) fn node_factor(&self) -> FieldCoding {
        self.node_factor
    }

    pub(crate) fn amplitude(&self) -> FieldCoding {
        self.amplitude
    }

    pub(crate) fn epoch(&self) -> FieldCoding {
        self.epoch
    }

    pub(crate) fn datum_offset(&self) -> FieldCoding {
        self.datum_offset
    }

    pub(crate) fn level_add(&self) -> FieldCoding {
        self.level_add
    }

    pub(crate) fn level_multiply(&self) -> FieldCoding {
        self.level_multiply
    }

    pub(crate) fn latitude(&self) -> FieldCoding {
        self.latitude
    }

    pub(crate) fn longitude(&self) -> FieldCoding {
        self.longitude
    }

    pub(crate) fn record_size_bits(&self) -> u32 {
        self.record_size_bits
    }

    pub(crate) fn record_type_bits(&self) -> u32 {
        self.record_type_bits
    }

    pub(crate) fn station_bits(&self) -> u32 {
        self.station_bits
    }

    pub(crate) fn time_bits(&self) -> u32 {
        self.time_bits
    }

    pub(crate) fn date_bits(&self) -> u32 {
        self.date_bits
    }

    pub(crate) fn months_on_station_bits(&self) -> u32 {
        self.months_on_station_bits
    }

    pub(crate) fn confidence_value_bits(&self) -> u32 {
        self.confidence_value_bits
    }

    pub(crate) fn constituent_bits(&self) -> u32 {
        self.constituent_bits
    }

    pub(crate) fn direction_bits(&self) -> u32 {
        self.direction_bits
    }

    pub(crate) fn level_units_layout(&self) -> TableLayout {
        self.level_units
    }

    pub(crate) fn direction_units_layout(&self) -> TableLayout {
        self.direction_units
    }

    pub(crate) fn restrictions_layout(&self) -> TableLayout {
        self.restrictions
    }

    pub(crate) fn pedigrees_layout(&self) -> Option<TableLayout> {
        self.pedigrees
    }

    pub(crate) fn timezones_layout(&self) -> TableLayout {
        self.timezones
    }

    pub(crate) fn countries_layout(&self) -> TableLayout {
        self.countries
    }

    pub(crate) fn datums_layout(&self) -> TableLayout {
        self.datums
    }

    pub(crate) fn legaleses_layout(&self) -> Option<TableLayout> {
        self.legaleses
    }

    pub(crate) fn constituent_names_layout(&self) -> TableLayout {
        self.constituent_names
    }
}

/// The raw `[KEY] = VALUE` map with accessed-key bookkeeping: whatever no
/// typed getter claims becomes the side map of unrecognized values.
struct Fields {
    map: HashMap<String, String>,
    used: HashSet<String>,
}

impl Fields {
    fn read_from<R: Read>(read: &mut R) -> Result<Fields> {
        let mut map = HashMap::new();
        let mut line = String::new();
        loop {
            let byte = match read.read_u8() {
                Ok(byte) => byte,
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    return Err(Error::Truncated)
                }
                Err(err) => return Err(err.into()),
            };
            if byte != b'\n' {
                line.push(char::from(byte));
                continue;
            }
            let trimmed = line.trim();
            if trimmed == END_OF_ASCII {
                return Ok(Fields {
                    map,
                    used: HashSet::new(),
                });
            }
            if let Some((key, value)) = parse_line(trimmed) {
                let _ = map.insert(key, value);
            }
            line.clear();
        }
    }

    fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    fn get(&mut self, key: &str) -> Option<&str> {
        let _ = self.used.insert(key.to_string());
        self.map.get(key).map(String::as_str)
    }

    fn text(&mut self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    fn required(&mut self, key: &str) -> Result<String> {
        self.get(key)
            .map(String::from)
            .ok_or_else(|| Error::MissingField(key.to_string()))
    }

    fn required_u32(&mut self, key: &str) -> Result<u32> {
        let value = self.required(key)?;
        value.parse().map_err(|_| Error::InvalidField {
            field: key.to_string(),
            value,
        })
    }

    fn required_i32(&mut self, key: &str) -> Result<i32> {
        let value = self.required(key)?;
        value.parse().map_err(|_| Error::InvalidField {
            field: key.to_string(),
            value,
        })
    }

    fn optional_u32(&mut self, key: &str) -> Result<Option<u32>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => {
                let value = value.to_string();
                value
                    .parse()
                    .map(Some)
                    .map_err(|_| Error::InvalidField {
                        field: key.to_string(),
                        value,
                    })
            }
        }
    }

    fn optional_u64(&mut self, key: &str) -> Result<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => {
                let value = value.to_string();
                value
                    .parse()
                    .map(Some)
                    .map_err(|_| Error::InvalidField {
                        field: key.to_string(),
                        value,
                    })
            }
        }
    }

    fn optional_f64(&mut self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => {
                let value = value.to_string();
                value
                    .parse()
                    .map(Some)
                    .map_err(|_| Error::InvalidField {
                        field: key.to_string(),
                        value,
                    })
            }
        }
    }

    /// A required width, checked against the 1..=32 contract.
    fn bits(&mut self, key: &str) -> Result<u32> {
        let bits = self.required_u32(key)?;
        if (1..=32).contains(&bits) {
            Ok(bits)
        } else {
            Err(Error::InvalidField {
                field: key.to_string(),
                value: bits.to_string(),
            })
        }
    }

    /// `<prefix>_bits` with optional `<prefix>_offset` and
    /// `<prefix>_scale`.
    fn coding(&mut self, prefix: &str) -> Result<FieldCoding> {
        Ok(FieldCoding {
            bits: self.bits(&format!("{prefix}_bits"))?,
            offset: self.optional_f64(&format!("{prefix}_offset"))?.unwrap_or(0.0),
            scale: self.optional_f64(&format!("{prefix}_scale"))?.unwrap_or(1.0),
        })
    }

    /// `<prefix>_bits` and `<prefix>_size` for a sentinel-terminated table
    /// allocated at 2^bits slots.
    fn sentinel_layout(&mut self, prefix: &str) -> Result<TableLayout> {
        let bits = self.bits(&format!("{prefix}_bits"))?;
        Ok(TableLayout {
            slots: 1 << bits,
            slot_size: self.required_u32(&format!("{prefix}_size"))?,
            index_bits: bits,
        })
    }

    fn into_extra(self) -> HashMap<String, Value> {
        let Fields { map, used } = self;
        map.into_iter()
            .filter(|(key, _)| !used.contains(key))
            .map(|(key, value)| (key, Value::parse(&value)))
            .collect()
    }
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix('[')?;
    let (key, rest) = rest.split_once(']')?;
    let value = rest.trim_start().strip_prefix('=')?.trim();
    Some((normalize_key(key), value.to_string()))
}

/// Lowercases and folds whitespace runs to underscores: `FOO  BAR` becomes
/// `foo_bar`.
fn normalize_key(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}
