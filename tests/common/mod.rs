//! Builds synthetic TCD files in memory.
//!
//! No real harmonics file ships with this repository, so the integration
//! tests construct a small but complete v2 database (and a v1 one) byte
//! by byte: ASCII header, checksum, lookup tables, bit-packed constituent
//! matrices, and station records. The encoding constants here mirror the
//! values written into the ASCII header text.

/// Writes MSB-first bit fields, the mirror image of the crate's reader.
pub struct BitWriter {
    bytes: Vec<u8>,
    acc: u64,
    pending: u32,
}

impl BitWriter {
    pub fn new() -> BitWriter {
        BitWriter {
            bytes: Vec::new(),
            acc: 0,
            pending: 0,
        }
    }

    pub fn write_uint(&mut self, value: u32, bits: u32) {
        assert!((1..=32).contains(&bits));
        let mask = if bits == 32 { u32::MAX } else { (1 << bits) - 1 };
        self.acc = (self.acc << bits) | u64::from(value & mask);
        self.pending += bits;
        while self.pending >= 8 {
            self.pending -= 8;
            self.bytes.push((self.acc >> self.pending) as u8);
        }
        self.acc &= (1 << self.pending) - 1;
    }

    pub fn write_int(&mut self, value: i32, bits: u32) {
        self.write_uint(value as u32, bits);
    }

    pub fn write_cstring(&mut self, s: &str) {
        for ch in s.chars() {
            assert!((ch as u32) < 256, "test strings must be Latin-1");
            self.write_uint(ch as u32, 8);
        }
        self.write_uint(0, 8);
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        if self.pending > 0 {
            self.write_uint(0, 8 - self.pending);
        }
        self.bytes
    }
}

pub const HEADER_SIZE: usize = 2048;
pub const CHECKSUM: u32 = 0x7c0ffee7;
pub const START_YEAR: i32 = 2020;
pub const YEARS: usize = 4;

pub const CONSTITUENT_NAMES: [&str; 8] = ["M2", "S2", "K1", "O1", "N2", "P1", "Q1", "K2"];
pub const SPEEDS: [f64; 8] = [
    28.9841042, 30.0, 15.0410686, 13.9430356, 28.4397295, 14.9589314, 13.3986609, 30.0821373,
];

pub const LEVEL_UNITS: [&str; 6] = ["Unknown", "feet", "meters", "knots", "knots^2", "unitless"];
pub const DIRECTION_UNITS: [&str; 3] = ["Unknown", "degrees true", "degrees"];
pub const RESTRICTIONS: [&str; 2] = ["Public Domain", "Non-commercial use only"];
pub const TZFILES: [&str; 3] = [":America/Los_Angeles", ":America/New_York", ":Europe/Oslo"];
pub const COUNTRIES: [&str; 2] = ["Unknown", "United States"];
pub const DATUMS: [&str; 2] = ["Unknown", "Mean Lower Low Water"];

const RECORD_SIZE_BITS: u32 = 16;
const RECORD_TYPE_BITS: u32 = 4;
const LATITUDE_BITS: u32 = 25;
const LONGITUDE_BITS: u32 = 26;
const COORDINATE_SCALE: f64 = 100_000.0;
const TZFILE_BITS: u32 = 5;
const TZFILE_SIZE: usize = 30;
const COUNTRY_BITS: u32 = 5;
const COUNTRY_SIZE: usize = 50;
const DATUM_BITS: u32 = 5;
const DATUM_SIZE: usize = 70;
const RESTRICTION_BITS: u32 = 4;
const RESTRICTION_SIZE: usize = 30;
const LEGALESE_BITS: u32 = 4;
const LEGALESE_SIZE: usize = 70;
const PEDIGREE_BITS: u32 = 2;
const PEDIGREE_SIZE: usize = 20;
const LEVEL_UNIT_BITS: u32 = 3;
const LEVEL_UNIT_SIZE: usize = 15;
const DIRECTION_UNIT_BITS: u32 = 2;
const DIRECTION_UNIT_SIZE: usize = 15;
const CONSTITUENT_BITS: u32 = 8;
const CONSTITUENT_SIZE: usize = 10;
const STATION_BITS: u32 = 18;
const DATE_BITS: u32 = 27;
const MONTHS_ON_STATION_BITS: u32 = 10;
const CONFIDENCE_VALUE_BITS: u32 = 4;
const TIME_BITS: u32 = 13;
const DIRECTION_BITS: u32 = 9;
const SPEED_BITS: u32 = 31;
const SPEED_SCALE: f64 = 10_000_000.0;
const SPEED_OFFSET: f64 = -410_667.0;
const EQUILIBRIUM_BITS: u32 = 16;
const EQUILIBRIUM_SCALE: f64 = 100.0;
const NODE_BITS: u32 = 15;
const NODE_SCALE: f64 = 10_000.0;
const AMPLITUDE_BITS: u32 = 19;
const AMPLITUDE_SCALE: f64 = 10_000.0;
const EPOCH_BITS: u32 = 16;
const EPOCH_SCALE: f64 = 100.0;
const DATUM_OFFSET_BITS: u32 = 28;
const DATUM_OFFSET_SCALE: f64 = 10_000.0;
const LEVEL_ADD_BITS: u32 = 16;
const LEVEL_ADD_SCALE: f64 = 100.0;
const LEVEL_MULTIPLY_BITS: u32 = 16;

/// On-disk sentinels, written raw.
pub const NO_DIRECTION: u32 = 361;
pub const NO_SLACK: i32 = 0xa00;

/// The equilibrium argument written for constituent `c`, year index `y`.
pub fn equilibrium(c: usize, y: usize) -> f64 {
    ((c * 53 + y * 17) % 360) as f64
}

/// The node factor written for constituent `c`, year index `y`.
pub fn node_factor(c: usize, y: usize) -> f64 {
    (10_000 + c * 100 + y * 10) as f64 / 10_000.0
}

pub struct StationFixture {
    pub record_type: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub tzfile: u32,
    pub name: &'static str,
    pub reference_station: i32,
    pub country: u32,
    pub source: &'static str,
    pub restriction: u32,
    pub comments: &'static str,
    pub notes: &'static str,
    pub legalese: u32,
    pub station_id_context: &'static str,
    pub station_id: &'static str,
    pub date_imported: u32,
    pub xfields: &'static str,
    pub direction_units: u32,
    pub min_direction: u32,
    pub max_direction: u32,
    pub level_units: u32,
    pub body: BodyFixture,
    /// Trailing padding bytes counted into the record size.
    pub padding: usize,
}

pub enum BodyFixture {
    Reference {
        datum_offset: f64,
        datum: u32,
        zone_offset: i32,
        expiration_date: u32,
        months_on_station: u32,
        last_date_on_station: u32,
        confidence: u32,
        /// (constituent index, amplitude, epoch) triples, written sparsely.
        harmonics: Vec<(u32, f64, f64)>,
    },
    Subordinate {
        /// Raw ±HHMM values, written as-is.
        min_time_add: i32,
        min_level_add: f64,
        /// Raw multiplier; zero decodes to the identity.
        min_level_multiply: u32,
        max_time_add: i32,
        max_level_add: f64,
        max_level_multiply: u32,
        flood_begins: i32,
        ebb_begins: i32,
    },
}

impl Default for StationFixture {
    fn default() -> StationFixture {
        StationFixture {
            record_type: 2,
            latitude: 0.0,
            longitude: 0.0,
            tzfile: 0,
            name: "Somewhere",
            reference_station: 0,
            country: 1,
            source: "",
            restriction: 0,
            comments: "",
            notes: "",
            legalese: 0,
            station_id_context: "",
            station_id: "",
            date_imported: 0,
            xfields: "",
            direction_units: 0,
            min_direction: NO_DIRECTION,
            max_direction: NO_DIRECTION,
            level_units: 1,
            body: BodyFixture::Subordinate {
                min_time_add: 0,
                min_level_add: 0.0,
                min_level_multiply: 0,
                max_time_add: 0,
                max_level_add: 0.0,
                max_level_multiply: 0,
                flood_begins: NO_SLACK,
                ebb_begins: NO_SLACK,
            },
            padding: 0,
        }
    }
}

/// The four stations in the standard v2 database: one reference, one
/// simple subordinate (with record padding), one current, and one
/// subordinate with unequal offsets but no current markers.
pub fn fixtures() -> Vec<StationFixture> {
    vec![
        StationFixture {
            record_type: 1,
            latitude: 37.80639,
            longitude: -122.465,
            name: "San Francisco Bay, CA",
            reference_station: -1,
            source: "NOS harmonic reduction",
            notes: "Relocated from S\u{e8}te pier",
            station_id_context: "NOS",
            station_id: "9414290",
            date_imported: 20021115,
            body: BodyFixture::Reference {
                datum_offset: 6.1412,
                datum: 1,
                zone_offset: -800,
                expiration_date: 0,
                months_on_station: 12,
                last_date_on_station: 19970115,
                confidence: 9,
                harmonics: vec![
                    (0, 1.9021, 323.0),
                    (1, 0.4561, 350.12),
                    (2, 0.3722, 105.25),
                    (3, 0.2321, 90.5),
                ],
            },
            ..Default::default()
        },
        StationFixture {
            latitude: 37.77195,
            longitude: -122.29823,
            name: "Alameda",
            body: BodyFixture::Subordinate {
                min_time_add: 107,
                min_level_add: 0.0,
                min_level_multiply: 0,
                max_time_add: 107,
                max_level_add: 0.0,
                max_level_multiply: 0,
                flood_begins: NO_SLACK,
                ebb_begins: NO_SLACK,
            },
            padding: 3,
            ..Default::default()
        },
        StationFixture {
            latitude: 37.81083,
            longitude: -122.47722,
            name: "Golden Gate Channel Current",
            direction_units: 1,
            min_direction: 200,
            max_direction: 20,
            level_units: 3,
            body: BodyFixture::Subordinate {
                min_time_add: -130,
                min_level_add: -0.5,
                min_level_multiply: 800,
                max_time_add: 15,
                max_level_add: 0.25,
                max_level_multiply: 1200,
                flood_begins: 30,
                ebb_begins: -245,
            },
            ..Default::default()
        },
        StationFixture {
            latitude: 37.8,
            longitude: -122.33,
            name: "Oakland Mole",
            body: BodyFixture::Subordinate {
                min_time_add: 10,
                min_level_add: 0.0,
                min_level_multiply: 0,
                max_time_add: 100,
                max_level_add: 0.0,
                max_level_multiply: 0,
                flood_begins: NO_SLACK,
                ebb_begins: NO_SLACK,
            },
            ..Default::default()
        },
    ]
}

fn header_text(records: usize, v1: bool) -> String {
    let mut lines = vec![
        "[VERSION] = tcd-synthetic harmonics".to_string(),
        format!("[MAJOR REV] = {}", if v1 { 1 } else { 2 }),
        "[MINOR REV] = 2".to_string(),
        "[LAST MODIFIED] = 2004-12-31 23:59 UTC".to_string(),
        format!("[HEADER SIZE] = {HEADER_SIZE}"),
        format!("[NUMBER OF RECORDS] = {records}"),
        format!("[START YEAR] = {START_YEAR}"),
        format!("[NUMBER OF YEARS] = {YEARS}"),
        format!("[CONSTITUENTS] = {}", CONSTITUENT_NAMES.len()),
        format!("[CONSTITUENT BITS] = {CONSTITUENT_BITS}"),
        format!("[CONSTITUENT SIZE] = {CONSTITUENT_SIZE}"),
        format!("[SPEED BITS] = {SPEED_BITS}"),
        format!("[SPEED SCALE] = {}", SPEED_SCALE as i64),
        format!("[SPEED OFFSET] = {}", SPEED_OFFSET as i64),
        format!("[EQUILIBRIUM BITS] = {EQUILIBRIUM_BITS}"),
        format!("[EQUILIBRIUM SCALE] = {}", EQUILIBRIUM_SCALE as i64),
        format!("[NODE BITS] = {NODE_BITS}"),
        format!("[NODE SCALE] = {}", NODE_SCALE as i64),
        format!("[AMPLITUDE BITS] = {AMPLITUDE_BITS}"),
        format!("[AMPLITUDE SCALE] = {}", AMPLITUDE_SCALE as i64),
        format!("[EPOCH BITS] = {EPOCH_BITS}"),
        format!("[EPOCH SCALE] = {}", EPOCH_SCALE as i64),
        format!("[RECORD SIZE BITS] = {RECORD_SIZE_BITS}"),
        format!("[RECORD TYPE BITS] = {RECORD_TYPE_BITS}"),
        format!("[STATION BITS] = {STATION_BITS}"),
        format!("[LATITUDE BITS] = {LATITUDE_BITS}"),
        format!("[LATITUDE SCALE] = {}", COORDINATE_SCALE as i64),
        format!("[LONGITUDE BITS] = {LONGITUDE_BITS}"),
        format!("[LONGITUDE SCALE] = {}", COORDINATE_SCALE as i64),
        format!("[DATUM OFFSET BITS] = {DATUM_OFFSET_BITS}"),
        format!("[DATUM OFFSET SCALE] = {}", DATUM_OFFSET_SCALE as i64),
        format!("[DATE BITS] = {DATE_BITS}"),
        format!("[MONTHS ON STATION BITS] = {MONTHS_ON_STATION_BITS}"),
        format!("[CONFIDENCE VALUE BITS] = {CONFIDENCE_VALUE_BITS}"),
        format!("[TIME BITS] = {TIME_BITS}"),
        format!("[LEVEL ADD BITS] = {LEVEL_ADD_BITS}"),
        format!("[LEVEL ADD SCALE] = {}", LEVEL_ADD_SCALE as i64),
        format!("[LEVEL MULTIPLY BITS] = {LEVEL_MULTIPLY_BITS}"),
        "[LEVEL MULTIPLY SCALE] = 1000".to_string(),
        format!("[DIRECTION BITS] = {DIRECTION_BITS}"),
        format!("[LEVEL UNIT BITS] = {LEVEL_UNIT_BITS}"),
        format!("[LEVEL UNIT TYPES] = {}", LEVEL_UNITS.len()),
        format!("[LEVEL UNIT SIZE] = {LEVEL_UNIT_SIZE}"),
        format!("[DIRECTION UNIT BITS] = {DIRECTION_UNIT_BITS}"),
        format!("[DIRECTION UNIT TYPES] = {}", DIRECTION_UNITS.len()),
        format!("[DIRECTION UNIT SIZE] = {DIRECTION_UNIT_SIZE}"),
        format!("[RESTRICTION BITS] = {RESTRICTION_BITS}"),
        format!("[RESTRICTION SIZE] = {RESTRICTION_SIZE}"),
        format!("[TZFILE BITS] = {TZFILE_BITS}"),
        format!("[TZFILE SIZE] = {TZFILE_SIZE}"),
        format!("[COUNTRY BITS] = {COUNTRY_BITS}"),
        format!("[COUNTRY SIZE] = {COUNTRY_SIZE}"),
        format!("[DATUM BITS] = {DATUM_BITS}"),
        format!("[DATUM SIZE] = {DATUM_SIZE}"),
        "[DB ORIGIN] = synthetic".to_string(),
    ];
    if v1 {
        lines.push(format!("[PEDIGREE BITS] = {PEDIGREE_BITS}"));
        lines.push(format!("[PEDIGREE SIZE] = {PEDIGREE_SIZE}"));
    } else {
        lines.push(format!("[LEGALESE BITS] = {LEGALESE_BITS}"));
        lines.push(format!("[LEGALESE SIZE] = {LEGALESE_SIZE}"));
    }
    lines.push("[END OF ASCII HEADER DATA]".to_string());
    lines.join("\n") + "\n"
}

fn push_slot(bytes: &mut Vec<u8>, contents: &str, size: usize) {
    let mut slot = contents.bytes().collect::<Vec<u8>>();
    assert!(slot.len() < size, "slot overflow: {contents}");
    slot.resize(size, 0);
    bytes.extend(slot);
}

fn push_exact_table(bytes: &mut Vec<u8>, entries: &[&str], size: usize) {
    for entry in entries {
        push_slot(bytes, entry, size);
    }
}

fn push_sentinel_table(bytes: &mut Vec<u8>, entries: &[&str], bits: u32, size: usize) {
    let slots = 1 << bits;
    assert!(entries.len() < slots);
    for entry in entries {
        push_slot(bytes, entry, size);
    }
    push_slot(bytes, "__END__", size);
    for _ in entries.len() + 1..slots {
        bytes.extend(std::iter::repeat(0).take(size));
    }
}

pub fn encode_station(fixture: &StationFixture) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_uint(0, RECORD_SIZE_BITS); // patched once the length is known
    w.write_uint(fixture.record_type, RECORD_TYPE_BITS);
    w.write_int(
        (fixture.latitude * COORDINATE_SCALE).round() as i32,
        LATITUDE_BITS,
    );
    w.write_int(
        (fixture.longitude * COORDINATE_SCALE).round() as i32,
        LONGITUDE_BITS,
    );
    w.write_uint(fixture.tzfile, TZFILE_BITS);
    w.write_cstring(fixture.name);
    w.write_int(fixture.reference_station, STATION_BITS);
    w.write_uint(fixture.country, COUNTRY_BITS);
    w.write_cstring(fixture.source);
    w.write_uint(fixture.restriction, RESTRICTION_BITS);
    w.write_cstring(fixture.comments);
    w.write_cstring(fixture.notes);
    w.write_uint(fixture.legalese, LEGALESE_BITS);
    w.write_cstring(fixture.station_id_context);
    w.write_cstring(fixture.station_id);
    w.write_uint(fixture.date_imported, DATE_BITS);
    w.write_cstring(fixture.xfields);
    w.write_uint(fixture.direction_units, DIRECTION_UNIT_BITS);
    w.write_uint(fixture.min_direction, DIRECTION_BITS);
    w.write_uint(fixture.max_direction, DIRECTION_BITS);
    w.write_uint(fixture.level_units, LEVEL_UNIT_BITS);
    match &fixture.body {
        BodyFixture::Reference {
            datum_offset,
            datum,
            zone_offset,
            expiration_date,
            months_on_station,
            last_date_on_station,
            confidence,
            harmonics,
        } => {
            w.write_int(
                (datum_offset * DATUM_OFFSET_SCALE).round() as i32,
                DATUM_OFFSET_BITS,
            );
            w.write_uint(*datum, DATUM_BITS);
            w.write_int(*zone_offset, TIME_BITS);
            w.write_uint(*expiration_date, DATE_BITS);
            w.write_uint(*months_on_station, MONTHS_ON_STATION_BITS);
            w.write_uint(*last_date_on_station, DATE_BITS);
            w.write_uint(*confidence, CONFIDENCE_VALUE_BITS);
            w.write_uint(harmonics.len() as u32, CONSTITUENT_BITS);
            for &(index, amplitude, epoch) in harmonics {
                w.write_uint(index, CONSTITUENT_BITS);
                w.write_uint((amplitude * AMPLITUDE_SCALE).round() as u32, AMPLITUDE_BITS);
                w.write_uint((epoch * EPOCH_SCALE).round() as u32, EPOCH_BITS);
            }
        }
        BodyFixture::Subordinate {
            min_time_add,
            min_level_add,
            min_level_multiply,
            max_time_add,
            max_level_add,
            max_level_multiply,
            flood_begins,
            ebb_begins,
        } => {
            w.write_int(*min_time_add, TIME_BITS);
            w.write_int((min_level_add * LEVEL_ADD_SCALE).round() as i32, LEVEL_ADD_BITS);
            w.write_uint(*min_level_multiply, LEVEL_MULTIPLY_BITS);
            w.write_int(*max_time_add, TIME_BITS);
            w.write_int((max_level_add * LEVEL_ADD_SCALE).round() as i32, LEVEL_ADD_BITS);
            w.write_uint(*max_level_multiply, LEVEL_MULTIPLY_BITS);
            w.write_int(*flood_begins, TIME_BITS);
            w.write_int(*ebb_begins, TIME_BITS);
        }
    }
    let mut bytes = w.into_bytes();
    bytes.extend(std::iter::repeat(0).take(fixture.padding));
    let size = bytes.len() as u16;
    bytes[..2].copy_from_slice(&size.to_be_bytes());
    bytes
}

fn push_constituent_sections(bytes: &mut Vec<u8>, v1: bool) {
    let count = CONSTITUENT_NAMES.len();

    let mut w = BitWriter::new();
    for speed in SPEEDS {
        w.write_uint((speed * SPEED_SCALE - SPEED_OFFSET).round() as u32, SPEED_BITS);
    }
    bytes.extend(w.into_bytes());
    if v1 && (count as u32 * SPEED_BITS) % 8 == 0 {
        bytes.push(0);
    }

    let mut w = BitWriter::new();
    for c in 0..count {
        for y in 0..YEARS {
            w.write_uint(
                (equilibrium(c, y) * EQUILIBRIUM_SCALE).round() as u32,
                EQUILIBRIUM_BITS,
            );
        }
    }
    bytes.extend(w.into_bytes());
    if v1 && (count * YEARS) as u32 * EQUILIBRIUM_BITS % 8 == 0 {
        bytes.push(0);
    }

    let mut w = BitWriter::new();
    for c in 0..count {
        for y in 0..YEARS {
            w.write_uint((node_factor(c, y) * NODE_SCALE).round() as u32, NODE_BITS);
        }
    }
    bytes.extend(w.into_bytes());
    if v1 && (count * YEARS) as u32 * NODE_BITS % 8 == 0 {
        bytes.push(0);
    }
}

fn push_tables(bytes: &mut Vec<u8>, v1: bool) {
    push_exact_table(bytes, &LEVEL_UNITS, LEVEL_UNIT_SIZE);
    push_exact_table(bytes, &DIRECTION_UNITS, DIRECTION_UNIT_SIZE);
    push_sentinel_table(bytes, &RESTRICTIONS, RESTRICTION_BITS, RESTRICTION_SIZE);
    if v1 {
        bytes.extend(std::iter::repeat(0).take((1 << PEDIGREE_BITS) * PEDIGREE_SIZE));
    }
    push_sentinel_table(bytes, &TZFILES, TZFILE_BITS, TZFILE_SIZE);
    push_sentinel_table(bytes, &COUNTRIES, COUNTRY_BITS, COUNTRY_SIZE);
    push_sentinel_table(bytes, &DATUMS, DATUM_BITS, DATUM_SIZE);
    if !v1 {
        push_sentinel_table(bytes, &["NULL"], LEGALESE_BITS, LEGALESE_SIZE);
    }
    push_exact_table(bytes, &CONSTITUENT_NAMES, CONSTITUENT_SIZE);
}

/// The standard v2 database with the [fixtures] stations.
pub fn build() -> Vec<u8> {
    let stations = fixtures();
    let mut bytes = header_text(stations.len(), false).into_bytes();
    assert!(bytes.len() <= HEADER_SIZE);
    bytes.resize(HEADER_SIZE, 0);
    bytes.extend(CHECKSUM.to_be_bytes());
    push_tables(&mut bytes, false);
    push_constituent_sections(&mut bytes, false);
    for fixture in &stations {
        bytes.extend(encode_station(fixture));
    }
    bytes
}

/// A v1 database: pedigree allocation, no legalese, wasted section bytes,
/// and one station record this crate refuses to decode.
pub fn build_v1() -> Vec<u8> {
    let mut bytes = header_text(1, true).into_bytes();
    assert!(bytes.len() <= HEADER_SIZE);
    bytes.resize(HEADER_SIZE, 0);
    bytes.extend(CHECKSUM.to_be_bytes());
    push_tables(&mut bytes, true);
    push_constituent_sections(&mut bytes, true);
    bytes
}
