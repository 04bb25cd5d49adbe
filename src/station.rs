//! Tide and current stations.
//!
//! Station records sit back to back at the end of the file, each led by
//! its own byte length. The common header and v2 metadata are shared; the
//! rest of the record depends on the record type. A *reference* station
//! carries a full set of per-constituent amplitudes and epochs, so
//! predictions can be computed from it directly. A *subordinate* station
//! carries offsets that warp some reference station's predictions
//! instead.

use crate::header::Header;
use crate::tables::Tables;
use crate::{BitStream, Error, Result};
use chrono::NaiveDate;
use log::warn;
use std::io::{Read, Seek};

/// On-disk direction value meaning "no direction recorded".
const NULL_DIRECTION: u32 = 361;

/// On-disk slack-offset value meaning "no offset recorded", checked
/// against the raw signed field before ±HHMM decoding.
const NULL_SLACK_OFFSET: i32 = 0xa00;

/// One station record.
///
/// The common fields live here; the type-specific remainder is the
/// [StationData] payload. Stations hold the decoded strings themselves
/// (timezone, country, units, ...), not lookup-table indices, so a
/// station is self-contained once read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Station {
    pub(crate) record_size: u32,
    pub(crate) name: String,
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
    pub(crate) timezone: String,
    pub(crate) reference_index: Option<u32>,
    pub(crate) country: String,
    pub(crate) source: String,
    pub(crate) restriction: String,
    pub(crate) comments: String,
    pub(crate) notes: String,
    pub(crate) legalese: String,
    pub(crate) station_id_context: String,
    pub(crate) station_id: String,
    pub(crate) date_imported: Option<NaiveDate>,
    pub(crate) xfields: String,
    pub(crate) direction_units: String,
    pub(crate) min_direction: Option<u32>,
    pub(crate) max_direction: Option<u32>,
    pub(crate) level_units: String,
    pub(crate) data: StationData,
}

/// The type-specific remainder of a station record.
#[derive(Clone, Debug, PartialEq)]
pub enum StationData {
    /// A station with its own harmonic constants.
    Reference(Reference),
    /// A station predicted by offsetting a reference station.
    Subordinate(Subordinate),
}

impl Default for StationData {
    fn default() -> StationData {
        StationData::Reference(Reference::default())
    }
}

/// The body of a reference station.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reference {
    /// Datum offset (Z0) in the station's level units.
    pub datum_offset: f64,
    /// The vertical datum name, e.g. "Mean Lower Low Water".
    pub datum: String,
    /// Offset from UTC as a raw ±HHMM integer, e.g. -830 for -08:30.
    pub zone_offset: i32,
    /// When the harmonic constants expire, if recorded.
    pub expiration_date: Option<NaiveDate>,
    /// How many months of observations the constants rest on.
    pub months_on_station: u32,
    /// The last date of observation, if recorded.
    pub last_date_on_station: Option<NaiveDate>,
    /// Data confidence, 0..=15.
    pub confidence: u32,
    /// Amplitude per constituent, in level units; 0.0 where unset.
    pub amplitudes: Vec<f64>,
    /// Phase lag per constituent, in degrees; 0.0 where unset.
    pub epochs: Vec<f64>,
}

/// The body of a subordinate station.
///
/// Time offsets are minutes; level multiplies default to the identity.
/// `flood_begins`/`ebb_begins` are only recorded for current stations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Subordinate {
    /// Minutes added to the reference station's low/minimum event times.
    pub min_time_add: i32,
    /// Level added to low/minimum events.
    pub min_level_add: f64,
    /// Level multiplier for low/minimum events.
    pub min_level_multiply: f64,
    /// Minutes added to high/maximum event times.
    pub max_time_add: i32,
    /// Level added to high/maximum events.
    pub max_level_add: f64,
    /// Level multiplier for high/maximum events.
    pub max_level_multiply: f64,
    /// Minutes offset at which flood current begins, if recorded.
    pub flood_begins: Option<i32>,
    /// Minutes offset at which ebb current begins, if recorded.
    pub ebb_begins: Option<i32>,
}

impl Station {
    /// Decodes one record from a byte-aligned stream positioned at its
    /// start.
    ///
    /// The record-size field is the authoritative record length: after the
    /// body, the stream is re-seeked to `start + record_size` to absorb
    /// any trailing padding, so the caller is always left byte-aligned at
    /// the next record.
    pub(crate) fn read_from<R: Read + Seek>(
        bits: &mut BitStream<R>,
        header: &Header,
        tables: &Tables,
    ) -> Result<Station> {
        let start = bits.pos()?;
        let record_size = bits.read_uint(header.record_size_bits())?;
        let record_type = bits.read_uint(header.record_type_bits())?;
        let latitude = header.latitude();
        let latitude = bits.read_scaled_signed(latitude.bits, latitude.scale)?;
        let longitude = header.longitude();
        let longitude = bits.read_scaled_signed(longitude.bits, longitude.scale)?;
        let timezone = Tables::lookup(
            &tables.timezones,
            bits.read_uint(header.timezones_layout().index_bits)?,
        );
        let name = bits.read_cstring()?;
        let reference_index = match bits.read_int(header.station_bits())? {
            index if index < 0 => None,
            index => Some(index as u32),
        };

        let country = Tables::lookup(
            &tables.countries,
            bits.read_uint(header.countries_layout().index_bits)?,
        );
        let source = bits.read_cstring()?;
        let restriction = Tables::lookup(
            &tables.restrictions,
            bits.read_uint(header.restrictions_layout().index_bits)?,
        );
        let comments = bits.read_cstring()?;
        let notes = bits.read_cstring()?;
        let legalese = match header.legaleses_layout() {
            Some(layout) => Tables::lookup(&tables.legaleses, bits.read_uint(layout.index_bits)?),
            None => tables.legaleses.first().cloned().unwrap_or_default(),
        };
        let station_id_context = bits.read_cstring()?;
        let station_id = bits.read_cstring()?;
        let date_imported = ymd(bits.read_uint(header.date_bits())?);
        let xfields = bits.read_cstring()?;
        let direction_units = Tables::lookup(
            &tables.direction_units,
            bits.read_uint(header.direction_units_layout().index_bits)?,
        );
        let min_direction = direction(bits.read_uint(header.direction_bits())?);
        let max_direction = direction(bits.read_uint(header.direction_bits())?);
        let level_units = Tables::lookup(
            &tables.level_units,
            bits.read_uint(header.level_units_layout().index_bits)?,
        );

        let data = match record_type {
            1 => StationData::Reference(read_reference(bits, header, tables)?),
            2 => StationData::Subordinate(read_subordinate(bits, header)?),
            other => return Err(Error::InvalidRecordType(other)),
        };

        bits.seek(start + u64::from(record_size))?;
        Ok(Station {
            record_size,
            name,
            latitude,
            longitude,
            timezone,
            reference_index,
            country,
            source,
            restriction,
            comments,
            notes,
            legalese,
            station_id_context,
            station_id,
            date_imported,
            xfields,
            direction_units,
            min_direction,
            max_direction,
            level_units,
            data,
        })
    }

    /// Returns the on-disk byte length of this record.
    pub fn record_size(&self) -> u32 {
        self.record_size
    }

    /// Returns the station name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the latitude in decimal degrees, north positive.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Returns the longitude in decimal degrees, east positive.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Returns the timezone name, e.g. `America/New_York`.
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// Returns the record index of the station this one is predicted
    /// from, or `None` if this station is its own reference.
    pub fn reference_index(&self) -> Option<u32> {
        self.reference_index
    }

    /// Returns the country name.
    pub fn country(&self) -> &str {
        &self.country
    }

    /// Returns the free-text data source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the access restriction, e.g. `Public Domain`.
    pub fn restriction(&self) -> &str {
        &self.restriction
    }

    /// Returns the free-text comments.
    pub fn comments(&self) -> &str {
        &self.comments
    }

    /// Returns the free-text notes.
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Returns the legalese attached to this station.
    pub fn legalese(&self) -> &str {
        &self.legalese
    }

    /// Returns the naming authority for [station_id](Self::station_id).
    pub fn station_id_context(&self) -> &str {
        &self.station_id_context
    }

    /// Returns the station's identifier in its naming authority.
    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    /// Returns the date this station was imported into the database, if
    /// recorded.
    pub fn date_imported(&self) -> Option<NaiveDate> {
        self.date_imported
    }

    /// Returns the free-text extra fields.
    pub fn xfields(&self) -> &str {
        &self.xfields
    }

    /// Returns the direction units, e.g. `degrees true`.
    pub fn direction_units(&self) -> &str {
        &self.direction_units
    }

    /// Returns the direction of the minimum (ebb) current, if recorded.
    pub fn min_direction(&self) -> Option<u32> {
        self.min_direction
    }

    /// Returns the direction of the maximum (flood) current, if recorded.
    pub fn max_direction(&self) -> Option<u32> {
        self.max_direction
    }

    /// Returns the level units, e.g. `feet` or `knots`.
    pub fn level_units(&self) -> &str {
        &self.level_units
    }

    /// Returns the type-specific payload.
    pub fn data(&self) -> &StationData {
        &self.data
    }

    /// Returns the reference body, if this is a reference station.
    pub fn reference(&self) -> Option<&Reference> {
        match &self.data {
            StationData::Reference(reference) => Some(reference),
            StationData::Subordinate(_) => None,
        }
    }

    /// Returns the subordinate body, if this is a subordinate station.
    pub fn subordinate(&self) -> Option<&Subordinate> {
        match &self.data {
            StationData::Reference(_) => None,
            StationData::Subordinate(subordinate) => Some(subordinate),
        }
    }

    pub(crate) fn reference_mut(&mut self) -> Option<&mut Reference> {
        match &mut self.data {
            StationData::Reference(reference) => Some(reference),
            StationData::Subordinate(_) => None,
        }
    }

    /// Returns true if this is a reference station.
    pub fn is_reference(&self) -> bool {
        matches!(self.data, StationData::Reference(_))
    }

    /// Returns true if this is a subordinate station.
    pub fn is_subordinate(&self) -> bool {
        matches!(self.data, StationData::Subordinate(_))
    }

    /// Returns true if this is a subordinate station whose offsets don't
    /// distinguish minimum from maximum events and that records no
    /// current directions or slack offsets.
    pub fn is_simple(&self) -> bool {
        match &self.data {
            StationData::Reference(_) => false,
            StationData::Subordinate(subordinate) => {
                subordinate.min_time_add == subordinate.max_time_add
                    && subordinate.min_level_add == subordinate.max_level_add
                    && subordinate.min_level_multiply == subordinate.max_level_multiply
                    && self.min_direction.is_none()
                    && self.max_direction.is_none()
                    && subordinate.flood_begins.is_none()
                    && subordinate.ebb_begins.is_none()
            }
        }
    }

    /// Returns true if this station predicts water levels.
    ///
    /// Every station is either a tide station or a current station, never
    /// both.
    pub fn is_tide(&self) -> bool {
        !self.is_current()
    }

    /// Returns true if this station predicts currents.
    ///
    /// Only subordinate stations that record at least one of the
    /// current-specific markers (a minimum or maximum direction, a
    /// flood-begins or ebb-begins offset) count; a subordinate without any
    /// of them is a tide station no matter what its offsets look like.
    pub fn is_current(&self) -> bool {
        match &self.data {
            StationData::Reference(_) => false,
            StationData::Subordinate(subordinate) => {
                self.min_direction.is_some()
                    || self.max_direction.is_some()
                    || subordinate.flood_begins.is_some()
                    || subordinate.ebb_begins.is_some()
            }
        }
    }

    /// Returns how many constituents have a non-zero amplitude here.
    ///
    /// Subordinate stations carry no amplitudes and report zero.
    pub fn active_constituents(&self) -> usize {
        match &self.data {
            StationData::Reference(reference) => {
                reference.amplitudes.iter().filter(|&&a| a > 0.0).count()
            }
            StationData::Subordinate(_) => 0,
        }
    }
}

fn read_reference<R: Read + Seek>(
    bits: &mut BitStream<R>,
    header: &Header,
    tables: &Tables,
) -> Result<Reference> {
    let datum_offset = header.datum_offset();
    let datum_offset = bits.read_scaled_signed(datum_offset.bits, datum_offset.scale)?;
    let datum = Tables::lookup(
        &tables.datums,
        bits.read_uint(header.datums_layout().index_bits)?,
    );
    let zone_offset = bits.read_int(header.time_bits())?;
    let expiration_date = ymd(bits.read_uint(header.date_bits())?);
    let months_on_station = bits.read_uint(header.months_on_station_bits())?;
    let last_date_on_station = ymd(bits.read_uint(header.date_bits())?);
    let confidence = bits.read_uint(header.confidence_value_bits())?;

    // Amplitudes and epochs are stored sparsely: a count, then triples of
    // (constituent index, amplitude, epoch). Unlisted constituents stay
    // at zero.
    let count = header.constituent_count() as usize;
    let mut amplitudes = vec![0.0; count];
    let mut epochs = vec![0.0; count];
    let amplitude = header.amplitude();
    let epoch = header.epoch();
    let listed = bits.read_uint(header.constituent_bits())?;
    for _ in 0..listed {
        let index = bits.read_uint(header.constituent_bits())? as usize;
        let amp = bits.read_scaled(amplitude.bits, amplitude.scale)?;
        let ep = bits.read_scaled(epoch.bits, epoch.scale)?;
        if index < count {
            amplitudes[index] = amp;
            epochs[index] = ep;
        } else {
            warn!("ignoring harmonic entry for out-of-range constituent index {index}");
        }
    }

    Ok(Reference {
        datum_offset,
        datum,
        zone_offset,
        expiration_date,
        months_on_station,
        last_date_on_station,
        confidence,
        amplitudes,
        epochs,
    })
}

fn read_subordinate<R: Read + Seek>(
    bits: &mut BitStream<R>,
    header: &Header,
) -> Result<Subordinate> {
    let time_bits = header.time_bits();
    let level_add = header.level_add();
    let level_multiply = header.level_multiply();

    let min_time_add = hhmm_to_minutes(bits.read_int(time_bits)?);
    let min_level_add = bits.read_scaled_signed(level_add.bits, level_add.scale)?;
    let min_level_multiply = multiply(bits.read_uint(level_multiply.bits)?, level_multiply.scale);
    let max_time_add = hhmm_to_minutes(bits.read_int(time_bits)?);
    let max_level_add = bits.read_scaled_signed(level_add.bits, level_add.scale)?;
    let max_level_multiply = multiply(bits.read_uint(level_multiply.bits)?, level_multiply.scale);
    let flood_begins = slack(bits.read_int(time_bits)?);
    let ebb_begins = slack(bits.read_int(time_bits)?);

    Ok(Subordinate {
        min_time_add,
        min_level_add,
        min_level_multiply,
        max_time_add,
        max_level_add,
        max_level_multiply,
        flood_begins,
        ebb_begins,
    })
}

/// ±HHMM to signed minutes: the low two decimal digits are minutes, the
/// rest hours. Truncating division makes the signs work out.
fn hhmm_to_minutes(raw: i32) -> i32 {
    raw / 100 * 60 + raw % 100
}

fn direction(raw: u32) -> Option<u32> {
    (raw != NULL_DIRECTION).then_some(raw)
}

fn slack(raw: i32) -> Option<i32> {
    (raw != NULL_SLACK_OFFSET).then(|| hhmm_to_minutes(raw))
}

/// A level multiply of zero was never written on purpose; it means the
/// identity.
fn multiply(raw: u32, scale: f64) -> f64 {
    if raw == 0 {
        1.0
    } else {
        f64::from(raw) / scale
    }
}

/// Packed `YYYYMMDD`, zero meaning unrecorded.
fn ymd(raw: u32) -> Option<NaiveDate> {
    if raw == 0 {
        None
    } else {
        NaiveDate::from_ymd_opt((raw / 10_000) as i32, raw / 100 % 100, raw % 100)
    }
}
