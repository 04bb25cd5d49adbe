//! Open and query a TCD database.
//!
//! A [Database] wraps one seekable byte source. Opening it reads the
//! ASCII header, the lookup tables, and the constituent table eagerly;
//! station records are decoded on demand. Two ways to get at stations:
//!
//! * [stations](Database::stations) decodes the whole file once and
//!   caches the result;
//! * [station_iter](Database::station_iter) streams stations one at a
//!   time without caching, for a single cheap pass.
//!
//! ```no_run
//! use tcd::Database;
//!
//! let mut database = Database::from_path("harmonics.tcd").unwrap();
//! println!("{}", database.header().version());
//! for station in database.station_iter().unwrap() {
//!     println!("{}", station.unwrap().name());
//! }
//! ```
//!
//! A database owns its source and releases it on drop. One instance must
//! not be shared between concurrent operations; open the file once per
//! thread instead.

use crate::tables::Tables;
use crate::{
    infer_constituents, BitStream, Constituent, ConstituentTable, Error, Header, Result, Station,
};
use log::debug;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// A read-only TCD database.
#[derive(Debug)]
pub struct Database<R: Read + Seek> {
    bits: BitStream<R>,
    header: Header,
    tables: Tables,
    constituents: ConstituentTable,
    stations: Option<Vec<Station>>,
}

impl Database<BufReader<File>> {
    /// Opens a TCD file.
    ///
    /// The underlying `File` is wrapped in a `BufReader`; the bit-level
    /// reads underneath pull single bytes, so buffering matters.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use tcd::Database;
    /// let database = Database::from_path("harmonics.tcd").unwrap();
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Database<BufReader<File>>> {
        File::open(path)
            .map_err(Error::from)
            .and_then(|file| Database::new(BufReader::new(file)))
    }
}

impl<R: Read + Seek> Database<R> {
    /// Creates a database from a seekable byte source.
    ///
    /// Reads the header, lookup tables, and constituent table before
    /// returning; a source that fails validation is dropped on the error
    /// path.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use std::io::BufReader;
    /// use tcd::Database;
    /// let file = File::open("harmonics.tcd").unwrap();
    /// let database = Database::new(BufReader::new(file)).unwrap();
    /// ```
    pub fn new(read: R) -> Result<Database<R>> {
        let mut bits = BitStream::new(read);
        let header = Header::read_from(bits.get_mut())?;
        let tables = Tables::read_from(bits.get_mut(), &header)?;
        bits.seek(tables.constituent_data_offset)?;
        let constituents = ConstituentTable::read_from(&mut bits, &header, &tables.constituent_names)?;
        debug!(
            "opened TCD database: {} stations, {} constituents, years {:?}",
            header.number_of_records(),
            constituents.len(),
            header.year_range(),
        );
        Ok(Database {
            bits,
            header,
            tables,
            constituents,
            stations: None,
        })
    }

    /// Returns this database's header.
    ///
    /// The header carries the summary metadata: version and last-modified
    /// text, station and constituent counts, the year range, and the
    /// declared end-of-file size.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use tcd::Database;
    /// let database = Database::from_path("harmonics.tcd").unwrap();
    /// assert!(database.header().number_of_records() > 0);
    /// ```
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the four-byte value stored between the ASCII header and
    /// the first lookup table.
    ///
    /// The format documents it as a checksum; it is surfaced as-is and
    /// never verified.
    pub fn checksum(&self) -> u32 {
        self.tables.checksum
    }

    /// Returns the constituent table.
    pub fn constituents(&self) -> &ConstituentTable {
        &self.constituents
    }

    /// Looks a constituent up by exact name.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use tcd::Database;
    /// let database = Database::from_path("harmonics.tcd").unwrap();
    /// let m2 = database.constituent("M2").unwrap();
    /// assert!((m2.speed() - 28.984).abs() < 0.01);
    /// ```
    pub fn constituent(&self, name: &str) -> Option<&Constituent> {
        self.constituents.get(name)
    }

    /// Returns every station, decoding and caching them on first call.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use tcd::Database;
    /// let mut database = Database::from_path("harmonics.tcd").unwrap();
    /// let count = database.stations().unwrap().len();
    /// assert_eq!(count as u32, database.header().number_of_records());
    /// ```
    pub fn stations(&mut self) -> Result<&[Station]> {
        if self.stations.is_none() {
            let stations = self.station_iter()?.collect::<Result<Vec<_>>>()?;
            self.stations = Some(stations);
        }
        Ok(self.stations.as_deref().unwrap_or_default())
    }

    /// Returns an iterator that decodes stations one at a time.
    ///
    /// Nothing is cached; a later [stations](Self::stations) call reads
    /// the file again. Returns [Error::UnsupportedVersion] for pre-v2
    /// files, whose record layout this crate does not decode.
    pub fn station_iter(&mut self) -> Result<Stations<'_, R>> {
        if self.header.is_v1() {
            return Err(Error::UnsupportedVersion(self.header.major_rev()));
        }
        Ok(Stations {
            bits: &mut self.bits,
            header: &self.header,
            tables: &self.tables,
            next_offset: self.tables.station_records_offset,
            index: 0,
        })
    }

    /// Returns the first station with exactly this name, if any.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use tcd::Database;
    /// let mut database = Database::from_path("harmonics.tcd").unwrap();
    /// let station = database.station_by_name("San Francisco").unwrap();
    /// ```
    pub fn station_by_name(&mut self, name: &str) -> Result<Option<&Station>> {
        Ok(self.stations()?.iter().find(|station| station.name() == name))
    }

    /// Returns every reference station.
    pub fn reference_stations(&mut self) -> Result<Vec<&Station>> {
        Ok(self
            .stations()?
            .iter()
            .filter(|station| station.is_reference())
            .collect())
    }

    /// Returns every subordinate station.
    pub fn subordinate_stations(&mut self) -> Result<Vec<&Station>> {
        Ok(self
            .stations()?
            .iter()
            .filter(|station| station.is_subordinate())
            .collect())
    }

    /// Fills in missing constituents on a reference station using this
    /// database's constituent table.
    ///
    /// See [infer_constituents] for the recipe and the preconditions.
    pub fn infer_constituents(&self, station: &mut Station) -> bool {
        infer_constituents(station, &self.constituents)
    }

    /// Returns the level units table, e.g. `feet`, `meters`, `knots`.
    pub fn level_units(&self) -> &[String] {
        &self.tables.level_units
    }

    /// Returns the direction units table.
    pub fn direction_units(&self) -> &[String] {
        &self.tables.direction_units
    }

    /// Returns the access restrictions table.
    pub fn restrictions(&self) -> &[String] {
        &self.tables.restrictions
    }

    /// Returns the timezone table, with any leading `:` stripped.
    pub fn timezones(&self) -> &[String] {
        &self.tables.timezones
    }

    /// Returns the countries table.
    pub fn countries(&self) -> &[String] {
        &self.tables.countries
    }

    /// Returns the datums table.
    pub fn datums(&self) -> &[String] {
        &self.tables.datums
    }

    /// Returns the legalese table.
    ///
    /// For v2 files written without one this is a single `"NULL"` entry,
    /// so index 0 always resolves.
    pub fn legaleses(&self) -> &[String] {
        &self.tables.legaleses
    }

    /// Returns the constituent names table.
    pub fn constituent_names(&self) -> &[String] {
        &self.tables.constituent_names
    }
}

/// An iterator over the stations in a [Database].
///
/// This struct is created by [Database::station_iter]. Each `next` call
/// decodes one record straight from the file.
#[derive(Debug)]
pub struct Stations<'a, R: Read + Seek> {
    bits: &'a mut BitStream<R>,
    header: &'a Header,
    tables: &'a Tables,
    next_offset: u64,
    index: u32,
}

impl<R: Read + Seek> Stations<'_, R> {
    fn read_station(&mut self) -> Result<Station> {
        // Each record's size field, not the sum of its field widths, says
        // where the next record starts.
        self.bits.seek(self.next_offset)?;
        let station = Station::read_from(self.bits, self.header, self.tables)?;
        self.next_offset += u64::from(station.record_size());
        Ok(station)
    }
}

impl<R: Read + Seek> Iterator for Stations<'_, R> {
    type Item = Result<Station>;

    fn next(&mut self) -> Option<Result<Station>> {
        if self.index >= self.header.number_of_records() {
            return None;
        }
        self.index += 1;
        Some(self.read_station())
    }
}
