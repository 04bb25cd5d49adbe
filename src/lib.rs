//! Native library for reading the [Tidal Constituent Database
//! (TCD)](https://flaterco.com/xtide/libtcd.html) file format.
//!
//! A TCD file is a compact, bit-packed database of tide and current
//! stations along with the harmonic constituents (angular speeds,
//! per-year equilibrium arguments, per-year node factors) that drive
//! tidal predictions. This crate is a read-only decoder for format v2:
//! it opens a file, exposes the summary metadata, enumerates stations,
//! and reads harmonic data by station or constituent name. It does not
//! write TCD files and it does not predict tides.
//!
//! # Reading a database
//!
//! Use a [Database] to open a file and look around:
//!
//! ```no_run
//! use tcd::Database;
//!
//! let mut database = Database::from_path("harmonics.tcd").unwrap();
//! println!(
//!     "{} stations, {} constituents",
//!     database.header().number_of_records(),
//!     database.constituents().len(),
//! );
//!
//! // Constituents are looked up by name.
//! let m2 = database.constituent("M2").unwrap();
//! println!("M2 speed: {} degrees/hour", m2.speed());
//!
//! // `stations` decodes the whole file once and caches it ...
//! let station = &database.stations().unwrap()[0];
//! println!("{} ({}, {})", station.name(), station.latitude(), station.longitude());
//!
//! // ... while `station_iter` streams without caching.
//! for station in database.station_iter().unwrap() {
//!     let station = station.unwrap();
//!     if station.is_current() {
//!         println!("current station: {}", station.name());
//!     }
//! }
//! ```
//!
//! # Reference and subordinate stations
//!
//! A [Station] is either a *reference* station, carrying a full set of
//! per-constituent amplitudes and epochs, or a *subordinate* station,
//! carrying offsets applied to some reference station's predictions. The
//! two payloads live in [StationData]; sentinel values on disk (the 361
//! direction, the 2560 slack offset, the −1 self reference) all decode to
//! `None`.
//!
//! Reference stations reduced from short observation series can have
//! minor constituents filled in from the four principal ones:
//!
//! ```no_run
//! # use tcd::Database;
//! let mut database = Database::from_path("harmonics.tcd").unwrap();
//! let mut station = database.stations().unwrap()[0].clone();
//! let performed = database.infer_constituents(&mut station);
//! ```

#![deny(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications
)]

mod bits;
mod constituent;
mod database;
mod error;
mod header;
mod infer;
mod station;
mod tables;

pub use bits::BitStream;
pub use constituent::{Constituent, ConstituentTable};
pub use database::{Database, Stations};
pub use error::Error;
pub use header::{Header, Value};
pub use infer::infer_constituents;
pub use station::{Reference, Station, StationData, Subordinate};

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;
