//! Harmonic constituents and their per-year correction tables.

use crate::{BitStream, Header, Result};
use std::io::{Read, Seek};
use std::ops::Index;

/// One sinusoidal component of the tide.
///
/// A constituent has a fixed angular speed and, for every year the file
/// covers, an equilibrium argument (the phase of the hypothetical
/// equilibrium tide at the start of that year) and a node factor (a slowly
/// varying amplitude correction centered on 1.0).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Constituent {
    name: String,
    speed: f64,
    start_year: i32,
    equilibrium: Vec<f64>,
    node_factors: Vec<f64>,
}

impl Constituent {
    /// Returns this constituent's name, e.g. `M2`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns this constituent's angular speed in degrees per hour.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Returns the equilibrium arguments, one per year starting at the
    /// file's start year.
    pub fn equilibrium(&self) -> &[f64] {
        &self.equilibrium
    }

    /// Returns the node factors, one per year starting at the file's
    /// start year.
    pub fn node_factors(&self) -> &[f64] {
        &self.node_factors
    }

    /// Returns the equilibrium argument for a calendar year, or `None`
    /// outside the file's year range.
    pub fn equilibrium_for(&self, year: i32) -> Option<f64> {
        self.year_index(year).and_then(|i| self.equilibrium.get(i)).copied()
    }

    /// Returns the node factor for a calendar year, or `None` outside the
    /// file's year range.
    pub fn node_factor_for(&self, year: i32) -> Option<f64> {
        self.year_index(year).and_then(|i| self.node_factors.get(i)).copied()
    }

    fn year_index(&self, year: i32) -> Option<usize> {
        usize::try_from(year - self.start_year).ok()
    }
}

/// Every constituent in a file, in on-disk order.
#[derive(Clone, Debug, Default)]
pub struct ConstituentTable {
    constituents: Vec<Constituent>,
}

impl ConstituentTable {
    /// Decodes the speed, equilibrium, and node-factor matrices.
    ///
    /// The stream must be positioned (byte-aligned) at the constituent
    /// data offset. Layout is three back-to-back bit-packed sections, each
    /// in constituent-major order: all speeds, then every constituent's
    /// per-year equilibrium arguments, then every constituent's per-year
    /// node factors.
    pub(crate) fn read_from<R: Read + Seek>(
        bits: &mut BitStream<R>,
        header: &Header,
        names: &[String],
    ) -> Result<ConstituentTable> {
        let count = header.constituent_count() as usize;
        let years = header.number_of_years() as usize;

        let coding = header.speed();
        let mut speeds = Vec::with_capacity(count);
        for _ in 0..count {
            speeds.push(bits.read_offset_scaled(coding.bits, coding.offset, coding.scale)?);
        }
        finish_section(bits, header, count as u64 * u64::from(coding.bits))?;

        let coding = header.equilibrium();
        let mut equilibrium = Vec::with_capacity(count);
        for _ in 0..count {
            let mut row = Vec::with_capacity(years);
            for _ in 0..years {
                row.push(bits.read_offset_scaled(coding.bits, coding.offset, coding.scale)?);
            }
            equilibrium.push(row);
        }
        finish_section(bits, header, (count * years) as u64 * u64::from(coding.bits))?;

        let coding = header.node_factor();
        let mut node_factors = Vec::with_capacity(count);
        for _ in 0..count {
            let mut row = Vec::with_capacity(years);
            for _ in 0..years {
                row.push(bits.read_offset_scaled(coding.bits, coding.offset, coding.scale)?);
            }
            node_factors.push(row);
        }

        let constituents = speeds
            .into_iter()
            .zip(equilibrium.into_iter().zip(node_factors))
            .enumerate()
            .map(|(index, (speed, (equilibrium, node_factors)))| Constituent {
                name: names
                    .get(index)
                    .filter(|name| !name.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("C{index}")),
                speed,
                start_year: header.start_year(),
                equilibrium,
                node_factors,
            })
            .collect();
        Ok(ConstituentTable { constituents })
    }

    /// Returns the number of constituents.
    pub fn len(&self) -> usize {
        self.constituents.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.constituents.is_empty()
    }

    /// Looks a constituent up by exact name.
    ///
    /// The table is small (well under two hundred entries in every known
    /// file), so this is a linear scan.
    pub fn get(&self, name: &str) -> Option<&Constituent> {
        self.constituents.iter().find(|c| c.name() == name)
    }

    /// Returns the position of a constituent by exact name.
    ///
    /// This is the index stations use in their amplitude and epoch
    /// vectors.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.constituents.iter().position(|c| c.name() == name)
    }

    /// Returns an iterator over the constituents in on-disk order.
    pub fn iter(&self) -> std::slice::Iter<'_, Constituent> {
        self.constituents.iter()
    }
}

impl Index<usize> for ConstituentTable {
    type Output = Constituent;

    fn index(&self, index: usize) -> &Constituent {
        &self.constituents[index]
    }
}

impl<'a> IntoIterator for &'a ConstituentTable {
    type Item = &'a Constituent;
    type IntoIter = std::slice::Iter<'a, Constituent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Each matrix section is stored in its own whole number of bytes, so the
/// stream re-aligns here before the next one starts. v1 sections claim one
/// extra byte whenever their bits already end on a byte boundary.
fn finish_section<R: Read + Seek>(
    bits: &mut BitStream<R>,
    header: &Header,
    section_bits: u64,
) -> Result<()> {
    bits.align();
    if header.is_v1() && section_bits % 8 == 0 {
        let _ = bits.read_uint(8)?;
    }
    Ok(())
}

/// Builds a table of named constituents with bare speeds and no per-year
/// data, for exercising lookup and inference without a file.
#[cfg(test)]
pub(crate) fn table_with(names: &[&str], speeds: &[f64]) -> ConstituentTable {
    ConstituentTable {
        constituents: names
            .iter()
            .zip(speeds)
            .map(|(&name, &speed)| Constituent {
                name: name.to_string(),
                speed,
                start_year: 1970,
                equilibrium: Vec::new(),
                node_factors: Vec::new(),
            })
            .collect(),
    }
}
