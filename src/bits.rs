//! Bit-granular reads over a byte-seekable source.
//!
//! Everything after a TCD file's ASCII header is bit-packed: field widths
//! come from the header and are rarely multiples of eight, and strings are
//! embedded at whatever bit phase the surrounding fields leave behind.
//! [BitStream] pulls bytes from an underlying `Read + Seek` into an
//! MSB-first accumulator and hands out arbitrary-width integers.
//!
//! # Examples
//!
//! ```
//! use std::io::Cursor;
//! use tcd::BitStream;
//!
//! let mut bits = BitStream::new(Cursor::new(vec![0b1011_0110, 0b1100_0000]));
//! assert_eq!(0b101, bits.read_uint(3).unwrap());
//! assert_eq!(0b10110, bits.read_uint(5).unwrap());
//! assert_eq!(0b11, bits.read_uint(2).unwrap());
//! ```

use crate::{Error, Result};
use byteorder::ReadBytesExt;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Reads integers of 1 to 32 bits and embedded strings from a byte source.
///
/// The accumulator is MSB-first: the first bit of the file is the highest
/// bit of the first value read. At most 39 bits are ever pending (at most
/// seven left over from earlier reads, plus four fresh bytes to satisfy a
/// 32-bit request).
#[derive(Debug)]
pub struct BitStream<R> {
    read: R,
    buffer: u64,
    pending: u32,
}

impl<R: Read + Seek> BitStream<R> {
    /// Creates a new bit stream over a byte source.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use tcd::BitStream;
    /// let bits = BitStream::new(Cursor::new(vec![0xff]));
    /// ```
    pub fn new(read: R) -> BitStream<R> {
        BitStream {
            read,
            buffer: 0,
            pending: 0,
        }
    }

    /// Reads an unsigned integer of `bits` bits.
    ///
    /// Returns [Error::InvalidBitCount] if `bits` is outside of 1..=32, and
    /// [Error::Truncated] if the source ends before enough bits are
    /// available.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use tcd::BitStream;
    /// let mut bits = BitStream::new(Cursor::new(vec![0xab]));
    /// assert_eq!(0xa, bits.read_uint(4).unwrap());
    /// assert_eq!(0xb, bits.read_uint(4).unwrap());
    /// ```
    pub fn read_uint(&mut self, bits: u32) -> Result<u32> {
        if bits == 0 || bits > 32 {
            return Err(Error::InvalidBitCount(bits));
        }
        while self.pending < bits {
            let byte = match self.read.read_u8() {
                Ok(byte) => byte,
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    return Err(Error::Truncated)
                }
                Err(err) => return Err(err.into()),
            };
            self.buffer = (self.buffer << 8) | u64::from(byte);
            self.pending += 8;
        }
        self.pending -= bits;
        Ok(((self.buffer >> self.pending) & ((1 << bits) - 1)) as u32)
    }

    /// Reads a two's-complement signed integer of `bits` bits.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use tcd::BitStream;
    /// let mut bits = BitStream::new(Cursor::new(vec![0xff]));
    /// assert_eq!(-1, bits.read_int(4).unwrap());
    /// ```
    pub fn read_int(&mut self, bits: u32) -> Result<i32> {
        let raw = self.read_uint(bits)?;
        if bits < 32 && raw >= 1 << (bits - 1) {
            Ok((i64::from(raw) - (1 << bits)) as i32)
        } else {
            Ok(raw as i32)
        }
    }

    /// Reads an unsigned integer and divides it by `scale`.
    pub fn read_scaled(&mut self, bits: u32, scale: f64) -> Result<f64> {
        Ok(f64::from(self.read_uint(bits)?) / scale)
    }

    /// Reads a signed integer and divides it by `scale`.
    pub fn read_scaled_signed(&mut self, bits: u32, scale: f64) -> Result<f64> {
        Ok(f64::from(self.read_int(bits)?) / scale)
    }

    /// Reads an unsigned integer, adds `offset`, and divides by `scale`.
    ///
    /// This is how every self-describing numeric field in a TCD file is
    /// stored: the header gives the width, the pre-division addend, and the
    /// divisor.
    pub fn read_offset_scaled(&mut self, bits: u32, offset: f64, scale: f64) -> Result<f64> {
        Ok((f64::from(self.read_uint(bits)?) + offset) / scale)
    }

    /// Reads bytes in the current bit phase until a zero byte, decoding
    /// them as ISO-8859-1.
    ///
    /// The string need not start on a byte boundary. Bytes 0x80..=0xff are
    /// valid and transcode to their Latin-1 code points.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use tcd::BitStream;
    /// let mut bits = BitStream::new(Cursor::new(b"Ulv\xf8ysund\0".to_vec()));
    /// assert_eq!("Ulvøysund", bits.read_cstring().unwrap());
    /// ```
    pub fn read_cstring(&mut self) -> Result<String> {
        let mut string = String::new();
        loop {
            let byte = self.read_uint(8)? as u8;
            if byte == 0 {
                return Ok(string);
            }
            string.push(char::from(byte));
        }
    }

    /// Discards any pending bits so the next read starts on a byte
    /// boundary.
    pub fn align(&mut self) {
        self.buffer = 0;
        self.pending = 0;
    }

    /// Seeks the underlying source to an absolute byte offset and discards
    /// pending bits.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.align();
        let _ = self.read.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Returns the byte position of the underlying source.
    ///
    /// The sub-byte phase is not exposed.
    pub fn pos(&mut self) -> Result<u64> {
        Ok(self.read.stream_position()?)
    }

    /// Returns a mutable reference to the underlying source.
    ///
    /// Callers should [align](Self::align) first; byte reads made through
    /// this reference bypass the accumulator.
    pub(crate) fn get_mut(&mut self) -> &mut R {
        &mut self.read
    }
}
