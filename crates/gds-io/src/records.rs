//! C1: GDSII record primitives — big-endian scalar decoding and the
//! length-prefixed typed-record frame itself.
//!
//! Every decoder here takes a byte slice that has already been sliced out of
//! a record's payload by [`RecordReader`] and fails with [`GdsError::Malformed`]
//! on short input. Nothing here understands record *semantics* (that is
//! `parser.rs`'s job) — this module only knows how to cut bytes into numbers.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::GdsError;

/// Record type tag, upper byte of the 16-bit `(rec_type, data_type)` word as
/// GDSII streams actually encode it. Matches the teacher's `opensilicon-io`
/// constant set, which is itself the standard GDSII table.
#[allow(dead_code)]
pub mod record_type {
    pub const HEADER: u16 = 0x0002;
    pub const BGNLIB: u16 = 0x0102;
    pub const LIBNAME: u16 = 0x0206;
    pub const UNITS: u16 = 0x0305;
    pub const ENDLIB: u16 = 0x0400;
    pub const BGNSTR: u16 = 0x0502;
    pub const STRNAME: u16 = 0x0606;
    pub const ENDSTR: u16 = 0x0700;
    pub const BOUNDARY: u16 = 0x0800;
    pub const PATH: u16 = 0x0900;
    pub const SREF: u16 = 0x0A00;
    pub const AREF: u16 = 0x0B00;
    pub const TEXT: u16 = 0x0C00;
    pub const LAYER: u16 = 0x0D02;
    pub const DATATYPE: u16 = 0x0E02;
    pub const WIDTH: u16 = 0x0F03;
    pub const XY: u16 = 0x1003;
    pub const ENDEL: u16 = 0x1100;
    pub const SNAME: u16 = 0x1206;
    pub const COLROW: u16 = 0x1302;
    pub const NODE: u16 = 0x1500;
    pub const TEXTTYPE: u16 = 0x1602;
    pub const PRESENTATION: u16 = 0x1701;
    pub const STRING: u16 = 0x1906;
    pub const STRANS: u16 = 0x1A01;
    pub const MAG: u16 = 0x1B05;
    pub const ANGLE: u16 = 0x1C05;
    pub const PATHTYPE: u16 = 0x2102;
    pub const BOX: u16 = 0x2D00;
    pub const BOXTYPE: u16 = 0x2E02;
}

/// One length-prefixed GDSII record, header already stripped off.
#[derive(Debug)]
pub struct Record {
    pub rec_type: u16,
    pub offset: u64,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn as_u16(&self) -> Result<u16, GdsError> {
        be_u16(&self.payload, self.offset)
    }

    pub fn as_i16_vec(&self) -> Result<Vec<i16>, GdsError> {
        be_i16_vec(&self.payload, self.offset)
    }

    pub fn as_i32_vec(&self) -> Result<Vec<i32>, GdsError> {
        be_i32_vec(&self.payload, self.offset)
    }

    pub fn as_real8_vec(&self) -> Result<Vec<f64>, GdsError> {
        be_real8_vec(&self.payload, self.offset)
    }

    /// GDSII ASCII strings are NUL-padded to an even byte count; trailing
    /// NULs are trimmed.
    pub fn as_ascii(&self) -> String {
        let s: String = self.payload.iter().map(|&b| b as char).collect();
        s.trim_end_matches('\0').to_string()
    }

    pub fn as_date_sextets(&self) -> Result<([u16; 6], [u16; 6]), GdsError> {
        let values = be_u16_vec(&self.payload, self.offset)?;
        if values.len() != 12 {
            return Err(GdsError::malformed(
                self.offset,
                format!("BGNLIB/BGNSTR date payload has {} u16s, expected 12", values.len()),
            ));
        }
        let mut mod_time = [0u16; 6];
        let mut access_time = [0u16; 6];
        mod_time.copy_from_slice(&values[0..6]);
        access_time.copy_from_slice(&values[6..12]);
        Ok((mod_time, access_time))
    }
}

fn be_u16(buf: &[u8], offset: u64) -> Result<u16, GdsError> {
    if buf.len() < 2 {
        return Err(GdsError::malformed(offset, "expected 2 bytes for u16"));
    }
    Ok((&buf[..2]).read_u16::<BigEndian>().expect("length checked"))
}

fn be_u16_vec(buf: &[u8], offset: u64) -> Result<Vec<u16>, GdsError> {
    if buf.len() % 2 != 0 {
        return Err(GdsError::malformed(offset, "u16 payload length not a multiple of 2"));
    }
    buf.chunks_exact(2)
        .map(|c| Ok((&c[..]).read_u16::<BigEndian>().expect("chunk is 2 bytes")))
        .collect()
}

fn be_i16_vec(buf: &[u8], offset: u64) -> Result<Vec<i16>, GdsError> {
    if buf.len() % 2 != 0 {
        return Err(GdsError::malformed(offset, "i16 payload length not a multiple of 2"));
    }
    buf.chunks_exact(2)
        .map(|c| Ok((&c[..]).read_i16::<BigEndian>().expect("chunk is 2 bytes")))
        .collect()
}

fn be_i32_vec(buf: &[u8], offset: u64) -> Result<Vec<i32>, GdsError> {
    if buf.len() % 4 != 0 {
        return Err(GdsError::malformed(offset, "i32 payload length not a multiple of 4"));
    }
    buf.chunks_exact(4)
        .map(|c| Ok((&c[..]).read_i32::<BigEndian>().expect("chunk is 4 bytes")))
        .collect()
}

fn be_real8_vec(buf: &[u8], offset: u64) -> Result<Vec<f64>, GdsError> {
    if buf.len() % 8 != 0 {
        return Err(GdsError::malformed(offset, "real8 payload length not a multiple of 8"));
    }
    Ok(buf.chunks_exact(8).map(real8_to_f64).collect())
}

/// Decodes one GDSII 8-byte real: 1 sign bit, 7-bit excess-64 base-16
/// exponent, 56-bit unsigned fraction. An all-zero field is 0.0 without
/// touching the exponent bias (an unbiased zero exponent would otherwise
/// make this a valid, nonzero subnormal-like value).
pub fn real8_to_f64(bytes: &[u8]) -> f64 {
    debug_assert_eq!(bytes.len(), 8);
    if bytes.iter().all(|&b| b == 0) {
        return 0.0;
    }
    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = (bytes[0] & 0x7F) as i32 - 64;

    let mut mantissa: u64 = 0;
    for &b in &bytes[1..8] {
        mantissa = (mantissa << 8) | b as u64;
    }
    let fraction = mantissa as f64 / (1u64 << 56) as f64;
    sign * fraction * 16f64.powi(exponent)
}

/// Reads one `[u16 byte_length][u8 rec_type][u8 data_type][payload]` frame
/// from `reader`, tracking its own byte offset for error messages.
///
/// Returns `Ok(None)` on a clean EOF (no bytes at all read for the length
/// field) and `Ok(Some(Record { rec_type: 0, .. }))`-free zero-length
/// padding is handled by the caller, which knows whether a frame is open.
pub struct RecordReader<R: Read> {
    reader: R,
    offset: u64,
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, offset: 0 }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next record header + payload. A `byte_length` of exactly
    /// `0` is reported back to the caller as `Ok(Some(ZeroLength))` — the
    /// caller (the parser) is the one who knows whether zero padding is
    /// tolerable at this point in the stream.
    pub fn next_record(&mut self) -> Result<Option<RawFrame>, GdsError> {
        let start = self.offset;
        let mut len_buf = [0u8; 2];
        match read_exact_or_eof(&mut self.reader, &mut len_buf)? {
            false => return Ok(None),
            true => {}
        }
        self.offset += 2;
        let byte_length = u16::from_be_bytes(len_buf);

        if byte_length == 0 {
            return Ok(Some(RawFrame::ZeroLength { offset: start }));
        }
        if byte_length < 4 {
            return Err(GdsError::malformed(
                start,
                format!("record byte_length {} is smaller than the 4-byte header", byte_length),
            ));
        }

        let mut header = [0u8; 2];
        self.reader.read_exact(&mut header).map_err(|e| io_or_malformed(e, self.offset))?;
        self.offset += 2;
        let rec_type_full = u16::from_be_bytes(header);

        let payload_len = byte_length as usize - 4;
        let mut payload = vec![0u8; payload_len];
        if payload_len > 0 {
            self.reader.read_exact(&mut payload).map_err(|e| io_or_malformed(e, self.offset))?;
        }
        self.offset += payload_len as u64;

        Ok(Some(RawFrame::Record(Record { rec_type: rec_type_full, offset: start, payload })))
    }
}

/// What [`RecordReader::next_record`] can hand back: a real record, or the
/// zero-length padding GDSII streams are allowed to trail with.
pub enum RawFrame {
    Record(Record),
    ZeroLength { offset: u64 },
}

fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool, GdsError> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => {
                if read == 0 {
                    return Ok(false);
                }
                return Err(GdsError::malformed(read as u64, "truncated record length field"));
            }
            Ok(n) => read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(GdsError::Io(e)),
        }
    }
    Ok(true)
}

fn io_or_malformed(e: std::io::Error, offset: u64) -> GdsError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        GdsError::malformed(offset, "unexpected end of file inside a record")
    } else {
        GdsError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real8_zero_is_exact() {
        assert_eq!(real8_to_f64(&[0u8; 8]), 0.0);
    }

    #[test]
    fn real8_decodes_one_point_zero() {
        // 1.0 = sign 0, exponent 65 (excess-64 -> 1), fraction 0x10...0 (1/16 * 16^1 = 1.0)
        let bytes = [0x41, 0x10, 0, 0, 0, 0, 0, 0];
        assert!((real8_to_f64(&bytes) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn real8_decodes_negative() {
        let bytes = [0xC1, 0x10, 0, 0, 0, 0, 0, 0];
        assert!((real8_to_f64(&bytes) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn be_i32_vec_rejects_odd_length() {
        let buf = [0u8; 5];
        assert!(be_i32_vec(&buf, 0).is_err());
    }

    #[test]
    fn record_reader_reads_header_and_payload() {
        // byte_length=8, rec_type=HEADER(0x0002), payload = u16(7)
        let bytes = [0x00, 0x08, 0x00, 0x02, 0x00, 0x07];
        let mut reader = RecordReader::new(&bytes[..]);
        let frame = reader.next_record().unwrap().unwrap();
        match frame {
            RawFrame::Record(rec) => {
                assert_eq!(rec.rec_type, record_type::HEADER);
                assert_eq!(rec.as_u16().unwrap(), 7);
            }
            RawFrame::ZeroLength { .. } => panic!("expected a record"),
        }
    }

    #[test]
    fn record_reader_reports_clean_eof() {
        let mut reader = RecordReader::new(&[][..]);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn record_reader_reports_zero_length_padding() {
        let bytes = [0x00, 0x00];
        let mut reader = RecordReader::new(&bytes[..]);
        let frame = reader.next_record().unwrap().unwrap();
        assert!(matches!(frame, RawFrame::ZeroLength { .. }));
    }

    #[test]
    fn record_reader_rejects_too_short_length() {
        let bytes = [0x00, 0x02, 0x00, 0x02];
        let mut reader = RecordReader::new(&bytes[..]);
        assert!(reader.next_record().is_err());
    }
}
