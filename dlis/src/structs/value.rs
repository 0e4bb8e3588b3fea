//! Representation code decoding into typed values.

use std::fmt::{self, Display};

use anyhow::{Result, bail};
use byteorder::{BigEndian, ByteOrder};
use chrono::NaiveDateTime;

use crate::structs::rep_code::{RepCode, Width};
use crate::utils::errors::{ReadError, ValueError};

/// Sequential source of big-endian bytes for value decoding.
pub trait ReadBytes {
    fn read_into(&mut self, dst: &mut [u8]) -> Result<()>;

    fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_into(&mut byte)?;
        Ok(byte[0])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        self.read_into(&mut bytes)?;
        Ok(bytes)
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        self.read_into(&mut bytes)?;
        Ok(bytes)
    }
}

impl ReadBytes for &[u8] {
    fn read_into(&mut self, dst: &mut [u8]) -> Result<()> {
        if self.len() < dst.len() {
            bail!(ReadError::Truncated {
                needed: dst.len(),
                available: self.len(),
            });
        }
        let (head, tail) = self.split_at(dst.len());
        dst.copy_from_slice(head);
        *self = tail;
        Ok(())
    }
}

/// Reads a UVARI (or ORIGIN): the two high bits of the first byte select a
/// total width of one (`0x`), two (`10`) or four (`11`) bytes.
pub fn read_uvari<B: ReadBytes>(reader: &mut B) -> Result<u32> {
    let first = reader.read_u8()?;

    if first & 0xC0 == 0xC0 {
        let rest = reader.read_array::<3>()?;
        Ok(u32::from_be_bytes([first & 0x3F, rest[0], rest[1], rest[2]]))
    } else if first & 0x80 != 0 {
        let rest = reader.read_u8()?;
        Ok(u32::from_be_bytes([0, 0, first & 0x7F, rest]))
    } else {
        Ok(first as u32)
    }
}

fn trim_bytes(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b > b' ').unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| b > b' ').map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn read_string<B: ReadBytes>(reader: &mut B, len: usize) -> Result<String> {
    let raw = reader.read_vec(len)?;
    Ok(String::from_utf8_lossy(trim_bytes(&raw)).into_owned())
}

/// IDENT and UNITS: USHORT length prefix.
pub fn read_ident<B: ReadBytes>(reader: &mut B) -> Result<String> {
    let len = reader.read_u8()? as usize;
    read_string(reader, len)
}

/// ASCII: UVARI length prefix.
pub fn read_ascii<B: ReadBytes>(reader: &mut B) -> Result<String> {
    let len = read_uvari(reader)? as usize;
    read_string(reader, len)
}

/// Compound object name: origin reference, copy number and identifier.
///
/// Two names are equal only when all three parts are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ObjectName {
    pub origin: u32,
    pub copy: u8,
    pub identifier: String,
}

impl ObjectName {
    pub fn new(origin: u32, copy: u8, identifier: impl Into<String>) -> Self {
        Self {
            origin,
            copy,
            identifier: identifier.into(),
        }
    }

    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<Self> {
        Ok(Self {
            origin: read_uvari(reader)?,
            copy: reader.read_u8()?,
            identifier: read_ident(reader)?,
        })
    }
}

impl Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}.{}]", self.identifier, self.origin, self.copy)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub object_type: String,
    pub name: ObjectName,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AttributeRef {
    pub object_type: String,
    pub name: ObjectName,
    pub label: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DateTime {
    pub year: u16,
    /// 0 local standard, 1 local daylight savings, 2 UTC.
    pub time_zone: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
}

impl DateTime {
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self {
            year: 1900 + bytes[0] as u16,
            time_zone: bytes[1] >> 4,
            month: bytes[1] & 0x0F,
            day: bytes[2],
            hour: bytes[3],
            minute: bytes[4],
            second: bytes[5],
            millisecond: BigEndian::read_u16(&bytes[6..8]),
        }
    }

    pub fn time_zone_name(&self) -> &'static str {
        match self.time_zone {
            0 => "local standard",
            1 => "local daylight savings",
            2 => "UTC",
            _ => "unknown",
        }
    }

    /// Calendar date and time, ignoring the time zone. `None` if out of range.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        chrono::NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?
            .and_hms_milli_opt(
                self.hour as u32,
                self.minute as u32,
                self.second as u32,
                self.millisecond as u32,
            )
    }
}

impl Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.millisecond
        )
    }
}

/// One decoded value, tagged by its representation code.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Fshort(f32),
    Fsingl(f32),
    Fsing1 { value: f32, bound: f32 },
    Fsing2 { value: f32, lower: f32, upper: f32 },
    Isingl(f32),
    Vsingl(f32),
    Fdoubl(f64),
    Fdoub1 { value: f64, bound: f64 },
    Fdoub2 { value: f64, lower: f64, upper: f64 },
    Csingl { re: f32, im: f32 },
    Cdoubl { re: f64, im: f64 },
    Sshort(i8),
    Snorm(i16),
    Slong(i32),
    Ushort(u8),
    Unorm(u16),
    Ulong(u32),
    Uvari(u32),
    Ident(String),
    Ascii(String),
    Dtime(DateTime),
    Origin(u32),
    Obname(ObjectName),
    Objref(ObjectRef),
    Attref(AttributeRef),
    Status(bool),
    Units(String),
}

fn fshort(raw: u16) -> f32 {
    let mantissa = (raw as i16) >> 4;
    let exponent = (raw & 0x0F) as i32;
    mantissa as f32 / 2048.0 * 2f32.powi(exponent)
}

fn ibm_single(raw: u32) -> f32 {
    let fraction = (raw & 0x00FF_FFFF) as f64 / 16_777_216.0;
    let exponent = ((raw >> 24) & 0x7F) as i32 - 64;
    let value = fraction * 16f64.powi(exponent);
    if raw >> 31 != 0 {
        -value as f32
    } else {
        value as f32
    }
}

fn vax_single(bytes: [u8; 4]) -> f32 {
    let raw = u32::from_be_bytes([bytes[1], bytes[0], bytes[3], bytes[2]]);
    let exponent = ((raw >> 23) & 0xFF) as i32;
    if exponent == 0 {
        return 0.0;
    }
    let fraction = 0.5 + (raw & 0x007F_FFFF) as f64 / 16_777_216.0;
    let value = fraction * 2f64.powi(exponent - 128);
    if raw >> 31 != 0 {
        -value as f32
    } else {
        value as f32
    }
}

impl Value {
    /// Decodes one fixed-width element. `bytes` must be exactly as long as
    /// the code's width.
    pub fn decode_fixed(code: RepCode, bytes: &[u8]) -> Result<Self> {
        let Width::Fixed(size) = code.width() else {
            bail!(ValueError::NotFixed(code.name()));
        };
        if bytes.len() != size {
            bail!(ValueError::WidthMismatch {
                code: code.name(),
                expected: size,
                actual: bytes.len(),
            });
        }

        let f32_at = |i: usize| BigEndian::read_f32(&bytes[i..i + 4]);
        let f64_at = |i: usize| BigEndian::read_f64(&bytes[i..i + 8]);

        Ok(match code {
            RepCode::Fshort => Value::Fshort(fshort(BigEndian::read_u16(bytes))),
            RepCode::Fsingl => Value::Fsingl(f32_at(0)),
            RepCode::Fsing1 => Value::Fsing1 {
                value: f32_at(0),
                bound: f32_at(4),
            },
            RepCode::Fsing2 => Value::Fsing2 {
                value: f32_at(0),
                lower: f32_at(4),
                upper: f32_at(8),
            },
            RepCode::Isingl => Value::Isingl(ibm_single(BigEndian::read_u32(bytes))),
            RepCode::Vsingl => Value::Vsingl(vax_single([bytes[0], bytes[1], bytes[2], bytes[3]])),
            RepCode::Fdoubl => Value::Fdoubl(f64_at(0)),
            RepCode::Fdoub1 => Value::Fdoub1 {
                value: f64_at(0),
                bound: f64_at(8),
            },
            RepCode::Fdoub2 => Value::Fdoub2 {
                value: f64_at(0),
                lower: f64_at(8),
                upper: f64_at(16),
            },
            RepCode::Csingl => Value::Csingl {
                re: f32_at(0),
                im: f32_at(4),
            },
            RepCode::Cdoubl => Value::Cdoubl {
                re: f64_at(0),
                im: f64_at(8),
            },
            RepCode::Sshort => Value::Sshort(bytes[0] as i8),
            RepCode::Snorm => Value::Snorm(BigEndian::read_i16(bytes)),
            RepCode::Slong => Value::Slong(BigEndian::read_i32(bytes)),
            RepCode::Ushort => Value::Ushort(bytes[0]),
            RepCode::Unorm => Value::Unorm(BigEndian::read_u16(bytes)),
            RepCode::Ulong => Value::Ulong(BigEndian::read_u32(bytes)),
            RepCode::Dtime => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Value::Dtime(DateTime::from_bytes(raw))
            }
            RepCode::Status => Value::Status(bytes[0] != 0),
            _ => bail!(ValueError::NotFixed(code.name())),
        })
    }

    /// Reads one value of any representation code.
    pub fn read<B: ReadBytes>(reader: &mut B, code: RepCode) -> Result<Self> {
        Ok(match code {
            RepCode::Uvari => Value::Uvari(read_uvari(reader)?),
            RepCode::Origin => Value::Origin(read_uvari(reader)?),
            RepCode::Ident => Value::Ident(read_ident(reader)?),
            RepCode::Units => Value::Units(read_ident(reader)?),
            RepCode::Ascii => Value::Ascii(read_ascii(reader)?),
            RepCode::Obname => Value::Obname(ObjectName::read(reader)?),
            RepCode::Objref => Value::Objref(ObjectRef {
                object_type: read_ident(reader)?,
                name: ObjectName::read(reader)?,
            }),
            RepCode::Attref => Value::Attref(AttributeRef {
                object_type: read_ident(reader)?,
                name: ObjectName::read(reader)?,
                label: read_ident(reader)?,
            }),
            fixed => {
                let Some(size) = fixed.fixed_size() else {
                    bail!(ValueError::NotFixed(fixed.name()));
                };
                let mut raw = [0u8; 24];
                reader.read_into(&mut raw[..size])?;
                Value::decode_fixed(fixed, &raw[..size])?
            }
        })
    }

    pub fn rep_code(&self) -> RepCode {
        match self {
            Value::Fshort(_) => RepCode::Fshort,
            Value::Fsingl(_) => RepCode::Fsingl,
            Value::Fsing1 { .. } => RepCode::Fsing1,
            Value::Fsing2 { .. } => RepCode::Fsing2,
            Value::Isingl(_) => RepCode::Isingl,
            Value::Vsingl(_) => RepCode::Vsingl,
            Value::Fdoubl(_) => RepCode::Fdoubl,
            Value::Fdoub1 { .. } => RepCode::Fdoub1,
            Value::Fdoub2 { .. } => RepCode::Fdoub2,
            Value::Csingl { .. } => RepCode::Csingl,
            Value::Cdoubl { .. } => RepCode::Cdoubl,
            Value::Sshort(_) => RepCode::Sshort,
            Value::Snorm(_) => RepCode::Snorm,
            Value::Slong(_) => RepCode::Slong,
            Value::Ushort(_) => RepCode::Ushort,
            Value::Unorm(_) => RepCode::Unorm,
            Value::Ulong(_) => RepCode::Ulong,
            Value::Uvari(_) => RepCode::Uvari,
            Value::Ident(_) => RepCode::Ident,
            Value::Ascii(_) => RepCode::Ascii,
            Value::Dtime(_) => RepCode::Dtime,
            Value::Origin(_) => RepCode::Origin,
            Value::Obname(_) => RepCode::Obname,
            Value::Objref(_) => RepCode::Objref,
            Value::Attref(_) => RepCode::Attref,
            Value::Status(_) => RepCode::Status,
            Value::Units(_) => RepCode::Units,
        }
    }

    /// Integer view of integer and status values. Floats are not truncated.
    pub fn as_i64(&self) -> Option<i64> {
        Some(match *self {
            Value::Sshort(v) => v as i64,
            Value::Snorm(v) => v as i64,
            Value::Slong(v) => v as i64,
            Value::Ushort(v) => v as i64,
            Value::Unorm(v) => v as i64,
            Value::Ulong(v) | Value::Uvari(v) | Value::Origin(v) => v as i64,
            Value::Status(v) => v as i64,
            _ => return None,
        })
    }

    /// Numeric view of real and integer values. Bounded reals yield their
    /// nominal value, complex values their real part.
    pub fn as_f64(&self) -> Option<f64> {
        Some(match *self {
            Value::Fshort(v) | Value::Fsingl(v) | Value::Isingl(v) | Value::Vsingl(v) => v as f64,
            Value::Fsing1 { value, .. } | Value::Fsing2 { value, .. } => value as f64,
            Value::Csingl { re, .. } => re as f64,
            Value::Fdoubl(v) => v,
            Value::Fdoub1 { value, .. } | Value::Fdoub2 { value, .. } => value,
            Value::Cdoubl { re, .. } => re,
            _ => return self.as_i64().map(|v| v as f64),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Ident(s) | Value::Ascii(s) | Value::Units(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object_name(&self) -> Option<&ObjectName> {
        match self {
            Value::Obname(name) => Some(name),
            Value::Objref(reference) => Some(&reference.name),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Fshort(v) | Value::Fsingl(v) | Value::Isingl(v) | Value::Vsingl(v) => {
                write!(f, "{v}")
            }
            Value::Fsing1 { value, bound } => write!(f, "{value} ({bound})"),
            Value::Fsing2 {
                value,
                lower,
                upper,
            } => write!(f, "{value} ({lower}, {upper})"),
            Value::Fdoubl(v) => write!(f, "{v}"),
            Value::Fdoub1 { value, bound } => write!(f, "{value} ({bound})"),
            Value::Fdoub2 {
                value,
                lower,
                upper,
            } => write!(f, "{value} ({lower}, {upper})"),
            Value::Csingl { re, im } => write!(f, "({re}, {im})"),
            Value::Cdoubl { re, im } => write!(f, "({re}, {im})"),
            Value::Sshort(v) => write!(f, "{v}"),
            Value::Snorm(v) => write!(f, "{v}"),
            Value::Slong(v) => write!(f, "{v}"),
            Value::Ushort(v) => write!(f, "{v}"),
            Value::Unorm(v) => write!(f, "{v}"),
            Value::Ulong(v) | Value::Uvari(v) | Value::Origin(v) => write!(f, "{v}"),
            Value::Ident(s) | Value::Ascii(s) | Value::Units(s) => write!(f, "{s}"),
            Value::Dtime(dt) => write!(f, "{dt}"),
            Value::Obname(name) => write!(f, "{name}"),
            Value::Objref(r) => write!(f, "{}:{}", r.object_type, r.name),
            Value::Attref(r) => write!(f, "{}:{}:{}", r.object_type, r.name, r.label),
            Value::Status(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::write_uvari;

    #[test]
    fn uvari_round_trip() {
        for value in [0u32, 63, 64, 127, 128, 16383, 16384, 0x3FFF_FFFF] {
            let mut encoded = Vec::new();
            write_uvari(&mut encoded, value);
            let mut reader = encoded.as_slice();
            assert_eq!(read_uvari(&mut reader).unwrap(), value, "{value}");
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn uvari_prefix_widths() {
        let mut one: &[u8] = &[0x7F];
        assert_eq!(read_uvari(&mut one).unwrap(), 127);

        let mut two: &[u8] = &[0x80, 0x80];
        assert_eq!(read_uvari(&mut two).unwrap(), 128);

        let mut four: &[u8] = &[0xC0, 0x00, 0x40, 0x00];
        assert_eq!(read_uvari(&mut four).unwrap(), 16384);
    }

    #[test]
    fn strings_are_trimmed() {
        let mut ident: &[u8] = &[6, b' ', b'D', b'E', b'P', b'T', b' '];
        assert_eq!(read_ident(&mut ident).unwrap(), "DEPT");

        let mut ascii: &[u8] = &[3, 0, b'f', b't'];
        assert_eq!(read_ascii(&mut ascii).unwrap(), "ft");

        let mut blank: &[u8] = &[2, b' ', b' '];
        assert_eq!(read_ident(&mut blank).unwrap(), "");
    }

    #[test]
    fn floats_decode_153() {
        assert_eq!(
            Value::decode_fixed(RepCode::Fshort, &[0x4C, 0x88]).unwrap(),
            Value::Fshort(153.0)
        );
        assert_eq!(
            Value::decode_fixed(RepCode::Fsingl, &153f32.to_be_bytes()).unwrap(),
            Value::Fsingl(153.0)
        );
        assert_eq!(
            Value::decode_fixed(RepCode::Isingl, &[0x42, 0x99, 0x00, 0x00]).unwrap(),
            Value::Isingl(153.0)
        );
        assert_eq!(
            Value::decode_fixed(RepCode::Vsingl, &[0x19, 0x44, 0x00, 0x00]).unwrap(),
            Value::Vsingl(153.0)
        );
        assert_eq!(
            Value::decode_fixed(RepCode::Isingl, &[0xC2, 0x99, 0x00, 0x00]).unwrap(),
            Value::Isingl(-153.0)
        );
        assert_eq!(
            Value::decode_fixed(RepCode::Fshort, &[0xB3, 0x88]).unwrap(),
            Value::Fshort(-153.0)
        );
    }

    #[test]
    fn integers_and_status() {
        assert_eq!(
            Value::decode_fixed(RepCode::Snorm, &[0xFF, 0x99]).unwrap(),
            Value::Snorm(-103)
        );
        assert_eq!(
            Value::decode_fixed(RepCode::Ulong, &[0, 0, 0x01, 0x00]).unwrap(),
            Value::Ulong(256)
        );
        assert_eq!(
            Value::decode_fixed(RepCode::Status, &[1]).unwrap(),
            Value::Status(true)
        );
        assert_eq!(Value::Snorm(-103).as_i64(), Some(-103));
        assert!(Value::decode_fixed(RepCode::Ulong, &[0, 0]).is_err());
        assert!(Value::decode_fixed(RepCode::Ident, &[0]).is_err());
    }

    #[test]
    fn dtime_fields() {
        let raw = [87, 0x24, 19, 21, 20, 30, 0x02, 0x6E];
        let Value::Dtime(dt) = Value::decode_fixed(RepCode::Dtime, &raw).unwrap() else {
            panic!("not a DTIME");
        };
        assert_eq!(dt.year, 1987);
        assert_eq!(dt.time_zone_name(), "UTC");
        assert_eq!(dt.month, 4);
        assert_eq!(dt.millisecond, 622);
        assert_eq!(dt.to_string(), "1987-04-19 21:20:30.622");
        assert!(dt.to_naive().is_some());
    }

    #[test]
    fn complex_codes() {
        let mut raw: &[u8] = &[
            5, b'F', b'R', b'A', b'M', b'E', // type
            0x02, 0x00, 4, b'M', b'A', b'I', b'N', // name
            7, b'C', b'H', b'A', b'N', b'N', b'E', b'L', // label
        ];
        let value = Value::read(&mut raw, RepCode::Attref).unwrap();
        assert_eq!(
            value,
            Value::Attref(AttributeRef {
                object_type: "FRAME".into(),
                name: ObjectName::new(2, 0, "MAIN"),
                label: "CHANNEL".into(),
            })
        );
        assert_eq!(value.as_object_name(), Some(&ObjectName::new(2, 0, "MAIN")));
        assert!(raw.is_empty());
    }

    #[test]
    fn object_name_equality_uses_all_parts() {
        assert_ne!(ObjectName::new(1, 0, "GR"), ObjectName::new(2, 0, "GR"));
        assert_ne!(ObjectName::new(1, 0, "GR"), ObjectName::new(1, 1, "GR"));
        assert_eq!(ObjectName::new(1, 0, "GR"), ObjectName::new(1, 0, "GR"));
    }
}
