//! Builders for synthetic DLIS byte streams used by unit tests.

use byteorder::{BigEndian, WriteBytesExt};

use crate::structs::rep_code::RepCode;
use crate::structs::segment::{CHANNL, EOD, FDATA, FHLR, FRAME};
use crate::structs::value::ObjectName;

pub const WIRE_EXPLICIT: u8 = 0x80;
pub const WIRE_PREDECESSOR: u8 = 0x40;
pub const WIRE_SUCCESSOR: u8 = 0x20;
pub const WIRE_ENCRYPTION: u8 = 0x10;

pub fn write_uvari(out: &mut Vec<u8>, value: u32) {
    if value < 0x80 {
        out.push(value as u8);
    } else if value < 0x4000 {
        out.write_u16::<BigEndian>(value as u16 | 0x8000).unwrap();
    } else {
        out.write_u32::<BigEndian>(value | 0xC000_0000).unwrap();
    }
}

pub fn write_ident(out: &mut Vec<u8>, text: &str) {
    out.push(text.len() as u8);
    out.extend_from_slice(text.as_bytes());
}

pub fn write_obname(out: &mut Vec<u8>, name: &ObjectName) {
    write_uvari(out, name.origin);
    out.push(name.copy);
    write_ident(out, &name.identifier);
}

pub fn idents(texts: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    texts.iter().for_each(|text| write_ident(&mut out, text));
    out
}

pub fn ascii(text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    write_uvari(&mut out, text.len() as u32);
    out.extend_from_slice(text.as_bytes());
    out
}

pub fn uvaris(values: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    values.iter().for_each(|&value| write_uvari(&mut out, value));
    out
}

pub fn obnames(names: &[ObjectName]) -> Vec<u8> {
    let mut out = Vec::new();
    names.iter().for_each(|name| write_obname(&mut out, name));
    out
}

/// Segment header, body and trailer bytes with a wire-order attribute byte.
pub fn segment_bytes(wire_attributes: u8, record_type: u8, body: &[u8], trailer: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_u16::<BigEndian>((4 + body.len() + trailer.len()) as u16)
        .unwrap();
    out.push(wire_attributes);
    out.push(record_type);
    out.extend_from_slice(body);
    out.extend_from_slice(trailer);
    out
}

/// Segments of one logical record with predecessor and successor bits set.
pub fn segments(
    wire_attributes: u8,
    record_type: u8,
    body: &[u8],
    sizes: &[usize],
) -> Vec<Vec<u8>> {
    assert_eq!(sizes.iter().sum::<usize>(), body.len());

    let mut offset = 0;
    let mut out = Vec::new();
    for (i, &size) in sizes.iter().enumerate() {
        let mut attributes = wire_attributes;
        if i > 0 {
            attributes |= WIRE_PREDECESSOR;
        }
        if i + 1 < sizes.len() {
            attributes |= WIRE_SUCCESSOR;
        }
        out.push(segment_bytes(
            attributes,
            record_type,
            &body[offset..offset + size],
            &[],
        ));
        offset += size;
    }
    out
}

#[derive(Default)]
pub struct DlisWriter {
    bytes: Vec<u8>,
}

impl DlisWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label() -> Self {
        let mut bytes = b"   1V1.00RECORD 8192".to_vec();
        bytes.extend_from_slice(format!("{:<60}", "Synthetic Storage Set").as_bytes());
        Self { bytes }
    }

    pub fn visible_record(&mut self, segments: &[Vec<u8>]) -> &mut Self {
        let len: usize = segments.iter().map(Vec::len).sum();
        self.bytes
            .write_u16::<BigEndian>((4 + len) as u16)
            .unwrap();
        self.bytes.extend_from_slice(&[0xFF, 0x01]);
        segments
            .iter()
            .for_each(|segment| self.bytes.extend_from_slice(segment));
        self
    }

    /// One logical record in one segment in its own visible record.
    pub fn record(&mut self, wire_attributes: u8, record_type: u8, body: &[u8]) -> &mut Self {
        self.visible_record(&[segment_bytes(wire_attributes, record_type, body, &[])])
    }

    /// One logical record split into segments of the given sizes, each in
    /// its own visible record.
    pub fn split_record(
        &mut self,
        wire_attributes: u8,
        record_type: u8,
        body: &[u8],
        sizes: &[usize],
    ) -> &mut Self {
        for segment in segments(wire_attributes, record_type, body, sizes) {
            self.visible_record(&[segment]);
        }
        self
    }

    /// One logical record split into segments of the given sizes, all in
    /// the same visible record.
    pub fn packed_record(
        &mut self,
        wire_attributes: u8,
        record_type: u8,
        body: &[u8],
        sizes: &[usize],
    ) -> &mut Self {
        self.visible_record(&segments(wire_attributes, record_type, body, sizes))
    }

    pub fn finish(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

/// Attribute component fields; `None` leaves the format bit clear.
#[derive(Default, Clone)]
pub struct Attr<'a> {
    pub label: Option<&'a str>,
    pub count: Option<u32>,
    pub code: Option<u8>,
    pub units: Option<&'a str>,
    pub value: Option<Vec<u8>>,
}

impl<'a> Attr<'a> {
    pub fn column(label: &'a str, code: RepCode) -> Self {
        Self {
            label: Some(label),
            code: Some(code as u8),
            ..Default::default()
        }
    }

    pub fn value(bytes: Vec<u8>) -> Self {
        Self {
            value: Some(bytes),
            ..Default::default()
        }
    }
}

/// Body of an explicitly formatted logical record.
#[derive(Default)]
pub struct Eflr {
    bytes: Vec<u8>,
}

impl Eflr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, set_type: &str, name: Option<&str>) -> Self {
        self.bytes.push(if name.is_some() { 0xF8 } else { 0xF0 });
        write_ident(&mut self.bytes, set_type);
        if let Some(name) = name {
            write_ident(&mut self.bytes, name);
        }
        self
    }

    pub fn object(mut self, name: &ObjectName) -> Self {
        self.bytes.push(0x70);
        write_obname(&mut self.bytes, name);
        self
    }

    pub fn attribute(mut self, attr: Attr<'_>) -> Self {
        let mut descriptor = 0x20;
        if attr.label.is_some() {
            descriptor |= 0x10;
        }
        if attr.count.is_some() {
            descriptor |= 0x08;
        }
        if attr.code.is_some() {
            descriptor |= 0x04;
        }
        if attr.units.is_some() {
            descriptor |= 0x02;
        }
        if attr.value.is_some() {
            descriptor |= 0x01;
        }
        self.bytes.push(descriptor);

        if let Some(label) = attr.label {
            write_ident(&mut self.bytes, label);
        }
        if let Some(count) = attr.count {
            write_uvari(&mut self.bytes, count);
        }
        if let Some(code) = attr.code {
            self.bytes.push(code);
        }
        if let Some(units) = attr.units {
            write_ident(&mut self.bytes, units);
        }
        if let Some(value) = attr.value {
            self.bytes.extend_from_slice(&value);
        }
        self
    }

    pub fn absent(mut self) -> Self {
        self.bytes.push(0x00);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn bytes(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn name(identifier: &str) -> ObjectName {
    ObjectName::new(2, 0, identifier)
}

/// Frame number `n` of the sample file: TDEP (FSINGL), ACC (3 x SLONG),
/// WAVE (2 x FDOUBL).
pub fn sample_frame(n: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_f32::<BigEndian>(100.0 + n as f32 * 0.5).unwrap();
    for v in [n as i32, -(n as i32), 2 * n as i32] {
        out.write_i32::<BigEndian>(v).unwrap();
    }
    for v in [n as f64 * 1.5, -(n as f64)] {
        out.write_f64::<BigEndian>(v).unwrap();
    }
    out
}

/// FDATA body of frame type MAIN holding the given sample frames.
pub fn fdata(frames: &[u32]) -> Vec<u8> {
    let mut body = Vec::new();
    write_obname(&mut body, &name("MAIN"));
    for &n in frames {
        write_uvari(&mut body, n);
        body.extend_from_slice(&sample_frame(n));
    }
    body
}

pub fn file_header_eflr() -> Vec<u8> {
    Eflr::new()
        .set("FILE-HEADER", None)
        .attribute(Attr::column("SEQUENCE-NUMBER", RepCode::Ascii))
        .attribute(Attr::column("ID", RepCode::Ascii))
        .object(&name("5"))
        .attribute(Attr::value(ascii("1")))
        .attribute(Attr::value(ascii("SYNTHETIC LOG")))
        .bytes()
}

/// CHANNEL set whose instance attributes rely on column inheritance.
pub fn channel_eflr() -> Vec<u8> {
    Eflr::new()
        .set("CHANNEL", Some("0"))
        .attribute(Attr::column("LONG-NAME", RepCode::Ascii))
        .attribute(Attr::column("REPRESENTATION-CODE", RepCode::Ushort))
        .attribute(Attr {
            value: Some(idents(&[""])),
            ..Attr::column("UNITS", RepCode::Units)
        })
        .attribute(Attr {
            value: Some(uvaris(&[1])),
            ..Attr::column("DIMENSION", RepCode::Uvari)
        })
        .object(&name("TDEP"))
        .absent()
        .attribute(Attr::value(vec![RepCode::Fsingl as u8]))
        .attribute(Attr::value(idents(&["0.1 in"])))
        .object(&name("ACC"))
        .attribute(Attr::value(ascii("Acceleration")))
        .attribute(Attr::value(vec![RepCode::Slong as u8]))
        .attribute(Attr::value(idents(&["m/s2"])))
        .attribute(Attr::value(uvaris(&[3])))
        .object(&name("WAVE"))
        .attribute(Attr::value(ascii("Waveform")))
        .attribute(Attr::value(vec![RepCode::Fdoubl as u8]))
        .attribute(Attr::default())
        .attribute(Attr {
            count: Some(1),
            ..Attr::value(uvaris(&[2]))
        })
        .bytes()
}

pub fn frame_eflr() -> Vec<u8> {
    Eflr::new()
        .set("FRAME", None)
        .attribute(Attr::column("DESCRIPTION", RepCode::Ascii))
        .attribute(Attr::column("CHANNELS", RepCode::Obname))
        .object(&name("MAIN"))
        .attribute(Attr::value(ascii("Main frame")))
        .attribute(Attr {
            count: Some(3),
            ..Attr::value(obnames(&[name("TDEP"), name("ACC"), name("WAVE")]))
        })
        .bytes()
}

/// CHANNEL set with one object per `(name, code, dimensions)`.
pub fn channel_set(channels: &[(&str, RepCode, &[u32])]) -> Vec<u8> {
    let mut eflr = Eflr::new()
        .set("CHANNEL", None)
        .attribute(Attr::column("REPRESENTATION-CODE", RepCode::Ushort))
        .attribute(Attr::column("DIMENSION", RepCode::Uvari));
    for &(channel, code, dimensions) in channels {
        eflr = eflr
            .object(&name(channel))
            .attribute(Attr::value(vec![code as u8]))
            .attribute(Attr {
                count: Some(dimensions.len() as u32),
                ..Attr::value(uvaris(dimensions))
            });
    }
    eflr.bytes()
}

/// FRAME set with frame type MAIN over the named channels.
pub fn frame_set(channels: &[&str]) -> Vec<u8> {
    let names: Vec<ObjectName> = channels.iter().map(|channel| name(channel)).collect();
    Eflr::new()
        .set("FRAME", None)
        .attribute(Attr::column("CHANNELS", RepCode::Obname))
        .object(&name("MAIN"))
        .attribute(Attr {
            count: Some(names.len() as u32),
            ..Attr::value(obnames(&names))
        })
        .bytes()
}

fn thirds(len: usize) -> [usize; 3] {
    let third = len / 3;
    [third, third, len - 2 * third]
}

/// How [`sample_file`] lays its logical records out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragments {
    /// One segment per logical record, one visible record each.
    Whole,
    /// Explicitly formatted records split over three visible records.
    AcrossVisibleRecords,
    /// Every record split into three segments inside one visible record;
    /// the last frame data record shares its visible record with EOD.
    WithinVisibleRecord,
}

/// A complete logical file: file header, CHANNEL and FRAME sets, three
/// frames over two FDATA records and an end-of-data record.
pub fn sample_file(fragments: Fragments) -> Vec<u8> {
    let mut writer = DlisWriter::with_label();

    for (record_type, body) in [
        (FHLR, file_header_eflr()),
        (CHANNL, channel_eflr()),
        (FRAME, frame_eflr()),
    ] {
        match fragments {
            Fragments::Whole => {
                writer.record(WIRE_EXPLICIT, record_type, &body);
            }
            Fragments::AcrossVisibleRecords => {
                writer.split_record(WIRE_EXPLICIT, record_type, &body, &thirds(body.len()));
            }
            Fragments::WithinVisibleRecord => {
                writer.packed_record(WIRE_EXPLICIT, record_type, &body, &thirds(body.len()));
            }
        }
    }

    let first = fdata(&[1, 2]);
    let second = fdata(&[3]);
    if fragments == Fragments::WithinVisibleRecord {
        writer.packed_record(0, FDATA, &first, &thirds(first.len()));
        let mut tail = segments(0, FDATA, &second, &thirds(second.len()));
        tail.push(segment_bytes(0, EOD, &[], &[]));
        writer.visible_record(&tail);
    } else {
        writer.record(0, FDATA, &first);
        writer.record(0, FDATA, &second);
        writer.record(0, EOD, &[]);
    }
    writer.finish()
}
