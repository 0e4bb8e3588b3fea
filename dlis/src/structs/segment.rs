use anyhow::{Result, bail};
use byteorder::{BigEndian, ByteOrder};

pub const SEGMENT_HEADER_LEN: usize = 4;

/// Logical record segment attribute bits.
///
/// Stored in reflected form: the wire byte is bit-reversed on read, so
/// logical bit 7 (explicitly formatted) lands at bit 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentAttributes(u8);

impl SegmentAttributes {
    pub const EXPLICIT: u8 = 1 << 0;
    pub const PREDECESSOR: u8 = 1 << 1;
    pub const SUCCESSOR: u8 = 1 << 2;
    pub const ENCRYPTION: u8 = 1 << 3;
    pub const ENCRYPTION_PACKET: u8 = 1 << 4;
    pub const CHECKSUM: u8 = 1 << 5;
    pub const TRAILING_LENGTH: u8 = 1 << 6;
    pub const PADDING: u8 = 1 << 7;

    pub fn from_wire(byte: u8) -> Self {
        Self(byte.reverse_bits())
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn explicitly_formatted(self) -> bool {
        self.has(Self::EXPLICIT)
    }

    pub fn has_predecessor(self) -> bool {
        self.has(Self::PREDECESSOR)
    }

    pub fn has_successor(self) -> bool {
        self.has(Self::SUCCESSOR)
    }

    pub fn encrypted(self) -> bool {
        self.has(Self::ENCRYPTION)
    }

    pub fn has_encryption_packet(self) -> bool {
        self.has(Self::ENCRYPTION_PACKET)
    }

    pub fn has_checksum(self) -> bool {
        self.has(Self::CHECKSUM)
    }

    pub fn has_trailing_length(self) -> bool {
        self.has(Self::TRAILING_LENGTH)
    }

    pub fn has_padding(self) -> bool {
        self.has(Self::PADDING)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentHeader {
    pub length: u16,
    pub attributes: SegmentAttributes,
    pub record_type: u8,
}

impl SegmentHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SEGMENT_HEADER_LEN {
            bail!("Segment header needs {SEGMENT_HEADER_LEN} bytes");
        }

        Ok(Self {
            length: BigEndian::read_u16(&bytes[0..2]),
            attributes: SegmentAttributes::from_wire(bytes[2]),
            record_type: bytes[3],
        })
    }

    /// First segment of its logical record.
    pub fn is_first(&self) -> bool {
        !self.attributes.has_predecessor()
    }

    /// Last segment of its logical record.
    pub fn is_last(&self) -> bool {
        !self.attributes.has_successor()
    }

    /// Bytes of checksum and trailing length at the end of the segment.
    pub fn trailer_len(&self) -> usize {
        let mut len = 0;
        if self.attributes.has_trailing_length() {
            len += 2;
        }
        if self.attributes.has_checksum() {
            len += 2;
        }
        len
    }

    pub fn record_type_name(&self) -> &'static str {
        if self.attributes.explicitly_formatted() {
            eflr_type_name(self.record_type)
        } else {
            iflr_type_name(self.record_type)
        }
    }
}

pub const FHLR: u8 = 0;
pub const OLR: u8 = 1;
pub const AXIS: u8 = 2;
pub const CHANNL: u8 = 3;
pub const FRAME: u8 = 4;
pub const STATIC: u8 = 5;
pub const SCRIPT: u8 = 6;
pub const UPDATE: u8 = 7;
pub const UDI: u8 = 8;
pub const LNAME: u8 = 9;
pub const SPEC: u8 = 10;
pub const DICT: u8 = 11;

pub const FDATA: u8 = 0;
pub const NOFORM: u8 = 1;
pub const EOD: u8 = 127;

pub fn eflr_type_name(record_type: u8) -> &'static str {
    match record_type {
        FHLR => "FHLR",
        OLR => "OLR",
        AXIS => "AXIS",
        CHANNL => "CHANNL",
        FRAME => "FRAME",
        STATIC => "STATIC",
        SCRIPT => "SCRIPT",
        UPDATE => "UPDATE",
        UDI => "UDI",
        LNAME => "LNAME",
        SPEC => "SPEC",
        DICT => "DICT",
        _ => "private EFLR",
    }
}

pub fn iflr_type_name(record_type: u8) -> &'static str {
    match record_type {
        FDATA => "FDATA",
        NOFORM => "NOFORM",
        EOD => "EOD",
        _ => "private IFLR",
    }
}
