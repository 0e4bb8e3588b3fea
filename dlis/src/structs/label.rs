//! Physical framing: the storage unit label and visible record headers.

use anyhow::{Result, bail};
use byteorder::{BigEndian, ByteOrder};

use crate::utils::errors::LabelError;

pub const STORAGE_UNIT_LABEL_LEN: usize = 80;
pub const VISIBLE_RECORD_HEADER_LEN: usize = 4;
pub const VISIBLE_RECORD_FORMAT: u8 = 0xFF;

/// Fixed 80-byte label at the start of every storage unit.
///
/// All fields are character data and are kept as trimmed strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageUnitLabel {
    pub sequence_number: String,
    pub version: String,
    pub structure: String,
    pub max_record_length: String,
    pub storage_set_id: String,
}

impl StorageUnitLabel {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < STORAGE_UNIT_LABEL_LEN {
            bail!(
                "Storage unit label needs {STORAGE_UNIT_LABEL_LEN} bytes, got {}",
                bytes.len()
            );
        }

        let field = |range: std::ops::Range<usize>| {
            String::from_utf8_lossy(&bytes[range])
                .trim_matches(|c: char| c <= ' ')
                .to_string()
        };

        Ok(Self {
            sequence_number: field(0..4),
            version: field(4..9),
            structure: field(9..15),
            max_record_length: field(15..20),
            storage_set_id: field(20..80),
        })
    }

    /// Reports a label that does not describe an RP66 v1 record storage unit.
    pub fn check(&self) -> Result<(), LabelError> {
        if !self.version.starts_with("V1.") {
            return Err(LabelError::UnsupportedVersion(self.version.clone()));
        }
        if self.structure != "RECORD" {
            return Err(LabelError::UnsupportedStructure(self.structure.clone()));
        }
        Ok(())
    }

    pub fn sequence(&self) -> Option<u32> {
        self.sequence_number.parse().ok()
    }

    /// Maximum visible record length; 0 means undeclared.
    pub fn max_record_len(&self) -> Option<u32> {
        self.max_record_length.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRecordHeader {
    pub length: u16,
    pub format: u8,
    pub major_version: u8,
}

impl VisibleRecordHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < VISIBLE_RECORD_HEADER_LEN {
            bail!("Visible record header needs {VISIBLE_RECORD_HEADER_LEN} bytes");
        }

        let header = Self {
            length: BigEndian::read_u16(&bytes[0..2]),
            format: bytes[2],
            major_version: bytes[3],
        };

        if (header.length as usize) < VISIBLE_RECORD_HEADER_LEN {
            bail!(LabelError::VisibleRecordTooShort(header.length));
        }

        Ok(header)
    }

    /// Bytes following the header.
    pub fn body_len(&self) -> usize {
        self.length as usize - VISIBLE_RECORD_HEADER_LEN
    }
}
