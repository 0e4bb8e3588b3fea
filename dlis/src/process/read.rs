use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Result, anyhow, bail};

use crate::log_or_err;
use crate::structs::label::{
    STORAGE_UNIT_LABEL_LEN, StorageUnitLabel, VISIBLE_RECORD_FORMAT, VISIBLE_RECORD_HEADER_LEN,
    VisibleRecordHeader,
};
use crate::structs::segment::{SEGMENT_HEADER_LEN, SegmentHeader};
use crate::structs::value::ReadBytes;
use crate::utils::byte_source::ByteSource;
use crate::utils::errors::{LabelError, SegmentError};

#[derive(Debug, Clone, Copy, Default)]
struct Window {
    pos: usize,
    end: usize,
}

impl Window {
    fn remaining(&self) -> usize {
        self.end - self.pos
    }
}

/// Where the reader currently is, for error reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordLocation {
    pub visible_record: usize,
    pub segment: usize,
    /// Stream offset of the current segment header.
    pub offset: u64,
}

impl Display for RecordLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "visible record {}, segment {}, offset {:#x}",
            self.visible_record, self.segment, self.offset
        )
    }
}

/// Reads visible records and logical record segments from a byte source.
///
/// Segment payloads are exposed through [`ReadBytes`]: a read that runs
/// past the end of a segment continues in the next segment of the same
/// logical record, fetching new visible records as needed.
pub struct RecordReader<R: Read> {
    source: ByteSource<R>,
    visible: Window,
    segment: Window,
    header: SegmentHeader,
    location: RecordLocation,
    pub fail_level: log::Level,
}

impl RecordReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> Result<Self> {
        Ok(Self::new(ByteSource::open(path, chunk_size)?))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn new(source: ByteSource<R>) -> Self {
        Self {
            source,
            visible: Window::default(),
            segment: Window::default(),
            header: SegmentHeader::default(),
            location: RecordLocation::default(),
            fail_level: log::Level::Error,
        }
    }

    pub fn read_storage_unit_label(&mut self) -> Result<StorageUnitLabel> {
        let label = StorageUnitLabel::from_bytes(self.source.next(STORAGE_UNIT_LABEL_LEN)?)?;
        if let Err(e) = label.check() {
            log_or_err!(self, log::Level::Warn, anyhow!(e));
        }
        Ok(label)
    }

    /// Opens the next visible record. The previous one must be consumed.
    pub fn next_visible_record(&mut self) -> Result<VisibleRecordHeader> {
        let header = VisibleRecordHeader::from_bytes(self.source.next(VISIBLE_RECORD_HEADER_LEN)?)?;
        if header.format != VISIBLE_RECORD_FORMAT {
            log_or_err!(
                self,
                log::Level::Warn,
                anyhow!(LabelError::VisibleRecordFormat(header.format))
            );
        }

        let body = self.source.next_range(header.body_len())?;
        self.visible = Window {
            pos: body.start,
            end: body.end,
        };
        self.location.visible_record += 1;
        log::trace!(
            "Visible record {}: {} bytes",
            self.location.visible_record,
            header.length
        );

        Ok(header)
    }

    /// Reads the next segment header and trims padding, checksum and
    /// trailing length from its payload window.
    pub fn next_segment(&mut self) -> Result<SegmentHeader> {
        if self.visible.remaining() == 0 {
            self.next_visible_record()?;
        }

        let available = self.visible.remaining();
        if available < SEGMENT_HEADER_LEN {
            bail!(SegmentError::HeaderOverrun(available));
        }

        let start = self.visible.pos;
        let header = SegmentHeader::from_bytes(self.source.bytes(start..start + SEGMENT_HEADER_LEN))?;
        let length = header.length as usize;
        if length > available {
            bail!(SegmentError::LengthOverrun {
                length: header.length,
                available,
            });
        }

        let mut data_len = length
            .checked_sub(SEGMENT_HEADER_LEN + header.trailer_len())
            .ok_or(SegmentError::TrailerOverrun {
                length: header.length,
            })?;

        if header.attributes.has_padding() {
            if data_len == 0 {
                bail!(SegmentError::PaddingOverrun {
                    pad: 0,
                    available: 0
                });
            }
            let pad_at = start + SEGMENT_HEADER_LEN + data_len - 1;
            let pad = self.source.bytes(pad_at..pad_at + 1)[0];
            if pad as usize > data_len {
                bail!(SegmentError::PaddingOverrun {
                    pad,
                    available: data_len,
                });
            }
            data_len -= pad as usize;
        }

        self.segment = Window {
            pos: start + SEGMENT_HEADER_LEN,
            end: start + SEGMENT_HEADER_LEN + data_len,
        };
        self.visible.pos += length;
        self.header = header;
        self.location.segment += 1;
        self.location.offset = self.source.offset_of(start);

        Ok(header)
    }

    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    pub fn location(&self) -> RecordLocation {
        self.location
    }

    /// Stream offset of the byte source cursor.
    pub fn position(&self) -> u64 {
        self.source.position()
    }

    /// Payload bytes left in the current segment.
    pub fn segment_remaining(&self) -> usize {
        self.segment.remaining()
    }

    /// True once the current logical record has no bytes left.
    pub fn at_record_end(&self) -> bool {
        self.segment.remaining() == 0 && self.header.is_last()
    }

    /// Discards the rest of the current logical record.
    pub fn skip_record(&mut self) -> Result<()> {
        loop {
            self.segment.pos = self.segment.end;
            if self.header.is_last() {
                return Ok(());
            }
            self.next_continuation()?;
        }
    }

    fn next_continuation(&mut self) -> Result<()> {
        let header = self.next_segment()?;
        if header.is_first() {
            bail!(SegmentError::BrokenRecord);
        }
        Ok(())
    }

    /// True when the last visible record is consumed and the stream holds
    /// no more bytes.
    pub fn is_exhausted(&mut self) -> Result<bool> {
        Ok(self.visible.remaining() == 0 && self.source.is_drained()?)
    }
}

impl<R: Read> ReadBytes for RecordReader<R> {
    fn read_into(&mut self, dst: &mut [u8]) -> Result<()> {
        let mut filled = 0;

        while filled < dst.len() {
            let available = self.segment.remaining();
            if available == 0 {
                if self.header.is_last() {
                    bail!(SegmentError::RecordOverrun {
                        needed: dst.len() - filled,
                    });
                }
                self.next_continuation()?;
                continue;
            }

            let n = available.min(dst.len() - filled);
            let pos = self.segment.pos;
            dst[filled..filled + n].copy_from_slice(self.source.bytes(pos..pos + n));
            self.segment.pos += n;
            filled += n;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::{DlisWriter, WIRE_EXPLICIT, segment_bytes};
    use std::io::Cursor;

    fn reader(bytes: Vec<u8>, chunk: usize) -> RecordReader<Cursor<Vec<u8>>> {
        let len = bytes.len() as u64;
        RecordReader::new(ByteSource::new(Cursor::new(bytes), Some(len), chunk))
    }

    fn trimmed_len(attributes: u8, body: &[u8], trailer: &[u8]) -> usize {
        let mut bytes = Vec::new();
        let segment = segment_bytes(attributes, 0, body, trailer);
        bytes.extend_from_slice(&((segment.len() + 4) as u16).to_be_bytes());
        bytes.extend_from_slice(&[0xFF, 0x01]);
        bytes.extend_from_slice(&segment);

        let mut reader = reader(bytes, 64);
        reader.next_segment().unwrap();
        reader.segment_remaining()
    }

    #[test]
    fn trims_trailers() {
        let body = [1u8, 2, 3, 4, 5, 6, 7, 8];
        // Wire bits: checksum 0x04, trailing length 0x02, padding 0x01.
        assert_eq!(trimmed_len(0x00, &body, &[]), 8);
        assert_eq!(trimmed_len(0x04, &body, &[0xAA, 0xBB]), 8);
        assert_eq!(trimmed_len(0x02, &body, &[0x00, 0x0E]), 8);
        assert_eq!(trimmed_len(0x06, &body, &[0xAA, 0xBB, 0x00, 0x10]), 8);

        // Three pad bytes, the last holding the count.
        let padded = [1u8, 2, 3, 4, 5, 0, 0, 3];
        assert_eq!(trimmed_len(0x01, &padded, &[]), 5);
        assert_eq!(trimmed_len(0x05, &padded, &[0xAA, 0xBB]), 5);
        assert_eq!(trimmed_len(0x03, &padded, &[0x00, 0x10]), 5);
        assert_eq!(trimmed_len(0x07, &padded, &[0xAA, 0xBB, 0x00, 0x12]), 5);
    }

    #[test]
    fn padding_overrun_is_reported() {
        let mut bytes = Vec::new();
        let segment = segment_bytes(0x01, 0, &[1, 2, 9], &[]);
        bytes.extend_from_slice(&((segment.len() + 4) as u16).to_be_bytes());
        bytes.extend_from_slice(&[0xFF, 0x01]);
        bytes.extend_from_slice(&segment);

        let err = reader(bytes, 64).next_segment().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SegmentError>(),
            Some(SegmentError::PaddingOverrun { pad: 9, .. })
        ));
    }

    #[test]
    fn reads_across_segments_and_visible_records() {
        let payload: Vec<u8> = (0..40).collect();
        let mut writer = DlisWriter::new();
        writer.split_record(WIRE_EXPLICIT, 3, &payload, &[12, 12, 16]);
        let bytes = writer.finish();

        let mut reader = reader(bytes, 16);
        let header = reader.next_segment().unwrap();
        assert!(header.is_first());
        assert!(!header.is_last());

        let mut out = vec![0u8; 40];
        reader.read_into(&mut out).unwrap();
        assert_eq!(out, payload);
        assert!(reader.at_record_end());
        assert_eq!(reader.location().visible_record, 3);
        assert!(reader.is_exhausted().unwrap());
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn reads_segments_sharing_a_visible_record() {
        let payload: Vec<u8> = (0..30).collect();
        let mut writer = DlisWriter::new();
        writer.packed_record(0, 0, &payload, &[7, 13, 10]);
        writer.record(0, 127, &[]);
        let bytes = writer.finish();

        let mut reader = reader(bytes, 8);
        reader.next_segment().unwrap();
        let mut out = vec![0u8; 30];
        reader.read_into(&mut out).unwrap();
        assert_eq!(out, payload);
        assert!(reader.at_record_end());
        assert_eq!(reader.location().visible_record, 1);
        assert_eq!(reader.location().segment, 3);

        let eod = reader.next_segment().unwrap();
        assert_eq!(eod.record_type, 127);
        assert_eq!(reader.location().visible_record, 2);
    }

    #[test]
    fn skip_record_consumes_continuations() {
        let mut writer = DlisWriter::new();
        writer.split_record(0, 0, &[0u8; 30], &[10, 10, 10]);
        writer.record(0, 127, &[]);
        let bytes = writer.finish();

        let mut reader = reader(bytes, 32);
        reader.next_segment().unwrap();
        reader.skip_record().unwrap();
        assert!(reader.at_record_end());

        let eod = reader.next_segment().unwrap();
        assert_eq!(eod.record_type, 127);
        assert!(reader.is_exhausted().unwrap());
    }

    #[test]
    fn truncated_segment_header_is_io_error() {
        // Visible record claims 20 bytes, file stops after 6.
        let bytes = vec![0x00, 0x14, 0xFF, 0x01, 0x00, 0x10];
        let err = reader(bytes, 64).next_segment().unwrap_err();
        assert_eq!(
            crate::utils::errors::error_class(&err),
            crate::utils::errors::ErrorClass::Io
        );
    }
}
