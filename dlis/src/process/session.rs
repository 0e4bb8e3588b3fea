use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::log_or_err;
use crate::process::decode::FrameDecoder;
use crate::process::parse::Parser;
use crate::process::read::RecordReader;
use crate::structs::frame::{FrameLayout, FrameSink, NullSink};
use crate::structs::label::StorageUnitLabel;
use crate::structs::model::{Model, PoolHints, SetId};
use crate::structs::segment::FDATA;
use crate::structs::value::{ObjectName, ReadBytes};
use crate::utils::byte_source::{ByteSource, DEFAULT_CHUNK_SIZE};
use crate::utils::errors::SegmentError;

/// Tunables for a decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Bytes requested from the input per buffer refill.
    pub chunk_size: usize,
    pub pool_hints: PoolHints,
    /// Fail on recoverable problems instead of logging and skipping them.
    pub strict: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pool_hints: PoolHints::default(),
            strict: false,
        }
    }
}

impl ParseOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_pool_hints(mut self, pool_hints: PoolHints) -> Self {
        self.pool_hints = pool_hints;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn fail_level(&self) -> log::Level {
        if self.strict {
            log::Level::Warn
        } else {
            log::Level::Error
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub visible_records: usize,
    pub logical_records: usize,
    pub explicit_records: usize,
    pub indirect_records: usize,
    pub encrypted_records: usize,
    /// Indirect records other than frame data.
    pub skipped_records: usize,
    /// Frame data records whose frame type could not be resolved.
    pub skipped_frame_records: usize,
    pub frames: u64,
}

/// One decode session: owns the object model, the frame layout cache and
/// every pool behind them.
///
/// ```rust,no_run
/// use dlis::process::session::{ParseOptions, Session};
/// use dlis::structs::frame::FrameView;
/// use dlis::structs::value::ObjectName;
///
/// let mut session = Session::new(ParseOptions::default())?;
/// session.set_frame_sink(Box::new(|key: &ObjectName, frame: &FrameView<'_>| {
///     println!("{key} #{}: {} bytes", frame.number, frame.data.len());
/// }));
/// session.parse("well.dlis")?;
///
/// let model = session.model();
/// for set in model.top_level() {
///     println!("{}", model.set(set).set_type);
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct Session {
    options: ParseOptions,
    model: Model,
    parser: Parser,
    decoder: FrameDecoder,
    sink: Option<Box<dyn FrameSink>>,
    label: Option<StorageUnitLabel>,
    stats: SessionStats,
    pub fail_level: log::Level,
}

impl Session {
    /// Creates the session and reserves every pool.
    pub fn new(options: ParseOptions) -> Result<Self> {
        Ok(Self {
            model: Model::with_hints(&options.pool_hints)?,
            decoder: FrameDecoder::with_capacity(options.pool_hints.frame_layouts)?,
            parser: Parser::default(),
            sink: None,
            label: None,
            stats: SessionStats::default(),
            fail_level: options.fail_level(),
            options,
        })
    }

    /// Registers the sink that receives every decoded frame.
    pub fn set_frame_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.sink = Some(sink);
    }

    pub fn clear_frame_sink(&mut self) -> Option<Box<dyn FrameSink>> {
        self.sink.take()
    }

    pub fn parse<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        log::info!("Parsing DLIS file: {}", path.display());

        let mut reader = self.open(path)?;
        self.decode_registered(&mut reader)
    }

    /// Parses with a borrowed sink instead of the registered one.
    pub fn parse_with_sink<P: AsRef<Path>>(
        &mut self,
        path: P,
        sink: &mut dyn FrameSink,
    ) -> Result<()> {
        let mut reader = self.open(path)?;
        self.decode(&mut reader, sink)
    }

    /// Parses from any reader. `len` is the stream length when known.
    pub fn parse_reader<R: Read>(&mut self, reader: R, len: Option<u64>) -> Result<()> {
        let mut reader = self.open_reader(reader, len)?;
        self.decode_registered(&mut reader)
    }

    fn decode_registered<R: Read>(&mut self, reader: &mut RecordReader<R>) -> Result<()> {
        let mut sink = self.sink.take();
        let result = match sink.as_mut() {
            Some(sink) => self.decode(reader, &mut **sink),
            None => self.decode(reader, &mut NullSink),
        };
        self.sink = sink;
        result
    }

    /// Opens a file and reads its storage unit label, leaving records to
    /// [`Session::next_record`].
    pub fn open<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<RecordReader<std::io::BufReader<std::fs::File>>> {
        let path = path.as_ref();
        let source = ByteSource::open(path, self.options.chunk_size)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        self.start(RecordReader::new(source))
    }

    pub fn open_reader<R: Read>(&mut self, reader: R, len: Option<u64>) -> Result<RecordReader<R>> {
        let source = ByteSource::new(reader, len, self.options.chunk_size);
        self.start(RecordReader::new(source))
    }

    fn start<R: Read>(&mut self, mut reader: RecordReader<R>) -> Result<RecordReader<R>> {
        self.reset();
        reader.fail_level = self.fail_level;

        let label = reader
            .read_storage_unit_label()
            .context("Failed to read storage unit label")?;
        log::debug!(
            "Storage unit {} ({} {}), set {:?}",
            label.sequence_number,
            label.version,
            label.structure,
            label.storage_set_id
        );
        self.label = Some(label);

        Ok(reader)
    }

    /// Decodes logical records until the input is exhausted.
    pub fn decode<R: Read>(
        &mut self,
        reader: &mut RecordReader<R>,
        sink: &mut dyn FrameSink,
    ) -> Result<()> {
        while self.next_record(reader, sink)? {}

        log::info!(
            "Decoded {} logical records, {} frames",
            self.stats.logical_records,
            self.stats.frames
        );
        Ok(())
    }

    /// Decodes one logical record. Returns false once the input is exhausted.
    pub fn next_record<R: Read>(
        &mut self,
        reader: &mut RecordReader<R>,
        sink: &mut dyn FrameSink,
    ) -> Result<bool> {
        if reader.is_exhausted()? {
            return Ok(false);
        }

        let header = reader.next_segment()?;
        let location = reader.location();
        self.stats.logical_records += 1;
        self.stats.visible_records = location.visible_record;

        if !header.is_first() {
            return Err(anyhow!(SegmentError::UnexpectedContinuation))
                .with_context(|| format!("Logical record at {location}"));
        }

        log::trace!(
            "Logical record {} ({}) at {location}",
            self.stats.logical_records,
            header.record_type_name()
        );

        if header.attributes.encrypted() {
            log::warn!(
                "Skipping encrypted {} record at {location}",
                header.record_type_name()
            );
            self.stats.encrypted_records += 1;
            reader.skip_record()?;
            return Ok(true);
        }

        if header.attributes.explicitly_formatted() {
            self.stats.explicit_records += 1;
            self.parser
                .parse_record(reader, &mut self.model)
                .with_context(|| {
                    format!(
                        "Failed to decode {} record at {location}",
                        header.record_type_name()
                    )
                })?;
        } else {
            self.stats.indirect_records += 1;
            if header.record_type == FDATA {
                self.read_frame_data(reader, sink)
                    .with_context(|| format!("Failed to decode frame data at {location}"))?;
            } else {
                log::debug!("Skipping {} record", header.record_type_name());
                self.stats.skipped_records += 1;
                reader.skip_record()?;
            }
        }

        self.stats.visible_records = reader.location().visible_record;
        Ok(true)
    }

    fn read_frame_data<R: Read>(
        &mut self,
        reader: &mut RecordReader<R>,
        sink: &mut dyn FrameSink,
    ) -> Result<()> {
        let key = ObjectName::read(reader)?;
        let root = self.model.current_root();

        if self.decoder.is_unresolved(root, &key) {
            self.decoder.mark_unresolved(root, &key);
            self.stats.skipped_frame_records += 1;
            return reader.skip_record();
        }

        match self.decoder.resolve(&self.model, &key) {
            Ok(id) => {
                self.stats.frames += self.decoder.read_frames(reader, id, sink)?;
                Ok(())
            }
            Err(e) => {
                let e = e.context(format!("Skipping frames of {key}"));
                log_or_err!(self, log::Level::Warn, e);
                self.decoder.mark_unresolved(root, &key);
                self.stats.skipped_frame_records += 1;
                reader.skip_record()
            }
        }
    }

    fn reset(&mut self) {
        self.model.release();
        self.decoder.release();
        self.parser = Parser::default();
        self.label = None;
        self.stats = SessionStats::default();
    }

    /// Releases every pool. The session can be reused by parsing again.
    pub fn shutdown(&mut self) {
        self.reset();
        self.sink = None;
    }

    /// First top-level set.
    pub fn root(&self) -> Option<SetId> {
        self.model.root()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn storage_unit_label(&self) -> Option<&StorageUnitLabel> {
        self.label.as_ref()
    }

    /// Layout of frame `key` in the current logical file.
    pub fn frame_layout(&self, key: &ObjectName) -> Option<&FrameLayout> {
        self.decoder.layout(self.model.current_root(), key)
    }

    pub fn frame_layouts(&self) -> impl Iterator<Item = &FrameLayout> {
        self.decoder.layouts()
    }

    pub fn unresolved_frames(&self) -> impl Iterator<Item = (&ObjectName, usize)> {
        self.decoder.unresolved()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
