/// Visible record and segment framing.
///
/// Provides the [`RecordReader`](read::RecordReader), which trims segment
/// trailers and reads across segment boundaries of one logical record.
pub mod read;

/// Explicitly formatted record parsing.
///
/// Provides the [`Parser`](parse::Parser) for decoding set, object and
/// attribute components into the [`Model`](crate::structs::model::Model).
pub mod parse;

/// Frame data decoding.
///
/// Provides the [`FrameDecoder`](decode::FrameDecoder) for resolving frame
/// layouts and demultiplexing FDATA records.
pub mod decode;

/// Whole-file decode sessions.
pub mod session;
