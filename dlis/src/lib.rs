//! Streaming decoder for DLIS (RP66 v1) well-log files.
//!
//! ## Technical Overview
//!
//! ### File Organization
//!
//! **Physical layer**: an 80-byte storage unit label followed by visible
//! records, each a length-prefixed envelope holding logical record segments.
//! **Logical layer**: logical records reassembled from segments that may
//! span several visible records.
//!
//! ### Logical Records
//!
//! - Explicitly formatted records (EFLR) carry metadata as self-describing
//!   sets of objects and attributes
//! - Indirectly formatted records (IFLR) carry frame data laid out by the
//!   FRAME and CHANNEL sets
//!
//! ## Quick Start
//!
//! 1. Configure a session with [`process::session::ParseOptions`]
//! 2. Register a [`structs::frame::FrameSink`] for frame data
//! 3. Parse a file with [`process::session::Session::parse`] and walk the
//!    resulting [`structs::model::Model`]
//!
//! ```rust,no_run
//! use dlis::process::session::{ParseOptions, Session};
//!
//! let mut session = Session::new(ParseOptions::default())?;
//! session.parse("well.dlis")?;
//!
//! let model = session.model();
//! if let Some(root) = session.root() {
//!     for set in model.children(root) {
//!         let set = model.set(set);
//!         println!("{} ({} objects)", set.set_type, set.objects.len());
//!     }
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Record decoding pipeline.
///
/// 1. **Framing** ([`process::read`]): Visible records and segment
///    reassembly over a chunked byte source.
///
/// 2. **Parsing** ([`process::parse`]): Component state machine building
///    the object model from EFLRs.
///
/// 3. **Frame decoding** ([`process::decode`]): Layout resolution and frame
///    demultiplexing of FDATA records.
///
/// 4. **Sessions** ([`process::session`]): Owns the pools and drives the
///    other stages over a whole file.
pub mod process;

/// Data structures representing DLIS format components.
///
/// - **Labels** ([`structs::label`]): Storage unit label and visible record headers
/// - **Segments** ([`structs::segment`]): Segment headers and record types
/// - **Components** ([`structs::component`]): Component descriptors
/// - **Representation Codes** ([`structs::rep_code`]): The 27 RP66 value encodings
/// - **Values** ([`structs::value`]): Decoded values and primitive readers
/// - **Object Model** ([`structs::model`]): Sets, objects and attributes
/// - **Frames** ([`structs::frame`]): Frame layouts and sinks
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Arenas** ([`utils::arena`]): Chunked typed pools
/// - **Byte Source** ([`utils::byte_source`]): Chunked input buffering
/// - **Error Handling** ([`utils::errors`]): Error types and classification
pub mod utils;
