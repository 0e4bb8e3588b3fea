use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use dlis::process::read::RecordReader;
use dlis::process::session::Session;

/// File or stdin input for a decode session.
pub struct InputReader {
    reader: Box<dyn Read>,
    len: Option<u64>,
    is_pipe: bool,
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let input_path = input_path.as_ref();
        let is_pipe = input_path.as_os_str() == "-";

        if is_pipe {
            return Ok(Self {
                reader: Box::new(io::stdin().lock()),
                len: None,
                is_pipe,
            });
        }

        let file = File::open(input_path)
            .with_context(|| format!("Failed to open {}", input_path.display()))?;
        let len = file.metadata()?.len();

        Ok(Self {
            reader: Box::new(BufReader::new(file)),
            len: Some(len),
            is_pipe,
        })
    }

    /// Check if this is pipe input
    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    /// Input size in bytes, unknown for pipes.
    pub fn size(&self) -> Option<u64> {
        self.len
    }

    /// Hands the input to `session` and reads the storage unit label.
    pub fn open(self, session: &mut Session) -> Result<RecordReader<Box<dyn Read>>> {
        session.open_reader(self.reader, self.len)
    }
}
