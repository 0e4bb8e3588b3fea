use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use dlis::process::session::Session;
use dlis::structs::frame::{FrameSink, FrameView};
use dlis::structs::value::ObjectName;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::{Cli, FramesArgs};
use crate::input::InputReader;

pub fn cmd_frames(args: &FramesArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    macro_rules! pb_update {
        ($pb:expr, $method:ident($($args:expr),*)) => {
            if let Some(ref pb) = $pb {
                pb.$method($($args),*);
            }
        };
    }

    log::info!("Decoding frames from: {}", args.input.display());

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let input = InputReader::new(&args.input)?;
    let total_bytes = input.size();
    let mut session = Session::new(cli.parse_options())?;
    let mut reader = input.open(&mut session)?;

    let pb = match (multi, total_bytes) {
        (Some(multi), Some(total)) => {
            let pb = multi.add(ProgressBar::new(total));
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
                )?
                .progress_chars("#>-"),
            );
            Some(pb)
        }
        (Some(multi), None) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(pb)
        }
        _ => None,
    };

    let mut sink = CsvSink::new(out, args.frame.clone(), args.limit);
    while session.next_record(&mut reader, &mut sink)? {
        if let Some(e) = sink.error.take() {
            return Err(e).context("Failed to write CSV output");
        }
        if sink.is_full() {
            log::debug!("Frame limit reached, stopping");
            break;
        }
        pb_update!(pb, set_position(reader.position()));
        pb_update!(pb, set_message(format!("{} frames", sink.rows)));
    }

    pb_update!(pb, finish_and_clear());
    sink.out.flush().context("Failed to write CSV output")?;

    log::info!(
        "Wrote {} frames from {} logical records",
        sink.rows,
        session.stats().logical_records
    );
    Ok(())
}

/// Writes one CSV row per frame, with a header row before the first frame
/// of each frame type.
struct CsvSink<W: Write> {
    out: W,
    filter: Option<String>,
    limit: Option<u64>,
    rows: u64,
    headers: HashSet<ObjectName>,
    /// First write failure; frames after it are dropped.
    error: Option<io::Error>,
}

impl<W: Write> CsvSink<W> {
    fn new(out: W, filter: Option<String>, limit: Option<u64>) -> Self {
        Self {
            out,
            filter,
            limit,
            rows: 0,
            headers: HashSet::new(),
            error: None,
        }
    }

    fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.rows >= limit)
    }

    fn write_header(&mut self, frame: &FrameView<'_>) -> io::Result<()> {
        write!(self.out, "frame,number")?;
        for channel in &frame.layout.channels {
            if channel.dimension == 1 {
                write!(self.out, ",{}", channel.name.identifier)?;
            } else {
                for i in 0..channel.dimension {
                    write!(self.out, ",{}[{i}]", channel.name.identifier)?;
                }
            }
        }
        writeln!(self.out)
    }

    fn write_row(&mut self, key: &ObjectName, frame: &FrameView<'_>) -> io::Result<()> {
        if self.headers.insert(key.clone()) {
            self.write_header(frame)?;
        }

        write!(self.out, "{},{}", key.identifier, frame.number)?;
        for sample in frame.channels() {
            for value in sample.values().map_err(io::Error::other)? {
                write!(self.out, ",{value}")?;
            }
        }
        writeln!(self.out)?;

        self.rows += 1;
        Ok(())
    }
}

impl<W: Write> FrameSink for CsvSink<W> {
    fn on_frame(&mut self, key: &ObjectName, frame: &FrameView<'_>) {
        if self.error.is_some() || self.is_full() {
            return;
        }
        if self
            .filter
            .as_ref()
            .is_some_and(|filter| *filter != key.identifier)
        {
            return;
        }

        if let Err(e) = self.write_row(key, frame) {
            self.error = Some(e);
        }
    }
}
