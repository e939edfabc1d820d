// src/bin/rmdump.rs

//! Driver program _rmdump_ drives the [_rmslib_].
//!
//! Opens one r-record channel (a binary or text file read forward or
//! backward, or a socket peer), prints every decoded record to STDOUT one
//! per line, and exits nonzero on any stream error. With `--summary`,
//! prints reader statistics to STDERR after the stream drains.
//!
//! [_rmslib_]: rmslib

use std::process::ExitCode;

use ::anyhow::{anyhow, Context, Result};
use ::clap::{Parser, ValueEnum};

use ::rmslib::common::ResultS3;
use ::rmslib::{e_err, e_wrn};
use ::rmslib::data::channel::{
    ChannelDirection,
    ChannelEncoding,
    ChannelMetadata,
    ChannelSource,
    SocketRole,
};
use ::rmslib::data::record::RMatrixRecord;
use ::rmslib::readers::recordreader::{RecordReader, SummaryRecordStream};
use ::rmslib::readers::rmatrixreader::{RMatrixReader, ResultReadRecord};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// command-line parsing

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CliEncoding {
    Binary,
    Text,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CliDirection {
    Forward,
    Backward,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CliSocketRole {
    Connect,
    Accept,
}

/// clap command-line arguments build-time definitions.
//
// Note:
// * the `about` is taken from `Cargo.toml:[package]:description`.
#[derive(Parser, Debug)]
#[clap(
    about = env!("CARGO_PKG_DESCRIPTION"),
    author = env!("CARGO_PKG_AUTHORS"),
    name = "rmdump",
    version,
    verbatim_doc_comment,
    override_usage = "\n  rmdump [OPTIONS] <SOURCE>\n\n  rmdump --socket <ROLE> <ADDRESS>",
)]
struct CliArgs {
    /// Path of an r-record file, or HOST:PORT when `--socket` is passed.
    #[clap(required = true, verbatim_doc_comment)]
    source: String,

    /// Record encoding of a file source.
    #[clap(short = 'e', long, value_enum, default_value = "binary")]
    encoding: CliEncoding,

    /// Direction a file source is read in. Backward yields records
    /// newest-first.
    #[clap(short = 'd', long, value_enum, default_value = "forward")]
    direction: CliDirection,

    /// Treat SOURCE as HOST:PORT and receive records over a socket in the
    /// given role instead of reading a file.
    #[clap(short = 's', long, value_enum, value_name = "ROLE")]
    socket: Option<CliSocketRole>,

    /// Internal buffer size in bytes.
    #[clap(short = 'b', long)]
    bufsz: Option<usize>,

    /// Print reader statistics to STDERR after the stream drains.
    #[clap(long)]
    summary: bool,
}

/// Resolve the CLI arguments to the channel metadata the facade consumes.
fn cli_to_metadata(args: &CliArgs) -> ChannelMetadata {
    let source: ChannelSource = match args.socket {
        Some(role) => ChannelSource::Socket {
            address: args.source.clone(),
            role: match role {
                CliSocketRole::Connect => SocketRole::Connect,
                CliSocketRole::Accept => SocketRole::Accept,
            },
        },
        None => ChannelSource::File(args.source.clone()),
    };
    let encoding: ChannelEncoding = match args.encoding {
        CliEncoding::Binary => ChannelEncoding::Binary,
        CliEncoding::Text => ChannelEncoding::Text,
    };
    let direction: ChannelDirection = match args.direction {
        CliDirection::Forward => ChannelDirection::Forward,
        CliDirection::Backward => ChannelDirection::Backward,
    };

    ChannelMetadata::new_ok(encoding, direction, source)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// printing

/// One record, one line: active marker, time, then the values.
fn print_record(record: &RMatrixRecord) {
    let marker: char = match record.active() {
        true => 'a',
        false => 'r',
    };
    print!("{} {:.17e}", marker, record.time());
    for value in record.values().iter() {
        print!(" {:.17e}", value);
    }
    println!();
}

fn print_summary(summary: &SummaryRecordStream) {
    eprintln!("records decoded   {}", summary.count_records);
    eprintln!("bytes loaded      {}", summary.count_bytes_loaded);
    eprintln!("chunk loads       {}", summary.count_chunk_loads);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// main

fn run(args: &CliArgs) -> Result<SummaryRecordStream> {
    let metadata: ChannelMetadata = cli_to_metadata(args);
    let mut reader: RMatrixReader = RMatrixReader::new(metadata);
    if let Some(bufsz) = args.bufsz {
        reader
            .set_bufsz(bufsz)
            .context("bad --bufsz")?;
    }
    for warning in reader.metadata_warnings().iter() {
        e_wrn!("{}", warning);
    }
    reader
        .open()
        .map_err(|err| anyhow!("cannot open {}: {}", args.source, err))?;
    loop {
        let record: RMatrixRecord = match reader.read_record() {
            ResultS3::Found(val) => val,
            ResultS3::Done => break,
            ResultS3::Err(err) => {
                let _ = reader.close();
                return Err(anyhow!("reading {}: {}", args.source, err));
            }
        };
        print_record(&record);
    }
    let summary: SummaryRecordStream = reader.summary();
    reader
        .close()
        .context("close failed")?;

    Ok(summary)
}

fn main() -> ExitCode {
    let args: CliArgs = CliArgs::parse();
    match run(&args) {
        Ok(summary) => {
            if args.summary {
                print_summary(&summary);
            }

            ExitCode::SUCCESS
        }
        Err(err) => {
            e_err!("{}", err);

            ExitCode::FAILURE
        }
    }
}
