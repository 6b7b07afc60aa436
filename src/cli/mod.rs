use std::path::Path;

use anyhow::{Context, Result, bail};
use codec_parser::{CodecParser, Parsed, ParserOptions};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::input::InputReader;
use command::Cli;

pub mod command;
pub mod frames;
pub mod info;

const CHUNK_SIZE: usize = 64 * 1024;

/// MIME type for a file extension.
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();

    Some(match extension.as_str() {
        "mp1" | "mp2" | "mp3" | "mpa" | "mpga" => "audio/mpeg",
        "aac" | "adts" => "audio/aac",
        "flac" => "audio/flac",
        "ogg" | "oga" | "ogx" | "opus" | "spx" => "audio/ogg",
        _ => return None,
    })
}

pub fn create_parser(input: &Path, cli: &Cli) -> Result<CodecParser> {
    let mime_type = match (&cli.mime_type, mime_type_for(input)) {
        (Some(mime_type), _) => mime_type.as_str(),
        (None, Some(mime_type)) => mime_type,
        (None, None) => bail!(
            "Unable to infer the codec of {}, pass --mime-type",
            input.display()
        ),
    };

    let options = ParserOptions {
        enable_logging: cli.loglevel.to_level_filter() >= log::LevelFilter::Warn,
        ..Default::default()
    };
    let parser = CodecParser::new(mime_type, options)
        .with_context(|| format!("Cannot parse {}", input.display()))?;
    log::debug!("Parsing {} as {}", input.display(), parser.mime_type());

    Ok(parser)
}

/// Streams `input` through `parser`, handing every item to `handle`.
///
/// `handle` returns `Ok(false)` to stop reading early. Returns the number of
/// bytes read.
pub fn drive<F>(
    input: &Path,
    parser: &mut CodecParser,
    multi: Option<&MultiProgress>,
    mut handle: F,
) -> Result<u64>
where
    F: FnMut(&CodecParser, Parsed) -> Result<bool>,
{
    let mut reader = InputReader::new(input)?;
    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, reader.size())?),
        None => None,
    };

    let mut handled = 0u64;
    let mut bytes_in = 0u64;
    let mut stopped = false;
    reader.process_chunks(CHUNK_SIZE, |chunk| {
        parser.push_bytes(chunk);

        while let Some(parsed) = parser.next() {
            handled += 1;
            if !handle(parser, parsed)? {
                stopped = true;
                return Ok(false);
            }
        }

        bytes_in = parser.total_bytes_in();
        if let Some(pb) = &pb {
            pb.set_position(bytes_in);
            pb.set_message(format!("{handled} frames"));
        }
        Ok(true)
    })?;

    if !stopped {
        for parsed in parser.flush() {
            handled += 1;
            if !handle(parser, parsed)? {
                break;
            }
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    log::debug!("Handled {handled} items from {bytes_in} bytes");
    Ok(bytes_in)
}

fn create_progress_bar(multi: &MultiProgress, length: Option<u64>) -> Result<ProgressBar> {
    let pb = if let Some(length) = length {
        let pb = multi.add(ProgressBar::new(length));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {bytes}/{total_bytes} ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
        )?);
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {bytes}\n{msg} | elapsed: {elapsed_precise}",
        )?);
        pb
    };

    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}
