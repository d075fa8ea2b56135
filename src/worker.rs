use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

use crate::chunk::FileChunk;
use crate::error::{CountError, ParseFailure, Result};
use crate::progress::CompletionCounter;
use crate::tally::Tally;

const READ_BUFFER: usize = 1024 * 1024; // 1MB per worker
const FIELD_SEPARATOR: u8 = b'\t';
const FIELDS: usize = 4; // key, secondary, count, tertiary

/// Count every line of `chunk`, then mark the chunk complete.
///
/// The counter is only bumped when the whole chunk was counted; a failed
/// chunk leaves it untouched and returns no tally.
pub fn count_chunk(path: &Path, chunk: FileChunk, counter: &CompletionCounter) -> Result<Tally> {
    let tally = count_range(path, chunk)?;
    counter.complete_one();
    Ok(tally)
}

/// Count the lines of one chunk with a private file handle.
pub fn count_range(path: &Path, chunk: FileChunk) -> Result<Tally> {
    let read_error = |source| CountError::Read {
        path: path.to_path_buf(),
        chunk,
        source,
    };

    // Each worker opens its own handle
    let mut file = File::open(path).map_err(read_error)?;

    // A chunk must begin right after a newline (or at 0); check the byte
    // before it, which also leaves the cursor at chunk.start.
    if chunk.start > 0 {
        let mut before = [0u8; 1];
        file.seek(SeekFrom::Start(chunk.start - 1)).map_err(read_error)?;
        file.read_exact(&mut before).map_err(read_error)?;
        if before[0] != b'\n' {
            return Err(CountError::Misaligned {
                chunk,
                offset: chunk.start,
            });
        }
    }

    let reader = BufReader::with_capacity(READ_BUFFER, file);
    let tally = tally_lines(reader, path, chunk)?;

    debug!(%chunk, keys = tally.len(), "chunk counted");
    Ok(tally)
}

/// Sum counts per key for the lines in `reader`, which must be positioned
/// at `chunk.start`.
fn tally_lines<R: BufRead>(mut reader: R, path: &Path, chunk: FileChunk) -> Result<Tally> {
    let mut tally = Tally::new();
    let mut line = Vec::with_capacity(256);
    let mut pos = chunk.start;

    while pos < chunk.end {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|source| CountError::Read {
                path: path.to_path_buf(),
                chunk,
                source,
            })?;

        if read == 0 {
            // The file shrank after planning.
            return Err(CountError::Read {
                path: path.to_path_buf(),
                chunk,
                source: std::io::ErrorKind::UnexpectedEof.into(),
            });
        }
        if pos + read as u64 > chunk.end {
            return Err(CountError::Misaligned { chunk, offset: pos });
        }

        let (key, count) = parse_line(&line).map_err(|failure| CountError::Parse {
            path: path.to_path_buf(),
            offset: pos,
            failure,
        })?;
        tally.add(key, count)?;
        pos += read as u64;
    }

    Ok(tally)
}

/// Split one `key \t secondary \t count \t tertiary` line into its key and count.
pub fn parse_line(line: &[u8]) -> Result<(&str, u64), ParseFailure> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);

    let separators = bytecount::count(line, FIELD_SEPARATOR);
    if separators != FIELDS - 1 {
        return Err(ParseFailure::FieldCount {
            found: separators + 1,
        });
    }

    let mut fields = line.split(|&b| b == FIELD_SEPARATOR);
    let (Some(key), Some(count)) = (fields.next(), fields.nth(1)) else {
        return Err(ParseFailure::FieldCount {
            found: separators + 1,
        });
    };

    let key = std::str::from_utf8(key).map_err(ParseFailure::Key)?;
    let count = String::from_utf8_lossy(count);
    let count = count.parse::<u64>().map_err(|source| ParseFailure::Count {
        value: count.to_string(),
        source,
    })?;

    Ok((key, count))
}
