use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::path::Path;

use tracing::debug;

use crate::error::{CountError, Result};

const SCAN_BLOCK: usize = 64 * 1024; // bytes read per boundary probe

/// A half-open byte range `[start, end)` of the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileChunk {
    pub start: u64,
    pub end: u64,
}

impl FileChunk {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for FileChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// The line-aligned partition of one file.
///
/// `chunks` is ordered by `start`, covers `[0, file_size)` without gaps or
/// overlaps, and every chunk begins on the first byte of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Degree of parallelism the plan was cut for.
    pub parallelism: NonZeroUsize,
    pub file_size: u64,
    pub chunks: Vec<FileChunk>,
}

impl ChunkPlan {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Cap a requested degree of parallelism at what the machine can run.
pub fn effective_parallelism(requested: NonZeroUsize) -> NonZeroUsize {
    let available = std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
    requested.min(available)
}

/// Plan chunks for `path`, capping `requested` at the available parallelism.
pub fn plan_chunks(path: &Path, requested: NonZeroUsize) -> Result<ChunkPlan> {
    plan_exact(path, effective_parallelism(requested))
}

/// Plan chunks for exactly `parallelism` workers, regardless of hardware.
pub fn plan_exact(path: &Path, parallelism: NonZeroUsize) -> Result<ChunkPlan> {
    let planning = |source| CountError::Planning {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(planning)?;
    let file_size = file.metadata().map_err(planning)?.len();
    let chunks = split_lines(&mut file, file_size, parallelism).map_err(planning)?;

    for chunk in &chunks {
        debug!(%chunk, bytes = chunk.len(), "planned chunk");
    }

    Ok(ChunkPlan {
        parallelism,
        file_size,
        chunks,
    })
}

/// Cut `[0, size)` into line-aligned ranges of roughly `size / parallelism` bytes.
///
/// A line longer than the target becomes one oversized chunk of its own,
/// so the result may hold fewer chunks than `parallelism`, never more
/// lines split across two chunks.
pub(crate) fn split_lines<R: Read + Seek>(
    reader: &mut R,
    size: u64,
    parallelism: NonZeroUsize,
) -> io::Result<Vec<FileChunk>> {
    let target = size / parallelism.get() as u64;
    let mut scanner = LineScanner::new(reader, size);
    let mut chunks = Vec::with_capacity(parallelism.get());

    let mut chunk_start = 0;
    while chunk_start < size {
        let tentative = size.min(chunk_start + target);
        let mut chunk_end = scanner.line_start_at_or_before(tentative, chunk_start)?;

        // No line starts inside (chunk_start, tentative]: take the whole line.
        if chunk_end == chunk_start {
            chunk_end = scanner.next_line_start(tentative)?;
        }

        chunks.push(FileChunk::new(chunk_start, chunk_end));
        chunk_start = chunk_end;
    }

    Ok(chunks)
}

/// Finds line starts around an offset by reading small blocks.
struct LineScanner<'a, R> {
    reader: &'a mut R,
    size: u64,
    block: Vec<u8>,
}

impl<'a, R: Read + Seek> LineScanner<'a, R> {
    fn new(reader: &'a mut R, size: u64) -> Self {
        Self {
            reader,
            size,
            block: vec![0u8; SCAN_BLOCK],
        }
    }

    /// Greatest line start in `(floor, pos]`, or `floor` if there is none.
    /// End of file counts as a line start.
    fn line_start_at_or_before(&mut self, pos: u64, floor: u64) -> io::Result<u64> {
        if pos == 0 || pos >= self.size {
            return Ok(pos.min(self.size));
        }

        // A line starts at p when the byte at p - 1 is a newline, so scan
        // the bytes [floor, pos) from the back.
        let mut hi = pos;
        while hi > floor {
            let lo = hi.saturating_sub(SCAN_BLOCK as u64).max(floor);
            let block = self.read_block(lo, (hi - lo) as usize)?;
            if let Some(i) = block.iter().rposition(|&b| b == b'\n') {
                return Ok(lo + i as u64 + 1);
            }
            hi = lo;
        }

        Ok(floor)
    }

    /// Start of the line after the one containing `pos`, or end of file.
    fn next_line_start(&mut self, pos: u64) -> io::Result<u64> {
        let mut lo = pos;
        while lo < self.size {
            let len = SCAN_BLOCK.min((self.size - lo) as usize);
            let block = self.read_block(lo, len)?;
            if let Some(i) = block.iter().position(|&b| b == b'\n') {
                return Ok(lo + i as u64 + 1);
            }
            lo += len as u64;
        }

        Ok(self.size)
    }

    fn read_block(&mut self, offset: u64, len: usize) -> io::Result<&[u8]> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(&mut self.block[..len])?;
        Ok(&self.block[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::{Cursor, Write};

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn split(data: &[u8], parallelism: usize) -> Vec<FileChunk> {
        let mut cursor = Cursor::new(data);
        split_lines(&mut cursor, data.len() as u64, nz(parallelism)).unwrap()
    }

    /// Asserts the partition and line-start invariants of a plan.
    fn assert_line_partition(data: &[u8], chunks: &[FileChunk]) {
        let mut expected_start = 0;
        for chunk in chunks {
            assert_eq!(chunk.start, expected_start, "gap or overlap at {chunk}");
            assert!(chunk.end > chunk.start, "empty chunk {chunk}");
            assert!(
                chunk.start == 0 || data[chunk.start as usize - 1] == b'\n',
                "{chunk} does not start a line"
            );
            expected_start = chunk.end;
        }
        assert_eq!(expected_start, data.len() as u64);
    }

    const THREE_LINES: &[u8] = b"dog\t2000\t5\t2\ncat\t2001\t3\t1\ndog\t2002\t7\t4\n";

    #[test]
    fn empty_input_has_no_chunks() {
        assert!(split(b"", 4).is_empty());
    }

    #[test]
    fn single_worker_gets_whole_file() {
        let chunks = split(THREE_LINES, 1);
        assert_eq!(chunks, vec![FileChunk::new(0, THREE_LINES.len() as u64)]);
    }

    #[test]
    fn two_workers_cut_on_line_starts() {
        // 39 bytes, target 19: byte 19 sits inside the second line, so the
        // first cut walks back to 13 and each line ends up on its own.
        let chunks = split(THREE_LINES, 2);
        assert_eq!(chunks.len(), 3);
        assert_line_partition(THREE_LINES, &chunks);

        let data = b"aa\nbb\ncc\ndd\n";
        let chunks = split(data, 2);
        assert_eq!(chunks, vec![FileChunk::new(0, 6), FileChunk::new(6, 12)]);
    }

    #[test]
    fn missing_trailing_newline_ends_at_file_size() {
        let data = b"a\t1\t1\t1\nb\t2\t2\t2";
        let chunks = split(data, 3);
        assert_line_partition(data, &chunks);
        assert_eq!(chunks.last().unwrap().end, data.len() as u64);
    }

    #[test]
    fn long_line_becomes_one_oversized_chunk() {
        let mut data = vec![b'x'; 200];
        data.push(b'\n');
        data.extend_from_slice(b"y\n");
        let chunks = split(&data, 8);
        assert_eq!(chunks[0], FileChunk::new(0, 201));
        assert_line_partition(&data, &chunks);
    }

    #[test]
    fn more_workers_than_bytes_gives_one_chunk_per_line() {
        let data = b"a\nb\nc\n";
        let chunks = split(data, 16);
        assert_eq!(
            chunks,
            vec![
                FileChunk::new(0, 2),
                FileChunk::new(2, 4),
                FileChunk::new(4, 6)
            ]
        );
    }

    #[test]
    fn boundary_probe_spans_several_blocks() {
        let mut data = vec![b'z'; SCAN_BLOCK * 3];
        data.push(b'\n');
        data.extend(std::iter::repeat(b'q').take(SCAN_BLOCK / 2));
        data.push(b'\n');
        let chunks = split(&data, 2);
        assert_eq!(chunks[0].end, SCAN_BLOCK as u64 * 3 + 1);
        assert_line_partition(&data, &chunks);
    }

    #[test]
    fn plan_reports_parallelism_and_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(THREE_LINES).unwrap();

        let plan = plan_exact(file.path(), nz(1)).unwrap();
        assert_eq!(plan.parallelism, nz(1));
        assert_eq!(plan.file_size, THREE_LINES.len() as u64);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn missing_file_is_a_planning_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = plan_chunks(&dir.path().join("absent.tsv"), nz(4)).unwrap_err();
        assert!(matches!(err, CountError::Planning { .. }));
    }

    #[test]
    fn effective_parallelism_never_exceeds_request() {
        assert_eq!(effective_parallelism(nz(1)), nz(1));
        assert!(effective_parallelism(nz(1024)).get() <= 1024);
    }

    proptest! {
        #[test]
        fn chunks_partition_file_on_line_starts(
            lines in prop::collection::vec("[a-z]{0,40}", 0..60),
            trailing_newline in any::<bool>(),
            parallelism in 1usize..17,
        ) {
            let mut data = lines.join("\n").into_bytes();
            if trailing_newline && !data.is_empty() {
                data.push(b'\n');
            }
            let chunks = split(&data, parallelism);
            assert_line_partition(&data, &chunks);
        }
    }
}
