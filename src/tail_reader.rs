use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    line_parser::{parse_line, split_lines, LineRejection},
    FileStat, HistoryStore, OffsetTracker, ReadStart, Sample,
};

/// What to do with a read range that does not end in a line break.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PartialLines {
    /// Parse the fragment as a line and move past it. A line caught mid-write is lost or misread.
    #[default]
    Consume,
    /// Stop at the last line break and pick the fragment up once it is complete.
    Defer,
}

/// Knobs for `TailReader`.
#[derive(Copy, Clone, Debug, Default)]
pub struct TailOptions {
    pub partial_lines: PartialLines,
}

/// Samples produced by one read of the data file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReadBatch {
    /// The file was truncated or replaced: history collected so far no longer matches it.
    pub reset: bool,
    pub samples: Vec<Sample>,
}

impl ReadBatch {
    /// Bring `history` in line with this read.
    pub fn apply_to(&self, history: &mut HistoryStore) {
        if self.reset {
            history.clear();
        }
        history.extend(self.samples.iter().copied());
    }
}

/// Possible errors that could happen while tailing the data file
#[derive(Error, Debug)]
pub enum TailError {
    #[error("while creating data file `{path}`")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("while reading data file `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Incremental reader of the samples appended to a single file.
///
/// ## Usage
///
/// Create a reader with `TailReader::initialize`, which loads everything already in the file into the provided
/// history. Every following call to `read_new` returns only the samples appended since the previous call and
/// appends them to the same history.
///
/// ```rust no_run
/// # use sampletail::{HistoryStore, TailOptions, TailReader, TailError};
/// let mut history = HistoryStore::new();
/// let mut reader = TailReader::initialize("classic-td.log", TailOptions::default(), &mut history)?;
/// println!("loaded {} samples", history.len());
/// let fresh = reader.read_new(&mut history)?;
/// println!("got {} new samples", fresh.len());
/// # Ok::<(), TailError>(())
/// ```
///
/// ## Working principles
///
/// The reader keeps a byte offset into the file. On each read the file size and identity are compared with the
/// offset: if the file shrank or was replaced, history is cleared and the file is read again from the start.
/// Otherwise only `[offset, EOF)` is read. Offset and history are only committed once the bytes were read
/// successfully, so a failed read is retried from the same position next time.
pub struct TailReader {
    path: PathBuf,
    tracker: OffsetTracker,
    options: TailOptions,
}

impl TailReader {
    /// Open the data file, creating it when absent, and load all of its samples into `history`.
    ///
    /// Failure to create the file is fatal for the caller.
    pub fn initialize(
        path: impl AsRef<Path>,
        options: TailOptions,
        history: &mut HistoryStore,
    ) -> Result<Self, TailError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            warn!(path = %path.display(), "data file not found, creating it");
        }
        create_if_missing(&path).map_err(|source| TailError::Create {
            path: path.clone(),
            source,
        })?;

        let mut reader = Self {
            path,
            tracker: OffsetTracker::default(),
            options,
        };
        history.clear();
        let loaded = reader.read_new(history)?;
        info!(
            path = %reader.path.display(),
            samples = loaded.len(),
            offset = reader.offset(),
            "loaded initial samples"
        );
        Ok(reader)
    }

    /// Read samples appended since the last call, append them to `history` and return them.
    ///
    /// A missing file yields no samples and leaves state untouched. An empty result is a normal outcome.
    pub fn read_new(&mut self, history: &mut HistoryStore) -> Result<Vec<Sample>, TailError> {
        let batch = self.read_batch()?;
        batch.apply_to(history);
        Ok(batch.samples)
    }

    /// Read samples appended since the last call without touching any history.
    ///
    /// The offset is committed before returning, so the caller must apply the batch (see `ReadBatch::apply_to`)
    /// to keep its history in step with the file.
    pub fn read_batch(&mut self) -> Result<ReadBatch, TailError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "data file is gone, nothing to read");
                return Ok(ReadBatch::default());
            }
            Err(e) => return Err(self.read_error(e)),
        };

        let stat = file
            .metadata()
            .map(|metadata| FileStat::from_metadata(&metadata))
            .map_err(|e| self.read_error(e))?;
        let start = self.tracker.check(stat);
        let from = self.tracker.start_position(start);

        let mut chunk = Vec::new();
        read_from(&mut file, from, &mut chunk).map_err(|e| self.read_error(e))?;

        // nothing below can fail, commit the new state
        self.tracker.before_read(stat);
        match start {
            ReadStart::Continue => {}
            ReadStart::Truncated => {
                info!(path = %self.path.display(), "data file truncated, resetting history")
            }
            ReadStart::Rotated => {
                info!(path = %self.path.display(), "data file replaced, resetting history")
            }
        }

        let consumed = self.consumable_len(&chunk);
        let samples = parse_chunk(&chunk[..consumed]);
        self.tracker.after_read(from + consumed as u64);

        debug!(
            bytes = consumed,
            samples = samples.len(),
            offset = self.tracker.offset(),
            "read new data"
        );
        Ok(ReadBatch {
            reset: start.is_reset(),
            samples,
        })
    }

    /// Current byte offset into the data file.
    pub fn offset(&self) -> u64 {
        self.tracker.offset()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn consumable_len(&self, chunk: &[u8]) -> usize {
        match self.options.partial_lines {
            PartialLines::Consume => chunk.len(),
            PartialLines::Defer => line_complete_len(chunk),
        }
    }

    fn read_error(&self, source: io::Error) -> TailError {
        TailError::Read {
            path: self.path.clone(),
            source,
        }
    }
}

fn create_if_missing(path: &Path) -> io::Result<()> {
    OpenOptions::new().append(true).create(true).open(path)?;
    Ok(())
}

fn read_from(file: &mut File, from: u64, buf: &mut Vec<u8>) -> io::Result<()> {
    file.seek(SeekFrom::Start(from))?;
    file.read_to_end(buf)?;
    Ok(())
}

/// Length of the prefix of `chunk` that ends with a line break, 0 when there is none.
///
/// Works on raw bytes so the result is a valid file offset even when the chunk is not valid UTF-8. The multi-byte
/// breaks are matched on their complete UTF-8 encoding.
fn line_complete_len(chunk: &[u8]) -> usize {
    (0..chunk.len())
        .rev()
        .find_map(|i| {
            let ends_break = match chunk[i] {
                b'\n' | b'\r' | 0x0b | 0x0c | 0x1c..=0x1e => true,
                // NEL
                0x85 => i >= 1 && chunk[i - 1] == 0xc2,
                // LINE / PARAGRAPH SEPARATOR
                0xa8 | 0xa9 => i >= 2 && chunk[i - 2..i] == [0xe2, 0x80],
                _ => false,
            };
            ends_break.then_some(i + 1)
        })
        .unwrap_or(0)
}

fn parse_chunk(bytes: &[u8]) -> Vec<Sample> {
    let text = String::from_utf8_lossy(bytes);
    split_lines(&text)
        .filter_map(|line| match parse_line(line) {
            Ok(sample) => Some(sample),
            Err(LineRejection::Blank) => None,
            Err(reason) => {
                debug!(%reason, line = line.trim(), "skipping malformed line");
                None
            }
        })
        .collect()
}
