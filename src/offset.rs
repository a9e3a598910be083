use std::fs::Metadata;

/// Size and identity of the watched file at the moment of a read.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub len: u64,
    /// Inode on unix, `None` where the platform gives no stable identity.
    pub inode: Option<u64>,
}

impl FileStat {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            len: metadata.len(),
            inode: crate::path_utils::inode_of(metadata),
        }
    }
}

/// Outcome of checking the tracked offset against the current file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadStart {
    /// Offset is still valid, keep reading from it.
    Continue,
    /// File became shorter than the offset.
    Truncated,
    /// A different file now lives at the watched path.
    Rotated,
}

impl ReadStart {
    /// Whether accumulated history must be dropped before reading.
    pub fn is_reset(self) -> bool {
        !matches!(self, ReadStart::Continue)
    }
}

/// Byte position of the first unconsumed byte in the watched file.
///
/// The tracker remembers which file (by inode) the offset belongs to, so that both truncation in place and
/// replacement by rename restart reading from the beginning.
///
/// ```rust
/// # use sampletail::{FileStat, OffsetTracker, ReadStart};
/// let mut tracker = OffsetTracker::default();
/// assert_eq!(tracker.before_read(FileStat { len: 12, inode: Some(7) }), ReadStart::Continue);
/// tracker.after_read(12);
/// assert_eq!(tracker.before_read(FileStat { len: 4, inode: Some(7) }), ReadStart::Truncated);
/// assert_eq!(tracker.offset(), 0);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OffsetTracker {
    offset: u64,
    inode: Option<u64>,
}

impl OffsetTracker {
    /// Tracker positioned at `offset` inside the file identified by `inode`.
    pub fn at(offset: u64, inode: Option<u64>) -> Self {
        Self { offset, inode }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn inode(&self) -> Option<u64> {
        self.inode
    }

    /// Validate the offset against the file about to be read.
    ///
    /// On truncation or rotation the offset is reset to zero and the caller must clear its history. After this
    /// call `offset() <= stat.len` holds.
    pub fn before_read(&mut self, stat: FileStat) -> ReadStart {
        let start = self.check(stat);
        self.inode = stat.inode;
        if start.is_reset() {
            self.offset = 0;
        }
        start
    }

    /// Same decision as `before_read` without touching the tracker.
    pub fn check(&self, stat: FileStat) -> ReadStart {
        let rotated = matches!(
            (self.inode, stat.inode),
            (Some(known), Some(current)) if known != current
        );
        if rotated {
            ReadStart::Rotated
        } else if stat.len < self.offset {
            ReadStart::Truncated
        } else {
            ReadStart::Continue
        }
    }

    /// Position the next read starts from, given the decision returned by `check`.
    pub fn start_position(&self, start: ReadStart) -> u64 {
        if start.is_reset() {
            0
        } else {
            self.offset
        }
    }

    /// Record that everything before `position` has been consumed.
    pub fn after_read(&mut self, position: u64) {
        self.offset = position;
    }
}
