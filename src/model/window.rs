//! Fetch requests and the sequence window they map to.

/// How many of the newest messages a caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub limit: u32,
}

impl FetchRequest {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }
}

/// A contiguous, 1-based range of mailbox sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceWindow {
    pub start: u32,
    pub end: u32,
}

impl SequenceWindow {
    /// Window over the `limit` newest messages of a mailbox holding `total`.
    ///
    /// `start = max(1, total - limit + 1)`, `end = total`. Returns `None`
    /// when `start > end`, in which case nothing should be fetched.
    pub fn latest(total: u32, limit: u32) -> Option<Self> {
        let start = (u64::from(total) + 1)
            .saturating_sub(u64::from(limit))
            .max(1);
        let end = u64::from(total);
        if start > end {
            return None;
        }
        // start <= end <= u32::MAX
        Some(Self {
            start: start as u32,
            end: total,
        })
    }

    /// Number of messages covered; at least 1.
    pub fn count(&self) -> u32 {
        self.end - self.start + 1
    }

    /// IMAP sequence set, e.g. `"3:5"`.
    pub fn to_sequence_set(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }
}

impl std::fmt::Display for SequenceWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
