//! The two shared-string tables. Each SMILE stream carries one table for
//! field names and one for short string values; the writer and reader insert
//! the same strings at the same points, so an index emitted by one side names
//! the same entry on the other. Either table resets once a 1025th entry
//! arrives, again on both sides at once.

use crate::bits::string_hash;
use crate::{MAX_SHAREABLE_BYTES, MAX_SHARED_ENTRIES};

/// Whether a string may enter a shared-string table at all.
pub(crate) fn eligible(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_SHAREABLE_BYTES
}

/// Writer-side table: insertion-ordered entries plus a fixed bucket array
/// for lookup by hash, resolved with an equality check.
#[derive(Clone, Debug)]
pub(crate) struct SeenTable {
    entries: Vec<String>,
    buckets: Vec<Vec<u32>>,
}

impl SeenTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            buckets: vec![Vec::new(); MAX_SHARED_ENTRIES],
        }
    }

    /// Index of a previously recorded copy of `s`, if one may be referenced.
    pub fn find(&self, s: &str) -> Option<usize> {
        let bucket = &self.buckets[string_hash(s) as usize & (MAX_SHARED_ENTRIES - 1)];
        bucket
            .iter()
            .find(|&&ix| self.entries[ix as usize] == s)
            .map(|&ix| ix as usize)
    }

    /// Record a string that was just written out in full.
    ///
    /// Entries whose index has low byte 0xFE or 0xFF are kept in insertion
    /// order but never made findable, so the second byte of a long reference
    /// can never be 0xFE or 0xFF. The reader still stores them, keeping the
    /// index sequence identical on both sides.
    pub fn insert(&mut self, s: &str) {
        if self.entries.len() == MAX_SHARED_ENTRIES {
            self.clear();
        }
        let ix = self.entries.len();
        if (ix & 0xFF) < 0xFE {
            self.buckets[string_hash(s) as usize & (MAX_SHARED_ENTRIES - 1)].push(ix as u32);
        }
        self.entries.push(s.to_string());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }
}

/// Reader-side table: a plain index-to-string store with the same reset rule.
#[derive(Clone, Debug, Default)]
pub(crate) struct RefTable {
    entries: Vec<String>,
}

impl RefTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, s: &str) {
        if self.entries.len() == MAX_SHARED_ENTRIES {
            self.entries.clear();
        }
        self.entries.push(s.to_string());
    }

    pub fn get(&self, ix: usize) -> Option<&str> {
        self.entries.get(ix).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn find_after_insert() {
        let mut table = SeenTable::new();
        assert_eq!(table.find("alpha"), None);
        table.insert("alpha");
        table.insert("beta");
        assert_eq!(table.find("alpha"), Some(0));
        assert_eq!(table.find("beta"), Some(1));
        assert_eq!(table.find("gamma"), None);
    }

    #[test]
    fn reset_at_capacity() {
        let mut table = SeenTable::new();
        for i in 0..MAX_SHARED_ENTRIES {
            table.insert(&format!("name{:04}", i));
        }
        assert_eq!(table.find("name0000"), Some(0));
        assert_eq!(table.find("name1020"), Some(1020));

        // The next insert clears everything first.
        table.insert("overflow");
        assert_eq!(table.find("overflow"), Some(0));
        assert_eq!(table.find("name0000"), None);
    }

    #[test]
    fn indices_near_0xfe_are_unfindable() {
        let mut table = SeenTable::new();
        for i in 0..0x100 {
            table.insert(&format!("name{:04}", i));
        }
        assert_eq!(table.find(&format!("name{:04}", 0xFD)), Some(0xFD));
        assert_eq!(table.find(&format!("name{:04}", 0xFE)), None);
        assert_eq!(table.find(&format!("name{:04}", 0xFF)), None);
        // Entries after the gap keep their insertion index.
        table.insert("next");
        assert_eq!(table.find("next"), Some(0x100));
    }

    #[test]
    fn reader_reset_matches() {
        let mut table = RefTable::new();
        for i in 0..MAX_SHARED_ENTRIES {
            table.insert(&format!("name{:04}", i));
        }
        assert_eq!(table.get(0), Some("name0000"));
        table.insert("overflow");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0), Some("overflow"));
        assert_eq!(table.get(1), None);
    }
}
