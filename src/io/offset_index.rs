use indexmap::map::{IndexMap, Iter, Keys};

/**
An ordered mapping from scan number to the byte offset of the record that
starts it, in the order the records occur in the file.

A wrapper around [`indexmap::IndexMap`].
*/
#[derive(Default, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OffsetIndex {
    /// The mapping from scan number to byte offset, ordered by occurrence
    #[cfg_attr(feature = "serde", serde(with = "indexmap::map::serde_seq"))]
    pub offsets: IndexMap<u64, u64>,

    /// Whether the index has been built, as a built index may still be empty
    pub init: bool,
}

impl OffsetIndex {
    pub fn new() -> OffsetIndex {
        OffsetIndex::default()
    }

    /// Get the offset of the record for `scan`
    #[inline]
    pub fn get(&self, scan: u64) -> Option<u64> {
        self.offsets.get(&scan).copied()
    }

    /// Get the scan number and offset at the specified position
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<(u64, u64)> {
        self.offsets.get_index(index).map(|(k, v)| (*k, *v))
    }

    /// Get the position of `scan` in the index
    #[inline]
    pub fn index_of(&self, scan: u64) -> Option<usize> {
        self.offsets.get_index_of(&scan)
    }

    /// Record `offset` for `scan`. A repeated scan number keeps its first position
    /// and returns the offset it replaced.
    #[inline]
    pub fn insert(&mut self, scan: u64, offset: u64) -> Option<u64> {
        self.offsets.insert(scan, offset)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn keys(&self) -> Keys<'_, u64, u64> {
        self.offsets.keys()
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
        self.init = false;
    }

    pub fn iter(&self) -> Iter<'_, u64, u64> {
        self.offsets.iter()
    }

    #[inline]
    pub fn contains_key(&self, scan: u64) -> bool {
        self.offsets.contains_key(&scan)
    }
}
