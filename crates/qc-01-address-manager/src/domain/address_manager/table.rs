//! Bucket matrix implementation.

use super::types::RecordId;

/// A fixed-size `buckets × bucket_size` matrix of record ids (either New or Tried).
///
/// Empty slots are `None`; `Option<RecordId>` has the same size as the id
/// because ids are non-zero.
#[derive(Debug, Clone)]
pub struct BucketMatrix {
    bucket_count: usize,
    bucket_size: usize,
    slots: Vec<Option<RecordId>>,
}

impl BucketMatrix {
    /// Create an empty matrix.
    pub fn new(bucket_count: usize, bucket_size: usize) -> Self {
        Self {
            bucket_count,
            bucket_size,
            slots: vec![None; bucket_count * bucket_size],
        }
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Slots per bucket.
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    fn index(&self, bucket: usize, slot: usize) -> usize {
        debug_assert!(bucket < self.bucket_count && slot < self.bucket_size);
        bucket * self.bucket_size + slot
    }

    /// Occupant of a slot.
    pub fn get(&self, bucket: usize, slot: usize) -> Option<RecordId> {
        self.slots.get(self.index(bucket, slot)).copied().flatten()
    }

    /// Put `id` into a slot, returning the previous occupant.
    pub fn set(&mut self, bucket: usize, slot: usize, id: RecordId) -> Option<RecordId> {
        let index = self.index(bucket, slot);
        self.slots.get_mut(index).and_then(|s| s.replace(id))
    }

    /// Empty a slot, returning the previous occupant.
    pub fn take(&mut self, bucket: usize, slot: usize) -> Option<RecordId> {
        let index = self.index(bucket, slot);
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Iterate `(bucket, slot, id)` over occupied slots.
    pub fn iter_occupied(&self) -> impl Iterator<Item = (usize, usize, RecordId)> + '_ {
        let size = self.bucket_size;
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(i, s)| s.map(|id| (i / size, i % size, id)))
    }
}
