//! Filterable, indexable view over a backing sequence of task records.
//!
//! [`VirtualDataSource`] wraps the provider's record snapshot and keeps an
//! optional index map from logical position to backing position. With no
//! filter installed the mapping is the identity; installing a predicate
//! recomputes the map. All accessors operate against the active mapping
//! and return empty/`None` for out-of-range input rather than erroring.

use crate::models::Task;

/// Predicate used to build the index map.
pub type RecordPredicate = dyn Fn(&Task) -> bool;

/// A view over a backing record sequence with optional filtering.
#[derive(Default)]
pub struct VirtualDataSource {
    backing: Vec<Task>,
    /// Logical position → backing position. `None` means identity.
    index_map: Option<Vec<usize>>,
}

impl VirtualDataSource {
    /// Create a source over the given records.
    pub fn new(records: Vec<Task>) -> Self {
        Self {
            backing: records,
            index_map: None,
        }
    }

    /// Replace the backing records.
    ///
    /// Any installed filter index is cleared; the caller re-applies its
    /// predicate against the new snapshot.
    pub fn set_records(&mut self, records: Vec<Task>) {
        self.backing = records;
        self.index_map = None;
    }

    /// Install or clear the filter predicate.
    ///
    /// `Some` recomputes the index map against the backing sequence;
    /// `None` reverts to the identity mapping.
    pub fn set_filter(&mut self, predicate: Option<&RecordPredicate>) {
        self.index_map = predicate.map(|p| {
            self.backing
                .iter()
                .enumerate()
                .filter(|(_, record)| p(record))
                .map(|(i, _)| i)
                .collect()
        });
    }

    /// True when a filter index is installed.
    pub fn is_filtered(&self) -> bool {
        self.index_map.is_some()
    }

    /// Number of records visible through the active mapping.
    pub fn total_count(&self) -> usize {
        match &self.index_map {
            Some(map) => map.len(),
            None => self.backing.len(),
        }
    }

    /// Number of records in the backing sequence, ignoring any filter.
    pub fn backing_count(&self) -> usize {
        self.backing.len()
    }

    /// Record at a logical position, or `None` when out of range.
    pub fn item(&self, position: usize) -> Option<&Task> {
        match &self.index_map {
            Some(map) => map.get(position).and_then(|&i| self.backing.get(i)),
            None => self.backing.get(position),
        }
    }

    /// Records in `[start, start + count)` through the active mapping.
    ///
    /// Truncated at the end of the view; a fully out-of-range start
    /// yields an empty vec.
    pub fn range(&self, start: usize, count: usize) -> Vec<Task> {
        let total = self.total_count();
        if start >= total || count == 0 {
            return Vec::new();
        }
        let end = (start + count).min(total);
        (start..end)
            .filter_map(|pos| self.item(pos).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    fn records(n: u64) -> Vec<Task> {
        (0..n)
            .map(|i| {
                let mut task = Task::new(i, format!("task {i}")).unwrap();
                task.urgency = i as f64;
                if i % 2 == 0 {
                    task.status = TaskStatus::Completed;
                }
                task
            })
            .collect()
    }

    #[test]
    fn test_identity_mapping_by_default() {
        let source = VirtualDataSource::new(records(5));
        assert!(!source.is_filtered());
        assert_eq!(source.total_count(), 5);
        assert_eq!(source.item(2).unwrap().id, 2);
    }

    #[test]
    fn test_set_filter_recomputes_index() {
        let mut source = VirtualDataSource::new(records(10));
        source.set_filter(Some(&|t: &Task| t.status == TaskStatus::Pending));

        assert!(source.is_filtered());
        assert_eq!(source.total_count(), 5);
        // Odd ids are pending
        assert_eq!(source.item(0).unwrap().id, 1);
        assert_eq!(source.item(4).unwrap().id, 9);
    }

    #[test]
    fn test_clear_filter_restores_identity() {
        let mut source = VirtualDataSource::new(records(10));
        source.set_filter(Some(&|t: &Task| t.id > 7));
        assert_eq!(source.total_count(), 2);

        source.set_filter(None);
        assert!(!source.is_filtered());
        assert_eq!(source.total_count(), 10);
    }

    #[test]
    fn test_item_out_of_range_returns_none() {
        let source = VirtualDataSource::new(records(3));
        assert!(source.item(3).is_none());
        assert!(source.item(100).is_none());
    }

    #[test]
    fn test_range_basic() {
        let source = VirtualDataSource::new(records(10));
        let slice = source.range(2, 3);
        assert_eq!(slice.len(), 3);
        assert_eq!(slice[0].id, 2);
        assert_eq!(slice[2].id, 4);
    }

    #[test]
    fn test_range_truncates_at_end() {
        let source = VirtualDataSource::new(records(5));
        let slice = source.range(3, 10);
        assert_eq!(slice.len(), 2);
        assert_eq!(slice[1].id, 4);
    }

    #[test]
    fn test_range_out_of_range_is_empty() {
        let source = VirtualDataSource::new(records(5));
        assert!(source.range(5, 3).is_empty());
        assert!(source.range(100, 1).is_empty());
        assert!(source.range(0, 0).is_empty());
    }

    #[test]
    fn test_range_respects_filter() {
        let mut source = VirtualDataSource::new(records(10));
        source.set_filter(Some(&|t: &Task| t.urgency >= 6.0));
        let slice = source.range(0, 10);
        assert_eq!(slice.len(), 4);
        assert_eq!(slice[0].id, 6);
    }

    #[test]
    fn test_set_records_clears_filter() {
        let mut source = VirtualDataSource::new(records(10));
        source.set_filter(Some(&|t: &Task| t.id == 0));
        assert_eq!(source.total_count(), 1);

        source.set_records(records(3));
        assert!(!source.is_filtered());
        assert_eq!(source.total_count(), 3);
    }

    #[test]
    fn test_empty_source() {
        let source = VirtualDataSource::default();
        assert_eq!(source.total_count(), 0);
        assert!(source.item(0).is_none());
        assert!(source.range(0, 10).is_empty());
    }
}
