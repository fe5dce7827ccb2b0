//! Directional comparators over task records.

use std::cmp::Ordering;

use crate::models::Task;

/// Field a sort operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Computed urgency score (missing urgency is 0.0 by the record
    /// default).
    Urgency,
    /// Due date; records without one sort after all dated records
    /// regardless of direction.
    DueDate,
    /// Case-sensitive lexicographic project name (empty when unset).
    Project,
}

impl SortField {
    /// Canonical lowercase form, used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Urgency => "urgency",
            SortField::DueDate => "due",
            SortField::Project => "project",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Canonical short form, used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// A field + direction pair; the comparator the engine applies after
/// filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Ascending sort on a field.
    pub fn ascending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    /// Descending sort on a field.
    pub fn descending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }

    /// Cache-key fragment (`"urgency:desc"`).
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.field.as_str(), self.direction.as_str())
    }

    /// Compare two records.
    ///
    /// Ties are left to the stability of the underlying sort. Records
    /// without a due date compare after all dated records on
    /// [`SortField::DueDate`] in both directions.
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        match self.field {
            SortField::Urgency => self.directed(a.urgency.total_cmp(&b.urgency)),
            SortField::Project => self.directed(a.project.cmp(&b.project)),
            SortField::DueDate => match (a.due, b.due) {
                (None, None) => Ordering::Equal,
                // Missing due sorts last regardless of direction
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(da), Some(db)) => self.directed(da.cmp(&db)),
            },
        }
    }

    fn directed(&self, ordering: Ordering) -> Ordering {
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}
