//! Virtual scrolling viewport over a [`VirtualDataSource`].
//!
//! The viewport tracks a scroll window (position + height) over a data
//! source it never owns, computes the visible slice, diffs visibility by
//! record id, and publishes scroll/visibility events. Rendering goes
//! through the injected [`TaskFormatter`]; rows past the end of content
//! are cleared to blank lines.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::bus::EventBus;
use crate::data_source::VirtualDataSource;
use crate::events::{EngineEvent, ItemVisibilityChanged, ViewportScrolled};
use crate::models::Task;
use crate::traits::TaskFormatter;

/// Scroll window over a virtualized record sequence.
pub struct VirtualScrollingViewport {
    width: u16,
    height: usize,
    scroll_position: usize,
    /// Record ids rendered visible last time, for visibility diffing.
    visible_ids: BTreeSet<u64>,
    bus: Arc<EventBus>,
}

impl VirtualScrollingViewport {
    /// Create a viewport of the given dimensions.
    pub fn new(width: u16, height: usize, bus: Arc<EventBus>) -> Self {
        Self {
            width,
            height,
            scroll_position: 0,
            visible_ids: BTreeSet::new(),
            bus,
        }
    }

    /// Current scroll position.
    pub fn scroll_position(&self) -> usize {
        self.scroll_position
    }

    /// Viewport width in cells.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Viewport height in rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Maximum legal scroll position for the source's current total.
    pub fn max_scroll(&self, source: &VirtualDataSource) -> usize {
        source.total_count().saturating_sub(self.height)
    }

    /// Scroll to an absolute position, clamped to
    /// `[0, max(0, total - height)]`.
    ///
    /// When the clamped position differs from the current one, the
    /// visible slice is recomputed, a `ViewportScrolled` event is
    /// published, and an `ItemVisibilityChanged` event follows if any
    /// record entered or left the window. Returns true when the position
    /// changed.
    pub fn scroll_to(&mut self, position: usize, source: &VirtualDataSource) -> bool {
        let max = self.max_scroll(source);
        let clamped = position.min(max);
        if clamped == self.scroll_position {
            return false;
        }

        let old_position = self.scroll_position;
        self.scroll_position = clamped;
        debug!(old_position, new_position = clamped, "viewport scrolled");

        self.bus.publish(&EngineEvent::ViewportScrolled(ViewportScrolled {
            old_position,
            new_position: clamped,
            max_position: max,
            total_items: source.total_count(),
        }));

        self.publish_visibility_diff(source);
        true
    }

    /// Scroll relative to the current position.
    pub fn scroll_by(&mut self, delta: isize, source: &VirtualDataSource) -> bool {
        let target = if delta.is_negative() {
            self.scroll_position.saturating_sub(delta.unsigned_abs())
        } else {
            self.scroll_position.saturating_add(delta as usize)
        };
        self.scroll_to(target, source)
    }

    /// Recompute visibility against the (possibly swapped or mutated)
    /// data source without requiring a scroll.
    ///
    /// Clamps the position if the view shrank beneath it; publishes the
    /// scroll event for that clamp and a visibility diff when the window
    /// content changed.
    pub fn refresh(&mut self, source: &VirtualDataSource) {
        let max = self.max_scroll(source);
        if self.scroll_position > max {
            let old_position = self.scroll_position;
            self.scroll_position = max;
            self.bus.publish(&EngineEvent::ViewportScrolled(ViewportScrolled {
                old_position,
                new_position: max,
                max_position: max,
                total_items: source.total_count(),
            }));
        }
        self.publish_visibility_diff(source);
    }

    /// Resize the viewport and recompute visibility.
    pub fn resize(&mut self, width: u16, height: usize, source: &VirtualDataSource) {
        self.width = width;
        self.height = height;
        self.refresh(source);
    }

    /// The records currently inside the scroll window.
    pub fn visible_slice(&self, source: &VirtualDataSource) -> Vec<Task> {
        source.range(self.scroll_position, self.height)
    }

    /// Render the visible slice through the formatter.
    ///
    /// Each record contributes one or more lines sized to `width`;
    /// output is truncated to the viewport height and remaining rows are
    /// cleared to empty strings.
    pub fn render(&self, source: &VirtualDataSource, formatter: &dyn TaskFormatter) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.height);
        'records: for record in self.visible_slice(source) {
            for line in formatter.format_record(&record, self.width) {
                if lines.len() >= self.height {
                    break 'records;
                }
                lines.push(Self::fit_to_width(line, self.width));
            }
        }
        while lines.len() < self.height {
            lines.push(String::new());
        }
        lines
    }

    fn fit_to_width(line: String, width: u16) -> String {
        let width = width as usize;
        if line.chars().count() <= width {
            line
        } else {
            line.chars().take(width).collect()
        }
    }

    /// Diff the current window against the last-rendered id set and
    /// publish `ItemVisibilityChanged` when the symmetric difference is
    /// non-empty.
    fn publish_visibility_diff(&mut self, source: &VirtualDataSource) {
        let new_ids: BTreeSet<u64> = self
            .visible_slice(source)
            .iter()
            .map(|record| record.id)
            .collect();

        let newly_visible: Vec<u64> = new_ids.difference(&self.visible_ids).copied().collect();
        let newly_invisible: Vec<u64> = self.visible_ids.difference(&new_ids).copied().collect();

        if newly_visible.is_empty() && newly_invisible.is_empty() {
            return;
        }

        let total_visible = new_ids.len();
        self.visible_ids = new_ids;
        self.bus
            .publish(&EngineEvent::ItemVisibilityChanged(ItemVisibilityChanged {
                newly_visible,
                newly_invisible,
                total_visible,
            }));
    }
}
