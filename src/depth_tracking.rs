use crate::{
    element::Element,
    error::{Error, Result},
};

/// Tracks how deeply nested the current pack element is, by counting down the elements left
/// in each open array and map.
#[derive(Clone, Debug)]
pub struct DepthTracker {
    tracking: Vec<usize>,
    max_depth: usize,
}

impl DepthTracker {
    /// Create a new depth tracker
    pub fn new(max_depth: usize) -> Self {
        Self {
            tracking: Vec::new(),
            max_depth,
        }
    }

    /// Update the depth tracker on each new element.
    pub fn update_elem(&mut self, elem: &Element) -> Result<()> {
        // Subtract from count for next element
        if let Some(v) = self.tracking.last_mut() {
            *v -= 1;
        }

        // Increase nest depth if this is a nesting element
        match elem {
            // 2 elements per map item
            Element::Map(len) => self.tracking.push(len.saturating_mul(2)),
            Element::Array(len) => self.tracking.push(*len),
            _ => (),
        }

        if self.tracking.len() > self.max_depth {
            return Err(Error::DepthLimit(self.max_depth));
        }

        self.purge_zeros();
        Ok(())
    }

    /// Drop any depth tracking elements that have hit zero
    pub fn purge_zeros(&mut self) {
        while let Some(0) = self.tracking.last() {
            self.tracking.pop();
        }
    }

    /// Drop a depth before we've seen enough elements. Used by map/seq serializers that didn't
    /// know their total length ahead of time: they put in a maximally-sized element, run
    /// through the depth tracker as normal, then call this when done.
    pub fn early_end(&mut self) {
        self.tracking.pop();
        self.purge_zeros();
    }

    /// True once every opened array and map has seen all its elements.
    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        self.tracking.is_empty()
    }
}
