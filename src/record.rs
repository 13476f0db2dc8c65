//! Dirty tracking for settings panes

/// A pane value plus the baseline captured at the last synchronization
///
/// The pane is changed iff the current value differs from the baseline, so
/// reverting an edit by hand makes the pane clean again.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeTracked<T> {
    current: T,
    baseline: T,
}

impl<T: Clone + PartialEq> ChangeTracked<T> {
    pub fn new(value: T) -> Self {
        Self {
            baseline: value.clone(),
            current: value,
        }
    }

    /// Replace the pane with a device snapshot and mark it clean
    pub fn synchronize(&mut self, source: T) {
        self.baseline = source.clone();
        self.current = source;
    }

    /// Like [`Self::synchronize`], but keeps the stale value when the read failed
    pub fn synchronize_from(&mut self, source: Option<T>) {
        if let Some(source) = source {
            self.synchronize(source);
        }
    }

    /// Update one field, returns whether its value changed
    pub fn set<V, F>(&mut self, field: F, value: V) -> bool
    where
        V: PartialEq,
        F: FnOnce(&mut T) -> &mut V,
    {
        let slot = field(&mut self.current);
        if *slot == value {
            return false;
        }
        *slot = value;
        true
    }

    /// Take the current values as the new baseline
    pub fn accept_changes(&mut self) {
        self.baseline = self.current.clone();
    }

    /// Move part of the current values into the baseline, e.g. the fields a
    /// write confirmed while others failed
    pub fn accept_part(&mut self, accept: impl FnOnce(&mut T, &T)) {
        accept(&mut self.baseline, &self.current);
    }

    pub fn is_changed(&self) -> bool {
        self.current != self.baseline
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn baseline(&self) -> &T {
        &self.baseline
    }
}
