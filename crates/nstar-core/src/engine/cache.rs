use std::cell::RefCell;
use std::collections::HashMap;

/// Interpolated background `(ν, m, p)` at one radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundPoint {
    pub time_metric_fn: f64,
    pub mass: f64,
    pub pressure: f64,
}

/// Memo of background lookups for one star, keyed by the exact bits of the radius.
///
/// The secant iteration re-integrates the perturbation equations over the same
/// background many times and revisits the same radii, so lookups repeat heavily.
/// A cache belongs to exactly one star and one thread. It holds at most `capacity`
/// radii and starts over once full.
#[derive(Debug)]
pub struct BackgroundCache {
    data: RefCell<HashMap<u64, BackgroundPoint>>,
    capacity: usize,
}

impl Default for BackgroundCache {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl BackgroundCache {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: RefCell::new(HashMap::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_or_insert_with(
        &self,
        radius: f64,
        compute: impl FnOnce() -> BackgroundPoint,
    ) -> BackgroundPoint {
        let key = radius.to_bits();
        if let Some(point) = self.data.borrow().get(&key) {
            return *point;
        }
        let point = compute();
        let mut data = self.data.borrow_mut();
        if data.len() >= self.capacity {
            data.clear();
        }
        data.insert(key, point);
        point
    }

    pub fn get(&self, radius: f64) -> Option<BackgroundPoint> {
        self.data.borrow().get(&radius.to_bits()).copied()
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }
}
