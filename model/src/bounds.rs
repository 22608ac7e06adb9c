/// Accumulating min/max time range, in model milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    range: Option<(f64, f64)>,
}

impl Bounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_none()
    }

    pub fn add_value(&mut self, ts: f64) {
        self.range = match self.range {
            None => Some((ts, ts)),
            Some((min, max)) => Some((min.min(ts), max.max(ts))),
        };
    }

    pub fn add_range(&mut self, start: f64, end: f64) {
        self.add_value(start);
        self.add_value(end);
    }

    pub fn add_bounds(&mut self, other: &Bounds) {
        if let Some((min, max)) = other.range {
            self.add_range(min, max);
        }
    }

    pub fn min(&self) -> Option<f64> {
        self.range.map(|(min, _)| min)
    }

    pub fn max(&self) -> Option<f64> {
        self.range.map(|(_, max)| max)
    }

    /// Min and max with an empty range collapsing to zero.
    pub fn min_or_zero(&self) -> f64 {
        self.min().unwrap_or(0.0)
    }

    pub fn max_or_zero(&self) -> f64 {
        self.max().unwrap_or(0.0)
    }
}
