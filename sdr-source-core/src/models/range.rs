use serde::{Deserialize, Serialize};

/// A single `[start, stop]` interval with an optional step (0 = continuous).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Range {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    /// A range holding exactly one value.
    pub fn value(v: f64) -> Self {
        Self::new(v, v, 0.0)
    }
}

/// An ordered list of ranges, used for sample rates, frequencies and gains.
///
/// An empty `MetaRange` is the neutral answer for an unknown channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetaRange(Vec<Range>);

pub type FreqRange = MetaRange;
pub type GainRange = MetaRange;

impl MetaRange {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a range set from discrete values, e.g. a tuner gain table.
    pub fn from_values(values: &[f64]) -> Self {
        Self(values.iter().copied().map(Range::value).collect())
    }

    pub fn push(&mut self, range: Range) {
        self.0.push(range);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range> {
        self.0.iter()
    }

    /// Lowest start, or 0 when empty.
    pub fn start(&self) -> f64 {
        self.0
            .iter()
            .map(|r| r.start)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
            .unwrap_or(0.0)
    }

    /// Highest stop, or 0 when empty.
    pub fn stop(&self) -> f64 {
        self.0
            .iter()
            .map(|r| r.stop)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
            .unwrap_or(0.0)
    }

    /// Clip `value` into the closest covered point. With `clip_step` the value
    /// also snaps onto the step grid of the range it lands in.
    pub fn clip(&self, value: f64, clip_step: bool) -> f64 {
        let mut best = value;
        let mut best_distance = f64::INFINITY;

        for r in &self.0 {
            let mut candidate = value.clamp(r.start, r.stop);
            if clip_step && r.step > 0.0 {
                let steps = ((candidate - r.start) / r.step).round();
                candidate = (r.start + steps * r.step).min(r.stop);
            }
            let distance = (candidate - value).abs();
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }
        best
    }
}

impl From<Range> for MetaRange {
    fn from(range: Range) -> Self {
        Self(vec![range])
    }
}

impl FromIterator<Range> for MetaRange {
    fn from_iter<I: IntoIterator<Item = Range>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_range_reports_zero_bounds() {
        let r = MetaRange::default();
        assert!(r.is_empty());
        assert_eq!(r.start(), 0.0);
        assert_eq!(r.stop(), 0.0);
    }

    #[test]
    fn bounds_span_all_ranges() {
        let r: MetaRange = vec![Range::new(24e6, 1.1e9, 0.0), Range::new(1.2e9, 1.766e9, 0.0)]
            .into_iter()
            .collect();
        assert_eq!(r.start(), 24e6);
        assert_eq!(r.stop(), 1.766e9);
    }

    #[test]
    fn clip_snaps_to_step_grid() {
        let r = MetaRange::from(Range::new(0.0, 50.0, 0.5));
        assert_eq!(r.clip(12.3, true), 12.5);
        assert_eq!(r.clip(12.3, false), 12.3);
        assert_eq!(r.clip(80.0, true), 50.0);
    }

    #[test]
    fn clip_picks_nearest_discrete_value() {
        let r = MetaRange::from_values(&[0.0, 0.9, 1.4, 2.7, 3.7]);
        assert_eq!(r.clip(1.0, true), 0.9);
        assert_eq!(r.clip(3.3, true), 3.7);
    }

    #[test]
    fn clip_into_gap_between_ranges() {
        let r: MetaRange = vec![Range::new(0.0, 10.0, 0.0), Range::new(20.0, 30.0, 0.0)]
            .into_iter()
            .collect();
        assert_eq!(r.clip(12.0, false), 10.0);
        assert_eq!(r.clip(19.0, false), 20.0);
    }
}
