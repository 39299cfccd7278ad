use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt};

/// Range where lower bound is inclusive, upper bound is exclusive or unbounded.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Range<T>(T, Option<T>);

impl<T> Range<T>
where
    T: Ord,
{
    pub fn new(from: T, to: Option<T>) -> Self {
        if let Some(ref to) = to {
            if from >= *to {
                panic!("ranges must go from low to high")
            }
        }
        Range(from, to)
    }

    pub fn contains(&self, val: &T) -> bool {
        if let Some(end) = &self.1 {
            val >= &self.0 && val < end
        } else {
            val >= &self.0
        }
    }
}

impl<T> Range<T> {
    pub fn start(&self) -> &T {
        &self.0
    }

    pub fn end(&self) -> Option<&T> {
        self.1.as_ref()
    }
}

impl<T> fmt::Display for Range<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(end) = &self.1 {
            write!(f, "{:.1} - {:.1}", self.0, end)
        } else {
            write!(f, "{:.1}+", self.0)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RangeSet<T> {
    ranges: Vec<Range<T>>,
}

impl<T> RangeSet<T> {
    pub fn new(ranges: Vec<Range<T>>) -> Self {
        Self { ranges }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range<T>> + '_ {
        self.ranges.iter()
    }

    pub fn push(&mut self, range: Range<T>) {
        self.ranges.push(range);
    }
}

impl<T> RangeSet<T>
where
    T: Ord,
{
    pub fn bucket_values_with_missing<I, B>(self, values: I) -> RangeSetCountsWithMissing<T>
    where
        I: Iterator<Item = Option<B>>,
        B: Borrow<T>,
    {
        let mut buckets = vec![0usize; self.ranges.len() + 1];
        let last = self.ranges.len();
        for value in values {
            if let Some(value) = value {
                for (idx, bucket) in self.ranges.iter().enumerate() {
                    if bucket.contains(value.borrow()) {
                        buckets[idx] += 1;
                    }
                }
            } else {
                buckets[last] += 1;
            }
        }
        RangeSetCountsWithMissing {
            set: self,
            counts: buckets,
        }
    }
}

/// A range set with values bucketed, and bucket sizes recorded, plus a count of missing values.
pub struct RangeSetCountsWithMissing<T> {
    set: RangeSet<T>,
    counts: Vec<usize>,
}

impl<T> RangeSetCountsWithMissing<T> {
    pub fn iter(&self) -> impl Iterator<Item = (Option<&Range<T>>, usize)> {
        self.set
            .iter()
            .zip_longest(self.counts.iter().copied())
            .map(|el| match el {
                EitherOrBoth::Left(_) => unreachable!(),
                EitherOrBoth::Right(count) => (None, count),
                EitherOrBoth::Both(range, count) => (Some(range), count),
            })
    }
}

impl<T> RangeSetCountsWithMissing<T>
where
    T: fmt::Display,
{
    pub fn for_display(&self) -> impl Iterator<Item = (&dyn fmt::Display, usize)> {
        self.iter().map(|(range, count)| {
            let range = match range {
                Some(range) => range,
                None => &"missing data" as &dyn fmt::Display,
            };
            (range, count)
        })
    }
}

/// Bounds where both ends are inclusive, and either end may be open.
///
/// A lower bound above the upper bound is allowed, and contains nothing.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub from: Option<T>,
    pub to: Option<T>,
}

impl<T> Default for Bounds<T> {
    fn default() -> Self {
        Bounds {
            from: None,
            to: None,
        }
    }
}

impl<T> Bounds<T>
where
    T: PartialOrd,
{
    pub fn between(from: T, to: T) -> Self {
        Bounds {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn at_least(from: T) -> Self {
        Bounds {
            from: Some(from),
            to: None,
        }
    }

    pub fn at_most(to: T) -> Self {
        Bounds {
            from: None,
            to: Some(to),
        }
    }

    /// `true` when neither end is set, so every value is contained.
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, val: &T) -> bool {
        let above = match &self.from {
            Some(from) => val >= from,
            None => true,
        };
        let below = match &self.to {
            Some(to) => val <= to,
            None => true,
        };
        above && below
    }
}

impl<T> fmt::Display for Bounds<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.from, &self.to) {
            (Some(from), Some(to)) => write!(f, "{} to {}", from, to),
            (Some(from), None) => write!(f, "from {}", from),
            (None, Some(to)) => write!(f, "until {}", to),
            (None, None) => f.write_str("any"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Bounds, Range, RangeSet};

    #[test]
    fn bounds_are_inclusive() {
        let b = Bounds::between(10, 20);
        assert!(b.contains(&10));
        assert!(b.contains(&20));
        assert!(!b.contains(&9));
        assert!(!b.contains(&21));
        assert!(Bounds::at_least(5).contains(&1000));
        assert!(Bounds::at_most(5).contains(&-1000));
        assert!(!Bounds::between(20, 10).contains(&15));
    }

    #[test]
    fn buckets_with_missing() {
        let set = RangeSet::new(vec![Range::new(0, Some(10)), Range::new(10, None)]);
        let counts = set.bucket_values_with_missing([Some(1), Some(10), None, Some(99)].into_iter());
        let counts = counts.iter().map(|(_, c)| c).collect::<Vec<_>>();
        assert_eq!(counts, vec![1, 2, 1]);
    }
}
