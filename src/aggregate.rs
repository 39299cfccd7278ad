//! Counts and statistics over a (usually filtered) dataset.
//!
//! Everything here is recomputed from scratch for each dataset. Columns that are absent give
//! empty results rather than errors.
use crate::{
    features, ArcStr, Column, Dataset, Field, Range, RangeSet, RangeSetCountsWithMissing, Record,
};
use chrono::Weekday;
use itertools::Itertools;
use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::{
    borrow::Cow,
    cmp::Reverse,
    collections::{BTreeMap, HashSet},
    fmt,
};
use term_data_table::{Cell, Row, Table};

/// A column with numeric values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Numeric {
    Age,
    Day,
    Month,
    Year,
    /// A lab value, by name.
    Measurement(ArcStr),
}

impl Numeric {
    pub fn is_present(&self, dataset: &Dataset) -> bool {
        let schema = dataset.schema();
        match self {
            Numeric::Age => schema.has(Column::Age),
            Numeric::Day => schema.has(Column::Day),
            Numeric::Month => schema.has(Column::Month),
            Numeric::Year => schema.has(Column::Year),
            Numeric::Measurement(name) => schema.has_measurement(name),
        }
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Numeric::Age => f.write_str("age"),
            Numeric::Day => f.write_str("day"),
            Numeric::Month => f.write_str("month"),
            Numeric::Year => f.write_str("year"),
            Numeric::Measurement(name) => f.write_str(name),
        }
    }
}

/// Number of rows for each non-null value of `column`, most frequent first. Ties are ordered by
/// value.
pub fn count_by(dataset: &Dataset, column: Column) -> Vec<(ArcStr, usize)> {
    if !dataset.schema().has(column) {
        return vec![];
    }
    let mut counts: BTreeMap<Cow<str>, usize> = BTreeMap::new();
    for value in dataset.iter().filter_map(|rec| rec.text(column).into_value()) {
        *counts.entry(value).or_default() += 1;
    }
    counts
        .into_iter()
        .sorted_by_key(|(value, count)| (Reverse(*count), value.clone()))
        .map(|(value, count)| (ArcStr::from(&*value), count))
        .collect()
}

/// Number of distinct patients among the rows matching `predicate` (or all rows). Rows without
/// a patient id are not counted.
pub fn count_distinct_patients(
    dataset: &Dataset,
    predicate: Option<&dyn Fn(&Record) -> bool>,
) -> usize {
    dataset
        .iter()
        .filter(|rec| predicate.map(|f| f(rec)).unwrap_or(true))
        .filter_map(|rec| rec.patient_id.value())
        .collect::<HashSet<_>>()
        .len()
}

/// Descriptive statistics of a numeric column.
///
/// `count` is the number of non-null values. The statistics are `None` when there are no values,
/// and `std` is also `None` for a single value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Description {
    /// Rows with a value. Not the number of rows, which also counts nulls.
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

impl Description {
    /// The statistics with their labels, in display order.
    pub fn stats(&self) -> [(&'static str, Option<f64>); 7] {
        [
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.p25),
            ("50%", self.p50),
            ("75%", self.p75),
            ("max", self.max),
        ]
    }

    pub fn table(&self) -> Table<'_> {
        let mut table = Table::new().with_row(
            Row::new()
                .with_cell(Cell::from("count"))
                .with_cell(Cell::from(self.count.to_string())),
        );
        for (label, value) in self.stats() {
            table.add_row(
                Row::new()
                    .with_cell(Cell::from(label))
                    .with_cell(Cell::from(fmt_stat(value))),
            );
        }
        table
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

/// Describe the non-null values of `column`.
pub fn describe(dataset: &Dataset, column: &Numeric) -> Description {
    if !column.is_present(dataset) {
        return Description::default();
    }
    describe_values(
        dataset
            .iter()
            .filter_map(|rec| rec.number(column).into_value()),
    )
}

/// Describe a sample. Non-finite values are ignored.
pub fn describe_values(values: impl IntoIterator<Item = f64>) -> Description {
    let mut sorted: Vec<R64> = values.into_iter().filter_map(R64::try_new).collect();
    if sorted.is_empty() {
        return Description::default();
    }
    sorted.sort_unstable();
    let raw: Vec<f64> = sorted.iter().map(|v| v.raw()).collect();
    let std = raw.iter().std_dev();
    Description {
        count: raw.len(),
        mean: Some(raw.iter().mean()),
        std: if std.is_finite() { Some(std) } else { None },
        min: sorted.first().map(|v| v.raw()),
        p25: quantile(&sorted, 0.25),
        p50: quantile(&sorted, 0.5),
        p75: quantile(&sorted, 0.75),
        max: sorted.last().map(|v| v.raw()),
    }
}

/// The `q`th quantile of sorted values, interpolating linearly between the closest ranks.
pub fn quantile(sorted: &[R64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0. ..=1.).contains(&q) {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let (lo_val, hi_val) = (sorted[lo].raw(), sorted[hi].raw());
    Some(lo_val + (hi_val - lo_val) * (pos - lo as f64))
}

/// Number of vaccinations in each month, in chronological order. Months with no vaccinations
/// are not included.
pub fn monthly_time_series(dataset: &Dataset) -> Vec<(ArcStr, usize)> {
    let mut months: BTreeMap<&ArcStr, usize> = BTreeMap::new();
    for label in dataset
        .iter()
        .filter_map(|rec| rec.derived.month_label.value())
    {
        *months.entry(label).or_default() += 1;
    }
    months
        .into_iter()
        .map(|(label, count)| (label.clone(), count))
        .collect()
}

/// Number of vaccinations on each weekday, Monday first. Weekdays with no vaccinations are not
/// included.
pub fn weekday_counts(dataset: &Dataset) -> Vec<(ArcStr, usize)> {
    let mut days = [0usize; 7];
    for day in dataset.iter().filter_map(|rec| rec.derived.weekday.value()) {
        days[day.num_days_from_monday() as usize] += 1;
    }
    let mut day = Weekday::Mon;
    let mut out = vec![];
    for count in days {
        if count > 0 {
            out.push((ArcStr::from(features::weekday_name(day)), count));
        }
        day = day.succ();
    }
    out
}

/// Bucket ages into `bins` equal-width bins spanning the observed ages, plus a bucket for rows
/// with no age. The last bin is open-ended so it includes the oldest age.
///
/// Returns `None` when the dataset has no age column.
pub fn age_histogram(dataset: &Dataset, bins: usize) -> Option<RangeSetCountsWithMissing<R64>> {
    if !dataset.schema().has(Column::Age) {
        return None;
    }
    let ages: Vec<Option<R64>> = dataset
        .iter()
        .map(|rec| match rec.derived.age {
            Field::Value(age) => R64::try_new(age),
            _ => None,
        })
        .collect();
    let (min, max) = match ages.iter().flatten().minmax().into_option() {
        Some((min, max)) => (*min, *max),
        None => return Some(RangeSet::new(vec![]).bucket_values_with_missing(ages.into_iter())),
    };
    let bins = bins.max(1);
    let width = (max - min) / r64(bins as f64);
    // Adjacent bins share one edge value, so every age lands in exactly one bin.
    let mut edges: Vec<R64> = (0..bins)
        .map(|idx| min + width * r64(idx as f64))
        .collect();
    edges.dedup();
    let mut set = RangeSet::new(vec![]);
    for (start, end) in edges.iter().tuple_windows() {
        set.push(Range::new(*start, Some(*end)));
    }
    if let Some(last) = edges.last() {
        set.push(Range::new(*last, None));
    }
    Some(set.bucket_values_with_missing(ages.into_iter()))
}

/// Everything shown on the dashboard for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub rows: usize,
    pub patients: usize,
    /// Rows that are adverse reactions.
    pub adverse_events: usize,
    /// Patients with at least one adverse reaction.
    pub adverse_patients: usize,
    pub by_vaccine: Vec<(ArcStr, usize)>,
    pub by_status: Vec<(ArcStr, usize)>,
    pub by_manifestation: Vec<(ArcStr, usize)>,
    pub by_month: Vec<(ArcStr, usize)>,
    pub by_weekday: Vec<(ArcStr, usize)>,
    pub age: Description,
    /// One description for each lab value, in schema order.
    pub measurements: Vec<(ArcStr, Description)>,
}

impl Summary {
    pub fn compute(dataset: &Dataset) -> Self {
        let is_adverse = |rec: &Record| rec.is_adverse();
        Summary {
            rows: dataset.len(),
            patients: count_distinct_patients(dataset, None),
            adverse_events: dataset.iter().filter(|rec| rec.is_adverse()).count(),
            adverse_patients: count_distinct_patients(dataset, Some(&is_adverse)),
            by_vaccine: count_by(dataset, Column::VaccineName),
            by_status: count_by(dataset, Column::Status),
            by_manifestation: count_by(dataset, Column::Manifestation),
            by_month: monthly_time_series(dataset),
            by_weekday: weekday_counts(dataset),
            age: describe(dataset, &Numeric::Age),
            measurements: dataset
                .schema()
                .measurements()
                .iter()
                .map(|m| {
                    let name = m.name.clone();
                    let desc = describe(dataset, &Numeric::Measurement(name.clone()));
                    (name, desc)
                })
                .collect(),
        }
    }

    /// Adverse events as a percentage of all rows, if there are any rows.
    pub fn adverse_rate(&self) -> Option<f64> {
        if self.rows == 0 {
            None
        } else {
            Some(self.adverse_events as f64 / self.rows as f64 * 100.)
        }
    }
}

/// A table of counts with their share of `total`.
pub fn counts_table<'a>(label: &'a str, counts: &[(ArcStr, usize)], total: usize) -> Table<'a> {
    let mut table = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from(label))
            .with_cell(Cell::from("Count"))
            .with_cell(Cell::from("Percentage")),
    );
    for (value, count) in counts {
        table.add_row(
            Row::new()
                .with_cell(Cell::from(value.to_string()))
                .with_cell(Cell::from(count.to_string()))
                .with_cell(Cell::from(percentage(*count, total))),
        );
    }
    table
}

/// `count` as a percentage of `total`, for display.
pub fn percentage(count: usize, total: usize) -> String {
    if total == 0 {
        "-".to_string()
    } else {
        format!("{:.1}%", count as f64 / total as f64 * 100.)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{derive, read_bytes, ColumnAliases, SourceConfig};
    use chrono::{NaiveDate, NaiveDateTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn load(csv: &str) -> Dataset {
        let (ds, _) = read_bytes(
            csv.as_bytes(),
            &SourceConfig::new(',', "utf-8"),
            &ColumnAliases::default(),
        )
        .unwrap();
        derive(&ds, now())
    }

    fn approx(a: Option<f64>, b: f64) -> bool {
        matches!(a, Some(a) if (a - b).abs() < 1e-9)
    }

    fn counts(items: &[(&str, usize)]) -> Vec<(ArcStr, usize)> {
        items.iter().map(|(v, c)| (ArcStr::from(*v), *c)).collect()
    }

    #[test]
    fn distinct_patients() {
        let ds = load(
            "PacienteId,TipoManifestacao\n1,Adversa\n1,Local\n2,Adversa\n3,Local\n",
        );
        assert_eq!(count_distinct_patients(&ds, None), 3);
        let adverse = |rec: &Record| rec.is_adverse();
        assert_eq!(count_distinct_patients(&ds, Some(&adverse)), 2);
        let none = load("NomeVacina\nA\n");
        assert_eq!(count_distinct_patients(&none, None), 0);
    }

    #[test]
    fn counts_are_ordered() {
        let ds = load("PacienteId,NomeVacina\n1,B\n2,A\n3,C\n4,B\n5,\n6,A\n7,B\n");
        assert_eq!(
            count_by(&ds, Column::VaccineName),
            counts(&[("B", 3), ("A", 2), ("C", 1)])
        );
        assert!(count_by(&ds, Column::Status).is_empty());
        let total: usize = count_by(&ds, Column::VaccineName).iter().map(|(_, c)| c).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn describe_sample() {
        let d = describe_values([1., 2., 3., 4.]);
        assert_eq!(d.count, 4);
        assert!(approx(d.mean, 2.5));
        assert!(approx(d.std, (5f64 / 3.).sqrt()));
        assert!(approx(d.min, 1.));
        assert!(approx(d.p25, 1.75));
        assert!(approx(d.p50, 2.5));
        assert!(approx(d.p75, 3.25));
        assert!(approx(d.max, 4.));

        let single = describe_values([7.]);
        assert_eq!(single.count, 1);
        assert!(approx(single.p50, 7.));
        assert_eq!(single.std, None);

        assert_eq!(describe_values(vec![]), Description::default());
    }

    #[test]
    fn describe_columns() {
        let ds = load(
            "DataNascimento,hemoglobina\n2000-01-01,13.5\n,12\n2010-01-01,nope\n",
        );
        let age = describe(&ds, &Numeric::Age);
        assert_eq!(age.count, 2);
        assert!(age.min.unwrap() < age.max.unwrap());
        let hb = describe(&ds, &Numeric::Measurement("hemoglobina".into()));
        assert_eq!(hb.count, 2);
        assert!(approx(hb.mean, 12.75));
        let missing = describe(&ds, &Numeric::Measurement("glicose".into()));
        assert_eq!(missing, Description::default());
        assert_eq!(describe(&ds, &Numeric::Year).count, 0);
    }

    #[test]
    fn months_in_order() {
        let ds = load(
            "DataVacinacao\n2021-03-01\n2020-12-31\n2021-03-15\n2021-01-02\nbad\n",
        );
        assert_eq!(
            monthly_time_series(&ds),
            counts(&[("2020-12", 1), ("2021-01", 1), ("2021-03", 2)])
        );
        assert_eq!(
            weekday_counts(&ds),
            counts(&[("Monday", 2), ("Thursday", 1), ("Saturday", 1)])
        );
    }

    #[test]
    fn histogram() {
        let ds = load("PacienteId,DataNascimento\n1,2002-01-01\n2,2012-01-01\n3,1982-01-01\n4,\n");
        let hist = age_histogram(&ds, 2).unwrap();
        let got = hist.iter().map(|(_, c)| c).collect::<Vec<_>>();
        // ages 20, 10 and 40, so bins are [10, 25) and [25, ..)
        assert_eq!(got, vec![2, 1, 1]);

        let same = load("DataNascimento\n2002-01-01\n2002-01-01\n");
        let got = age_histogram(&same, 5)
            .unwrap()
            .iter()
            .map(|(_, c)| c)
            .collect::<Vec<_>>();
        assert_eq!(got, vec![2, 0]);

        assert!(age_histogram(&load("PacienteId\n1\n"), 3).is_none());
    }

    #[test]
    fn histogram_counts_every_row() {
        // ages 0.0, 0.6 and 0.8, plus one missing
        let mut csv = "PacienteId,DataNascimento\n".to_string();
        for (id, days) in [(1, 0), (2, 219), (3, 292)] {
            let birth = now() - chrono::Duration::days(days);
            csv.push_str(&format!("{},{}\n", id, birth.format("%Y-%m-%d")));
        }
        csv.push_str("4,\n");
        let ds = load(&csv);
        let ages: Vec<_> = ds.iter().map(|rec| rec.derived.age.clone()).collect();
        assert_eq!(
            ages,
            vec![Field::Value(0.), Field::Value(0.6), Field::Value(0.8), Field::Null]
        );
        for bins in 1..=12 {
            let hist = age_histogram(&ds, bins).unwrap();
            let total: usize = hist.iter().map(|(_, c)| c).sum();
            assert_eq!(total, ds.len(), "{} bins", bins);
        }
        let got = age_histogram(&ds, 8)
            .unwrap()
            .iter()
            .map(|(_, c)| c)
            .collect::<Vec<_>>();
        // eight bins and the missing bucket
        assert_eq!(got.len(), 9);
        assert_eq!((got[0], got[7], got[8]), (1, 1, 1));
    }

    #[test]
    fn summary() {
        let ds = load(
            "PacienteId,NomeVacina,StatusCaso,TipoManifestacao,DataVacinacao,DataNascimento\n\
             1,A,Encerrado,Adversa,2021-01-04,2000-01-01\n\
             1,A,Encerrado,Local,2021-02-01,2000-01-01\n\
             2,B,Aberto,Adversa,2021-02-03,1990-01-01\n\
             3,A,,,,\n",
        );
        let summary = Summary::compute(&ds);
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.patients, 3);
        assert_eq!(summary.adverse_events, 2);
        assert_eq!(summary.adverse_patients, 2);
        assert_eq!(summary.by_vaccine, counts(&[("A", 3), ("B", 1)]));
        assert_eq!(summary.by_status, counts(&[("Encerrado", 2), ("Aberto", 1)]));
        assert_eq!(summary.by_month, counts(&[("2021-01", 1), ("2021-02", 2)]));
        assert_eq!(summary.age.count, 3);
        assert!(summary.measurements.is_empty());
        assert!(approx(summary.adverse_rate(), 50.));

        let empty = Summary::compute(&ds.filter(|_| false));
        assert_eq!(empty.rows, 0);
        assert_eq!(empty.adverse_rate(), None);
        assert_eq!(empty.age, Description::default());
    }

    #[test]
    fn percentages() {
        assert_eq!(percentage(1, 3), "33.3%");
        assert_eq!(percentage(0, 0), "-");
    }
}
