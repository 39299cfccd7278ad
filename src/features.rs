//! Columns computed from the canonical source columns.
use crate::{ArcStr, Dataset, Field, Record};
use chrono::{Datelike, Local, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

/// Derived values of one row. Each is absent when its source column is absent, and null when
/// the source cell is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Derived {
    /// Age in years at the time of derivation, to one decimal place.
    pub age: Field<f64>,
    /// `YYYY-MM` of the vaccination.
    pub month_label: Field<ArcStr>,
    pub weekday: Field<Weekday>,
    /// Day of the month, starting at 1.
    pub day: Field<u32>,
    /// Month of the year, starting at 1.
    pub month: Field<u32>,
    pub year: Field<i32>,
}

impl Derived {
    /// Compute the derived values from a row's source columns. Previously derived values are
    /// ignored.
    pub fn compute(record: &Record, now: NaiveDateTime) -> Self {
        let vaccinated = &record.vaccination_date;
        Derived {
            age: record
                .birth_date
                .as_ref()
                .map(|birth| age_in_years(*birth, now)),
            month_label: vaccinated
                .as_ref()
                .map(|d| ArcStr::from(d.format("%Y-%m").to_string())),
            weekday: vaccinated.as_ref().map(|d| d.weekday()),
            day: vaccinated.as_ref().map(|d| d.day()),
            month: vaccinated.as_ref().map(|d| d.month()),
            year: vaccinated.as_ref().map(|d| d.year()),
        }
    }
}

/// Add the derived columns to a dataset, computing ages relative to `now`.
///
/// Rows and their order are unchanged. Deriving an already derived dataset gives the same result
/// as deriving it once.
pub fn derive(dataset: &Dataset, now: NaiveDateTime) -> Dataset {
    dataset.map(dataset.schema().with_derived(), |record| Record {
        derived: Derived::compute(record, now),
        ..record.clone()
    })
}

/// [`derive`] using the local clock.
pub fn derive_now(dataset: &Dataset) -> Dataset {
    derive(dataset, Local::now().naive_local())
}

/// Whole days elapsed divided by 365.25, rounded to one decimal place.
///
/// Negative when `birth` is after `now`.
pub fn age_in_years(birth: NaiveDateTime, now: NaiveDateTime) -> f64 {
    let days = (now - birth).num_seconds().div_euclid(86_400);
    let years = days as f64 / 365.25;
    (years * 10.).round() / 10.
}

/// The English name of a weekday, as shown on the charts.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{read_bytes, Column, ColumnAliases, SourceConfig};
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn load(csv: &str) -> Dataset {
        read_bytes(
            csv.as_bytes(),
            &SourceConfig::new(',', "utf-8"),
            &ColumnAliases::default(),
        )
        .unwrap()
        .0
    }

    #[test]
    fn age_round_trip() {
        let now = at(2030, 6, 15);
        for years in [0, 1, 17, 30, 64, 99] {
            let birth = at(2030 - years, 6, 15);
            let age = age_in_years(birth, now);
            assert!((age - years as f64).abs() <= 0.1, "{} vs {}", age, years);
        }
        assert_eq!(age_in_years(at(2000, 1, 1), at(2000, 7, 2)), 0.5);
    }

    #[test]
    fn derive_columns() {
        let ds = load(
            "PacienteId,DataVacinacao,DataNascimento\n\
             1,2021-03-04 10:00:00,1990-03-04\n\
             2,garbage,\n",
        );
        let ds = derive(&ds, at(2021, 3, 4));
        for col in Column::DERIVED {
            assert!(ds.schema().has(col), "{}", col);
        }

        let first = &ds[0].derived;
        assert_eq!(first.age, Field::Value(31.0));
        assert_eq!(first.month_label, Field::Value("2021-03".into()));
        assert_eq!(first.weekday, Field::Value(Weekday::Thu));
        assert_eq!(first.day, Field::Value(4));
        assert_eq!(first.month, Field::Value(3));
        assert_eq!(first.year, Field::Value(2021));
        assert_eq!(ds[0].text(Column::Weekday).value().map(|d| &**d), Some("Thursday"));

        // unparseable dates make null values, the row itself stays
        let second = &ds[1].derived;
        assert_eq!(second.age, Field::Null);
        assert_eq!(second.month_label, Field::Null);
        assert_eq!(second.year, Field::Null);
    }

    #[test]
    fn missing_sources_disable_derivation() {
        let ds = derive(&load("PacienteId,NomeVacina\n1,A\n"), at(2021, 1, 1));
        for col in Column::DERIVED {
            assert!(!ds.schema().has(col), "{}", col);
        }
        assert_eq!(ds[0].derived, Derived::default());

        let ds = derive(&load("PacienteId,DataNascimento\n1,2000-01-01\n"), at(2021, 1, 1));
        assert!(ds.schema().has(Column::Age));
        assert!(!ds.schema().has(Column::MonthLabel));
        assert!(ds[0].derived.month_label.is_absent());
    }

    #[test]
    fn idempotent() {
        let ds = load("DataVacinacao,DataNascimento\n2021-05-01,1980-02-29\n,\n");
        let now = at(2022, 1, 1);
        let once = derive(&ds, now);
        let twice = derive(&once, now);
        assert_eq!(once, twice);
        assert_eq!(once.len(), ds.len());
    }
}
