//! Narrowing a dataset down to the rows matching the user's current selection.
//!
//! Every predicate is independent, and an unset predicate never excludes a row. A predicate on
//! a column that the dataset doesn't have is ignored rather than treated as an error, because
//! the columns depend on which extract was loaded.
use crate::{util, ArcStr, Bounds, Column, Dataset, Field, Record};
use chrono::NaiveDate;
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The manifestation type marking an adverse reaction.
pub const ADVERSE: &str = "Adversa";

/// Which vaccine to show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaccineChoice {
    #[default]
    All,
    Only(ArcStr),
}

impl VaccineChoice {
    /// Select box entries that mean "every vaccine".
    pub const ALL_SENTINELS: [&'static str; 3] = ["Todas", "Todos", "All"];

    /// Interpret a select box entry. Blank input and the sentinels select every vaccine.
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty()
            || Self::ALL_SENTINELS
                .iter()
                .any(|s| input.eq_ignore_ascii_case(s))
        {
            VaccineChoice::All
        } else {
            VaccineChoice::Only(input.into())
        }
    }
}

impl From<&str> for VaccineChoice {
    fn from(input: &str) -> Self {
        Self::from_input(input)
    }
}

/// The current filter inputs. The default selects every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSelection {
    pub vaccine: VaccineChoice,
    /// Case statuses to keep. Empty means any status.
    pub statuses: BTreeSet<ArcStr>,
    /// Free text patient id. Blank means any patient.
    pub patient_id: Option<String>,
    /// Vaccination dates to keep, inclusive.
    pub dates: Option<Bounds<NaiveDate>>,
    /// Ages to keep, inclusive.
    pub ages: Option<Bounds<f64>>,
    pub adverse_only: bool,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vaccine(mut self, vaccine: impl Into<VaccineChoice>) -> Self {
        self.vaccine = vaccine.into();
        self
    }

    pub fn statuses(mut self, statuses: impl IntoIterator<Item = impl Into<ArcStr>>) -> Self {
        self.statuses = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub fn patient_id(mut self, id: impl Into<String>) -> Self {
        self.patient_id = Some(id.into());
        self
    }

    pub fn dates(mut self, dates: Bounds<NaiveDate>) -> Self {
        self.dates = Some(dates);
        self
    }

    pub fn ages(mut self, ages: Bounds<f64>) -> Self {
        self.ages = Some(ages);
        self
    }

    pub fn adverse_only(mut self, adverse_only: bool) -> Self {
        self.adverse_only = adverse_only;
        self
    }

    /// `true` if no predicate is set, so `apply` returns its input.
    pub fn is_empty(&self) -> bool {
        Predicate::compile(self).is_empty()
    }
}

/// A set filter input, paired with the column it reads.
#[derive(Debug)]
enum Predicate<'a> {
    Vaccine(&'a str),
    Status(&'a BTreeSet<ArcStr>),
    Patient(ArcStr),
    Dates(Bounds<NaiveDate>),
    Ages(Bounds<f64>),
    Adverse,
}

impl<'a> Predicate<'a> {
    /// The predicates that are set, in evaluation order.
    fn compile(selection: &'a FilterSelection) -> Vec<Self> {
        let mut out = vec![];
        if let VaccineChoice::Only(name) = &selection.vaccine {
            out.push(Predicate::Vaccine(name));
        }
        if !selection.statuses.is_empty() {
            out.push(Predicate::Status(&selection.statuses));
        }
        if let Some(id) = selection.patient_id.as_deref().and_then(util::canonical_id) {
            out.push(Predicate::Patient(id));
        }
        if let Some(dates) = selection.dates.filter(|b| !b.is_unbounded()) {
            out.push(Predicate::Dates(dates));
        }
        if let Some(ages) = selection.ages.filter(|b| !b.is_unbounded()) {
            out.push(Predicate::Ages(ages));
        }
        if selection.adverse_only {
            out.push(Predicate::Adverse);
        }
        out
    }

    fn column(&self) -> Column {
        match self {
            Predicate::Vaccine(_) => Column::VaccineName,
            Predicate::Status(_) => Column::Status,
            Predicate::Patient(_) => Column::PatientId,
            Predicate::Dates(_) => Column::VaccinationDate,
            Predicate::Ages(_) => Column::Age,
            Predicate::Adverse => Column::Manifestation,
        }
    }

    /// Null cells never match.
    fn test(&self, record: &Record) -> bool {
        match self {
            Predicate::Vaccine(name) => {
                matches!(&record.vaccine_name, Field::Value(v) if &**v == *name)
            }
            Predicate::Status(set) => {
                matches!(&record.status, Field::Value(v) if set.contains(v))
            }
            Predicate::Patient(id) => matches!(&record.patient_id, Field::Value(v) if v == id),
            Predicate::Dates(dates) => {
                matches!(&record.vaccination_date, Field::Value(d) if dates.contains(&d.date()))
            }
            Predicate::Ages(ages) => matches!(&record.derived.age, Field::Value(a) if ages.contains(a)),
            Predicate::Adverse => record.is_adverse(),
        }
    }
}

/// Get the rows of `dataset` matching every set predicate of `selection`, in their original
/// order.
///
/// Predicates on columns the dataset lacks are skipped.
pub fn apply(dataset: &Dataset, selection: &FilterSelection) -> Dataset {
    let predicates: Vec<Predicate> = Predicate::compile(selection)
        .into_iter()
        .filter(|p| {
            let present = dataset.schema().has(p.column());
            if !present {
                event!(
                    Level::DEBUG,
                    "ignoring {:?} filter: the dataset has no {} column",
                    p,
                    p.column()
                );
            }
            present
        })
        .collect();
    if predicates.is_empty() {
        return dataset.clone();
    }
    dataset.filter(|record| predicates.iter().all(|p| p.test(record)))
}
