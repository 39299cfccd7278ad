pub mod aggregate;
mod cache;
pub mod config;
pub mod export;
pub mod features;
pub mod filter;
mod range;
pub mod schema;
mod util;

pub use anyhow::{Context, Error};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeSet, ops::Deref, path::Path, sync::Arc};

pub use crate::{
    aggregate::{Description, Numeric, Summary},
    cache::{DatasetCache, SourceKey, DATASET_CACHE},
    config::Config,
    features::{derive, derive_now, Derived},
    filter::{FilterSelection, VaccineChoice, ADVERSE},
    range::{Bounds, Range, RangeSet, RangeSetCountsWithMissing},
    schema::{
        load_dataset, load_dataset_with_report, read_bytes, Column, ColumnAliases, Field,
        LoadReport, MeasurementAliases, Schema, SourceConfig,
    },
    util::header,
};

pub type ArcStr = Arc<str>;
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
/// Patient ids are kept in their canonical text form, see [`Field`] and [`filter`].
pub type PatientId = ArcStr;

/// A row in a vaccination or lab-exam dataset.
///
/// Which fields are present depends on the source file. A field is [`Field::Absent`] in every row
/// when its column is missing from the file, and [`Field::Null`] in the rows where its cell was
/// empty or could not be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub patient_id: Field<PatientId>,
    pub vaccine_name: Field<ArcStr>,
    pub status: Field<ArcStr>,
    /// Manifestation type. [`ADVERSE`] marks an adverse reaction.
    pub manifestation: Field<ArcStr>,
    pub vaccination_date: Field<NaiveDateTime>,
    pub birth_date: Field<NaiveDateTime>,
    /// Lab values, in the order of [`Schema::measurements`].
    pub measurements: Vec<Measurement>,
    /// Filled in by [`derive()`]. All absent until then.
    pub derived: Derived,
    /// Cells of the raw columns no alias claimed, in the order of [`Schema::passthrough`].
    pub passthrough: Vec<ArcStr>,
}

impl Record {
    /// The text form of a column, as used for grouping and select options.
    pub fn text(&self, column: Column) -> Field<Cow<'_, str>> {
        fn borrowed(field: &Field<ArcStr>) -> Field<Cow<'_, str>> {
            field.as_ref().map(|v| Cow::Borrowed(&**v))
        }
        fn owned<'a>(s: String) -> Cow<'a, str> {
            Cow::Owned(s)
        }
        match column {
            Column::PatientId => borrowed(&self.patient_id),
            Column::VaccineName => borrowed(&self.vaccine_name),
            Column::Status => borrowed(&self.status),
            Column::Manifestation => borrowed(&self.manifestation),
            Column::VaccinationDate => self
                .vaccination_date
                .as_ref()
                .map(util::format_datetime)
                .map(owned),
            Column::BirthDate => self
                .birth_date
                .as_ref()
                .map(util::format_datetime)
                .map(owned),
            Column::Age => self
                .derived
                .age
                .as_ref()
                .map(|age| format!("{:.1}", age))
                .map(owned),
            Column::MonthLabel => borrowed(&self.derived.month_label),
            Column::Weekday => self
                .derived
                .weekday
                .as_ref()
                .map(|day| Cow::Borrowed(features::weekday_name(*day))),
            Column::Day => self.derived.day.as_ref().map(|v| v.to_string()).map(owned),
            Column::Month => self.derived.month.as_ref().map(|v| v.to_string()).map(owned),
            Column::Year => self.derived.year.as_ref().map(|v| v.to_string()).map(owned),
        }
    }

    /// The value of a numeric column.
    pub fn number(&self, numeric: &Numeric) -> Field<f64> {
        match numeric {
            Numeric::Age => self.derived.age.clone(),
            Numeric::Day => self.derived.day.clone().map(f64::from),
            Numeric::Month => self.derived.month.clone().map(f64::from),
            Numeric::Year => self.derived.year.clone().map(f64::from),
            Numeric::Measurement(name) => self.measurement(name).value.clone(),
        }
    }

    /// Find a lab value by name. Absent if this dataset has no such measurement.
    pub fn measurement(&self, name: &str) -> Cow<'_, Measurement> {
        match self.measurements.iter().find(|m| &*m.name == name) {
            Some(m) => Cow::Borrowed(m),
            None => Cow::Owned(Measurement::absent(name)),
        }
    }

    /// Whether this row is an adverse reaction. `false` when the manifestation is unknown.
    pub fn is_adverse(&self) -> bool {
        matches!(&self.manifestation, Field::Value(v) if v.trim() == ADVERSE)
    }
}

/// One lab value, with the time the sample was collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: ArcStr,
    pub value: Field<f64>,
    pub collected_at: Field<NaiveDateTime>,
}

impl Measurement {
    fn absent(name: &str) -> Self {
        Measurement {
            name: name.into(),
            value: Field::Absent,
            collected_at: Field::Absent,
        }
    }
}

/// The rows of one source (or several sources with the same columns), along with their schema.
///
/// Cloning is cheap, and filtering builds a new dataset, so a loaded dataset is never modified.
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: Arc<Schema>,
    els: Arc<Vec<Record>>,
}

impl Dataset {
    pub fn new(schema: Schema, els: Vec<Record>) -> Self {
        Dataset {
            schema: Arc::new(schema),
            els: Arc::new(els),
        }
    }

    /// An empty dataset with no columns.
    pub fn empty() -> Self {
        Self::new(Schema::default(), vec![])
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Iterate over rows in this dataset.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.els.iter()
    }

    /// Get a `Dataset` containing only rows that match the filter, in their original order.
    pub fn filter(&self, f: impl Fn(&Record) -> bool) -> Self {
        Dataset {
            schema: self.schema.clone(),
            els: Arc::new(self.iter().filter(|rec| f(rec)).cloned().collect()),
        }
    }

    /// Get a dataset with a new schema and every row rewritten by `f`.
    pub(crate) fn map(&self, schema: Schema, f: impl Fn(&Record) -> Record) -> Self {
        Dataset {
            schema: Arc::new(schema),
            els: Arc::new(self.iter().map(f).collect()),
        }
    }

    /// The distinct values of a column, sorted. Empty if the column is absent.
    ///
    /// These are the options offered when choosing a vaccine or status.
    pub fn distinct_values(&self, column: Column) -> Vec<ArcStr> {
        if !self.schema.has(column) {
            return vec![];
        }
        self.iter()
            .filter_map(|rec| rec.text(column).into_value())
            .map(|v| ArcStr::from(&*v))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Write this dataset as CSV. See [`export::write_csv`].
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result {
        export::save_csv(self, path)
    }
}

impl Deref for Dataset {
    type Target = [Record];
    fn deref(&self) -> &Self::Target {
        &self.els
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.els == other.els
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type IntoIter = std::slice::Iter<'a, Record>;
    type Item = &'a Record;
    fn into_iter(self) -> Self::IntoIter {
        self.els.iter()
    }
}

/// Load the named dataset from the configuration, derive its features, and cache it in
/// [`DATASET_CACHE`].
pub fn load_configured(config: &Config, name: &str) -> Result<Dataset> {
    let paths = config.dataset_paths(name)?;
    DATASET_CACHE.configure(&config.cache);
    let key = SourceKey::new(&paths, &config.source, &config.columns);
    DATASET_CACHE.get_or_load(&key, || {
        let dataset = load_dataset(&paths, &config.source, &config.columns)?;
        Ok(derive_now(&dataset))
    })
}
