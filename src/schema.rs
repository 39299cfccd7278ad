//! Mapping the columns of variant source files onto the canonical record shape.
//!
//! The extracts this crate reads come from several systems that name the same column
//! differently (`NomeVacina` in one, `vcvd_nome_vacina` in another), use different delimiters
//! and different text encodings. [`SourceConfig`] describes how to read the bytes, and
//! [`ColumnAliases`] says which raw headers mean which canonical [`Column`].
use crate::{util, ArcStr, Dataset, Derived, Measurement, Record, Result};
use encoding_rs::Encoding;
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, fs, path::Path};

/// A semantic column. The first six are read from the source, the rest are computed by
/// [`derive`](crate::derive()).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    PatientId,
    VaccineName,
    Status,
    Manifestation,
    VaccinationDate,
    BirthDate,
    Age,
    MonthLabel,
    Weekday,
    Day,
    Month,
    Year,
}

impl Column {
    /// Columns read from the source, in export order.
    pub const SOURCE: [Column; 6] = [
        Column::PatientId,
        Column::VaccineName,
        Column::Status,
        Column::Manifestation,
        Column::VaccinationDate,
        Column::BirthDate,
    ];

    /// Columns computed from the source columns, in export order.
    pub const DERIVED: [Column; 6] = [
        Column::Age,
        Column::MonthLabel,
        Column::Weekday,
        Column::Day,
        Column::Month,
        Column::Year,
    ];

    /// The canonical (and export) name of this column.
    pub fn name(self) -> &'static str {
        match self {
            Column::PatientId => "patient_id",
            Column::VaccineName => "vaccine_name",
            Column::Status => "status",
            Column::Manifestation => "manifestation",
            Column::VaccinationDate => "vaccination_date",
            Column::BirthDate => "birth_date",
            Column::Age => "age",
            Column::MonthLabel => "month_label",
            Column::Weekday => "weekday",
            Column::Day => "day",
            Column::Month => "month",
            Column::Year => "year",
        }
    }

    pub fn is_derived(self) -> bool {
        Column::DERIVED.contains(&self)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The value of a semantic column in one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Field<T> {
    /// The dataset has no such column.
    Absent,
    /// The column exists, but the cell is empty or could not be parsed.
    Null,
    Value(T),
}

impl<T> Field<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn as_ref(&self) -> Field<&T> {
        match self {
            Field::Absent => Field::Absent,
            Field::Null => Field::Null,
            Field::Value(v) => Field::Value(v),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Absent => Field::Absent,
            Field::Null => Field::Null,
            Field::Value(v) => Field::Value(f(v)),
        }
    }

    /// Like `map`, but a `None` from `f` makes the value null.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Option<U>) -> Field<U> {
        match self {
            Field::Absent => Field::Absent,
            Field::Null => Field::Null,
            Field::Value(v) => match f(v) {
                Some(v) => Field::Value(v),
                None => Field::Null,
            },
        }
    }
}

// Manual impl so `T` doesn't need to be `Default`.
impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

/// A lab value column found in a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementColumn {
    pub name: ArcStr,
    /// Whether the source also had a collection time for this value.
    pub collected_at: bool,
}

/// Which columns a dataset has.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: BTreeSet<Column>,
    measurements: Vec<MeasurementColumn>,
    passthrough: Vec<ArcStr>,
}

impl Schema {
    pub fn has(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Present columns, source columns first.
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }

    pub fn measurements(&self) -> &[MeasurementColumn] {
        &self.measurements
    }

    pub fn has_measurement(&self, name: &str) -> bool {
        self.measurements.iter().any(|m| &*m.name == name)
    }

    /// Headers of the raw columns that are carried through unchanged.
    pub fn passthrough(&self) -> &[ArcStr] {
        &self.passthrough
    }

    /// This schema with the derived columns set to exactly those that `derive` can compute.
    pub(crate) fn with_derived(&self) -> Schema {
        let mut columns: BTreeSet<Column> = self
            .columns
            .iter()
            .copied()
            .filter(|col| !col.is_derived())
            .collect();
        if columns.contains(&Column::BirthDate) {
            columns.insert(Column::Age);
        }
        if columns.contains(&Column::VaccinationDate) {
            columns.extend([
                Column::MonthLabel,
                Column::Weekday,
                Column::Day,
                Column::Month,
                Column::Year,
            ]);
        }
        Schema {
            columns,
            measurements: self.measurements.clone(),
            passthrough: self.passthrough.clone(),
        }
    }
}

/// How to read the bytes of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Field delimiter. Must be a single ascii character.
    pub delimiter: char,
    /// A WHATWG encoding label, e.g. `utf-8`, `latin1` or `iso-8859-1`.
    pub encoding: String,
    /// Trim whitespace around headers and cells.
    pub trim: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            delimiter: ',',
            encoding: "latin1".into(),
            trim: true,
        }
    }
}

impl SourceConfig {
    pub fn new(delimiter: char, encoding: impl Into<String>) -> Self {
        SourceConfig {
            delimiter,
            encoding: encoding.into(),
            ..Default::default()
        }
    }

    pub fn encoding(&self) -> Result<&'static Encoding> {
        Encoding::for_label(self.encoding.trim().as_bytes())
            .with_context(|| format!("unknown text encoding \"{}\"", self.encoding))
    }

    pub fn delimiter(&self) -> Result<u8> {
        ensure!(
            self.delimiter.is_ascii(),
            "the delimiter must be a single ascii character, found {:?}",
            self.delimiter
        );
        Ok(self.delimiter as u8)
    }
}

/// The raw headers that may hold a lab value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasurementAliases {
    /// The canonical name of the measurement, also used as its export header.
    pub name: String,
    pub value: Vec<String>,
    #[serde(default)]
    pub collected_at: Vec<String>,
}

/// For each canonical column, the raw headers that hold it.
///
/// Headers match aliases ignoring case and surrounding whitespace. When several raw headers
/// match, the leftmost wins, and a raw header is only ever claimed once, except for collection
/// times which several lab values may share.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub patient_id: Vec<String>,
    pub vaccine_name: Vec<String>,
    pub status: Vec<String>,
    pub manifestation: Vec<String>,
    pub vaccination_date: Vec<String>,
    pub birth_date: Vec<String>,
    pub measurements: Vec<MeasurementAliases>,
}

impl Default for ColumnAliases {
    /// Covers both known extract layouts, and the names this crate exports with.
    fn default() -> Self {
        fn names(names: &[&str]) -> Vec<String> {
            names.iter().map(|s| s.to_string()).collect()
        }
        let measurement = |name: &str, raw: &[&str]| {
            let mut value = names(raw);
            value.push(name.to_string());
            let mut collected_at = names(&["DataColeta", "vcvd_data_coleta"]);
            collected_at.push(format!("{}_collected_at", name));
            MeasurementAliases {
                name: name.to_string(),
                value,
                collected_at,
            }
        };
        ColumnAliases {
            patient_id: names(&["PacienteId", "vcvd_paciente_id", "patient_id"]),
            vaccine_name: names(&["NomeVacina", "vcvd_nome_vacina", "vaccine_name"]),
            status: names(&["StatusCaso", "vcvd_status_caso", "status"]),
            manifestation: names(&[
                "TipoManifestacao",
                "vcvd_tipo_manifestacao",
                "manifestation",
            ]),
            vaccination_date: names(&[
                "DataVacinacao",
                "vcvd_data_vacinacao",
                "vaccination_date",
            ]),
            birth_date: names(&["DataNascimento", "vcvd_data_nascimento", "birth_date"]),
            measurements: vec![
                measurement("hemoglobina", &["Hemoglobina", "vcvd_hemoglobina"]),
                measurement("leucocitos", &["Leucocitos", "vcvd_leucocitos"]),
                measurement("plaquetas", &["Plaquetas", "vcvd_plaquetas"]),
                measurement("glicose", &["Glicose", "vcvd_glicose"]),
                measurement("creatinina", &["Creatinina", "vcvd_creatinina"]),
            ],
        }
    }
}

impl ColumnAliases {
    /// The aliases for a source column. Derived columns have none.
    pub fn aliases(&self, column: Column) -> &[String] {
        match column {
            Column::PatientId => &self.patient_id,
            Column::VaccineName => &self.vaccine_name,
            Column::Status => &self.status,
            Column::Manifestation => &self.manifestation,
            Column::VaccinationDate => &self.vaccination_date,
            Column::BirthDate => &self.birth_date,
            _ => &[],
        }
    }

    /// Work out where each canonical column is in a row with the given headers.
    fn resolve(&self, headers: &[ArcStr]) -> HeaderMap {
        let mut claims = Claims {
            headers,
            state: vec![Claim::Free; headers.len()],
        };
        let source = Column::SOURCE.map(|col| claims.take(self.aliases(col)));
        let measurements = self
            .measurements
            .iter()
            .filter_map(|m| {
                let value = claims.take(&m.value)?;
                let collected_at = claims.share(&m.collected_at);
                Some((ArcStr::from(m.name.as_str()), value, collected_at))
            })
            .collect();
        let passthrough = (0..headers.len())
            .filter(|idx| matches!(claims.state[*idx], Claim::Free))
            .collect();
        HeaderMap {
            source,
            measurements,
            passthrough,
        }
    }
}

#[derive(Copy, Clone)]
enum Claim {
    Free,
    Taken,
    /// A collection time, which several lab values may use.
    Shared,
}

/// Tracks which raw headers already have a meaning.
struct Claims<'a> {
    headers: &'a [ArcStr],
    state: Vec<Claim>,
}

impl Claims<'_> {
    fn find(&self, aliases: &[String], available: impl Fn(Claim) -> bool) -> Option<usize> {
        self.headers.iter().enumerate().position(|(idx, header)| {
            available(self.state[idx])
                && aliases
                    .iter()
                    .any(|alias| header.trim().eq_ignore_ascii_case(alias.trim()))
        })
    }

    fn take(&mut self, aliases: &[String]) -> Option<usize> {
        let idx = self.find(aliases, |claim| matches!(claim, Claim::Free))?;
        self.state[idx] = Claim::Taken;
        Some(idx)
    }

    fn share(&mut self, aliases: &[String]) -> Option<usize> {
        let idx = self.find(aliases, |claim| !matches!(claim, Claim::Taken))?;
        self.state[idx] = Claim::Shared;
        Some(idx)
    }
}

/// Column positions for one source, computed from its headers.
struct HeaderMap {
    /// Indexed like `Column::SOURCE`.
    source: [Option<usize>; 6],
    measurements: Vec<(ArcStr, usize, Option<usize>)>,
    passthrough: Vec<usize>,
}

impl HeaderMap {
    fn schema(&self, headers: &[ArcStr]) -> Schema {
        let columns = Column::SOURCE
            .iter()
            .zip(self.source.iter())
            .filter(|(_, idx)| idx.is_some())
            .map(|(col, _)| *col)
            .collect();
        let measurements = self
            .measurements
            .iter()
            .map(|(name, _, collected_at)| MeasurementColumn {
                name: name.clone(),
                collected_at: collected_at.is_some(),
            })
            .collect();
        let passthrough = self
            .passthrough
            .iter()
            .map(|idx| headers[*idx].clone())
            .collect();
        Schema {
            columns,
            measurements,
            passthrough,
        }
    }

    fn record(&self, row: &[ArcStr]) -> Record {
        let cell = |idx: Option<usize>| match idx {
            None => Field::Absent,
            Some(idx) => match row.get(idx) {
                Some(v) if !util::is_null(v) => Field::Value(v),
                _ => Field::Null,
            },
        };
        let [patient_id, vaccine_name, status, manifestation, vaccination_date, birth_date] =
            self.source;
        Record {
            patient_id: cell(patient_id).and_then(|v| util::canonical_id(v)),
            vaccine_name: cell(vaccine_name).map(Clone::clone),
            status: cell(status).map(Clone::clone),
            manifestation: cell(manifestation).map(Clone::clone),
            vaccination_date: cell(vaccination_date).and_then(|v| util::parse_datetime(v)),
            birth_date: cell(birth_date).and_then(|v| util::parse_datetime(v)),
            measurements: self
                .measurements
                .iter()
                .map(|(name, value, collected_at)| Measurement {
                    name: name.clone(),
                    value: cell(Some(*value)).and_then(|v| util::parse_number(v)),
                    collected_at: cell(*collected_at).and_then(|v| util::parse_datetime(v)),
                })
                .collect(),
            derived: Derived::default(),
            passthrough: self
                .passthrough
                .iter()
                .map(|idx| row.get(*idx).cloned().unwrap_or_else(|| "".into()))
                .collect(),
        }
    }
}

/// What happened while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub files: usize,
    /// Rows kept.
    pub rows: usize,
    /// Lines dropped because they could not be split into the header's columns.
    pub skipped: usize,
}

/// Decoded rows of one source, before any column is interpreted.
struct RawTable {
    headers: Vec<ArcStr>,
    rows: Vec<Vec<ArcStr>>,
    skipped: usize,
}

impl RawTable {
    /// Lines with more fields than the header are skipped. Short lines are padded with empty
    /// cells.
    fn parse(text: &str, delimiter: u8, trim: bool) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(delimiter)
            .trim(if trim { csv::Trim::All } else { csv::Trim::None })
            .from_reader(text.as_bytes());
        let headers: Vec<ArcStr> = reader
            .headers()
            .context("reading the header line")?
            .iter()
            .map(ArcStr::from)
            .collect();

        let mut rows = vec![];
        let mut skipped = 0;
        for record in reader.records() {
            match record {
                Ok(record) if record.len() <= headers.len() => {
                    let mut row: Vec<ArcStr> = record.iter().map(ArcStr::from).collect();
                    row.resize(headers.len(), "".into());
                    rows.push(row);
                }
                Ok(_) | Err(_) => skipped += 1,
            }
        }
        Ok(RawTable {
            headers,
            rows,
            skipped,
        })
    }
}

/// Decode and adapt one source held in memory.
///
/// This is what [`load_dataset`] does for each file.
pub fn read_bytes(
    bytes: &[u8],
    source: &SourceConfig,
    aliases: &ColumnAliases,
) -> Result<(Dataset, LoadReport)> {
    let encoding = source.encoding()?;
    let delimiter = source.delimiter()?;
    // `decode` also strips a byte order mark.
    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        event!(
            Level::WARN,
            "input is not valid {}, invalid sequences were replaced",
            actual.name()
        );
    }
    let table = RawTable::parse(&text, delimiter, source.trim)?;
    let map = aliases.resolve(&table.headers);
    let schema = map.schema(&table.headers);
    let els: Vec<Record> = table.rows.iter().map(|row| map.record(row)).collect();
    let report = LoadReport {
        files: 1,
        rows: els.len(),
        skipped: table.skipped,
    };
    Ok((Dataset::new(schema, els), report))
}

/// Load and concatenate source files.
///
/// Malformed lines are skipped (and counted in the report). A file that cannot be read at all is
/// an error, as is a file whose columns differ from the first file's.
pub fn load_dataset_with_report<P: AsRef<Path>>(
    paths: impl IntoIterator<Item = P>,
    source: &SourceConfig,
    aliases: &ColumnAliases,
) -> Result<(Dataset, LoadReport)> {
    fn inner(
        path: &Path,
        source: &SourceConfig,
        aliases: &ColumnAliases,
    ) -> Result<(Dataset, LoadReport)> {
        let bytes = fs::read(path)?;
        read_bytes(&bytes, source, aliases)
    }

    let mut schema = None;
    let mut els = vec![];
    let mut report = LoadReport::default();
    for path in paths {
        let path = path.as_ref();
        let (dataset, file_report) = inner(path, source, aliases)
            .with_context(|| format!("unable to load data from \"{}\"", path.display()))?;
        if file_report.skipped > 0 {
            event!(
                Level::WARN,
                "skipped {} malformed lines in \"{}\"",
                file_report.skipped,
                path.display()
            );
        }
        let first = schema.get_or_insert_with(|| dataset.schema().clone());
        ensure!(
            *first == *dataset.schema(),
            "the columns of \"{}\" differ from the columns of the first file",
            path.display()
        );
        els.extend(dataset.iter().cloned());
        report.files += 1;
        report.rows += file_report.rows;
        report.skipped += file_report.skipped;
    }
    event!(
        Level::INFO,
        "loaded {} rows from {} files ({} lines skipped)",
        report.rows,
        report.files,
        report.skipped
    );
    Ok((Dataset::new(schema.unwrap_or_default(), els), report))
}

/// Load and concatenate source files. See [`load_dataset_with_report`].
pub fn load_dataset<P: AsRef<Path>>(
    paths: impl IntoIterator<Item = P>,
    source: &SourceConfig,
    aliases: &ColumnAliases,
) -> Result<Dataset> {
    load_dataset_with_report(paths, source, aliases).map(|(dataset, _)| dataset)
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn utf8() -> SourceConfig {
        SourceConfig::new(',', "utf-8")
    }

    #[test]
    fn aliases_for_both_layouts() {
        let aliases = ColumnAliases::default();
        let (old, _) = read_bytes(
            b"PacienteId,NomeVacina,StatusCaso,DataVacinacao\n1,Coronavac,Encerrado,2021-03-04\n",
            &utf8(),
            &aliases,
        )
        .unwrap();
        let (new, _) = read_bytes(
            b"vcvd_paciente_id;vcvd_nome_vacina;vcvd_status_caso;vcvd_data_vacinacao\n\
              1;Coronavac;Encerrado;04/03/2021\n",
            &SourceConfig::new(';', "utf-8"),
            &aliases,
        )
        .unwrap();
        assert_eq!(old, new);
        assert!(old.schema().has(Column::VaccineName));
        assert!(!old.schema().has(Column::BirthDate));
        assert!(old[0].birth_date.is_absent());
        assert_eq!(
            old[0].vaccination_date.value().map(|d| d.date()),
            NaiveDate::from_ymd_opt(2021, 3, 4)
        );
    }

    #[test]
    fn headers_match_loosely_and_once() {
        let aliases = ColumnAliases::default();
        let (ds, _) = read_bytes(
            b" nomevacina ,NomeVacina,Lote\nA,B,123\n",
            &utf8(),
            &aliases,
        )
        .unwrap();
        assert_eq!(ds[0].vaccine_name, Field::Value("A".into()));
        // the second vaccine column is not claimed, so it is carried through
        assert_eq!(
            ds.schema().passthrough().to_vec(),
            vec![ArcStr::from("NomeVacina"), ArcStr::from("Lote")]
        );
        assert_eq!(ds[0].passthrough, vec![ArcStr::from("B"), "123".into()]);
    }

    #[test]
    fn bad_lines_skipped() {
        let (ds, report) = read_bytes(
            b"PacienteId,NomeVacina\n1,A\n2,B,extra\n3\n4,D\n",
            &utf8(),
            &ColumnAliases::default(),
        )
        .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.rows, 3);
        let ids: Vec<_> = ds.iter().map(|r| r.patient_id.clone()).collect();
        assert_eq!(
            ids,
            vec![
                Field::Value("1".into()),
                Field::Value("3".into()),
                Field::Value("4".into())
            ]
        );
        assert_eq!(ds[1].vaccine_name, Field::Null);
    }

    #[test]
    fn null_and_malformed_cells() {
        let (ds, _) = read_bytes(
            b"PacienteId,DataNascimento,Hemoglobina\n,null,abc\n7.0,1990-13-45,13,5\n",
            &SourceConfig::new(',', "utf-8"),
            &ColumnAliases::default(),
        )
        .unwrap();
        // the second data line has one field too many because of the decimal comma
        assert_eq!(ds.len(), 1);
        assert_eq!(ds[0].patient_id, Field::Null);
        assert_eq!(ds[0].birth_date, Field::Null);
        assert_eq!(ds[0].measurements[0].value, Field::Null);
        assert_eq!(ds[0].measurements[0].collected_at, Field::Absent);
    }

    #[test]
    fn latin1() {
        // "Manifestação" and "Adversa" encoded in latin-1
        let mut bytes = b"TipoManifesta\xe7\xe3o,TipoManifestacao\nx,Adversa\n".to_vec();
        bytes.extend_from_slice(b"\xe7,Local\n");
        let (ds, _) = read_bytes(&bytes, &SourceConfig::default(), &ColumnAliases::default())
            .unwrap();
        assert_eq!(&*ds.schema().passthrough()[0], "TipoManifestação");
        assert_eq!(&*ds[1].passthrough[0], "ç");
        assert!(ds[0].is_adverse());
    }

    #[test]
    fn unknown_encoding() {
        let err = read_bytes(b"a\n1\n", &SourceConfig::new(',', "klingon"), &ColumnAliases::default())
            .unwrap_err();
        assert!(err.to_string().contains("klingon"));
    }

    #[test]
    fn load_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.csv");
        let other = dir.path().join("c.csv");
        writeln!(fs::File::create(&first).unwrap(), "PacienteId,NomeVacina\n1,A\n2,B").unwrap();
        writeln!(fs::File::create(&second).unwrap(), "NomeVacina,PacienteId\nC,3\nbad,4,line").unwrap();
        writeln!(fs::File::create(&other).unwrap(), "PacienteId,StatusCaso\n1,x").unwrap();

        let (ds, report) =
            load_dataset_with_report([&first, &second], &utf8(), &ColumnAliases::default()).unwrap();
        assert_eq!(report, LoadReport { files: 2, rows: 3, skipped: 1 });
        assert_eq!(ds[2].vaccine_name, Field::Value("C".into()));

        assert!(load_dataset([&first, &other], &utf8(), &ColumnAliases::default()).is_err());
        let missing = dir.path().join("missing.csv");
        let err = load_dataset([&missing], &utf8(), &ColumnAliases::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("missing.csv"));
    }

    #[test]
    fn measurements() {
        let (ds, _) = read_bytes(
            b"PacienteId;Hemoglobina;DataColeta;Glicose\n1;13,5;2021-05-01 08:30:00;90\n",
            &SourceConfig::new(';', "utf-8"),
            &ColumnAliases::default(),
        )
        .unwrap();
        let names: Vec<_> = ds.schema().measurements().iter().map(|m| &*m.name).collect();
        assert_eq!(names, vec!["hemoglobina", "glicose"]);
        // both values were collected at the time in the shared column
        assert!(ds.schema().measurements().iter().all(|m| m.collected_at));
        assert_eq!(
            ds[0].measurement("glicose").collected_at,
            ds[0].measurement("hemoglobina").collected_at
        );
        assert!(!ds[0].measurement("glicose").collected_at.is_absent());
        assert_eq!(ds[0].measurement("hemoglobina").value, Field::Value(13.5));
        assert_eq!(ds[0].measurement("glicose").value, Field::Value(90.));
        assert!(ds[0].measurement("plaquetas").value.is_absent());
    }
}
