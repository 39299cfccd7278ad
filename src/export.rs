//! Writing datasets as CSV, and summaries as JSON.
//!
//! Columns are written in a fixed order: source columns under their canonical names, lab values
//! (each followed by its collection time), derived columns, then the passthrough columns under
//! their original headers. Nulls are empty cells. The output reads back with the default
//! [`ColumnAliases`](crate::ColumnAliases).
use crate::{util, Column, Dataset, Record, Result, Schema, Summary};
use qu::ick_use::*;
use std::{borrow::Cow, fs, io, path::Path};

/// The header row for a dataset with this schema.
pub fn headers(schema: &Schema) -> Vec<Cow<'_, str>> {
    let mut out: Vec<Cow<str>> = Column::SOURCE
        .iter()
        .filter(|col| schema.has(**col))
        .map(|col| Cow::Borrowed(col.name()))
        .collect();
    for m in schema.measurements() {
        out.push(Cow::Borrowed(&*m.name));
        if m.collected_at {
            out.push(Cow::Owned(format!("{}_collected_at", m.name)));
        }
    }
    out.extend(
        Column::DERIVED
            .iter()
            .filter(|col| schema.has(**col))
            .map(|col| Cow::Borrowed(col.name())),
    );
    out.extend(schema.passthrough().iter().map(|h| Cow::Borrowed(&**h)));
    out
}

/// The cells of one row, matching [`headers`].
pub fn cells<'a>(record: &'a Record, schema: &Schema) -> Vec<Cow<'a, str>> {
    let text = |col: Column| record.text(col).into_value().unwrap_or(Cow::Borrowed(""));
    let mut out: Vec<Cow<str>> = Column::SOURCE
        .iter()
        .filter(|col| schema.has(**col))
        .map(|col| text(*col))
        .collect();
    for m in schema.measurements() {
        let value = record.measurement(&m.name);
        out.push(match value.value.value() {
            Some(v) => Cow::Owned(v.to_string()),
            None => Cow::Borrowed(""),
        });
        if m.collected_at {
            out.push(match value.collected_at.value() {
                Some(dt) => Cow::Owned(util::format_datetime(dt)),
                None => Cow::Borrowed(""),
            });
        }
    }
    out.extend(
        Column::DERIVED
            .iter()
            .filter(|col| schema.has(**col))
            .map(|col| text(*col)),
    );
    out.extend(record.passthrough.iter().map(|v| Cow::Borrowed(&**v)));
    out
}

/// Write a dataset as UTF-8 CSV, with a header row.
pub fn write_csv<W: io::Write>(dataset: &Dataset, out: W) -> Result {
    let mut writer = csv::Writer::from_writer(out);
    let schema = dataset.schema();
    writer.write_record(headers(schema).iter().map(|h| h.as_bytes()))?;
    for record in dataset.iter() {
        writer.write_record(cells(record, schema).iter().map(|c| c.as_bytes()))?;
    }
    writer.flush()?;
    Ok(())
}

/// The CSV for a dataset, as served for download.
pub fn to_csv_bytes(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut out = vec![];
    write_csv(dataset, &mut out)?;
    Ok(out)
}

/// Write a dataset as CSV to a file, replacing any file already there.
pub fn save_csv(dataset: &Dataset, path: impl AsRef<Path>) -> Result {
    fn inner(dataset: &Dataset, path: &Path) -> Result {
        create_parent(path)?;
        let out = io::BufWriter::new(fs::File::create(path)?);
        write_csv(dataset, out)
    }
    let path = path.as_ref();
    inner(dataset, path).with_context(|| format!("unable to save data to \"{}\"", path.display()))
}

/// Write a summary as pretty-printed JSON.
pub fn save_summary_json(summary: &Summary, path: impl AsRef<Path>) -> Result {
    fn inner(summary: &Summary, path: &Path) -> Result {
        create_parent(path)?;
        let out = io::BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer_pretty(out, summary)?;
        Ok(())
    }
    let path = path.as_ref();
    inner(summary, path)
        .with_context(|| format!("unable to save summary to \"{}\"", path.display()))
}

fn create_parent(path: &Path) -> Result {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("could not create parent")?;
    }
    if util::path_exists(path)? {
        event!(
            Level::WARN,
            "overwriting existing file at \"{}\"",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{derive, load_dataset, read_bytes, ColumnAliases, SourceConfig};
    use chrono::NaiveDate;

    const SOURCE: &str = "\
vcvd_paciente_id;vcvd_nome_vacina;DataVacinacao;DataNascimento;Hemoglobina;DataColeta;Lote
0042;Coronavac;04/03/2021 14:30:00;01/02/1990;13,5;05/03/2021;L1
7;;2021-03-05;;;;
";

    fn load() -> Dataset {
        let (ds, _) = read_bytes(
            SOURCE.as_bytes(),
            &SourceConfig::new(';', "utf-8"),
            &ColumnAliases::default(),
        )
        .unwrap();
        let now = NaiveDate::from_ymd_opt(2021, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        derive(&ds, now)
    }

    #[test]
    fn layout() {
        let text = String::from_utf8(to_csv_bytes(&load()).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "patient_id,vaccine_name,vaccination_date,birth_date,hemoglobina,\
                 hemoglobina_collected_at,age,month_label,weekday,day,month,year,Lote",
                "42,Coronavac,2021-03-04 14:30:00,1990-02-01,13.5,2021-03-05,31.3,2021-03,\
                 Thursday,4,3,2021,L1",
                "7,,2021-03-05,,,,,2021-03,Friday,5,3,2021,",
            ]
        );
    }

    #[test]
    fn reload() {
        let ds = load();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("dados_filtrados.csv");
        ds.save_csv(&path).unwrap();
        let back = load_dataset([&path], &SourceConfig::new(',', "utf-8"), &ColumnAliases::default())
            .unwrap();
        assert_eq!(back.len(), ds.len());
        for col in Column::SOURCE {
            assert_eq!(back.schema().has(col), ds.schema().has(col), "{}", col);
        }
        for (a, b) in back.iter().zip(ds.iter()) {
            assert_eq!(a.patient_id, b.patient_id);
            assert_eq!(a.vaccination_date, b.vaccination_date);
            assert_eq!(a.birth_date, b.birth_date);
            assert_eq!(a.measurements, b.measurements);
        }
        // derived columns come back as plain columns
        assert!(back.schema().passthrough().iter().any(|h| &**h == "age"));

        // writing again replaces the file
        ds.filter(|_| false).save_csv(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn summary_json() {
        let ds = load();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        save_summary_json(&Summary::compute(&ds), &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["rows"], 2);
        assert_eq!(json["by_vaccine"][0][0], "Coronavac");
        assert_eq!(json["measurements"][0][1]["count"], 1);
        assert!(json["age"]["std"].is_null());
    }
}
