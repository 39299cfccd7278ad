use chrono::{Datelike, NaiveDate};
use clap::Parser;
use qu::ick_use::*;
use std::path::PathBuf;
use term_data_table::{Cell, Row, Table};
use vacivida_analysis::{
    aggregate::percentage, derive_now, header, load_dataset_with_report, Column, Config, Field,
    Range, RangeSet,
};

/// Report missing and unparseable values in the configured datasets.
#[derive(Parser)]
struct Opt {
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// Datasets to check. All configured datasets if none are given.
    datasets: Vec<String>,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = match &opt.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    let names = if opt.datasets.is_empty() {
        config
            .dataset_names()
            .into_iter()
            .map(String::from)
            .collect()
    } else {
        opt.datasets.clone()
    };

    for name in names {
        let paths = config.dataset_paths(&name)?;
        let (dataset, report) = load_dataset_with_report(&paths, &config.source, &config.columns)?;
        let dataset = derive_now(&dataset);
        let rows = dataset.len();

        header(&format!("Dataset \"{}\"", name));
        println!("files: {}", report.files);
        println!("rows: {}", rows);
        println!("malformed lines skipped: {}", report.skipped);

        // Null here means empty in the source or failed to parse.
        let mut table = Table::new().with_row(
            Row::new()
                .with_cell(Cell::from("Column"))
                .with_cell(Cell::from("Missing"))
                .with_cell(Cell::from("Percentage")),
        );
        let mut add = |label: String, missing: usize| {
            table.add_row(
                Row::new()
                    .with_cell(Cell::from(label))
                    .with_cell(Cell::from(missing.to_string()))
                    .with_cell(Cell::from(percentage(missing, rows))),
            );
        };
        for column in dataset.schema().columns() {
            let missing = dataset
                .iter()
                .filter(|rec| matches!(rec.text(column), Field::Null))
                .count();
            add(column.to_string(), missing);
        }
        for m in dataset.schema().measurements() {
            let missing = dataset
                .iter()
                .filter(|rec| matches!(rec.measurement(&m.name).value, Field::Null))
                .count();
            add(m.name.to_string(), missing);
        }
        println!("{}", table);

        if !dataset.schema().has(Column::VaccinationDate) {
            continue;
        }
        let dates = dataset
            .iter()
            .filter_map(|rec| rec.vaccination_date.value())
            .map(|dt| dt.date());
        let (first, last) = match dates.clone().min().zip(dates.max()) {
            Some(range) => range,
            None => continue,
        };
        println!("vaccinations from {} to {}", first, last);

        let mut table = Table::new().with_row(
            Row::new()
                .with_cell(Cell::from("Year"))
                .with_cell(Cell::from("Count"))
                .with_cell(Cell::from("Percentage")),
        );
        let mut year_buckets = RangeSet::new(vec![]);
        for year in first.year()..=last.year() {
            let start = year_start(year)?;
            let end = if year == last.year() {
                None
            } else {
                Some(year_start(year + 1)?)
            };
            year_buckets.push(Range::new(start, end));
        }
        let bucketed = year_buckets.bucket_values_with_missing(
            dataset
                .iter()
                .map(|rec| rec.vaccination_date.value().map(|dt| dt.date())),
        );
        for (label, count) in bucketed.for_display() {
            table.add_row(
                Row::new()
                    .with_cell(Cell::from(label.to_string()))
                    .with_cell(Cell::from(count.to_string()))
                    .with_cell(Cell::from(percentage(count, rows))),
            );
        }
        println!("{}", table);
    }
    Ok(())
}

fn year_start(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| format_err!("year {} is out of range", year))
}
