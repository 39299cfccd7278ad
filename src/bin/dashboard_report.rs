use chrono::NaiveDate;
use clap::Parser;
use qu::ick_use::*;
use std::path::PathBuf;
use term_data_table::{Cell, Row, Table};
use vacivida_analysis::{
    aggregate::{self, counts_table},
    export, filter, header, load_configured, Bounds, Column, Config, FilterSelection, Summary,
    VaccineChoice,
};

/// Print the dashboard for a dataset, optionally filtered.
#[derive(Parser)]
struct Opt {
    /// TOML config file. Defaults and environment variables are used without one.
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// Which configured dataset to load.
    #[clap(long, short, default_value = "dose")]
    dataset: String,
    /// Only this vaccine ("Todas" for all).
    #[clap(long)]
    vaccine: Option<String>,
    /// Only these case statuses. May be given more than once.
    #[clap(long)]
    status: Vec<String>,
    #[clap(long)]
    patient_id: Option<String>,
    /// First vaccination date to include (YYYY-MM-DD).
    #[clap(long)]
    from: Option<NaiveDate>,
    /// Last vaccination date to include (YYYY-MM-DD).
    #[clap(long)]
    to: Option<NaiveDate>,
    #[clap(long)]
    min_age: Option<f64>,
    #[clap(long)]
    max_age: Option<f64>,
    /// Only adverse reactions.
    #[clap(long)]
    adverse_only: bool,
    /// Write the filtered rows as CSV, to the configured file name if no path is given.
    #[clap(long)]
    export: Option<Option<PathBuf>>,
    /// Write the summary as JSON.
    #[clap(long)]
    summary_json: Option<PathBuf>,
    /// Number of rows to preview.
    #[clap(long, default_value = "10")]
    rows: usize,
    /// Number of bins in the age histogram.
    #[clap(long, default_value = "10")]
    age_bins: usize,
}

impl Opt {
    fn selection(&self) -> FilterSelection {
        let mut selection = FilterSelection::new()
            .statuses(self.status.iter().map(|s| s.as_str()))
            .adverse_only(self.adverse_only);
        if let Some(vaccine) = &self.vaccine {
            selection = selection.vaccine(VaccineChoice::from_input(vaccine));
        }
        if let Some(id) = &self.patient_id {
            selection = selection.patient_id(id.clone());
        }
        if self.from.is_some() || self.to.is_some() {
            selection = selection.dates(Bounds {
                from: self.from,
                to: self.to,
            });
        }
        if self.min_age.is_some() || self.max_age.is_some() {
            selection = selection.ages(Bounds {
                from: self.min_age,
                to: self.max_age,
            });
        }
        selection
    }
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = match &opt.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    header(&format!("{} {}", config.app.name, config.app.version));
    println!("{}", config.app.description);

    let dataset = load_configured(&config, &opt.dataset)?;
    let vaccines = dataset.distinct_values(Column::VaccineName);
    if !vaccines.is_empty() {
        println!("vaccines: {}", vaccines.join(", "));
    }
    let statuses = dataset.distinct_values(Column::Status);
    if !statuses.is_empty() {
        println!("case statuses: {}", statuses.join(", "));
    }

    let selection = opt.selection();
    let filtered = filter::apply(&dataset, &selection);
    let summary = Summary::compute(&filtered);

    header("Overview");
    println!("rows: {} of {}", summary.rows, dataset.len());
    println!("distinct patients: {}", summary.patients);
    match summary.adverse_rate() {
        Some(rate) => println!(
            "adverse events: {} ({:.1}% of rows, {} patients)",
            summary.adverse_events, rate, summary.adverse_patients
        ),
        None => println!("adverse events: 0"),
    }

    for (title, label, counts) in [
        ("Vaccines", "Vaccine", &summary.by_vaccine),
        ("Case status", "Status", &summary.by_status),
        ("Manifestations", "Manifestation", &summary.by_manifestation),
        ("Vaccinations by month", "Month", &summary.by_month),
        ("Vaccinations by weekday", "Weekday", &summary.by_weekday),
    ] {
        if !counts.is_empty() {
            header(title);
            println!("{}", counts_table(label, counts, summary.rows));
        }
    }

    if let Some(hist) = aggregate::age_histogram(&filtered, opt.age_bins) {
        header("Ages");
        println!("{}", summary.age.table());
        let mut table = Table::new().with_row(
            Row::new()
                .with_cell(Cell::from("Age range"))
                .with_cell(Cell::from("Count"))
                .with_cell(Cell::from("Percentage")),
        );
        for (label, count) in hist.for_display() {
            table.add_row(
                Row::new()
                    .with_cell(Cell::from(label.to_string()))
                    .with_cell(Cell::from(count.to_string()))
                    .with_cell(Cell::from(aggregate::percentage(count, summary.rows))),
            );
        }
        println!("{}", table);
    }

    for (name, description) in &summary.measurements {
        header(name);
        println!("{}", description.table());
    }

    if opt.rows > 0 && !filtered.is_empty() {
        header("First rows");
        let schema = filtered.schema();
        let head = export::headers(schema)
            .into_iter()
            .fold(Row::new(), |row, name| row.with_cell(Cell::from(name.to_string())));
        let mut table = Table::new().with_row(head);
        for record in filtered.iter().take(opt.rows) {
            table.add_row(
                export::cells(record, schema)
                    .into_iter()
                    .fold(Row::new(), |row, cell| row.with_cell(Cell::from(cell.to_string()))),
            );
        }
        println!("{}", table);
    }

    if let Some(path) = &opt.export {
        let path = path
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.export.file_name));
        filtered.save_csv(&path)?;
        event!(Level::INFO, "wrote {} rows to \"{}\"", filtered.len(), path.display());
    }
    if let Some(path) = &opt.summary_json {
        export::save_summary_json(&summary, path)?;
    }
    Ok(())
}
