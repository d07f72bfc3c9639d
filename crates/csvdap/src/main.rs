use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use csvdap_core::{CsvDapError, CsvDataset, DialectOptions, Range, Row, SequenceQuery};
use tracing::{Level, debug};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Query(#[from] CsvDapError),

    #[error("Failed to write csv output: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write json output: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Delimiter must be a single ascii character, got '{0}'")]
    Delimiter(char),
}

type Result<T, E = CliError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Aligned text table.
    Table,
    /// Csv with a header row.
    Csv,
    /// One json array per row.
    Json,
}

#[derive(Parser)]
#[clap(name = "csvdap")]
struct Arguments {
    /// Csv file to query.
    path: PathBuf,

    /// Constraint expression, e.g. `sequence.site&sequence.index>10`.
    #[clap(long)]
    ce: Option<String>,

    /// Columns to emit, comma separated.
    #[clap(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Selection expression. Repeat to AND several together.
    #[clap(long = "filter")]
    filters: Vec<String>,

    /// Row range as `start:stop:step`. Negative bounds count from the end.
    #[clap(long, allow_hyphen_values = true)]
    slice: Option<Range>,

    /// Output format.
    #[clap(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Print the dataset name, modification time and column kinds, then exit.
    #[clap(long)]
    info: bool,

    /// Field delimiter.
    #[clap(long, env = "CSVDAP_DELIMITER", default_value_t = ',')]
    delimiter: char,

    /// Log output format.
    #[clap(long, env = "CSVDAP_LOG_FORMAT", default_value_t = logutil::LogFormat::HumanReadable)]
    log_format: logutil::LogFormat,

    /// Default log level. `RUST_LOG` takes precedence.
    #[clap(long, default_value_t = Level::WARN)]
    log_level: Level,
}

fn main() {
    let args = Arguments::parse();
    logutil::configure_global_logger(args.log_level, args.log_format, io::stderr);

    if let Err(err) = run(args) {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}

fn run(args: Arguments) -> Result<()> {
    if !args.delimiter.is_ascii() {
        return Err(CliError::Delimiter(args.delimiter));
    }
    let dialect = DialectOptions {
        delimiter: args.delimiter as u8,
        ..Default::default()
    };

    let dataset = CsvDataset::open_with_dialect(&args.path, dialect)?;
    let mut stdout = BufWriter::new(io::stdout().lock());

    if args.info {
        write_info(&dataset, &mut stdout)?;
        stdout.flush()?;
        return Ok(());
    }

    let query = build_query(&dataset, &args)?;
    debug!(
        columns = ?query.columns(),
        selection = ?query.selection(),
        range = %query.range(),
        "running query"
    );

    match args.format {
        OutputFormat::Table => write_table(&query, &mut stdout)?,
        OutputFormat::Csv => write_csv(&query, &mut stdout)?,
        OutputFormat::Json => write_json(&query, &mut stdout)?,
    }
    stdout.flush()?;

    Ok(())
}

/// Constraint expression first, then the individual flags on top of it.
fn build_query(dataset: &CsvDataset, args: &Arguments) -> Result<SequenceQuery> {
    let mut query = match &args.ce {
        Some(ce) => dataset.query(ce)?,
        None => dataset.sequence().clone(),
    };
    if !args.columns.is_empty() {
        query = query.select_columns(&args.columns)?;
    }
    for filter in &args.filters {
        query = query.filter(filter.as_str())?;
    }
    if let Some(range) = args.slice {
        query = query.restrict(range)?;
    }
    Ok(query)
}

fn write_info(dataset: &CsvDataset, out: &mut impl Write) -> Result<()> {
    writeln!(out, "dataset: {}", dataset.name())?;
    writeln!(out, "last-modified: {}", dataset.last_modified_http()?)?;
    writeln!(out, "columns:")?;
    for column in dataset.children()? {
        let kind = match column.kind()? {
            Some(kind) => kind.to_string(),
            None => "unknown".to_string(),
        };
        writeln!(out, "  {}: {kind}", column.name())?;
    }
    Ok(())
}

fn write_csv(query: &SequenceQuery, out: &mut impl Write) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(query.columns())?;
    for row in query.execute()? {
        writer.write_record(row?.iter().map(|v| v.as_text().into_owned()))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json(query: &SequenceQuery, out: &mut impl Write) -> Result<()> {
    for row in query.execute()? {
        serde_json::to_writer(&mut *out, &row?)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Left aligned columns separated by two spaces.
///
/// Rows are buffered to size the columns.
fn write_table(query: &SequenceQuery, out: &mut impl Write) -> Result<()> {
    let rows = query.execute()?.collect::<Result<Vec<Row>, _>>()?;
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();

    let mut widths: Vec<usize> = query.columns().iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_table_line(out, query.columns(), &widths)?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_table_line(out, &rule, &widths)?;
    for row in &cells {
        write_table_line(out, row, &widths)?;
    }
    Ok(())
}

fn write_table_line(out: &mut impl Write, cells: &[String], widths: &[usize]) -> Result<()> {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(out, "{}", line.trim_end())?;
    Ok(())
}
