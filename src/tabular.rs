use std::fs::{self, File};
use std::path::Path;
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::domain::AdminError;
use crate::record::Record;

#[derive(Debug, PartialEq)]
enum FileType {
    Csv,
    Parquet,
    Arrow,
}

fn detect_file_type(path: &Path) -> Result<FileType, AdminError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::Csv),
        Some("PARQUET") | Some("PQ") => Ok(FileType::Parquet),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::Arrow),
        _ => Err(AdminError::UnknownFileType),
    }
}

fn scan(path: &Path) -> Result<LazyFrame, AdminError> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(AdminError::Validation(format!("{} is not a file", path.display())));
    }
    let frame = match detect_file_type(path)? {
        // Every CSV column is read as text, numbers are recognized in load_column.
        FileType::Csv => LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?,
        FileType::Parquet => {
            LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())?
        }
        FileType::Arrow => LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )?,
    };
    Ok(frame)
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

struct LoadedColumn {
    name: String,
    numeric: bool,
    values: Vec<Option<String>>,
}

/// Text that reads back the same after a trip through a JSON number.
///
/// Phone numbers, zip codes and ISBNs with a leading zero or `+` stay text.
fn is_plain_number(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int_part, fraction) = match digits.split_once('.') {
        Some((int_part, fraction)) => (int_part, Some(fraction)),
        None => (digits, None),
    };
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if int_part.is_empty() || !all_digits(int_part) || (int_part.len() > 1 && int_part.starts_with('0')) {
        return false;
    }
    match fraction {
        Some(fraction) => all_digits(fraction) && s.parse::<f64>().is_ok_and(|x| x.is_finite()),
        None => s.parse::<i64>().is_ok(),
    }
}

fn load_column(df: &DataFrame, name: &str) -> Result<LoadedColumn, PolarsError> {
    let column = df.column(name)?;
    let typed_number = is_numeric_type(column.dtype());
    let text_column = column.dtype() == &DataType::String;
    let as_text = column.cast(&DataType::String)?;
    let values: Vec<Option<String>> = as_text
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    let numeric = typed_number
        || (text_column
            && values.iter().any(Option::is_some)
            && values.iter().flatten().all(|v| is_plain_number(v)));
    Ok(LoadedColumn {
        name: name.to_string(),
        numeric,
        values,
    })
}

fn to_json(text: String, numeric: bool) -> Value {
    if numeric {
        if let Ok(i) = text.parse::<i64>() {
            return Value::from(i);
        }
        if let Some(n) = text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(text)
}

/// Read records from a CSV, Parquet or Arrow IPC file.
///
/// An `id` or `_id` column provides the record ids, otherwise fresh ids are
/// generated. Null cells are left out of the record.
pub fn import(path: &Path) -> Result<Vec<Record>, AdminError> {
    let start_time = Instant::now();
    let df = scan(path)?.collect()?;

    // Columns are converted in parallel, one per task.
    let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
    let columns = names
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect::<Result<Vec<LoadedColumn>, PolarsError>>()?;

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let mut fields = Map::new();
        for column in columns.iter() {
            if let Some(Some(text)) = column.values.get(row) {
                fields.insert(column.name.clone(), to_json(text.clone(), column.numeric));
            }
        }
        records.push(Record::from_value_or_new_id(Value::Object(fields))?);
    }
    info!(
        "Imported {} records from {} in {}ms",
        records.len(),
        path.display(),
        start_time.elapsed().as_millis()
    );
    Ok(records)
}

/// Write records as CSV, one column per field name seen in any record.
pub fn export_csv(records: &[Record], path: &Path) -> Result<(), AdminError> {
    let mut names: Vec<String> = vec!["id".to_string()];
    for record in records {
        for name in record.fields.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }

    let columns: Vec<Column> = names
        .iter()
        .map(|name| {
            let values: Vec<Option<String>> = records
                .iter()
                .map(|r| {
                    let text = r.text(name);
                    if text.is_empty() { None } else { Some(text) }
                })
                .collect();
            Column::new(name.as_str().into(), values)
        })
        .collect();

    let mut df = DataFrame::new(columns)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    debug!("Exported {} records to {}", records.len(), path.display());
    Ok(())
}
