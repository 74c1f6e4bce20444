use anyhow::Result;
use csv::StringRecord;
use std::path::Path;
use tracing::{debug, warn};

use crate::errors::ImportExportError;
use crate::pipeline::normalizer::ColumnMapping;
use crate::resource::Record;

fn separator_for(filename: &str) -> Result<u8> {
    let extension = Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "csv" => Ok(b','),
        "tsv" => Ok(b'\t'),
        _ => Err(ImportExportError::UnsupportedExtension(extension).into()),
    }
}

fn read_delimited(filename: &str, separator: u8) -> Result<(Vec<String>, Vec<StringRecord>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(true)
        .flexible(true)
        .from_path(Path::new(filename))?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|col_name| col_name.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ImportExportError::MissingHeader(filename.to_string()).into());
    }

    let records: Vec<StringRecord> = reader.records().collect::<Result<_, _>>()?;
    Ok((headers, records))
}

/// Pairs each cell with its column name. Short rows leave the trailing
/// columns out; cells beyond the header are dropped.
pub fn to_record(headers: &[String], row: &StringRecord) -> Record {
    headers
        .iter()
        .zip(row.iter())
        .filter(|(header, _)| !header.is_empty())
        .map(|(header, cell)| (header.clone(), cell.to_string()))
        .collect()
}

/// Loads a `.csv` or `.tsv` resource export.
pub fn load_records(filename: &str) -> Result<Vec<Record>> {
    let separator = separator_for(filename)?;
    let (headers, rows) = read_delimited(filename, separator)?;
    debug!("Loaded {} rows with headers: {:?}", rows.len(), headers);
    Ok(rows.iter().map(|row| to_record(&headers, row)).collect())
}

/// Warns when the identifier column is not present at all, which would make
/// every record malformed.
pub fn verify_headers(records: &[Record], columns: &ColumnMapping) -> Result<()> {
    let Some(first) = records.first() else {
        warn!("Resource export contains no rows");
        return Ok(());
    };
    let has_id = first.keys().any(|k| k.eq_ignore_ascii_case(&columns.id));
    if !has_id {
        return Err(ImportExportError::MissingHeader(format!(
            "identifier column '{}'",
            columns.id
        ))
        .into());
    }
    if !first.keys().any(|k| k.eq_ignore_ascii_case(&columns.type_tag)) {
        warn!(
            "No '{}' column, every resource will have type 'unknown'",
            columns.type_tag
        );
    }
    Ok(())
}
