//! Bulk import of historical data from a spreadsheet exported as CSV.
//!
//! The first column holds the date, every other header is a parameter label.
//! Unknown labels become new parameters with a derived key.

use crate::catalog;
use crate::models::Parameter;
use crate::storage;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("malformed spreadsheet: {0}")]
    Csv(#[from] csv::Error),
    #[error("spreadsheet has no parameter columns")]
    NoParameterColumns,
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped_rows: usize,
    pub skipped_cells: usize,
    pub new_parameters: Vec<String>,
}

pub fn parse_sheet_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|datetime| datetime.date())
        })
}

fn parse_cell(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Spreadsheet exports in comma-decimal locales separate fields with `;`.
fn detect_delimiter(data: &[u8]) -> u8 {
    let header = data.split(|byte| *byte == b'\n').next().unwrap_or_default();
    let count = |needle: u8| header.iter().filter(|byte| **byte == needle).count();
    if count(b';') > count(b',') { b';' } else { b',' }
}

/// Imports every row inside one transaction. Rows with more fields than the
/// header are skipped whole.
pub fn import_csv(conn: &mut Connection, data: &[u8]) -> Result<ImportReport, ImportError> {
    let delimiter = detect_delimiter(data);
    debug!("importing with delimiter '{}'", delimiter as char);
    let mut sheet = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);
    let labels: Vec<String> = sheet
        .headers()?
        .iter()
        .skip(1)
        .map(|label| label.trim().to_string())
        .collect();
    if labels.is_empty() {
        return Err(ImportError::NoParameterColumns);
    }

    let tx = conn.transaction()?;
    let mut report = ImportReport::default();
    let mut by_label: HashMap<String, Parameter> = HashMap::new();

    for record in sheet.records() {
        let record = record?;
        let raw_date = record.get(0).unwrap_or_default();
        let Some(date) = parse_sheet_date(raw_date) else {
            warn!("skipping row with invalid date '{raw_date}'");
            report.skipped_rows += 1;
            continue;
        };
        if record.len() > labels.len() + 1 {
            warn!(
                "skipping row for {date}: {} fields but only {} columns",
                record.len(),
                labels.len() + 1
            );
            report.skipped_rows += 1;
            continue;
        }
        let entry = storage::get_or_create_entry(&tx, date)?;
        debug!("importing {date}");

        for (label, raw) in labels.iter().zip(record.iter().skip(1)) {
            if label.is_empty() || raw.is_empty() {
                continue;
            }
            let Some(value) = parse_cell(raw) else {
                warn!("skipping non-numeric value '{raw}' for {label} on {date}");
                report.skipped_cells += 1;
                continue;
            };

            let parameter = match by_label.get(label) {
                Some(parameter) => parameter.clone(),
                None => {
                    let parameter = match storage::find_parameter_by_label(&tx, label)? {
                        Some(parameter) => parameter,
                        None => {
                            let key = catalog::unique_key(&tx, label)?;
                            let created = storage::insert_parameter(&tx, &key, label, true)?;
                            info!("created parameter {label} (key={key})");
                            report.new_parameters.push(key);
                            created
                        }
                    };
                    by_label.insert(label.clone(), parameter.clone());
                    parameter
                }
            };

            if storage::value_exists(&tx, entry.id, parameter.id)? {
                report.updated += 1;
            } else {
                report.created += 1;
            }
            storage::upsert_value(&tx, entry.id, parameter.id, value)?;
        }
    }

    tx.commit()?;
    info!(
        "import finished: {} created, {} updated, {} rows skipped",
        report.created, report.updated, report.skipped_rows
    );
    Ok(report)
}
