use crate::core::table::cell_text;
use crate::domain::model::{Page, Record};
use crate::utils::error::{ClientError, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::io::Write;

/// Rows are written as plain objects, without the `data` wrapper.
#[derive(Serialize)]
struct PageOutput<'a> {
    items: Vec<&'a HashMap<String, serde_json::Value>>,
    page: usize,
    page_size: usize,
    total_items: usize,
    total_pages: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(ClientError::InvalidConfigValueError {
                field: "format".to_string(),
                value: other.to_string(),
                reason: "Valid formats: json, csv".to_string(),
            }),
        }
    }
}

/// Union of all column names on the page, sorted.
pub fn columns(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.data.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn write_page<W: Write>(page: &Page<Record>, format: OutputFormat, writer: &mut W) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = PageOutput {
                items: page.items.iter().map(|r| &r.data).collect(),
                page: page.page,
                page_size: page.page_size,
                total_items: page.total_items,
                total_pages: page.total_pages,
            };
            serde_json::to_writer_pretty(&mut *writer, &output)?;
            writeln!(writer)?;
        }
        OutputFormat::Csv => {
            let columns = columns(&page.items);
            let mut csv_writer = csv::Writer::from_writer(&mut *writer);
            csv_writer.write_record(&columns)?;
            for record in &page.items {
                csv_writer.write_record(
                    columns
                        .iter()
                        .map(|c| record.get(c).map(cell_text).unwrap_or_default()),
                )?;
            }
            csv_writer.flush()?;
        }
    }
    Ok(())
}
