//! Client-side filter, sort and pagination over dashboard records.

use crate::domain::model::{Page, Record, SortDirection, SortSpec};
use crate::utils::error::{ClientError, Result};
use crate::utils::validation::Validate;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::{Ordering, Reverse};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableQuery {
    pub filter: Option<String>,
    /// Restricts the filter to one column. `None` searches every column.
    pub filter_column: Option<String>,
    pub sort: Option<SortSpec>,
    /// 1-based; clamped to the available pages.
    pub page: usize,
    pub page_size: usize,
}

impl Default for TableQuery {
    fn default() -> Self {
        Self {
            filter: None,
            filter_column: None,
            sort: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TableQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn in_column(mut self, column: impl Into<String>) -> Self {
        self.filter_column = Some(column.into());
        self
    }

    pub fn sorted_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Clicking a column header: a new column sorts ascending, the current
    /// column flips direction.
    pub fn toggle_sort(&mut self, column: &str) {
        let direction = match &self.sort {
            Some(spec) if spec.column == column && spec.direction == SortDirection::Ascending => {
                SortDirection::Descending
            }
            _ => SortDirection::Ascending,
        };
        self.sort = Some(SortSpec {
            column: column.to_string(),
            direction,
        });
        self.page = 1;
    }

    pub fn matches(&self, record: &Record) -> bool {
        let needle = match self.filter.as_deref().map(str::trim) {
            Some(f) if !f.is_empty() => f.to_lowercase(),
            _ => return true,
        };

        match &self.filter_column {
            Some(column) => record
                .get(column)
                .is_some_and(|v| cell_text(v).to_lowercase().contains(&needle)),
            None => record
                .data
                .values()
                .any(|v| cell_text(v).to_lowercase().contains(&needle)),
        }
    }

    pub fn sort_records(&self, records: &mut [Record]) {
        let Some(spec) = &self.sort else {
            return;
        };

        // Empty cells stay at the bottom in both directions.
        let key = |record: &Record| {
            record
                .get(&spec.column)
                .filter(|v| !v.is_null())
                .map(CellKey::from_value)
        };
        match spec.direction {
            SortDirection::Ascending => {
                records.sort_by_cached_key(|r| {
                    let k = key(r);
                    (k.is_none(), k)
                });
            }
            SortDirection::Descending => {
                records.sort_by_cached_key(|r| {
                    let k = key(r);
                    (k.is_none(), k.map(Reverse))
                });
            }
        }
    }

    /// Filter, then sort, then cut out the requested page.
    pub fn apply(&self, records: Vec<Record>) -> Result<Page<Record>> {
        self.validate()?;

        let mut rows: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).collect();
        self.sort_records(&mut rows);

        let page = paginate(rows, self.page, self.page_size)?;
        tracing::debug!(
            total = page.total_items,
            page = page.page,
            total_pages = page.total_pages,
            "Applied table query"
        );
        Ok(page)
    }
}

impl Validate for TableQuery {
    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(ClientError::ValidationError {
                message: "page_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Cuts out one 1-based page, clamping `page` to the pages that exist.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Result<Page<T>> {
    if page_size == 0 {
        return Err(ClientError::ValidationError {
            message: "page_size must be at least 1".to_string(),
        });
    }

    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Ok(Page {
        items,
        page,
        page_size,
        total_items,
        total_pages,
    })
}

/// The text a cell shows: strings unquoted, null blank, containers as JSON.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Sort key for one cell. Kinds never interleave: numbers come first, then
/// booleans, then timestamps, then everything else as lowercase text.
#[derive(Debug, Clone)]
pub enum CellKey {
    Number(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl CellKey {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(x) => Self::Number(x),
                None => Self::Text(n.to_string()),
            },
            Value::Bool(b) => Self::Bool(*b),
            Value::String(s) => {
                let trimmed = s.trim();
                if let Some(x) = trimmed.parse::<f64>().ok().filter(|x| x.is_finite()) {
                    Self::Number(x)
                } else if let Some(ts) = parse_timestamp(trimmed) {
                    Self::Timestamp(ts)
                } else {
                    Self::Text(s.to_lowercase())
                }
            }
            other => Self::Text(cell_text(other).to_lowercase()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Bool(_) => 1,
            Self::Timestamp(_) => 2,
            Self::Text(_) => 3,
        }
    }
}

impl Ord for CellKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(x), Self::Number(y)) => x.total_cmp(y),
            (Self::Bool(x), Self::Bool(y)) => x.cmp(y),
            (Self::Timestamp(x), Self::Timestamp(y)) => x.cmp(y),
            (Self::Text(x), Self::Text(y)) => x.cmp(y),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for CellKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CellKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellKey {}

pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    CellKey::from_value(a).cmp(&CellKey::from_value(b))
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
