use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rows of string cells under named, ordered columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Values of one column in row order; empty when the column is absent.
    pub fn column(&self, name: &str) -> Vec<String> {
        let Some(index) = self.column_index(name) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(index).cloned())
            .collect()
    }
}

/// Parses a response body as JSON records, then as tab-separated text, and
/// finally settles for an empty table.
pub fn parse_body(body: &str) -> Dataset {
    if let Some(dataset) = parse_json_records(body) {
        return dataset;
    }
    if let Some(dataset) = parse_tsv(body) {
        return dataset;
    }
    tracing::debug!("response body is neither JSON records nor TSV");
    Dataset::empty()
}

/// Accepts a JSON array of objects. Columns follow first appearance.
pub fn parse_json_records(body: &str) -> Option<Dataset> {
    let value: Value = serde_json::from_str(body).ok()?;
    let records = value.as_array()?;

    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.as_object()?.keys() {
            if !columns.iter().any(|column| column == key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(Value::as_object)
        .map(|record| {
            columns
                .iter()
                .map(|column| record.get(column).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    Some(Dataset { columns, rows })
}

/// Accepts tab-separated text with a header line. Short rows are padded with
/// empty cells; a row wider than the header rejects the body.
pub fn parse_tsv(body: &str) -> Option<Dataset> {
    if body.trim().is_empty() {
        return None;
    }
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(body.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .ok()?
        .iter()
        .map(|header| header.to_string())
        .collect();
    if columns.iter().all(|column| column.is_empty()) {
        return None;
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.ok()?;
        if record.len() > columns.len() {
            tracing::debug!(
                "TSV row {} has {} cells for {} columns",
                rows.len() + 1,
                record.len(),
                columns.len()
            );
            return None;
        }
        let mut row: Vec<String> = record.iter().map(|cell| cell.to_string()).collect();
        row.resize(columns.len(), String::new());
        rows.push(row);
    }

    Some(Dataset { columns, rows })
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
