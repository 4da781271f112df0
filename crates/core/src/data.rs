//! Data sets for data-driven tests

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One row of a data set: column name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRow(BTreeMap<String, Value>);

impl DataRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Column value rendered as text; strings come back without quotes
    pub fn get_str(&self, column: &str) -> Option<String> {
        self.0.get(column).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace `${column}` placeholders in `template` with row values.
    /// Unknown columns are left untouched.
    pub fn substitute(&self, template: &str) -> String {
        let mut out = template.to_string();
        for column in self.0.keys() {
            let placeholder = format!("${{{}}}", column);
            if out.contains(&placeholder) {
                if let Some(value) = self.get_str(column) {
                    out = out.replace(&placeholder, &value);
                }
            }
        }
        out
    }
}

impl fmt::Display for DataRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&value)
    }
}

impl FromIterator<(String, Value)> for DataRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Where a data set is read from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// CSV file with a header row
    Csv(PathBuf),
    /// JSON file holding an array of objects
    Json(PathBuf),
    /// Rows declared in place
    Inline(Vec<DataRow>),
}

impl DataSource {
    /// Read every row of the source, in file order
    pub fn load(&self) -> Result<Vec<DataRow>> {
        match self {
            DataSource::Csv(path) => read_csv(path),
            DataSource::Json(path) => read_json(path),
            DataSource::Inline(rows) => Ok(rows.clone()),
        }
    }

    /// Resolve relative file paths against `base`
    pub fn relative_to(self, base: &Path) -> Self {
        match self {
            DataSource::Csv(p) if p.is_relative() => DataSource::Csv(base.join(p)),
            DataSource::Json(p) if p.is_relative() => DataSource::Json(base.join(p)),
            other => other,
        }
    }
}

fn read_csv(path: &Path) -> Result<Vec<DataRow>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::DataSource(format!("{}: {}", path.display(), e)))?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn read_json(path: &Path) -> Result<Vec<DataRow>> {
    let content = std::fs::read_to_string(path)?;
    let rows: Vec<DataRow> = serde_json::from_str(&content).map_err(|e| {
        Error::DataSource(format!("{}: expected an array of objects ({})", path.display(), e))
    })?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_csv_rows_in_file_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("users.csv");
        std::fs::write(&path, "user,password\nalice,a1\nbob,b2\ncarol,c3\n").unwrap();

        let rows = DataSource::Csv(path).load().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get_str("user").as_deref(), Some("alice"));
        assert_eq!(rows[2].get_str("password").as_deref(), Some("c3"));
    }

    #[test]
    fn test_json_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rows.json");
        std::fs::write(&path, r#"[{"id": 1, "name": "x"}, {"id": 2, "name": "y"}]"#).unwrap();

        let rows = DataSource::Json(path).load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("id"), Some(&Value::from(2)));
        assert_eq!(rows[1].get_str("id").as_deref(), Some("2"));
    }

    #[test]
    fn test_json_must_be_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rows.json");
        std::fs::write(&path, r#"{"id": 1}"#).unwrap();

        assert!(matches!(DataSource::Json(path).load(), Err(Error::DataSource(_))));
    }

    #[test]
    fn test_substitute_placeholders() {
        let row = DataRow::new().with("user", "alice").with("age", 31);
        assert_eq!(row.substitute("/users/${user}?age=${age}"), "/users/alice?age=31");
        assert_eq!(row.substitute("${missing}"), "${missing}");
    }
}
