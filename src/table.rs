//! Column-major in-memory table built from JSON records.
//!
//! Columns are typed so list-valued fields can be told apart from scalars
//! before serialization. CSV output has no nesting, so list columns must be
//! flattened (see `postprocess::join_lists`) before `write_csv`.

use anyhow::{Context, Result};
use serde_json::{Map, Value as Json};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A JSON object as returned by the DHIS2 API.
pub type Record = Map<String, Json>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Utf8,
    Int,
    Float,
    Bool,
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Render a scalar cell for CSV. Nulls become empty fields.
    fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            // Unflattened lists still need a stable rendering.
            Value::List(items) => format!("[{}]", items.join(", ")),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TableError {
    #[error("column not found: {0}")]
    MissingColumn(String),
    #[error("column {name} has {got} values, table has {expected} rows")]
    LengthMismatch {
        name: String,
        got: usize,
        expected: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: DataType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: DataType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    /// Build a Utf8 column from optional strings.
    pub fn utf8<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|v| v.map(|s| Value::Str(s.into())).unwrap_or(Value::Null))
            .collect();
        Self::new(name, DataType::Utf8, values)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table from JSON records. Column order follows first appearance
    /// of each key; missing keys become nulls.
    pub fn from_records(records: &[Record]) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for r in records {
            for k in r.keys() {
                if seen.insert(k.as_str()) {
                    order.push(k.clone());
                }
            }
        }

        let columns = order
            .into_iter()
            .map(|name| {
                let raw: Vec<Option<&Json>> = records.iter().map(|r| r.get(&name)).collect();
                let dtype = infer_dtype(&raw);
                let values = raw.into_iter().map(|v| convert(v, dtype)).collect();
                Column::new(name, dtype, values)
            })
            .collect();

        Table { columns }
    }

    pub fn height(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Append a column, replacing any existing column with the same name in place.
    pub fn push_column(&mut self, column: Column) -> Result<(), TableError> {
        if !self.columns.is_empty() && column.values.len() != self.height() {
            return Err(TableError::LengthMismatch {
                name: column.name,
                got: column.values.len(),
                expected: self.height(),
            });
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Keep only the named columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table, TableError> {
        let columns = names
            .iter()
            .map(|n| {
                self.column(n.as_ref())
                    .cloned()
                    .ok_or_else(|| TableError::MissingColumn(n.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table { columns })
    }

    /// String keys of a column, for lookup joins. Non-string cells map to `None`.
    pub fn str_values(&self, name: &str) -> Result<Vec<Option<&str>>, TableError> {
        let col = self
            .column(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        Ok(col.values.iter().map(Value::as_str).collect())
    }

    /// Add `new_name` by looking up each cell of `key` in `lookup`.
    pub fn with_lookup_column(
        &mut self,
        key: &str,
        new_name: &str,
        lookup: &HashMap<String, String>,
    ) -> Result<(), TableError> {
        let looked_up: Vec<Option<String>> = self
            .str_values(key)?
            .into_iter()
            .map(|k| k.and_then(|k| lookup.get(k).cloned()))
            .collect();
        self.push_column(Column::utf8(new_name, looked_up))
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if self.columns.is_empty() {
            // csv would emit `""` for an empty header record
            std::fs::write(path, "")
                .with_context(|| format!("create csv file {}", path.display()))?;
            return Ok(());
        }
        let mut w = csv::Writer::from_path(path)
            .with_context(|| format!("create csv file {}", path.display()))?;
        w.write_record(self.column_names())
            .with_context(|| format!("write csv header to {}", path.display()))?;
        for row in 0..self.height() {
            w.write_record(self.columns.iter().map(|c| c.values[row].to_field()))
                .with_context(|| format!("write csv row to {}", path.display()))?;
        }
        w.flush()
            .with_context(|| format!("flush csv file {}", path.display()))?;
        Ok(())
    }
}

fn infer_dtype(cells: &[Option<&Json>]) -> DataType {
    let mut dtype: Option<DataType> = None;
    for cell in cells.iter().flatten() {
        let t = match cell {
            Json::Null => continue,
            Json::Array(_) => return DataType::List,
            Json::Bool(_) => DataType::Bool,
            Json::Number(n) if n.is_i64() => DataType::Int,
            Json::Number(_) => DataType::Float,
            Json::String(_) | Json::Object(_) => DataType::Utf8,
        };
        dtype = Some(match (dtype, t) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(DataType::Int), DataType::Float) | (Some(DataType::Float), DataType::Int) => {
                DataType::Float
            }
            _ => DataType::Utf8,
        });
    }
    dtype.unwrap_or(DataType::Utf8)
}

fn convert(cell: Option<&Json>, dtype: DataType) -> Value {
    let Some(cell) = cell else {
        return Value::Null;
    };
    match (cell, dtype) {
        (Json::Null, _) => Value::Null,
        (Json::Array(items), _) => Value::List(items.iter().map(list_item).collect()),
        (other, DataType::List) => Value::List(vec![list_item(other)]),
        (Json::Number(n), DataType::Int) => n.as_i64().map(Value::Int).unwrap_or(Value::Null),
        (Json::Number(n), DataType::Float) => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        (Json::Bool(b), DataType::Bool) => Value::Bool(*b),
        (Json::String(s), _) => Value::Str(s.clone()),
        (other, _) => Value::Str(other.to_string()),
    }
}

/// List elements are strings; `{ "id": .. }` references collapse to the id.
fn list_item(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        Json::Object(o) => match o.get("id").and_then(Json::as_str) {
            Some(id) => id.to_string(),
            None => v.to_string(),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(v: Json) -> Vec<Record> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn from_records_infers_types_and_fills_nulls() {
        let t = Table::from_records(&records(json!([
            {"id": "a", "level": 1, "groups": ["x", "y"]},
            {"id": "b", "score": 1.5, "groups": []},
            {"id": "c", "level": 2, "score": 2},
        ])));

        assert_eq!(t.column_names(), vec!["id", "level", "groups", "score"]);
        assert_eq!(t.height(), 3);
        assert_eq!(t.column("level").unwrap().dtype, DataType::Int);
        assert_eq!(t.column("score").unwrap().dtype, DataType::Float);
        assert_eq!(t.column("groups").unwrap().dtype, DataType::List);
        assert_eq!(t.column("level").unwrap().values[1], Value::Null);
        assert_eq!(t.column("groups").unwrap().values[2], Value::Null);
        assert_eq!(
            t.column("groups").unwrap().values[0],
            Value::List(vec!["x".into(), "y".into()])
        );
    }

    #[test]
    fn nested_objects_become_json_text_and_id_references_collapse() {
        let t = Table::from_records(&records(json!([
            {"geometry": {"type": "Point", "coordinates": [1, 2]}, "members": [{"id": "m1"}]},
        ])));
        let geom = t.column("geometry").unwrap();
        assert_eq!(geom.dtype, DataType::Utf8);
        assert!(geom.values[0].as_str().unwrap().contains("\"Point\""));
        assert_eq!(
            t.column("members").unwrap().values[0],
            Value::List(vec!["m1".into()])
        );
    }

    #[test]
    fn select_reorders_and_reports_missing_columns() {
        let t = Table::from_records(&records(json!([{"a": "1", "b": "2"}])));
        let s = t.select(&["b", "a"]).unwrap();
        assert_eq!(s.column_names(), vec!["b", "a"]);
        assert_eq!(
            t.select(&["c"]).unwrap_err(),
            TableError::MissingColumn("c".into())
        );
    }

    #[test]
    fn push_column_rejects_wrong_length() {
        let mut t = Table::from_records(&records(json!([{"a": "1"}, {"a": "2"}])));
        let err = t
            .push_column(Column::utf8("b", vec![Some("x")]))
            .unwrap_err();
        assert!(matches!(err, TableError::LengthMismatch { .. }));
    }

    #[test]
    fn lookup_column_maps_known_keys_only() {
        let mut t = Table::from_records(&records(json!([{"ou": "A"}, {"ou": "Z"}])));
        let lookup = HashMap::from([("A".to_string(), "Alpha".to_string())]);
        t.with_lookup_column("ou", "ou_name", &lookup).unwrap();
        let col = t.column("ou_name").unwrap();
        assert_eq!(col.values, vec![Value::Str("Alpha".into()), Value::Null]);
    }

    #[test]
    fn write_csv_quotes_and_leaves_nulls_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let t = Table::from_records(&records(json!([
            {"id": "a", "name": "Hello, world"},
            {"id": "b"},
        ])));
        t.write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id,name\na,\"Hello, world\"\nb,\n");
    }
}
