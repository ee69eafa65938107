//! Table transforms applied between extraction and CSV serialization.

use crate::dhis2::MetadataIndex;
use crate::table::{Column, DataType, Table, TableError, Value};

/// Flatten every list column: non-empty lists become `"a, b"`, empty lists
/// become null. Other columns are left as they are.
pub fn join_lists(mut table: Table) -> Table {
    for col in table.columns_mut() {
        if col.dtype != DataType::List {
            continue;
        }
        for cell in col.values.iter_mut() {
            *cell = match std::mem::replace(cell, Value::Null) {
                Value::List(items) if !items.is_empty() => Value::Str(items.join(", ")),
                Value::List(_) | Value::Null => Value::Null,
                other => other,
            };
        }
        col.dtype = DataType::Utf8;
    }
    table
}

pub fn add_dx_name_column(table: &mut Table, index: &MetadataIndex) -> Result<(), TableError> {
    table.with_lookup_column("dx", "dx_name", &index.dx_names)
}

/// No-op for tables without a `co` column (indicator-only extracts).
pub fn add_coc_name_column(table: &mut Table, index: &MetadataIndex) -> Result<(), TableError> {
    if !table.has_column("co") {
        return Ok(());
    }
    table.with_lookup_column("co", "co_name", &index.coc_names)
}

pub fn add_org_unit_name_column(table: &mut Table, index: &MetadataIndex) -> Result<(), TableError> {
    table.with_lookup_column("ou", "ou_name", &index.org_unit_names)
}

/// Add `parent_level_<n>_id` / `parent_level_<n>_name` for every hierarchy
/// level reached by the org units in `id_column`.
pub fn add_org_unit_parent_columns(
    table: &mut Table,
    index: &MetadataIndex,
    id_column: &str,
) -> Result<(), TableError> {
    let chains: Vec<Option<&Vec<String>>> = table
        .str_values(id_column)?
        .into_iter()
        .map(|id| id.and_then(|id| index.org_unit_paths.get(id)))
        .collect();
    let depth = chains.iter().flatten().map(|c| c.len()).max().unwrap_or(0);

    let mut columns = Vec::with_capacity(depth * 2);
    for level in 1..=depth {
        let ids: Vec<Option<String>> = chains
            .iter()
            .map(|c| c.and_then(|c| c.get(level - 1)).cloned())
            .collect();
        let names: Vec<Option<String>> = ids
            .iter()
            .map(|id| id.as_ref().and_then(|id| index.org_unit_names.get(id)).cloned())
            .collect();
        columns.push(Column::utf8(format!("parent_level_{level}_id"), ids));
        columns.push(Column::utf8(format!("parent_level_{level}_name"), names));
    }
    for c in columns {
        table.push_column(c)?;
    }
    Ok(())
}

/// Org unit layout: `id, name, level`, the `parent*` columns by hierarchy
/// level, then `geometry` when present.
pub fn select_org_unit_columns(table: &Table) -> Result<Table, TableError> {
    let mut parents: Vec<&str> = table
        .column_names()
        .into_iter()
        .filter(|n| n.starts_with("parent"))
        .collect();
    parents.sort_by_key(|n| hierarchy_level(n));

    let mut names: Vec<&str> = vec!["id", "name", "level"];
    names.extend(parents);
    if table.has_column("geometry") {
        names.push("geometry");
    }
    table.select(&names)
}

/// First number in a column name; names without one sort last.
fn hierarchy_level(name: &str) -> u32 {
    name.split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .unwrap_or(u32::MAX)
}
