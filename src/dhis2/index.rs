//! Name and hierarchy lookups used to enrich extracted tables.

use crate::dhis2::RemoteDataClient;
use crate::entities::EntityKind;
use crate::table::Record;
use anyhow::Result;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    /// Data elements and indicators.
    pub dx_names: HashMap<String, String>,
    pub coc_names: HashMap<String, String>,
    pub org_unit_names: HashMap<String, String>,
    /// Ancestor chain of each org unit, root first, ending with the unit itself.
    pub org_unit_paths: HashMap<String, Vec<String>>,
}

impl MetadataIndex {
    /// Fetch everything needed to enrich an analytics table.
    pub async fn load<C: RemoteDataClient>(client: &C) -> Result<Self> {
        let mut index = MetadataIndex::default();
        for kind in [EntityKind::DataElements, EntityKind::Indicators] {
            index.dx_names.extend(names(&client.metadata(kind).await?));
        }
        index.coc_names = names(&client.metadata(EntityKind::CategoryOptionCombos).await?);
        index.add_org_units(&client.metadata(EntityKind::OrgUnits).await?);
        Ok(index)
    }

    /// Index built from already fetched org unit records.
    pub fn from_org_units(records: &[Record]) -> Self {
        let mut index = MetadataIndex::default();
        index.add_org_units(records);
        index
    }

    pub fn add_org_units(&mut self, records: &[Record]) {
        self.org_unit_names.extend(names(records));
        for r in records {
            let (Some(id), Some(path)) = (
                r.get("id").and_then(|v| v.as_str()),
                r.get("path").and_then(|v| v.as_str()),
            ) else {
                continue;
            };
            let chain = path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            self.org_unit_paths.insert(id.to_string(), chain);
        }
    }
}

fn names(records: &[Record]) -> HashMap<String, String> {
    records
        .iter()
        .filter_map(|r| {
            let id = r.get("id")?.as_str()?;
            let name = r.get("name")?.as_str()?;
            Some((id.to_string(), name.to_string()))
        })
        .collect()
}
