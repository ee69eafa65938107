//! Metadata endpoints and flattening of their records into table rows.

use crate::entities::EntityKind;
use crate::table::Record;
use anyhow::{Context, Result};
use serde_json::Value as Json;

pub const PAGE_SIZE: u32 = 1000;

/// Where and how to fetch one entity kind.
#[derive(Debug, Clone, Copy)]
pub struct EndpointSpec {
    pub endpoint: &'static str,
    /// Key of the item array in the response body.
    pub collection: &'static str,
    pub fields: &'static str,
}

impl EndpointSpec {
    pub fn page_query(&self, page: u32, page_size: u32) -> Vec<(String, String)> {
        vec![
            ("fields".to_string(), self.fields.to_string()),
            ("paging".to_string(), "true".to_string()),
            ("pageSize".to_string(), page_size.to_string()),
            ("page".to_string(), page.to_string()),
        ]
    }
}

pub fn endpoint(kind: EntityKind) -> EndpointSpec {
    let (endpoint, fields) = match kind {
        EntityKind::OrgUnits => ("organisationUnits", "id,name,level,path,geometry"),
        EntityKind::OrgUnitLevels => ("organisationUnitLevels", "id,name,level"),
        EntityKind::OrgUnitGroups => ("organisationUnitGroups", "id,name,organisationUnits[id]"),
        EntityKind::Datasets => (
            "dataSets",
            "id,name,periodType,dataSetElements[dataElement[id]],indicators[id],organisationUnits[id]",
        ),
        EntityKind::DataElements => (
            "dataElements",
            "id,name,valueType,aggregationType,domainType,zeroIsSignificant",
        ),
        EntityKind::DataElementGroups => ("dataElementGroups", "id,name,dataElements[id]"),
        EntityKind::Indicators => ("indicators", "id,name,numerator,denominator,annualized"),
        EntityKind::IndicatorGroups => ("indicatorGroups", "id,name,indicators[id]"),
        EntityKind::CategoryOptionCombos => (
            "categoryOptionCombos",
            "id,name,categoryCombo[id],categoryOptions[id]",
        ),
    };
    EndpointSpec {
        endpoint,
        collection: endpoint,
        fields,
    }
}

/// Items of one page and the total page count (1 when the response is unpaged).
pub fn parse_page<'a>(body: &'a Json, collection: &str) -> Result<(&'a [Json], u32)> {
    let items = body
        .get(collection)
        .and_then(Json::as_array)
        .with_context(|| format!("response has no {collection} array"))?;
    let page_count = match body.pointer("/pager/pageCount").and_then(Json::as_u64) {
        Some(n) => u32::try_from(n)
            .with_context(|| format!("pageCount {n} out of range for {collection}"))?,
        None => 1,
    };
    Ok((items, page_count))
}

/// Map an API item to the column layout of its entity kind.
pub fn normalize(kind: EntityKind, item: &Json) -> Record {
    let mut r = Record::new();
    let mut put = |col: &str, v: Json| {
        r.insert(col.to_string(), v);
    };
    put("id", field(item, "id"));
    put("name", field(item, "name"));

    match kind {
        EntityKind::OrgUnits => {
            put("level", field(item, "level"));
            put("path", field(item, "path"));
            put("geometry", field(item, "geometry"));
        }
        EntityKind::OrgUnitLevels => put("level", field(item, "level")),
        EntityKind::OrgUnitGroups => put("org_units", ids(item, "organisationUnits")),
        EntityKind::Datasets => {
            put("period_type", field(item, "periodType"));
            let data_elements: Vec<Json> = item
                .get("dataSetElements")
                .and_then(Json::as_array)
                .map(|dse| {
                    dse.iter()
                        .filter_map(|e| e.pointer("/dataElement/id").cloned())
                        .collect()
                })
                .unwrap_or_default();
            put("data_elements", Json::Array(data_elements));
            put("indicators", ids(item, "indicators"));
            put("org_units", ids(item, "organisationUnits"));
        }
        EntityKind::DataElements => {
            put("value_type", field(item, "valueType"));
            put("aggregation_type", field(item, "aggregationType"));
            put("domain_type", field(item, "domainType"));
            put("zero_is_significant", field(item, "zeroIsSignificant"));
        }
        EntityKind::DataElementGroups => put("data_elements", ids(item, "dataElements")),
        EntityKind::Indicators => {
            put("numerator", field(item, "numerator"));
            put("denominator", field(item, "denominator"));
            put("annualized", field(item, "annualized"));
        }
        EntityKind::IndicatorGroups => put("indicators", ids(item, "indicators")),
        EntityKind::CategoryOptionCombos => {
            put(
                "category_combo",
                item.pointer("/categoryCombo/id").cloned().unwrap_or(Json::Null),
            );
            put("category_options", ids(item, "categoryOptions"));
        }
    }
    r
}

fn field(item: &Json, key: &str) -> Json {
    item.get(key).cloned().unwrap_or(Json::Null)
}

/// `[{ "id": .. }, ..]` reduced to an array of ids.
fn ids(item: &Json, key: &str) -> Json {
    let ids: Vec<Json> = item
        .get(key)
        .and_then(Json::as_array)
        .map(|refs| refs.iter().filter_map(|r| r.get("id").cloned()).collect())
        .unwrap_or_default();
    Json::Array(ids)
}
