//! Analytics requests: dimension items, batching, and row decoding.

use crate::model::{BatchLimits, ExtractionRequest};
use crate::table::Record;
use anyhow::{bail, Context, Result};
use serde_json::Value as Json;

pub const ENDPOINT: &str = "analytics";

/// One analytics request covering a slice of each dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsRequest {
    pub dx: Vec<String>,
    pub ou: Vec<String>,
    pub pe: Vec<String>,
    /// Disaggregate by category option combo (data elements only).
    pub with_co: bool,
}

impl AnalyticsRequest {
    pub fn query(&self) -> Vec<(String, String)> {
        let mut q = vec![
            ("dimension".to_string(), format!("dx:{}", self.dx.join(";"))),
            ("dimension".to_string(), format!("ou:{}", self.ou.join(";"))),
            ("dimension".to_string(), format!("pe:{}", self.pe.join(";"))),
        ];
        if self.with_co {
            q.push(("dimension".to_string(), "co".to_string()));
        }
        q.push(("displayProperty".to_string(), "NAME".to_string()));
        q.push(("outputIdScheme".to_string(), "UID".to_string()));
        q
    }

    /// Split a request into batches respecting `limits`. Data element and
    /// indicator selectors go in separate requests since only the former can
    /// be disaggregated.
    pub fn batches(req: &ExtractionRequest, limits: &BatchLimits) -> Result<Vec<AnalyticsRequest>> {
        let de_items: Vec<String> = req
            .data_elements
            .iter()
            .cloned()
            .chain(req.data_element_groups.iter().map(|g| format!("DE_GROUP-{g}")))
            .collect();
        let in_items: Vec<String> = req
            .indicators
            .iter()
            .cloned()
            .chain(req.indicator_groups.iter().map(|g| format!("IN_GROUP-{g}")))
            .collect();

        if de_items.is_empty() && in_items.is_empty() {
            bail!("no data elements, indicators or groups selected");
        }
        if req.periods.is_empty() {
            bail!("no periods selected");
        }

        // Level and group selectors travel with every org unit chunk.
        let ou_extra: Vec<String> = req
            .org_unit_groups
            .iter()
            .map(|g| format!("OU_GROUP-{g}"))
            .chain(req.org_unit_levels.iter().map(|l| format!("LEVEL-{l}")))
            .collect();
        let mut ou_chunks: Vec<Vec<String>> = chunks(&req.org_units, limits.max_org_units)
            .into_iter()
            .map(|mut c| {
                c.extend(ou_extra.iter().cloned());
                c
            })
            .collect();
        if ou_chunks.is_empty() {
            if ou_extra.is_empty() {
                bail!("no organisation units, groups or levels selected");
            }
            ou_chunks.push(ou_extra);
        }

        let pe_chunks = chunks(&req.periods, limits.max_periods);

        let mut out = Vec::new();
        for (items, with_co) in [(de_items, true), (in_items, false)] {
            for dx in chunks(&items, limits.max_dx) {
                for ou in &ou_chunks {
                    for pe in &pe_chunks {
                        out.push(AnalyticsRequest {
                            dx: dx.clone(),
                            ou: ou.clone(),
                            pe: pe.clone(),
                            with_co,
                        });
                    }
                }
            }
        }
        Ok(out)
    }
}

fn chunks(items: &[String], size: usize) -> Vec<Vec<String>> {
    items.chunks(size.max(1)).map(<[String]>::to_vec).collect()
}

/// Turn an analytics response into records keyed by header name.
pub fn parse_response(body: &Json) -> Result<Vec<Record>> {
    let headers: Vec<&str> = body
        .get("headers")
        .and_then(Json::as_array)
        .context("analytics response has no headers")?
        .iter()
        .map(|h| h.get("name").and_then(Json::as_str).unwrap_or_default())
        .collect();

    let Some(rows) = body.get("rows").and_then(Json::as_array) else {
        return Ok(Vec::new());
    };

    rows.iter()
        .map(|row| {
            let cells = row.as_array().context("analytics row is not an array")?;
            if cells.len() != headers.len() {
                bail!(
                    "analytics row has {} cells, expected {}",
                    cells.len(),
                    headers.len()
                );
            }
            Ok(headers
                .iter()
                .zip(cells)
                .map(|(h, v)| (h.to_string(), v.clone()))
                .collect())
        })
        .collect()
}
