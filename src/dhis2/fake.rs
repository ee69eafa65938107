//! In-memory client for job tests.

use crate::dhis2::RemoteDataClient;
use crate::entities::EntityKind;
use crate::model::{BatchLimits, ExtractionRequest};
use crate::table::Record;
use anyhow::{anyhow, Result};
use serde_json::Value as Json;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Default)]
pub struct FakeClient {
    pub analytics_rows: Vec<Record>,
    pub metadata: HashMap<EntityKind, Vec<Record>>,
    pub fail_on: Option<EntityKind>,
    pub analytics_calls: RefCell<Vec<(ExtractionRequest, BatchLimits)>>,
    pub metadata_calls: RefCell<Vec<EntityKind>>,
}

pub fn records(v: Json) -> Vec<Record> {
    v.as_array()
        .map(|a| a.iter().filter_map(|r| r.as_object().cloned()).collect())
        .unwrap_or_default()
}

impl FakeClient {
    pub fn with_metadata(mut self, kind: EntityKind, v: Json) -> Self {
        self.metadata.insert(kind, records(v));
        self
    }
}

impl RemoteDataClient for FakeClient {
    fn base_url(&self) -> &str {
        "https://dhis2.test"
    }

    async fn analytics(
        &self,
        request: &ExtractionRequest,
        limits: &BatchLimits,
    ) -> Result<Vec<Record>> {
        self.analytics_calls
            .borrow_mut()
            .push((request.clone(), *limits));
        Ok(self.analytics_rows.clone())
    }

    async fn metadata(&self, kind: EntityKind) -> Result<Vec<Record>> {
        self.metadata_calls.borrow_mut().push(kind);
        if self.fail_on == Some(kind) {
            return Err(anyhow!("HTTP 503 fetching {kind:?}"));
        }
        Ok(self.metadata.get(&kind).cloned().unwrap_or_default())
    }
}
