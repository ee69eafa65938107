//! Analytics extraction: fetch data values, name them, write `analytics.csv`.

use crate::dhis2::{MetadataIndex, RemoteDataClient};
use crate::jobs::RunContext;
use crate::model::{BatchLimits, ExtractionRequest};
use crate::postprocess;
use crate::table::Table;
use anyhow::Result;
use std::path::Path;

pub(crate) const JOB_NAME: &str = "dhis2-analytics";
pub(crate) const FILE_NAME: &str = "analytics.csv";

pub(crate) async fn run<C: RemoteDataClient>(
    client: &C,
    ctx: &mut RunContext,
    output_dir: &Path,
    request: &ExtractionRequest,
    limits: &BatchLimits,
) -> Result<()> {
    let data_values = client.analytics(request, limits).await?;
    tracing::info!("Extracted {} data values", data_values.len());

    let mut table = Table::from_records(&data_values);
    if !table.is_empty() {
        let index = MetadataIndex::load(client).await?;
        postprocess::add_dx_name_column(&mut table, &index)?;
        postprocess::add_coc_name_column(&mut table, &index)?;
        postprocess::add_org_unit_name_column(&mut table, &index)?;
        postprocess::add_org_unit_parent_columns(&mut table, &index, "ou")?;
    }

    ctx.write_table(output_dir, FILE_NAME, &table)?;
    Ok(())
}
