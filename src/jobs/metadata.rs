//! Metadata extraction: one CSV per selected entity kind.

use crate::dhis2::{MetadataIndex, RemoteDataClient};
use crate::entities::{self, EntityDescriptor, EntityKind, PostProcess};
use crate::jobs::RunContext;
use crate::postprocess;
use crate::table::{Record, Table};
use anyhow::Result;
use std::path::Path;

pub(crate) const JOB_NAME: &str = "dhis2-extract-metadata";

pub(crate) async fn run<C: RemoteDataClient>(
    client: &C,
    ctx: &mut RunContext,
    output_dir: &Path,
    kinds: &[EntityKind],
) -> Result<()> {
    let selected = entities::selected(kinds);
    if selected.is_empty() {
        tracing::info!("No metadata entity selected, nothing to extract");
        return Ok(());
    }

    for d in selected {
        let records = client.metadata(d.kind).await?;
        let table = post_process(d, &records)?;
        ctx.write_table(output_dir, d.file_name, &table)?;
        tracing::info!("Extracted metadata for {} {}", table.height(), d.label);
    }
    Ok(())
}

fn post_process(d: &EntityDescriptor, records: &[Record]) -> Result<Table> {
    let table = Table::from_records(records);
    Ok(match d.post_process {
        PostProcess::None => table,
        PostProcess::JoinLists => postprocess::join_lists(table),
        PostProcess::OrgUnitHierarchy if table.is_empty() => table,
        PostProcess::OrgUnitHierarchy => {
            let mut table = table;
            let index = MetadataIndex::from_org_units(records);
            postprocess::add_org_unit_parent_columns(&mut table, &index, "id")?;
            postprocess::select_org_unit_columns(&table)?
        }
    })
}
