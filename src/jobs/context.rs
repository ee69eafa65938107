//! Per-run bookkeeping of output files.

use crate::model::{ClientConfig, OutputFile, RunManifest};
use crate::table::Table;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub(crate) struct RunContext {
    job: String,
    outputs: Vec<OutputFile>,
}

impl RunContext {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            outputs: Vec::new(),
        }
    }

    /// Register a file produced by this run.
    pub fn add_file_output(&mut self, path: PathBuf, rows: usize) {
        tracing::info!("Wrote {} ({rows} rows)", path.display());
        self.outputs.push(OutputFile { path, rows });
    }

    /// Write `table` as `<dir>/<file_name>` and register it.
    pub fn write_table(&mut self, dir: &Path, file_name: &str, table: &Table) -> Result<PathBuf> {
        let path = dir.join(file_name);
        table.write_csv(&path)?;
        self.add_file_output(path.clone(), table.height());
        Ok(path)
    }

    pub fn outputs(&self) -> &[OutputFile] {
        &self.outputs
    }

    pub fn into_manifest(self, output_dir: PathBuf, client: ClientConfig) -> RunManifest {
        RunManifest {
            job: self.job,
            output_dir,
            outputs: self.outputs,
            client,
        }
    }
}
