use crate::dhis2::{Dhis2Client, RemoteDataClient};
use crate::entities::EntityKind;
use crate::jobs::{self, RunContext};
use crate::model::{BatchLimits, ClientConfig, ExtractionRequest, RunManifest};
use crate::output_dir;
use crate::params::AnalyticsParams;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "dhis2-extract",
    version,
    about = "Extract DHIS2 analytics values and metadata to CSV files"
)]
pub struct Cli {
    /// Base URL of the DHIS2 instance
    #[arg(long, env = "DHIS2_URL")]
    pub url: String,

    /// DHIS2 username
    #[arg(long, env = "DHIS2_USERNAME")]
    pub username: Option<String>,

    /// DHIS2 password
    #[arg(long, env = "DHIS2_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Per-request timeout
    #[arg(long, default_value = "60s")]
    pub timeout: humantime::Duration,

    /// Workspace root; output directories and the response cache live under it
    #[arg(long, env = "DHIS2_EXTRACT_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Use --use-cache true or --use-cache false to override (cached data might be outdated)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub use_cache: bool,

    /// Refetch cached responses older than this
    #[arg(long)]
    pub cache_max_age: Option<humantime::Duration>,

    /// Output directory, relative to the workspace. Defaults to a timestamped
    /// directory that is deleted after 31 days
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Print the run manifest as JSON
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub job: Job,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Job {
    /// Extract analytics data values
    Analytics(AnalyticsArgs),
    /// Extract metadata tables
    Metadata(MetadataArgs),
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::Analytics(_) => jobs::analytics::JOB_NAME,
            Job::Metadata(_) => jobs::metadata::JOB_NAME,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct AnalyticsArgs {
    /// UIDs of data elements
    #[arg(long = "data-element", value_delimiter = ',')]
    pub data_elements: Vec<String>,

    /// UIDs of data element groups
    #[arg(long = "data-element-group", value_delimiter = ',')]
    pub data_element_groups: Vec<String>,

    /// UIDs of indicators
    #[arg(long = "indicator", value_delimiter = ',')]
    pub indicators: Vec<String>,

    /// UIDs of indicator groups
    #[arg(long = "indicator-group", value_delimiter = ',')]
    pub indicator_groups: Vec<String>,

    /// DHIS2 periods (ignored when both --start and --end are given)
    #[arg(long = "period", value_delimiter = ',')]
    pub periods: Vec<String>,

    /// Start of period range
    #[arg(long)]
    pub start: Option<String>,

    /// End of period range
    #[arg(long)]
    pub end: Option<String>,

    /// UIDs of organisation units
    #[arg(long = "org-unit", value_delimiter = ',')]
    pub org_units: Vec<String>,

    /// UIDs of organisation unit groups
    #[arg(long = "org-unit-group", value_delimiter = ',')]
    pub org_unit_groups: Vec<String>,

    /// Organisation unit levels
    #[arg(long = "org-unit-level", value_delimiter = ',')]
    pub org_unit_levels: Vec<String>,

    /// Max data elements/indicators per request
    #[arg(long, default_value_t = BatchLimits::default().max_dx)]
    pub max_dx: usize,

    /// Max organisation units per request
    #[arg(long, default_value_t = BatchLimits::default().max_org_units)]
    pub max_org_units: usize,

    /// Max periods per request
    #[arg(long, default_value_t = BatchLimits::default().max_periods)]
    pub max_periods: usize,
}

impl AnalyticsArgs {
    fn params(&self) -> AnalyticsParams {
        AnalyticsParams {
            data_elements: self.data_elements.clone(),
            data_element_groups: self.data_element_groups.clone(),
            indicators: self.indicators.clone(),
            indicator_groups: self.indicator_groups.clone(),
            periods: self.periods.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            org_units: self.org_units.clone(),
            org_unit_groups: self.org_unit_groups.clone(),
            org_unit_levels: self.org_unit_levels.clone(),
        }
    }

    fn limits(&self) -> BatchLimits {
        BatchLimits {
            max_dx: self.max_dx,
            max_org_units: self.max_org_units,
            max_periods: self.max_periods,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct MetadataArgs {
    /// Extract every metadata type
    #[arg(long)]
    pub all: bool,
    /// Extract organisation units
    #[arg(long)]
    pub org_units: bool,
    /// Extract organisation unit levels
    #[arg(long)]
    pub org_unit_levels: bool,
    /// Extract organisation unit groups
    #[arg(long)]
    pub org_unit_groups: bool,
    /// Extract datasets
    #[arg(long)]
    pub datasets: bool,
    /// Extract data elements
    #[arg(long)]
    pub data_elements: bool,
    /// Extract data element groups
    #[arg(long)]
    pub data_element_groups: bool,
    /// Extract indicators
    #[arg(long)]
    pub indicators: bool,
    /// Extract indicator groups
    #[arg(long)]
    pub indicator_groups: bool,
    /// Extract category option combos
    #[arg(long)]
    pub coc: bool,
}

impl MetadataArgs {
    pub fn kinds(&self) -> Vec<EntityKind> {
        [
            (self.org_units, EntityKind::OrgUnits),
            (self.org_unit_levels, EntityKind::OrgUnitLevels),
            (self.org_unit_groups, EntityKind::OrgUnitGroups),
            (self.datasets, EntityKind::Datasets),
            (self.data_elements, EntityKind::DataElements),
            (self.data_element_groups, EntityKind::DataElementGroups),
            (self.indicators, EntityKind::Indicators),
            (self.indicator_groups, EntityKind::IndicatorGroups),
            (self.coc, EntityKind::CategoryOptionCombos),
        ]
        .into_iter()
        .filter(|(on, _)| self.all || *on)
        .map(|(_, kind)| kind)
        .collect()
    }
}

/// Workspace root: explicit flag, else the platform data dir.
pub fn resolve_workspace(args: &Cli) -> PathBuf {
    args.workspace.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .map(|d| d.join("dhis2-extract"))
            .unwrap_or_else(|| PathBuf::from("workspace"))
    })
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_config(args: &Cli, workspace: &Path) -> ClientConfig {
    ClientConfig {
        base_url: args.url.clone(),
        username: args.username.clone(),
        password: args.password.clone(),
        timeout: Duration::from(args.timeout),
        user_agent: format!("dhis2-extract/{}", env!("CARGO_PKG_VERSION")),
        cache_dir: args.use_cache.then(|| workspace.join(".cache")),
        cache_max_age: args.cache_max_age.map(Duration::from),
    }
}

/// Validated work for one invocation.
enum Plan {
    Analytics(ExtractionRequest, BatchLimits),
    Metadata(Vec<EntityKind>),
}

pub async fn run(args: Cli) -> Result<()> {
    // Reject bad selectors before touching the network or the filesystem.
    let plan = match &args.job {
        Job::Analytics(a) => Plan::Analytics(a.params().normalize()?, a.limits()),
        Job::Metadata(m) => Plan::Metadata(m.kinds()),
    };

    let workspace = resolve_workspace(&args);
    let cfg = build_config(&args, &workspace);
    let client = Dhis2Client::new(&cfg)?;
    tracing::info!("Connected to {}", client.base_url());

    let default_base = workspace.join("pipelines").join(args.job.name());
    let output_dir =
        output_dir::resolve_output_dir(args.output_dir.as_deref(), &workspace, &default_base)?;

    let mut ctx = RunContext::new(args.job.name());
    match &plan {
        Plan::Analytics(request, limits) => {
            jobs::analytics::run(&client, &mut ctx, &output_dir, request, limits).await?
        }
        Plan::Metadata(kinds) => jobs::metadata::run(&client, &mut ctx, &output_dir, kinds).await?,
    }

    tracing::info!("Run finished with {} output file(s)", ctx.outputs().len());
    print_manifest(&ctx.into_manifest(output_dir, cfg), args.json)
}

fn print_manifest(manifest: &RunManifest, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(manifest).context("serialize run manifest")?;
        println!("{out}");
    } else {
        for o in &manifest.outputs {
            println!("Saved: {}", o.path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dhis2-extract").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn analytics_selectors_accept_repeats_and_commas() {
        let cli = parse(&[
            "--url", "https://dhis2.test",
            "analytics",
            "--data-element", "a,b",
            "--data-element", "c",
            "--org-unit-level", "2",
            "--start", "2021Q1",
            "--end", "2021Q2",
        ]);
        let Job::Analytics(a) = &cli.job else {
            panic!("expected analytics job");
        };
        assert_eq!(a.data_elements, vec!["a", "b", "c"]);
        let req = a.params().normalize().unwrap();
        assert_eq!(req.periods, vec!["2021Q1", "2021Q2"]);
        assert_eq!(req.org_unit_levels, vec![2]);
        assert_eq!(a.limits(), BatchLimits::default());
    }

    #[test]
    fn metadata_flags_select_kinds() {
        let cli = parse(&["--url", "u", "metadata", "--coc", "--org-units"]);
        let Job::Metadata(m) = &cli.job else {
            panic!("expected metadata job");
        };
        assert_eq!(m.kinds(), vec![EntityKind::OrgUnits, EntityKind::CategoryOptionCombos]);

        let cli = parse(&["--url", "u", "metadata", "--all"]);
        let Job::Metadata(m) = &cli.job else {
            panic!("expected metadata job");
        };
        assert_eq!(m.kinds().len(), 9);
    }

    #[test]
    fn config_honours_cache_flag_and_workspace() {
        let ws = Path::new("/data/ws");
        let cli = parse(&["--url", "u", "--workspace", "/data/ws", "metadata"]);
        assert_eq!(resolve_workspace(&cli), ws);
        let cfg = build_config(&cli, ws);
        assert_eq!(cfg.cache_dir, Some(ws.join(".cache")));
        assert_eq!(cfg.timeout, Duration::from_secs(60));

        let cli = parse(&["--url", "u", "--use-cache", "false", "--cache-max-age", "7d", "metadata"]);
        let cfg = build_config(&cli, ws);
        assert_eq!(cfg.cache_dir, None);
        assert_eq!(cfg.cache_max_age, Some(Duration::from_secs(7 * 86_400)));
    }

    #[test]
    fn manifest_json_omits_password() {
        let cli = parse(&["--url", "u", "--password", "secret", "metadata"]);
        let cfg = build_config(&cli, Path::new("ws"));
        let manifest = RunContext::new("job").into_manifest(PathBuf::from("out"), cfg);
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn bad_level_fails_before_any_io() {
        let cli = parse(&[
            "--url", "https://dhis2.test",
            "--workspace", "/nonexistent/never-created",
            "analytics",
            "--indicator", "x",
            "--org-unit-level", "district",
        ]);
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err = rt.block_on(run(cli)).unwrap_err();
        assert!(err.to_string().contains("district"));
        assert!(!Path::new("/nonexistent/never-created").exists());
    }
}
