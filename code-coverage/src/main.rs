// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate coverage_telemetry;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use code_coverage::attribution::ChangesetAttributor;
use code_coverage::backend::{BackendClient, IIngestion};
use code_coverage::commit_coverage::CommitCoverageGenerator;
use code_coverage::config::Config;
use code_coverage::covdir::covdir_paths;
use code_coverage::hgmo::HgmoClient;
use code_coverage::index::IndexDownloader;
use code_coverage::storage::StorageClient;
use code_coverage::store::{ReportDescriptor, ReportStore, DEFAULT_FILTER};
use code_coverage::uploader::CovdirUploader;

#[derive(Parser, Debug)]
#[command(version, about = "Code coverage report upload and commit coverage analysis")]
struct Opt {
    /// Path of the JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Attribute coverage to every changeset with a new overall report.
    CommitCoverage {
        #[arg(long, default_value = "mozilla-central")]
        repository: String,
    },

    /// Upload a covdir report and trigger its ingestion.
    Upload {
        #[command(flatten)]
        report: ReportArgs,

        report_path: PathBuf,
    },

    /// Upload the latest zero coverage report.
    UploadZeroCoverage { report_path: PathBuf },

    /// Check whether a covdir report was already uploaded.
    Exists {
        #[command(flatten)]
        report: ReportArgs,
    },

    /// Print the file paths of a covdir report.
    Paths { report_path: PathBuf },

    /// Print the reports most recently ingested by the backend.
    Latest {
        #[arg(long)]
        repository: String,
    },
}

#[derive(Args, Debug)]
struct ReportArgs {
    #[arg(long)]
    repository: String,

    #[arg(long)]
    revision: String,

    #[arg(long, default_value = DEFAULT_FILTER)]
    platform: String,

    #[arg(long, default_value = DEFAULT_FILTER)]
    suite: String,
}

impl From<ReportArgs> for ReportDescriptor {
    fn from(args: ReportArgs) -> Self {
        ReportDescriptor::new(args.repository, args.revision, args.platform, args.suite)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let opt = Opt::parse();

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run(opt));

    if let Err(err) = &result {
        error!("error running code coverage bot: {:?}", err);
    }

    result
}

async fn run(opt: Opt) -> Result<()> {
    let config = opt.config.as_deref();

    match opt.command {
        Command::CommitCoverage { repository } => {
            let config = load_config(config).await?;
            commit_coverage(&config, &repository).await
        }
        Command::Upload {
            report,
            report_path,
        } => {
            let config = load_config(config).await?;
            let report: ReportDescriptor = report.into();
            let data = read_report(&report_path).await?;
            let object = uploader(&config)?.upload(&report, &data).await?;
            println!("{}", object);
            Ok(())
        }
        Command::UploadZeroCoverage { report_path } => {
            let config = load_config(config).await?;
            let data = read_report(&report_path).await?;
            let object = uploader(&config)?.upload_zero_coverage(&data).await?;
            println!("{}", object);
            Ok(())
        }
        Command::Exists { report } => {
            let config = load_config(config).await?;
            let exists = report_store(&config)?.exists(&report.into()).await?;
            println!("{}", exists);
            Ok(())
        }
        Command::Paths { report_path } => print_paths(&report_path).await,
        Command::Latest { repository } => {
            let config = load_config(config).await?;
            let latest = BackendClient::new(config.backend_host.clone())
                .latest(&repository)
                .await?;
            println!("{}", serde_json::to_string_pretty(&latest)?);
            Ok(())
        }
    }
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.ok_or_else(|| format_err!("--config is required for this command"))?;
    Config::load(path).await
}

async fn commit_coverage(config: &Config, repository: &str) -> Result<()> {
    let source = IndexDownloader::new(config.index_url()?);
    let history = HgmoClient::new(config.hgmo_url()?, repository);
    let attributor = ChangesetAttributor::new(
        Box::new(history),
        Box::new(config.attributor(repository)?),
    );

    let generator = CommitCoverageGenerator::new(
        repository,
        Box::new(source),
        report_store(config)?,
        attributor,
        config.codec(),
    )
    .with_artifacts_dir(config.artifacts_dir.clone());

    let index = generator.run().await?;
    info!("commit coverage index holds {} commits", index.len());

    Ok(())
}

fn report_store(config: &Config) -> Result<ReportStore> {
    let objects = StorageClient::new(config.bucket_url()?, config.access_token.clone());
    Ok(ReportStore::new(Box::new(objects), config.codec()))
}

fn uploader(config: &Config) -> Result<CovdirUploader> {
    let backend = BackendClient::new(config.backend_host.clone());
    Ok(CovdirUploader::new(report_store(config)?, Box::new(backend)))
}

async fn read_report(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading report {}", path.display()))
}

async fn print_paths(path: &Path) -> Result<()> {
    let data = read_report(path).await?;
    let report = serde_json::from_slice(&data)
        .with_context(|| format!("parsing report {}", path.display()))?;

    for path in covdir_paths(report)? {
        println!("{}", path);
    }

    Ok(())
}
