use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use lambda_deploy_core::contract::{normalize_manifest, DeployManifest};

use crate::error::DeployError;
use crate::handlers::archive::{ArchiveOptions, CompressionStrategy};

#[derive(Debug, Parser)]
#[command(name = "lambda-deploy")]
#[command(about = "Package a function and deploy it to one or more regions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the archive once and deploy it to every region in the manifest
    Deploy(DeployArgs),
    /// Build the archive and write it to disk without deploying
    Package(PackageArgs),
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// JSON manifest describing the function and its triggers
    #[arg(long, env = "LAMBDA_DEPLOY_MANIFEST", default_value = "deploy.json")]
    pub manifest: PathBuf,

    /// Directory holding the function source
    #[arg(long, env = "LAMBDA_DEPLOY_SOURCE_DIR", default_value = ".")]
    pub source_dir: PathBuf,

    /// Passed to the post-install hook and used in the artifact file name
    #[arg(long, env = "LAMBDA_DEPLOY_ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Source directory already contains installed dependencies
    #[arg(long, env = "LAMBDA_DEPLOY_PREBUILT")]
    pub prebuilt: bool,

    /// Skip the dependency install step for raw sources
    #[arg(long, env = "LAMBDA_DEPLOY_SKIP_INSTALL")]
    pub skip_install: bool,

    /// Extra exclude globs, on top of the built-in list
    #[arg(
        long = "exclude",
        env = "LAMBDA_DEPLOY_EXCLUDE",
        value_delimiter = ','
    )]
    pub exclude_globs: Vec<String>,

    #[arg(
        long,
        value_enum,
        env = "LAMBDA_DEPLOY_COMPRESSION",
        default_value_t = CompressionStrategy::Auto
    )]
    pub compression: CompressionStrategy,
}

impl BuildArgs {
    pub fn archive_options(&self) -> ArchiveOptions {
        let defaults = ArchiveOptions::default();
        ArchiveOptions {
            environment: self.environment.clone(),
            exclude_globs: self.exclude_globs.clone(),
            prebuilt: self.prebuilt,
            install_command: if self.skip_install {
                None
            } else {
                defaults.install_command
            },
            compression: self.compression,
            dependency_dir: defaults.dependency_dir,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Replaces the manifest's region list
    #[arg(long, env = "LAMBDA_DEPLOY_REGIONS", value_delimiter = ',')]
    pub regions: Vec<String>,

    /// Also persist the artifact under this directory
    #[arg(long, env = "LAMBDA_DEPLOY_PACKAGE_DIR")]
    pub package_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct PackageArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    #[arg(long, env = "LAMBDA_DEPLOY_OUTPUT_DIR", default_value = "dist")]
    pub output_dir: PathBuf,
}

pub fn load_manifest(path: &Path) -> Result<DeployManifest, DeployError> {
    let raw = fs::read_to_string(path).map_err(|error| {
        DeployError::Config(format!(
            "failed to read manifest '{}': {error}",
            path.display()
        ))
    })?;
    parse_manifest(&raw)
}

pub fn parse_manifest(raw: &str) -> Result<DeployManifest, DeployError> {
    let manifest: DeployManifest = serde_json::from_str(raw)
        .map_err(|error| DeployError::Config(format!("failed to parse manifest: {error}")))?;
    Ok(normalize_manifest(manifest)?)
}

/// Swaps in `regions` when non-empty and re-validates.
pub fn with_regions(
    mut manifest: DeployManifest,
    regions: &[String],
) -> Result<DeployManifest, DeployError> {
    if regions.is_empty() {
        return Ok(manifest);
    }
    manifest.function.regions = regions.to_vec();
    Ok(normalize_manifest(manifest)?)
}
