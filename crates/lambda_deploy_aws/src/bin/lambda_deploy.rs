use std::process::ExitCode;

use clap::Parser;
use lambda_deploy_aws::adapters::aws::connect_region;
use lambda_deploy_aws::config::{load_manifest, with_regions, Cli, Command, DeployArgs, PackageArgs};
use lambda_deploy_aws::error::DeployError;
use lambda_deploy_aws::handlers::archive;
use lambda_deploy_aws::handlers::deploy::build_and_deploy;
use lambda_deploy_aws::logging;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Deploy(args) => run_deploy(args).await,
        Command::Package(args) => run_package(&args),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            tracing::error!(error = %error, "lambda-deploy failed");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run_deploy(args: DeployArgs) -> Result<bool, DeployError> {
    let manifest = with_regions(load_manifest(&args.build.manifest)?, &args.regions)?;
    let report = build_and_deploy(
        &manifest,
        &args.build.source_dir,
        &args.build.archive_options(),
        args.package_dir.as_deref(),
        |region| async move { connect_region(&region).await },
    )
    .await?;

    let rendered = serde_json::to_string_pretty(&report.to_json())
        .map_err(|error| DeployError::Config(format!("failed to render report: {error}")))?;
    println!("{rendered}");
    Ok(report.is_success())
}

fn run_package(args: &PackageArgs) -> Result<bool, DeployError> {
    let manifest = load_manifest(&args.build.manifest)?;
    let options = args.build.archive_options();
    let artifact = archive::build(&args.build.source_dir, &options)?;
    let path = archive::write_artifact(
        &args.output_dir,
        &manifest.function.function_name,
        Some(options.environment.as_str()),
        &artifact,
    )?;
    println!("{}", path.display());
    Ok(true)
}
