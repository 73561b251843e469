use xambuild::cli::CliArgs;
use xambuild::pipeline::{Pipeline, PipelineReport};
use xambuild::util::logging;
use xambuild::VERSION;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("xambuild v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match run(&args).await {
        Ok(report) => {
            debug!(
                commands = report.commands.len(),
                skipped = report.skipped_duplicates,
                artifacts = report.artifacts.len(),
                test_runs = report.test_runs,
                "pipeline finished"
            );
            0
        }
        Err(err) => {
            error!("{:#}", err);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run(args: &CliArgs) -> anyhow::Result<PipelineReport> {
    let pipeline = Pipeline::new(args.to_config());
    pipeline
        .run(args.mode, args.dry_run)
        .await
        .with_context(|| format!("build of {} failed", args.solution_graph.display()))
}

fn init_logging_from_args(args: &CliArgs) {
    if let Some(level) = &args.log_level {
        logging::with_level(level);
    } else if args.verbose {
        logging::with_level("debug");
    } else if args.quiet {
        logging::with_level("error");
    } else {
        logging::init_from_env();
    }
}
