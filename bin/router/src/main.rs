use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use waypoint_core::StageId;
use waypoint_router::{CliError, Output, RequestSource, RouterConfig, commands};

#[derive(Parser)]
#[command(name = "waypoint-router", version, about = "Validate, edit and route waypoint workflows")]
struct Cli {
    /// Path to config file (defaults to ./waypoint.toml when present)
    #[arg(short, long, env = "WAYPOINT_CONFIG")]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a workflow and list every violation
    Validate {
        /// Workflow definition document
        workflow: PathBuf,
    },
    /// Show a workflow summary and each stage's status
    Inspect {
        /// Workflow definition document
        workflow: PathBuf,
    },
    /// List the stages a new route from a stage may target
    Candidates {
        /// Workflow definition document
        workflow: PathBuf,
        /// Source stage
        #[arg(long)]
        stage: StageId,
    },
    /// Decide the next stage for submitted data
    Route {
        /// Workflow definition document
        workflow: PathBuf,
        /// Completed stage
        #[arg(long, required_unless_present = "request")]
        stage: Option<StageId>,
        /// Submitted data as a JSON object
        #[arg(long, conflicts_with = "request")]
        data: Option<String>,
        /// File holding a full evaluation request
        #[arg(long, conflicts_with = "stage")]
        request: Option<PathBuf>,
    },
    /// Apply a graph mutation (or a JSON array of them)
    Edit {
        /// Workflow definition document
        workflow: PathBuf,
        /// Mutation JSON, e.g. {"action":"add_stage","name":"Review"}
        #[arg(long)]
        mutation: String,
        /// Write the edited workflow here when it is valid
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match RouterConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", CliError::Config { details: e.to_string() });
            return ExitCode::from(2);
        }
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let pretty = cli.pretty || config.pretty;
    let result = run(&config, cli.command).and_then(|output| {
        let rendered = output.render(pretty)?;
        Ok((rendered, output.success))
    });

    match result {
        Ok((rendered, success)) => {
            println!("{rendered}");
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(report) => {
            tracing::error!("command failed");
            eprintln!("{report}");
            ExitCode::from(2)
        }
    }
}

fn run(
    config: &RouterConfig,
    command: Commands,
) -> Result<Output, rootcause::prelude::Report<CliError>> {
    match command {
        Commands::Validate { workflow } => commands::validate(&workflow),
        Commands::Inspect { workflow } => commands::inspect(&workflow),
        Commands::Candidates { workflow, stage } => commands::candidates(&workflow, &stage),
        Commands::Route {
            workflow,
            stage,
            data,
            request,
        } => {
            let source = match (request, stage) {
                (Some(path), _) => RequestSource::File(path),
                (None, Some(stage_id)) => RequestSource::Inline { stage_id, data },
                (None, None) => {
                    return Err(CliError::InvalidArgument {
                        name: "stage",
                        details: "either --stage or --request is required".to_string(),
                    }
                    .into());
                }
            };
            commands::route(config, &workflow, source)
        }
        Commands::Edit {
            workflow,
            mutation,
            output,
        } => commands::edit(config, &workflow, &mutation, output.as_deref()),
    }
}
