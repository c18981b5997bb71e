use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackweave")]
#[command(version)]
#[command(
    about = "CloudFormation macro that instruments Lambda functions and forwards their logs",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the macro on an invocation envelope and print the response
    Transform(TransformArgs),

    /// List functions, runtimes and log group names of a template
    Inspect(InspectArgs),

    /// Show what the template mutations change (no remote calls)
    Diff(DiffArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct TransformArgs {
    /// Invocation envelope (JSON); `-` reads stdin
    #[arg(short, long)]
    pub event: PathBuf,

    /// Write the response here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log groups reconciled in parallel
    #[arg(short, long, env = "STACKWEAVE_JOBS")]
    pub jobs: Option<usize>,

    /// Describe log groups but create and subscribe nothing
    #[arg(long)]
    pub dry_run: bool,

    /// AWS credentials profile
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Template (JSON), or an invocation envelope containing one
    #[arg(short, long)]
    pub template: PathBuf,

    /// Stack name used to predict generated log group names
    #[arg(long)]
    pub stack_name: Option<String>,

    /// Region used for pseudo parameters
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Account used for pseudo parameters
    #[arg(long, default_value = "123456789012")]
    pub account_id: String,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Invocation envelope (JSON); `-` reads stdin
    #[arg(short, long)]
    pub event: PathBuf,
}
