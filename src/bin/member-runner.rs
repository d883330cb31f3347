use anyhow::Context;
use clap::{Parser, Subcommand};
use member_runner::{MemberRunner, RunnerConfig, StartOptions};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

/// Start, stop, list and tail local cluster members
#[derive(Parser, Debug)]
#[command(name = "member-runner", version, about)]
struct Cli {
    /// Runner configuration file (JSON); defaults come from the environment
    #[arg(long, global = true)]
    runner_config: Option<PathBuf>,

    /// Home directory holding the registry and member workspaces
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a new member and print its identity
    Start {
        /// Member configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Cluster name; overrides the config file
        #[arg(long)]
        cluster_name: Option<String>,
        /// Port; overrides the config file
        #[arg(short, long)]
        port: Option<String>,
        /// Runtime option passed before the launcher arguments (repeatable)
        #[arg(short = 'J', long = "runtime-option", allow_hyphen_values = true)]
        runtime_options: Vec<String>,
        /// Stay attached until the member exits
        #[arg(long)]
        foreground: bool,
        /// Extra arguments for the member
        #[arg(last = true)]
        extra_args: Vec<String>,
    },
    /// Stop a member and remove it from the registry
    Stop {
        /// Member identity
        identity: String,
    },
    /// List registered members
    List {
        /// Also check whether each process is alive
        #[arg(long)]
        status: bool,
    },
    /// Show a member's log output
    Logs {
        /// Member identity
        identity: String,
        /// Print the last N lines instead of following
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },
    /// Remove registry entries whose process has exited
    Prune,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.runner_config {
        Some(path) => RunnerConfig::from_file(path)
            .with_context(|| format!("loading runner config {}", path.display()))?,
        None => RunnerConfig::from_env(),
    };
    if let Some(home) = cli.home {
        config.home = std::path::absolute(&home)
            .with_context(|| format!("resolving home directory {}", home.display()))?;
    }
    let mut runner = MemberRunner::new(config)?;

    match cli.command {
        Commands::Start {
            config,
            cluster_name,
            port,
            runtime_options,
            foreground,
            extra_args,
        } => {
            let options = StartOptions {
                config_file: config,
                cluster_name,
                port,
                runtime_options,
                extra_args,
                foreground,
            };
            let identity = runner.start(options).await?;
            println!("{}", identity);
        }
        Commands::Stop { identity } => {
            runner.stop(&identity).await?;
            println!("{}", identity);
        }
        Commands::List { status: false } => {
            for record in runner.list()? {
                println!(
                    "{}\tpid={}\tcluster={}\tport={}",
                    record.identity(),
                    record.pid(),
                    record.cluster_name().unwrap_or("-"),
                    record.port().unwrap_or("-")
                );
            }
        }
        Commands::List { status: true } => {
            for (record, health) in runner.list_with_status()? {
                println!("{}\tpid={}\t{}", record.identity(), record.pid(), health);
            }
        }
        Commands::Logs { identity, lines } => {
            let mut stdout = tokio::io::stdout();
            tokio::select! {
                result = runner.logs(&identity, lines, &mut stdout) => result?,
                _ = tokio::signal::ctrl_c() => tracing::debug!("Stopped following logs"),
            }
        }
        Commands::Prune => {
            for record in runner.prune()? {
                println!("{}", record.identity());
            }
        }
    }

    Ok(())
}
