mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::generate::GenerateArgs;
use pgprov_core::types::Step;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pgprov",
    about = "Generate and drive Terraform + Ansible PostgreSQL replication setups",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root holding pgprov.yaml (default: current directory)
    #[arg(long, global = true, env = "PGPROV_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (default: server.port from pgprov.yaml)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Render main.tf and setup.yml into the output directory
    Generate(GenerateArgs),

    /// terraform init
    Init,

    /// terraform plan
    Plan,

    /// terraform apply, then write inventory.ini from the outputs
    Apply,

    /// Run the playbook against inventory.ini
    Configure,

    /// Show which lifecycle files exist and the next step
    Status,

    /// Check that terraform and ansible-playbook can be found
    Doctor,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Generate(args) => cmd::generate::run(&root, args, cli.json),
        Commands::Init => cmd::step::run(&root, Step::Init, cli.json),
        Commands::Plan => cmd::step::run(&root, Step::Plan, cli.json),
        Commands::Apply => cmd::step::run(&root, Step::Apply, cli.json),
        Commands::Configure => cmd::step::run(&root, Step::ConfigureDatabase, cli.json),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Doctor => cmd::doctor::run(&root, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
