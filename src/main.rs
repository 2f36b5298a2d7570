use eyre::Result;
use structopt::StructOpt;
use wnm::config::Cli;
use wnm::supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::from_args();
    let flags = cli.run_flags();
    let exit_code = supervisor::run(flags, &cli.db_path, cli.rewards_address.clone()).await?;
    std::process::exit(exit_code);
}
