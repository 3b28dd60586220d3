use clap::Parser;
use tvmkit::cli::{execute, Cli};
use tvmkit::init_logging;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging()?;
    tracing::info!("tvmkit {} ({})", tvmkit::VERSION, tvmkit::BUILD_DATE);

    let stdout = std::io::stdout();
    execute(&cli, &mut stdout.lock())
}
