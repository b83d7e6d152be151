use anyhow::Result;
use clap::Parser;
use secscan::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
