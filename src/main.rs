//! Command-line interface for converting mind maps to TestLink XML.

use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
