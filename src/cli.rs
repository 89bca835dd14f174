use std::path::PathBuf;

mod terminal;

use clap::ArgAction;
use terminal::Colorize;
use xmind2testlink::{Config, Pipeline};

/// Only `.xmind` files are accepted.
fn parse_xmind_path(s: &str) -> Result<PathBuf, String> {
    if s.ends_with(".xmind") {
        Ok(PathBuf::from(s))
    } else {
        Err("expected the path of a .xmind file".to_string())
    }
}

/// Convert an XMind test design into a TestLink XML file.
///
/// Text following `[PRECONDITIONS]` in a test case's note becomes the test
/// case's preconditions; the text before it becomes the summary.
#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// The path to the .xmind file
    #[arg(value_parser = parse_xmind_path)]
    xmind_file: PathBuf,

    /// A TestLink requirement specification XML file to link test cases to
    #[arg(long, value_name = "PATH")]
    req_xml: Option<PathBuf>,

    /// A TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let mut config = match &self.config {
            Some(path) => Config::load(path).map_err(anyhow::Error::msg)?,
            None => Config::default(),
        };
        if let Some(req_xml) = self.req_xml {
            config.requirements = Some(req_xml);
        }

        let report = Pipeline::new(config).run(&self.xmind_file)?;

        for degradation in &report.degradations {
            eprintln!("{}", format!("warning: {degradation}").warning());
        }
        println!(
            "{}",
            format!("Generated: \"{}\"", report.output.display()).success()
        );
        Ok(())
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}
