//! Command-line flags. Anything given here overrides the config file.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use super::logging::LogDestination;

/// Harvests the text or scanned pages of every issue listed in a manifest.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// RON manifest listing the issues and their text/scan URLs
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Optional RON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root directory for harvested issues and metadata.json
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pages of one issue fetched in parallel
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogTarget::Both)]
    pub log: LogTarget,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_is_the_only_required_flag() {
        let cli = Cli::parse_from(["archive-harvester", "--manifest", "issues.ron"]);
        assert_eq!(cli.manifest, PathBuf::from("issues.ron"));
        assert_eq!(cli.config, None);
        assert_eq!(cli.log, LogTarget::Both);
    }

    #[test]
    fn overrides_parse() {
        let cli = Cli::parse_from([
            "archive-harvester",
            "-m",
            "issues.ron",
            "-o",
            "/tmp/archive",
            "--concurrency",
            "3",
            "--log",
            "terminal",
        ]);
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/archive")));
        assert_eq!(cli.concurrency, Some(3));
        assert_eq!(cli.log, LogTarget::Terminal);
    }
}
