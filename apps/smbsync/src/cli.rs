//! Command-line flags. Every flag overrides the matching config file key.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Default, Parser)]
#[command(name = "smbsync", version, about, long_about = None)]
pub struct Cli {
    /// TOML config file; flags given on the command line take precedence.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SMB host the share lives on.
    #[arg(long)]
    pub host: Option<String>,

    /// Account the share was mounted with.
    #[arg(short, long)]
    pub user: Option<String>,

    /// Share name on the host.
    #[arg(short, long)]
    pub shared: Option<String>,

    /// Local directory where the share is mounted.
    #[arg(long, value_name = "DIR")]
    pub mount: Option<PathBuf>,

    /// Case-insensitive regex selecting local file names.
    #[arg(short, long)]
    pub regex: Option<String>,

    /// Local directory to copy files from [default: .]
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Destination directory relative to the share root [default: .]
    #[arg(long = "shared-path", value_name = "DIR")]
    pub shared_path: Option<PathBuf>,

    /// Delete local files after their remote copy is verified.
    #[arg(short, long)]
    pub delete: bool,

    /// Zip each file before copying it.
    #[arg(short, long)]
    pub zip: bool,

    /// Log file receiving JSON records [default: smbsync.log]
    #[arg(short, long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Log level [default: info]
    #[arg(long, value_parser = ["debug", "info", "warn", "error"])]
    pub log_level: Option<String>,

    /// Copy buffer size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub buffer_size: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn flags_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from(["smbsync", "-r", r"\.bak$", "-d", "-z", "-l", "x.log"]).unwrap();
        assert_eq!(cli.regex.as_deref(), Some(r"\.bak$"));
        assert!(cli.delete);
        assert!(cli.zip);
        assert_eq!(cli.log, Some(PathBuf::from("x.log")));
    }

    #[test]
    fn rejects_unknown_log_level() {
        assert!(Cli::try_parse_from(["smbsync", "--log-level", "trace"]).is_err());
    }
}
