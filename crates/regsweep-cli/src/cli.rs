use std::path::PathBuf;

use clap::{value_parser, ArgAction, Parser};

pub const REGSWEEP_ABOUT: &str = "Find and remove blobs that no tag in a Docker registry references";

pub const REGSWEEP_AFTER_HELP: &str = concat!(
    "Environment:\n",
    "  DOCKER_REGISTRY_HOST   registry API host (default: registry)\n",
    "  DOCKER_REGISTRY_PORT   registry API port (default: 5000)\n",
    "  DOCKER_REGISTRY_PATH   storage root on disk (default: /var/lib/registry)\n",
    "  REGSWEEP_WORKERS       concurrent size lookups and deletions (default: 4)\n",
    "  REGSWEEP_HTTP_TIMEOUT  per-request timeout in seconds (default: 30)\n\n",
    "Flags override the environment. Without --delete nothing is removed.\n",
);

#[derive(Parser, Debug)]
#[command(author, version, about = REGSWEEP_ABOUT, after_help = REGSWEEP_AFTER_HELP)]
#[allow(clippy::struct_excessive_bools)]
pub struct RegsweepCli {
    #[arg(long, value_name = "HOST", help = "Registry API host")]
    pub host: Option<String>,
    #[arg(long, value_name = "PORT", help = "Registry API port")]
    pub port: Option<u16>,
    #[arg(
        long,
        value_name = "DIR",
        value_parser = value_parser!(PathBuf),
        help = "Registry storage root (the directory holding docker/registry/v2)"
    )]
    pub path: Option<PathBuf>,
    #[arg(long, help = "Remove detached blobs instead of only reporting them")]
    pub delete: bool,
    #[arg(long, value_name = "N", help = "Concurrent size lookups and deletions")]
    pub workers: Option<usize>,
    #[arg(long, value_name = "SECS", help = "Per-request HTTP timeout in seconds")]
    pub timeout: Option<u64>,
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)"
    )]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q")]
    pub trace: bool,
    #[arg(long, help = "Emit a {status,message,details} JSON envelope")]
    pub json: bool,
    #[arg(long, help = "Disable colored human output")]
    pub no_color: bool,
}
