//! The composer CLI's argument surface: one positional source path,
//! `--deploy`/`--encode` as mutually exclusive modes, and
//! `--apihost`/`--auth`/`--insecure` for the deploy path.

mod args;
mod dispatch;

pub use dispatch::{Mode, Params};

use clap::{ArgGroup, Command};

/// Malformed input (an unknown flag, or `--deploy` and `--encode`
/// together) makes clap print a usage error and exit with status 2 —
/// distinct from the conductor's own 400/500 codes.
pub fn build_cli() -> Command {
    Command::new("composer")
        .about("Compile and deploy composer workflow compositions")
        .arg(args::path_arg())
        .arg(args::deploy_arg())
        .arg(args::encode_arg())
        .arg(args::apihost_arg())
        .arg(args::auth_arg())
        .arg(args::insecure_arg())
        .group(ArgGroup::new("mode").args(["deploy", "encode"]).multiple(false))
}
