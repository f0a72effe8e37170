//! Shared argument builders for the composer CLI.
//!
//! One function per flag, so the same definition can be reused or
//! hidden across commands.

use std::path::PathBuf;

use clap::{Arg, ArgAction, value_parser};

/// Path to the composition's serialized source document (positional).
pub fn path_arg() -> Arg {
    Arg::new("path")
        .value_name("PATH")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Path to a serialized composition document (or '-' for stdin)")
}

/// Compile and publish the composition under NAME (--deploy).
pub fn deploy_arg() -> Arg {
    Arg::new("deploy")
        .long("deploy")
        .value_name("NAME")
        .help("Compile and publish the composition under NAME")
}

/// Emit the conductor-deployable document for an anonymous composition
/// (--encode).
pub fn encode_arg() -> Arg {
    Arg::new("encode")
        .long("encode")
        .action(ArgAction::SetTrue)
        .help("Emit the conductor-deployable document for an anonymous composition")
}

/// Target platform API host (--apihost).
pub fn apihost_arg() -> Arg {
    Arg::new("apihost")
        .long("apihost")
        .value_name("HOST")
        .help("Target platform API host")
}

/// Platform auth key (--auth).
pub fn auth_arg() -> Arg {
    Arg::new("auth")
        .long("auth")
        .value_name("KEY")
        .help("Platform auth key")
}

/// Skip TLS certificate verification when deploying (--insecure).
pub fn insecure_arg() -> Arg {
    Arg::new("insecure")
        .long("insecure")
        .action(ArgAction::SetTrue)
        .help("Skip TLS certificate verification when deploying")
}
