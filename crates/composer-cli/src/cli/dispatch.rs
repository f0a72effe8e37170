//! Extract a `Mode` and the shared `Params` from clap's parsed
//! `ArgMatches`.

use std::path::PathBuf;

use clap::ArgMatches;

/// Which of the mutually exclusive command surfaces to run.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// No flag given: emit the serialized composition as pretty JSON.
    PrintSerialized,
    /// `--encode`: emit the conductor-deployable document for an
    /// anonymous composition.
    Encode,
    /// `--deploy NAME`: compile and publish under `name`.
    Deploy { name: String },
}

pub struct Params {
    pub path: PathBuf,
    pub mode: Mode,
    pub apihost: Option<String>,
    pub auth: Option<String>,
    pub insecure: bool,
}

impl Params {
    pub fn from_matches(m: &ArgMatches) -> Self {
        let path = m.get_one::<PathBuf>("path").cloned().expect("required by clap");

        let mode = match m.get_one::<String>("deploy") {
            Some(name) => Mode::Deploy { name: name.clone() },
            None if m.get_flag("encode") => Mode::Encode,
            None => Mode::PrintSerialized,
        };

        Self {
            path,
            mode,
            apihost: m.get_one::<String>("apihost").cloned(),
            auth: m.get_one::<String>("auth").cloned(),
            insecure: m.get_flag("insecure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::build_cli;

    fn params(args: &[&str]) -> Params {
        let matches = build_cli().try_get_matches_from(args).expect("should parse");
        Params::from_matches(&matches)
    }

    #[test]
    fn no_flags_prints_serialized() {
        let p = params(&["composer", "wf.json"]);
        assert_eq!(p.mode, Mode::PrintSerialized);
    }

    #[test]
    fn encode_flag_selects_encode_mode() {
        let p = params(&["composer", "wf.json", "--encode"]);
        assert_eq!(p.mode, Mode::Encode);
    }

    #[test]
    fn deploy_flag_carries_the_name() {
        let p = params(&["composer", "wf.json", "--deploy", "/_/workflow"]);
        assert_eq!(p.mode, Mode::Deploy { name: "/_/workflow".to_string() });
    }

    #[test]
    fn deploy_and_encode_together_is_rejected() {
        let result = build_cli().try_get_matches_from(["composer", "wf.json", "--deploy", "x", "--encode"]);
        assert!(result.is_err());
    }
}
