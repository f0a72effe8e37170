mod cli;
mod commands;
mod deploy_client;

use cli::{Mode, Params, build_cli};

fn main() {
    let matches = build_cli().get_matches();
    let params = Params::from_matches(&matches);

    match params.mode {
        Mode::PrintSerialized => commands::compile::run(&params.path),
        Mode::Encode => commands::encode::run(&params.path),
        Mode::Deploy { name } => {
            commands::deploy::run(&params.path, &name, params.apihost, params.auth, params.insecure)
        }
    }
}
