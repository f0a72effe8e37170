//! `--deploy NAME` mode: name and compile the composition, then publish
//! its attached actions to the platform.

use std::path::Path;

use composer_conductor::encode;

use super::source::load_composition;
use crate::deploy_client::{StubDeployClient, publish};

pub fn run(path: &Path, name: &str, apihost: Option<String>, auth: Option<String>, insecure: bool) {
    let composition = load_composition(path);

    let encoded = encode(composition, Some(name)).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    let actions: Vec<_> = encoded.attached.into_values().collect();
    let mut client = StubDeployClient { apihost, auth, insecure };

    if let Err(e) = publish(&mut client, &actions) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    println!("deployed {name}");
}
