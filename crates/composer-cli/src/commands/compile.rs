//! Default mode: load a composition, validate that it actually compiles,
//! and print it back out as pretty JSON.

use std::path::Path;

use composer_compiler::{Serialized, compile};

use super::source::load_composition;

pub fn run(path: &Path) {
    let composition = load_composition(path);

    let program = compile(&composition.node, "");
    if let Err(e) = program.validate() {
        eprintln!("error: compiled program is invalid: {e}");
        std::process::exit(1);
    }

    let serialized = Serialized::from(composition);
    let text = serde_json::to_string_pretty(&serialized).unwrap_or_else(|e| {
        eprintln!("error: failed to serialize composition: {e}");
        std::process::exit(1);
    });
    println!("{text}");
}
