//! `--encode` mode: emit the conductor-deployable document for an
//! anonymous composition.

use std::path::Path;

use composer_compiler::Serialized;
use composer_conductor::encode;

use super::source::load_composition;

pub fn run(path: &Path) {
    let composition = load_composition(path);

    let encoded = encode(composition, None).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    let serialized = Serialized::from(encoded);
    let text = serde_json::to_string_pretty(&serialized).unwrap_or_else(|e| {
        eprintln!("error: failed to serialize composition: {e}");
        std::process::exit(1);
    });
    println!("{text}");
}
