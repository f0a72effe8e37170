//! Load a composition document from a file path, or stdin when the path
//! is `-`.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use composer_compiler::{Composition, Serialized};

pub fn load_composition(path: &Path) -> Composition {
    let text = read_text(path);
    let serialized: Serialized = serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("error: {} is not a valid composition document: {e}", path.display());
        std::process::exit(1);
    });
    serialized.into_composition()
}

fn read_text(path: &Path) -> String {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).unwrap_or_else(|e| {
            eprintln!("error: failed to read stdin: {e}");
            std::process::exit(1);
        });
        return buf;
    }
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: failed to read {}: {e}", path.display());
        std::process::exit(1);
    })
}
