use std::{collections::BTreeMap, env, fs, path::PathBuf};

use serde::Deserialize;

/// One `"section": { "KEY": "value" }` object of `flags.json`.
#[derive(Deserialize)]
struct Section(BTreeMap<String, String>);

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let flags_str =
        fs::read_to_string(PathBuf::from(manifest_dir).join("../../flags.json")).unwrap();
    let sections: BTreeMap<String, Section> = serde_json::from_str(&flags_str).unwrap();
    make_flags(&sections);
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../../flags.json");
}

fn make_flags(sections: &BTreeMap<String, Section>) {
    let mut s = String::new();
    for (name, section) in sections {
        s += format!("#[allow(missing_docs)]\npub mod {} {{\n", name).as_str();
        for (key, value) in &section.0 {
            let value: usize = match value.trim().replace('_', "").parse() {
                Ok(value) => value,
                Err(err) => panic!("Flag {}.{} is not a number: {:?}", name, key, err),
            };
            s += format!("    pub const {}: usize = {};\n", key, value).as_str();
        }
        s += "}\n";
    }
    let out_dir = env::var("OUT_DIR").unwrap();
    fs::write(PathBuf::from(out_dir).join("build_flags.rs"), s).unwrap();
}
