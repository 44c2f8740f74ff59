#![forbid(unsafe_code)]

use std::process::exit;

use refjson::{Options, Ty, TypeRegistry, WriterOptions, from_reader_with_options, to_string_with_options};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: refjson [--pretty] [--auto-type] [--unquoted-keys] <file>\n\
    Reads the given document (comments, single quotes, @tag/@ref references allowed), \
    reports the first error, or prints the document back in canonical form.";

/// Validate a document and print it back. Exit codes: 1 usage, 2 I/O, 3 invalid input.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut pretty = false;
    let mut options = Options::default();
    let mut path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--pretty" => pretty = true,
            "--auto-type" => options.auto_type = true,
            "--unquoted-keys" => options.allow_unquoted_object_keys = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                return;
            }
            flag if flag.starts_with("--") => {
                eprintln!("unknown option {flag}\n{USAGE}");
                exit(1);
            }
            extra if path.is_some() => {
                eprintln!("unexpected extra argument {extra}\n{USAGE}");
                exit(1);
            }
            _ => path = Some(arg),
        }
    }
    let Some(path) = path else {
        eprintln!("{USAGE}");
        exit(1);
    };

    let file = match std::fs::File::open(&path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Failed to read {path}: {err}");
            exit(2);
        }
    };

    let registry = TypeRegistry::new();
    let value = match from_reader_with_options(&registry, file, &Ty::Any, options) {
        Ok(value) => value,
        Err(refjson::Error::IOError { cause }) => {
            eprintln!("Failed to read {path}: {cause}");
            exit(2);
        }
        Err(err) => {
            eprintln!("{path} invalid:\n{err}");
            exit(3);
        }
    };
    tracing::debug!(path = %path, "document read");

    let writer_options = WriterOptions {
        pretty,
        ..WriterOptions::default()
    };
    match to_string_with_options(&registry, &value, &Ty::Any, writer_options) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("Failed to write {path}: {err}");
            exit(3);
        }
    }
}
