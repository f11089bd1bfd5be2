//! scanforge CLI binary.
//!
//! This is the minimal entrypoint; all logic lives in the library.

fn main() {
    if let Err(code) = sf_cli::run() {
        std::process::exit(code.as_i32());
    }
}
