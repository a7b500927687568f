//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = catchment_cli::run() {
        eprintln!("catchment: {err}");
        std::process::exit(1);
    }
}
