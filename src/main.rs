use evflow_rs::{run, InputArgs};
use std::env;
use std::process;

fn main() {
    tracing_subscriber::fmt()
        .without_time()
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let input_args = InputArgs::build(&args).unwrap_or_else(|err| {
        eprintln!("Problem parsing arguments: {err}");
        process::exit(1);
    });

    if let Err(e) = run(&input_args) {
        eprintln!("Application error: {e}");
        process::exit(1);
    }
}
