pub mod error;
pub mod input;
mod log;
pub mod network;
pub mod optimizer;
pub mod output;
mod report;
pub mod scenario;
pub mod series;
pub mod solver;

pub use error::{Error, Result};
pub use network::Network;
pub use optimizer::{optimize, SolverOptions};

use input::Input;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

pub fn run(input_args: &InputArgs) -> Result<()> {
    log::show_greeting();

    let begin = Instant::now();
    let path: &Path = &input_args.path;
    log::input_reading_line(path);
    let input = Input::build(path)?;

    let mut network = input.build_network()?;
    log::network_greeting(&network);

    let solve_begin = Instant::now();
    let objective = optimize(&mut network, &input.config.solver)?;
    log::optimization_duration(solve_begin.elapsed());
    info!(objective, "network optimized");

    log::capacities_table(&network)?;
    log::dispatch_table(&network)?;
    log::summary(&network)?;

    log::output_generation_line(path);
    output::generate_outputs(&network, path)?;

    log::show_farewell(begin.elapsed());

    Ok(())
}

pub struct InputArgs {
    pub path: PathBuf,
}

impl InputArgs {
    pub fn build(args: &[String]) -> std::result::Result<Self, &'static str> {
        if args.len() < 2 {
            return Err("Not enough arguments [PATH]");
        }

        let path = PathBuf::from(&args[1]);

        Ok(Self { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_input_args() {
        let args = vec![String::from("evflow"), String::from("demos/bev")];
        let input_args = InputArgs::build(&args).unwrap();
        assert_eq!(input_args.path, PathBuf::from("demos/bev"));
    }

    #[test]
    fn test_build_input_args_without_path() {
        let args = vec![String::from("evflow")];
        assert!(InputArgs::build(&args).is_err());
    }
}
