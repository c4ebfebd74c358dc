//! A line-based front end for the solver.
//!
//! ```text
//! y = x^2 + 8x        define a formula
//! x = 3               set a value
//! y                   evaluate a name
//! sample y x -1 1 0.5 evaluate y for x in [-1, 1) with a step of 0.5
//! list                show every known value
//! ```
//!
//! Set `EQSOLVE_LOG` to `debug`, `info`, `warn` or `error` to control logging.

use eqsolve::{Equation, Solver, Sweep};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode,
};
use std::{
    error::Error,
    io::{BufRead, BufReader},
};

fn main() -> Result<(), Box<dyn Error>> {
    let level = match std::env::var("EQSOLVE_LOG").as_deref() {
        Ok("debug") => LevelFilter::Debug,
        Ok("info") => LevelFilter::Info,
        Ok("error") => LevelFilter::Error,
        _ => LevelFilter::Warn,
    };
    CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])?;

    let mut solver = Solver::new();
    let stdin = std::io::stdin();

    for line in BufReader::new(stdin.lock()).lines() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if let Err(e) = execute(&mut solver, line) {
            eprintln!("Error: {}", e);

            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
        }
    }

    Ok(())
}

fn execute(solver: &mut Solver, line: &str) -> Result<(), Box<dyn Error>> {
    let words: Vec<_> = line.split_whitespace().collect();

    match words.as_slice() {
        ["list"] => {
            for (name, value) in solver.snapshot_values() {
                println!("  {} = {}", name, value);
            }
        },
        ["sample", target, sweep_var, start, end, step] => {
            let range = start.parse::<f64>()?..end.parse::<f64>()?;
            let sweep = Sweep::new(range, step.parse::<f64>()?)?;

            for (input, output) in solver.sample(target, sweep_var, sweep)? {
                println!("  {}\t{}", input, output);
            }
        },
        _ if line.contains('=') => {
            let equation: Equation = line.parse()?;
            solver.push(equation)?;
        },
        [name] => println!("  {} = {}", name, solver.evaluate(name)?),
        _ => return Err(format!("Unable to understand \"{}\"", line).into()),
    }

    Ok(())
}
