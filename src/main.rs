use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::error::{LoxError, RuntimeError};
use rox::parser::Parser;
use rox::scanner::{scan_all, Scanner};
use rox::session::{Outcome, Session};

/// Exit status for scan/parse/resolve failures.
const EXIT_STATIC: i32 = 65;
/// Exit status for an uncaught runtime error.
const EXIT_RUNTIME: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking interpreter for the Rox scripting language", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print tokens as JSON objects, one per line
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a program
    Run { filename: Option<PathBuf> },

    /// Starts an interactive prompt
    Repl,
}

/// Reads the contents of a file as UTF-8 text.
fn read_file(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    let text = String::from_utf8(buf).map_err(LoxError::from)?;
    Ok(text)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'rox::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn report_static(errors: &[LoxError]) {
    for e in errors {
        debug!("Static error: {}", e);
        eprintln!("{}", e);
    }
}

fn report_runtime(e: &RuntimeError) {
    debug!("Runtime error: {}", e);
    eprintln!("{}", e);
    for frame in &e.trace {
        eprintln!("{}", frame);
    }
}

/// Print what went wrong, if anything, and pick the exit status.
fn report(outcome: &Outcome) -> i32 {
    match outcome {
        Outcome::Success(_) => 0,
        Outcome::StaticErrors(errors) => {
            report_static(errors);
            EXIT_STATIC
        }
        Outcome::RuntimeError(e) => {
            report_runtime(e);
            EXIT_RUNTIME
        }
    }
}

fn missing_file(command: &str) -> ! {
    info!("No filepath provided for {}", command);
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

fn tokenize(source: &str, json: bool) -> Result<i32> {
    let mut tokenized = true;

    for token in Scanner::new(source) {
        match token {
            Ok(token) if json => println!("{}", serde_json::to_string(&token)?),
            Ok(token) => println!("{}", token),
            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    Ok(if tokenized { 0 } else { EXIT_STATIC })
}

fn parse_expression(source: &str) -> i32 {
    let (tokens, errors) = scan_all(source);
    if !errors.is_empty() {
        report_static(&errors);
        return EXIT_STATIC;
    }

    match Parser::new(&tokens).parse_expression() {
        Ok(expr) => {
            println!("{}", AstPrinter::print(&expr));
            0
        }
        Err(errors) => {
            report_static(&errors);
            EXIT_STATIC
        }
    }
}

fn evaluate_expression(source: &str) -> i32 {
    match Session::default().evaluate(source) {
        Outcome::Success(Some(value)) => {
            println!("{}", value);
            0
        }
        outcome => report(&outcome),
    }
}

fn repl() -> Result<()> {
    info!("Starting REPL");

    let mut session = Session::default();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush().context("Failed to flush prompt")?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        // Errors are shown and the session carries on.
        match session.run_line(&line) {
            Outcome::Success(Some(value)) => println!("{}", value),
            outcome => {
                report(&outcome);
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let code = match args.commands {
        None | Some(Commands::Repl) => {
            repl()?;
            0
        }

        Some(Commands::Tokenize { filename, json }) => {
            let filename = filename.unwrap_or_else(|| missing_file("Tokenize"));
            tokenize(&read_file(filename)?, json)?
        }

        Some(Commands::Parse { filename }) => {
            let filename = filename.unwrap_or_else(|| missing_file("Parse"));
            parse_expression(&read_file(filename)?)
        }

        Some(Commands::Evaluate { filename }) => {
            let filename = filename.unwrap_or_else(|| missing_file("Evaluate"));
            evaluate_expression(&read_file(filename)?)
        }

        Some(Commands::Run { filename }) => {
            let filename = filename.unwrap_or_else(|| missing_file("Run"));
            let source = read_file(filename)?;

            let mut session = Session::default();
            report(&session.run(&source))
        }
    };

    if code != 0 {
        debug!("Exiting with code {}", code);
        std::process::exit(code);
    }

    Ok(())
}
