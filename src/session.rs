//! Front-to-back driver: source text in, [`Outcome`] out.
//!
//! A [`Session`] keeps one interpreter alive across runs, so globals defined
//! by one REPL line are visible to the next.

use log::{debug, info};

use crate::ast::{ExprId, Stmt};
use crate::error::{LoxError, RuntimeError};
use crate::interpreter::{IResult, Interpreter, Printer};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_all;
use crate::value::Value;

/// What a run reports back to its caller.
#[derive(Debug)]
pub enum Outcome {
    /// Ran to completion. Carries the value of a lone REPL expression.
    Success(Option<Value>),

    /// Scan, parse or resolve errors; nothing was executed.
    StaticErrors(Vec<LoxError>),

    /// Execution stopped at the first uncaught runtime error.
    RuntimeError(RuntimeError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

pub struct Session {
    interpreter: Interpreter,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Interpreter::default())
    }
}

impl Session {
    pub fn new(interpreter: Interpreter) -> Self {
        Self { interpreter }
    }

    /// A session whose `print` output goes to `printer`.
    pub fn with_printer(printer: Box<dyn Printer>) -> Self {
        Self::new(Interpreter::new(printer))
    }

    /// The interpreter this session runs on.
    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Run a whole program.
    pub fn run(&mut self, source: &str) -> Outcome {
        info!("Running program of {} bytes", source.len());

        let (statements, transient) = match self.analyze(source) {
            Ok(analyzed) => analyzed,
            Err(errors) => return Outcome::StaticErrors(errors),
        };

        let outcome = match self.interpreter.interpret(&statements) {
            Ok(()) => Outcome::Success(None),
            Err(e) => Outcome::RuntimeError(e),
        };

        self.interpreter.forget_locals(&transient);
        outcome
    }

    /// Run one REPL line. A line consisting of a single expression statement
    /// reports that expression's value.
    pub fn run_line(&mut self, source: &str) -> Outcome {
        let (statements, transient) = match self.analyze(source) {
            Ok(analyzed) => analyzed,
            Err(errors) => return Outcome::StaticErrors(errors),
        };

        let outcome = if let [Stmt::Expression(expr)] = statements.as_slice() {
            debug!("REPL line is a lone expression");
            value_outcome(self.interpreter.evaluate(expr))
        } else {
            match self.interpreter.interpret(&statements) {
                Ok(()) => Outcome::Success(None),
                Err(e) => Outcome::RuntimeError(e),
            }
        };

        self.interpreter.forget_locals(&transient);
        outcome
    }

    /// Evaluate source text that must be exactly one expression, with no
    /// trailing semicolon.
    pub fn evaluate(&mut self, source: &str) -> Outcome {
        info!("Evaluating expression of {} bytes", source.len());

        let (tokens, mut errors) = scan_all(source);

        let expr = match Parser::new(&tokens).parse_expression() {
            Ok(expr) if errors.is_empty() => expr,
            Ok(_) => return Outcome::StaticErrors(errors),
            Err(parse_errors) => {
                errors.extend(parse_errors);
                return Outcome::StaticErrors(errors);
            }
        };

        let transient = match Resolver::new(&mut self.interpreter).resolve_expression(&expr) {
            Ok(transient) => transient,
            Err(errors) => return Outcome::StaticErrors(errors),
        };

        let outcome = value_outcome(self.interpreter.evaluate(&expr));

        self.interpreter.forget_locals(&transient);
        outcome
    }

    /// Scan, parse and resolve. Errors from every stage that ran are
    /// reported together; a failed parse is never resolved.
    fn analyze(&mut self, source: &str) -> Result<(Vec<Stmt>, Vec<ExprId>), Vec<LoxError>> {
        let (tokens, mut errors) = scan_all(source);

        match Parser::new(&tokens).parse() {
            Ok(statements) if errors.is_empty() => {
                let transient = Resolver::new(&mut self.interpreter).resolve(&statements)?;
                Ok((statements, transient))
            }
            Ok(_) => Err(errors),
            Err(parse_errors) => {
                errors.extend(parse_errors);
                Err(errors)
            }
        }
    }
}

fn value_outcome(result: IResult<Value>) -> Outcome {
    match result {
        Ok(value) => Outcome::Success(Some(value)),
        Err(e) => Outcome::RuntimeError(e),
    }
}
