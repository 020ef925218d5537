//! Tree-walking evaluator.
//!
//! Statements execute to a [`Flow`]: either they complete normally or a
//! `return` is unwinding toward the nearest call boundary. Runtime errors
//! travel separately in the `Err` arm and are never caught by the language.
//!
//! Variable access uses the resolver's side table (`locals`): a recorded
//! hop count means a direct `get_at`/`assign_at`, no entry means a global
//! looked up by name.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{
    BinaryOp, ClassDecl, Expr, ExprId, Identifier, LiteralValue, LogicalOp, Stmt, UnaryOp, VarRef,
};
use crate::environment::{EnvRef, Environment};
use crate::error::RuntimeError;
use crate::value::{BoundMethod, Callable, Class, Instance, LoxFunction, NativeFunction, Value};

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, RuntimeError>;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// Destination of `print` statements: one call per executed statement.
pub trait Printer {
    fn print(&mut self, text: &str);
}

/// Writes each printed value on its own stdout line.
#[derive(Debug, Default)]
pub struct Stdout;

impl Printer for Stdout {
    fn print(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// Collects printed lines in memory; clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct SharedBuffer(Rc<RefCell<Vec<String>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

impl Printer for SharedBuffer {
    fn print(&mut self, text: &str) {
        self.0.borrow_mut().push(text.to_string());
    }
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: HashMap<ExprId, usize>,
    printer: Box<dyn Printer>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Box::new(Stdout))
    }
}

impl Interpreter {
    /// Creates a new Interpreter and defines native functions such as `clock`.
    pub fn new(printer: Box<dyn Printer>) -> Self {
        info!("Initializing Interpreter");

        let globals = Environment::new().into_ref();

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::Callable(Callable::Native(Rc::new(NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: |_args: &[Value]| {
                    let millis = Utc::now().timestamp_millis();
                    Ok(Value::Number(millis as f64 / 1000.0))
                },
            }))),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            printer,
        }
    }

    /// Adopt the binding depths of a successfully resolved program.
    pub fn note_locals(&mut self, locals: HashMap<ExprId, usize>) {
        debug!("Recording {} resolved local(s)", locals.len());
        self.locals.extend(locals);
    }

    /// Drop depths for nodes that will never be evaluated again.
    pub fn forget_locals(&mut self, ids: &[ExprId]) {
        for id in ids {
            self.locals.remove(id);
        }
    }

    /// Number of nodes with a recorded binding depth.
    pub fn resolved_locals(&self) -> usize {
        self.locals.len()
    }

    /// Interprets a list of statements (a "program").
    pub fn interpret(&mut self, statements: &[Stmt]) -> IResult<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            // A top-level `return` is rejected by the resolver; stop if one
            // slips through.
            if let Flow::Return(_) = self.execute(stmt)? {
                break;
            }
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> IResult<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                self.printer.print(&value.to_string());
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env = Environment::with_enclosing(Rc::clone(&self.environment)).into_ref();
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let flow @ Flow::Return(_) = self.execute(body)? {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.display_name());

                let function = LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment));
                self.environment.borrow_mut().define(
                    decl.display_name(),
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }

            Stmt::Class(decl) => self.execute_class(decl),
        }
    }

    /// Run `statements` inside `env`, restoring the current scope afterwards
    /// whether they finish, return, or fail.
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvRef) -> IResult<Flow> {
        let previous = std::mem::replace(&mut self.environment, env);

        let mut result = Ok(Flow::Normal);
        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    fn execute_class(&mut self, decl: &ClassDecl) -> IResult<Flow> {
        debug!("Declaring class '{}'", decl.name.lexeme);

        let superclass = match &decl.superclass {
            Some(var) => match self.look_up_variable(var)? {
                Value::Callable(Callable::Class(class)) => Some(class),
                _ => {
                    return Err(RuntimeError::new(
                        var.name.line,
                        "Superclass must be a class.",
                    ))
                }
            },
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(&decl.name.lexeme, Value::Nil);

        // Methods of a subclass close over an extra scope holding `super`.
        let method_env = match &superclass {
            Some(class) => {
                let mut env = Environment::with_enclosing(Rc::clone(&self.environment));
                env.define("super", Value::Callable(Callable::Class(Rc::clone(class))));
                env.into_ref()
            }
            None => Rc::clone(&self.environment),
        };

        let methods: HashMap<String, Rc<LoxFunction>> = decl
            .methods
            .iter()
            .map(|method| {
                (
                    method.display_name().to_string(),
                    Rc::new(LoxFunction::new(Rc::clone(method), Rc::clone(&method_env))),
                )
            })
            .collect();

        let class = Class {
            name: decl.name.lexeme.clone(),
            superclass,
            methods,
        };

        info!(
            "Class '{}' defined with {} method(s)",
            class.name,
            class.methods.len()
        );

        self.environment.borrow_mut().define(
            &decl.name.lexeme,
            Value::Callable(Callable::Class(Rc::new(class))),
        );
        Ok(Flow::Normal)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::from(s.as_str()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary {
                operator,
                line,
                right,
            } => {
                let right = self.evaluate(right)?;
                self.evaluate_unary(*operator, *line, right)
            }

            Expr::Binary {
                left,
                operator,
                line,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                evaluate_binary(*operator, *line, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                let short_circuit = match operator {
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::And => !left.is_truthy(),
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable(var) => self.look_up_variable(var),

            Expr::Assign { target, value } => {
                let value = self.evaluate(value)?;
                self.assign_variable(target, value.clone())?;
                Ok(value)
            }

            Expr::Call {
                callee,
                line,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call_value(callee, args, *line)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(RuntimeError::new(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(RuntimeError::new(name.line, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.set(&name.lexeme, value.clone());
                Ok(value)
            }

            Expr::This { id, line } => self.look_up_local(*id, "this", *line),

            Expr::Super { id, line, method } => self.evaluate_super(*id, *line, method),

            Expr::Function(decl) => {
                let function = LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment));
                Ok(Value::Callable(Callable::Function(Rc::new(function))))
            }
        }
    }

    fn evaluate_unary(&self, operator: UnaryOp, line: usize, right: Value) -> IResult<Value> {
        match operator {
            UnaryOp::Minus => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::new(
                    line,
                    "Operand of '-' must be a number.",
                )),
            },
            UnaryOp::Bang => Ok(Value::Bool(!right.is_truthy())),
        }
    }

    fn evaluate_super(
        &mut self,
        id: ExprId,
        line: usize,
        method: &Identifier,
    ) -> IResult<Value> {
        let Some(&depth) = self.locals.get(&id) else {
            return Err(mismatch("super", line));
        };

        let superclass = match Environment::get_at(&self.environment, depth, "super") {
            Some(Value::Callable(Callable::Class(class))) => class,
            _ => return Err(mismatch("super", line)),
        };

        // `this` lives in the scope just inside the one binding `super`.
        let receiver = match depth
            .checked_sub(1)
            .and_then(|d| Environment::get_at(&self.environment, d, "this"))
        {
            Some(Value::Instance(instance)) => instance,
            _ => return Err(mismatch("this", line)),
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Callable(Callable::Bound(Rc::new(BoundMethod {
                receiver,
                method: found,
            })))),
            None => Err(RuntimeError::new(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    fn look_up_variable(&self, var: &VarRef) -> IResult<Value> {
        match self.locals.get(&var.id) {
            Some(&depth) => Environment::get_at(&self.environment, depth, &var.name.lexeme)
                .ok_or_else(|| mismatch(&var.name.lexeme, var.name.line)),
            None => self.globals.borrow().get(&var.name),
        }
    }

    fn look_up_local(&self, id: ExprId, name: &str, line: usize) -> IResult<Value> {
        self.locals
            .get(&id)
            .and_then(|&depth| Environment::get_at(&self.environment, depth, name))
            .ok_or_else(|| mismatch(name, line))
    }

    fn assign_variable(&mut self, var: &VarRef, value: Value) -> IResult<()> {
        match self.locals.get(&var.id) {
            Some(&depth) => {
                if Environment::assign_at(&self.environment, depth, &var.name.lexeme, value) {
                    Ok(())
                } else {
                    Err(mismatch(&var.name.lexeme, var.name.line))
                }
            }
            None => self.globals.borrow_mut().assign(&var.name, value),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    /// Invokes a callable value with already-evaluated arguments.
    pub fn call_value(&mut self, callee: Value, args: Vec<Value>, line: usize) -> IResult<Value> {
        let Value::Callable(callable) = callee else {
            return Err(RuntimeError::new(
                line,
                "Can only call functions and classes.",
            ));
        };

        if args.len() != callable.arity() {
            return Err(RuntimeError::new(
                line,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    args.len()
                ),
            ));
        }

        match callable {
            Callable::Native(native) => {
                debug!("Calling native function '{}'", native.name);
                (native.func)(&args).map_err(|msg| RuntimeError::new(line, msg))
            }

            Callable::Function(function) => {
                let closure = Rc::clone(&function.closure);
                self.call_function(&function, closure, args, line)
            }

            Callable::Bound(bound) => self.call_bound(&bound.method, &bound.receiver, args, line),

            Callable::Class(class) => {
                debug!("Instantiating class '{}'", class.name);

                let instance = Rc::new(Instance::new(Rc::clone(&class)));

                if let Some(init) = class.find_method("init") {
                    // Whatever `init` returns, the call yields the instance.
                    self.call_bound(&init, &instance, args, line)?;
                }

                Ok(Value::Instance(instance))
            }
        }
    }

    /// Call `method` with `this` bound to `receiver` in a scope between the
    /// method's closure and its parameters.
    fn call_bound(
        &mut self,
        method: &Rc<LoxFunction>,
        receiver: &Rc<Instance>,
        args: Vec<Value>,
        line: usize,
    ) -> IResult<Value> {
        let mut this_env = Environment::with_enclosing(Rc::clone(&method.closure));
        this_env.define("this", Value::Instance(Rc::clone(receiver)));

        self.call_function(method, this_env.into_ref(), args, line)
    }

    /// Bind parameters in a fresh scope under `closure` and run the body.
    /// A `return` stops here and becomes the call's value.
    fn call_function(
        &mut self,
        function: &LoxFunction,
        closure: EnvRef,
        args: Vec<Value>,
        line: usize,
    ) -> IResult<Value> {
        let name = function.declaration.display_name();
        debug!("Calling user-defined function '{}'", name);

        let mut env = Environment::with_enclosing(closure);
        for (param, arg) in function.declaration.params.iter().zip(args) {
            env.define(&param.lexeme, arg);
        }

        match self.execute_block(&function.declaration.body, env.into_ref()) {
            Ok(Flow::Normal) => Ok(Value::Nil),
            Ok(Flow::Return(value)) => {
                debug!("Function '{}' returned: {}", name, value);
                Ok(value)
            }
            Err(mut e) => {
                e.push_frame(line, name);
                Err(e)
            }
        }
    }
}

fn evaluate_binary(operator: BinaryOp, line: usize, left: Value, right: Value) -> IResult<Value> {
    match operator {
        BinaryOp::EqualEqual => Ok(Value::Bool(left == right)),
        BinaryOp::BangEqual => Ok(Value::Bool(left != right)),
        BinaryOp::Plus => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(&a);
                joined.push_str(&b);
                Ok(Value::from(joined.as_str()))
            }
            _ => Err(RuntimeError::new(
                line,
                "Operands of '+' must be two numbers or two strings.",
            )),
        },
        BinaryOp::Minus => {
            let (a, b) = numbers(operator, line, &left, &right)?;
            Ok(Value::Number(a - b))
        }
        BinaryOp::Star => {
            let (a, b) = numbers(operator, line, &left, &right)?;
            Ok(Value::Number(a * b))
        }
        BinaryOp::Slash => {
            let (a, b) = numbers(operator, line, &left, &right)?;
            if b == 0.0 {
                return Err(RuntimeError::new(line, "Division by zero."));
            }
            Ok(Value::Number(a / b))
        }
        BinaryOp::Greater => {
            let (a, b) = numbers(operator, line, &left, &right)?;
            Ok(Value::Bool(a > b))
        }
        BinaryOp::GreaterEqual => {
            let (a, b) = numbers(operator, line, &left, &right)?;
            Ok(Value::Bool(a >= b))
        }
        BinaryOp::Less => {
            let (a, b) = numbers(operator, line, &left, &right)?;
            Ok(Value::Bool(a < b))
        }
        BinaryOp::LessEqual => {
            let (a, b) = numbers(operator, line, &left, &right)?;
            Ok(Value::Bool(a <= b))
        }
    }
}

/// Both operands as numbers, or an error naming `operator`.
fn numbers(operator: BinaryOp, line: usize, left: &Value, right: &Value) -> IResult<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(RuntimeError::new(
            line,
            format!("Operands of '{}' must be numbers.", operator),
        )),
    }
}

/// The resolver promised a binding that is not there.
fn mismatch(name: &str, line: usize) -> RuntimeError {
    RuntimeError::new(
        line,
        format!("Internal error: no resolved binding for '{}'.", name),
    )
}
