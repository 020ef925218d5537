use crate::ast::Identifier;
use crate::error::RuntimeError;
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope. Closures and the running frame hold these
/// jointly, so a scope lives as long as anything still points at it.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap in a fresh shared handle.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Bind `name` in this scope. Shadows, never overwrites, outer bindings.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Name-based lookup through every enclosing scope.
    pub fn get(&self, name: &Identifier) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Name-based assignment; never creates a binding.
    pub fn assign(&mut self, name: &Identifier, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// The scope exactly `depth` links out from `env`.
    pub fn ancestor(env: &EnvRef, depth: usize) -> Option<EnvRef> {
        let mut current = Rc::clone(env);

        for _ in 0..depth {
            let enclosing = current.borrow().enclosing.clone();
            current = enclosing?;
        }

        Some(current)
    }

    /// Read `name` from the scope `depth` links out, without searching.
    ///
    /// `None` means the resolver and the interpreter disagree.
    pub fn get_at(env: &EnvRef, depth: usize, name: &str) -> Option<Value> {
        let scope = Self::ancestor(env, depth)?;
        let value = scope.borrow().values.get(name).cloned();

        debug!("get_at depth={} name={} found={}", depth, name, value.is_some());

        value
    }

    /// Write `name` in the scope `depth` links out. Returns `false` when the
    /// binding is not there.
    pub fn assign_at(env: &EnvRef, depth: usize, name: &str, value: Value) -> bool {
        let Some(scope) = Self::ancestor(env, depth) else {
            return false;
        };

        let mut scope = scope.borrow_mut();

        match scope.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

fn undefined(name: &Identifier) -> RuntimeError {
    RuntimeError::new(
        name.line,
        format!("Undefined variable '{}'.", name.lexeme),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Identifier {
        Identifier::new(name, 1)
    }

    #[test]
    fn define_shadows_enclosing_binding() {
        let outer = Environment::new().into_ref();
        outer.borrow_mut().define("x", Value::Number(1.0));

        let inner = Environment::with_enclosing(Rc::clone(&outer)).into_ref();
        inner.borrow_mut().define("x", Value::Number(2.0));

        assert_eq!(inner.borrow().get(&ident("x")).unwrap(), Value::Number(2.0));
        assert_eq!(outer.borrow().get(&ident("x")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_walks_out_and_never_creates() {
        let outer = Environment::new().into_ref();
        outer.borrow_mut().define("x", Value::Nil);
        let inner = Environment::with_enclosing(Rc::clone(&outer)).into_ref();

        inner
            .borrow_mut()
            .assign(&ident("x"), Value::Bool(true))
            .unwrap();
        assert_eq!(outer.borrow().get(&ident("x")).unwrap(), Value::Bool(true));

        let err = inner
            .borrow_mut()
            .assign(&ident("y"), Value::Nil)
            .unwrap_err();
        assert_eq!(err.message, "Undefined variable 'y'.");
    }

    #[test]
    fn get_at_reads_exact_scope() {
        let global = Environment::new().into_ref();
        global.borrow_mut().define("a", Value::Number(0.0));
        let middle = Environment::with_enclosing(Rc::clone(&global)).into_ref();
        middle.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&middle)).into_ref();

        assert_eq!(Environment::get_at(&inner, 1, "a"), Some(Value::Number(1.0)));
        assert_eq!(Environment::get_at(&inner, 2, "a"), Some(Value::Number(0.0)));
        assert_eq!(Environment::get_at(&inner, 0, "a"), None);
        assert_eq!(Environment::get_at(&inner, 3, "a"), None);
    }

    #[test]
    fn assign_at_only_touches_target_scope() {
        let global = Environment::new().into_ref();
        global.borrow_mut().define("a", Value::Number(0.0));
        let inner = Environment::with_enclosing(Rc::clone(&global)).into_ref();
        inner.borrow_mut().define("a", Value::Number(1.0));

        assert!(Environment::assign_at(&inner, 1, "a", Value::Number(5.0)));
        assert_eq!(Environment::get_at(&inner, 0, "a"), Some(Value::Number(1.0)));
        assert_eq!(Environment::get_at(&inner, 1, "a"), Some(Value::Number(5.0)));
        assert!(!Environment::assign_at(&inner, 0, "missing", Value::Nil));
    }
}
