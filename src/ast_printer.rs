use crate::ast::{Expr, LiteralValue};

/// Converts an expression to parenthesised prefix form, e.g.
/// `(* (- 123.0) (group 45.67))`.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        match expr {
            Expr::Literal(lit) => Self::literal(lit),

            Expr::Grouping(inner) => Self::parenthesize("group", &[&**inner]),

            Expr::Unary {
                operator, right, ..
            } => Self::parenthesize(operator.symbol(), &[&**right]),

            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => Self::parenthesize(operator.symbol(), &[&**left, &**right]),

            Expr::Logical {
                left,
                operator,
                right,
            } => Self::parenthesize(operator.symbol(), &[&**left, &**right]),

            Expr::Variable(var) => var.name.lexeme.clone(),

            Expr::Assign { target, value } => {
                format!("(= {} {})", target.name.lexeme, Self::print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut parts: Vec<&Expr> = Vec::with_capacity(arguments.len() + 1);
                parts.push(&**callee);
                parts.extend(arguments.iter());
                Self::parenthesize("call", &parts)
            }

            Expr::Get { object, name } => format!("(. {} {})", Self::print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),

            Expr::This { .. } => "this".into(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),

            Expr::Function(decl) => {
                let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
                format!("(fun ({}))", params.join(" "))
            }
        }
    }

    /// Numbers always show a fractional part: `3` prints as `3.0`.
    fn literal(lit: &LiteralValue) -> String {
        match lit {
            LiteralValue::True => "true".into(),
            LiteralValue::False => "false".into(),
            LiteralValue::Nil => "nil".into(),
            LiteralValue::Str(s) => s.clone(),
            LiteralValue::Number(n) if n.fract() == 0.0 => format!("{:.1}", n),
            LiteralValue::Number(n) => n.to_string(),
        }
    }

    fn parenthesize(name: &str, exprs: &[&Expr]) -> String {
        let mut out = format!("({}", name);
        for expr in exprs {
            out.push(' ');
            out.push_str(&Self::print(expr));
        }
        out.push(')');
        out
    }
}
