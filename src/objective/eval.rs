use thiserror::Error;

use crate::objective::ast::{BinaryOp, Expr, UnaryOp};

/// Functions the dialect knows, with their arity. The validator checks names
/// and arities against this same table, so evaluation of a validated
/// expression can only fail on a missing column.
pub const FUNCTIONS: &[(&str, usize)] = &[
    ("abs", 1),
    ("sqrt", 1),
    ("exp", 1),
    ("ln", 1),
    ("log2", 1),
    ("log10", 1),
    ("floor", 1),
    ("ceil", 1),
    ("round", 1),
    ("pow", 2),
    ("least", 2),
    ("greatest", 2),
];

pub fn function_arity(name: &str) -> Option<usize> {
    let lowered = name.to_ascii_lowercase();
    FUNCTIONS
        .iter()
        .find(|(f, _)| *f == lowered)
        .map(|(_, arity)| *arity)
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("unknown column {0}")]
    UnknownColumn(String),
    #[error("function {0} is not supported")]
    UnknownFunction(String),
    #[error("function {name} takes {expected} argument(s), got {found}")]
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Evaluate `expr` for one product row. `lookup` resolves a column name to
/// that row's value. Comparison operators yield 1.0 / 0.0. Division by zero
/// and domain errors follow IEEE semantics (inf / NaN); the caller excludes
/// rows whose cost is not finite, the same way a SQL engine drops NULLs.
pub fn eval_row(expr: &Expr, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<f64, EvalError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Column(name) => lookup(name).ok_or_else(|| EvalError::UnknownColumn(name.clone())),
        Expr::Unary { op, expr } => {
            let value = eval_row(expr, lookup)?;
            Ok(match op {
                UnaryOp::Neg => -value,
                UnaryOp::Pos => value,
            })
        }
        Expr::Binary { left, op, right } => {
            let l = eval_row(left, lookup)?;
            let r = eval_row(right, lookup)?;
            Ok(apply_binary(*op, l, r))
        }
        Expr::Call { name, args } => {
            let expected = function_arity(name)
                .ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;
            if args.len() != expected {
                return Err(EvalError::WrongArity {
                    name: name.clone(),
                    expected,
                    found: args.len(),
                });
            }
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_row(arg, lookup)?);
            }
            Ok(apply_function(&name.to_ascii_lowercase(), &values))
        }
    }
}

fn apply_binary(op: BinaryOp, l: f64, r: f64) -> f64 {
    match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => l / r,
        BinaryOp::Mod => l % r,
        BinaryOp::Pow => l.powf(r),
        BinaryOp::Lt => bool_to_f64(l < r),
        BinaryOp::Le => bool_to_f64(l <= r),
        BinaryOp::Gt => bool_to_f64(l > r),
        BinaryOp::Ge => bool_to_f64(l >= r),
        BinaryOp::Eq => bool_to_f64(l == r),
        BinaryOp::Ne => bool_to_f64(l != r),
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn apply_function(name: &str, args: &[f64]) -> f64 {
    match (name, args) {
        ("abs", [x]) => x.abs(),
        ("sqrt", [x]) => x.sqrt(),
        ("exp", [x]) => x.exp(),
        ("ln", [x]) => x.ln(),
        ("log2", [x]) => x.log2(),
        ("log10", [x]) => x.log10(),
        ("floor", [x]) => x.floor(),
        ("ceil", [x]) => x.ceil(),
        ("round", [x]) => x.round(),
        ("pow", [x, y]) => x.powf(*y),
        ("least", [x, y]) => x.min(*y),
        ("greatest", [x, y]) => x.max(*y),
        // function_arity() gates every call before it gets here
        _ => unreachable!("unvalidated function call: {name}"),
    }
}
