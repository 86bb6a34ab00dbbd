use thiserror::Error;

use crate::objective::ast::Expr;
use crate::objective::eval::function_arity;
use crate::objective::parser::{ParseError, Parser};
use crate::store::{ColumnKind, ProductStore};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObjectiveError {
    #[error(
        "expression contains invalid characters; only alphanumerics, arithmetic and \
         comparison operators, parentheses and underscores are allowed"
    )]
    InvalidCharacters,
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("function {0} is not allowed")]
    UnknownFunction(String),
    #[error("function {name} takes {expected} argument(s), got {found}")]
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("unknown column {0}")]
    UnknownColumn(String),
    #[error("column {0} is not numeric")]
    NonNumericColumn(String),
}

/// Validate a user-supplied cost expression before it is trusted as an
/// objective. Stages: character whitelist, parse, node-kind walk (the AST
/// itself is the allow-list, so only function names and arities need
/// checking), then column resolution against the store schema. Rejecting
/// something safe is acceptable; accepting something unsafe is not.
pub fn validate_objective(src: &str, store: &ProductStore) -> Result<Expr, ObjectiveError> {
    if !src.chars().all(is_allowed_char) {
        return Err(ObjectiveError::InvalidCharacters);
    }

    let expr = Parser::parse(src)?;
    validate_node(&expr)?;

    // Type-only probe: every referenced column must exist and be numeric.
    for column in expr.columns() {
        match store.column_kind(column) {
            Some(ColumnKind::Numeric) => {}
            Some(_) => return Err(ObjectiveError::NonNumericColumn(column.to_string())),
            None => return Err(ObjectiveError::UnknownColumn(column.to_string())),
        }
    }

    Ok(expr)
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || matches!(
            c,
            '_' | '+' | '-' | '*' | '/' | '%' | '^' | '&' | '|' | '<' | '>' | '=' | '~' | '!'
                | '@' | '(' | ')' | '.' | ','
        )
}

fn validate_node(expr: &Expr) -> Result<(), ObjectiveError> {
    match expr {
        Expr::Number(_) | Expr::Column(_) => Ok(()),
        Expr::Unary { expr, .. } => validate_node(expr),
        Expr::Binary { left, right, .. } => {
            validate_node(left)?;
            validate_node(right)
        }
        Expr::Call { name, args } => {
            let expected = function_arity(name)
                .ok_or_else(|| ObjectiveError::UnknownFunction(name.clone()))?;
            if args.len() != expected {
                return Err(ObjectiveError::WrongArity {
                    name: name.clone(),
                    expected,
                    found: args.len(),
                });
            }
            for arg in args {
                validate_node(arg)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::sample_store;

    fn verdict(src: &str) -> Result<Expr, ObjectiveError> {
        let store = sample_store();
        validate_objective(src, &store)
    }

    /// Curated verdict table, mirroring the dialect contract: each entry is
    /// (expression, expected validity).
    #[test]
    fn test_verdict_table() {
        let cases: &[(&str, bool)] = &[
            ("price_eur", true),
            ("0.5 * price_eur + sodium", true),
            ("pow(price_eur, 2) / greatest(protein, 1)", true),
            ("price_eur * (protein > 10)", true),
            ("-price_eur", true),
            ("((price_eur))", true),
            ("price_eur ^ 2 % 3", true),
            // bad characters
            ("price_eur; drop table products", false),
            ("price_eur -- comment", false),
            ("price\u{00e9}", false),
            ("price_eur # 2", false),
            ("'price_eur'", false),
            // parse failures
            ("", false),
            ("price_eur +", false),
            ("(price_eur", false),
            ("1 2", false),
            // disallowed functions / arity
            ("system(price_eur)", false),
            ("pow(price_eur)", false),
            ("sqrt(price_eur, 2)", false),
            // column resolution
            ("unknown_col + 1", false),
            ("product_name * 2", false),
        ];

        for (src, expected) in cases {
            let got = verdict(src).is_ok();
            assert_eq!(
                got, *expected,
                "expression {src:?}: got {got}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_invalid_characters_message() {
        assert_eq!(
            verdict("price_eur; 1"),
            Err(ObjectiveError::InvalidCharacters)
        );
    }

    #[test]
    fn test_unknown_column_names_the_column() {
        match verdict("no_such_column * 2") {
            Err(ObjectiveError::UnknownColumn(name)) => assert_eq!(name, "no_such_column"),
            other => panic!("expected unknown column error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_column_names_the_column() {
        match verdict("location * 2") {
            Err(ObjectiveError::NonNumericColumn(name)) => assert_eq!(name, "location"),
            other => panic!("expected non-numeric column error, got {other:?}"),
        }
    }

    #[test]
    fn test_id_columns_are_not_objective_columns() {
        // Row identifiers are integers in the schema but make no sense as a
        // cost term; they are rejected as non-numeric.
        assert!(matches!(
            verdict("price_id"),
            Err(ObjectiveError::NonNumericColumn(_))
        ));
    }
}
