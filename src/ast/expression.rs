//! Expression AST nodes.
//!
//! The same node type serves `CYPHER` declarations and the query body. Which
//! forms are legal where is decided by the semantic passes, not the parser.

use crate::ast::Span;
use crate::value::Value;
use smol_str::SmolStr;
use std::fmt;

/// An expression in a declaration or in the query body.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal scalar (`1`, `2.5`, `'a'`, `true`, `null`).
    Literal(Value, Span),

    /// Bare identifier referring to a query variable.
    Identifier(SmolStr, Span),

    /// Parameter reference (`$name`).
    Parameter(SmolStr, Span),

    /// Function call, aggregate or scalar.
    FunctionCall(FunctionCall),

    /// Binary arithmetic, comparison, boolean, or membership operator.
    Binary(BinaryOperator, Box<Expr>, Box<Expr>, Span),

    /// Prefix or postfix unary operator.
    Unary(UnaryOperator, Box<Expr>, Span),

    /// Property access (`expr.key`).
    Property(Box<Expr>, SmolStr, Span),

    /// Label predicate (`n:Person:Admin`).
    HasLabels(Box<Expr>, Vec<SmolStr>, Span),

    /// List construction (`[e, e, ...]`).
    List(Vec<Expr>, Span),

    /// Map construction (`{key: e, ...}`).
    Map(Vec<(SmolStr, Expr)>, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span)
            | Expr::Identifier(_, span)
            | Expr::Parameter(_, span)
            | Expr::Binary(_, _, _, span)
            | Expr::Unary(_, _, span)
            | Expr::Property(_, _, span)
            | Expr::HasLabels(_, _, span)
            | Expr::List(_, span)
            | Expr::Map(_, span) => span.clone(),
            Expr::FunctionCall(call) => call.span.clone(),
        }
    }

    /// Rebuilds this node with `f` applied to each direct child.
    pub fn map_children(&self, mut f: impl FnMut(&Expr) -> Expr) -> Expr {
        match self {
            Expr::Literal(..) | Expr::Identifier(..) | Expr::Parameter(..) => self.clone(),
            Expr::FunctionCall(call) => Expr::FunctionCall(FunctionCall {
                name: call.name.clone(),
                args: call.args.iter().map(&mut f).collect(),
                distinct: call.distinct,
                star: call.star,
                span: call.span.clone(),
            }),
            Expr::Binary(op, left, right, span) => {
                Expr::Binary(*op, Box::new(f(left)), Box::new(f(right)), span.clone())
            }
            Expr::Unary(op, operand, span) => Expr::Unary(*op, Box::new(f(operand)), span.clone()),
            Expr::Property(target, key, span) => {
                Expr::Property(Box::new(f(target)), key.clone(), span.clone())
            }
            Expr::HasLabels(target, labels, span) => {
                Expr::HasLabels(Box::new(f(target)), labels.clone(), span.clone())
            }
            Expr::List(items, span) => Expr::List(items.iter().map(&mut f).collect(), span.clone()),
            Expr::Map(entries, span) => Expr::Map(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), f(value)))
                    .collect(),
                span.clone(),
            ),
        }
    }

    /// Splits a conjunction into its conjuncts, left to right.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary(BinaryOperator::And, left, right, _) => {
                let mut parts = left.conjuncts();
                parts.extend(right.conjuncts());
                parts
            }
            other => vec![other],
        }
    }

    /// Folds conjuncts back into a single `AND` chain.
    pub fn conjunction(mut parts: Vec<Expr>) -> Option<Expr> {
        if parts.is_empty() {
            return None;
        }
        let first = parts.remove(0);
        Some(parts.into_iter().fold(first, |acc, next| {
            let span = acc.span().start..next.span().end;
            Expr::Binary(BinaryOperator::And, Box::new(acc), Box::new(next), span)
        }))
    }
}

/// A function invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: SmolStr,
    pub args: Vec<Expr>,
    /// `DISTINCT` inside an aggregate call.
    pub distinct: bool,
    /// `count(*)`.
    pub star: bool,
    pub span: Span,
}

/// Binary operators, in no particular precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
    In,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Pow => "^",
            BinaryOperator::Eq => "=",
            BinaryOperator::Neq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Xor => "XOR",
            BinaryOperator::In => "IN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    Not,
    IsNull,
    IsNotNull,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "NOT",
            UnaryOperator::IsNull => "IS NULL",
            UnaryOperator::IsNotNull => "IS NOT NULL",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value, _) => write!(f, "{value}"),
            Expr::Identifier(name, _) => write!(f, "{name}"),
            Expr::Parameter(name, _) => write!(f, "${name}"),
            Expr::FunctionCall(call) => {
                write!(f, "{}(", call.name)?;
                if call.distinct {
                    f.write_str("DISTINCT ")?;
                }
                if call.star {
                    f.write_str("*")?;
                }
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Expr::Binary(op, left, right, _) => write!(f, "{left} {} {right}", op.symbol()),
            Expr::Unary(op @ (UnaryOperator::IsNull | UnaryOperator::IsNotNull), operand, _) => {
                write!(f, "{operand} {}", op.symbol())
            }
            Expr::Unary(UnaryOperator::Not, operand, _) => write!(f, "NOT {operand}"),
            Expr::Unary(op, operand, _) => write!(f, "{}{operand}", op.symbol()),
            Expr::Property(target, key, _) => write!(f, "{target}.{key}"),
            Expr::HasLabels(target, labels, _) => {
                write!(f, "{target}")?;
                for label in labels {
                    write!(f, ":{label}")?;
                }
                Ok(())
            }
            Expr::List(items, _) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Expr::Map(entries, _) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, span: Span) -> Expr {
        Expr::Identifier(name.into(), span)
    }

    #[test]
    fn conjuncts_flatten_nested_and_chains() {
        let a = ident("a", 0..1);
        let b = ident("b", 6..7);
        let c = ident("c", 12..13);
        let ab = Expr::Binary(BinaryOperator::And, Box::new(a), Box::new(b), 0..7);
        let abc = Expr::Binary(BinaryOperator::And, Box::new(ab), Box::new(c), 0..13);

        let names: Vec<String> = abc.conjuncts().iter().map(|e| e.to_string()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn conjunction_rebuilds_and_chain() {
        let parts = vec![ident("a", 0..1), ident("b", 6..7)];
        let joined = Expr::conjunction(parts).expect("non-empty");
        assert_eq!(joined.to_string(), "a AND b");
        assert_eq!(joined.span(), 0..7);
        assert!(Expr::conjunction(Vec::new()).is_none());
    }

    #[test]
    fn display_renders_calls_and_postfix_operators() {
        let call = Expr::FunctionCall(FunctionCall {
            name: "id".into(),
            args: vec![ident("n", 3..4)],
            distinct: false,
            star: false,
            span: 0..5,
        });
        let eq = Expr::Binary(
            BinaryOperator::Eq,
            Box::new(call),
            Box::new(Expr::Parameter("id".into(), 8..11)),
            0..11,
        );
        assert_eq!(eq.to_string(), "id(n) = $id");

        let is_null = Expr::Unary(UnaryOperator::IsNull, Box::new(ident("x", 0..1)), 0..9);
        assert_eq!(is_null.to_string(), "x IS NULL");
    }
}
