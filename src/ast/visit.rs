//! Immutable expression visitor.
//!
//! Passes that only need to look for something inside an expression tree
//! (aggregate calls, parameter references, variables) implement [`Visit`]
//! and override the hooks they care about.

use std::ops::ControlFlow;

use crate::ast::{Expr, FunctionCall};

pub type VisitResult<B> = ControlFlow<B>;

pub trait Visit {
    type Break;

    fn visit_expr(&mut self, expr: &Expr) -> VisitResult<Self::Break> {
        walk_expr(self, expr)
    }

    fn visit_function_call(&mut self, call: &FunctionCall) -> VisitResult<Self::Break> {
        walk_function_call(self, call)
    }
}

/// Visits the children of `expr`.
pub fn walk_expr<V: Visit + ?Sized>(visitor: &mut V, expr: &Expr) -> VisitResult<V::Break> {
    match expr {
        Expr::Literal(..) | Expr::Identifier(..) | Expr::Parameter(..) => {
            ControlFlow::Continue(())
        }
        Expr::FunctionCall(call) => visitor.visit_function_call(call),
        Expr::Binary(_, left, right, _) => {
            visitor.visit_expr(left)?;
            visitor.visit_expr(right)
        }
        Expr::Unary(_, operand, _)
        | Expr::Property(operand, _, _)
        | Expr::HasLabels(operand, _, _) => visitor.visit_expr(operand),
        Expr::List(items, _) => {
            for item in items {
                visitor.visit_expr(item)?;
            }
            ControlFlow::Continue(())
        }
        Expr::Map(entries, _) => {
            for (_, value) in entries {
                visitor.visit_expr(value)?;
            }
            ControlFlow::Continue(())
        }
    }
}

pub fn walk_function_call<V: Visit + ?Sized>(
    visitor: &mut V,
    call: &FunctionCall,
) -> VisitResult<V::Break> {
    for arg in &call.args {
        visitor.visit_expr(arg)?;
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use smol_str::SmolStr;

    struct Parameters(Vec<SmolStr>);

    impl Visit for Parameters {
        type Break = ();

        fn visit_expr(&mut self, expr: &Expr) -> VisitResult<()> {
            if let Expr::Parameter(name, _) = expr {
                self.0.push(name.clone());
            }
            walk_expr(self, expr)
        }
    }

    #[test]
    fn walks_nested_expressions_in_order() {
        let expr = parse_expression("[$a, {k: $b + 1}, f($c), -$d]").expect("parses");
        let mut params = Parameters(Vec::new());
        assert!(params.visit_expr(&expr).is_continue());
        assert_eq!(params.0, ["a", "b", "c", "d"]);
    }

    #[test]
    fn break_stops_the_walk() {
        struct FirstIdentifier;

        impl Visit for FirstIdentifier {
            type Break = SmolStr;

            fn visit_expr(&mut self, expr: &Expr) -> VisitResult<SmolStr> {
                match expr {
                    Expr::Identifier(name, _) => ControlFlow::Break(name.clone()),
                    _ => walk_expr(self, expr),
                }
            }
        }

        let expr = parse_expression("1 + abs(n.age) - m").expect("parses");
        assert_eq!(FirstIdentifier.visit_expr(&expr), ControlFlow::Break("n".into()));
        let constant = parse_expression("1 + $age").expect("parses");
        assert!(FirstIdentifier.visit_expr(&constant).is_continue());
    }
}
