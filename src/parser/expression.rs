//! Expression parsing with precedence climbing.
//!
//! Precedence, loosest first: `OR`, `XOR`, `AND`, `NOT`, comparisons,
//! `IN` / `IS [NOT] NULL`, `+ -`, `* / %`, `^`, unary minus, postfix
//! property and label access, atoms.

use crate::ast::{BinaryOperator, Expr, FunctionCall, Span, UnaryOperator, merge_spans};
use crate::lexer::token::TokenKind;
use crate::parser::base::{ParseResult, TokenStream};
use crate::value::Value;
use smol_str::SmolStr;

/// Parses expressions from a shared token stream.
pub struct ExpressionParser<'s, 'a> {
    stream: &'s mut TokenStream<'a>,
    source: &'a str,
    depth: usize,
    max_depth: usize,
}

impl<'s, 'a> ExpressionParser<'s, 'a> {
    pub fn new(stream: &'s mut TokenStream<'a>, source: &'a str, max_depth: usize) -> Self {
        Self {
            stream,
            source,
            depth: 0,
            max_depth,
        }
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let expr = self.parse_or();
        self.depth -= 1;
        expr
    }

    fn enter(&mut self) -> ParseResult<()> {
        if self.depth >= self.max_depth {
            return Err(self.stream.error_here(format!(
                "expression nesting exceeds the maximum depth of {}",
                self.max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    /// Runs `parse`, then puts the nesting depth back to its value on entry.
    fn scoped<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        let depth = self.depth;
        let result = parse(self);
        self.depth = depth;
        result
    }

    /// Folds a left-associative chain starting at `first`. Each link nests
    /// the tree one level deeper, so each one counts against the depth limit.
    fn chain(
        &mut self,
        first: Expr,
        operator: fn(&TokenKind) -> Option<BinaryOperator>,
        operand: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        self.scoped(|parser| {
            let mut left = first;
            while let Some(op) = operator(&parser.stream.current().kind) {
                parser.enter()?;
                parser.stream.advance();
                let right = operand(parser)?;
                left = binary(op, left, right);
            }
            Ok(left)
        })
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let left = self.parse_xor()?;
        self.chain(
            left,
            |kind| matches!(kind, TokenKind::Or).then_some(BinaryOperator::Or),
            Self::parse_xor,
        )
    }

    fn parse_xor(&mut self) -> ParseResult<Expr> {
        let left = self.parse_and()?;
        self.chain(
            left,
            |kind| matches!(kind, TokenKind::Xor).then_some(BinaryOperator::Xor),
            Self::parse_and,
        )
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let left = self.parse_not()?;
        self.chain(
            left,
            |kind| matches!(kind, TokenKind::And).then_some(BinaryOperator::And),
            Self::parse_not,
        )
    }

    fn parse_not(&mut self) -> ParseResult<Expr> {
        if self.stream.check(&TokenKind::Not) {
            let start = self.stream.current().span.start;
            self.stream.advance();
            self.enter()?;
            let operand = self.parse_not();
            self.depth -= 1;
            let operand = operand?;
            let span = start..operand.span().end;
            return Ok(Expr::Unary(UnaryOperator::Not, Box::new(operand), span));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let left = self.parse_predicate()?;
        self.scoped(|parser| parser.comparison_tail(left))
    }

    fn comparison_tail(&mut self, mut left: Expr) -> ParseResult<Expr> {
        loop {
            let op = match self.stream.current().kind {
                TokenKind::Eq => BinaryOperator::Eq,
                TokenKind::NotEq => BinaryOperator::Neq,
                TokenKind::Lt => BinaryOperator::Lt,
                TokenKind::LtEq => BinaryOperator::Le,
                TokenKind::Gt => BinaryOperator::Gt,
                TokenKind::GtEq => BinaryOperator::Ge,
                // `a<-1` lexes as an arrow; inside an expression it is `a < -1`.
                TokenKind::LeftArrow => {
                    self.enter()?;
                    let minus_start = self.stream.current().span.start + 1;
                    self.stream.advance();
                    let operand = self.parse_power()?;
                    let span = minus_start..operand.span().end;
                    let negated = match operand {
                        Expr::Literal(Value::Integer(i), _) => {
                            Expr::Literal(Value::Integer(i.wrapping_neg()), span)
                        }
                        Expr::Literal(Value::Float(f), _) => Expr::Literal(Value::Float(-f), span),
                        other => Expr::Unary(UnaryOperator::Negate, Box::new(other), span),
                    };
                    let right = self.continue_predicate(negated)?;
                    left = binary(BinaryOperator::Lt, left, right);
                    continue;
                }
                _ => break,
            };
            self.enter()?;
            self.stream.advance();
            let right = self.parse_predicate()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_predicate(&mut self) -> ParseResult<Expr> {
        let operand = self.parse_additive()?;
        self.predicate_suffix(operand)
    }

    /// Finishes a predicate whose leading multiplicative operand is `first`.
    fn continue_predicate(&mut self, first: Expr) -> ParseResult<Expr> {
        let product = self.multiplicative_tail(first)?;
        let sum = self.additive_tail(product)?;
        self.predicate_suffix(sum)
    }

    fn predicate_suffix(&mut self, expr: Expr) -> ParseResult<Expr> {
        self.scoped(|parser| parser.predicate_tail(expr))
    }

    fn predicate_tail(&mut self, mut expr: Expr) -> ParseResult<Expr> {
        loop {
            match self.stream.current().kind {
                TokenKind::In => {
                    self.enter()?;
                    self.stream.advance();
                    let list = self.parse_additive()?;
                    expr = binary(BinaryOperator::In, expr, list);
                }
                TokenKind::Is => {
                    self.enter()?;
                    self.stream.advance();
                    let op = if self.stream.consume(&TokenKind::Not) {
                        UnaryOperator::IsNotNull
                    } else {
                        UnaryOperator::IsNull
                    };
                    let end = self.stream.expect(TokenKind::Null)?.end;
                    let span = expr.span().start..end;
                    expr = Expr::Unary(op, Box::new(expr), span);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let left = self.parse_multiplicative()?;
        self.additive_tail(left)
    }

    fn additive_tail(&mut self, left: Expr) -> ParseResult<Expr> {
        self.chain(
            left,
            |kind| match kind {
                TokenKind::Plus => Some(BinaryOperator::Add),
                TokenKind::Minus => Some(BinaryOperator::Sub),
                _ => None,
            },
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let left = self.parse_power()?;
        self.multiplicative_tail(left)
    }

    fn multiplicative_tail(&mut self, left: Expr) -> ParseResult<Expr> {
        self.chain(
            left,
            |kind| match kind {
                TokenKind::Star => Some(BinaryOperator::Mul),
                TokenKind::Slash => Some(BinaryOperator::Div),
                TokenKind::Percent => Some(BinaryOperator::Mod),
                _ => None,
            },
            Self::parse_power,
        )
    }

    fn parse_power(&mut self) -> ParseResult<Expr> {
        let left = self.parse_unary()?;
        self.chain(
            left,
            |kind| matches!(kind, TokenKind::Caret).then_some(BinaryOperator::Pow),
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        match self.stream.current().kind {
            TokenKind::Minus => {
                let start = self.stream.current().span.start;
                self.stream.advance();
                // Fold `-<integer>` so that i64::MIN is expressible.
                if let TokenKind::IntegerLiteral(digits) = &self.stream.current().kind {
                    if !matches!(self.stream.peek_kind(), Some(TokenKind::Dot | TokenKind::Colon))
                    {
                        let span = start..self.stream.current().span.end;
                        let value = parse_integer(&format!("-{digits}")).ok_or_else(|| {
                            self.stream
                                .error_at(span.clone(), "integer literal is out of range")
                        })?;
                        self.stream.advance();
                        return Ok(Expr::Literal(Value::Integer(value), span));
                    }
                }
                self.enter()?;
                let operand = self.parse_unary();
                self.depth -= 1;
                let operand = operand?;
                let span = start..operand.span().end;
                Ok(Expr::Unary(UnaryOperator::Negate, Box::new(operand), span))
            }
            TokenKind::Plus => {
                self.stream.advance();
                self.enter()?;
                let operand = self.parse_unary();
                self.depth -= 1;
                operand
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_atom()?;
        self.scoped(|parser| parser.postfix_tail(expr))
    }

    fn postfix_tail(&mut self, mut expr: Expr) -> ParseResult<Expr> {
        loop {
            match self.stream.current().kind {
                TokenKind::Dot => {
                    self.enter()?;
                    self.stream.advance();
                    let (key, key_span) = self.parse_symbolic_name("property key")?;
                    let span = expr.span().start..key_span.end;
                    expr = Expr::Property(Box::new(expr), key, span);
                }
                TokenKind::Colon => {
                    self.enter()?;
                    let mut labels = Vec::new();
                    let mut end = expr.span().end;
                    while self.stream.consume(&TokenKind::Colon) {
                        let (label, label_span) = self.parse_symbolic_name("label")?;
                        labels.push(label);
                        end = label_span.end;
                    }
                    let span = expr.span().start..end;
                    expr = Expr::HasLabels(Box::new(expr), labels, span);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        let token = self.stream.current();
        let span = token.span.clone();
        match &token.kind {
            TokenKind::IntegerLiteral(text) => {
                let value = parse_integer(text)
                    .ok_or_else(|| self.stream.error_here("integer literal is out of range"))?;
                self.stream.advance();
                Ok(Expr::Literal(Value::Integer(value), span))
            }
            TokenKind::FloatLiteral(text) => {
                let value: f64 = text
                    .parse()
                    .map_err(|_| self.stream.error_here(format!("malformed float literal '{text}'")))?;
                self.stream.advance();
                Ok(Expr::Literal(Value::Float(value), span))
            }
            TokenKind::StringLiteral(text) => {
                let value = Value::String(text.clone());
                self.stream.advance();
                Ok(Expr::Literal(value, span))
            }
            TokenKind::True | TokenKind::False => {
                let value = Value::Boolean(token.kind == TokenKind::True);
                self.stream.advance();
                Ok(Expr::Literal(value, span))
            }
            TokenKind::Null => {
                self.stream.advance();
                Ok(Expr::Literal(Value::Null, span))
            }
            TokenKind::Parameter(name) => {
                let name = name.clone();
                self.stream.advance();
                Ok(Expr::Parameter(name, span))
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.stream.advance();
                if self.stream.check(&TokenKind::LParen) {
                    self.parse_call(name, span)
                } else {
                    Ok(Expr::Identifier(name, span))
                }
            }
            TokenKind::LParen => {
                self.stream.advance();
                let inner = self.parse_expression()?;
                self.stream.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LBrace => {
                let (entries, span) = self.parse_map_entries()?;
                Ok(Expr::Map(entries, span))
            }
            other => Err(self
                .stream
                .error_here(format!("expected expression, found {other}"))),
        }
    }

    fn parse_call(&mut self, name: SmolStr, name_span: Span) -> ParseResult<Expr> {
        self.stream.expect(TokenKind::LParen)?;
        self.enter()?;
        let call = self.call_arguments(name, name_span);
        self.depth -= 1;
        call
    }

    fn call_arguments(&mut self, name: SmolStr, name_span: Span) -> ParseResult<Expr> {
        let mut call = FunctionCall {
            name,
            args: Vec::new(),
            distinct: false,
            star: false,
            span: name_span.clone(),
        };

        if self.stream.check(&TokenKind::Star) {
            self.stream.advance();
            call.star = true;
        } else if !self.stream.check(&TokenKind::RParen) {
            call.distinct = self.stream.consume(&TokenKind::Distinct);
            loop {
                call.args.push(self.parse_expression()?);
                if !self.stream.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let end = self.stream.expect(TokenKind::RParen)?.end;
        call.span = name_span.start..end;
        Ok(Expr::FunctionCall(call))
    }

    fn parse_list(&mut self) -> ParseResult<Expr> {
        let start = self.stream.expect(TokenKind::LBracket)?.start;
        self.enter()?;
        let items = self.comma_separated(&TokenKind::RBracket);
        self.depth -= 1;
        let items = items?;
        let end = self.stream.expect(TokenKind::RBracket)?.end;
        Ok(Expr::List(items, start..end))
    }

    fn comma_separated(&mut self, close: &TokenKind) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        if self.stream.check(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression()?);
            if !self.stream.consume(&TokenKind::Comma) {
                return Ok(items);
            }
        }
    }

    /// Parses `{key: expr, ...}`, returning the entries and the brace span.
    ///
    /// Keys may be names, keywords or quoted strings.
    pub fn parse_map_entries(&mut self) -> ParseResult<(Vec<(SmolStr, Expr)>, Span)> {
        let start = self.stream.expect(TokenKind::LBrace)?.start;
        self.enter()?;
        let entries = self.map_entries();
        self.depth -= 1;
        let entries = entries?;
        let end = self.stream.expect(TokenKind::RBrace)?.end;
        Ok((entries, start..end))
    }

    fn map_entries(&mut self) -> ParseResult<Vec<(SmolStr, Expr)>> {
        let mut entries: Vec<(SmolStr, Expr)> = Vec::new();
        if self.stream.check(&TokenKind::RBrace) {
            return Ok(entries);
        }
        loop {
            let (key, key_span) = match &self.stream.current().kind {
                TokenKind::StringLiteral(text) => {
                    let key = (text.clone(), self.stream.current().span.clone());
                    self.stream.advance();
                    key
                }
                _ => self.parse_symbolic_name("map key")?,
            };
            if entries.iter().any(|(existing, _)| *existing == key) {
                return Err(self
                    .stream
                    .error_at(key_span, format!("duplicate map key '{key}'")));
            }
            self.stream.expect(TokenKind::Colon)?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            if !self.stream.consume(&TokenKind::Comma) {
                return Ok(entries);
            }
        }
    }

    /// A name in a position where keywords are unambiguous: property keys,
    /// labels, relationship types and map keys.
    pub fn parse_symbolic_name(&mut self, what: &str) -> ParseResult<(SmolStr, Span)> {
        let token = self.stream.current();
        match &token.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.stream.advance();
                Ok((name, token.span.clone()))
            }
            kind if kind.is_keyword() => {
                let name = SmolStr::new(token.slice(self.source));
                self.stream.advance();
                Ok((name, token.span.clone()))
            }
            other => Err(self
                .stream
                .error_here(format!("expected {what}, found {other}"))),
        }
    }
}

fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
    let span = merge_spans(&left.span(), &right.span());
    Expr::Binary(op, Box::new(left), Box::new(right), span)
}

fn parse_integer(text: &str) -> Option<i64> {
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_expression;
    use crate::value::Value;

    use super::*;

    fn render(source: &str) -> String {
        parse_expression(source)
            .unwrap_or_else(|err| panic!("failed to parse `{source}`: {}", err.message))
            .to_string()
    }

    fn shape(expr: &Expr) -> String {
        match expr {
            Expr::Binary(op, l, r, _) => format!("({} {} {})", shape(l), op.symbol(), shape(r)),
            Expr::Unary(op, e, _) => format!("({} {})", op.symbol(), shape(e)),
            other => other.to_string(),
        }
    }

    fn parse_shape(source: &str) -> String {
        shape(&parse_expression(source).expect("parses"))
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(parse_shape("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(parse_shape("(1 + 2) * 3"), "((1 + 2) * 3)");
        assert_eq!(parse_shape("2 ^ 3 * 4"), "((2 ^ 3) * 4)");
        assert_eq!(parse_shape("$p + 1"), "($p + 1)");
    }

    #[test]
    fn boolean_precedence() {
        assert_eq!(
            parse_shape("a OR b AND NOT c = 1"),
            "(a OR (b AND (NOT (c = 1))))"
        );
        assert_eq!(parse_shape("x IN [1, 2] AND y IS NOT NULL"), "((x IN [1, 2]) AND (IS NOT NULL y))");
    }

    #[test]
    fn left_arrow_inside_comparison() {
        assert_eq!(parse_shape("n.v<-1"), "(n.v < -1)");
        assert_eq!(parse_shape("n.v<-x * 2"), "(n.v < ((- x) * 2))");
    }

    #[test]
    fn negative_integer_literals_fold() {
        let expr = parse_expression("-9223372036854775808").expect("parses");
        assert_eq!(expr, Expr::Literal(Value::Integer(i64::MIN), 0..20));
        assert!(parse_expression("9223372036854775808").is_err());
    }

    #[test]
    fn calls_lists_and_maps() {
        assert_eq!(render("count(*)"), "count(*)");
        assert_eq!(render("count(DISTINCT n.name)"), "count(DISTINCT n.name)");
        assert_eq!(render("[1, [2, f(1)]]"), "[1, [2, f(1)]]");
        assert_eq!(render("{'key': abs(1), limit: 2}"), "{key: abs(1), limit: 2}");
        assert_eq!(render("n:Person:Admin"), "n:Person:Admin");
    }

    #[test]
    fn duplicate_map_keys_are_rejected() {
        let err = parse_expression("{a: 1, a: 2}").unwrap_err();
        assert_eq!(err.message, "duplicate map key 'a'");
    }

    #[test]
    fn missing_operand_is_reported() {
        let err = parse_expression("1 +").unwrap_err();
        assert_eq!(err.message, "expected expression, found end of input");
    }

    #[test]
    fn operator_chains_count_against_depth() {
        let short = format!("{}1", "1+".repeat(100));
        assert!(parse_expression(&short).is_ok());

        for source in [
            format!("{}1", "1+".repeat(100_000)),
            format!("{}1", "+".repeat(20_000)),
            format!("n{}", ".k".repeat(1_000)),
            format!("x{}", " IS NULL".repeat(1_000)),
            format!("1{}", " = 1".repeat(1_000)),
        ] {
            let err = parse_expression(&source).unwrap_err();
            assert_eq!(err.message, "expression nesting exceeds the maximum depth of 128");
        }
    }

    #[test]
    fn call_spans_cover_arguments() {
        let expr = parse_expression("abs(-1)").expect("parses");
        assert_eq!(expr.span(), 0..7);
    }
}
