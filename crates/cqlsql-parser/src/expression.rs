//! Expression parser using recursive descent with a precedence cascade
//!
//! Each level parses the next-higher level first, then loops while one of
//! its own operators follows:
//! or → and → comparison → temporal → additive → multiplicative → unary →
//! postfix → primary.

use crate::parser::Parser;
use crate::token::{Keyword, TokenKind};
use cqlsql_ast::{
    BinaryOp, DurationUnit, Expression, IntervalExpr, Literal, LiteralType, OffsetBound, Query,
    RelationshipClause, RelationshipKind, ResourceReference, TimingDirection, TimingExpr, UnaryOp,
};
use cqlsql_diagnostics::{CQL0010, CQL0012, CQL0013, CQL0027, CQL0028, CQL0029, Result};

impl Parser {
    /// Parse an expression (entry point)
    pub(crate) fn expression(&mut self) -> Result<Expression> {
        self.or_expression()
    }

    fn or_expression(&mut self) -> Result<Expression> {
        let mut left = self.and_expression()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.and_expression()?;
            left = Expression::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expression(&mut self) -> Result<Expression> {
        let mut left = self.comparison_expression()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.comparison_expression()?;
            left = Expression::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    /// Equality and relational operators, plus postfix `is [not] null`
    fn comparison_expression(&mut self) -> Result<Expression> {
        let mut left = self.temporal_expression()?;

        loop {
            if self.check_keyword(Keyword::Is) {
                self.advance();
                let op = if self.eat_keyword(Keyword::Not) {
                    UnaryOp::IsNotNull
                } else {
                    UnaryOp::IsNull
                };
                self.expect_keyword(Keyword::Null)?;
                left = Expression::unary(op, left);
                continue;
            }

            let op = match self.peek().kind {
                TokenKind::Eq => BinaryOp::Equal,
                TokenKind::NotEq => BinaryOp::NotEqual,
                TokenKind::Tilde => BinaryOp::Equivalent,
                TokenKind::Less => BinaryOp::Less,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::LessEq => BinaryOp::LessOrEqual,
                TokenKind::GreaterEq => BinaryOp::GreaterOrEqual,
                _ => break,
            };
            self.advance();
            let right = self.temporal_expression()?;
            left = Expression::binary(op, left, right);
        }

        Ok(left)
    }

    /// Membership, interval and timing operators
    fn temporal_expression(&mut self) -> Result<Expression> {
        let mut left = self.additive_expression()?;

        loop {
            if self.at_timing_offset() {
                left = self.timing(left)?;
                continue;
            }

            // `starts`/`ends` qualify a following timing keyword
            if self.check_keyword(Keyword::Starts) || self.check_keyword(Keyword::Ends) {
                let boundary = if self.check_keyword(Keyword::Starts) {
                    UnaryOp::StartOf
                } else {
                    UnaryOp::EndOf
                };
                if Self::is_temporal_keyword(self.peek_at(1).kind) || self.at_timing_offset_from(1) {
                    self.advance();
                    left = Expression::unary(boundary, left);
                    continue;
                }
            }

            let op = match self.peek().kind {
                TokenKind::Keyword(Keyword::In) => BinaryOp::In,
                TokenKind::Keyword(Keyword::During) => BinaryOp::During,
                TokenKind::Keyword(Keyword::Before) => BinaryOp::Before,
                TokenKind::Keyword(Keyword::After) => BinaryOp::After,
                TokenKind::Keyword(Keyword::Overlaps) => BinaryOp::Overlaps,
                TokenKind::Keyword(Keyword::Starts) => BinaryOp::Starts,
                TokenKind::Keyword(Keyword::Ends) => BinaryOp::Ends,
                TokenKind::Keyword(Keyword::On) => {
                    self.advance();
                    self.expect_keyword(Keyword::Or)?;
                    if self.eat_keyword(Keyword::After) {
                        let right = self.additive_expression()?;
                        left = Expression::binary(BinaryOp::OnOrAfter, left, right);
                    } else {
                        self.expect_keyword(Keyword::Before)?;
                        let right = self.additive_expression()?;
                        left = Expression::binary(BinaryOp::OnOrBefore, left, right);
                    }
                    continue;
                }
                _ => break,
            };
            self.advance();
            let right = self.additive_expression()?;
            left = Expression::binary(op, left, right);
        }

        Ok(left)
    }

    fn is_temporal_keyword(kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Keyword(
                Keyword::During | Keyword::Before | Keyword::After | Keyword::On | Keyword::In
            )
        )
    }

    fn at_timing_offset(&self) -> bool {
        self.at_timing_offset_from(0)
    }

    /// `N unit [or less|or more] (before|after)` starting `n` tokens ahead
    fn at_timing_offset_from(&self, n: usize) -> bool {
        let number = self.peek_at(n);
        let unit = self.peek_at(n + 1);
        if !matches!(number.kind, TokenKind::Integer | TokenKind::Decimal)
            || unit.kind != TokenKind::Identifier
            || DurationUnit::from_keyword(&unit.literal_text).is_none()
        {
            return false;
        }
        let mut next = n + 2;
        if self.peek_at(next).is_keyword(Keyword::Or) {
            let qualifier = self.peek_at(next + 1);
            if !(Self::is_word(qualifier, "less") || Self::is_word(qualifier, "more")) {
                return false;
            }
            next += 2;
        }
        let direction = self.peek_at(next);
        direction.is_keyword(Keyword::Before) || direction.is_keyword(Keyword::After)
    }

    fn timing(&mut self, left: Expression) -> Result<Expression> {
        let amount = self.advance().literal_text;
        let unit_token = self.advance();
        let unit = DurationUnit::from_keyword(&unit_token.literal_text)
            .ok_or_else(|| self.error(CQL0012, "duration unit"))?;
        let bound = if self.eat_keyword(Keyword::Or) {
            let qualifier = self.advance();
            if Self::is_word(&qualifier, "less") {
                Some(OffsetBound::OrLess)
            } else {
                Some(OffsetBound::OrMore)
            }
        } else {
            None
        };
        let direction = if self.eat_keyword(Keyword::Before) {
            TimingDirection::Before
        } else {
            self.expect_keyword(Keyword::After)?;
            TimingDirection::After
        };
        let right = self.additive_expression()?;
        Ok(Expression::Timing(TimingExpr {
            left: Box::new(left),
            right: Box::new(right),
            amount,
            unit,
            bound,
            direction,
        }))
    }

    /// Arithmetic, concatenation and set operators
    fn additive_expression(&mut self) -> Result<Expression> {
        let mut left = self.multiplicative_expression()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                TokenKind::Ampersand => BinaryOp::Concatenate,
                TokenKind::Keyword(Keyword::Union) => BinaryOp::Union,
                TokenKind::Keyword(Keyword::Except) => BinaryOp::Except,
                TokenKind::Keyword(Keyword::Intersect) => BinaryOp::Intersect,
                _ => break,
            };
            self.advance();
            let right = self.multiplicative_expression()?;
            left = Expression::binary(op, left, right);
        }

        Ok(left)
    }

    fn multiplicative_expression(&mut self) -> Result<Expression> {
        let mut left = self.unary_expression()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                _ => break,
            };
            self.advance();
            let right = self.unary_expression()?;
            left = Expression::binary(op, left, right);
        }

        Ok(left)
    }

    fn unary_expression(&mut self) -> Result<Expression> {
        let op = match self.peek().kind {
            TokenKind::Keyword(Keyword::Not) => UnaryOp::Not,
            TokenKind::Keyword(Keyword::Exists) => UnaryOp::Exists,
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Keyword(Keyword::Start) if self.peek_at(1).is_keyword(Keyword::Of) => {
                self.advance();
                UnaryOp::StartOf
            }
            TokenKind::Keyword(Keyword::End) if self.peek_at(1).is_keyword(Keyword::Of) => {
                self.advance();
                UnaryOp::EndOf
            }
            _ => return self.postfix_expression(),
        };
        self.advance();
        let operand = self.unary_expression()?;
        Ok(Expression::unary(op, operand))
    }

    /// Member access and function calls
    fn postfix_expression(&mut self) -> Result<Expression> {
        let mut expr = self.primary()?;

        loop {
            if self.eat(TokenKind::Dot) {
                let member = self.member_name()?;
                expr = Expression::member(expr, member);
            } else if self.check(TokenKind::LParen) {
                let name = match &expr {
                    Expression::Identifier(id) => id.name.clone(),
                    Expression::MemberAccess(access) => match access.object.as_identifier() {
                        Some(library) => format!("{library}.{}", access.member),
                        None => break,
                    },
                    _ => break,
                };
                self.advance();
                let args = self.arguments()?;
                expr = Expression::call(name, args);
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Member names may collide with keywords (`.code`, `.start`)
    fn member_name(&mut self) -> Result<String> {
        match self.peek().kind {
            TokenKind::Identifier | TokenKind::QuotedIdentifier | TokenKind::Keyword(_) => {
                Ok(self.advance().literal_text)
            }
            _ => Err(self.error(CQL0013, "member name")),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expression>> {
        let mut args = Vec::new();
        if self.eat(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)
                .map_err(|_| self.error(CQL0010, "')'"))?;
            return Ok(args);
        }
    }

    fn primary(&mut self) -> Result<Expression> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Integer | TokenKind::Decimal => {
                self.advance();
                Ok(Expression::literal(self.number_literal(token.kind, token.literal_text)))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expression::literal(Literal::string(token.literal_text)))
            }
            TokenKind::Date | TokenKind::DateTime | TokenKind::Time => {
                self.advance();
                let value_type = match token.kind {
                    TokenKind::Date => LiteralType::Date,
                    TokenKind::DateTime => LiteralType::DateTime,
                    _ => LiteralType::Time,
                };
                Ok(Expression::literal(Literal::new(value_type, token.literal_text)))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expression::literal(Literal::boolean(true)))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expression::literal(Literal::boolean(false)))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expression::literal(Literal::null()))
            }
            TokenKind::Keyword(Keyword::Interval) => self.interval(),
            TokenKind::Identifier | TokenKind::QuotedIdentifier => {
                self.advance();
                let source = Expression::identifier(token.literal_text);
                self.maybe_query(source)
            }
            TokenKind::LBracket => {
                let source = self.resource_reference()?;
                self.maybe_query(source)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)
                    .map_err(|_| self.error(CQL0010, "')'"))?;
                self.maybe_query(inner)
            }
            _ => Err(self.error(CQL0012, "expression")),
        }
    }

    /// Integer or decimal, widened to a quantity when a unit follows
    fn number_literal(&mut self, kind: TokenKind, value: String) -> Literal {
        let next = self.peek();
        if next.kind == TokenKind::Identifier && DurationUnit::from_keyword(&next.literal_text).is_some()
        {
            let unit = self.advance().literal_text;
            return Literal::quantity(value, unit);
        }
        if next.kind == TokenKind::String {
            let unit = self.advance().literal_text;
            return Literal::quantity(value, unit);
        }
        if kind == TokenKind::Decimal {
            Literal::decimal(value)
        } else {
            Literal::integer(value)
        }
    }

    /// `Interval[a, b)` with independent closure per side
    fn interval(&mut self) -> Result<Expression> {
        self.advance();
        let start_closed = match self.peek().kind {
            TokenKind::LBracket => true,
            TokenKind::LParen => false,
            _ => return Err(self.error(CQL0029, "'[' or '('")),
        };
        self.advance();
        let start = self.expression()?;
        self.expect(TokenKind::Comma)?;
        let end = self.expression()?;
        let end_closed = match self.peek().kind {
            TokenKind::RBracket => true,
            TokenKind::RParen => false,
            _ => return Err(self.error(CQL0029, "']' or ')'")),
        };
        self.advance();
        Ok(Expression::Interval(IntervalExpr {
            start: Some(Box::new(start)),
            end: Some(Box::new(end)),
            start_closed,
            end_closed,
        }))
    }

    /// `[Type]` or `[Type: filter]`
    fn resource_reference(&mut self) -> Result<Expression> {
        self.expect(TokenKind::LBracket)?;
        let resource_type = self
            .expect_name()
            .map_err(|_| self.error(CQL0028, "resource type"))?;
        let code_filter = if self.eat(TokenKind::Colon) {
            Some(Box::new(self.code_filter()?))
        } else {
            None
        };
        self.expect(TokenKind::RBracket)
            .map_err(|_| self.error(CQL0010, "']'"))?;
        Ok(Expression::ResourceReference(ResourceReference {
            resource_type,
            code_filter,
        }))
    }

    /// `"ValueSet"`, `'text'`, or `path in|= expr`
    fn code_filter(&mut self) -> Result<Expression> {
        let path_like = matches!(
            self.peek().kind,
            TokenKind::Identifier | TokenKind::Keyword(Keyword::Code)
        );
        let op = match self.peek_at(1).kind {
            TokenKind::Keyword(Keyword::In) => Some(BinaryOp::In),
            TokenKind::Eq => Some(BinaryOp::Equal),
            TokenKind::Tilde => Some(BinaryOp::Equivalent),
            _ => None,
        };
        match op {
            Some(op) if path_like => {
                let path = self.advance().literal_text;
                self.advance();
                let target = self.additive_expression()?;
                Ok(Expression::binary(op, Expression::identifier(path), target))
            }
            _ => self.expression(),
        }
    }

    /// Source of a query or relationship: retrieve, identifier or parenthesised expression
    fn query_source(&mut self) -> Result<Expression> {
        match self.peek().kind {
            TokenKind::LBracket => self.resource_reference(),
            TokenKind::Identifier | TokenKind::QuotedIdentifier => {
                Ok(Expression::identifier(self.advance().literal_text))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)
                    .map_err(|_| self.error(CQL0010, "')'"))?;
                Ok(inner)
            }
            _ => Err(self.error(CQL0027, "query source")),
        }
    }

    fn alias(&mut self) -> Option<String> {
        if self.check(TokenKind::Identifier) {
            Some(self.advance().literal_text)
        } else {
            None
        }
    }

    /// Promote `source` into a query when an alias or query clause follows
    fn maybe_query(&mut self, source: Expression) -> Result<Expression> {
        let alias = self.alias();
        let clause_follows = match self.peek().kind {
            TokenKind::Keyword(kw) => kw.starts_query_clause(),
            _ => false,
        };
        if alias.is_none() && !clause_follows {
            return Ok(source);
        }

        let mut relationships = Vec::new();
        loop {
            let kind = if self.eat_keyword(Keyword::With) {
                RelationshipKind::With
            } else if self.eat_keyword(Keyword::Without) {
                RelationshipKind::Without
            } else {
                break;
            };
            let rel_source = self.query_source()?;
            let rel_alias = self.alias();
            let condition = if self.eat_keyword(Keyword::Such) {
                self.expect_keyword(Keyword::That)?;
                Some(Box::new(self.expression()?))
            } else {
                None
            };
            relationships.push(RelationshipClause {
                kind,
                source: Box::new(rel_source),
                alias: rel_alias,
                condition,
            });
        }

        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        let return_clause = if self.eat_keyword(Keyword::Return) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };

        Ok(Expression::Query(Box::new(Query {
            source: Box::new(source),
            alias,
            relationships,
            where_clause,
            return_clause,
        })))
    }
}
