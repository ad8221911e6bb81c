use serde_json::{Number, Value};

use super::ast::{BinOp, Expr, Node, TestKind};
use super::filters::Filter;
use super::lexer::{Tok, Token};
use crate::error::{WidgetError, WidgetResult};

/// Deepest nesting a template may use. Blocks, parentheses and every step
/// of an operator, attribute or filter chain each count as one level.
pub const MAX_TEMPLATE_DEPTH: usize = 64;

pub(crate) fn parse(tokens: Vec<Token>) -> WidgetResult<Vec<Node>> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let (nodes, _) = parser.parse_nodes(&[])?;
    Ok(nodes)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Text(_) => "text".to_string(),
        Tok::VarStart => "'{{'".to_string(),
        Tok::VarEnd => "'}}'".to_string(),
        Tok::BlockStart => "'{%'".to_string(),
        Tok::BlockEnd => "'%}'".to_string(),
        Tok::Name(name) => format!("name '{}'", name),
        Tok::Str(_) => "string".to_string(),
        Tok::Int(n) => format!("number {}", n),
        Tok::Float(n) => format!("number {}", n),
        Tok::Op(op) => format!("'{}'", op),
        Tok::Eof => "end of template".to_string(),
    }
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_tok_at(&self, offset: usize) -> &Tok {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].tok
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.tok != Tok::Eof {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> WidgetError {
        WidgetError::TemplateSyntax {
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }

    fn unexpected(&self, token: &Token, expected: &str) -> WidgetError {
        self.error_at(
            token,
            format!("expected {}, found {}", expected, describe(&token.tok)),
        )
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(&self.peek().tok, Tok::Op(o) if *o == op)
    }

    fn is_name(&self, name: &str) -> bool {
        matches!(&self.peek().tok, Tok::Name(n) if n == name)
    }

    fn expect_op(&mut self, op: &str) -> WidgetResult<()> {
        let token = self.advance();
        match &token.tok {
            Tok::Op(o) if *o == op => Ok(()),
            _ => Err(self.unexpected(&token, &format!("'{}'", op))),
        }
    }

    fn expect_name(&mut self) -> WidgetResult<String> {
        let token = self.advance();
        match token.tok {
            Tok::Name(name) => Ok(name),
            _ => Err(self.unexpected(&token, "a name")),
        }
    }

    fn expect_tok(&mut self, expected: Tok) -> WidgetResult<()> {
        let token = self.advance();
        if token.tok == expected {
            Ok(())
        } else {
            Err(self.unexpected(&token, &describe(&expected)))
        }
    }

    fn enter(&mut self, at: &Token) -> WidgetResult<()> {
        self.depth += 1;
        if self.depth > MAX_TEMPLATE_DEPTH {
            return Err(self.error_at(
                at,
                format!("nesting deeper than {} levels", MAX_TEMPLATE_DEPTH),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ─── Statements ──────────────────────────────────────────────────────────

    /// Parse nodes until a block tag named in `end_tags` (consumed, its name
    /// returned) or the end of the template (`None`).
    fn parse_nodes(&mut self, end_tags: &[&str]) -> WidgetResult<(Vec<Node>, Option<String>)> {
        let mut nodes = Vec::new();

        loop {
            let token = self.advance();
            match token.tok {
                Tok::Eof => return Ok((nodes, None)),
                Tok::Text(text) => nodes.push(Node::Text(text)),
                Tok::VarStart => {
                    let expr = self.parse_expr()?;
                    self.expect_tok(Tok::VarEnd)?;
                    nodes.push(Node::Print(expr));
                }
                Tok::BlockStart => {
                    let tag_token = self.advance();
                    let Tok::Name(tag) = &tag_token.tok else {
                        return Err(self.unexpected(&tag_token, "a tag name"));
                    };
                    if end_tags.contains(&tag.as_str()) {
                        return Ok((nodes, Some(tag.clone())));
                    }
                    let node = match tag.as_str() {
                        "if" => self.parse_if(&tag_token)?,
                        "for" => self.parse_for(&tag_token)?,
                        "set" => self.parse_set()?,
                        "elseif" | "else" | "endif" | "endfor" => {
                            return Err(self.error_at(&tag_token, format!("unexpected '{}'", tag)))
                        }
                        other => {
                            return Err(self.error_at(&tag_token, format!("unknown tag '{}'", other)))
                        }
                    };
                    nodes.push(node);
                }
                _ => return Err(self.unexpected(&token, "text or a tag")),
            }
        }
    }

    fn parse_block_body(
        &mut self,
        opener: &Token,
        block: &str,
        end_tags: &[&str],
    ) -> WidgetResult<(Vec<Node>, String)> {
        self.enter(opener)?;
        let (body, end) = self.parse_nodes(end_tags)?;
        self.leave();
        let end = end.ok_or_else(|| {
            self.error_at(opener, format!("unclosed '{}' block", block))
        })?;
        Ok((body, end))
    }

    fn parse_if(&mut self, opener: &Token) -> WidgetResult<Node> {
        let mut branches = Vec::new();
        let mut condition = self.parse_expr()?;
        self.expect_tok(Tok::BlockEnd)?;

        loop {
            let (body, end) =
                self.parse_block_body(opener, "if", &["elseif", "else", "endif"])?;
            branches.push((condition, body));

            match end.as_str() {
                "elseif" => {
                    condition = self.parse_expr()?;
                    self.expect_tok(Tok::BlockEnd)?;
                }
                "else" => {
                    self.expect_tok(Tok::BlockEnd)?;
                    let (otherwise, _) = self.parse_block_body(opener, "if", &["endif"])?;
                    self.expect_tok(Tok::BlockEnd)?;
                    return Ok(Node::If { branches, otherwise });
                }
                _ => {
                    self.expect_tok(Tok::BlockEnd)?;
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    });
                }
            }
        }
    }

    fn parse_for(&mut self, opener: &Token) -> WidgetResult<Node> {
        let first = self.expect_name()?;
        let (key, value) = if self.is_op(",") {
            self.advance();
            (Some(first), self.expect_name()?)
        } else {
            (None, first)
        };

        let in_token = self.advance();
        if !matches!(&in_token.tok, Tok::Name(n) if n == "in") {
            return Err(self.unexpected(&in_token, "'in'"));
        }
        let iterable = self.parse_expr()?;
        self.expect_tok(Tok::BlockEnd)?;

        let (body, end) = self.parse_block_body(opener, "for", &["else", "endfor"])?;
        self.expect_tok(Tok::BlockEnd)?;

        let otherwise = if end == "else" {
            let (otherwise, _) = self.parse_block_body(opener, "for", &["endfor"])?;
            self.expect_tok(Tok::BlockEnd)?;
            otherwise
        } else {
            Vec::new()
        };

        Ok(Node::For {
            key,
            value,
            iterable,
            body,
            otherwise,
        })
    }

    fn parse_set(&mut self) -> WidgetResult<Node> {
        let name = self.expect_name()?;
        self.expect_op("=")?;
        let value = self.parse_expr()?;
        self.expect_tok(Tok::BlockEnd)?;
        Ok(Node::Set { name, value })
    }

    // ─── Expressions ─────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> WidgetResult<Expr> {
        let at = self.peek().clone();
        self.enter(&at)?;
        let expr = self.parse_or();
        self.leave();
        expr
    }

    /// Every operator in a chain nests the tree one level deeper, so chains
    /// count against the same depth budget as blocks and parentheses.
    fn chain_step(&mut self, steps: &mut usize) -> WidgetResult<()> {
        let at = self.peek().clone();
        self.enter(&at)?;
        *steps += 1;
        Ok(())
    }

    fn end_chain(&mut self, steps: usize) {
        self.depth -= steps;
    }

    fn parse_or(&mut self) -> WidgetResult<Expr> {
        let mut left = self.parse_and()?;
        let mut steps = 0;
        while self.is_name("or") {
            self.chain_step(&mut steps)?;
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        self.end_chain(steps);
        Ok(left)
    }

    fn parse_and(&mut self) -> WidgetResult<Expr> {
        let mut left = self.parse_comparison()?;
        let mut steps = 0;
        while self.is_name("and") {
            self.chain_step(&mut steps)?;
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        self.end_chain(steps);
        Ok(left)
    }

    fn parse_comparison(&mut self) -> WidgetResult<Expr> {
        let mut left = self.parse_concat()?;
        let mut steps = 0;
        loop {
            let op = match &self.peek().tok {
                Tok::Op("==") => BinOp::Eq,
                Tok::Op("!=") => BinOp::Ne,
                Tok::Op("<") => BinOp::Lt,
                Tok::Op(">") => BinOp::Gt,
                Tok::Op("<=") => BinOp::Le,
                Tok::Op(">=") => BinOp::Ge,
                Tok::Name(n) if n == "in" => BinOp::In,
                Tok::Name(n) if n == "not" && *self.peek_tok_at(1) == Tok::Name("in".into()) => {
                    BinOp::NotIn
                }
                _ => break,
            };
            self.chain_step(&mut steps)?;
            if op == BinOp::NotIn {
                self.advance();
            }
            self.advance();
            let right = self.parse_concat()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.end_chain(steps);
        Ok(left)
    }

    fn parse_concat(&mut self) -> WidgetResult<Expr> {
        let mut left = self.parse_additive()?;
        let mut steps = 0;
        while self.is_op("~") {
            self.chain_step(&mut steps)?;
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(BinOp::Concat, Box::new(left), Box::new(right));
        }
        self.end_chain(steps);
        Ok(left)
    }

    fn parse_additive(&mut self) -> WidgetResult<Expr> {
        let mut left = self.parse_not()?;
        let mut steps = 0;
        loop {
            let op = match &self.peek().tok {
                Tok::Op("+") => BinOp::Add,
                Tok::Op("-") => BinOp::Sub,
                _ => break,
            };
            self.chain_step(&mut steps)?;
            self.advance();
            let right = self.parse_not()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.end_chain(steps);
        Ok(left)
    }

    /// `not` binds tighter than comparisons and `+`, looser than `*`:
    /// `not a == b` is `(not a) == b`.
    fn parse_not(&mut self) -> WidgetResult<Expr> {
        if self.is_name("not") {
            let at = self.advance();
            self.enter(&at)?;
            let inner = self.parse_not();
            self.leave();
            return Ok(Expr::Not(Box::new(inner?)));
        }
        self.parse_multiplicative()
    }

    fn parse_multiplicative(&mut self) -> WidgetResult<Expr> {
        let mut left = self.parse_unary()?;
        let mut steps = 0;
        loop {
            let op = match &self.peek().tok {
                Tok::Op("*") => BinOp::Mul,
                Tok::Op("/") => BinOp::Div,
                Tok::Op("%") => BinOp::Rem,
                _ => break,
            };
            self.chain_step(&mut steps)?;
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.end_chain(steps);
        Ok(left)
    }

    fn parse_unary(&mut self) -> WidgetResult<Expr> {
        if self.is_op("-") {
            let at = self.advance();
            self.enter(&at)?;
            let inner = self.parse_unary();
            self.leave();
            return Ok(Expr::Neg(Box::new(inner?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> WidgetResult<Expr> {
        let mut expr = self.parse_primary()?;
        let mut steps = 0;
        loop {
            if self.is_op(".") {
                self.chain_step(&mut steps)?;
                self.advance();
                let token = self.advance();
                let key = match token.tok {
                    Tok::Name(name) => Value::String(name),
                    Tok::Int(n) => Value::from(n),
                    _ => return Err(self.unexpected(&token, "an attribute name")),
                };
                expr = Expr::Index(Box::new(expr), Box::new(Expr::Literal(key)));
            } else if self.is_op("[") {
                self.chain_step(&mut steps)?;
                self.advance();
                let key = self.parse_expr()?;
                self.expect_op("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(key));
            } else if self.is_op("|") {
                self.chain_step(&mut steps)?;
                self.advance();
                expr = self.parse_filter(expr)?;
            } else if self.is_name("is") {
                self.chain_step(&mut steps)?;
                self.advance();
                expr = self.parse_test(expr)?;
            } else {
                break;
            }
        }
        self.end_chain(steps);
        Ok(expr)
    }

    fn parse_filter(&mut self, input: Expr) -> WidgetResult<Expr> {
        let name_token = self.advance();
        let Tok::Name(name) = &name_token.tok else {
            return Err(self.unexpected(&name_token, "a filter name"));
        };
        let filter = Filter::from_name(name)
            .ok_or_else(|| self.error_at(&name_token, format!("unknown filter '{}'", name)))?;

        let mut args = Vec::new();
        if self.is_op("(") {
            self.advance();
            while !self.is_op(")") {
                args.push(self.parse_expr()?);
                if !self.is_op(",") {
                    break;
                }
                self.advance();
            }
            self.expect_op(")")?;
        }

        let (min, max) = filter.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                format!("{}", min)
            } else {
                format!("{} to {}", min, max)
            };
            return Err(self.error_at(
                &name_token,
                format!(
                    "filter '{}' takes {} argument(s), got {}",
                    name,
                    expected,
                    args.len()
                ),
            ));
        }

        Ok(Expr::Filter {
            input: Box::new(input),
            filter,
            args,
        })
    }

    fn parse_test(&mut self, input: Expr) -> WidgetResult<Expr> {
        let negated = if self.is_name("not") {
            self.advance();
            true
        } else {
            false
        };
        let token = self.advance();
        let test = match &token.tok {
            Tok::Name(n) if n == "defined" => TestKind::Defined,
            Tok::Name(n) if n == "empty" => TestKind::Empty,
            Tok::Name(n) if n == "null" || n == "none" => TestKind::Null,
            Tok::Name(n) => return Err(self.error_at(&token, format!("unknown test '{}'", n))),
            _ => return Err(self.unexpected(&token, "a test name")),
        };
        Ok(Expr::Test {
            input: Box::new(input),
            test,
            negated,
        })
    }

    fn parse_primary(&mut self) -> WidgetResult<Expr> {
        let token = self.advance();
        match token.tok {
            Tok::Int(n) => Ok(Expr::Literal(Value::from(n))),
            Tok::Float(n) => Ok(Expr::Literal(
                Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
            )),
            Tok::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Tok::Name(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "none" => Expr::Literal(Value::Null),
                _ => Expr::Name(name),
            }),
            Tok::Op("(") => {
                let expr = self.parse_expr()?;
                self.expect_op(")")?;
                Ok(expr)
            }
            Tok::Op("[") => {
                let mut items = Vec::new();
                while !self.is_op("]") {
                    items.push(self.parse_expr()?);
                    if !self.is_op(",") {
                        break;
                    }
                    self.advance();
                }
                self.expect_op("]")?;
                Ok(Expr::List(items))
            }
            _ => Err(self.unexpected(&token, "an expression")),
        }
    }
}
