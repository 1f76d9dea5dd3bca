//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Arithmetic expression parser and evaluator."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Arithmetic expressions over declared variables.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary | unary)*   // juxtaposition multiplies: 2t, 3(x+1)
//! unary   := ('-' | '+') unary | power
//! power   := primary ('^' unary)?                        // right associative, -2^2 == -4
//! primary := number | constant | variable | function '(' expr (',' expr)* ')' | '(' expr ')'
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use r_player_model::{Formula, ModelError};

use crate::errors::ExpressionError;

type ParseResult<T> = std::result::Result<T, ExpressionError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {n}"),
            Token::Ident(name) => write!(f, "identifier {name:?}"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Percent => f.write_str("'%'"),
            Token::Caret => f.write_str("'^'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(text: &str) -> ParseResult<Vec<(usize, Token)>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        let start = i;
        let token = match ch {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            c if c.is_ascii_digit() || c == '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // scientific notation only when digits follow the exponent marker
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::UnexpectedCharacter { ch, position: start })?;
                tokens.push((start, Token::Number(number)));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push((start, Token::Ident(chars[start..i].iter().collect())));
                continue;
            }
            other => {
                return Err(ExpressionError::UnexpectedCharacter {
                    ch: other,
                    position: start,
                })
            }
        };
        tokens.push((start, token));
        i += 1;
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Sin,
    Cos,
    Tan,
    Cot,
    Sec,
    Csc,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Sqrt,
    Cbrt,
    Abs,
    Exp,
    Expm1,
    Log,
    Log2,
    Log10,
    Log1p,
    Floor,
    Ceil,
    Signum,
    ToRadian,
    ToDegree,
    Pow,
    Atan2,
}

impl Function {
    fn lookup(name: &str) -> Option<Function> {
        let function = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "cot" => Function::Cot,
            "sec" => Function::Sec,
            "csc" => Function::Csc,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            "sqrt" => Function::Sqrt,
            "cbrt" => Function::Cbrt,
            "abs" => Function::Abs,
            "exp" => Function::Exp,
            "expm1" => Function::Expm1,
            "log" => Function::Log,
            "log2" => Function::Log2,
            "log10" => Function::Log10,
            "log1p" => Function::Log1p,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "signum" => Function::Signum,
            "toradian" => Function::ToRadian,
            "todegree" => Function::ToDegree,
            "pow" => Function::Pow,
            "atan2" => Function::Atan2,
            _ => return None,
        };
        Some(function)
    }

    fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Cot => "cot",
            Function::Sec => "sec",
            Function::Csc => "csc",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
            Function::Sqrt => "sqrt",
            Function::Cbrt => "cbrt",
            Function::Abs => "abs",
            Function::Exp => "exp",
            Function::Expm1 => "expm1",
            Function::Log => "log",
            Function::Log2 => "log2",
            Function::Log10 => "log10",
            Function::Log1p => "log1p",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Signum => "signum",
            Function::ToRadian => "toradian",
            Function::ToDegree => "todegree",
            Function::Pow => "pow",
            Function::Atan2 => "atan2",
        }
    }

    fn arity(self) -> usize {
        match self {
            Function::Pow | Function::Atan2 => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let x = args[0];
        match self {
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Cot => 1.0 / x.tan(),
            Function::Sec => 1.0 / x.cos(),
            Function::Csc => 1.0 / x.sin(),
            Function::Asin => x.asin(),
            Function::Acos => x.acos(),
            Function::Atan => x.atan(),
            Function::Sinh => x.sinh(),
            Function::Cosh => x.cosh(),
            Function::Tanh => x.tanh(),
            Function::Sqrt => x.sqrt(),
            Function::Cbrt => x.cbrt(),
            Function::Abs => x.abs(),
            Function::Exp => x.exp(),
            Function::Expm1 => x.exp_m1(),
            Function::Log => x.ln(),
            Function::Log2 => x.log2(),
            Function::Log10 => x.log10(),
            Function::Log1p => x.ln_1p(),
            Function::Floor => x.floor(),
            Function::Ceil => x.ceil(),
            Function::Signum => {
                if x == 0.0 || x.is_nan() {
                    x
                } else {
                    x.signum()
                }
            }
            Function::ToRadian => x.to_radians(),
            Function::ToDegree => x.to_degrees(),
            Function::Pow => x.powf(args[1]),
            Function::Atan2 => x.atan2(args[1]),
        }
    }
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" | "π" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Variable(String),
    Negate(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

impl Node {
    fn eval(&self, bindings: &HashMap<String, f64>) -> ParseResult<f64> {
        let value = match self {
            Node::Number(n) => *n,
            Node::Variable(name) => *bindings
                .get(name)
                .ok_or_else(|| ExpressionError::UnboundVariable(name.clone()))?,
            Node::Negate(inner) => -inner.eval(bindings)?,
            Node::Binary(op, left, right) => {
                let l = left.eval(bindings)?;
                let r = right.eval(bindings)?;
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Subtract => l - r,
                    BinaryOp::Multiply => l * r,
                    BinaryOp::Divide => {
                        if r == 0.0 {
                            return Err(ExpressionError::DivisionByZero);
                        }
                        l / r
                    }
                    BinaryOp::Modulo => {
                        if r == 0.0 {
                            return Err(ExpressionError::DivisionByZero);
                        }
                        l % r
                    }
                    BinaryOp::Power => l.powf(r),
                }
            }
            Node::Call(function, args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(bindings))
                    .collect::<ParseResult<Vec<f64>>>()?;
                function.apply(&values)
            }
        };
        Ok(value)
    }
}

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
    variables: &'a BTreeSet<String>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(_, token)| token)
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let item = self.tokens.get(self.cursor).cloned();
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }

    fn unexpected(&self) -> ExpressionError {
        match self.tokens.get(self.cursor) {
            Some((position, token)) => ExpressionError::UnexpectedToken {
                found: token.to_string(),
                position: *position,
            },
            None => ExpressionError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.peek() == Some(&expected) {
            self.cursor += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expression(&mut self) -> ParseResult<Node> {
        let mut node = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => return Ok(node),
            };
            self.cursor += 1;
            node = Node::Binary(op, Box::new(node), Box::new(self.term()?));
        }
    }

    fn term(&mut self) -> ParseResult<Node> {
        let mut node = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                Some(Token::Percent) => BinaryOp::Modulo,
                Some(Token::Number(_)) | Some(Token::Ident(_)) | Some(Token::LParen) => {
                    node = Node::Binary(BinaryOp::Multiply, Box::new(node), Box::new(self.unary()?));
                    continue;
                }
                _ => return Ok(node),
            };
            self.cursor += 1;
            node = Node::Binary(op, Box::new(node), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> ParseResult<Node> {
        match self.peek() {
            Some(Token::Minus) => {
                self.cursor += 1;
                Ok(Node::Negate(Box::new(self.unary()?)))
            }
            Some(Token::Plus) => {
                self.cursor += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> ParseResult<Node> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Caret) {
            self.cursor += 1;
            let exponent = self.unary()?;
            return Ok(Node::Binary(BinaryOp::Power, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> ParseResult<Node> {
        let Some((position, token)) = self.advance() else {
            return Err(ExpressionError::UnexpectedEnd);
        };
        match token {
            Token::Number(n) => Ok(Node::Number(n)),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.variables.contains(&name) {
                    return Ok(Node::Variable(name));
                }
                if self.peek() == Some(&Token::LParen) {
                    let function = Function::lookup(&name)
                        .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
                    return self.call(function);
                }
                if let Some(value) = constant(&name) {
                    return Ok(Node::Number(value));
                }
                Err(ExpressionError::UnknownVariable(name))
            }
            other => Err(ExpressionError::UnexpectedToken {
                found: other.to_string(),
                position,
            }),
        }
    }

    fn call(&mut self, function: Function) -> ParseResult<Node> {
        self.expect(Token::LParen)?;
        let mut args = vec![self.expression()?];
        while self.peek() == Some(&Token::Comma) {
            self.cursor += 1;
            args.push(self.expression()?);
        }
        self.expect(Token::RParen)?;
        if args.len() != function.arity() {
            return Err(ExpressionError::ArgumentCount {
                function: function.name(),
                expected: function.arity(),
                found: args.len(),
            });
        }
        Ok(Node::Call(function, args))
    }
}

/// A parsed expression, ready to be evaluated repeatedly.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parse `text`; every identifier that is not a function or constant must be in `variables`.
    pub fn parse(text: &str, variables: &BTreeSet<String>) -> ParseResult<Self> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(ExpressionError::UnexpectedEnd);
        }
        let mut parser = Parser {
            tokens,
            cursor: 0,
            variables,
        };
        let root = parser.expression()?;
        if parser.cursor < parser.tokens.len() {
            return Err(parser.unexpected());
        }
        Ok(Self {
            source: text.trim().to_owned(),
            root,
        })
    }

    pub fn evaluate(&self, bindings: &HashMap<String, f64>) -> ParseResult<f64> {
        self.root.eval(bindings)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Formula for Expression {
    fn evaluate(&self, bindings: &HashMap<String, f64>) -> r_player_model::Result<f64> {
        Expression::evaluate(self, bindings).map_err(|err| ModelError::Evaluation {
            formula: self.source.clone(),
            reason: err.to_string(),
        })
    }

    fn source(&self) -> &str {
        &self.source
    }
}
