//! Expression grammar of the table backend
//!
//! Conditions, key conditions, update actions and projections are plain text
//! with `#alias` name placeholders and `:alias` value placeholders resolved
//! through the request's indirection tables:
//!
//! ```text
//! condition := disjunct ("OR" disjunct)*
//! disjunct  := negation ("AND" negation)*
//! negation  := "NOT" negation | "(" condition ")" | function | operand cmp operand
//! function  := attribute_exists(path) | attribute_not_exists(path)
//!            | begins_with(path, operand)
//! cmp       := = | <> | < | <= | > | >=
//! update    := ("SET" path = operand ("," path = operand)*)? ("REMOVE" path ("," path)*)?
//! ```
//!
//! Keywords are case-insensitive. Placeholders are resolved at parse time, so
//! an evaluated expression never fails.

use super::TableError;
use keyfold_core::{DyadicOp, Item, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Literal(String),
    Ident(String),
    Cmp(DyadicOp),
    LParen,
    RParen,
    Comma,
}

fn placeholder_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(text: &str) -> Result<Vec<Token>, TableError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(at, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Cmp(DyadicOp::Eq));
            }
            '<' | '>' => {
                chars.next();
                let op = match (c, chars.peek().map(|&(_, n)| n)) {
                    ('<', Some('>')) => Some(DyadicOp::Ne),
                    ('<', Some('=')) => Some(DyadicOp::Le),
                    ('>', Some('=')) => Some(DyadicOp::Ge),
                    _ => None,
                };
                match op {
                    Some(op) => {
                        chars.next();
                        tokens.push(Token::Cmp(op));
                    }
                    None if c == '<' => tokens.push(Token::Cmp(DyadicOp::Lt)),
                    None => tokens.push(Token::Cmp(DyadicOp::Gt)),
                }
            }
            '#' | ':' => {
                chars.next();
                let mut word = String::from(c);
                while let Some(&(_, n)) = chars.peek() {
                    if !placeholder_char(n) {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                if word.len() == 1 {
                    return Err(TableError::Validation(format!(
                        "empty placeholder at offset {}",
                        at
                    )));
                }
                tokens.push(if c == '#' {
                    Token::Name(word)
                } else {
                    Token::Literal(word)
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, n)) = chars.peek() {
                    if !(placeholder_char(n) || n == '.' || n == '-') {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                tokens.push(Token::Ident(word));
            }
            other => {
                return Err(TableError::Validation(format!(
                    "unexpected character '{}' at offset {}",
                    other, at
                )));
            }
        }
    }
    Ok(tokens)
}

/// Side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Attribute of the evaluated item
    Path(String),
    /// Literal bound through a `:alias`
    Literal(Value),
}

impl Operand {
    fn resolve<'a>(&'a self, item: Option<&'a Item>) -> Option<&'a Value> {
        match self {
            Operand::Path(attr) => item.and_then(|item| item.get(attr)),
            Operand::Literal(value) => Some(value),
        }
    }
}

/// Parsed boolean condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Both hold
    And(Box<Condition>, Box<Condition>),
    /// Either holds
    Or(Box<Condition>, Box<Condition>),
    /// Negation
    Not(Box<Condition>),
    /// `left op right`
    Compare {
        /// Comparator
        op: DyadicOp,
        /// Left side
        left: Operand,
        /// Right side
        right: Operand,
    },
    /// `attribute_exists(path)`
    Exists(String),
    /// `attribute_not_exists(path)`
    NotExists(String),
    /// `begins_with(path, operand)`
    BeginsWith(String, Operand),
}

impl Condition {
    /// Parse condition text, resolving placeholders
    pub fn parse(
        text: &str,
        names: &BTreeMap<String, String>,
        values: &BTreeMap<String, Value>,
    ) -> Result<Self, TableError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens,
            at: 0,
            names,
            values,
        };
        let condition = parser.condition()?;
        parser.finish()?;
        Ok(condition)
    }

    /// Evaluate against an item; `None` is a missing item
    pub fn eval(&self, item: Option<&Item>) -> bool {
        match self {
            Condition::And(a, b) => a.eval(item) && b.eval(item),
            Condition::Or(a, b) => a.eval(item) || b.eval(item),
            Condition::Not(c) => !c.eval(item),
            Condition::Compare { op, left, right } => {
                match (left.resolve(item), right.resolve(item)) {
                    (left, Some(right)) => op.apply(left, right),
                    (Some(_), None) => *op == DyadicOp::Ne,
                    (None, None) => false,
                }
            }
            Condition::Exists(attr) => item.map_or(false, |item| item.contains_key(attr)),
            Condition::NotExists(attr) => item.map_or(true, |item| !item.contains_key(attr)),
            Condition::BeginsWith(attr, prefix) => {
                let value = item.and_then(|item| item.get(attr)).and_then(Value::as_str);
                let prefix = prefix.resolve(item).and_then(Value::as_str);
                matches!((value, prefix), (Some(v), Some(p)) if v.starts_with(p))
            }
        }
    }

    /// Literal an attribute is required to equal at the top level
    pub fn equality_on(&self, attr: &str) -> Option<&Value> {
        match self {
            Condition::And(a, b) => a.equality_on(attr).or_else(|| b.equality_on(attr)),
            Condition::Compare {
                op: DyadicOp::Eq,
                left: Operand::Path(path),
                right: Operand::Literal(value),
            } if path == attr => Some(value),
            _ => None,
        }
    }
}

/// One action of an update expression
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// `SET path = operand`
    Set(String, Operand),
    /// `REMOVE path`
    Remove(String),
}

/// Parsed update expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    actions: Vec<UpdateAction>,
}

impl Update {
    /// Parse update text, resolving placeholders
    pub fn parse(
        text: &str,
        names: &BTreeMap<String, String>,
        values: &BTreeMap<String, Value>,
    ) -> Result<Self, TableError> {
        let mut parser = Parser {
            tokens: tokenize(text)?,
            at: 0,
            names,
            values,
        };
        let mut actions = Vec::new();

        while !parser.done() {
            let clause = parser.ident()?;
            if clause.eq_ignore_ascii_case("SET") {
                loop {
                    let path = parser.path()?;
                    parser.expect(&Token::Cmp(DyadicOp::Eq))?;
                    actions.push(UpdateAction::Set(path, parser.operand()?));
                    if !parser.eat(&Token::Comma) {
                        break;
                    }
                }
            } else if clause.eq_ignore_ascii_case("REMOVE") {
                loop {
                    actions.push(UpdateAction::Remove(parser.path()?));
                    if !parser.eat(&Token::Comma) {
                        break;
                    }
                }
            } else {
                return Err(TableError::Validation(format!(
                    "unsupported update clause '{}'",
                    clause
                )));
            }
        }
        Ok(Self { actions })
    }

    /// Actions in order
    pub fn actions(&self) -> &[UpdateAction] {
        &self.actions
    }

    /// Attributes the update writes or removes
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|action| match action {
            UpdateAction::Set(path, _) | UpdateAction::Remove(path) => path.as_str(),
        })
    }

    /// Apply every action to `item`
    pub fn apply(&self, item: &mut Item) {
        for action in &self.actions {
            match action {
                UpdateAction::Set(path, operand) => {
                    if let Some(value) = operand.resolve(Some(&*item)).cloned() {
                        item.insert(path.clone(), value);
                    }
                }
                UpdateAction::Remove(path) => {
                    item.remove(path);
                }
            }
        }
    }
}

/// Parse a projection: a comma separated list of paths
pub fn parse_projection(
    text: &str,
    names: &BTreeMap<String, String>,
) -> Result<Vec<String>, TableError> {
    let no_values = BTreeMap::new();
    let mut parser = Parser {
        tokens: tokenize(text)?,
        at: 0,
        names,
        values: &no_values,
    };
    let mut paths = vec![parser.path()?];
    while parser.eat(&Token::Comma) {
        paths.push(parser.path()?);
    }
    parser.finish()?;
    Ok(paths)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    at: usize,
    names: &'a BTreeMap<String, String>,
    values: &'a BTreeMap<String, Value>,
}

impl<'a> Parser<'a> {
    fn done(&self) -> bool {
        self.at >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.at)
    }

    fn next(&mut self) -> Result<Token, TableError> {
        let token = self
            .tokens
            .get(self.at)
            .cloned()
            .ok_or_else(|| TableError::Validation("unexpected end of expression".into()))?;
        self.at += 1;
        Ok(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.at += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword) => {
                self.at += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), TableError> {
        let found = self.next()?;
        if &found == token {
            Ok(())
        } else {
            Err(TableError::Validation(format!(
                "expected {:?}, found {:?}",
                token, found
            )))
        }
    }

    fn finish(&self) -> Result<(), TableError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(TableError::Validation(format!(
                "unexpected trailing token {:?}",
                token
            ))),
        }
    }

    fn ident(&mut self) -> Result<String, TableError> {
        match self.next()? {
            Token::Ident(word) => Ok(word),
            other => Err(TableError::Validation(format!(
                "expected keyword, found {:?}",
                other
            ))),
        }
    }

    fn name(&self, alias: &str) -> Result<String, TableError> {
        self.names.get(alias).cloned().ok_or_else(|| {
            TableError::Validation(format!("name placeholder {} is not defined", alias))
        })
    }

    fn literal(&self, alias: &str) -> Result<Value, TableError> {
        self.values.get(alias).cloned().ok_or_else(|| {
            TableError::Validation(format!("value placeholder {} is not defined", alias))
        })
    }

    fn path(&mut self) -> Result<String, TableError> {
        match self.next()? {
            Token::Name(alias) => self.name(&alias),
            Token::Ident(attr) => Ok(attr),
            other => Err(TableError::Validation(format!(
                "expected attribute, found {:?}",
                other
            ))),
        }
    }

    fn operand(&mut self) -> Result<Operand, TableError> {
        match self.next()? {
            Token::Name(alias) => Ok(Operand::Path(self.name(&alias)?)),
            Token::Literal(alias) => Ok(Operand::Literal(self.literal(&alias)?)),
            Token::Ident(attr) => Ok(Operand::Path(attr)),
            other => Err(TableError::Validation(format!(
                "expected operand, found {:?}",
                other
            ))),
        }
    }

    fn condition(&mut self) -> Result<Condition, TableError> {
        let mut left = self.disjunct()?;
        while self.eat_keyword("OR") {
            left = Condition::Or(Box::new(left), Box::new(self.disjunct()?));
        }
        Ok(left)
    }

    fn disjunct(&mut self) -> Result<Condition, TableError> {
        let mut left = self.negation()?;
        while self.eat_keyword("AND") {
            left = Condition::And(Box::new(left), Box::new(self.negation()?));
        }
        Ok(left)
    }

    fn negation(&mut self) -> Result<Condition, TableError> {
        if self.eat_keyword("NOT") {
            return Ok(Condition::Not(Box::new(self.negation()?)));
        }
        if self.eat(&Token::LParen) {
            let inner = self.condition()?;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }

        if let Some(Token::Ident(word)) = self.peek() {
            let function = word.to_ascii_lowercase();
            if self.tokens.get(self.at + 1) == Some(&Token::LParen) {
                self.at += 2;
                let condition = match function.as_str() {
                    "attribute_exists" => Condition::Exists(self.path()?),
                    "attribute_not_exists" => Condition::NotExists(self.path()?),
                    "begins_with" => {
                        let path = self.path()?;
                        self.expect(&Token::Comma)?;
                        Condition::BeginsWith(path, self.operand()?)
                    }
                    other => {
                        return Err(TableError::Validation(format!(
                            "unsupported function '{}'",
                            other
                        )))
                    }
                };
                self.expect(&Token::RParen)?;
                return Ok(condition);
            }
        }

        let left = self.operand()?;
        let op = match self.next()? {
            Token::Cmp(op) => op,
            other => {
                return Err(TableError::Validation(format!(
                    "expected comparator, found {:?}",
                    other
                )))
            }
        };
        let right = self.operand()?;
        Ok(Condition::Compare { op, left, right })
    }
}
