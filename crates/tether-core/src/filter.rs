//! LDAP-style requirement filters.
//!
//! Grammar (RFC 1960 subset):
//!
//! ```text
//! filter     = "(" filtercomp ")"
//! filtercomp = "&" filter+ | "|" filter+ | "!" filter | item
//! item       = attr ("=" | "~=" | ">=" | "<=") value
//! ```
//!
//! A value consisting of a single `*` tests for presence; other unescaped
//! `*` characters in an `=` value act as substring wildcards. `\` escapes
//! the next character. Comparison is typed by the attribute value.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::attribute::{Attributes, Value};
use crate::error::ModelError;
use crate::version::Version;

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equal { attr: String, value: String },
    Approx { attr: String, value: String },
    GreaterEq { attr: String, value: String },
    LessEq { attr: String, value: String },
    /// `attr=a*b*c`; an empty first/last part means a leading/trailing wildcard.
    Substring { attr: String, parts: Vec<String> },
    Present { attr: String },
}

impl Filter {
    /// Parse a filter string.
    pub fn parse(filter: &str) -> Result<Self, ModelError> {
        let mut parser = Parser {
            src: filter,
            chars: filter.chars().collect(),
            pos: 0,
        };
        parser.skip_ws();
        let parsed = parser.filter()?;
        parser.skip_ws();
        if parser.pos != parser.chars.len() {
            return Err(parser.error("trailing characters after filter"));
        }
        Ok(parsed)
    }

    /// Evaluate against a set of capability attributes.
    pub fn matches(&self, attrs: &Attributes) -> bool {
        match self {
            Filter::And(items) => items.iter().all(|f| f.matches(attrs)),
            Filter::Or(items) => items.iter().any(|f| f.matches(attrs)),
            Filter::Not(inner) => !inner.matches(attrs),
            Filter::Present { attr } => lookup(attrs, attr).is_some(),
            Filter::Equal { attr, value } => {
                compare_attr(attrs, attr, |v| compare(v, Op::Equal, value))
            }
            Filter::Approx { attr, value } => {
                compare_attr(attrs, attr, |v| compare(v, Op::Approx, value))
            }
            Filter::GreaterEq { attr, value } => {
                compare_attr(attrs, attr, |v| compare(v, Op::GreaterEq, value))
            }
            Filter::LessEq { attr, value } => {
                compare_attr(attrs, attr, |v| compare(v, Op::LessEq, value))
            }
            Filter::Substring { attr, parts } => {
                compare_attr(attrs, attr, |v| match_substring(v, parts))
            }
        }
    }

    /// All attribute names mentioned anywhere in the filter.
    pub fn attributes(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_attributes(&mut out);
        out
    }

    fn collect_attributes(&self, out: &mut BTreeSet<String>) {
        match self {
            Filter::And(items) | Filter::Or(items) => {
                for item in items {
                    item.collect_attributes(out);
                }
            }
            Filter::Not(inner) => inner.collect_attributes(out),
            Filter::Equal { attr, .. }
            | Filter::Approx { attr, .. }
            | Filter::GreaterEq { attr, .. }
            | Filter::LessEq { attr, .. }
            | Filter::Substring { attr, .. }
            | Filter::Present { attr } => {
                out.insert(attr.clone());
            }
        }
    }
}

impl FromStr for Filter {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(items) => {
                f.write_str("(&")?;
                for item in items {
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Filter::Or(items) => {
                f.write_str("(|")?;
                for item in items {
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Filter::Not(inner) => write!(f, "(!{inner})"),
            Filter::Equal { attr, value } => write!(f, "({attr}={})", escape(value)),
            Filter::Approx { attr, value } => write!(f, "({attr}~={})", escape(value)),
            Filter::GreaterEq { attr, value } => write!(f, "({attr}>={})", escape(value)),
            Filter::LessEq { attr, value } => write!(f, "({attr}<={})", escape(value)),
            Filter::Present { attr } => write!(f, "({attr}=*)"),
            Filter::Substring { attr, parts } => {
                let rendered: Vec<String> = parts.iter().map(|p| escape(p)).collect();
                write!(f, "({attr}={})", rendered.join("*"))
            }
        }
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '(' | ')' | '*' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

struct Parser<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> ModelError {
        ModelError::InvalidFilter {
            filter: self.src.to_string(),
            offset: self.pos,
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), ModelError> {
        if self.peek() == Some(ch) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected `{ch}`")))
        }
    }

    fn filter(&mut self) -> Result<Filter, ModelError> {
        self.expect('(')?;
        self.skip_ws();
        let parsed = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.filter_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.filter_list()?)
            }
            Some('!') => {
                self.pos += 1;
                self.skip_ws();
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.skip_ws();
        self.expect(')')?;
        Ok(parsed)
    }

    fn filter_list(&mut self) -> Result<Vec<Filter>, ModelError> {
        let mut items = Vec::new();
        self.skip_ws();
        while self.peek() == Some('(') {
            items.push(self.filter()?);
            self.skip_ws();
        }
        if items.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(items)
    }

    fn item(&mut self) -> Result<Filter, ModelError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if matches!(ch, '=' | '<' | '>' | '~' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let attr: String = self.chars[start..self.pos].iter().collect();
        let attr = attr.trim().to_string();
        if attr.is_empty() {
            return Err(self.error("missing attribute name"));
        }

        let op = match self.peek() {
            Some('=') => {
                self.pos += 1;
                Op::Equal
            }
            Some(c @ ('~' | '>' | '<')) => {
                self.pos += 1;
                self.expect('=')?;
                match c {
                    '~' => Op::Approx,
                    '>' => Op::GreaterEq,
                    _ => Op::LessEq,
                }
            }
            _ => return Err(self.error("expected comparison operator")),
        };

        // Each part is a run of literal characters between unescaped `*`.
        let mut parts = vec![String::new()];
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated value")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped `(` in value")),
                Some('\\') => {
                    self.pos += 1;
                    let Some(escaped) = self.peek() else {
                        return Err(self.error("dangling escape"));
                    };
                    if let Some(last) = parts.last_mut() {
                        last.push(escaped);
                    }
                    self.pos += 1;
                }
                Some('*') if op == Op::Equal => {
                    parts.push(String::new());
                    self.pos += 1;
                }
                Some(ch) => {
                    if let Some(last) = parts.last_mut() {
                        last.push(ch);
                    }
                    self.pos += 1;
                }
            }
        }

        Ok(match op {
            Op::Equal if parts.len() == 2 && parts.iter().all(String::is_empty) => {
                Filter::Present { attr }
            }
            Op::Equal if parts.len() > 1 => Filter::Substring { attr, parts },
            Op::Equal => Filter::Equal {
                attr,
                value: parts.concat(),
            },
            Op::Approx => Filter::Approx {
                attr,
                value: parts.concat(),
            },
            Op::GreaterEq => Filter::GreaterEq {
                attr,
                value: parts.concat(),
            },
            Op::LessEq => Filter::LessEq {
                attr,
                value: parts.concat(),
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Approx,
    GreaterEq,
    LessEq,
}

fn lookup<'a>(attrs: &'a Attributes, attr: &str) -> Option<&'a Value> {
    attrs.get(attr).or_else(|| {
        attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(attr))
            .map(|(_, v)| v)
    })
}

fn compare_attr(attrs: &Attributes, attr: &str, test: impl Fn(&Value) -> bool) -> bool {
    match lookup(attrs, attr) {
        Some(Value::List(items)) => items.iter().any(&test),
        Some(value) => test(value),
        None => false,
    }
}

fn compare(value: &Value, op: Op, literal: &str) -> bool {
    let ordering = match value {
        Value::String(s) => {
            if op == Op::Approx {
                return normalize(s) == normalize(literal);
            }
            Some(s.as_str().cmp(literal))
        }
        Value::Long(n) => literal.trim().parse::<i64>().ok().map(|l| n.cmp(&l)),
        Value::Double(d) => literal
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|l| d.partial_cmp(&l)),
        Value::Version(v) => Version::parse(literal).ok().map(|l| v.cmp(&l)),
        Value::List(items) => return items.iter().any(|item| compare(item, op, literal)),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        Op::Equal | Op::Approx => ordering == Ordering::Equal,
        Op::GreaterEq => ordering != Ordering::Less,
        Op::LessEq => ordering != Ordering::Greater,
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn match_substring(value: &Value, parts: &[String]) -> bool {
    let text = value.to_string();
    let mut rest = text.as_str();
    let last = parts.len() - 1;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            match rest.strip_prefix(part.as_str()) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == last {
            return part.is_empty() || rest.ends_with(part.as_str());
        } else if !part.is_empty() {
            match rest.find(part.as_str()) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }
    }
    true
}
