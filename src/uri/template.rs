//! URI template blueprint (RFC 6570 expressions over string values).
//!
//! # Responsibilities
//! - Parse a raw template once, at configuration time
//! - Expand the parsed form against a set of string bindings
//!
//! # Design Decisions
//! - The parsed template is immutable; expansion writes into a fresh `String`
//! - Undefined variables are skipped, as RFC 6570 requires
//! - Syntax errors surface at parse time only; expansion itself cannot fail

use std::collections::HashMap;
use std::fmt::Write as _;

use thiserror::Error;

/// Variable bindings used for one expansion.
pub type Bindings = HashMap<String, String>;

/// Errors raised while parsing a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed expression starting at offset {0}")]
    UnclosedExpression(usize),

    #[error("unexpected '}}' at offset {0}")]
    UnmatchedClose(usize),

    #[error("empty expression at offset {0}")]
    EmptyExpression(usize),

    #[error("operator '{0}' is reserved for future extensions")]
    ReservedOperator(char),

    #[error("invalid variable name '{0}'")]
    InvalidVariable(String),

    #[error("invalid prefix modifier in '{0}'")]
    InvalidPrefix(String),
}

/// Expression operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Simple,
    Reserved,
    Fragment,
    Label,
    PathSegment,
    PathParameter,
    Query,
    QueryContinuation,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Reserved),
            '#' => Some(Self::Fragment),
            '.' => Some(Self::Label),
            '/' => Some(Self::PathSegment),
            ';' => Some(Self::PathParameter),
            '?' => Some(Self::Query),
            '&' => Some(Self::QueryContinuation),
            _ => None,
        }
    }

    fn first(self) -> &'static str {
        match self {
            Self::Simple | Self::Reserved => "",
            Self::Fragment => "#",
            Self::Label => ".",
            Self::PathSegment => "/",
            Self::PathParameter => ";",
            Self::Query => "?",
            Self::QueryContinuation => "&",
        }
    }

    fn separator(self) -> &'static str {
        match self {
            Self::Simple | Self::Reserved | Self::Fragment => ",",
            Self::Label => ".",
            Self::PathSegment => "/",
            Self::PathParameter => ";",
            Self::Query | Self::QueryContinuation => "&",
        }
    }

    fn named(self) -> bool {
        matches!(self, Self::PathParameter | Self::Query | Self::QueryContinuation)
    }

    fn if_empty(self) -> &'static str {
        match self {
            Self::Query | Self::QueryContinuation => "=",
            _ => "",
        }
    }

    fn allows_reserved(self) -> bool {
        matches!(self, Self::Reserved | Self::Fragment)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct VarSpec {
    name: String,
    prefix: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Expression {
    operator: Operator,
    vars: Vec<VarSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Expression(Expression),
}

/// An immutable, parsed URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    legacy: bool,
    parts: Vec<Part>,
}

impl UriTemplate {
    /// Parse a raw template. `legacy` selects the legacy resolution mode.
    pub fn parse(raw: &str, legacy: bool) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' => {
                    let mut body = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        body.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::UnclosedExpression(offset));
                    }
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(Part::Expression(parse_expression(&body, offset)?));
                }
                '}' => return Err(TemplateError::UnmatchedClose(offset)),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            legacy,
            parts,
        })
    }

    /// The template exactly as configured.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether values are percent-decoded before substitution.
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Names of every variable referenced by the template, in order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().flat_map(|part| match part {
            Part::Expression(expr) => expr.vars.iter().map(|v| v.name.as_str()).collect(),
            Part::Literal(_) => Vec::new(),
        })
    }

    /// True when the template opens with an expression that has no operator,
    /// e.g. `{uri.var.base}` or `{uri.var.base}/items`.
    pub fn leads_with_simple_expression(&self) -> bool {
        matches!(
            self.parts.first(),
            Some(Part::Expression(Expression { operator: Operator::Simple, .. }))
        )
    }

    /// Expand against `bindings`.
    ///
    /// With `reserved_lead`, a leading simple expression is expanded with the
    /// reserved operator so a bound absolute address keeps its delimiters.
    pub fn expand(&self, bindings: &Bindings, reserved_lead: bool) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for (index, part) in self.parts.iter().enumerate() {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Expression(expr) => {
                    let operator = if index == 0 && reserved_lead && expr.operator == Operator::Simple {
                        Operator::Reserved
                    } else {
                        expr.operator
                    };
                    expand_expression(expr, operator, bindings, &mut out);
                }
            }
        }
        out
    }
}

fn parse_expression(body: &str, offset: usize) -> Result<Expression, TemplateError> {
    let mut chars = body.chars();
    let operator = match chars.clone().next() {
        None => return Err(TemplateError::EmptyExpression(offset)),
        Some(c @ ('=' | ',' | '!' | '@' | '|')) => return Err(TemplateError::ReservedOperator(c)),
        Some(c) => match Operator::from_char(c) {
            Some(op) => {
                chars.next();
                op
            }
            None => Operator::Simple,
        },
    };

    let list = chars.as_str();
    if list.is_empty() {
        return Err(TemplateError::EmptyExpression(offset));
    }

    let vars = list
        .split(',')
        .map(parse_varspec)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Expression { operator, vars })
}

fn parse_varspec(spec: &str) -> Result<VarSpec, TemplateError> {
    // Values are plain strings, so the explode modifier changes nothing.
    let spec = spec.strip_suffix('*').unwrap_or(spec);

    let (name, prefix) = match spec.split_once(':') {
        Some((name, len)) => {
            let parsed = len
                .parse::<usize>()
                .ok()
                .filter(|n| (1..10_000).contains(n) && !len.starts_with('0'))
                .ok_or_else(|| TemplateError::InvalidPrefix(spec.to_string()))?;
            (name, Some(parsed))
        }
        None => (spec, None),
    };

    if !is_valid_varname(name) {
        return Err(TemplateError::InvalidVariable(name.to_string()));
    }

    Ok(VarSpec {
        name: name.to_string(),
        prefix,
    })
}

fn is_valid_varname(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.ends_with('.') || name.contains("..") {
        return false;
    }
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if is_pct_triplet(bytes, i) => i += 3,
            b if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' => i += 1,
            _ => return false,
        }
    }
    true
}

fn expand_expression(expr: &Expression, operator: Operator, bindings: &Bindings, out: &mut String) {
    let mut first = true;
    for var in &expr.vars {
        let Some(value) = bindings.get(&var.name) else {
            continue;
        };

        out.push_str(if first { operator.first() } else { operator.separator() });
        first = false;

        let value: String = match var.prefix {
            Some(len) => value.chars().take(len).collect(),
            None => value.clone(),
        };

        if operator.named() {
            out.push_str(&var.name);
            if value.is_empty() {
                out.push_str(operator.if_empty());
                continue;
            }
            out.push('=');
        }
        encode_into(&value, operator.allows_reserved(), out);
    }
}

const RESERVED: &[u8] = b":/?#[]@!$&'()*+,;=";

fn encode_into(value: &str, allow_reserved: bool, out: &mut String) {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let keep = b.is_ascii_alphanumeric()
            || matches!(b, b'-' | b'.' | b'_' | b'~')
            || (allow_reserved && RESERVED.contains(&b));

        if keep {
            out.push(b as char);
        } else if allow_reserved && b == b'%' && is_pct_triplet(bytes, i) {
            // Existing escapes pass through reserved expansion untouched.
            out.push_str(&value[i..i + 3]);
            i += 3;
            continue;
        } else {
            let _ = write!(out, "%{:02X}", b);
        }
        i += 1;
    }
}

pub(crate) fn is_pct_triplet(bytes: &[u8], at: usize) -> bool {
    bytes.get(at) == Some(&b'%')
        && bytes.get(at + 1).is_some_and(u8::is_ascii_hexdigit)
        && bytes.get(at + 2).is_some_and(u8::is_ascii_hexdigit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn expand(template: &str, vars: &Bindings) -> String {
        UriTemplate::parse(template, false).unwrap().expand(vars, false)
    }

    #[test]
    fn test_rfc_operators() {
        let vars = bindings(&[
            ("var", "value"),
            ("hello", "Hello World!"),
            ("path", "/foo/bar"),
            ("x", "1024"),
            ("y", "768"),
            ("empty", ""),
        ]);

        assert_eq!(expand("{var}", &vars), "value");
        assert_eq!(expand("{hello}", &vars), "Hello%20World%21");
        assert_eq!(expand("{+hello}", &vars), "Hello%20World!");
        assert_eq!(expand("{+path}/here", &vars), "/foo/bar/here");
        assert_eq!(expand("X{#path}", &vars), "X#/foo/bar");
        assert_eq!(expand("X{.var}", &vars), "X.value");
        assert_eq!(expand("{/var,x}/here", &vars), "/value/1024/here");
        assert_eq!(expand("{;x,y,empty}", &vars), ";x=1024;y=768;empty");
        assert_eq!(expand("{?x,y,empty}", &vars), "?x=1024&y=768&empty=");
        assert_eq!(expand("?fixed=yes{&x}", &vars), "?fixed=yes&x=1024");
        assert_eq!(expand("{var:3}", &vars), "val");
        assert_eq!(expand("{x,hello,y}", &vars), "1024,Hello%20World%21,768");
    }

    #[test]
    fn test_undefined_variables_are_skipped() {
        let vars = bindings(&[("x", "1")]);
        assert_eq!(expand("http://h/a{?undef}", &vars), "http://h/a");
        assert_eq!(expand("http://h/a{?undef,x}", &vars), "http://h/a?x=1");
        assert_eq!(expand("http://h/{missing}/b", &vars), "http://h//b");
    }

    #[test]
    fn test_reserved_expansion_keeps_existing_escapes() {
        let vars = bindings(&[("v", "a%20b%zz")]);
        assert_eq!(expand("{+v}", &vars), "a%20b%25zz");
        assert_eq!(expand("{v}", &vars), "a%2520b%25zz");
    }

    #[test]
    fn test_reserved_lead_only_rewrites_first_simple_expression() {
        let template = UriTemplate::parse("{base}/items/{id}", false).unwrap();
        let vars = bindings(&[("base", "http://h:8080/api"), ("id", "a/b")]);

        assert!(template.leads_with_simple_expression());
        assert_eq!(template.expand(&vars, true), "http://h:8080/api/items/a%2Fb");
        assert_eq!(template.expand(&vars, false), "http%3A%2F%2Fh%3A8080%2Fapi/items/a%2Fb");
    }

    #[test]
    fn test_variable_names() {
        let template = UriTemplate::parse("http://h/{uri.var.a}{?query.param.q,uri.var.b:2}", true).unwrap();
        let names: Vec<_> = template.variable_names().collect();
        assert_eq!(names, vec!["uri.var.a", "query.param.q", "uri.var.b"]);
        assert!(template.is_legacy());
        assert!(!template.leads_with_simple_expression());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(UriTemplate::parse("http://h/{var", false), Err(TemplateError::UnclosedExpression(9)));
        assert_eq!(UriTemplate::parse("http://h/var}", false), Err(TemplateError::UnmatchedClose(12)));
        assert_eq!(UriTemplate::parse("{}", false), Err(TemplateError::EmptyExpression(0)));
        assert_eq!(UriTemplate::parse("{?}", false), Err(TemplateError::EmptyExpression(0)));
        assert_eq!(UriTemplate::parse("{=x}", false), Err(TemplateError::ReservedOperator('=')));
        assert!(matches!(UriTemplate::parse("{a..b}", false), Err(TemplateError::InvalidVariable(_))));
        assert!(matches!(UriTemplate::parse("{a b}", false), Err(TemplateError::InvalidVariable(_))));
        assert!(matches!(UriTemplate::parse("{var:0}", false), Err(TemplateError::InvalidPrefix(_))));
        assert!(matches!(UriTemplate::parse("{var:x}", false), Err(TemplateError::InvalidPrefix(_))));
    }

    #[test]
    fn test_expansion_does_not_touch_blueprint() {
        let template = UriTemplate::parse("http://h/{p}", false).unwrap();
        let before = template.clone();
        let vars = bindings(&[("p", "one")]);

        let first = template.expand(&vars, false);
        let second = template.expand(&vars, false);

        assert_eq!(first, second);
        assert_eq!(template, before);
        assert_eq!(template.raw(), "http://h/{p}");
    }
}
