//! LDAP-style predicates (RFC 1960 syntax).
//!
//! Used both for directory subscriptions (`(&(service.pid=P1)(objectClass=Producer))`)
//! and for wire filters over the `wirevalue.*` attributes
//! (`(wirevalue.delta.absolute>=0.5)`).

use crate::error::WireError;
use crate::properties::{PropertyMap, PropertyValue};
use crate::value::WireValue;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Escape the characters that are special inside a predicate value.
///
/// PIDs and scope names are embedded verbatim into generated predicates, so
/// `*`, `(` and `)` each get a leading backslash.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A compiled boolean expression over named attributes.
pub trait Predicate: Send + Sync + fmt::Debug {
    fn matches(&self, attributes: &PropertyMap) -> bool;
}

/// Compiles predicate source text.
pub trait PredicateEvaluator: Send + Sync {
    fn compile(&self, expression: &str) -> Result<Arc<dyn Predicate>, WireError>;
}

/// Default evaluator producing [`LdapFilter`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct LdapEvaluator;

impl PredicateEvaluator for LdapEvaluator {
    fn compile(&self, expression: &str) -> Result<Arc<dyn Predicate>, WireError> {
        let filter: LdapFilter = expression.parse()?;
        Ok(Arc::new(filter))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Equal,
    Approx,
    GreaterEq,
    LessEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LdapFilter {
    And(Vec<LdapFilter>),
    Or(Vec<LdapFilter>),
    Not(Box<LdapFilter>),
    Equal { attr: String, value: String },
    Approx { attr: String, value: String },
    GreaterEq { attr: String, value: String },
    LessEq { attr: String, value: String },
    Present { attr: String },
    Substring {
        attr: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
}

impl LdapFilter {
    pub fn matches(&self, attributes: &PropertyMap) -> bool {
        match self {
            LdapFilter::And(children) => children.iter().all(|c| c.matches(attributes)),
            LdapFilter::Or(children) => children.iter().any(|c| c.matches(attributes)),
            LdapFilter::Not(child) => !child.matches(attributes),
            LdapFilter::Present { attr } => lookup(attributes, attr).is_some(),
            LdapFilter::Equal { attr, value } => compare_attr(attributes, attr, CompareOp::Equal, value),
            LdapFilter::Approx { attr, value } => compare_attr(attributes, attr, CompareOp::Approx, value),
            LdapFilter::GreaterEq { attr, value } => {
                compare_attr(attributes, attr, CompareOp::GreaterEq, value)
            }
            LdapFilter::LessEq { attr, value } => compare_attr(attributes, attr, CompareOp::LessEq, value),
            LdapFilter::Substring {
                attr,
                initial,
                any,
                last,
            } => match lookup(attributes, attr) {
                Some(value) => substring_value(value, initial.as_deref(), any, last.as_deref()),
                None => false,
            },
        }
    }
}

impl Predicate for LdapFilter {
    fn matches(&self, attributes: &PropertyMap) -> bool {
        LdapFilter::matches(self, attributes)
    }
}

/// Attribute names compare case-insensitively.
fn lookup<'a>(attributes: &'a PropertyMap, attr: &str) -> Option<&'a PropertyValue> {
    attributes.get(attr).or_else(|| {
        attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(attr))
            .map(|(_, value)| value)
    })
}

fn compare_attr(attributes: &PropertyMap, attr: &str, op: CompareOp, literal: &str) -> bool {
    lookup(attributes, attr)
        .map(|value| compare_value(value, op, literal))
        .unwrap_or(false)
}

fn compare_value(value: &PropertyValue, op: CompareOp, literal: &str) -> bool {
    match value {
        PropertyValue::String(s) => compare_str(s, op, literal),
        PropertyValue::StringList(list) => list.iter().any(|s| compare_str(s, op, literal)),
        PropertyValue::Flavors(flavors) => flavors.iter().any(|f| compare_str(f.as_str(), op, literal)),
        PropertyValue::Long(n) => compare_i64(*n, op, literal),
        PropertyValue::Double(d) => compare_f64(*d, op, literal),
        PropertyValue::Bool(b) => compare_bool(*b, op, literal),
        PropertyValue::Value(v) => compare_wire_value(v, op, literal),
    }
}

fn compare_wire_value(value: &WireValue, op: CompareOp, literal: &str) -> bool {
    match value {
        WireValue::Integer(n) => compare_i64(*n, op, literal),
        WireValue::Float(f) => compare_f64(*f, op, literal),
        WireValue::Text(s) => compare_str(s, op, literal),
        WireValue::Bool(b) => compare_bool(*b, op, literal),
        WireValue::Json(serde_json::Value::String(s)) => compare_str(s, op, literal),
        WireValue::Json(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => compare_i64(i, op, literal),
            None => n.as_f64().map(|f| compare_f64(f, op, literal)).unwrap_or(false),
        },
        WireValue::Json(serde_json::Value::Bool(b)) => compare_bool(*b, op, literal),
        _ => false,
    }
}

fn ordering_satisfies(ordering: Ordering, op: CompareOp) -> bool {
    match op {
        CompareOp::Equal | CompareOp::Approx => ordering == Ordering::Equal,
        CompareOp::GreaterEq => ordering != Ordering::Less,
        CompareOp::LessEq => ordering != Ordering::Greater,
    }
}

fn compare_str(value: &str, op: CompareOp, literal: &str) -> bool {
    match op {
        CompareOp::Approx => normalize_approx(value) == normalize_approx(literal),
        _ => ordering_satisfies(value.cmp(literal), op),
    }
}

fn normalize_approx(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn compare_i64(value: i64, op: CompareOp, literal: &str) -> bool {
    literal
        .trim()
        .parse::<i64>()
        .map(|l| ordering_satisfies(value.cmp(&l), op))
        .unwrap_or(false)
}

fn compare_f64(value: f64, op: CompareOp, literal: &str) -> bool {
    literal
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|l| value.partial_cmp(&l))
        .map(|ordering| ordering_satisfies(ordering, op))
        .unwrap_or(false)
}

fn compare_bool(value: bool, op: CompareOp, literal: &str) -> bool {
    match op {
        CompareOp::Equal | CompareOp::Approx => {
            let expected = if value { "true" } else { "false" };
            literal.trim().eq_ignore_ascii_case(expected)
        }
        _ => false,
    }
}

fn substring_value(value: &PropertyValue, initial: Option<&str>, any: &[String], last: Option<&str>) -> bool {
    match value {
        PropertyValue::String(s) => substring_match(s, initial, any, last),
        PropertyValue::StringList(list) => list.iter().any(|s| substring_match(s, initial, any, last)),
        PropertyValue::Value(WireValue::Text(s)) => substring_match(s, initial, any, last),
        _ => false,
    }
}

fn substring_match(value: &str, initial: Option<&str>, any: &[String], last: Option<&str>) -> bool {
    let mut rest = value;
    if let Some(prefix) = initial {
        match rest.strip_prefix(prefix) {
            Some(tail) => rest = tail,
            None => return false,
        }
    }
    for piece in any {
        match rest.find(piece.as_str()) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }
    match last {
        Some(suffix) => rest.ends_with(suffix),
        None => true,
    }
}

impl FromStr for LdapFilter {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(s);
        let filter = parser.parse_filter()?;
        parser.skip_whitespace();
        if !parser.at_end() {
            return Err(parser.error("trailing characters after filter"));
        }
        Ok(filter)
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: &str) -> WireError {
        WireError::invalid_filter(self.source, format!("{} at offset {}", reason, self.pos))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), WireError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(self.error(&format!("expected '{}'", expected))),
            None => Err(self.error("unexpected end of filter")),
        }
    }

    fn parse_filter(&mut self) -> Result<LdapFilter, WireError> {
        self.skip_whitespace();
        self.expect('(')?;
        self.skip_whitespace();
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                LdapFilter::And(self.parse_list()?)
            }
            Some('|') => {
                self.pos += 1;
                LdapFilter::Or(self.parse_list()?)
            }
            Some('!') => {
                self.pos += 1;
                LdapFilter::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.skip_whitespace();
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_list(&mut self) -> Result<Vec<LdapFilter>, WireError> {
        let mut children = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() != Some('(') {
                break;
            }
            children.push(self.parse_filter()?);
        }
        if children.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(children)
    }

    fn parse_item(&mut self) -> Result<LdapFilter, WireError> {
        let attr = self.parse_attribute()?;
        let op = match (self.peek(), self.chars.get(self.pos + 1).copied()) {
            (Some('='), _) => {
                self.pos += 1;
                CompareOp::Equal
            }
            (Some('~'), Some('=')) => {
                self.pos += 2;
                CompareOp::Approx
            }
            (Some('>'), Some('=')) => {
                self.pos += 2;
                CompareOp::GreaterEq
            }
            (Some('<'), Some('=')) => {
                self.pos += 2;
                CompareOp::LessEq
            }
            _ => return Err(self.error("invalid operator")),
        };

        let pieces = self.parse_value()?;
        match op {
            CompareOp::Equal => Ok(Self::equality(attr, pieces)),
            _ => {
                if pieces.len() != 1 {
                    return Err(self.error("wildcard only allowed with '='"));
                }
                let value = pieces.into_iter().next().unwrap_or_default();
                Ok(match op {
                    CompareOp::Approx => LdapFilter::Approx { attr, value },
                    CompareOp::GreaterEq => LdapFilter::GreaterEq { attr, value },
                    _ => LdapFilter::LessEq { attr, value },
                })
            }
        }
    }

    fn parse_attribute(&mut self) -> Result<String, WireError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let attr: String = self.chars[start..self.pos].iter().collect();
        let attr = attr.trim();
        if attr.is_empty() {
            return Err(self.error("missing attribute name"));
        }
        Ok(attr.to_string())
    }

    /// Value text split on unescaped `*`; a value without wildcards yields one piece.
    fn parse_value(&mut self) -> Result<Vec<String>, WireError> {
        let mut pieces = vec![String::new()];
        loop {
            match self.peek() {
                None => return Err(self.error("unexpected end of filter")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped '(' in value")),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.error("dangling escape"))?;
                    self.pos += 1;
                    if let Some(current) = pieces.last_mut() {
                        current.push(escaped);
                    }
                }
                Some('*') => {
                    self.pos += 1;
                    pieces.push(String::new());
                }
                Some(c) => {
                    self.pos += 1;
                    if let Some(current) = pieces.last_mut() {
                        current.push(c);
                    }
                }
            }
        }
        Ok(pieces)
    }

    fn equality(attr: String, mut pieces: Vec<String>) -> LdapFilter {
        if pieces.len() == 1 {
            let value = pieces.pop().unwrap_or_default();
            return LdapFilter::Equal { attr, value };
        }
        if pieces.len() == 2 && pieces.iter().all(String::is_empty) {
            return LdapFilter::Present { attr };
        }
        let last = pieces.pop().filter(|s| !s.is_empty());
        let initial = Some(pieces.remove(0)).filter(|s| !s.is_empty());
        let any = pieces.into_iter().filter(|s| !s.is_empty()).collect();
        LdapFilter::Substring {
            attr,
            initial,
            any,
            last,
        }
    }
}

fn escape_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '(' | ')' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for LdapFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LdapFilter::And(children) | LdapFilter::Or(children) => {
                let op = if matches!(self, LdapFilter::And(_)) { '&' } else { '|' };
                write!(f, "({}", op)?;
                for child in children {
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            LdapFilter::Not(child) => write!(f, "(!{})", child),
            LdapFilter::Equal { attr, value } => write!(f, "({}={})", attr, escape_value(value)),
            LdapFilter::Approx { attr, value } => write!(f, "({}~={})", attr, escape_value(value)),
            LdapFilter::GreaterEq { attr, value } => write!(f, "({}>={})", attr, escape_value(value)),
            LdapFilter::LessEq { attr, value } => write!(f, "({}<={})", attr, escape_value(value)),
            LdapFilter::Present { attr } => write!(f, "({}=*)", attr),
            LdapFilter::Substring {
                attr,
                initial,
                any,
                last,
            } => {
                write!(f, "({}=", attr)?;
                if let Some(initial) = initial {
                    write!(f, "{}", escape_value(initial))?;
                }
                write!(f, "*")?;
                for piece in any {
                    write!(f, "{}*", escape_value(piece))?;
                }
                if let Some(last) = last {
                    write!(f, "{}", escape_value(last))?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Flavor;
    use proptest::prelude::*;

    fn attrs(entries: &[(&str, PropertyValue)]) -> PropertyMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn parse(s: &str) -> LdapFilter {
        s.parse().unwrap()
    }

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(escape("a*b(c)d"), "a\\*b\\(c\\)d");
        assert_eq!(escape("plain.pid"), "plain.pid");
        assert_eq!(escape(""), "");
    }

    #[test]
    fn test_equality_and_presence() {
        let props = attrs(&[
            ("service.pid", "P1".into()),
            ("objectClass", PropertyValue::from(&["Producer"][..])),
        ]);
        assert!(parse("(service.pid=P1)").matches(&props));
        assert!(!parse("(service.pid=P2)").matches(&props));
        assert!(parse("(objectClass=Producer)").matches(&props));
        assert!(parse("(service.pid=*)").matches(&props));
        assert!(!parse("(missing=*)").matches(&props));
    }

    #[test]
    fn test_attribute_names_are_case_insensitive() {
        let props = attrs(&[("Service.PID", "P1".into())]);
        assert!(parse("(service.pid=P1)").matches(&props));
    }

    #[test]
    fn test_composite_filters() {
        let props = attrs(&[
            ("service.pid", "C1".into()),
            ("objectClass", PropertyValue::from(&["Consumer"][..])),
            ("service.id", 7i64.into()),
        ]);
        let filter = parse(
            "(|(&(service.pid=C1)(objectClass=Consumer))(&(service.pid=P1)(objectClass=Producer)))",
        );
        assert!(filter.matches(&props));
        assert!(parse("(!(service.pid=P1))").matches(&props));
        assert!(parse("(|(service.pid=X)(service.id=7))").matches(&props));
        assert!(!parse("(&(service.pid=C1)(service.id=8))").matches(&props));
    }

    #[test]
    fn test_numeric_comparisons() {
        let props = attrs(&[
            ("wirevalue.elapsed", 120i64.into()),
            ("wirevalue.delta.absolute", 0.75f64.into()),
            ("wirevalue.current", WireValue::Integer(42).into()),
        ]);
        assert!(parse("(wirevalue.elapsed>=100)").matches(&props));
        assert!(!parse("(wirevalue.elapsed<=100)").matches(&props));
        assert!(parse("(wirevalue.delta.absolute>=0.5)").matches(&props));
        assert!(!parse("(wirevalue.delta.absolute>=1)").matches(&props));
        assert!(parse("(wirevalue.current=42)").matches(&props));
        assert!(parse("(wirevalue.current>= 40 )").matches(&props));
        // unparsable literal never matches
        assert!(!parse("(wirevalue.elapsed>=soon)").matches(&props));
    }

    #[test]
    fn test_substring_and_approx() {
        let props = attrs(&[("name", "Kitchen Temperature Sensor".into())]);
        assert!(parse("(name=Kitchen*)").matches(&props));
        assert!(parse("(name=*Sensor)").matches(&props));
        assert!(parse("(name=Kit*Temp*Sen*)").matches(&props));
        assert!(!parse("(name=*Humidity*)").matches(&props));
        assert!(parse("(name~=kitchentemperaturesensor)").matches(&props));
    }

    #[test]
    fn test_escaped_values_round_trip_through_parser() {
        let pid = "odd*(pid)";
        let filter = parse(&format!("(service.pid={})", escape(pid)));
        assert_eq!(
            filter,
            LdapFilter::Equal {
                attr: "service.pid".into(),
                value: pid.into()
            }
        );
        let props = attrs(&[("service.pid", pid.into())]);
        assert!(filter.matches(&props));
    }

    #[test]
    fn test_flavor_and_bool_attributes() {
        let props = attrs(&[
            ("wireadmin.consumer.flavors", vec![Flavor::Integer, Flavor::Float].into()),
            ("enabled", true.into()),
        ]);
        assert!(parse("(wireadmin.consumer.flavors=float)").matches(&props));
        assert!(parse("(enabled=TRUE)").matches(&props));
        assert!(!parse("(enabled=false)").matches(&props));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "(", "service.pid=P1", "(service.pid=P1", "(&)", "(=x)", "(a>b)", "(a=b))", "(a>=x*)"] {
            let err = bad.parse::<LdapFilter>().unwrap_err();
            assert!(matches!(err, WireError::InvalidFilter { .. }), "{:?}", bad);
        }
    }

    #[test]
    fn test_display_is_reparseable() {
        let source = "(&(service.pid=a\\*b)(|(x>=1)(!(y=*)))(name=ab*cd*))";
        let filter = parse(source);
        assert_eq!(parse(&filter.to_string()), filter);
    }

    #[test]
    fn test_evaluator_compiles_predicates() {
        let evaluator = LdapEvaluator;
        let predicate = evaluator.compile("(a=1)").unwrap();
        assert!(predicate.matches(&attrs(&[("a", 1i64.into())])));
        assert!(evaluator.compile("(a=1").is_err());
    }

    proptest! {
        #[test]
        fn prop_escaped_pid_matches_itself(pid in "[a-zA-Z0-9.*()_-]{1,24}") {
            let filter: LdapFilter = format!("(service.pid={})", escape(&pid)).parse().unwrap();
            let props = attrs(&[("service.pid", pid.clone().into())]);
            prop_assert!(filter.matches(&props));
        }

        #[test]
        fn prop_escape_leaves_no_bare_metacharacters(s in ".{0,32}") {
            let escaped = escape(&s);
            let mut previous = None;
            for c in escaped.chars() {
                if matches!(c, '*' | '(' | ')') {
                    prop_assert_eq!(previous, Some('\\'));
                }
                previous = Some(c);
            }
        }
    }
}
