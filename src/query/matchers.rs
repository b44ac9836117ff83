//! Evaluation of plain series selectors against in-memory series.
//!
//! Only the selector subset produced by the adapter itself is understood:
//! an optional metric name followed by a braced list of `=`, `!=`, `=~`
//! and `!~` matchers. Regex matchers are anchored at both ends, as in PromQL.

use super::Selector;
use crate::core::{AdapterError, Result, Series, NAME_LABEL};
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1, take_while_m_n},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, map_opt, opt, value},
    multi::separated_list0,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};
use regex::Regex;

/// Label matcher operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `=~`
    RegexMatch,
    /// `!~`
    RegexNoMatch,
}

/// One `label op "value"` clause
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    /// Label name, `__name__` for the series name
    pub label: String,
    /// Operator
    pub op: MatchOp,
    /// Unescaped right-hand side
    pub value: String,
    regex: Option<Regex>,
}

impl LabelMatcher {
    fn new(label: String, op: MatchOp, value: String) -> Result<Self> {
        let regex = match op {
            MatchOp::RegexMatch | MatchOp::RegexNoMatch => {
                let pattern = format!("^(?:{})$", value);
                let regex = Regex::new(&pattern)
                    .map_err(|source| AdapterError::InvalidRegex { pattern, source })?;
                Some(regex)
            },
            MatchOp::Equal | MatchOp::NotEqual => None,
        };
        Ok(LabelMatcher {
            label,
            op,
            value,
            regex,
        })
    }

    /// Missing labels compare as the empty string
    pub fn matches(&self, series: &Series) -> bool {
        let actual = if self.label == NAME_LABEL {
            series.name.as_str()
        } else {
            series.labels.get(&self.label).map_or("", String::as_str)
        };

        match (self.op, &self.regex) {
            (MatchOp::Equal, _) => actual == self.value,
            (MatchOp::NotEqual, _) => actual != self.value,
            (MatchOp::RegexMatch, Some(re)) => re.is_match(actual),
            (MatchOp::RegexNoMatch, Some(re)) => !re.is_match(actual),
            (_, None) => false,
        }
    }
}

/// A parsed selector: every matcher must hold
#[derive(Debug, Clone, Default)]
pub struct SeriesMatcher {
    matchers: Vec<LabelMatcher>,
}

impl SeriesMatcher {
    /// Parses a selector such as `up{job="api",pod!=""}`
    pub fn parse(selector: &Selector) -> Result<Self> {
        let (_, (name, raw)) = all_consuming(selector_expr)(selector.as_str()).map_err(|e| {
            AdapterError::filter(format!("unable to parse selector {:?}: {}", selector.as_str(), e))
        })?;

        let mut matchers = Vec::with_capacity(raw.len() + 1);
        if let Some(name) = name {
            matchers.push(LabelMatcher::new(
                NAME_LABEL.to_string(),
                MatchOp::Equal,
                name.to_string(),
            )?);
        }
        for (label, op, value) in raw {
            matchers.push(LabelMatcher::new(label.to_string(), op, value)?);
        }

        Ok(SeriesMatcher { matchers })
    }

    /// The individual clauses
    pub fn matchers(&self) -> &[LabelMatcher] {
        &self.matchers
    }

    /// Returns true if `series` satisfies every clause
    pub fn matches(&self, series: &Series) -> bool {
        self.matchers.iter().all(|m| m.matches(series))
    }
}

type RawMatcher<'a> = (&'a str, MatchOp, String);

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == ':')(input)
}

fn operator(input: &str) -> IResult<&str, MatchOp> {
    alt((
        value(MatchOp::RegexMatch, tag("=~")),
        value(MatchOp::RegexNoMatch, tag("!~")),
        value(MatchOp::NotEqual, tag("!=")),
        value(MatchOp::Equal, tag("=")),
    ))(input)
}

fn unicode_escape(input: &str) -> IResult<&str, char> {
    map_opt(
        preceded(
            char('u'),
            take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
        ),
        |hex: &str| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32),
    )(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    let escaped = nom::bytes::complete::escaped_transform(
        is_not("\\\""),
        '\\',
        alt((
            value('\\', char('\\')),
            value('"', char('"')),
            value('\n', char('n')),
            value('\r', char('r')),
            value('\t', char('t')),
            unicode_escape,
        )),
    );
    delimited(char('"'), map(opt(escaped), Option::unwrap_or_default), char('"'))(input)
}

fn label_matcher(input: &str) -> IResult<&str, RawMatcher<'_>> {
    tuple((ws(identifier), ws(operator), ws(string_literal)))(input)
}

fn selector_expr(input: &str) -> IResult<&str, (Option<&str>, Vec<RawMatcher<'_>>)> {
    let braces = delimited(
        ws(char('{')),
        terminated(
            separated_list0(ws(char(',')), label_matcher),
            opt(ws(char(','))),
        ),
        ws(char('}')),
    );
    alt((
        tuple((opt(ws(identifier)), braces)),
        map(ws(identifier), |name| (Some(name), Vec::new())),
    ))(input)
}
