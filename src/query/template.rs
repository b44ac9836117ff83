//! Text templates for label names and metrics queries.
//!
//! Templates are plain text with `<<.Field>>` actions. The `<<`/`>>`
//! delimiters keep them from colliding with PromQL's own braces. Only a
//! fixed set of fields exists, and each kind of template accepts a subset
//! of them; anything else is rejected when the template is parsed.

use crate::core::{AdapterError, GroupResource, Result};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alphanumeric1, anychar, char, multispace0},
    combinator::{map, not, recognize},
    multi::{many0, many1},
    sequence::{delimited, preceded},
    IResult,
};
use std::borrow::Cow;
use std::fmt;

/// A value that can be referenced from a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Series name
    Series,
    /// Rendered, comma-joined label matchers
    LabelMatchers,
    /// Comma-joined group-by labels
    GroupBy,
    /// Group-by labels; rendered like `GroupBy`
    GroupBySlice,
    /// Sanitized API group of a resource
    Group,
    /// Singular resource name
    Resource,
}

/// Fields accepted by metrics query templates
pub const QUERY_FIELDS: &[Field] = &[
    Field::Series,
    Field::LabelMatchers,
    Field::GroupBy,
    Field::GroupBySlice,
];

/// Fields accepted by label name templates
pub const LABEL_FIELDS: &[Field] = &[Field::Group, Field::Resource];

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Series" => Some(Field::Series),
            "LabelMatchers" => Some(Field::LabelMatchers),
            "GroupBy" => Some(Field::GroupBy),
            "GroupBySlice" => Some(Field::GroupBySlice),
            "Group" => Some(Field::Group),
            "Resource" => Some(Field::Resource),
            _ => None,
        }
    }

    /// Name used inside template actions
    pub fn name(&self) -> &'static str {
        match self {
            Field::Series => "Series",
            Field::LabelMatchers => "LabelMatchers",
            Field::GroupBy => "GroupBy",
            Field::GroupBySlice => "GroupBySlice",
            Field::Group => "Group",
            Field::Resource => "Resource",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<<.{}>>", self.name())
    }
}

/// Supplies field values when rendering a template
pub trait TemplateArgs {
    /// Value of `field`, or `None` if these arguments don't provide it
    fn field(&self, field: Field) -> Option<Cow<'_, str>>;
}

/// Label templates are rendered from a (sanitized group, singular resource) pair
impl TemplateArgs for GroupResource {
    fn field(&self, field: Field) -> Option<Cow<'_, str>> {
        match field {
            Field::Group => Some(Cow::Borrowed(&self.group)),
            Field::Resource => Some(Cow::Borrowed(&self.resource)),
            _ => None,
        }
    }
}

/// Arguments for metrics query templates
#[derive(Debug, Clone, Default)]
pub struct QueryTemplateArgs {
    /// Series name
    pub series: String,
    /// Comma-joined label matchers
    pub label_matchers: String,
    /// Labels to aggregate by
    pub group_by: Vec<String>,
}

impl TemplateArgs for QueryTemplateArgs {
    fn field(&self, field: Field) -> Option<Cow<'_, str>> {
        match field {
            Field::Series => Some(Cow::Borrowed(&self.series)),
            Field::LabelMatchers => Some(Cow::Borrowed(&self.label_matchers)),
            Field::GroupBy | Field::GroupBySlice => Some(Cow::Owned(self.group_by.join(","))),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Literal(String),
    Field(Field),
}

#[derive(Debug, Clone, Copy)]
enum Token<'a> {
    Literal(&'a str),
    Action(&'a str),
}

/// A parsed template
#[derive(Debug, Clone)]
pub struct Template {
    src: String,
    parts: Vec<Part>,
}

impl Template {
    /// Parses a metrics query template
    pub fn query(src: &str) -> Result<Self> {
        Self::parse(src, QUERY_FIELDS)
    }

    /// Parses a label name template
    pub fn label(src: &str) -> Result<Self> {
        Self::parse(src, LABEL_FIELDS)
    }

    /// Parses `src`, accepting only the given fields
    pub fn parse(src: &str, allowed: &[Field]) -> Result<Self> {
        let (remaining, tokens) = tokens(src)
            .map_err(|e| AdapterError::template(format!("unable to parse {:?}: {}", src, e)))?;

        if !remaining.is_empty() {
            return Err(AdapterError::template(format!(
                "malformed action at {:?} in template {:?}",
                truncate(remaining, 24),
                src
            )));
        }

        let mut parts = Vec::with_capacity(tokens.len());
        for token in tokens {
            match token {
                Token::Literal(lit) => parts.push(Part::Literal(lit.to_string())),
                Token::Action(name) => {
                    let field = Field::from_name(name).ok_or_else(|| {
                        AdapterError::template(format!(
                            "unknown field <<.{}>> in template {:?}",
                            name, src
                        ))
                    })?;
                    if !allowed.contains(&field) {
                        return Err(AdapterError::template(format!(
                            "field {} is not available in template {:?}",
                            field, src
                        )));
                    }
                    parts.push(Part::Field(field));
                },
            }
        }

        Ok(Template {
            src: src.to_string(),
            parts,
        })
    }

    /// Returns the template source
    pub fn as_str(&self) -> &str {
        &self.src
    }

    /// Returns true if the template references `field`
    pub fn references(&self, field: Field) -> bool {
        self.parts.iter().any(|p| *p == Part::Field(field))
    }

    /// Renders the template
    pub fn render(&self, args: &impl TemplateArgs) -> Result<String> {
        let mut out = String::with_capacity(self.src.len());
        for part in &self.parts {
            match part {
                Part::Literal(lit) => out.push_str(lit),
                Part::Field(field) => {
                    let value = args.field(*field).ok_or_else(|| {
                        AdapterError::template(format!(
                            "no value for {} while rendering {:?}",
                            field, self.src
                        ))
                    })?;
                    out.push_str(&value);
                },
            }
        }
        Ok(out)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Parse a sequence of literal text and actions
fn tokens(input: &str) -> IResult<&str, Vec<Token<'_>>> {
    many0(alt((map(action, Token::Action), map(literal, Token::Literal))))(input)
}

/// Parse an action such as `<< .Series >>`, yielding the field name
fn action(input: &str) -> IResult<&str, &str> {
    delimited(
        tag("<<"),
        delimited(multispace0, preceded(char('.'), alphanumeric1), multispace0),
        tag(">>"),
    )(input)
}

/// Parse literal text up to the next `<<`
fn literal(input: &str) -> IResult<&str, &str> {
    recognize(many1(preceded(not(tag("<<")), anychar)))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_query_template() {
        let tmpl =
            Template::query("sum(rate(<<.Series>>{<<.LabelMatchers>>}[1m])) by (<<.GroupBy>>)")
                .unwrap();
        let args = QueryTemplateArgs {
            series: "http_requests_total".to_string(),
            label_matchers: r#"namespace="prod",pod="web-0""#.to_string(),
            group_by: vec!["pod".to_string()],
        };
        assert_eq!(
            tmpl.render(&args).unwrap(),
            r#"sum(rate(http_requests_total{namespace="prod",pod="web-0"}[1m])) by (pod)"#
        );
    }

    #[test]
    fn test_whitespace_inside_action() {
        let tmpl = Template::label("kube_<< .Group >>_<<.Resource>>").unwrap();
        assert!(tmpl.references(Field::Group));
        assert!(tmpl.references(Field::Resource));
        let rendered = tmpl.render(&GroupResource::new("apps", "deployment")).unwrap();
        assert_eq!(rendered, "kube_apps_deployment");
    }

    #[test]
    fn test_unknown_field_rejected_at_parse() {
        let err = Template::query("sum(<<.Metric>>)").unwrap_err();
        assert!(err.to_string().contains("unknown field"));

        // no map-valued fields without range actions
        let err = Template::query("sum(<<.LabelValuesByName>>)").unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_field_not_allowed_for_template_kind() {
        assert!(Template::label("<<.Series>>").is_err());
        assert!(Template::query("<<.Resource>>").is_err());
    }

    #[test]
    fn test_unclosed_action() {
        let err = Template::query("sum(<<.Series) by (pod)").unwrap_err();
        assert!(err.to_string().contains("malformed action"));
    }

    #[test]
    fn test_literal_only_and_empty() {
        let tmpl = Template::query("vector(1)").unwrap();
        assert_eq!(tmpl.render(&QueryTemplateArgs::default()).unwrap(), "vector(1)");

        let tmpl = Template::query("").unwrap();
        assert_eq!(tmpl.render(&QueryTemplateArgs::default()).unwrap(), "");
    }

    #[test]
    fn test_single_angle_brackets_are_literal() {
        let tmpl = Template::query("<<.Series>> < 5 > 2").unwrap();
        let args = QueryTemplateArgs {
            series: "x".to_string(),
            ..Default::default()
        };
        assert_eq!(tmpl.render(&args).unwrap(), "x < 5 > 2");
    }
}
