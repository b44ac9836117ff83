//! PromQL text produced and consumed by the adapter.
//!
//! `selector` renders series selectors and label matchers; `template`
//! implements the `<<.Field>>` templates used for label names and
//! metrics queries; `matchers` evaluates simple selectors against
//! series held in memory.

pub mod matchers;
pub mod selector;
pub mod template;

pub use matchers::{LabelMatcher, MatchOp, SeriesMatcher};
pub use selector::{
    label_eq, label_matches, label_neq, label_not_matches, match_series, name_matches,
    name_not_matches, prom_duration, Selector,
};
pub use template::{Field, QueryTemplateArgs, Template, TemplateArgs};
