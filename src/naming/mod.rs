//! Discovery-rule compilation and the naming engine.
//!
//! A [`MetricNamer`] is the compiled form of one discovery rule. It filters
//! series, maps their labels onto resources, names the resulting metrics,
//! and renders queries back out. [`NamerSet`] compiles a whole rule set.

mod builder;
mod extractor;
mod matcher;
mod namer;

pub use builder::{compile_rule, NamerSet};
pub use extractor::LabelResourceExtractor;
pub use matcher::ReMatcher;
pub use namer::MetricNamer;
