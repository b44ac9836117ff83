use crate::core::{AdapterError, GroupResource, Result};
use crate::query::Template;
use regex::Regex;

const GROUP_CAPTURE: &str = "group";
const RESOURCE_CAPTURE: &str = "resource";

/// Recognizes label names produced by a label template and recovers the
/// group-resource they encode.
///
/// The template is turned into an anchored regex by rendering it with
/// capture groups in place of the group and resource, so literal text in
/// the template is interpreted as regex syntax, and anything in the
/// template that limits name length will break extraction.
#[derive(Debug, Clone)]
pub struct LabelResourceExtractor {
    regex: Regex,
    has_group: bool,
}

impl LabelResourceExtractor {
    /// Builds an extractor for labels of the form described by `template`
    pub fn new(template: &Template) -> Result<Self> {
        let captures = GroupResource::new(
            format!("(?P<{}>.+?)", GROUP_CAPTURE),
            format!("(?P<{}>.+?)", RESOURCE_CAPTURE),
        );
        let rendered = template.render(&captures)?;
        if rendered.is_empty() {
            return Err(AdapterError::template(
                "unable to convert label template to matcher: empty template",
            ));
        }

        let pattern = format!("^{}$", rendered);
        let regex = Regex::new(&pattern).map_err(|source| AdapterError::InvalidRegex {
            pattern: pattern.clone(),
            source,
        })?;

        let mut has_resource = false;
        let mut has_group = false;
        for name in regex.capture_names().flatten() {
            match name {
                RESOURCE_CAPTURE => has_resource = true,
                GROUP_CAPTURE => has_group = true,
                _ => {},
            }
        }

        if !has_resource {
            return Err(AdapterError::template(
                "must include at least `<<.Resource>>` in the label template",
            ));
        }

        Ok(LabelResourceExtractor { regex, has_group })
    }

    /// Extracts the (not yet normalized) group-resource encoded in `label`,
    /// or `None` if the label doesn't have the expected form.
    pub fn extract(&self, label: &str) -> Option<GroupResource> {
        let caps = self.regex.captures(label)?;
        let group = if self.has_group {
            caps.name(GROUP_CAPTURE).map_or("", |m| m.as_str())
        } else {
            ""
        };
        let resource = caps.name(RESOURCE_CAPTURE)?.as_str();
        Some(GroupResource::new(group, resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(template: &str) -> Result<LabelResourceExtractor> {
        LabelResourceExtractor::new(&Template::label(template)?)
    }

    #[test]
    fn test_resource_only() {
        let ext = extractor("kube_<<.Resource>>").unwrap();
        assert_eq!(ext.extract("kube_pod"), Some(GroupResource::core("pod")));
        assert_eq!(ext.extract("pod"), None);
        assert_eq!(ext.extract("xkube_pod"), None);
    }

    #[test]
    fn test_group_and_resource() {
        let ext = extractor("<<.Group>>_<<.Resource>>").unwrap();
        assert_eq!(
            ext.extract("apps_deployment"),
            Some(GroupResource::new("apps", "deployment"))
        );
        // lazy group capture stops at the first separator
        assert_eq!(
            ext.extract("networking_k8s_io_ingress"),
            Some(GroupResource::new("networking", "k8s_io_ingress"))
        );
    }

    #[test]
    fn test_missing_resource_placeholder() {
        let err = extractor("<<.Group>>_label").unwrap_err();
        assert!(err.to_string().contains("<<.Resource>>"));
    }

    #[test]
    fn test_invalid_rendered_regex() {
        let err = extractor("(<<.Resource>>").unwrap_err();
        assert!(matches!(err, AdapterError::InvalidRegex { .. }));
    }
}
