//! Label extraction
//!
//! Services declare the DNS records they want through labels following a
//! three-segment convention:
//!
//! ```text
//! <prefix>.<selector>.<attribute> = <value>
//! ```
//!
//! - `prefix`: constant namespace, [`DEFAULT_LABEL_PREFIX`] unless configured
//! - `selector`: groups the labels of one declared record (word characters)
//! - `attribute`: one of `domain`, `host`, `type`, `value`
//!
//! ## Example
//!
//! ```text
//! com.aixo.cloud.ingress.mappings.web.domain = example.org
//! com.aixo.cloud.ingress.mappings.web.host   = api
//! com.aixo.cloud.ingress.mappings.web.type   = CNAME
//! com.aixo.cloud.ingress.mappings.web.value  = ingress
//! ```
//!
//! Labels that do not follow the convention are ignored. A selector missing
//! any of the four attributes is reported and dropped.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::Error;

/// Namespace prefix used when none is configured
pub const DEFAULT_LABEL_PREFIX: &str = "com.aixo.cloud.ingress.mappings";

/// Attribute segment of a mapping label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    Domain,
    Host,
    Type,
    Value,
}

impl Attribute {
    /// All attributes, in the order diagnostics are reported
    pub const ALL: [Attribute; 4] = [
        Attribute::Domain,
        Attribute::Host,
        Attribute::Type,
        Attribute::Value,
    ];

    /// Label segment for this attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Domain => "domain",
            Attribute::Host => "host",
            Attribute::Type => "type",
            Attribute::Value => "value",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "domain" => Ok(Attribute::Domain),
            "host" => Ok(Attribute::Host),
            "type" => Ok(Attribute::Type),
            "value" => Ok(Attribute::Value),
            _ => Err(()),
        }
    }
}

/// One fully specified desired DNS record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingDeclaration {
    /// Grouping key the labels were declared under
    pub selector: String,
    /// Domain (zone) name, e.g. "example.org"
    pub domain: String,
    /// Record name inside the domain, e.g. "api"
    pub host: String,
    /// Record type, e.g. "CNAME"
    pub record_type: String,
    /// Record value, e.g. "ingress"
    pub value: String,
}

/// Output of [`LabelSchema::extract`]
#[derive(Debug, Default)]
pub struct Extraction {
    /// Actionable declarations, ordered by selector
    pub declarations: Vec<MappingDeclaration>,
    /// Empty-value and incomplete-declaration diagnostics
    pub diagnostics: Vec<Error>,
}

impl Extraction {
    /// Whether no actionable declaration was found
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

#[derive(Default)]
struct Accumulator {
    domain: Option<String>,
    host: Option<String>,
    record_type: Option<String>,
    value: Option<String>,
}

impl Accumulator {
    fn slot(&mut self, attribute: Attribute) -> &mut Option<String> {
        match attribute {
            Attribute::Domain => &mut self.domain,
            Attribute::Host => &mut self.host,
            Attribute::Type => &mut self.record_type,
            Attribute::Value => &mut self.value,
        }
    }

    fn is_set(&self, attribute: Attribute) -> bool {
        match attribute {
            Attribute::Domain => self.domain.is_some(),
            Attribute::Host => self.host.is_some(),
            Attribute::Type => self.record_type.is_some(),
            Attribute::Value => self.value.is_some(),
        }
    }

    fn into_declaration(self, selector: String) -> Option<MappingDeclaration> {
        Some(MappingDeclaration {
            selector,
            domain: self.domain?,
            host: self.host?,
            record_type: self.record_type?,
            value: self.value?,
        })
    }
}

/// Parser for the mapping label convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSchema {
    prefix: String,
}

impl Default for LabelSchema {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL_PREFIX)
    }
}

impl LabelSchema {
    /// Create a schema for the given namespace prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Namespace prefix of this schema
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Split a label key into `(selector, attribute)`
    ///
    /// Returns `None` for any key that does not follow the convention.
    pub fn parse_key<'a>(&self, key: &'a str) -> Option<(&'a str, Attribute)> {
        let rest = key.strip_prefix(self.prefix.as_str())?.strip_prefix('.')?;
        let (selector, attribute) = rest.split_once('.')?;

        if selector.is_empty() || !selector.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }

        let attribute = attribute.parse().ok()?;
        Some((selector, attribute))
    }

    /// Extract mapping declarations from the labels of a service
    ///
    /// Never fails: malformed keys are skipped, incomplete selectors end up
    /// in [`Extraction::diagnostics`]. The result does not depend on the
    /// iteration order of `labels`.
    pub fn extract(&self, service_id: &str, labels: &HashMap<String, String>) -> Extraction {
        let mut accumulators: BTreeMap<String, Accumulator> = BTreeMap::new();
        let mut diagnostics = Vec::new();

        // Sorted keys keep diagnostics deterministic
        let mut keys: Vec<&String> = labels.keys().collect();
        keys.sort();

        for key in keys {
            let Some((selector, attribute)) = self.parse_key(key) else {
                debug!("Ignoring label {}", key);
                continue;
            };

            let accumulator = accumulators.entry(selector.to_string()).or_default();
            let value = &labels[key];

            if value.trim().is_empty() {
                diagnostics.push(Error::EmptyLabelValue {
                    service_id: service_id.to_string(),
                    label: key.clone(),
                });
                continue;
            }

            *accumulator.slot(attribute) = Some(value.to_string());
        }

        let mut declarations = Vec::with_capacity(accumulators.len());
        for (selector, accumulator) in accumulators {
            let missing: Vec<Attribute> = Attribute::ALL
                .into_iter()
                .filter(|attribute| !accumulator.is_set(*attribute))
                .collect();

            if !missing.is_empty() {
                for attribute in missing {
                    diagnostics.push(Error::incomplete(service_id, &selector, attribute.as_str()));
                }
                continue;
            }

            if let Some(declaration) = accumulator.into_declaration(selector) {
                declarations.push(declaration);
            }
        }

        Extraction {
            declarations,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn complete_declaration_is_extracted() {
        let schema = LabelSchema::new("ns");
        let extraction = schema.extract(
            "svc-1",
            &labels(&[
                ("ns.web.domain", "example.org"),
                ("ns.web.host", "api"),
                ("ns.web.type", "CNAME"),
                ("ns.web.value", "ingress"),
                ("com.docker.stack.namespace", "web"),
            ]),
        );

        assert!(extraction.diagnostics.is_empty());
        assert_eq!(
            extraction.declarations,
            vec![MappingDeclaration {
                selector: "web".to_string(),
                domain: "example.org".to_string(),
                host: "api".to_string(),
                record_type: "CNAME".to_string(),
                value: "ingress".to_string(),
            }]
        );
    }

    #[test]
    fn missing_attribute_excludes_selector() {
        let schema = LabelSchema::new("ns");
        let extraction = schema.extract(
            "svc-1",
            &labels(&[
                ("ns.web.domain", "example.org"),
                ("ns.web.type", "CNAME"),
                ("ns.web.value", "ingress"),
            ]),
        );

        assert!(extraction.is_empty());
        assert_eq!(extraction.diagnostics.len(), 1);
        match &extraction.diagnostics[0] {
            Error::IncompleteDeclaration {
                service_id,
                selector,
                attribute,
            } => {
                assert_eq!(service_id, "svc-1");
                assert_eq!(selector, "web");
                assert_eq!(attribute, "host");
            }
            other => panic!("unexpected diagnostic: {:?}", other),
        }
    }

    #[test]
    fn empty_value_is_reported_and_unset() {
        let schema = LabelSchema::new("ns");
        let extraction = schema.extract(
            "svc-1",
            &labels(&[
                ("ns.web.domain", "example.org"),
                ("ns.web.host", ""),
                ("ns.web.type", "A"),
                ("ns.web.value", "10.0.0.1"),
            ]),
        );

        assert!(extraction.is_empty());
        assert_eq!(extraction.diagnostics.len(), 2);
        assert!(matches!(
            &extraction.diagnostics[0],
            Error::EmptyLabelValue { label, .. } if label == "ns.web.host"
        ));
        assert!(matches!(
            &extraction.diagnostics[1],
            Error::IncompleteDeclaration { attribute, .. } if attribute == "host"
        ));
    }

    #[test]
    fn values_are_kept_as_given() {
        let schema = LabelSchema::new("ns");
        let extraction = schema.extract(
            "svc-1",
            &labels(&[
                ("ns.web.domain", "example.org"),
                ("ns.web.host", "api"),
                ("ns.web.type", "CNAME"),
                ("ns.web.value", "ingress "),
            ]),
        );

        assert!(extraction.diagnostics.is_empty());
        assert_eq!(extraction.declarations[0].value, "ingress ");

        let extraction = schema.extract("svc-1", &labels(&[("ns.web.host", "  ")]));
        assert!(matches!(
            &extraction.diagnostics[0],
            Error::EmptyLabelValue { label, .. } if label == "ns.web.host"
        ));
    }

    #[test]
    fn selectors_are_independent() {
        let schema = LabelSchema::new("ns");
        let extraction = schema.extract(
            "svc-1",
            &labels(&[
                ("ns.b.domain", "example.org"),
                ("ns.b.host", "b"),
                ("ns.b.type", "CNAME"),
                ("ns.b.value", "ingress"),
                ("ns.a.domain", "example.org"),
                ("ns.a.host", "a"),
                ("ns.a.type", "A"),
                ("ns.a.value", "10.0.0.2"),
                ("ns.c.domain", "example.org"),
            ]),
        );

        let selectors: Vec<&str> = extraction
            .declarations
            .iter()
            .map(|d| d.selector.as_str())
            .collect();
        assert_eq!(selectors, vec!["a", "b"]);
        // host, type, value missing for "c"
        assert_eq!(extraction.diagnostics.len(), 3);
    }

    #[test]
    fn malformed_keys_are_not_matched() {
        let schema = LabelSchema::new("ns");

        assert_eq!(schema.parse_key("ns.web.domain"), Some(("web", Attribute::Domain)));
        assert_eq!(schema.parse_key("ns.web_2.value"), Some(("web_2", Attribute::Value)));
        assert_eq!(schema.parse_key("ns.web.ttl"), None);
        assert_eq!(schema.parse_key("ns..domain"), None);
        assert_eq!(schema.parse_key("ns.web-1.domain"), None);
        assert_eq!(schema.parse_key("nsx.web.domain"), None);
        assert_eq!(schema.parse_key("ns.web.domain.extra"), None);
        assert_eq!(schema.parse_key("other.ns.web.domain"), None);
        assert_eq!(schema.parse_key("ns"), None);
    }

    #[test]
    fn default_prefix_is_recognised() {
        let schema = LabelSchema::default();
        assert_eq!(
            schema.parse_key("com.aixo.cloud.ingress.mappings.blog.host"),
            Some(("blog", Attribute::Host))
        );
    }
}
