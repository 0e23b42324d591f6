//! Builders for v3 list queries.
//!
//! List endpoints (`POST /{collection}/list`) take a JSON body rather than URL query
//! pairs. The filter is a FIQL-style expression such as `vm_name==web01`; multiple
//! clauses are joined with `;` (logical AND). Values are percent-escaped so a `;`
//! or `,` inside a name cannot split the expression.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use std::fmt::Display;

use crate::types::EntityKind;

/// Page size used when listing a collection to exhaustion.
pub const DEFAULT_PAGE_LENGTH: u32 = 100;

/// FIQL separators plus the escape character itself.
const FIQL_RESERVED: &AsciiSet = &CONTROLS.add(b';').add(b',').add(b'%');

/// Builder for a FIQL filter expression.
#[derive(Debug, Default, Clone)]
pub struct FilterBuilder {
    clauses: Vec<String>,
}

impl FilterBuilder {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Append an equality clause. Reserved characters in `value` are escaped.
    pub fn push_eq<T>(&mut self, field: &str, value: T)
    where
        T: Display,
    {
        let value = value.to_string();
        let escaped = utf8_percent_encode(&value, FIQL_RESERVED);
        self.clauses.push(format!("{field}=={escaped}"));
    }

    /// Append an equality clause when the value is present.
    pub fn push_opt_eq<T>(&mut self, field: &str, value: Option<T>)
    where
        T: Display,
    {
        if let Some(value) = value {
            self.push_eq(field, value);
        }
    }

    /// Return the joined expression, or `None` when no clause was added.
    #[must_use]
    pub fn build(self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            Some(self.clauses.join(";"))
        }
    }

    /// Returns true if no clauses have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Body of a `POST /{collection}/list` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    /// Entity kind tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// FIQL filter expression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Page size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    /// Page offset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ListQuery {
    /// A query for every entity of `kind`.
    #[must_use]
    pub fn all(kind: EntityKind) -> Self {
        Self {
            kind: Some(kind.name().to_string()),
            ..Self::default()
        }
    }

    /// A query for entities of `kind` whose name equals `name`.
    #[must_use]
    pub fn by_name(kind: EntityKind, name: &str) -> Self {
        let mut filter = FilterBuilder::new();
        filter.push_eq(kind.name_filter_field(), name);
        Self::all(kind).with_filter(filter)
    }

    /// Replace the filter expression.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterBuilder) -> Self {
        self.filter = filter.build();
        self
    }

    /// Set the page size.
    #[must_use]
    pub const fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Set the page offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_opt_eq_skips_none() {
        let mut filter = FilterBuilder::new();
        filter.push_opt_eq("name", Option::<String>::None);
        assert!(filter.is_empty());
        assert_eq!(filter.build(), None);
    }

    #[test]
    fn clauses_are_joined_with_semicolon() {
        let mut filter = FilterBuilder::new();
        filter.push_eq("name", "golden");
        filter.push_opt_eq("power_state", Some("ON"));
        assert_eq!(filter.build().as_deref(), Some("name==golden;power_state==ON"));
    }

    #[test]
    fn reserved_characters_in_values_are_escaped() {
        let mut filter = FilterBuilder::new();
        filter.push_eq("name", "a;b,c");
        filter.push_eq("name", "100%");
        assert_eq!(
            filter.build().as_deref(),
            Some("name==a%3Bb%2Cc;name==100%25")
        );

        let query = ListQuery::by_name(EntityKind::Vm, "web;power_state==ON");
        assert_eq!(query.filter.as_deref(), Some("vm_name==web%3Bpower_state==ON"));
    }

    #[test]
    fn by_name_uses_kind_specific_field() {
        let query = ListQuery::by_name(EntityKind::Vm, "web01");
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"kind": "vm", "filter": "vm_name==web01"})
        );

        let query = ListQuery::by_name(EntityKind::Image, "ubuntu-20.04");
        assert_eq!(query.filter.as_deref(), Some("name==ubuntu-20.04"));
    }

    #[test]
    fn all_with_paging() {
        let query = ListQuery::all(EntityKind::Subnet).with_length(50).with_offset(100);
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"kind": "subnet", "length": 50, "offset": 100})
        );
    }
}
