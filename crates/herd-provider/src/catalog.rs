//! Catalog resource
//!
//! A catalog is a named, versioned collection of deployable application
//! templates registered against the management API. Only the fields the
//! lifecycle checks and CLI need are modeled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

use herd_common::{Error, Result, STATE_ACTIVE};

use crate::client::ApiObject;

/// Default catalog kind
pub const DEFAULT_CATALOG_KIND: &str = "helm";

/// Default git branch for catalogs
pub const DEFAULT_CATALOG_BRANCH: &str = "master";

/// A catalog as returned by the management API
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    /// Server-assigned identifier
    pub id: String,
    /// Catalog name
    pub name: String,
    /// Repository URL
    pub url: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Repository kind
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Repository branch
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Lifecycle state
    #[serde(default)]
    pub state: String,
}

fn default_kind() -> String {
    DEFAULT_CATALOG_KIND.to_string()
}

fn default_branch() -> String {
    DEFAULT_CATALOG_BRANCH.to_string()
}

/// Desired state of a catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSpec {
    /// Catalog name
    pub name: String,
    /// Repository URL
    pub url: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Repository kind (defaults to helm)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Repository branch (defaults to master)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl CatalogSpec {
    /// Spec with just a name and URL
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            description: None,
            kind: None,
            branch: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the branch
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Reject specs the API would refuse
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation_for_field("name", "catalog name is required"));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(Error::validation_for_field(
                "url",
                format!("catalog url '{}' must be http(s)", self.url),
            ));
        }
        Ok(())
    }
}

impl ApiObject for Catalog {
    const KIND: &'static str = "catalog";
    const COLLECTION: &'static str = "catalogs";

    type Spec = CatalogSpec;

    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> &str {
        &self.state
    }

    fn validate_spec(spec: &CatalogSpec) -> Result<()> {
        spec.validate()
    }

    fn from_spec(id: String, spec: &CatalogSpec) -> Self {
        let mut catalog = Self {
            id,
            name: String::new(),
            url: String::new(),
            description: String::new(),
            kind: default_kind(),
            branch: default_branch(),
            state: STATE_ACTIVE.to_string(),
        };
        catalog.apply_spec(spec);
        catalog
    }

    fn apply_spec(&mut self, spec: &CatalogSpec) {
        self.name = spec.name.clone();
        self.url = spec.url.clone();
        self.description = spec.description.clone().unwrap_or_default();
        if let Some(kind) = &spec.kind {
            self.kind = kind.clone();
        }
        if let Some(branch) = &spec.branch {
            self.branch = branch.clone();
        }
    }

    fn set_state(&mut self, state: &str) {
        self.state = state.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foo_spec() -> CatalogSpec {
        CatalogSpec::new("foo", "http://foo.com:8080")
            .with_description("Terraform catalog acceptance test")
    }

    #[test]
    fn created_catalog_reflects_spec_and_defaults() {
        let catalog = Catalog::from_spec("foo".to_string(), &foo_spec());

        assert_eq!(catalog.id(), "foo");
        assert_eq!(catalog.name, "foo");
        assert_eq!(catalog.url, "http://foo.com:8080");
        assert_eq!(catalog.description, "Terraform catalog acceptance test");
        assert_eq!(catalog.kind, DEFAULT_CATALOG_KIND);
        assert_eq!(catalog.branch, DEFAULT_CATALOG_BRANCH);
        assert_eq!(catalog.state(), STATE_ACTIVE);
    }

    #[test]
    fn update_replaces_description_and_keeps_unset_fields() {
        let mut catalog =
            Catalog::from_spec("foo".to_string(), &foo_spec().with_branch("release"));

        catalog.apply_spec(&CatalogSpec::new("foo", "http://foo.updated.com:8080"));

        assert_eq!(catalog.url, "http://foo.updated.com:8080");
        assert_eq!(catalog.description, "");
        assert_eq!(catalog.branch, "release");
    }

    #[test]
    fn catalog_decodes_api_payload_ignoring_unknown_fields() {
        let json = r#"{
            "id": "foo",
            "name": "foo",
            "url": "http://foo.com:8080",
            "description": "d",
            "state": "active",
            "type": "catalog",
            "links": {"self": "https://mgmt.example.com/v3/catalogs/foo"}
        }"#;

        let catalog: Catalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.state, "active");
        assert_eq!(catalog.kind, DEFAULT_CATALOG_KIND);
        assert_eq!(catalog.branch, DEFAULT_CATALOG_BRANCH);
    }

    #[test]
    fn spec_serializes_without_unset_fields() {
        let value = serde_json::to_value(CatalogSpec::new("foo", "http://foo.com")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"name": "foo", "url": "http://foo.com"})
        );
    }

    #[test]
    fn spec_validation_rejects_missing_name_and_bad_url() {
        assert!(foo_spec().validate().is_ok());

        let err = CatalogSpec::new(" ", "http://foo.com").validate().unwrap_err();
        assert!(err.to_string().contains("name is required"));

        let err = CatalogSpec::new("foo", "ftp://foo.com").validate().unwrap_err();
        assert!(err.to_string().contains("must be http(s)"));
    }
}
