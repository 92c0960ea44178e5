//! Template metadata catalog
//!
//! The catalog is built once by the embedding application and handed to the
//! template store; there is no process-wide registry.

#[cfg(feature = "serde")]
use crate::types::{FormError, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Descriptive metadata for one template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct TemplateMetadata {
    pub display_name: String,
    pub category: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,
    /// Role identifiers allowed to use the template
    #[cfg_attr(feature = "serde", serde(default))]
    pub allowed_roles: BTreeSet<String>,
}

impl TemplateMetadata {
    pub fn new(display_name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.allowed_roles.insert(role.into());
        self
    }

    pub fn allows_role(&self, role: &str) -> bool {
        self.allowed_roles.contains(role)
    }

    /// Case-insensitive category comparison
    pub fn in_category(&self, category: &str) -> bool {
        self.category.to_lowercase() == category.to_lowercase()
    }
}

/// Template name → metadata table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TemplateCatalog {
    #[cfg_attr(feature = "serde", serde(default))]
    templates: BTreeMap<String, TemplateMetadata>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with_template(mut self, name: impl Into<String>, metadata: TemplateMetadata) -> Self {
        self.insert(name, metadata);
        self
    }

    /// Register metadata, returning what was previously registered under the name
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        metadata: TemplateMetadata,
    ) -> Option<TemplateMetadata> {
        self.templates.insert(name.into(), metadata)
    }

    pub fn get(&self, name: &str) -> Option<&TemplateMetadata> {
        self.templates.get(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Parse a catalog from JSON text
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| FormError::Config(format!("Failed to parse catalog: {}", e)))
    }

    /// Load a catalog from a JSON file
    #[cfg(feature = "serde")]
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let catalog = serde_json::from_slice(&bytes)
            .map_err(|e| FormError::Config(format!("Failed to parse catalog: {}", e)))?;
        Ok(catalog)
    }

    /// Save the catalog to a JSON file
    #[cfg(feature = "serde")]
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| FormError::Config(format!("Failed to serialize catalog: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
