//! Content collaborators consumed by the generator.
//!
//! The generator never talks to a CMS directly. It reads page definitions,
//! static pages and model records through the traits below. [`Catalog`] is a
//! file-backed implementation of all three, loaded from TOML or JSON:
//!
//! ```toml
//! [[sites]]
//! code = "en"
//!
//! [[pages]]
//! base_file_name = "blog-post.htm"
//! url = "/blog/:slug"
//! enabled_in_sitemap = true
//! priority = 0.7
//! model = { class = "Post", scope = "published", params = "slug:slug" }
//!
//! [models.Post.scopes.published]
//! field = "status"
//! equals = "published"
//!
//! [[models.Post.records]]
//! attributes = { slug = "hello-world", status = "published" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ModelRecord, ModelScope, PageDefinition, SiteDefinition, StaticPage};
use crate::{Error, Result};

/// Source of dynamic-route page definitions.
pub trait PageCatalog: Send + Sync {
    /// Every page definition, in catalog order.
    fn pages(&self) -> Result<Vec<PageDefinition>>;
}

/// Source of static pages.
pub trait StaticPageCatalog: Send + Sync {
    /// Every static page, in catalog order.
    fn static_pages(&self) -> Result<Vec<StaticPage>>;
}

/// Model query capability used to expand listing pages.
pub trait ModelSource: Send + Sync {
    /// Whether `class` names a known model.
    fn has_class(&self, class: &str) -> bool;

    /// Records of `class`, filtered by `scope` when one is given.
    fn records(&self, class: &str, scope: Option<&ModelScope>) -> Result<Vec<ModelRecord>>;
}

/// Named filter applied by a scope.
///
/// The scope parameter, when present, overrides `equals`. Without either,
/// the scope keeps records whose `field` is truthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub field: String,
    #[serde(default)]
    pub equals: Option<String>,
}

impl ScopeFilter {
    fn matches(&self, record: &ModelRecord, parameter: Option<&str>) -> bool {
        let value = record.attribute(&self.field);
        match parameter.or(self.equals.as_deref()) {
            Some(expected) => value == expected,
            None => !matches!(value.as_str(), "" | "0" | "false"),
        }
    }
}

/// Records and scopes of one model class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCollection {
    #[serde(default)]
    pub records: Vec<ModelRecord>,
    #[serde(default)]
    pub scopes: BTreeMap<String, ScopeFilter>,
}

/// File-backed content catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub sites: Vec<SiteDefinition>,
    #[serde(default)]
    pub pages: Vec<PageDefinition>,
    #[serde(default)]
    pub static_pages: Vec<StaticPage>,
    #[serde(default)]
    pub models: BTreeMap<String, ModelCollection>,
}

impl Catalog {
    /// Load a catalog, choosing JSON for `.json` files and TOML otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        };
        let catalog = parsed
            .map_err(|e| Error::Parse(format!("Failed to parse catalog {}: {e}", path.display())))?;

        debug!(
            path = %path.display(),
            sites = catalog.sites.len(),
            pages = catalog.pages.len(),
            static_pages = catalog.static_pages.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    /// Parse a TOML catalog document.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse a JSON catalog document.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Site definition by code.
    pub fn site(&self, code: &str) -> Result<&SiteDefinition> {
        self.sites
            .iter()
            .find(|site| site.code == code)
            .ok_or_else(|| Error::NotFound(format!("site '{code}'")))
    }
}

impl PageCatalog for Catalog {
    fn pages(&self) -> Result<Vec<PageDefinition>> {
        Ok(self.pages.clone())
    }
}

impl StaticPageCatalog for Catalog {
    fn static_pages(&self) -> Result<Vec<StaticPage>> {
        Ok(self.static_pages.clone())
    }
}

impl ModelSource for Catalog {
    fn has_class(&self, class: &str) -> bool {
        self.models.contains_key(class)
    }

    fn records(&self, class: &str, scope: Option<&ModelScope>) -> Result<Vec<ModelRecord>> {
        let collection = self
            .models
            .get(class)
            .ok_or_else(|| Error::NotFound(format!("model class '{class}'")))?;

        let Some(scope) = scope else {
            return Ok(collection.records.clone());
        };

        let filter = collection
            .scopes
            .get(&scope.name)
            .ok_or_else(|| Error::NotFound(format!("scope '{}' on '{class}'", scope.name)))?;

        Ok(collection
            .records
            .iter()
            .filter(|record| filter.matches(record, scope.parameter.as_deref()))
            .cloned()
            .collect())
    }
}
