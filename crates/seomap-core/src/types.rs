use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One entry in a site's sitemap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapItem {
    /// Store-assigned identifier.
    pub id: u64,
    /// Owning site code.
    pub site_id: String,
    /// Identifier of the page that produced this item.
    pub base_file_name: String,
    /// Absolute URL, unique within the site.
    pub loc: String,
    pub lastmod: Option<DateTime<Utc>>,
    pub changefreq: Option<ChangeFrequency>,
    pub priority: Option<f32>,
    pub enabled: bool,
}

/// Values written onto an item by every upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemAttributes {
    pub lastmod: Option<DateTime<Utc>>,
    pub changefreq: Option<ChangeFrequency>,
    pub priority: Option<f32>,
}

/// Change frequency hints for the sitemap protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFrequency {
    /// The page changes every time it is accessed.
    Always,
    /// The page changes hourly.
    Hourly,
    /// The page changes daily.
    Daily,
    /// The page changes weekly.
    Weekly,
    /// The page changes monthly.
    Monthly,
    /// The page changes yearly.
    Yearly,
    /// The page is archived and will not change.
    Never,
}

impl ChangeFrequency {
    /// Protocol spelling of the value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Never => "never",
        }
    }
}

impl fmt::Display for ChangeFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeFrequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "never" => Ok(Self::Never),
            _ => Err(Error::Parse(format!("Invalid changefreq value: {s}"))),
        }
    }
}

/// Media discriminator. Image and video associations are tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// An image discovered on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Absolute image URL.
    pub loc: String,
}

/// A video discovered through `VideoObject` microdata.
///
/// Every field is optional; absent fields are omitted from serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoAsset {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content_loc: Option<String>,
    pub player_loc: Option<String>,
    pub thumbnail_loc: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
}

/// Typed media payload. The variant determines which fields are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaPayload {
    Image(ImageAsset),
    Video(VideoAsset),
}

impl MediaPayload {
    /// Discriminator of this payload.
    pub const fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Video(_) => MediaKind::Video,
        }
    }

    /// Shorthand for an image payload.
    pub fn image(loc: impl Into<String>) -> Self {
        Self::Image(ImageAsset { loc: loc.into() })
    }
}

/// A stored media asset, associated with items through the store's link table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: u64,
    #[serde(flatten)]
    pub payload: MediaPayload,
}

/// A site (or locale) the sitemap is generated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDefinition {
    /// Unique site code, used as the store's site scope.
    pub code: String,
    /// Locale used to pick localized URLs and enablement overrides.
    #[serde(default)]
    pub locale: Option<String>,
    /// Optional route prefix such as `en` or `/de/`.
    #[serde(default)]
    pub route_prefix: Option<String>,
}

impl SiteDefinition {
    /// Site without locale or route prefix.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            locale: None,
            route_prefix: None,
        }
    }

    /// Prefix a relative path with this site's route prefix.
    ///
    /// ```rust
    /// use seomap_core::SiteDefinition;
    ///
    /// let mut site = SiteDefinition::new("de");
    /// site.route_prefix = Some("/de/".to_string());
    /// assert_eq!(site.attach_route_prefix("blog/:slug"), "de/blog/:slug");
    /// assert_eq!(SiteDefinition::new("en").attach_route_prefix("blog"), "blog");
    /// ```
    pub fn attach_route_prefix(&self, path: &str) -> String {
        let prefix = self
            .route_prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .unwrap_or_default();

        if prefix.is_empty() {
            path.to_string()
        } else {
            format!("{prefix}/{}", path.trim_start_matches('/'))
        }
    }
}

/// Binding between a listing page and the model class that expands it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelBinding {
    /// Model class name, looked up through the model source.
    pub class: String,
    /// Scope definition, `scopeName` or `scopeName:parameter`.
    #[serde(default)]
    pub scope: Option<String>,
    /// Pipe-delimited `urlParam:modelField` mappings.
    #[serde(default)]
    pub params: String,
    /// Use each record's `updated_at` as its `lastmod`.
    #[serde(default)]
    pub use_updated_at: bool,
}

/// A dynamic-route page definition from the page catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDefinition {
    pub base_file_name: String,
    /// Raw route template, e.g. `/blog/:category/:slug?`.
    pub url: String,
    /// Source content hashed by the change detector.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub priority: Option<f32>,
    #[serde(default)]
    pub changefreq: Option<ChangeFrequency>,
    #[serde(default)]
    pub enabled_in_sitemap: bool,
    /// Per-locale enablement overrides.
    #[serde(default)]
    pub locale_enabled: BTreeMap<String, bool>,
    /// Per-locale route template overrides.
    #[serde(default)]
    pub locale_urls: BTreeMap<String, String>,
    #[serde(default)]
    pub model: Option<ModelBinding>,
    /// Author-supplied last modification date.
    #[serde(default)]
    pub lastmod: Option<String>,
    /// File modification time as a unix timestamp.
    #[serde(default)]
    pub mtime: Option<i64>,
}

impl PageDefinition {
    /// Page with a route and nothing else set.
    pub fn new(base_file_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            base_file_name: base_file_name.into(),
            url: url.into(),
            content: String::new(),
            priority: None,
            changefreq: None,
            enabled_in_sitemap: true,
            locale_enabled: BTreeMap::new(),
            locale_urls: BTreeMap::new(),
            model: None,
            lastmod: None,
            mtime: None,
        }
    }

    /// Whether the page is enabled for `site`, honoring locale overrides.
    pub fn is_enabled_for(&self, site: &SiteDefinition) -> bool {
        site.locale
            .as_ref()
            .and_then(|locale| self.locale_enabled.get(locale))
            .copied()
            .unwrap_or(self.enabled_in_sitemap)
    }

    /// Route template for `site`, preferring the localized override.
    pub fn url_for(&self, site: &SiteDefinition) -> &str {
        site.locale
            .as_ref()
            .and_then(|locale| self.locale_urls.get(locale))
            .map_or(self.url.as_str(), String::as_str)
    }

    /// The page's own modification time: `lastmod`, then `mtime`.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.lastmod
            .as_deref()
            .and_then(parse_datetime)
            .or_else(|| self.mtime.and_then(|ts| DateTime::from_timestamp(ts, 0)))
    }
}

/// A static page from the static-page catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticPage {
    pub file_name: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub enabled_in_sitemap: bool,
    #[serde(default)]
    pub priority: Option<f32>,
    #[serde(default)]
    pub changefreq: Option<ChangeFrequency>,
    #[serde(default)]
    pub lastmod: Option<String>,
    #[serde(default)]
    pub mtime: Option<i64>,
    #[serde(default)]
    pub locale_urls: BTreeMap<String, String>,
}

impl From<StaticPage> for PageDefinition {
    fn from(page: StaticPage) -> Self {
        Self {
            base_file_name: page.file_name,
            url: page.url,
            content: page.content,
            priority: page.priority,
            changefreq: page.changefreq,
            enabled_in_sitemap: page.enabled_in_sitemap,
            locale_enabled: BTreeMap::new(),
            locale_urls: page.locale_urls,
            model: None,
            lastmod: page.lastmod,
            mtime: page.mtime,
        }
    }
}

/// A model instance returned by a model source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Related records by relation name, in relation order.
    #[serde(default)]
    pub relations: BTreeMap<String, Vec<ModelRecord>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Per-record sitemap enablement; `Some(false)` excludes the record.
    #[serde(default)]
    pub enabled_in_sitemap: Option<bool>,
}

impl ModelRecord {
    /// Builder helper used by sources and tests.
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Attribute rendered as a URL segment. Missing and null values are empty.
    pub fn attribute(&self, name: &str) -> String {
        match self.attributes.get(name) {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// First record of a relation.
    pub fn first_related(&self, relation: &str) -> Option<&Self> {
        self.relations.get(relation).and_then(|records| records.first())
    }

    /// Whether the record explicitly opted out of the sitemap.
    pub fn is_disabled(&self) -> bool {
        self.enabled_in_sitemap == Some(false)
    }
}

/// Parsed scope definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelScope {
    pub name: String,
    pub parameter: Option<String>,
}

impl ModelScope {
    /// Parse `scopeName` or `scopeName:parameter`. Blank definitions yield `None`.
    pub fn parse(def: &str) -> Option<Self> {
        let def = def.trim();
        if def.is_empty() {
            return None;
        }

        let (name, parameter) = match def.split_once(':') {
            Some((name, param)) => (name, Some(param.to_string()).filter(|p| !p.is_empty())),
            None => (def, None),
        };

        Some(Self {
            name: name.to_string(),
            parameter,
        })
    }
}

/// Parse a date string into a `DateTime<Utc>`.
///
/// Supports RFC 3339, date-only (`2024-01-15`) and naive ISO 8601 timestamps
/// with or without fractional seconds (assumed UTC).
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }

    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }

    tracing::debug!(date_str = %s, "Could not parse date");
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_changefreq_parsing() {
        let cases = [
            ("always", ChangeFrequency::Always),
            ("HOURLY", ChangeFrequency::Hourly),
            (" daily ", ChangeFrequency::Daily),
            ("weekly", ChangeFrequency::Weekly),
            ("Monthly", ChangeFrequency::Monthly),
            ("yearly", ChangeFrequency::Yearly),
            ("never", ChangeFrequency::Never),
        ];

        for (input, expected) in cases {
            let parsed: ChangeFrequency = input.parse().unwrap();
            assert_eq!(parsed, expected, "failed for {input}");
            assert_eq!(parsed.to_string(), input.trim().to_lowercase());
        }
    }

    #[test]
    fn test_changefreq_invalid_value() {
        let result = "sometimes".parse::<ChangeFrequency>();
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_parse_datetime_formats() {
        let date_only = parse_datetime("2024-01-15").unwrap();
        assert_eq!((date_only.year(), date_only.month(), date_only.day()), (2024, 1, 15));

        let with_offset = parse_datetime("2024-01-15T10:30:00+02:00").unwrap();
        assert_eq!(with_offset.hour(), 8);

        let naive = parse_datetime("2024-01-15T10:30:00.250").unwrap();
        assert_eq!(naive.minute(), 30);

        let spaced = parse_datetime("2024-01-15 10:30:00").unwrap();
        assert_eq!(spaced.hour(), 10);

        assert!(parse_datetime("not a date").is_none());
    }

    #[test]
    fn test_attach_route_prefix() {
        let mut site = SiteDefinition::new("pl");
        assert_eq!(site.attach_route_prefix("blog"), "blog");

        site.route_prefix = Some("pl".to_string());
        assert_eq!(site.attach_route_prefix("blog"), "pl/blog");
        assert_eq!(site.attach_route_prefix(""), "pl/");

        site.route_prefix = Some("/".to_string());
        assert_eq!(site.attach_route_prefix("blog"), "blog");
    }

    #[test]
    fn test_page_locale_overrides() {
        // Given: A page disabled by default but enabled for "pl"
        let mut page = PageDefinition::new("blog", "/blog");
        page.enabled_in_sitemap = false;
        page.locale_enabled.insert("pl".to_string(), true);
        page.locale_urls.insert("pl".to_string(), "/wpisy".to_string());

        let mut polish = SiteDefinition::new("pl");
        polish.locale = Some("pl".to_string());
        let mut german = SiteDefinition::new("de");
        german.locale = Some("de".to_string());

        // Then: The override applies only to its locale
        assert!(page.is_enabled_for(&polish));
        assert!(!page.is_enabled_for(&german));
        assert!(!page.is_enabled_for(&SiteDefinition::new("any")));
        assert_eq!(page.url_for(&polish), "/wpisy");
        assert_eq!(page.url_for(&german), "/blog");
    }

    #[test]
    fn test_page_modified_at_fallbacks() {
        let mut page = PageDefinition::new("home", "/");
        assert!(page.modified_at().is_none());

        page.mtime = Some(1_700_000_000);
        assert_eq!(page.modified_at().unwrap().timestamp(), 1_700_000_000);

        page.lastmod = Some("2023-05-01".to_string());
        assert_eq!(page.modified_at().unwrap().year(), 2023);

        page.lastmod = Some("garbage".to_string());
        assert_eq!(page.modified_at().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_model_scope_parse() {
        assert_eq!(ModelScope::parse(""), None);
        assert_eq!(
            ModelScope::parse("published"),
            Some(ModelScope {
                name: "published".to_string(),
                parameter: None
            })
        );
        assert_eq!(
            ModelScope::parse("inCategory:news"),
            Some(ModelScope {
                name: "inCategory".to_string(),
                parameter: Some("news".to_string())
            })
        );
        assert_eq!(ModelScope::parse("inCategory:").unwrap().parameter, None);
    }

    #[test]
    fn test_model_record_attribute_rendering() {
        let record = ModelRecord::default()
            .with_attribute("slug", "hello")
            .with_attribute("id", 42)
            .with_attribute("missing", serde_json::Value::Null);

        assert_eq!(record.attribute("slug"), "hello");
        assert_eq!(record.attribute("id"), "42");
        assert_eq!(record.attribute("missing"), "");
        assert_eq!(record.attribute("absent"), "");
        assert!(!record.is_disabled());
    }

    #[test]
    fn test_media_payload_serialization() {
        let asset = MediaAsset {
            id: 7,
            payload: MediaPayload::image("https://example.com/a.png"),
        };

        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["loc"], "https://example.com/a.png");

        let back: MediaAsset = serde_json::from_value(json).unwrap();
        assert_eq!(back, asset);
        assert_eq!(back.payload.kind(), MediaKind::Image);
    }

    #[test]
    fn test_static_page_conversion() {
        let page = StaticPage {
            file_name: "about.htm".to_string(),
            url: "/about".to_string(),
            content: "About us".to_string(),
            enabled_in_sitemap: true,
            priority: Some(0.5),
            changefreq: Some(ChangeFrequency::Monthly),
            lastmod: None,
            mtime: None,
            locale_urls: BTreeMap::new(),
        };

        let def = PageDefinition::from(page);
        assert_eq!(def.base_file_name, "about.htm");
        assert!(def.model.is_none());
        assert!(def.locale_enabled.is_empty());
    }
}
