//! URL pattern building and parameter substitution.
//!
//! A page's route template such as `/blog/:category/:slug?` is first turned
//! into an absolute pattern (base URL + site route prefix), then filled with
//! values taken from a model record:
//!
//! ```rust
//! use seomap_core::url_pattern::fill;
//!
//! let params = vec![
//!     ("category".to_string(), "news".to_string()),
//!     ("slug".to_string(), String::new()),
//! ];
//! assert_eq!(fill("https://example.com/:category/:slug?", &params), "https://example.com/news");
//! ```
//!
//! Route parameters may carry a regex constraint (`/:id|^[0-9]+$`); the
//! constraint is dropped along with the placeholder.

use crate::types::{ModelRecord, PageDefinition, SiteDefinition};
use crate::{Error, Result};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Segment value used for required parameters that could not be resolved.
pub const DEFAULT_SEGMENT: &str = "default";

/// Route parameter placeholder: `/:name`, `/:name?`, optionally followed by `|constraint`.
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/:([^/?|]+)(\?)?(?:\|[^/]*)?").unwrap());

/// Build the absolute URL pattern of `page` for `site`.
///
/// The localized route override for the site's locale wins over the raw
/// route. A raw route of exactly `/` keeps its trailing slash.
pub fn build_pattern(page: &PageDefinition, site: &SiteDefinition, base_url: &str) -> String {
    let restore_slash = page.url == "/";

    let route = page.url_for(site).trim_start_matches('/');
    let prefixed = site.attach_route_prefix(route);

    let mut pattern = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        prefixed.trim_start_matches('/')
    );

    if restore_slash && !pattern.ends_with('/') {
        pattern.push('/');
    }

    pattern
}

/// Turn a `urlParam:modelField|...` definition into ordered `(param, value)` pairs.
///
/// `modelField` is either a direct attribute or a `relation.attribute`
/// path, which reads the first related record and falls back to `default`
/// when there is none or the attribute is empty.
pub fn parse_param_definitions(def: &str, record: &ModelRecord) -> Result<Vec<(String, String)>> {
    let mut params = Vec::new();

    for token in def.split('|').map(str::trim).filter(|t| !t.is_empty()) {
        let (url_param, field) = token
            .split_once(':')
            .map(|(p, f)| (p.trim(), f.trim()))
            .filter(|(p, _)| !p.is_empty())
            .ok_or_else(|| Error::MalformedParamDefinition(token.to_string()))?;

        let value = if field.contains('.') {
            let segments: Vec<&str> = field.split('.').collect();
            let [relation, attribute] = segments.as_slice() else {
                return Err(Error::MalformedParamDefinition(token.to_string()));
            };
            if relation.is_empty() || attribute.is_empty() {
                return Err(Error::MalformedParamDefinition(token.to_string()));
            }

            record
                .first_related(relation)
                .map(|related| related.attribute(attribute))
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_SEGMENT.to_string())
        } else {
            record.attribute(field)
        };

        params.push((url_param.to_string(), value));
    }

    Ok(params)
}

/// Substitute `params` into `pattern`, in order.
///
/// Empty values remove optional placeholders and turn required ones into
/// `default`. Placeholders left over afterwards are treated the same way.
pub fn fill(pattern: &str, params: &[(String, String)]) -> String {
    let mut url = pattern.to_string();

    for (name, value) in params {
        url = PARAM_RE
            .replace_all(&url, |caps: &Captures<'_>| {
                if !caps[1].eq_ignore_ascii_case(name) {
                    return caps[0].to_string();
                }
                if !value.is_empty() {
                    return format!("/{value}");
                }
                unresolved(caps)
            })
            .into_owned();
    }

    PARAM_RE.replace_all(&url, unresolved).into_owned()
}

fn unresolved(caps: &Captures<'_>) -> String {
    if caps.get(2).is_some() {
        String::new()
    } else {
        format!("/{DEFAULT_SEGMENT}")
    }
}

/// Resolve a concrete location for one model record.
pub fn resolve(pattern: &str, param_defs: &str, record: &ModelRecord) -> Result<String> {
    let params = parse_param_definitions(param_defs, record)?;
    Ok(fill(pattern, &params))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_optional_trailing_param() {
        assert_eq!(
            fill("/:category/:slug?", &pairs(&[("category", "news"), ("slug", "")])),
            "/news"
        );
        assert_eq!(
            fill("/:category/:slug?", &pairs(&[("category", "news"), ("slug", "hi")])),
            "/news/hi"
        );
    }

    #[test]
    fn test_mid_path_params() {
        let pattern = "https://example.com/:lang?/blog/:slug/comments";

        assert_eq!(
            fill(pattern, &pairs(&[("lang", "en"), ("slug", "post")])),
            "https://example.com/en/blog/post/comments"
        );
        assert_eq!(
            fill(pattern, &pairs(&[("lang", ""), ("slug", "post")])),
            "https://example.com/blog/post/comments"
        );
    }

    #[test]
    fn test_required_empty_becomes_default() {
        assert_eq!(fill("/shop/:id", &pairs(&[("id", "")])), "/shop/default");
        assert_eq!(fill("/shop/:id/x", &pairs(&[("id", "")])), "/shop/default/x");
    }

    #[test]
    fn test_unresolved_leftovers() {
        // Given: A pattern whose parameters are not provided
        let pattern = "https://example.com/blog/:category/:page?";

        // When: Filling with no params
        let url = fill(pattern, &[]);

        // Then: Optional segments vanish and required ones become default
        assert_eq!(url, "https://example.com/blog/default");
    }

    #[test]
    fn test_param_names_are_whole_segments() {
        assert_eq!(
            fill("/:slug/:slugger", &pairs(&[("slug", "a"), ("slugger", "b")])),
            "/a/b"
        );
        assert_eq!(fill("/:SLUG", &pairs(&[("slug", "a")])), "/a");
    }

    #[test]
    fn test_constraints_are_stripped() {
        assert_eq!(
            fill("/post/:id|^[0-9]+$/:slug?", &pairs(&[("id", "12")])),
            "/post/12"
        );
        assert_eq!(fill("/post/:id?|^[0-9]+$", &[]), "/post");
    }

    #[test]
    fn test_substitution_is_sequential() {
        // A value that itself looks like a placeholder is visible to later params.
        assert_eq!(
            fill("/:a", &pairs(&[("a", ":b"), ("b", "x")])),
            "/x"
        );
    }

    #[test]
    fn test_build_pattern_with_prefix_and_root() {
        let mut site = SiteDefinition::new("pl");
        site.route_prefix = Some("pl".to_string());

        let home = PageDefinition::new("home", "/");
        assert_eq!(build_pattern(&home, &site, "https://example.com/"), "https://example.com/pl/");
        assert_eq!(
            build_pattern(&home, &SiteDefinition::new("en"), "https://example.com"),
            "https://example.com/"
        );

        let blog = PageDefinition::new("blog", "/blog/:slug?");
        assert_eq!(
            build_pattern(&blog, &site, "https://example.com"),
            "https://example.com/pl/blog/:slug?"
        );
    }

    #[test]
    fn test_build_pattern_uses_localized_url() {
        let mut site = SiteDefinition::new("pl");
        site.locale = Some("pl".to_string());

        let mut page = PageDefinition::new("blog", "/blog/:slug");
        page.locale_urls.insert("pl".to_string(), "/wpisy/:slug".to_string());

        assert_eq!(
            build_pattern(&page, &site, "http://localhost"),
            "http://localhost/wpisy/:slug"
        );
    }

    #[test]
    fn test_parse_param_definitions() {
        let category = ModelRecord::default().with_attribute("slug", "rust");
        let mut record = ModelRecord::default().with_attribute("slug", "hello");
        record
            .relations
            .insert("categories".to_string(), vec![category]);

        let params =
            parse_param_definitions("slug:slug|category:categories.slug", &record).unwrap();
        assert_eq!(params, pairs(&[("slug", "hello"), ("category", "rust")]));
    }

    #[test]
    fn test_relation_fallback_to_default() {
        let record = ModelRecord::default().with_attribute("slug", "hello");

        let params = parse_param_definitions("category:categories.slug", &record).unwrap();
        assert_eq!(params, pairs(&[("category", "default")]));

        let mut with_blank = record;
        with_blank.relations.insert(
            "categories".to_string(),
            vec![ModelRecord::default().with_attribute("slug", "")],
        );
        let params = parse_param_definitions("category:categories.slug", &with_blank).unwrap();
        assert_eq!(params, pairs(&[("category", "default")]));
    }

    #[test]
    fn test_malformed_definitions() {
        let record = ModelRecord::default();

        for def in ["slug", "slug:a.b.c", ":slug", "slug:.", "slug:categories."] {
            let result = parse_param_definitions(def, &record);
            assert!(
                matches!(result, Err(Error::MalformedParamDefinition(_))),
                "expected malformed for {def:?}, got {result:?}"
            );
        }

        assert!(parse_param_definitions("", &record).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_end_to_end() {
        let record = ModelRecord::default()
            .with_attribute("slug", "first-post")
            .with_attribute("id", 3);

        let url = resolve(
            "https://example.com/blog/:id/:slug?",
            "id:id|slug:slug",
            &record,
        )
        .unwrap();
        assert_eq!(url, "https://example.com/blog/3/first-post");
    }

    proptest! {
        #[test]
        fn test_resolve_is_deterministic(
            slug in "[a-z0-9-]{0,12}",
            category in "[a-z]{0,8}",
            optional in any::<bool>(),
        ) {
            let record = ModelRecord::default()
                .with_attribute("slug", slug.as_str())
                .with_attribute("category", category.as_str());
            let pattern = if optional {
                "https://example.com/:category/:slug?"
            } else {
                "https://example.com/:category/:slug"
            };

            let first = resolve(pattern, "category:category|slug:slug", &record).unwrap();
            let second = resolve(pattern, "category:category|slug:slug", &record).unwrap();

            prop_assert_eq!(&first, &second);
            prop_assert!(!first.contains("/:"));
        }
    }
}
