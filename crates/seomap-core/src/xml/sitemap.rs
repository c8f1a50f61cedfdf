//! Plain `sitemap.xml`.

use super::SitemapWriter;
use crate::Result;
use crate::types::SitemapItem;

/// Serialize `items` as a plain urlset.
pub fn render(items: &[SitemapItem]) -> Result<String> {
    let mut doc = SitemapWriter::urlset(&[])?;
    for item in items {
        doc.url(item, |_| Ok(()))?;
    }
    doc.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::types::ChangeFrequency;
    use crate::xml::test_support::{count_of, texts_of};
    use chrono::{TimeZone, Utc};

    fn item(loc: &str) -> SitemapItem {
        SitemapItem {
            id: 1,
            site_id: "en".to_string(),
            base_file_name: "home.htm".to_string(),
            loc: loc.to_string(),
            lastmod: None,
            changefreq: None,
            priority: None,
            enabled: true,
        }
    }

    #[test]
    fn test_renders_all_fields() {
        let mut full = item("https://e.com/");
        full.lastmod = Some(Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap());
        full.changefreq = Some(ChangeFrequency::Weekly);
        full.priority = Some(0.8);

        let xml = render(&[full, item("https://e.com/about")]).unwrap();

        assert_eq!(count_of(&xml, "url"), 2);
        assert_eq!(texts_of(&xml, "loc"), vec!["https://e.com/", "https://e.com/about"]);
        assert_eq!(texts_of(&xml, "lastmod"), vec!["2024-01-15T08:00:00+00:00"]);
        assert_eq!(texts_of(&xml, "changefreq"), vec!["weekly"]);
        assert_eq!(texts_of(&xml, "priority"), vec!["0.8"]);
    }

    #[test]
    fn test_empty_urlset() {
        let xml = render(&[]).unwrap();
        assert_eq!(count_of(&xml, "urlset"), 1);
        assert_eq!(count_of(&xml, "url"), 0);
    }
}
