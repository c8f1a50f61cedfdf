//! Sitemap index (`sitemap_index.xml`).

use super::SitemapWriter;
use crate::Result;

/// Serialize a `<sitemapindex>` pointing at each of `locs`.
pub fn render(locs: &[String]) -> Result<String> {
    let mut doc = SitemapWriter::sitemap_index()?;
    for loc in locs {
        doc.open("sitemap")?;
        doc.text_element("loc", loc)?;
        doc.close("sitemap")?;
    }
    doc.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::xml::test_support::{count_of, texts_of};

    #[test]
    fn test_lists_child_sitemaps() {
        let locs = vec![
            "https://e.com/sitemap.xml".to_string(),
            "https://e.com/sitemap_images.xml".to_string(),
        ];

        let xml = render(&locs).unwrap();

        assert_eq!(count_of(&xml, "sitemapindex"), 1);
        assert_eq!(count_of(&xml, "sitemap"), 2);
        assert_eq!(texts_of(&xml, "loc"), locs);
    }
}
