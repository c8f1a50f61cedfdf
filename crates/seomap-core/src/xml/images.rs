//! Image sitemap (`sitemap_images.xml`).

use super::{IMAGE_NS, SitemapWriter};
use crate::Result;
use crate::types::{MediaAsset, MediaPayload, SitemapItem};

/// Serialize items with their image assets.
///
/// Only items with at least one image get a `<url>` entry. Each image
/// becomes one `<image:image><image:loc>` block.
pub fn render(entries: &[(SitemapItem, Vec<MediaAsset>)]) -> Result<String> {
    let mut doc = SitemapWriter::urlset(&[("xmlns:image", IMAGE_NS)])?;

    for (item, assets) in entries {
        let images: Vec<&str> = assets
            .iter()
            .filter_map(|asset| match &asset.payload {
                MediaPayload::Image(image) => Some(image.loc.as_str()),
                MediaPayload::Video(_) => None,
            })
            .collect();
        if images.is_empty() {
            continue;
        }

        doc.url(item, |doc| {
            for loc in &images {
                doc.open("image:image")?;
                doc.text_element("image:loc", loc)?;
                doc.close("image:image")?;
            }
            Ok(())
        })?;
    }

    doc.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::xml::test_support::{count_of, root_attribute, texts_of};

    fn item(id: u64, loc: &str) -> SitemapItem {
        SitemapItem {
            id,
            site_id: "en".to_string(),
            base_file_name: "blog.htm".to_string(),
            loc: loc.to_string(),
            lastmod: None,
            changefreq: None,
            priority: None,
            enabled: true,
        }
    }

    fn image(id: u64, loc: &str) -> MediaAsset {
        MediaAsset {
            id,
            payload: MediaPayload::image(loc),
        }
    }

    #[test]
    fn test_one_block_per_image() {
        let entries = vec![
            (item(1, "https://e.com/a"), vec![image(1, "https://e.com/a.png")]),
            (item(2, "https://e.com/empty"), vec![]),
            (
                item(3, "https://e.com/b"),
                vec![image(2, "https://e.com/b1.png"), image(3, "https://e.com/b2.png")],
            ),
        ];

        let xml = render(&entries).unwrap();

        assert_eq!(root_attribute(&xml, "xmlns:image").as_deref(), Some(IMAGE_NS));
        assert_eq!(texts_of(&xml, "loc"), vec!["https://e.com/a", "https://e.com/b"]);
        assert_eq!(count_of(&xml, "image:image"), 3);
        assert_eq!(
            texts_of(&xml, "image:loc"),
            vec!["https://e.com/a.png", "https://e.com/b1.png", "https://e.com/b2.png"]
        );
    }

    #[test]
    fn test_item_without_images_yields_no_block() {
        let xml = render(&[(item(1, "https://e.com/a"), vec![])]).unwrap();
        assert_eq!(count_of(&xml, "url"), 0);
        assert_eq!(count_of(&xml, "image:image"), 0);
    }
}
