//! Video sitemap (`sitemap_videos.xml`).

use super::{SitemapWriter, VIDEO_NS, format_datetime};
use crate::Result;
use crate::types::{MediaAsset, MediaPayload, SitemapItem, VideoAsset};

/// Serialize items with their video assets.
///
/// Only items with at least one video get a `<url>` entry. Absent video
/// fields are left out of the block.
pub fn render(entries: &[(SitemapItem, Vec<MediaAsset>)]) -> Result<String> {
    let mut doc = SitemapWriter::urlset(&[("xmlns:video", VIDEO_NS)])?;

    for (item, assets) in entries {
        let videos: Vec<&VideoAsset> = assets
            .iter()
            .filter_map(|asset| match &asset.payload {
                MediaPayload::Video(video) => Some(video),
                MediaPayload::Image(_) => None,
            })
            .collect();
        if videos.is_empty() {
            continue;
        }

        doc.url(item, |doc| {
            for video in &videos {
                write_video(doc, video)?;
            }
            Ok(())
        })?;
    }

    doc.finish()
}

fn write_video(doc: &mut SitemapWriter, video: &VideoAsset) -> Result<()> {
    doc.open("video:video")?;
    doc.optional_element("video:thumbnail_loc", video.thumbnail_loc.as_deref())?;
    doc.optional_element("video:title", video.title.as_deref())?;
    doc.optional_element("video:description", video.description.as_deref())?;
    doc.optional_element("video:content_loc", video.content_loc.as_deref())?;
    doc.optional_element("video:player_loc", video.player_loc.as_deref())?;
    let published = video.publication_date.as_ref().map(format_datetime);
    doc.optional_element("video:publication_date", published.as_deref())?;
    doc.close("video:video")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::xml::test_support::{count_of, root_attribute, texts_of};
    use chrono::{TimeZone, Utc};

    fn item(loc: &str) -> SitemapItem {
        SitemapItem {
            id: 1,
            site_id: "en".to_string(),
            base_file_name: "video.htm".to_string(),
            loc: loc.to_string(),
            lastmod: None,
            changefreq: None,
            priority: None,
            enabled: true,
        }
    }

    #[test]
    fn test_renders_present_fields_only() {
        let video = VideoAsset {
            title: Some("Launch".to_string()),
            thumbnail_loc: Some("https://e.com/t.jpg".to_string()),
            player_loc: Some("https://player.e.com/1".to_string()),
            publication_date: Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()),
            ..VideoAsset::default()
        };
        let entries = vec![(
            item("https://e.com/launch"),
            vec![MediaAsset {
                id: 7,
                payload: MediaPayload::Video(video),
            }],
        )];

        let xml = render(&entries).unwrap();

        assert_eq!(root_attribute(&xml, "xmlns:video").as_deref(), Some(VIDEO_NS));
        assert_eq!(count_of(&xml, "video:video"), 1);
        assert_eq!(texts_of(&xml, "video:title"), vec!["Launch"]);
        assert_eq!(texts_of(&xml, "video:thumbnail_loc"), vec!["https://e.com/t.jpg"]);
        assert_eq!(texts_of(&xml, "video:player_loc"), vec!["https://player.e.com/1"]);
        assert_eq!(
            texts_of(&xml, "video:publication_date"),
            vec!["2024-03-01T10:00:00+00:00"]
        );
        assert_eq!(count_of(&xml, "video:description"), 0);
        assert_eq!(count_of(&xml, "video:content_loc"), 0);
    }

    #[test]
    fn test_items_without_videos_are_skipped() {
        let entries = vec![(
            item("https://e.com/a"),
            vec![MediaAsset {
                id: 1,
                payload: MediaPayload::image("https://e.com/a.png"),
            }],
        )];

        let xml = render(&entries).unwrap();
        assert_eq!(count_of(&xml, "url"), 0);
    }
}
