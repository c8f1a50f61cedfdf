//! Media discovery in rendered HTML.
//!
//! Images come from every `<img>` with a non-blank `src`. Videos come from
//! elements whose `itemtype` contains `https://schema.org/VideoObject`; their
//! direct `<meta itemprop content>` children fill a [`VideoAsset`].

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::types::{ImageAsset, MediaPayload, VideoAsset, parse_datetime};

/// Microdata type marking a video block.
pub const VIDEO_OBJECT_TYPE: &str = "https://schema.org/VideoObject";

/// Image payloads for every `<img src>` in `html`, resolved against `page_url`.
pub fn extract_images(html: &str, page_url: &str) -> Vec<MediaPayload> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let Ok(selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(|src| {
            let loc = base
                .as_ref()
                .and_then(|base| base.join(src).ok())
                .map_or_else(|| src.to_string(), String::from);
            MediaPayload::Image(ImageAsset { loc })
        })
        .collect()
}

/// Video payloads for every `VideoObject` microdata block in `html`.
pub fn extract_videos(html: &str) -> Vec<MediaPayload> {
    let document = Html::parse_document(html);

    let Ok(selector) = Selector::parse("[itemtype]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|el| {
            el.value()
                .attr("itemtype")
                .is_some_and(|t| t.contains(VIDEO_OBJECT_TYPE))
        })
        .map(|el| MediaPayload::Video(video_from_block(el)))
        .collect()
}

fn video_from_block(block: ElementRef<'_>) -> VideoAsset {
    let mut video = VideoAsset::default();

    for meta in block
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "meta")
    {
        let (Some(prop), Some(content)) =
            (meta.value().attr("itemprop"), meta.value().attr("content"))
        else {
            continue;
        };
        apply_video_property(&mut video, prop.trim(), content.trim());
    }

    video
}

/// Set the video field matching a microdata property. Unknown properties are ignored.
fn apply_video_property(video: &mut VideoAsset, prop: &str, content: &str) {
    let value = Some(content.to_string());
    match prop {
        "embedUrl" | "playerLoc" => video.player_loc = value,
        "contentUrl" | "contentLoc" => video.content_loc = value,
        "thumbnailUrl" | "thumbnailLoc" => video.thumbnail_loc = value,
        "name" | "title" => video.title = value,
        "description" => video.description = value,
        "uploadDate" | "publicationDate" => video.publication_date = parse_datetime(content),
        _ => {},
    }
}
