//! Sitemap protocol serializers.
//!
//! Every variant builds a fresh document per call: an XML declaration, a
//! `<urlset>` (or `<sitemapindex>`) root carrying the sitemap namespace and
//! schema location, and one `<url>` per item. Nothing is cached between calls.
//!
//! - [`sitemap::render`] - plain `loc`/`lastmod`/`changefreq`/`priority`
//! - [`images::render`] - adds `<image:image>` blocks
//! - [`videos::render`] - adds `<video:video>` blocks
//! - [`index::render`] - `<sitemapindex>` linking the other documents

pub mod images;
pub mod index;
pub mod sitemap;
pub mod videos;

use std::io::Cursor;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::types::SitemapItem;
use crate::{Error, Result};

/// Sitemap protocol namespace.
pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
/// XML Schema instance namespace.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// Value of `xsi:schemaLocation` on every root element.
pub const SCHEMA_LOCATION: &str = "http://www.sitemaps.org/schemas/sitemap/0.9 http://www.sitemaps.org/schemas/sitemap/0.9/sitemap.xsd";
/// Google image sitemap extension namespace.
pub const IMAGE_NS: &str = "http://www.google.com/schemas/sitemap-image/1.1";
/// Google video sitemap extension namespace.
pub const VIDEO_NS: &str = "http://www.google.com/schemas/sitemap-video/1.1";

/// W3C datetime with offset, e.g. `2024-03-01T10:00:00+00:00`.
const W3C_DATETIME: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Format a timestamp the way sitemap consumers expect.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.format(W3C_DATETIME).to_string()
}

fn xml_error(err: impl std::fmt::Display) -> Error {
    Error::Serialization(format!("Failed to write sitemap XML: {err}"))
}

/// Shared document builder for every sitemap variant.
pub(crate) struct SitemapWriter {
    writer: Writer<Cursor<Vec<u8>>>,
    root: &'static str,
}

impl SitemapWriter {
    /// Start a `<urlset>` document declaring `extra_ns` besides the defaults.
    pub(crate) fn urlset(extra_ns: &[(&str, &str)]) -> Result<Self> {
        Self::start("urlset", extra_ns)
    }

    /// Start a `<sitemapindex>` document.
    pub(crate) fn sitemap_index() -> Result<Self> {
        Self::start("sitemapindex", &[])
    }

    fn start(root: &'static str, extra_ns: &[(&str, &str)]) -> Result<Self> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;

        let root_start = BytesStart::new(root)
            .with_attributes([
                ("xmlns", SITEMAP_NS),
                ("xmlns:xsi", XSI_NS),
                ("xsi:schemaLocation", SCHEMA_LOCATION),
            ])
            .with_attributes(extra_ns.iter().copied());
        writer
            .write_event(Event::Start(root_start))
            .map_err(xml_error)?;

        Ok(Self { writer, root })
    }

    /// Open an element.
    pub(crate) fn open(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_error)
    }

    /// Close an element.
    pub(crate) fn close(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    /// Write `<name>text</name>`, escaping `text`.
    pub(crate) fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.open(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)?;
        self.close(name)
    }

    /// Write `<name>text</name>` only when `text` is present.
    pub(crate) fn optional_element(&mut self, name: &str, text: Option<&str>) -> Result<()> {
        match text {
            Some(text) => self.text_element(name, text),
            None => Ok(()),
        }
    }

    /// Write one `<url>` entry; `extra` appends variant-specific children.
    pub(crate) fn url(
        &mut self,
        item: &SitemapItem,
        extra: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.open("url")?;
        self.text_element("loc", &item.loc)?;
        if let Some(lastmod) = &item.lastmod {
            self.text_element("lastmod", &format_datetime(lastmod))?;
        }
        if let Some(changefreq) = item.changefreq {
            self.text_element("changefreq", changefreq.as_str())?;
        }
        if let Some(priority) = item.priority {
            self.text_element("priority", &priority.to_string())?;
        }
        extra(self)?;
        self.close("url")
    }

    /// Close the root and return the document.
    pub(crate) fn finish(mut self) -> Result<String> {
        self.close(self.root)?;
        let bytes = self.writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(xml_error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
pub(crate) mod test_support {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    /// Text of every element named `name`, in document order.
    pub fn texts_of(xml: &str, name: &str) -> Vec<String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut texts = Vec::new();
        let mut inside = false;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) => inside = e.name().as_ref() == name.as_bytes(),
                Event::Text(t) if inside => texts.push(t.unescape().unwrap().into_owned()),
                Event::End(_) => inside = false,
                Event::Eof => break,
                _ => {},
            }
        }
        texts
    }

    /// Number of start tags named `name`.
    pub fn count_of(xml: &str, name: &str) -> usize {
        let mut reader = Reader::from_str(xml);
        let mut count = 0;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) if e.name().as_ref() == name.as_bytes() => count += 1,
                Event::Eof => break,
                _ => {},
            }
        }
        count
    }

    /// Value of attribute `attr` on the root element.
    pub fn root_attribute(xml: &str, attr: &str) -> Option<String> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) => {
                    return e
                        .try_get_attribute(attr)
                        .unwrap()
                        .map(|a| a.unescape_value().unwrap().into_owned());
                },
                Event::Eof => return None,
                _ => {},
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::test_support::*;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_datetime() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap();
        assert_eq!(format_datetime(&ts), "2024-03-01T10:05:00+00:00");
    }

    #[test]
    fn test_root_declares_namespaces() {
        let xml = SitemapWriter::urlset(&[("xmlns:image", IMAGE_NS)])
            .unwrap()
            .finish()
            .unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert_eq!(root_attribute(&xml, "xmlns").as_deref(), Some(SITEMAP_NS));
        assert_eq!(root_attribute(&xml, "xmlns:xsi").as_deref(), Some(XSI_NS));
        assert_eq!(
            root_attribute(&xml, "xsi:schemaLocation").as_deref(),
            Some(SCHEMA_LOCATION)
        );
        assert_eq!(root_attribute(&xml, "xmlns:image").as_deref(), Some(IMAGE_NS));
    }

    #[test]
    fn test_text_is_escaped() {
        let mut doc = SitemapWriter::urlset(&[]).unwrap();
        doc.text_element("loc", "https://e.com/?a=1&b=<2>").unwrap();
        let xml = doc.finish().unwrap();

        assert!(xml.contains("a=1&amp;b=&lt;2&gt;"));
        assert_eq!(texts_of(&xml, "loc"), vec!["https://e.com/?a=1&b=<2>"]);
    }
}
