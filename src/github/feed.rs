//! Reading the newest tag out of a repository's Atom tag feed

use crate::core::{RmuError, RmuResult};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Index of the tag in `https://host/owner/repo/releases/tag/<tag>` split on `/`
const TAG_SEGMENT: usize = 7;

/// Tag name of the feed's first (newest) entry
pub fn latest_tag(xml: &str) -> RmuResult<String> {
    let link = first_entry_link(xml)?;
    tag_from_link(&link)
}

/// `href` of the first `<link>` inside the first `<entry>`
pub fn first_entry_link(xml: &str) -> RmuResult<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut in_entry = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"entry" => in_entry = true,
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if in_entry && e.local_name().as_ref() == b"link" =>
            {
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| RmuError::Feed(format!("malformed feed: {}", e)))?;
                    if attr.key.as_ref() == b"href" {
                        let href = attr
                            .unescape_value()
                            .map_err(|e| RmuError::Feed(format!("malformed feed: {}", e)))?;
                        return Ok(href.into_owned());
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"entry" => {
                return Err(RmuError::Feed("newest entry has no link".to_string()));
            }
            Ok(Event::Eof) => return Err(RmuError::Feed("feed has no entries".to_string())),
            Err(e) => return Err(RmuError::Feed(format!("malformed feed: {}", e))),
            _ => {}
        }
    }
}

/// Extract the tag from an entry link
pub fn tag_from_link(link: &str) -> RmuResult<String> {
    match link.split('/').nth(TAG_SEGMENT) {
        Some(tag) if !tag.is_empty() => Ok(tag.to_string()),
        _ => Err(RmuError::Feed(format!("unexpected entry link '{}'", link))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xml:lang="en-US">
  <id>tag:github.com,2008:https://github.com/owner/repo/releases</id>
  <link type="text/html" rel="alternate" href="https://github.com/owner/repo/releases"/>
  <title>Tags from repo</title>
  <entry>
    <id>tag:github.com,2008:Repository/1/v1.2.3</id>
    <updated>2024-05-01T10:00:00Z</updated>
    <link rel="alternate" type="text/html" href="https://github.com/owner/repo/releases/tag/v1.2.3"/>
    <title>v1.2.3</title>
  </entry>
  <entry>
    <id>tag:github.com,2008:Repository/1/v1.2.2</id>
    <link rel="alternate" type="text/html" href="https://github.com/owner/repo/releases/tag/v1.2.2"/>
    <title>v1.2.2</title>
  </entry>
</feed>"#;

    #[test]
    fn test_latest_tag_is_first_entry() {
        assert_eq!(latest_tag(FEED).unwrap(), "v1.2.3");
    }

    #[test]
    fn test_feed_level_link_is_ignored() {
        assert_eq!(
            first_entry_link(FEED).unwrap(),
            "https://github.com/owner/repo/releases/tag/v1.2.3"
        );
    }

    #[test]
    fn test_empty_feed() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Tags</title></feed>"#;
        assert!(matches!(latest_tag(xml), Err(RmuError::Feed(_))));
    }

    #[test]
    fn test_entry_without_link() {
        let xml = r#"<feed><entry><title>v1</title></entry></feed>"#;
        assert!(matches!(latest_tag(xml), Err(RmuError::Feed(_))));
    }

    #[test]
    fn test_malformed_feed() {
        assert!(matches!(
            latest_tag("<feed><entry></feed>"),
            Err(RmuError::Feed(_))
        ));
    }

    #[test]
    fn test_tag_from_short_link() {
        assert!(tag_from_link("https://github.com/owner/repo").is_err());
        assert!(tag_from_link("https://github.com/owner/repo/releases/tag/").is_err());
    }
}
