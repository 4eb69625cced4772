//! Telegram HTML export parsing.
//!
//! Exports consist of a `page_header` block naming the chat owner, followed by
//! `div.message` nodes. Service nodes (joins, pins, date separators) carry the
//! `service` class and are skipped. Regular nodes hold an optional `from_name`
//! element, a `text` element and a `date` element whose `title` attribute holds
//! the full timestamp.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Author used when a message node has no sender element.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Messages shorter than this (in whitespace tokens) carry no style signal.
pub const MIN_WORDS_PER_MESSAGE: usize = 3;

static HEADER_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.page_header .text").expect("valid header selector"));
static MESSAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".message").expect("valid message selector"));
static FROM_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".from_name").expect("valid sender selector"));
static TEXT: Lazy<Selector> = Lazy::new(|| Selector::parse(".text").expect("valid text selector"));
static DATE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".date[title]").expect("valid date selector"));

/// A single message attributed to one author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub author: String,
    pub text: String,
    pub timestamp: Option<NaiveDateTime>,
}

impl Message {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            timestamp: None,
        }
    }

    /// Whether the author can seed a reusable style profile.
    pub fn is_attributable(&self) -> bool {
        !self.author.is_empty() && self.author != UNKNOWN_AUTHOR
    }
}

/// Result of parsing one export document.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Owner name used for attribution (explicit or from the page header).
    pub owner: Option<String>,
    /// Texts written by the owner, in document order.
    pub owner_messages: Vec<String>,
    /// Every non-service message, including `Unknown` authored ones.
    pub messages: Vec<Message>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.owner_messages.is_empty() && self.messages.is_empty()
    }

    /// Distinct attributable authors, sorted by name.
    pub fn participants(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.is_attributable())
            .map(|m| m.author.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Texts of one attributable author, in document order.
    pub fn messages_of(&self, author: &str) -> Vec<String> {
        if author == UNKNOWN_AUTHOR {
            return Vec::new();
        }
        self.messages
            .iter()
            .filter(|m| m.author == author)
            .map(|m| m.text.clone())
            .collect()
    }

    /// Like [`Extraction::messages_of`], keeping messages of at least
    /// [`MIN_WORDS_PER_MESSAGE`] words.
    pub fn style_samples_of(&self, author: &str) -> Vec<String> {
        self.messages_of(author)
            .into_iter()
            .filter(|text| text.split_whitespace().count() >= MIN_WORDS_PER_MESSAGE)
            .collect()
    }
}

/// Parse an export. `owner` overrides the name found in the page header.
///
/// HTML parsing itself is lenient; documents without message nodes simply
/// produce an empty extraction.
pub fn extract(html: &str, owner: Option<&str>) -> Extraction {
    let document = Html::parse_document(html);

    let owner = owner
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .or_else(|| {
            document
                .select(&HEADER_NAME)
                .next()
                .map(|el| element_text(&el))
                .filter(|name| !name.is_empty())
        });

    let mut extraction = Extraction {
        owner: owner.clone(),
        ..Default::default()
    };

    for node in document.select(&MESSAGE) {
        if node.value().classes().any(|c| c == "service") {
            continue;
        }

        let author = node
            .select(&FROM_NAME)
            .next()
            .map(|el| element_text(&el))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        let Some(text_node) = node.select(&TEXT).next() else {
            continue;
        };
        let text = html_escape::decode_html_entities(&element_text(&text_node))
            .trim()
            .to_string();
        if text.is_empty() {
            continue;
        }

        if owner.as_deref() == Some(author.as_str()) {
            extraction.owner_messages.push(text.clone());
        }

        let timestamp = node
            .select(&DATE)
            .next()
            .and_then(|el| el.value().attr("title"))
            .and_then(parse_export_timestamp);

        extraction.messages.push(Message {
            author,
            text,
            timestamp,
        });
    }

    debug!(
        owner = ?extraction.owner,
        owner_messages = extraction.owner_messages.len(),
        messages = extraction.messages.len(),
        "Transcript extracted"
    );
    extraction
}

/// Parse raw export bytes, surfacing undecodable input as [`Error::Parse`].
pub fn try_extract_bytes(bytes: &[u8], owner: Option<&str>) -> Result<Extraction> {
    let html = std::str::from_utf8(bytes)
        .map_err(|e| Error::Parse(format!("export is not valid UTF-8: {}", e)))?;
    Ok(extract(html, owner))
}

/// Parse raw export bytes, degrading any failure to an empty extraction.
pub fn extract_bytes(bytes: &[u8], owner: Option<&str>) -> Extraction {
    try_extract_bytes(bytes, owner).unwrap_or_else(|err| {
        warn!("Failed to parse export: {}", err);
        Extraction::default()
    })
}

/// Texts of `author` that are long enough to carry style signal.
pub fn messages_by_author(html: &str, author: &str) -> Vec<String> {
    extract(html, None).style_samples_of(author)
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Export titles look like `12.03.2024 14:22:11 UTC+03:00`; the offset is dropped.
fn parse_export_timestamp(title: &str) -> Option<NaiveDateTime> {
    let mut parts = title.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%d.%m.%Y %H:%M:%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"<!DOCTYPE html>
<html><body>
<div class="page_wrap">
 <div class="page_header"><div class="content"><div class="text bold">Alice</div></div></div>
 <div class="history">
  <div class="message service" id="message-1"><div class="body details">Alice joined</div></div>
  <div class="message default clearfix" id="message1">
   <div class="body">
    <div class="pull_right date details" title="12.03.2024 14:22:11 UTC+03:00">14:22</div>
    <div class="from_name">Bob</div>
    <div class="text">привет, как дела у тебя</div>
   </div>
  </div>
  <div class="message default clearfix" id="message2">
   <div class="body">
    <div class="from_name"> Alice </div>
    <div class="text">  норм &amp; ты?  </div>
   </div>
  </div>
  <div class="message default clearfix joined" id="message3">
   <div class="body"><div class="text">сообщение без автора тут</div></div>
  </div>
  <div class="message default clearfix" id="message4">
   <div class="body"><div class="from_name">Bob</div><div class="text">   </div></div>
  </div>
  <div class="message default clearfix" id="message5">
   <div class="body"><div class="from_name">Bob</div><div class="media_wrap">photo</div></div>
  </div>
  <div class="message default clearfix" id="message6">
   <div class="body"><div class="from_name">Bob</div><div class="text">да</div></div>
  </div>
 </div>
</div>
</body></html>"#;

    #[test]
    fn extracts_owner_and_all_messages() {
        let extraction = extract(EXPORT, None);

        assert_eq!(extraction.owner.as_deref(), Some("Alice"));
        assert_eq!(extraction.owner_messages, vec!["норм & ты?".to_string()]);
        assert_eq!(extraction.messages.len(), 4);
        assert_eq!(extraction.messages[0].author, "Bob");
        assert_eq!(extraction.messages[2].author, UNKNOWN_AUTHOR);
    }

    #[test]
    fn explicit_owner_overrides_header() {
        let extraction = extract(EXPORT, Some("Bob"));
        assert_eq!(extraction.owner.as_deref(), Some("Bob"));
        assert_eq!(extraction.owner_messages.len(), 2);
    }

    #[test]
    fn unknown_author_is_never_a_participant() {
        let extraction = extract(EXPORT, None);
        assert_eq!(extraction.participants(), vec!["Alice", "Bob"]);
        assert!(extraction.messages_of(UNKNOWN_AUTHOR).is_empty());
    }

    #[test]
    fn parses_date_title() {
        let extraction = extract(EXPORT, None);
        let ts = extraction.messages[0].timestamp.expect("timestamp");
        assert_eq!(ts.to_string(), "2024-03-12 14:22:11");
        assert!(extraction.messages[1].timestamp.is_none());
    }

    #[test]
    fn messages_by_author_drops_short_messages() {
        let bob = messages_by_author(EXPORT, "Bob");
        assert_eq!(bob, vec!["привет, как дела у тебя".to_string()]);
    }

    #[test]
    fn garbage_input_yields_empty_extraction() {
        let extraction = extract("this is not an export at all", None);
        assert!(extraction.is_empty());
        assert!(extraction.participants().is_empty());
    }

    #[test]
    fn invalid_utf8_is_parse_error_or_empty() {
        let bytes = [0xff, 0xfe, 0x00, 0x41];
        assert!(matches!(
            try_extract_bytes(&bytes, None),
            Err(Error::Parse(_))
        ));
        assert!(extract_bytes(&bytes, None).is_empty());
    }

    #[test]
    fn timestamp_parser_rejects_malformed_titles() {
        assert!(parse_export_timestamp("yesterday").is_none());
        assert!(parse_export_timestamp("32.13.2024 25:00:00").is_none());
    }
}
