//! Content codec
//!
//! Converts the raw source of a local file into the document stored remotely
//! and back. The remote document ends with a hidden block holding the source
//! format and the original bytes (base64), so decoding never has to reverse
//! the rendered HTML:
//!
//! ```text
//! <div style="display:none">inkbridge:v1:markdown:IyBoaQ==</div>
//! ```
//!
//! Base64 output never contains `<`, so the block ends at the first `<` after
//! the marker. Visible content is escaped HTML and always precedes the block,
//! which is why `decode` looks for the last marker.

mod inline_css;
mod markdown;
mod plain;
pub mod themes;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use themes::{available_themes, Theme, ThemeError};

const SOURCE_MARKER: &str = "inkbridge:v1:";
const HIDDEN_OPEN: &str = "<div style=\"display:none\">";
const HIDDEN_CLOSE: &str = "</div>";

const DOCUMENT_HEAD: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
    "<!DOCTYPE en-note SYSTEM \"http://xml.evernote.com/pub/enml2.dtd\">",
    "<en-note>"
);
const DOCUMENT_TAIL: &str = "</en-note>";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Rendered content has no source block")]
    MissingSourceBlock,
    #[error("Unknown source format tag: {0}")]
    UnknownFormat(String),
    #[error("Source block is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Source block is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Format of a note's raw source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Plain,
    Markdown,
}

impl SourceFormat {
    /// `md` is markdown; every other extension is plain text.
    pub fn from_extension(extension: &str) -> Self {
        if extension == "md" {
            Self::Markdown
        } else {
            Self::Plain
        }
    }

    /// Extension used when a note is first written locally
    pub fn extension(self) -> &'static str {
        match self {
            Self::Plain => "txt",
            Self::Markdown => "md",
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Markdown => "markdown",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "plain" => Some(Self::Plain),
            "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Encoder bound to the theme selected at startup
#[derive(Debug, Clone)]
pub struct Codec {
    theme: Theme,
}

impl Codec {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Encode `source` into a complete remote document.
    pub fn encode(&self, source: &str, format: SourceFormat) -> String {
        let body = match format {
            SourceFormat::Markdown => {
                log::debug!("Rendering markdown with theme '{}'", self.theme.name);
                markdown::render(source, &self.theme)
            }
            SourceFormat::Plain => plain::render(source),
        };

        let mut document = String::with_capacity(
            DOCUMENT_HEAD.len() + body.len() + source.len() * 2 + 64,
        );
        document.push_str(DOCUMENT_HEAD);
        document.push_str(&body);
        document.push_str(&source_block(source, format));
        document.push_str(DOCUMENT_TAIL);
        document
    }
}

fn source_block(source: &str, format: SourceFormat) -> String {
    format!(
        "{}{}{}:{}{}",
        HIDDEN_OPEN,
        SOURCE_MARKER,
        format.tag(),
        BASE64.encode(source.as_bytes()),
        HIDDEN_CLOSE
    )
}

/// Recover the raw source and its format from a rendered document.
///
/// Works on the full document or on a bare body.
pub fn decode(rendered: &str) -> Result<(String, SourceFormat), CodecError> {
    let start = rendered
        .rfind(SOURCE_MARKER)
        .ok_or(CodecError::MissingSourceBlock)?;
    let rest = &rendered[start + SOURCE_MARKER.len()..];
    let end = rest.find('<').ok_or(CodecError::MissingSourceBlock)?;

    let (tag, payload) = rest[..end]
        .split_once(':')
        .ok_or(CodecError::MissingSourceBlock)?;
    let format =
        SourceFormat::from_tag(tag).ok_or_else(|| CodecError::UnknownFormat(tag.to_string()))?;

    // Some services re-wrap long text nodes.
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64.decode(payload.as_bytes())?;

    Ok((String::from_utf8(bytes)?, format))
}
