//! The fully resolved set of transform parameters for one request.

use std::fmt;
use std::str::FromStr;

use url::Url;

/// Which entry flow a request arrived through. Fetch requests retrieve the
/// source image from the origin; direct requests carry the image in their
/// own body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Fetch,
    Direct,
}

/// URL scheme used to reach the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(format!("unsupported scheme `{other}`")),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target encoding requested via the `fmt` query argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Tiff,
}

impl OutputFormat {
    /// Map a `fmt` query value onto a format. Case-insensitive; `jpg` and
    /// `jpeg` are the same format.
    pub fn from_query(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::Webp),
            "tiff" => Some(OutputFormat::Tiff),
            _ => None,
        }
    }
}

/// The transform parameters derived from one inbound request.
///
/// Built once by the directive parser and immutable afterwards. A width or
/// height of `0` means "unspecified" — the corresponding dimension is derived
/// from the source aspect ratio, or the image is not resized at all when both
/// are unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformDirective {
    /// Fully reconstructed origin URL. Always present with a non-empty host
    /// on the fetch flow; on the direct-body flow it exists only for log
    /// lines and may be `None` when no source header was sent.
    pub source_url: Option<Url>,

    /// Target width in pixels, `0` = unspecified.
    pub width: u32,

    /// Target height in pixels, `0` = unspecified.
    pub height: u32,

    /// Encoder quality, 0–100. Applied where the target format supports it.
    pub quality: u8,

    /// Encoder compression level, 0–9. Applied where the target format
    /// supports it.
    pub compression: u8,

    /// Requested output encoding; `None` preserves the source encoding.
    pub format: Option<OutputFormat>,
}

impl TransformDirective {
    /// Human-readable source for log lines; the direct-body flow may not
    /// carry a source URL.
    pub fn source_display(&self) -> &str {
        self.source_url
            .as_ref()
            .map(Url::as_str)
            .unwrap_or("<request body>")
    }
}
