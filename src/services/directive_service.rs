//! src/services/directive_service.rs
//!
//! DirectiveService — derives a [`TransformDirective`] from the raw pieces of
//! an inbound request (path, query string, headers). Performs no I/O; a
//! request that fails here never reaches the network.
//!
//! Resolution precedence per field: query argument over header over
//! configured default. Any present-but-invalid value aborts the whole
//! request; no partial directive is ever used.

use crate::config::AppConfig;
use crate::models::directive::{Flow, OutputFormat, Scheme, TransformDirective};
use axum::http::{HeaderMap, Uri};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use url::Url;
use url::form_urlencoded;

/// Header naming the origin host the source image lives on.
pub const HEADER_SOURCE: &str = "x-resize-source";
/// Header selecting the origin scheme (`http` or `https`).
pub const HEADER_SCHEME: &str = "x-resize-scheme";
/// Header carrying the encoder quality, overridden by the `qlt` query arg.
pub const HEADER_QUALITY: &str = "x-resize-quality";
/// Header carrying the compression level, overridden by the `cmp` query arg.
pub const HEADER_COMPRESSION: &str = "x-resize-compression";

/// Query arguments consumed by the proxy and stripped from the upstream URL.
const RESERVED_ARGS: [&str; 3] = ["qlt", "cmp", "fmt"];

/// Character separating the resize segment from the resource path.
const RESIZE_SEPARATOR: char = '@';

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing `{}` header on fetch request", HEADER_SOURCE)]
    MissingSourceHost,
    #[error("invalid `{scheme}` header value `{0}`", scheme = HEADER_SCHEME)]
    InvalidScheme(String),
    #[error("invalid quality value `{value}` in {origin}, expected 0-100")]
    InvalidQuality { origin: &'static str, value: String },
    #[error("invalid compression value `{value}` in {origin}, expected 0-9")]
    InvalidCompression { origin: &'static str, value: String },
    #[error("unknown `fmt` value `{0}`")]
    UnknownFormat(String),
    #[error("invalid width `{0}` in resize segment")]
    InvalidWidth(String),
    #[error("invalid height `{0}` in resize segment")]
    InvalidHeight(String),
    #[error("width must not be negative")]
    NegativeWidth,
    #[error("height must not be negative")]
    NegativeHeight,
    #[error("invalid source host `{host}`: {source}")]
    InvalidSourceHost {
        host: String,
        source: url::ParseError,
    },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Stateless parser carrying only the configured defaults.
#[derive(Clone)]
pub struct DirectiveService {
    config: Arc<AppConfig>,
}

impl DirectiveService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    /// Derive the directive for one request.
    ///
    /// On the fetch flow an absent or empty source header is a hard failure.
    /// On the direct-body flow the source header only feeds the logical URL
    /// used in log lines, so it may be omitted.
    pub fn parse(
        &self,
        flow: Flow,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> ParseResult<TransformDirective> {
        let query: Vec<(String, String)> = uri
            .query()
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        let host = header_str(headers, HEADER_SOURCE);
        if flow == Flow::Fetch && host.is_empty() {
            return Err(ParseError::MissingSourceHost);
        }

        let scheme = self.resolve_scheme(headers)?;
        let quality = resolve_bounded(
            &query,
            "qlt",
            headers,
            HEADER_QUALITY,
            100,
            self.config.default_quality,
            |source, value| ParseError::InvalidQuality { origin: source, value },
        )?;
        let compression = resolve_bounded(
            &query,
            "cmp",
            headers,
            HEADER_COMPRESSION,
            9,
            self.config.default_compression,
            |source, value| ParseError::InvalidCompression { origin: source, value },
        )?;
        let format = resolve_format(&query)?;
        let (path, width, height) = split_resize_path(uri.path())?;

        let source_url = if host.is_empty() {
            None
        } else {
            Some(build_source_url(scheme, host, &path, &query)?)
        };

        Ok(TransformDirective {
            source_url,
            width,
            height,
            quality,
            compression,
            format,
        })
    }

    fn resolve_scheme(&self, headers: &HeaderMap) -> ParseResult<Scheme> {
        let value = header_str(headers, HEADER_SCHEME);
        if value.is_empty() {
            return Ok(self.config.default_scheme);
        }
        Scheme::from_str(value).map_err(|_| ParseError::InvalidScheme(value.to_string()))
    }
}

/// Header value as a str, treating absent and non-UTF8 values as empty.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

fn query_value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Resolve a ranged numeric field: query argument over header over default.
///
/// A *present* query argument is always validated, even when empty; a header
/// only participates when non-empty (absent and empty headers both fall
/// through), mirroring how clients actually unset headers.
fn resolve_bounded(
    query: &[(String, String)],
    arg: &str,
    headers: &HeaderMap,
    header_name: &'static str,
    max: u8,
    default: u8,
    invalid: impl Fn(&'static str, String) -> ParseError,
) -> ParseResult<u8> {
    let (source, value) = if let Some(value) = query_value(query, arg) {
        ("query argument", value)
    } else {
        let value = header_str(headers, header_name);
        if value.is_empty() {
            return Ok(default);
        }
        ("header", value)
    };

    value
        .parse::<i64>()
        .ok()
        .filter(|n| (0..=i64::from(max)).contains(n))
        .map(|n| n as u8)
        .ok_or_else(|| invalid(source, value.to_string()))
}

fn resolve_format(query: &[(String, String)]) -> ParseResult<Option<OutputFormat>> {
    match query_value(query, "fmt") {
        None => Ok(None),
        Some(value) => OutputFormat::from_query(value)
            .map(Some)
            .ok_or_else(|| ParseError::UnknownFormat(value.to_string())),
    }
}

/// Split the request path into the upstream resource path and the resize
/// dimensions encoded in its trailing `@` segment.
///
/// The split happens at the *last* separator, so origin paths containing `@`
/// stay intact. A path without any separator is passed through whole with
/// both dimensions unspecified. The trailing segment is lowercased and split
/// on `x`; an empty token leaves that dimension unspecified, anything else
/// must parse as a non-negative integer. The numeric parse already rejects a
/// stray sign, and the explicit negative checks stay as a second line.
fn split_resize_path(path: &str) -> ParseResult<(String, u32, u32)> {
    let Some((rest, segment)) = path.rsplit_once(RESIZE_SEPARATOR) else {
        return Ok((path.to_string(), 0, 0));
    };

    let segment = segment.to_ascii_lowercase();
    let tokens: Vec<&str> = segment.split('x').collect();

    let mut width: i64 = 0;
    let mut height: i64 = 0;
    if !tokens[0].is_empty() {
        width = tokens[0]
            .parse()
            .map_err(|_| ParseError::InvalidWidth(tokens[0].to_string()))?;
    }
    if let Some(token) = tokens.get(1).filter(|t| !t.is_empty()) {
        height = token
            .parse()
            .map_err(|_| ParseError::InvalidHeight(token.to_string()))?;
    }

    if width < 0 {
        return Err(ParseError::NegativeWidth);
    }
    if height < 0 {
        return Err(ParseError::NegativeHeight);
    }

    let width = u32::try_from(width).map_err(|_| ParseError::InvalidWidth(width.to_string()))?;
    let height =
        u32::try_from(height).map_err(|_| ParseError::InvalidHeight(height.to_string()))?;

    Ok((rest.to_string(), width, height))
}

/// Reconstruct the upstream URL from the resolved scheme and host, the
/// stripped resource path, and the query arguments minus the reserved ones —
/// the origin never observes proxy-only parameters.
fn build_source_url(
    scheme: Scheme,
    host: &str,
    path: &str,
    query: &[(String, String)],
) -> ParseResult<Url> {
    let mut url =
        Url::parse(&format!("{}://{}", scheme, host)).map_err(|source| {
            ParseError::InvalidSourceHost {
                host: host.to_string(),
                source,
            }
        })?;
    url.set_path(path);

    let upstream: Vec<&(String, String)> = query
        .iter()
        .filter(|(k, _)| !RESERVED_ARGS.contains(&k.as_str()))
        .collect();
    if upstream.is_empty() {
        url.set_query(None);
    } else {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in upstream {
            pairs.append_pair(k, v);
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> DirectiveService {
        DirectiveService::new(Arc::new(AppConfig::for_tests()))
    }

    fn headers_with_source() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_SOURCE, HeaderValue::from_static("img.example.com"));
        headers
    }

    fn parse_fetch(uri: &str, headers: &HeaderMap) -> ParseResult<TransformDirective> {
        service().parse(Flow::Fetch, &uri.parse::<Uri>().expect("uri"), headers)
    }

    #[test]
    fn parses_width_and_height_from_trailing_segment() {
        let d = parse_fetch("/photos/cat.jpg@80x60", &headers_with_source()).unwrap();
        assert_eq!(d.width, 80);
        assert_eq!(d.height, 60);
        assert_eq!(
            d.source_url.unwrap().as_str(),
            "http://img.example.com/photos/cat.jpg"
        );
    }

    #[test]
    fn width_only_leaves_height_unspecified() {
        let d = parse_fetch("/photos/cat.jpg@80", &headers_with_source()).unwrap();
        assert_eq!(d.width, 80);
        assert_eq!(d.height, 0);
    }

    #[test]
    fn height_only_leaves_width_unspecified() {
        let d = parse_fetch("/photos/cat.jpg@x60", &headers_with_source()).unwrap();
        assert_eq!(d.width, 0);
        assert_eq!(d.height, 60);
    }

    #[test]
    fn bare_separator_leaves_both_unspecified() {
        let d = parse_fetch("/photos/cat.jpg@", &headers_with_source()).unwrap();
        assert_eq!((d.width, d.height), (0, 0));
        assert_eq!(
            d.source_url.unwrap().path(),
            "/photos/cat.jpg"
        );
    }

    #[test]
    fn path_without_separator_is_passed_through_whole() {
        let d = parse_fetch("/photos/cat.jpg", &headers_with_source()).unwrap();
        assert_eq!((d.width, d.height), (0, 0));
        assert_eq!(d.source_url.unwrap().path(), "/photos/cat.jpg");
    }

    #[test]
    fn splits_at_the_last_separator_only() {
        let d = parse_fetch("/pho@tos/cat.jpg@30x40", &headers_with_source()).unwrap();
        assert_eq!((d.width, d.height), (30, 40));
        assert_eq!(d.source_url.unwrap().path(), "/pho@tos/cat.jpg");
    }

    #[test]
    fn dimension_separator_is_case_insensitive() {
        let d = parse_fetch("/cat.jpg@80X60", &headers_with_source()).unwrap();
        assert_eq!((d.width, d.height), (80, 60));
    }

    #[test]
    fn extra_dimension_tokens_are_ignored() {
        let d = parse_fetch("/cat.jpg@10x20x30", &headers_with_source()).unwrap();
        assert_eq!((d.width, d.height), (10, 20));
    }

    #[test]
    fn zero_dimensions_stay_unspecified() {
        let d = parse_fetch("/cat.jpg@0x0", &headers_with_source()).unwrap();
        assert_eq!((d.width, d.height), (0, 0));
    }

    #[test]
    fn non_numeric_width_fails() {
        let err = parse_fetch("/cat.jpg@abcx60", &headers_with_source()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidWidth(_)));
    }

    #[test]
    fn non_numeric_height_fails() {
        let err = parse_fetch("/cat.jpg@80xoops", &headers_with_source()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidHeight(_)));
    }

    #[test]
    fn negative_dimensions_fail() {
        let err = parse_fetch("/cat.jpg@-5x60", &headers_with_source()).unwrap_err();
        assert!(matches!(err, ParseError::NegativeWidth));
        let err = parse_fetch("/cat.jpg@80x-1", &headers_with_source()).unwrap_err();
        assert!(matches!(err, ParseError::NegativeHeight));
    }

    #[test]
    fn fetch_flow_requires_source_header() {
        let err = parse_fetch("/cat.jpg@80", &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ParseError::MissingSourceHost));

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_SOURCE, HeaderValue::from_static(""));
        let err = parse_fetch("/cat.jpg@80", &headers).unwrap_err();
        assert!(matches!(err, ParseError::MissingSourceHost));
    }

    #[test]
    fn direct_flow_tolerates_missing_source_header() {
        let d = service()
            .parse(
                Flow::Direct,
                &"/cat.jpg@80x60".parse::<Uri>().unwrap(),
                &HeaderMap::new(),
            )
            .unwrap();
        assert!(d.source_url.is_none());
        assert_eq!((d.width, d.height), (80, 60));
        assert_eq!(d.source_display(), "<request body>");
    }

    #[test]
    fn direct_flow_keeps_logical_url_when_source_given() {
        let d = service()
            .parse(
                Flow::Direct,
                &"/cat.jpg@80".parse::<Uri>().unwrap(),
                &headers_with_source(),
            )
            .unwrap();
        assert_eq!(
            d.source_url.unwrap().as_str(),
            "http://img.example.com/cat.jpg"
        );
    }

    #[test]
    fn scheme_header_selects_https() {
        let mut headers = headers_with_source();
        headers.insert(HEADER_SCHEME, HeaderValue::from_static("https"));
        let d = parse_fetch("/cat.jpg", &headers).unwrap();
        assert_eq!(d.source_url.unwrap().scheme(), "https");
    }

    #[test]
    fn absent_scheme_header_uses_configured_default() {
        let d = parse_fetch("/cat.jpg", &headers_with_source()).unwrap();
        assert_eq!(d.source_url.unwrap().scheme(), "http");
    }

    #[test]
    fn unknown_scheme_fails() {
        let mut headers = headers_with_source();
        headers.insert(HEADER_SCHEME, HeaderValue::from_static("ftp"));
        let err = parse_fetch("/cat.jpg", &headers).unwrap_err();
        assert!(matches!(err, ParseError::InvalidScheme(_)));
    }

    #[test]
    fn quality_query_argument_wins_over_header() {
        let mut headers = headers_with_source();
        headers.insert(HEADER_QUALITY, HeaderValue::from_static("40"));
        let d = parse_fetch("/cat.jpg?qlt=90", &headers).unwrap();
        assert_eq!(d.quality, 90);
    }

    #[test]
    fn quality_header_applies_without_query_argument() {
        let mut headers = headers_with_source();
        headers.insert(HEADER_QUALITY, HeaderValue::from_static("40"));
        let d = parse_fetch("/cat.jpg", &headers).unwrap();
        assert_eq!(d.quality, 40);
    }

    #[test]
    fn quality_defaults_when_unset() {
        let d = parse_fetch("/cat.jpg", &headers_with_source()).unwrap();
        assert_eq!(d.quality, 80);
        assert_eq!(d.compression, 6);
    }

    #[test]
    fn out_of_range_quality_fails_from_either_source() {
        let err = parse_fetch("/cat.jpg?qlt=101", &headers_with_source()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidQuality { .. }));

        let err = parse_fetch("/cat.jpg?qlt=-1", &headers_with_source()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidQuality { .. }));

        let mut headers = headers_with_source();
        headers.insert(HEADER_QUALITY, HeaderValue::from_static("101"));
        let err = parse_fetch("/cat.jpg", &headers).unwrap_err();
        assert!(matches!(err, ParseError::InvalidQuality { .. }));
    }

    #[test]
    fn empty_quality_query_argument_fails() {
        // A present-but-empty query arg is an invalid value, not an absence.
        let err = parse_fetch("/cat.jpg?qlt=", &headers_with_source()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidQuality { .. }));
    }

    #[test]
    fn compression_out_of_range_fails() {
        let err = parse_fetch("/cat.jpg?cmp=10", &headers_with_source()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidCompression { .. }));
    }

    #[test]
    fn compression_query_argument_wins_over_header() {
        let mut headers = headers_with_source();
        headers.insert(HEADER_COMPRESSION, HeaderValue::from_static("2"));
        let d = parse_fetch("/cat.jpg?cmp=9", &headers).unwrap();
        assert_eq!(d.compression, 9);
    }

    #[test]
    fn format_argument_is_case_insensitive() {
        let d = parse_fetch("/cat.jpg?fmt=JPG", &headers_with_source()).unwrap();
        assert_eq!(d.format, Some(OutputFormat::Jpeg));
        let d = parse_fetch("/cat.jpg?fmt=jpeg", &headers_with_source()).unwrap();
        assert_eq!(d.format, Some(OutputFormat::Jpeg));
        let d = parse_fetch("/cat.jpg?fmt=WEBP", &headers_with_source()).unwrap();
        assert_eq!(d.format, Some(OutputFormat::Webp));
    }

    #[test]
    fn unknown_format_fails() {
        let err = parse_fetch("/cat.jpg?fmt=bmp", &headers_with_source()).unwrap_err();
        assert!(matches!(err, ParseError::UnknownFormat(_)));
    }

    #[test]
    fn absent_format_preserves_source_encoding() {
        let d = parse_fetch("/cat.jpg", &headers_with_source()).unwrap();
        assert_eq!(d.format, None);
    }

    #[test]
    fn reserved_arguments_are_stripped_from_upstream_url() {
        let d = parse_fetch(
            "/cat.jpg@80?qlt=50&cmp=3&fmt=png&token=abc",
            &headers_with_source(),
        )
        .unwrap();
        let url = d.source_url.unwrap();
        assert_eq!(url.query(), Some("token=abc"));
    }

    #[test]
    fn upstream_url_drops_query_entirely_when_only_reserved_args_present() {
        let d = parse_fetch("/cat.jpg?qlt=50", &headers_with_source()).unwrap();
        assert_eq!(d.source_url.unwrap().query(), None);
    }

    #[test]
    fn unusable_source_host_fails() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_SOURCE, HeaderValue::from_static("::not a host::"));
        let err = parse_fetch("/cat.jpg", &headers).unwrap_err();
        assert!(matches!(err, ParseError::InvalidSourceHost { .. }));
    }
}
