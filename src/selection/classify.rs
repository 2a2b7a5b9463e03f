//! Page event classification
//!
//! Maps a raw [`PageEvent`] to a [`Selection`] or rejects it.

use super::{PageEvent, Selection};
use crate::config::SelectionLimits;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use url::Url;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace pattern is valid");
}

/// Schemes an image source may resolve to
const IMAGE_SCHEMES: &[&str] = &["http", "https", "data", "blob"];

/// Classify a page event. Returns `None` for events that do not qualify as a
/// selection (too short, too small, invisible, unresolvable, or not a
/// selection event at all).
pub fn classify(
    event: &PageEvent,
    limits: &SelectionLimits,
    captured_at: DateTime<Utc>,
) -> Option<Selection> {
    match event {
        PageEvent::TextSelected {
            text,
            context_before,
            context_after,
            element_tag,
            page_url,
        } => {
            let content = collapse_whitespace(text);
            let len = content.chars().count();
            if len < limits.min_text_length {
                debug!(
                    "Text selection rejected: {} chars < minimum {}",
                    len, limits.min_text_length
                );
                return None;
            }

            Some(Selection::Text {
                content: head_chars(&content, limits.max_text_length),
                surrounding_context_before: tail_chars(
                    &collapse_whitespace(context_before),
                    limits.context_chars,
                ),
                surrounding_context_after: head_chars(
                    &collapse_whitespace(context_after),
                    limits.context_chars,
                ),
                source_element_tag: element_tag.to_lowercase(),
                page_url: page_url.clone(),
                captured_at,
            })
        }
        PageEvent::ImageContextMenu {
            src,
            alt,
            natural_width,
            natural_height,
            rendered_width,
            rendered_height,
            visible,
            element_tag,
            page_url,
        } => {
            if *natural_width < limits.min_image_size || *natural_height < limits.min_image_size {
                debug!(
                    "Image rejected: {}x{} below {}px",
                    natural_width, natural_height, limits.min_image_size
                );
                return None;
            }

            if !*visible || *rendered_width == 0 || *rendered_height == 0 {
                debug!("Image rejected: not visible");
                return None;
            }

            let source_url = match resolve_image_source(src, page_url) {
                Some(url) => url,
                None => {
                    debug!("Image rejected: unresolvable source '{}'", src);
                    return None;
                }
            };

            Some(Selection::Image {
                source_url,
                alt_text: alt.as_deref().map(str::trim).unwrap_or_default().to_string(),
                width: *natural_width,
                height: *natural_height,
                source_element_tag: element_tag.to_lowercase(),
                page_url: page_url.clone(),
                captured_at,
            })
        }
        PageEvent::SelectionCleared | PageEvent::Navigated { .. } => None,
    }
}

/// Resolve an image `src` attribute to an absolute URL, relative to the page
fn resolve_image_source(src: &str, page_url: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }

    let resolved = match Url::parse(src) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(page_url).ok()?.join(src).ok()?,
        Err(_) => return None,
    };

    if IMAGE_SCHEMES.contains(&resolved.scheme()) {
        Some(resolved.to_string())
    } else {
        None
    }
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn head_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}
