//! Wire shapes of the remote API and their conversion into cached types.

use booruvault_common::{Post, Rating, Tag, TagType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::warn;

use super::ApiError;

/// A post as returned by `s=post&q=index&json=1`.
#[derive(Debug, Deserialize)]
pub(super) struct PostDto {
    #[serde(deserialize_with = "lenient_i64")]
    id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    source: String,
    #[serde(default, deserialize_with = "lenient_string")]
    directory: String,
    #[serde(default, alias = "md5", deserialize_with = "lenient_string")]
    hash: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    width: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    height: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    owner: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    parent_id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    rating: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    sample: bool,
    #[serde(default, deserialize_with = "lenient_i64")]
    sample_width: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    sample_height: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    score: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    tags: String,
    #[serde(default, deserialize_with = "lenient_string")]
    file_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    created_at: String,
    /// Last change, used when `created_at` is absent.
    #[serde(default, deserialize_with = "lenient_i64")]
    change: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    image: String,
}

/// A tag as returned by `s=tag&q=index&json=1`.
#[derive(Debug, Deserialize)]
pub(super) struct TagDto {
    #[serde(deserialize_with = "lenient_i64")]
    id: i64,
    #[serde(alias = "tag", deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    count: i64,
    #[serde(default, rename = "type")]
    tag_type: Value,
    #[serde(default, deserialize_with = "lenient_bool")]
    ambiguous: bool,
}

/// Responses come either as a bare array or wrapped with an `@attributes` header.
#[derive(Deserialize)]
#[serde(untagged, bound(deserialize = "T: Deserialize<'de>"))]
enum Page<T> {
    List(Vec<T>),
    Wrapped {
        #[serde(default, rename = "post", alias = "tag")]
        items: Vec<T>,
    },
}

fn parse_page<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, ApiError> {
    // An empty result set is sometimes an empty body
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let page: Page<T> = serde_json::from_str(body)?;
    Ok(match page {
        Page::List(items) => items,
        Page::Wrapped { items } => items,
    })
}

pub(super) fn parse_posts(body: &str) -> Result<Vec<Post>, ApiError> {
    parse_page::<PostDto>(body)?
        .into_iter()
        .map(PostDto::into_post)
        .collect()
}

pub(super) fn parse_tags(body: &str) -> Result<Vec<Tag>, ApiError> {
    Ok(parse_page::<TagDto>(body)?
        .into_iter()
        .map(TagDto::into_tag)
        .collect())
}

impl PostDto {
    fn into_post(self) -> Result<Post, ApiError> {
        if self.id <= 0 {
            return Err(ApiError::Invalid(format!("post id {}", self.id)));
        }

        let created_at = parse_timestamp(&self.created_at).unwrap_or(self.change);

        Ok(Post {
            id: self.id,
            source: self.source,
            directory: self.directory,
            hash: self.hash,
            width: dimension(self.width),
            height: dimension(self.height),
            owner: self.owner,
            parent_id: (self.parent_id > 0).then_some(self.parent_id),
            rating: parse_rating(&self.rating),
            sample: self.sample,
            sample_width: dimension(self.sample_width),
            sample_height: dimension(self.sample_height),
            score: self.score,
            tags: split_tags(&self.tags),
            file_url: self.file_url,
            created_at,
            image: self.image,
            favorite: false,
            blacklisted: false,
            downloaded: false,
            selected: false,
            view_count: 0,
        })
    }
}

impl TagDto {
    fn into_tag(self) -> Tag {
        Tag {
            id: self.id,
            tag: unescape_html(&self.name),
            count: self.count.max(0) as u64,
            tag_type: parse_tag_type(&self.tag_type),
            ambiguous: self.ambiguous,
        }
    }
}

fn dimension(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Split the space separated tag string, unescaping each tag.
pub(super) fn split_tags(tags: &str) -> Vec<String> {
    tags.split_whitespace().map(unescape_html).collect()
}

/// Map the remote rating spellings onto [`Rating`].
///
/// Unknown ratings are treated as explicit.
pub(super) fn parse_rating(rating: &str) -> Rating {
    match rating.trim().to_ascii_lowercase().as_str() {
        "s" | "safe" | "g" | "general" | "sensitive" => Rating::Safe,
        "q" | "questionable" => Rating::Questionable,
        "e" | "explicit" => Rating::Explicit,
        other => {
            warn!("Unknown rating {:?}, treating as explicit", other);
            Rating::Explicit
        }
    }
}

/// Map a numeric or named remote tag type onto [`TagType`].
pub(super) fn parse_tag_type(value: &Value) -> TagType {
    let code = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                return match s.trim().to_ascii_lowercase().as_str() {
                    "artist" => TagType::Artist,
                    "character" => TagType::Character,
                    "copyright" => TagType::Copyright,
                    "metadata" | "meta" => TagType::Metadata,
                    _ => TagType::Tag,
                }
            }
        },
        _ => None,
    };

    match code {
        Some(1) => TagType::Artist,
        Some(3) => TagType::Copyright,
        Some(4) => TagType::Character,
        Some(5) => TagType::Metadata,
        _ => TagType::Tag,
    }
}

/// Parse timestamps like `Sat Jun 04 12:00:00 -0500 2022` into unix seconds.
pub(super) fn parse_timestamp(value: &str) -> Option<i64> {
    let format = format_description!(
        "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
    );
    OffsetDateTime::parse(value.trim(), format)
        .ok()
        .map(OffsetDateTime::unix_timestamp)
}

/// Decode the HTML entities the remote leaves in tag names.
pub(super) fn unescape_html(tag: &str) -> String {
    html_escape::decode_html_entities(tag).into_owned()
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Bool(b) => b as i64,
        _ => 0,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
