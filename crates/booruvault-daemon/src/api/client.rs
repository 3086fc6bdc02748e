use booruvault_common::{Post, Rating, Tag};
use std::time::Duration;
use tracing::debug;

use super::dto::{parse_posts, parse_tags};
use super::ApiError;
use crate::config::ApiConfig;

/// A post search against the remote API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub tags: Vec<String>,
    /// Zero-based page number.
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub rating: Option<Rating>,
}

impl SearchQuery {
    /// The `tags` query parameter: search tags joined by spaces, with the
    /// rating filter appended as a `rating:<value>` tag.
    pub fn tag_param(&self) -> String {
        let mut tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if let Some(rating) = self.rating {
            tags.push(format!("rating:{}", rating));
        }
        tags.join(" ")
    }
}

/// HTTP client for a Gelbooru-style `index.php?page=dapi` API.
#[derive(Clone)]
pub struct BooruClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    user_id: Option<String>,
    page_limit: u32,
}

impl BooruClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("booruvault/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            user_id: config.user_id.clone(),
            page_limit: config.page_limit,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/index.php", self.base_url)
    }

    /// Common query parameters for resource `s`.
    fn base_params(&self, resource: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", "dapi".to_string()),
            ("s", resource.to_string()),
            ("q", "index".to_string()),
            ("json", "1".to_string()),
        ];
        if let (Some(api_key), Some(user_id)) = (&self.api_key, &self.user_id) {
            params.push(("api_key", api_key.clone()));
            params.push(("user_id", user_id.clone()));
        }
        params
    }

    pub(crate) fn post_params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = self.base_params("post");
        params.push(("tags", query.tag_param()));
        params.push(("limit", query.limit.unwrap_or(self.page_limit).to_string()));
        if let Some(page) = query.page {
            params.push(("pid", page.to_string()));
        }
        params
    }

    async fn get(&self, params: &[(&'static str, String)]) -> Result<String, ApiError> {
        let response = self.http.get(self.endpoint()).query(params).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(body)
    }

    /// Fetch one page of posts.
    pub async fn search_posts(&self, query: &SearchQuery) -> Result<Vec<Post>, ApiError> {
        let body = self.get(&self.post_params(query)).await?;
        let posts = parse_posts(&body)?;
        debug!("Remote search {:?} returned {} posts", query.tag_param(), posts.len());
        Ok(posts)
    }

    /// Look up a single tag by exact name.
    pub async fn get_tag(&self, name: &str) -> Result<Option<Tag>, ApiError> {
        let mut params = self.base_params("tag");
        params.push(("name", name.to_string()));

        let body = self.get(&params).await?;
        Ok(parse_tags(&body)?.into_iter().find(|t| t.tag == name))
    }

    /// Look up tags matching a pattern (`%` is the wildcard).
    pub async fn search_tags(&self, pattern: &str, limit: Option<u32>) -> Result<Vec<Tag>, ApiError> {
        let mut params = self.base_params("tag");
        params.push(("name_pattern", pattern.to_string()));
        params.push(("orderby", "count".to_string()));
        params.push(("limit", limit.unwrap_or(self.page_limit).to_string()));

        let body = self.get(&params).await?;
        parse_tags(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: Option<&str>) -> BooruClient {
        let config = ApiConfig {
            base_url: "https://booru.example/".to_string(),
            api_key: api_key.map(str::to_string),
            user_id: api_key.map(|_| "42".to_string()),
            ..ApiConfig::default()
        };
        BooruClient::new(&config).unwrap()
    }

    #[test]
    fn test_tag_param_appends_rating() {
        let query = SearchQuery {
            tags: vec!["holo".into(), " ".into(), "-wolf".into()],
            rating: Some(Rating::Questionable),
            ..SearchQuery::default()
        };
        assert_eq!(query.tag_param(), "holo -wolf rating:questionable");
    }

    #[test]
    fn test_post_params() {
        let query = SearchQuery {
            tags: vec!["a".into(), "b".into()],
            page: Some(3),
            limit: None,
            rating: None,
        };

        let params = client(None).post_params(&query);
        assert!(params.contains(&("s", "post".to_string())));
        assert!(params.contains(&("tags", "a b".to_string())));
        assert!(params.contains(&("pid", "3".to_string())));
        assert!(params.contains(&("limit", "100".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "api_key"));

        let authed = client(Some("secret")).post_params(&query);
        assert!(authed.contains(&("api_key", "secret".to_string())));
        assert!(authed.contains(&("user_id", "42".to_string())));
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        assert_eq!(client(None).endpoint(), "https://booru.example/index.php");
    }
}
