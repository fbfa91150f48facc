use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::Post;

pub const DEFAULT_PER_PAGE: u32 = 10;

const POSTS_PATH: &str = "wp-json/wp/v2/posts";
const INVALID_PAGE_CODE: &str = "rest_post_invalid_page_number";

/// One page of posts from a paginated, read-only list endpoint.
///
/// Implementations are stateless and do not retry. `page` is 1-based; an empty
/// result means there is nothing past the previous page.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch(&self, page: u32, per_page: u32) -> Result<Vec<Post>>;
}

#[derive(Debug, Deserialize)]
struct WpErrorBody {
    code: String,
}

/// Client for the WordPress REST posts endpoint.
pub struct WpClient {
    client: Client,
    posts_url: Url,
}

impl WpClient {
    pub fn new(base_url: &str, timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("vrid-reader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            posts_url: posts_url(base_url)?,
        })
    }

    pub fn posts_url(&self) -> &Url {
        &self.posts_url
    }
}

#[async_trait]
impl RemoteSource for WpClient {
    async fn fetch(&self, page: u32, per_page: u32) -> Result<Vec<Post>> {
        let response = self
            .client
            .get(self.posts_url.clone())
            .query(&[("per_page", per_page), ("page", page)])
            .send()
            .await?;

        let status = response.status();

        // WordPress reports a page past the end as 400 instead of an empty list
        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await?;
            if is_invalid_page(&body) {
                tracing::debug!("Page {} is past the end of the feed", page);
                return Ok(Vec::new());
            }
            return Err(AppError::BlogApi(format!("HTTP {}: {}", status, body)));
        }

        if !status.is_success() {
            return Err(anyhow::anyhow!("Failed to fetch posts: HTTP {}", status).into());
        }

        let posts: Vec<Post> = response.json().await?;
        tracing::debug!("Fetched {} posts for page {}", posts.len(), page);
        Ok(posts)
    }
}

fn posts_url(base_url: &str) -> Result<Url> {
    let mut base = Url::parse(base_url)
        .map_err(|e| AppError::Config(format!("Invalid base_url {:?}: {}", base_url, e)))?;

    // Without a trailing slash `join` would drop the last path segment
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(POSTS_PATH)
        .map_err(|e| AppError::Config(format!("Invalid base_url {:?}: {}", base_url, e)))
}

fn is_invalid_page(body: &str) -> bool {
    serde_json::from_str::<WpErrorBody>(body)
        .map(|err| err.code == INVALID_PAGE_CODE)
        .unwrap_or(false)
}
