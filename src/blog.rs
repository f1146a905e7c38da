use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("API base address is empty")]
    MissingBaseUrl,
    #[error("invalid API address {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned {status}")]
    Status {
        method: &'static str,
        url: String,
        status: StatusCode,
    },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub likes: Option<i64>,
    #[serde(default)]
    pub comments: Option<Vec<String>>,
}

impl Post {
    pub fn like_count(&self) -> i64 {
        self.likes.unwrap_or(0)
    }

    pub fn comment_list(&self) -> &[String] {
        self.comments.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub author: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub comment: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Blocking client for the blog REST API. The base address is passed per
/// call because the user may edit it between requests.
pub struct Client {
    http: HttpClient,
    user_agent: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !config.user_agent.trim().is_empty(),
            "blog client user agent required"
        );

        let http = match config.http_client {
            Some(client) => client,
            None => {
                let mut builder = HttpClient::builder();
                // reqwest's blocking client defaults to a 30s timeout; None disables it.
                builder = builder.timeout(config.timeout);
                builder.build()?
            }
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
        })
    }

    /// `GET <base>/posts<query>` where `query` comes from the query builder.
    pub fn list_posts(&self, base: &str, query: &str) -> Result<Vec<Post>> {
        let url = endpoint(base, &format!("/posts{query}"))?;
        let response = self.send("GET", self.http.get(url.clone()), &url)?;
        response.json().map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    pub fn create_post(&self, base: &str, post: &NewPost) -> Result<Post> {
        let url = endpoint(base, "/posts")?;
        let response = self.send("POST", self.http.post(url.clone()).json(post), &url)?;
        response.json().map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    pub fn delete_post(&self, base: &str, id: i64) -> Result<()> {
        let url = endpoint(base, &format!("/posts/{id}"))?;
        self.send("DELETE", self.http.delete(url.clone()), &url)?;
        Ok(())
    }

    /// The server exposes liking as a GET.
    pub fn like_post(&self, base: &str, id: i64) -> Result<()> {
        let url = endpoint(base, &format!("/posts/{id}/like"))?;
        self.send("GET", self.http.get(url.clone()), &url)?;
        Ok(())
    }

    pub fn add_comment(&self, base: &str, id: i64, comment: &str) -> Result<Post> {
        let url = endpoint(base, &format!("/posts/{id}/comment"))?;
        let body = NewComment {
            comment: comment.to_string(),
        };
        let response = self.send("POST", self.http.post(url.clone()).json(&body), &url)?;
        response.json().map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    fn send(&self, method: &'static str, request: RequestBuilder, url: &Url) -> Result<Response> {
        tracing::debug!(method, %url, "sending request");
        let response = request
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(|source| ApiError::Network {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                method,
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }
}

/// Joins the user-supplied base address with an already encoded path and
/// query suffix.
pub fn endpoint(base: &str, path_and_query: &str) -> Result<Url> {
    let base = base.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(ApiError::MissingBaseUrl);
    }
    let raw = format!("{base}{path_and_query}");
    Url::parse(&raw).map_err(|source| ApiError::InvalidUrl { url: raw, source })
}
