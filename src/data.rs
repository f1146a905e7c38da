use std::sync::Arc;

use anyhow::{Context, Result};

use crate::blog::{self, NewPost, Post};

pub trait PostService: Send + Sync {
    fn list_posts(&self, base: &str, query: &str) -> Result<Vec<Post>>;
}

pub trait MutationService: Send + Sync {
    fn create_post(&self, base: &str, post: &NewPost) -> Result<Post>;
    fn delete_post(&self, base: &str, id: i64) -> Result<()>;
    fn like_post(&self, base: &str, id: i64) -> Result<()>;
    fn add_comment(&self, base: &str, id: i64, comment: &str) -> Result<Post>;
}

pub struct BlogPostService {
    client: Arc<blog::Client>,
}

impl BlogPostService {
    pub fn new(client: Arc<blog::Client>) -> Self {
        Self { client }
    }
}

impl PostService for BlogPostService {
    fn list_posts(&self, base: &str, query: &str) -> Result<Vec<Post>> {
        self.client
            .list_posts(base, query)
            .context("fetch posts")
    }
}

pub struct BlogMutationService {
    client: Arc<blog::Client>,
}

impl BlogMutationService {
    pub fn new(client: Arc<blog::Client>) -> Self {
        Self { client }
    }
}

impl MutationService for BlogMutationService {
    fn create_post(&self, base: &str, post: &NewPost) -> Result<Post> {
        self.client.create_post(base, post).context("create post")
    }

    fn delete_post(&self, base: &str, id: i64) -> Result<()> {
        self.client
            .delete_post(base, id)
            .with_context(|| format!("delete post {id}"))
    }

    fn like_post(&self, base: &str, id: i64) -> Result<()> {
        self.client
            .like_post(base, id)
            .with_context(|| format!("like post {id}"))
    }

    fn add_comment(&self, base: &str, id: i64, comment: &str) -> Result<Post> {
        self.client
            .add_comment(base, id, comment)
            .with_context(|| format!("comment on post {id}"))
    }
}
