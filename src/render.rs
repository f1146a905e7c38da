use once_cell::sync::Lazy;
use regex::Regex;

use crate::blog::Post;

/// One post as displayed, plus its comment panel. Rebuilt from scratch on
/// every successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostBlock {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub date: String,
    pub content: String,
    pub likes: i64,
    pub comment_count: usize,
    pub panel: CommentPanel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentPanel {
    pub post_id: i64,
    pub comments: Vec<String>,
    pub hidden: bool,
    pub form: CommentForm,
}

/// Inline submission form scoped to one post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentForm {
    pub draft: String,
}

impl CommentPanel {
    pub fn toggle(&mut self) {
        self.hidden = !self.hidden;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Feed {
    blocks: Vec<PostBlock>,
    revision: u64,
}

impl Feed {
    /// Destructive re-render: nothing from the previous render survives,
    /// including panel visibility and comment drafts.
    pub fn replace(&mut self, posts: Vec<Post>) {
        self.blocks = posts.into_iter().map(render_post).collect();
        self.revision += 1;
    }

    /// Bumped by every [`Feed::replace`].
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn blocks(&self) -> &[PostBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PostBlock> {
        self.blocks.get(index)
    }

    pub fn find(&self, id: i64) -> Option<&PostBlock> {
        self.blocks.iter().find(|block| block.id == id)
    }

    fn find_mut(&mut self, id: i64) -> Option<&mut PostBlock> {
        self.blocks.iter_mut().find(|block| block.id == id)
    }

    /// Returns the panel's new hidden state, or `None` for an unknown id.
    pub fn toggle_comments(&mut self, id: i64) -> Option<bool> {
        let block = self.find_mut(id)?;
        block.panel.toggle();
        Some(block.panel.hidden)
    }

    pub fn show_comments(&mut self, id: i64) {
        if let Some(block) = self.find_mut(id) {
            block.panel.hidden = false;
        }
    }

    pub fn draft_mut(&mut self, id: i64) -> Option<&mut String> {
        self.find_mut(id).map(|block| &mut block.panel.form.draft)
    }

    pub fn draft(&self, id: i64) -> Option<&str> {
        self.find(id).map(|block| block.panel.form.draft.as_str())
    }
}

pub fn render_post(post: Post) -> PostBlock {
    let likes = post.like_count();
    let comments: Vec<String> = post
        .comments
        .unwrap_or_default()
        .iter()
        .map(|comment| sanitize(comment))
        .collect();
    PostBlock {
        id: post.id,
        title: sanitize(&post.title),
        author: sanitize(&post.author),
        date: sanitize(&post.date),
        content: sanitize(&post.content),
        likes,
        comment_count: comments.len(),
        panel: CommentPanel {
            post_id: post.id,
            comments,
            hidden: true,
            form: CommentForm::default(),
        },
    }
}

/// Strips terminal escape sequences and control characters so server text
/// is always shown literally. Newlines and tabs survive.
pub fn sanitize(raw: &str) -> String {
    static ESCAPE_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\x1b(\[[0-?]*[ -/]*[@-~]|\][^\x07\x1b]*(\x07|\x1b\\)|[@-Z\\-_])")
            .expect("valid escape sequence regex")
    });
    let without_sequences = ESCAPE_RE.replace_all(raw, "");
    without_sequences
        .chars()
        .filter(|ch| !ch.is_control() || *ch == '\n' || *ch == '\t')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: i64) -> Post {
        Post {
            id,
            title: format!("Post {id}"),
            author: "Jane".into(),
            date: "2024-09-05".into(),
            content: "Body".into(),
            likes: None,
            comments: None,
        }
    }

    #[test]
    fn missing_likes_render_as_zero() {
        let block = render_post(post(1));
        assert_eq!(block.likes, 0);
    }

    #[test]
    fn missing_comments_leave_only_the_form() {
        let block = render_post(post(1));
        assert_eq!(block.comment_count, 0);
        assert!(block.panel.comments.is_empty());
        assert_eq!(block.panel.form, CommentForm::default());
        assert_eq!(block.panel.post_id, 1);
        assert!(block.panel.hidden);
    }

    #[test]
    fn present_counts_come_from_the_response() {
        let mut source = post(3);
        source.likes = Some(12);
        source.comments = Some(vec!["first".into(), "second".into()]);
        let block = render_post(source);
        assert_eq!(block.likes, 12);
        assert_eq!(block.comment_count, 2);
        assert_eq!(block.panel.comments, vec!["first", "second"]);
    }

    #[test]
    fn replace_discards_previous_render() {
        let mut feed = Feed::default();
        feed.replace(vec![post(1), post(2)]);
        feed.toggle_comments(1);
        feed.draft_mut(1).unwrap().push_str("half written");

        feed.replace(vec![post(2), post(1)]);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.get(0).map(|block| block.id), Some(2));
        let first = feed.find(1).unwrap();
        assert!(first.panel.hidden);
        assert_eq!(feed.draft(1), Some(""));
    }

    #[test]
    fn toggling_twice_restores_visibility() {
        let mut feed = Feed::default();
        feed.replace(vec![post(5)]);
        let before = feed.find(5).unwrap().panel.hidden;
        assert_eq!(feed.toggle_comments(5), Some(!before));
        assert_eq!(feed.toggle_comments(5), Some(before));
        assert_eq!(feed.toggle_comments(99), None);
    }

    #[test]
    fn sanitize_removes_escape_sequences() {
        assert_eq!(sanitize("\x1b[31mred\x1b[0m text"), "red text");
        assert_eq!(sanitize("bell\x07 and\r\nnewline"), "bell and\nnewline");
        assert_eq!(sanitize("<b>kept literally</b>"), "<b>kept literally</b>");
    }
}
