use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::blog::Post;
use crate::data::{MutationService, PostService};
use crate::render::Feed;
use crate::storage;
use crate::view::ViewState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Delete(i64),
    Like(i64),
    Comment(i64),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => write!(f, "create post"),
            Action::Delete(id) => write!(f, "delete post {id}"),
            Action::Like(id) => write!(f, "like post {id}"),
            Action::Comment(id) => write!(f, "comment on post {id}"),
        }
    }
}

pub enum SyncEvent {
    Posts {
        generation: u64,
        result: Result<Vec<Post>>,
    },
    Mutation {
        action: Action,
        result: Result<()>,
    },
}

/// Runs fetch cycles and mutation actions on worker threads and applies
/// their results on the caller's thread. Every reload gets a generation
/// number; only the newest one may touch the feed.
pub struct Synchronizer {
    posts: Arc<dyn PostService + Send + Sync>,
    mutations: Arc<dyn MutationService + Send + Sync>,
    store: Option<storage::Store>,
    tx: Sender<SyncEvent>,
    rx: Receiver<SyncEvent>,
    generation: u64,
    in_flight: usize,
}

impl Synchronizer {
    pub fn new(
        posts: Arc<dyn PostService + Send + Sync>,
        mutations: Arc<dyn MutationService + Send + Sync>,
        store: Option<storage::Store>,
    ) -> Self {
        let (tx, rx) = unbounded();
        Self {
            posts,
            mutations,
            store,
            tx,
            rx,
            generation: 0,
            in_flight: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Starts a fetch cycle: persists the base address, builds the query
    /// from `view` and requests the collection.
    pub fn reload(&mut self, view: &ViewState) -> u64 {
        if let Some(store) = &self.store {
            if let Err(err) = store.set_base_url(&view.base_url) {
                tracing::warn!("failed to persist base address: {err:#}");
            }
        }

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let base = view.base_url.clone();
        let query = view.query_suffix();
        tracing::debug!(generation, %base, %query, "loading posts");

        self.in_flight += 1;
        let tx = self.tx.clone();
        let service = self.posts.clone();
        thread::spawn(move || {
            let result = service.list_posts(&base, &query);
            let _ = tx.send(SyncEvent::Posts { generation, result });
        });
        generation
    }

    /// Sends the compose form. The inputs are cleared as soon as the
    /// request is issued, whatever the outcome.
    pub fn create(&mut self, view: &mut ViewState) {
        let post = view.compose.to_new_post();
        self.spawn_mutation(Action::Create, &view.base_url, move |service, base| {
            let created = service.create_post(base, &post)?;
            tracing::info!(id = created.id, "post added");
            Ok(())
        });
        view.compose.clear();
    }

    pub fn delete(&mut self, view: &ViewState, id: i64) {
        self.spawn_mutation(Action::Delete(id), &view.base_url, move |service, base| {
            service.delete_post(base, id)
        });
    }

    pub fn like(&mut self, view: &ViewState, id: i64) {
        self.spawn_mutation(Action::Like(id), &view.base_url, move |service, base| {
            service.like_post(base, id)
        });
    }

    pub fn comment(&mut self, view: &ViewState, id: i64, text: String) {
        self.spawn_mutation(Action::Comment(id), &view.base_url, move |service, base| {
            service.add_comment(base, id, &text)?;
            Ok(())
        });
    }

    fn spawn_mutation<F>(&mut self, action: Action, base: &str, call: F)
    where
        F: FnOnce(&dyn MutationService, &str) -> Result<()> + Send + 'static,
    {
        tracing::debug!(%action, "starting");
        self.in_flight += 1;
        let base = base.to_string();
        let tx = self.tx.clone();
        let service = self.mutations.clone();
        thread::spawn(move || {
            let result = call(service.as_ref(), &base);
            let _ = tx.send(SyncEvent::Mutation { action, result });
        });
    }

    pub fn try_next(&self) -> Option<SyncEvent> {
        self.rx.try_recv().ok()
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<SyncEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Applies a worker result. Returns a status line message when there is
    /// something to tell the user.
    pub fn handle(&mut self, event: SyncEvent, view: &ViewState, feed: &mut Feed) -> Option<String> {
        self.in_flight = self.in_flight.saturating_sub(1);
        match event {
            SyncEvent::Posts { generation, result } => {
                if generation != self.generation {
                    tracing::debug!(generation, latest = self.generation, "dropping stale posts");
                    return None;
                }
                match result {
                    Ok(posts) => {
                        let count = posts.len();
                        feed.replace(posts);
                        tracing::info!(count, generation, "posts rendered");
                        Some(format!("Loaded {count} posts."))
                    }
                    Err(err) => {
                        tracing::error!("Error: {err:#}");
                        Some(format!("Failed to load posts: {err:#}"))
                    }
                }
            }
            SyncEvent::Mutation { action, result } => match result {
                Ok(()) => {
                    tracing::info!(%action, "done");
                    self.reload(view);
                    Some(format!("Done: {action}. Refreshing…"))
                }
                Err(err) => {
                    tracing::error!(%action, "Error: {err:#}");
                    Some(format!("Failed to {action}: {err:#}"))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::NewPost;
    use crate::view::ComposeField;
    use anyhow::bail;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn record(&self, call: String) -> Result<()> {
            self.calls.lock().push(call);
            if self.fail {
                bail!("connection refused");
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn list_count(&self) -> usize {
            self.calls().iter().filter(|call| call.starts_with("LIST")).count()
        }
    }

    fn post(id: i64) -> Post {
        Post {
            id,
            title: format!("Post {id}"),
            ..Post::default()
        }
    }

    impl PostService for Recorder {
        fn list_posts(&self, base: &str, query: &str) -> Result<Vec<Post>> {
            self.record(format!("LIST {base}/posts{query}"))?;
            Ok(vec![post(1), post(2)])
        }
    }

    impl MutationService for Recorder {
        fn create_post(&self, base: &str, new: &NewPost) -> Result<Post> {
            self.record(format!("CREATE {base} {}/{}/{}", new.title, new.author, new.content))?;
            Ok(post(3))
        }

        fn delete_post(&self, base: &str, id: i64) -> Result<()> {
            self.record(format!("DELETE {base} {id}"))
        }

        fn like_post(&self, base: &str, id: i64) -> Result<()> {
            self.record(format!("LIKE {base} {id}"))
        }

        fn add_comment(&self, base: &str, id: i64, comment: &str) -> Result<Post> {
            self.record(format!("COMMENT {base} {id} {comment}"))?;
            Ok(post(id))
        }
    }

    fn synchronizer(recorder: &Arc<Recorder>) -> Synchronizer {
        Synchronizer::new(recorder.clone(), recorder.clone(), None)
    }

    fn pump(sync: &mut Synchronizer, view: &ViewState, feed: &mut Feed) -> Option<String> {
        let event = sync.next_timeout(WAIT).expect("worker result");
        sync.handle(event, view, feed)
    }

    #[test]
    fn delete_triggers_exactly_one_more_fetch() {
        let recorder = Arc::new(Recorder::default());
        let mut sync = synchronizer(&recorder);
        let view = ViewState::with_base_url("http://api");
        let mut feed = Feed::default();

        sync.delete(&view, 7);
        let status = pump(&mut sync, &view, &mut feed).unwrap();
        assert!(status.contains("delete post 7"));
        assert!(sync.is_loading());

        pump(&mut sync, &view, &mut feed);
        assert!(!sync.is_loading());
        assert_eq!(
            recorder.calls(),
            vec!["DELETE http://api 7".to_string(), "LIST http://api/posts".to_string()]
        );
        assert_eq!(feed.len(), 2);
        assert!(sync.next_timeout(Duration::from_millis(100)).is_none());
        assert_eq!(recorder.list_count(), 1);
    }

    #[test]
    fn like_and_comment_reload_with_current_query() {
        let recorder = Arc::new(Recorder::default());
        let mut sync = synchronizer(&recorder);
        let mut view = ViewState::with_base_url("http://api");
        view.toggle_mode(crate::view::ParamPanel::Sort);
        let mut feed = Feed::default();

        sync.like(&view, 2);
        pump(&mut sync, &view, &mut feed);
        pump(&mut sync, &view, &mut feed);
        sync.comment(&view, 2, "great read".into());
        pump(&mut sync, &view, &mut feed);
        pump(&mut sync, &view, &mut feed);

        assert_eq!(
            recorder.calls(),
            vec![
                "LIKE http://api 2".to_string(),
                "LIST http://api/posts?sort=date&direction=asc".to_string(),
                "COMMENT http://api 2 great read".to_string(),
                "LIST http://api/posts?sort=date&direction=asc".to_string(),
            ]
        );
    }

    #[test]
    fn create_clears_inputs_even_when_request_fails() {
        let recorder = Arc::new(Recorder::failing());
        let mut sync = synchronizer(&recorder);
        let mut view = ViewState::with_base_url("http://api");
        view.compose.value_mut(ComposeField::Title).push_str("Hello");
        view.compose.value_mut(ComposeField::Author).push_str("Jane");
        view.compose.value_mut(ComposeField::Content).push_str("World");
        let mut feed = Feed::default();

        sync.create(&mut view);
        assert!(view.compose.is_empty());

        let status = pump(&mut sync, &view, &mut feed).unwrap();
        assert!(status.starts_with("Failed to create post"));
        assert_eq!(recorder.calls(), vec!["CREATE http://api Hello/Jane/World".to_string()]);
        assert!(sync.next_timeout(Duration::from_millis(100)).is_none());
        assert_eq!(recorder.list_count(), 0);
    }

    #[test]
    fn stale_generation_does_not_render() {
        let recorder = Arc::new(Recorder::default());
        let mut sync = synchronizer(&recorder);
        let view = ViewState::with_base_url("http://api");
        let mut feed = Feed::default();

        let first = sync.reload(&view);
        let second = sync.reload(&view);
        assert!(second > first);

        let stale = SyncEvent::Posts {
            generation: first,
            result: Ok(vec![post(10)]),
        };
        assert!(sync.handle(stale, &view, &mut feed).is_none());
        assert!(feed.is_empty());

        let fresh = SyncEvent::Posts {
            generation: second,
            result: Ok(vec![post(20), post(21)]),
        };
        sync.handle(fresh, &view, &mut feed);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.get(0).map(|block| block.id), Some(20));
    }

    #[test]
    fn failed_fetch_keeps_last_render() {
        let recorder = Arc::new(Recorder::failing());
        let mut sync = synchronizer(&recorder);
        let view = ViewState::with_base_url("http://api");
        let mut feed = Feed::default();
        feed.replace(vec![post(1)]);

        sync.reload(&view);
        let status = pump(&mut sync, &view, &mut feed).unwrap();
        assert!(status.starts_with("Failed to load posts"));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.get(0).map(|block| block.id), Some(1));
    }

    #[test]
    fn every_reload_persists_base_address() {
        let dir = tempdir().unwrap();
        let store = storage::Store::open(storage::Options {
            path: Some(dir.path().join("state.db")),
        })
        .unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut sync = Synchronizer::new(recorder.clone(), recorder.clone(), Some(store.clone()));

        let view = ViewState::with_base_url("http://first");
        sync.reload(&view);
        assert_eq!(store.base_url().unwrap().as_deref(), Some("http://first"));

        let view = ViewState::with_base_url("http://second");
        sync.reload(&view);
        assert_eq!(store.base_url().unwrap().as_deref(), Some("http://second"));
    }
}
