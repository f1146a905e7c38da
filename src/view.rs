use crate::blog::NewPost;
use crate::query::{ParamMode, Query, SearchParams, SortParams};

/// Parameter panels; at most one is shown at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamPanel {
    Sort,
    Search,
}

impl ParamPanel {
    pub fn title(self) -> &'static str {
        match self {
            ParamPanel::Sort => "Sort",
            ParamPanel::Search => "Search",
        }
    }

    fn mode(self) -> ParamMode {
        match self {
            ParamPanel::Sort => ParamMode::Sort,
            ParamPanel::Search => ParamMode::Search,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeField {
    Title,
    Author,
    Content,
}

impl ComposeField {
    pub fn title(self) -> &'static str {
        match self {
            ComposeField::Title => "Title",
            ComposeField::Author => "Author",
            ComposeField::Content => "Content",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeForm {
    pub title: String,
    pub author: String,
    pub content: String,
}

impl ComposeForm {
    pub fn value(&self, field: ComposeField) -> &str {
        match field {
            ComposeField::Title => &self.title,
            ComposeField::Author => &self.author,
            ComposeField::Content => &self.content,
        }
    }

    pub fn value_mut(&mut self, field: ComposeField) -> &mut String {
        match field {
            ComposeField::Title => &mut self.title,
            ComposeField::Author => &mut self.author,
            ComposeField::Content => &mut self.content,
        }
    }

    pub fn to_new_post(&self) -> NewPost {
        NewPost {
            title: self.title.clone(),
            author: self.author.clone(),
            content: self.content.clone(),
        }
    }

    pub fn clear(&mut self) {
        self.title.clear();
        self.author.clear();
        self.content.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.author.is_empty() && self.content.is_empty()
    }
}

/// Everything the query builder, fetcher and mutation actions read from
/// the screen, passed around explicitly.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub base_url: String,
    pub mode: ParamMode,
    pub visible_panel: Option<ParamPanel>,
    pub sort: SortParams,
    pub search: SearchParams,
    pub compose: ComposeForm,
}

impl ViewState {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Selecting a mode hides both panels and shows the chosen one.
    /// Selecting the active mode again turns filtering off but leaves its
    /// panel on screen.
    pub fn toggle_mode(&mut self, panel: ParamPanel) {
        if self.mode == panel.mode() {
            self.mode = ParamMode::Unfiltered;
            return;
        }
        self.mode = panel.mode();
        self.visible_panel = Some(panel);
    }

    pub fn is_active(&self, panel: ParamPanel) -> bool {
        self.mode == panel.mode()
    }

    pub fn query(&self) -> Query {
        Query::from_params(self.mode, &self.sort, &self.search)
    }

    pub fn query_suffix(&self) -> String {
        self.query().to_suffix()
    }
}
