use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

/// Characters left as-is in query keys and values (RFC 3986 unreserved).
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Sort controls are identified as `<field>-sort`.
pub const SORT_CONTROL_SUFFIX: &str = "-sort";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostField {
    Title,
    Content,
    Author,
    #[default]
    Date,
}

impl PostField {
    pub const ALL: [PostField; 4] = [
        PostField::Title,
        PostField::Content,
        PostField::Author,
        PostField::Date,
    ];

    /// Order of the search inputs; checked fields are emitted in this order.
    pub const SEARCH_ORDER: [PostField; 4] = [
        PostField::Author,
        PostField::Title,
        PostField::Content,
        PostField::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostField::Title => "title",
            PostField::Content => "content",
            PostField::Author => "author",
            PostField::Date => "date",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PostField::Title => "Title",
            PostField::Content => "Content",
            PostField::Author => "Author",
            PostField::Date => "Date",
        }
    }

    pub fn sort_control_id(&self) -> String {
        format!("{}{SORT_CONTROL_SUFFIX}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// Which parameter set, if any, shapes the next collection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamMode {
    #[default]
    Unfiltered,
    Sort,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortParams {
    /// Identifier of the checked sort radio, e.g. `date-sort`.
    pub checked_control: String,
    pub descending: bool,
}

impl Default for SortParams {
    fn default() -> Self {
        Self {
            checked_control: PostField::default().sort_control_id(),
            descending: false,
        }
    }
}

impl SortParams {
    pub fn select(&mut self, field: PostField) {
        self.checked_control = field.sort_control_id();
    }

    pub fn selected(&self) -> Option<PostField> {
        let key = sort_key(&self.checked_control);
        PostField::ALL.into_iter().find(|field| field.as_str() == key)
    }

    pub fn direction(&self) -> Direction {
        if self.descending {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchField {
    pub field: PostField,
    pub checked: bool,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// In display order; checked fields are emitted in this order.
    pub fields: Vec<SearchField>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            fields: PostField::SEARCH_ORDER
                .into_iter()
                .map(|field| SearchField {
                    field,
                    checked: false,
                    value: String::new(),
                })
                .collect(),
        }
    }
}

impl SearchParams {
    pub fn field_mut(&mut self, field: PostField) -> Option<&mut SearchField> {
        self.fields.iter_mut().find(|entry| entry.field == field)
    }

    pub fn set(&mut self, field: PostField, value: &str) {
        if let Some(entry) = self.field_mut(field) {
            entry.checked = true;
            entry.value = value.to_string();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    All,
    Sort { key: String, direction: Direction },
    Search(Vec<(String, String)>),
}

impl Query {
    pub fn from_params(mode: ParamMode, sort: &SortParams, search: &SearchParams) -> Self {
        match mode {
            ParamMode::Unfiltered => Query::All,
            ParamMode::Sort => Query::Sort {
                key: sort_key(&sort.checked_control).to_string(),
                direction: sort.direction(),
            },
            ParamMode::Search => Query::Search(
                search
                    .fields
                    .iter()
                    .filter(|entry| entry.checked)
                    .map(|entry| (entry.field.as_str().to_string(), entry.value.clone()))
                    .collect(),
            ),
        }
    }

    /// Suffix appended to `<base>/posts`.
    pub fn to_suffix(&self) -> String {
        match self {
            Query::All => String::new(),
            Query::Sort { key, direction } => format!(
                "?sort={}&direction={}",
                encode(key),
                direction.as_str()
            ),
            Query::Search(pairs) => {
                let params = pairs
                    .iter()
                    .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
                    .collect::<Vec<_>>()
                    .join("&");
                format!("/search?{params}")
            }
        }
    }
}

pub fn sort_key(control_id: &str) -> &str {
    control_id
        .strip_suffix(SORT_CONTROL_SUFFIX)
        .unwrap_or(control_id)
}

fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, QUERY_COMPONENT).to_string()
}
