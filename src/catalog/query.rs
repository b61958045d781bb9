//! Overview list queries
//!
//! Search, sort, pagination and per-field filters for the overview page, and
//! their parsing from raw query-string pairs.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Field holding `;`-separated author names
pub const AUTHOR_FIELD: &str = "auteur";
/// Field holding publication years (single years, ranges, "ca." notations)
pub const YEAR_FIELD: &str = "jaar";
pub const PLACE_FIELD: &str = "plaats_van_uitgave";

/// Fields the overview computes facet counts for
pub const FACET_FIELDS: [&str; 3] = [YEAR_FIELD, PLACE_FIELD, AUTHOR_FIELD];

/// Filter value meaning "no restriction"
pub const ALL_VALUES: &str = "all";

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// `desc` (any case) is descending, everything else ascending
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// A single- or multi-select filter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    /// Selected values, without empty and "all" entries
    pub fn values(&self) -> Vec<&str> {
        let raw: Vec<&str> = match self {
            FilterValue::One(value) => vec![value.as_str()],
            FilterValue::Many(values) => values.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .filter(|v| !v.is_empty() && *v != ALL_VALUES)
            .collect()
    }

    pub fn is_active(&self) -> bool {
        !self.values().is_empty()
    }

    fn push(&mut self, value: String) {
        match self {
            FilterValue::One(first) => {
                *self = FilterValue::Many(vec![std::mem::take(first), value]);
            }
            FilterValue::Many(values) => values.push(value),
        }
    }
}

/// A processed-overview request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    /// 1-based page number
    pub page: usize,
    pub limit: usize,
    /// Field filters: AND across fields, OR within one field
    pub fields: BTreeMap<String, FilterValue>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            search: None,
            sort_by: None,
            sort_order: SortOrder::Asc,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            fields: BTreeMap::new(),
        }
    }
}

impl ListQuery {
    pub fn with_search(mut self, term: &str) -> Self {
        self.search = Some(term.to_string());
        self
    }

    pub fn with_sort(mut self, field: &str, order: SortOrder) -> Self {
        self.sort_by = Some(field.to_string());
        self.sort_order = order;
        self
    }

    pub fn with_page(mut self, page: usize, limit: usize) -> Self {
        self.page = page.max(1);
        self.limit = limit.max(1);
        self
    }

    pub fn with_filter(mut self, field: &str, value: FilterValue) -> Self {
        self.fields.insert(field.to_string(), value);
        self
    }

    /// Build a query from raw query-string pairs (already split on `&`/`=`).
    ///
    /// Repeated keys accumulate. Author values are split on `;` and on commas
    /// that are not followed by whitespace (commas inside a name are followed
    /// by a space); year and place values are split on every comma.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        ListQuery::default().merge_pairs(pairs)
    }

    /// Apply raw query-string pairs on top of this query
    pub fn merge_pairs<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = self;

        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.as_ref();

            match key {
                "search" => {
                    let term = value.trim();
                    query.search = (!term.is_empty()).then(|| term.to_string());
                }
                "sortBy" => {
                    let field = value.trim();
                    query.sort_by = (!field.is_empty()).then(|| field.to_string());
                }
                "sortOrder" => query.sort_order = SortOrder::parse(value),
                "page" => query.page = parse_positive(value, DEFAULT_PAGE),
                "limit" => query.limit = parse_positive(value, DEFAULT_LIMIT),
                AUTHOR_FIELD => {
                    let decoded = decode(value.trim());
                    let authors = decoded
                        .split(';')
                        .flat_map(split_unspaced_commas)
                        .map(str::trim)
                        .filter(|a| !a.is_empty())
                        .map(str::to_string);
                    query.extend_multi(key, authors);
                }
                YEAR_FIELD | PLACE_FIELD => {
                    let values = value
                        .split(',')
                        .map(|v| decode(v.trim()).trim().to_string())
                        .filter(|v| !v.is_empty());
                    query.extend_multi(key, values);
                }
                _ => match query.fields.get_mut(key) {
                    Some(existing) => existing.push(value.to_string()),
                    None => {
                        query
                            .fields
                            .insert(key.to_string(), FilterValue::One(value.to_string()));
                    }
                },
            }
        }

        query
    }

    fn extend_multi(&mut self, key: &str, values: impl Iterator<Item = String>) {
        let entry = self
            .fields
            .entry(key.to_string())
            .or_insert_with(|| FilterValue::Many(Vec::new()));
        for value in values {
            entry.push(value);
        }
    }

    /// Query string for pagination links: everything except `page`
    pub fn to_query_string_without_page(&self) -> String {
        let mut parts = Vec::new();
        if let Some(search) = &self.search {
            parts.push(format!("search={}", urlencoding::encode(search)));
        }
        if let Some(sort_by) = &self.sort_by {
            parts.push(format!("sortBy={}", urlencoding::encode(sort_by)));
            parts.push(format!("sortOrder={}", self.sort_order.as_str()));
        }
        if self.limit != DEFAULT_LIMIT {
            parts.push(format!("limit={}", self.limit));
        }
        for (field, value) in &self.fields {
            for v in value.values() {
                parts.push(format!(
                    "{}={}",
                    urlencoding::encode(field),
                    urlencoding::encode(v)
                ));
            }
        }
        parts.join("&")
    }
}

fn parse_positive(value: &str, default: usize) -> usize {
    value.trim().parse::<usize>().unwrap_or(default).max(1)
}

/// Percent-decode, keeping the input when it is not valid encoding
pub(crate) fn decode(value: &str) -> Cow<'_, str> {
    urlencoding::decode(value).unwrap_or(Cow::Borrowed(value))
}

/// Split on commas that are not followed by whitespace
fn split_unspaced_commas(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut chars = value.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        let followed_by_space = chars.peek().is_some_and(|(_, next)| next.is_whitespace());
        if c == ',' && !followed_by_space {
            parts.push(&value[start..index]);
            start = index + 1;
        }
    }
    parts.push(&value[start..]);
    parts
}
