//! Overview processing
//!
//! Pure functions over an item collection: search, field filters, facet
//! counts, sorting and pagination. None of them mutate their input.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::item::{value_to_string, Item};
use super::query::{
    decode, FilterValue, ListQuery, SortOrder, AUTHOR_FIELD, FACET_FIELDS, YEAR_FIELD,
};

/// `(value, count)` pair of a facet
pub type FacetEntry = (String, usize);

/// Facet counts per field
pub type Aggregations = BTreeMap<String, Vec<FacetEntry>>;

/// One page of a sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Length of the whole sequence
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn empty(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            page: 1,
            limit,
            total_pages: 0,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

/// A processed overview page with its facet counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedPage {
    #[serde(flatten)]
    pub page: Page<Item>,
    pub aggregations: Aggregations,
}

/// Filter, aggregate, sort and paginate in one pass.
///
/// Facet counts are computed over the whole collection, not the filtered
/// result, so every option stays visible while filters are applied.
pub fn process(data: &[Item], query: &ListQuery) -> ProcessedPage {
    let mut items = filter(data, query.search.as_deref(), &query.fields);
    let aggregations = aggregate(data, &FACET_FIELDS, &query.fields);

    if let Some(sort_by) = &query.sort_by {
        sort_items(&mut items, sort_by, query.sort_order);
    }

    let page = paginate(&items, query.page, query.limit).map(Item::clone);
    debug!(
        total = page.total,
        page = page.page,
        total_pages = page.total_pages,
        "Processed overview"
    );

    ProcessedPage { page, aggregations }
}

/// Items matching the search term and every active field filter
pub fn filter<'a>(
    data: &'a [Item],
    search: Option<&str>,
    fields: &BTreeMap<String, FilterValue>,
) -> Vec<&'a Item> {
    let term = search
        .filter(|term| !term.trim().is_empty())
        .map(str::to_lowercase);

    let active: Vec<(&str, Vec<&str>)> = fields
        .iter()
        .filter(|(field, _)| field.as_str() != "search")
        .map(|(field, value)| (field.as_str(), value.values()))
        .filter(|(_, values)| !values.is_empty())
        .collect();

    for (field, values) in &active {
        debug!(field = field, values = ?values, "Applying filter");
    }

    data.iter()
        .filter(|item| term.as_deref().map_or(true, |t| matches_search(item, t)))
        .filter(|item| {
            active
                .iter()
                .all(|(field, values)| matches_field(item, field, values))
        })
        .collect()
}

/// Case-insensitive substring match on title, description and metadata.
///
/// `term` must already be lowercased. Only strings count; inside sequences,
/// non-string entries are skipped.
pub fn matches_search(item: &Item, term: &str) -> bool {
    let contains = |s: &str| s.to_lowercase().contains(term);

    let in_text = [&item.title, &item.description]
        .into_iter()
        .filter_map(|value| value.as_ref().and_then(Value::as_str))
        .any(|s| contains(s));

    in_text
        || item.metadata.values().any(|value| match value {
            Value::String(s) => contains(s),
            Value::Array(values) => values
                .iter()
                .filter_map(Value::as_str)
                .any(|s| contains(s)),
            _ => false,
        })
}

/// Whether the item's value for `field` equals any of `values`
pub fn matches_field(item: &Item, field: &str, values: &[&str]) -> bool {
    let Some(item_value) = item.field(field) else {
        return false;
    };

    if field == AUTHOR_FIELD {
        if let Value::String(authors) = &item_value {
            return authors
                .split(';')
                .map(str::trim)
                .any(|author| values.iter().any(|v| v.trim() == author));
        }
    }

    let item_value = value_to_string(&item_value);
    let item_value = item_value.trim();

    values.iter().any(|v| {
        let v = v.trim();
        if field == YEAR_FIELD {
            year_matches(v, item_value)
        } else {
            v == item_value
        }
    })
}

/// Strip bracket, circa and whitespace noise from a year notation
pub fn clean_year(year: &str) -> String {
    year.chars()
        .filter(|c| !matches!(c, '[' | ']' | 'c' | 'a' | '.') && !c.is_whitespace())
        .collect()
}

/// Year filter match: equal after cleaning, or two ranges with the same start year
pub fn year_matches(filter: &str, item: &str) -> bool {
    let filter = clean_year(filter);
    let item = clean_year(item);

    if filter == item {
        return true;
    }

    match (filter.split_once('-'), item.split_once('-')) {
        (Some((filter_start, _)), Some((item_start, _))) => filter_start == item_start,
        _ => false,
    }
}

/// First four-digit run of a cleaned year notation, or 0
pub fn year_number(year: &str) -> u32 {
    let cleaned = clean_year(year);
    cleaned
        .as_bytes()
        .windows(4)
        .find(|w| w.iter().all(u8::is_ascii_digit))
        .and_then(|w| std::str::from_utf8(w).ok())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// Stable sort on a field; items without the field go last in both directions
pub fn sort_items(items: &mut Vec<&Item>, field: &str, order: SortOrder) {
    let mut keyed: Vec<(Option<Value>, &Item)> =
        items.iter().map(|item| (item.field(field), *item)).collect();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ordering = compare_values(a, b);
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        }
    });

    *items = keyed.into_iter().map(|(_, item)| item).collect();
}

/// Numbers numerically, strings lexicographically, anything else by string form
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => value_to_string(a).cmp(&value_to_string(b)),
    }
}

/// Facet counts for `fields` over the whole collection.
///
/// Selected values come first (in selection order for years, alphabetically
/// otherwise). The rest are ordered by year number for the year field and
/// alphabetically for every other field.
pub fn aggregate(
    data: &[Item],
    fields: &[&str],
    filters: &BTreeMap<String, FilterValue>,
) -> Aggregations {
    fields
        .iter()
        .map(|&field| {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for item in data {
                let Some(value) = item.field(field) else {
                    continue;
                };
                match (&value, field == AUTHOR_FIELD) {
                    (Value::String(authors), true) => {
                        for author in authors.split(';').map(str::trim).filter(|a| !a.is_empty()) {
                            *counts.entry(author.to_string()).or_default() += 1;
                        }
                    }
                    (_, true) => {}
                    (value, false) => {
                        *counts.entry(value_to_string(value)).or_default() += 1;
                    }
                }
            }

            let selected = selected_values(field, filters.get(field));
            let mut entries: Vec<FacetEntry> = counts.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| compare_facets(field, &selected, a, b));

            (field.to_string(), entries)
        })
        .collect()
}

/// Selected filter values for a facet, decoded the way the query parser does
fn selected_values(field: &str, filter: Option<&FilterValue>) -> Vec<String> {
    let Some(filter) = filter else {
        return Vec::new();
    };

    let values = filter.values();
    if field == AUTHOR_FIELD {
        values
            .into_iter()
            .map(|v| decode(v.trim()).into_owned())
            .collect()
    } else {
        values
            .into_iter()
            .flat_map(|v| v.split(','))
            .map(|v| decode(v.trim()).into_owned())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

fn compare_facets(field: &str, selected: &[String], a: &str, b: &str) -> Ordering {
    let a_pos = selected.iter().position(|s| s == a);
    let b_pos = selected.iter().position(|s| s == b);

    match (a_pos, b_pos) {
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(a_pos), Some(b_pos)) if field == YEAR_FIELD => a_pos.cmp(&b_pos),
        (Some(_), Some(_)) => alphabetical(a, b),
        (None, None) if field == YEAR_FIELD => {
            match (year_number(a), year_number(b)) {
                (0, 0) => alphabetical(a, b),
                (0, _) => Ordering::Greater,
                (_, 0) => Ordering::Less,
                (ya, yb) => ya.cmp(&yb).then_with(|| alphabetical(a, b)),
            }
        }
        (None, None) => alphabetical(a, b),
    }
}

/// Case-insensitive order with a case-sensitive tiebreak
fn alphabetical(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Slice out one page. `page` is 1-based; zero values are raised to 1.
pub fn paginate<T: Clone>(data: &[T], page: usize, limit: usize) -> Page<T> {
    let page = page.max(1);
    let limit = limit.max(1);
    let start = (page - 1).saturating_mul(limit);

    Page {
        data: data.iter().skip(start).take(limit).cloned().collect(),
        total: data.len(),
        page,
        limit,
        total_pages: data.len().div_ceil(limit),
    }
}

/// Paginate an untyped value; anything but a sequence gives an empty page
pub fn paginate_value(data: &Value, page: usize, limit: usize) -> Page<Value> {
    match data {
        Value::Array(values) => paginate(values, page, limit),
        _ => Page::empty(limit.max(1)),
    }
}

/// First item whose top-level `field` loosely equals `value`
pub fn find_by<'a>(data: &'a [Item], field: &str, value: &str) -> Option<&'a Item> {
    data.iter().find(|item| {
        item.top_level(field)
            .is_some_and(|v| !v.is_null() && value_to_string(&v) == value)
    })
}

pub fn find_by_id<'a>(data: &'a [Item], id: &str) -> Option<&'a Item> {
    find_by(data, "id", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(raw: Value) -> Vec<Item> {
        raw.as_array()
            .unwrap()
            .iter()
            .cloned()
            .filter_map(Item::from_api)
            .collect()
    }

    fn ids(items: &[&Item]) -> Vec<String> {
        items.iter().map(|i| i.id.clone()).collect()
    }

    fn one(value: &str) -> FilterValue {
        FilterValue::One(value.to_string())
    }

    fn filters(pairs: &[(&str, FilterValue)]) -> BTreeMap<String, FilterValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn collection() -> Vec<Item> {
        items(json!([
            {"id": 1, "title": "Kaart van Holland", "metadata": {"jaar": "1690", "auteur": "Visscher, N.; Blaeu, J.", "plaats_van_uitgave": "Amsterdam"}},
            {"id": 2, "title": "Atlas Maior", "description": "Wereldatlas", "metadata": {"jaar": "1662-1665", "auteur": "Blaeu, J.", "plaats_van_uitgave": "Amsterdam"}},
            {"id": 3, "title": "Stadsplattegrond", "metadata": {"jaar": "[ca. 1700]", "auteur": "Hondius, H.", "plaats_van_uitgave": "Leiden", "trefwoorden": ["Zeeland", 1234]}},
            {"id": 4, "title": "Zeekaart", "metadata": {"jaar": "1750", "plaats_van_uitgave": "leiden"}}
        ]))
    }

    #[test]
    fn test_year_range_matching() {
        let data = items(json!([
            {"id": "a", "metadata": {"jaar": "1990"}},
            {"id": "b", "metadata": {"jaar": "1990-1995"}},
            {"id": "c", "metadata": {"jaar": "2000"}}
        ]));

        let result = filter(&data, None, &filters(&[("jaar", one("1990-1995"))]));
        assert_eq!(ids(&result), vec!["b"]);

        let result = filter(&data, None, &filters(&[("jaar", one("1990-1993"))]));
        assert_eq!(ids(&result), vec!["b"]);

        let result = filter(&data, None, &filters(&[("jaar", one("1990"))]));
        assert_eq!(ids(&result), vec!["a"]);
    }

    #[test]
    fn test_year_cleaning() {
        assert_eq!(clean_year("[ca. 1700]"), "1700");
        assert!(year_matches("1700", "[ca. 1700]"));
        assert!(!year_matches("1700", "1700-1710"));
        assert_eq!(year_number("[ca. 1700]"), 1700);
        assert_eq!(year_number("1662-1665"), 1662);
        assert_eq!(year_number("onbekend"), 0);
    }

    #[test]
    fn test_author_filter_splits_on_semicolons() {
        let data = items(json!([{"id": "x", "metadata": {"auteur": "Jansen, P.; de Vries, A."}}]));

        let result = filter(&data, None, &filters(&[("auteur", one("de Vries, A."))]));
        assert_eq!(ids(&result), vec!["x"]);

        let result = filter(&data, None, &filters(&[("auteur", one("Vries"))]));
        assert!(result.is_empty());
    }

    #[test]
    fn test_filters_and_across_fields_or_within() {
        let data = collection();

        let result = filter(
            &data,
            None,
            &filters(&[(
                "plaats_van_uitgave",
                FilterValue::Many(vec!["Amsterdam".into(), "leiden".into()]),
            )]),
        );
        assert_eq!(ids(&result), vec!["1", "2", "4"]);

        let result = filter(
            &data,
            None,
            &filters(&[
                ("plaats_van_uitgave", one("Amsterdam")),
                ("auteur", one("Visscher, N.")),
            ]),
        );
        assert_eq!(ids(&result), vec!["1"]);
    }

    #[test]
    fn test_empty_and_all_filters_are_ignored() {
        let data = collection();
        let result = filter(
            &data,
            None,
            &filters(&[("jaar", one("all")), ("auteur", FilterValue::Many(vec![]))]),
        );
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_missing_field_excludes_item() {
        let data = collection();
        let result = filter(&data, None, &filters(&[("auteur", one("Blaeu, J."))]));
        assert_eq!(ids(&result), vec!["1", "2"]);
    }

    #[test]
    fn test_search_covers_text_and_metadata() {
        let data = collection();

        assert_eq!(ids(&filter(&data, Some("WERELD"), &BTreeMap::new())), vec!["2"]);
        assert_eq!(ids(&filter(&data, Some("hondius"), &BTreeMap::new())), vec!["3"]);
        // Sequence values are searched, non-string entries skipped
        assert_eq!(ids(&filter(&data, Some("zeeland"), &BTreeMap::new())), vec!["3"]);
        assert!(filter(&data, Some("1234"), &BTreeMap::new()).is_empty());
        // Empty term matches everything
        assert_eq!(filter(&data, Some(""), &BTreeMap::new()).len(), 4);
    }

    #[test]
    fn test_search_on_metadata_only() {
        let data = items(json!([{"id": "m", "metadata": {"notes": "Hidden gem"}}]));
        assert_eq!(ids(&filter(&data, Some("gem"), &BTreeMap::new())), vec!["m"]);
    }

    #[test]
    fn test_search_skips_non_text_title() {
        let data = items(json!([
            {"id": "n", "title": 1984},
            {"id": "d", "description": ["deel 1", "deel 2"]},
            {"id": "t", "title": "Deel 1984"}
        ]));
        assert_eq!(ids(&filter(&data, Some("1984"), &BTreeMap::new())), vec!["t"]);
        assert!(filter(&data, Some("deel 2"), &BTreeMap::new()).is_empty());
        assert_eq!(find_by(&data, "title", "1984").unwrap().id, "n");
    }

    #[test]
    fn test_pagination() {
        let data: Vec<u32> = (1..=25).collect();

        let page = paginate(&data, 2, 10);
        assert_eq!(page.data, (11..=20).collect::<Vec<u32>>());
        assert_eq!(page.total_pages, 3);

        let page = paginate(&data, 3, 10);
        assert_eq!(page.data, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);

        let page = paginate(&data, 4, 10);
        assert!(page.data.is_empty());
        assert_eq!(page.total_pages, 3);

        let page = paginate(&data, 0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.data, vec![1]);
    }

    #[test]
    fn test_paginate_non_sequence() {
        let page = paginate_value(&json!({"not": "a list"}), 2, 12);
        assert_eq!(page, Page::empty(12));
        assert_eq!(page.total_pages, 0);

        let page = paginate_value(&json!([1, 2, 3]), 1, 2);
        assert_eq!(page.data, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_sort_nulls_last_both_directions() {
        let data = items(json!([
            {"id": "none"},
            {"id": "b", "metadata": {"rank": 2}},
            {"id": "a", "metadata": {"rank": 10}},
            {"id": "c", "metadata": {"rank": 1}}
        ]));
        let mut refs: Vec<&Item> = data.iter().collect();

        sort_items(&mut refs, "rank", SortOrder::Asc);
        assert_eq!(ids(&refs), vec!["c", "b", "a", "none"]);

        sort_items(&mut refs, "rank", SortOrder::Desc);
        assert_eq!(ids(&refs), vec!["a", "b", "c", "none"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let data = items(json!([
            {"id": "1", "title": "B"},
            {"id": "2", "title": "A"},
            {"id": "3", "title": "B"}
        ]));
        let mut refs: Vec<&Item> = data.iter().collect();
        sort_items(&mut refs, "title", SortOrder::Asc);
        assert_eq!(ids(&refs), vec!["2", "1", "3"]);
    }

    #[test]
    fn test_aggregation_ordering() {
        let data = collection();
        let aggregations = aggregate(
            &data,
            &FACET_FIELDS,
            &filters(&[("jaar", FilterValue::Many(vec!["1750".into(), "1690".into()]))]),
        );

        let years: Vec<&str> = aggregations["jaar"].iter().map(|(v, _)| v.as_str()).collect();
        assert_eq!(years, vec!["1750", "1690", "1662-1665", "[ca. 1700]"]);

        let places = &aggregations["plaats_van_uitgave"];
        assert_eq!(
            places,
            &vec![
                ("Amsterdam".to_string(), 2),
                ("Leiden".to_string(), 1),
                ("leiden".to_string(), 1)
            ]
        );

        let authors = &aggregations["auteur"];
        assert_eq!(authors[0], ("Blaeu, J.".to_string(), 2));
        assert_eq!(authors.len(), 3);
    }

    #[test]
    fn test_selected_year_comes_first() {
        let data = items(json!([
            {"id": "a", "metadata": {"jaar": "1990"}},
            {"id": "b", "metadata": {"jaar": "2000"}},
            {"id": "c", "metadata": {"jaar": "1800"}}
        ]));
        let aggregations = aggregate(&data, &[YEAR_FIELD], &filters(&[("jaar", one("2000"))]));
        let years: Vec<&str> = aggregations["jaar"].iter().map(|(v, _)| v.as_str()).collect();
        assert_eq!(years, vec!["2000", "1800", "1990"]);
    }

    #[test]
    fn test_selected_authors_come_first() {
        let data = collection();
        let aggregations = aggregate(
            &data,
            &[AUTHOR_FIELD],
            &filters(&[("auteur", one("Visscher%2C%20N."))]),
        );
        assert_eq!(aggregations["auteur"][0], ("Visscher, N.".to_string(), 1));
        assert_eq!(aggregations.len(), 1);
    }

    #[test]
    fn test_process_envelope() {
        let data = collection();
        let query = ListQuery::default()
            .with_filter("plaats_van_uitgave", one("Amsterdam"))
            .with_sort("jaar", SortOrder::Asc)
            .with_page(1, 1);

        let result = process(&data, &query);
        assert_eq!(result.page.total, 2);
        assert_eq!(result.page.total_pages, 2);
        assert_eq!(result.page.data[0].id, "2");
        // Facets still see the whole collection
        assert_eq!(result.aggregations["jaar"].len(), 4);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["totalPages"], json!(2));
        assert!(value["aggregations"]["auteur"].is_array());
    }

    #[test]
    fn test_process_does_not_mutate_input() {
        let data = collection();
        let before = data.clone();
        let query = ListQuery::default().with_sort("title", SortOrder::Desc);
        process(&data, &query);
        assert_eq!(data, before);
    }

    #[test]
    fn test_find_by() {
        let data = collection();
        assert_eq!(find_by_id(&data, "3").unwrap().title_text(), Some("Stadsplattegrond"));
        assert!(find_by_id(&data, "99").is_none());
        assert_eq!(find_by(&data, "title", "Zeekaart").unwrap().id, "4");
        // Only top-level properties are compared
        assert!(find_by(&data, "jaar", "1750").is_none());
    }
}
