use crate::document::Document;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SEARCH_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Section,
    Button,
}

/// One searchable item: either a section or a button inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub page_index: usize,
    /// Position in the page's display order
    pub section_index: usize,
    pub button_index: Option<usize>,
    pub page_id: String,
    pub section_id: String,
    pub button_id: Option<String>,
    pub title: String,
    /// `Page / Section` or `Page / Section / Button`
    pub path: String,
    pub link: String,
    #[serde(skip)]
    haystack: String,
}

fn or_fallback(name: &str, fallback: impl FnOnce() -> String) -> String {
    if name.is_empty() {
        fallback()
    } else {
        name.to_string()
    }
}

/// Walks every page, section (in display order) and button.
pub fn build_search_index(doc: &Document) -> Vec<SearchEntry> {
    let mut index = Vec::new();

    for (page_index, page) in doc.pages.iter().enumerate() {
        let page_name = or_fallback(&page.name, || format!("Page {}", page_index + 1));

        for (section_index, (section_id, section)) in page.ordered_sections().enumerate() {
            let section_name = or_fallback(&section.text, || format!("Section {}", section_index + 1));
            let base_path = format!("{page_name} / {section_name}");

            index.push(SearchEntry {
                entry_type: EntryType::Section,
                page_index,
                section_index,
                button_index: None,
                page_id: page.id.clone(),
                section_id: section_id.clone(),
                button_id: None,
                title: section_name.clone(),
                path: base_path.clone(),
                link: String::new(),
                haystack: format!("{page_name} {section_name}").to_lowercase(),
            });

            for (button_index, button) in section.buttons.iter().enumerate() {
                let title = or_fallback(&button.text, || format!("Link {}", button_index + 1));
                index.push(SearchEntry {
                    entry_type: EntryType::Button,
                    page_index,
                    section_index,
                    button_index: Some(button_index),
                    page_id: page.id.clone(),
                    section_id: section_id.clone(),
                    button_id: Some(button.id.clone()),
                    path: format!("{base_path} / {title}"),
                    haystack: format!("{page_name} {section_name} {title} {}", button.href)
                        .to_lowercase(),
                    title,
                    link: button.href.clone(),
                });
            }
        }
    }

    tracing::debug!(entries = index.len(), "Search index rebuilt");
    index
}

/// Case-insensitive substring match, first `limit` hits in index order.
pub fn search_in_index(index: &[SearchEntry], query: &str, limit: usize) -> Vec<SearchEntry> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    index
        .iter()
        .filter(|entry| entry.haystack.contains(&needle))
        .take(limit)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut doc = Document::default_document();
        doc.edit_button(0, "section-1", "button-1", "Rust Docs", "docs.rs/tokio").unwrap();
        doc.rename_section(1, "section-2", "Reading").unwrap();
        doc
    }

    #[test]
    fn test_index_has_sections_and_buttons() {
        let index = build_search_index(&Document::default_document());
        assert_eq!(index.len(), 6);
        assert_eq!(index[0].entry_type, EntryType::Section);
        assert_eq!(index[0].path, "Page 1 / New Section");
        assert_eq!(index[1].path, "Page 1 / New Section / New button");
        assert_eq!(index[1].button_id.as_deref(), Some("button-1"));
    }

    #[test]
    fn test_finds_button_by_href_substring() {
        let index = build_search_index(&sample());
        let hits = search_in_index(&index, "TOKIO", DEFAULT_SEARCH_LIMIT);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Rust Docs");
        assert_eq!(hits[0].link, "https://docs.rs/tokio");
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let index = build_search_index(&sample());
        assert!(search_in_index(&index, "   ", DEFAULT_SEARCH_LIMIT).is_empty());
    }

    #[test]
    fn test_limit_is_respected() {
        let index = build_search_index(&sample());
        assert_eq!(search_in_index(&index, "page", 2).len(), 2);
    }

    #[test]
    fn test_blank_names_use_fallbacks() {
        let mut doc = Document::default_document();
        doc.pages[0].name.clear();
        doc.pages[0].sections.get_mut("section-1").unwrap().text.clear();
        doc.pages[0].sections.get_mut("section-1").unwrap().buttons[0].text.clear();
        let index = build_search_index(&doc);
        assert_eq!(index[1].path, "Page 1 / Section 1 / Link 1");
    }
}
