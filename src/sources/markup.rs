//! HTML text extraction for the line-oriented ISC pages.

use scraper::{Html, Selector};

/// Text nodes of the document body, in document order.
///
/// Each text node becomes one entry and keeps any newlines it contains; the
/// bibliography layout counts these entries, not visual lines.
pub fn extract_body_lines(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());

    match body {
        Some(body) => body.text().map(str::to_string).collect(),
        None => document.root_element().text().map(str::to_string).collect(),
    }
}

/// The page's visible text split into lines
pub fn extract_text_lines(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let text: String = document.root_element().text().collect();
    text.lines().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_text_nodes() {
        let html = "<html><head><title>ISC</title></head>\
                    <body><p>first</p>\n<pre> ISC event\nline two</pre></body></html>";
        let lines = extract_body_lines(html);
        assert_eq!(lines, vec!["first", "\n", " ISC event\nline two"]);
    }

    #[test]
    fn test_text_lines_split_on_newlines() {
        let html = "<html><body><pre>a\nb\n\nc</pre></body></html>";
        let lines = extract_text_lines(html);
        assert_eq!(lines, vec!["a", "b", "", "c"]);
    }
}
