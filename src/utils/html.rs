use scraper::{ElementRef, Html, Selector};

// Text content of an element with runs of whitespace (including &nbsp;) collapsed and trimmed.
pub fn element_text(element: ElementRef) -> String {
    normalize_ws(&element.text().collect::<Vec<_>>().join(""))
}

pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Whole-document text, for predicates like "page mentions Log Out".
pub fn document_text(doc: &Html) -> String {
    element_text(doc.root_element())
}

// The `value` attribute of the element with this id, if the element exists.
pub fn value_by_id(doc: &Html, id: &str) -> Option<String> {
    let selector = Selector::parse(&format!("[id=\"{id}\"]")).ok()?;
    doc.select(&selector)
        .next()
        .map(|element| element.value().attr("value").unwrap_or("").to_string())
}

// Whether anything in the document matches `selector`.
pub fn has_match(doc: &Html, selector: &Selector) -> bool {
    doc.select(selector).next().is_some()
}

// Text of the first descendant matching `selector`, if there is one.
pub fn first_text(parent: ElementRef, selector: &Selector) -> Option<String> {
    parent.select(selector).next().map(element_text)
}
