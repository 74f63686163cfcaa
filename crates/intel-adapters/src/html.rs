use scraper::{ElementRef, Selector};

use crate::{text_or_none, AdapterError};

pub(crate) fn selector(source_tag: &str, css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css)
        .map_err(|err| AdapterError::parse(source_tag, format!("selector {css}: {err}")))
}

pub(crate) fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .next()
        .and_then(|node| text_or_none(&node.text().collect::<String>()))
}

pub(crate) fn first_attr(scope: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    scope
        .select(sel)
        .next()
        .and_then(|node| node.value().attr(attr))
        .and_then(text_or_none)
}
