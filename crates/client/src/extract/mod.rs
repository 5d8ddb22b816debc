//! Readable text extraction from a parsed document tree.
//!
//! ### Noise filtering
//! Script, style, noscript, iframe, img, video, audio, form and button
//! subtrees are skipped while walking the tree. The parsed document is never
//! mutated; matches nested inside a noise element are ignored.
//!
//! ### Field order
//! The combined `content` string joins, in order: title, meta description,
//! h1 text, h2 text, `article` text, `main` text, content-class/id text,
//! `p` text, `li` text. Each multi-element source concatenates its matches
//! with spaces first. The result is whitespace-collapsed and capped.

pub mod normalize;

pub use normalize::{clean_text, combine_fields};

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};
use webchat_core::{Headings, ScrapedContent};

/// Elements that carry no readable content.
pub const NOISE_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "img", "video", "audio", "form", "button"];

struct Selectors {
    title: Selector,
    meta_description: Selector,
    h1: Selector,
    h2: Selector,
    article: Selector,
    main: Selector,
    content_hint: Selector,
    paragraph: Selector,
    list_item: Selector,
}

static SELECTORS: LazyLock<Selectors> = LazyLock::new(|| {
    let parse = |s: &str| Selector::parse(s).expect("invalid selector");
    Selectors {
        title: parse("title"),
        meta_description: parse(r#"meta[name="description"]"#),
        h1: parse("h1"),
        h2: parse("h2"),
        article: parse("article"),
        main: parse("main"),
        content_hint: parse(r#".content, #content, [class*="content"]"#),
        paragraph: parse("p"),
        list_item: parse("li"),
    }
});

/// Fields pulled out of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,
    pub meta_description: String,
    pub h1: String,
    pub h2: String,
    /// Combined, cleaned and capped text.
    pub content: String,
}

impl ExtractedPage {
    /// Assemble a success-shaped record for `url`.
    pub fn into_scraped(self, url: &str) -> ScrapedContent {
        ScrapedContent::success(
            url,
            self.title,
            Headings { h1: self.h1, h2: self.h2, h3: None },
            self.meta_description,
            self.content,
        )
    }
}

fn is_noise(name: &str) -> bool {
    NOISE_TAGS.contains(&name)
}

fn inside_noise(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .any(|node| node.value().as_element().is_some_and(|e| is_noise(e.name())))
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if is_noise(e.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Text of every non-noise match, joined with spaces.
fn select_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .filter(|el| !is_noise(el.value().name()) && !inside_noise(el))
        .map(|el| {
            let mut text = String::new();
            push_text(el, &mut text);
            text
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract title, meta description, headings and combined content.
///
/// Pure function over the parsed tree.
pub fn extract(document: &Html) -> ExtractedPage {
    let s = &*SELECTORS;

    let title = select_text(document, &s.title);
    let meta_description = document
        .select(&s.meta_description)
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default()
        .to_string();
    let h1 = select_text(document, &s.h1);
    let h2 = select_text(document, &s.h2);

    let content = combine_fields(&[
        title.as_str(),
        meta_description.as_str(),
        h1.as_str(),
        h2.as_str(),
        select_text(document, &s.article).as_str(),
        select_text(document, &s.main).as_str(),
        select_text(document, &s.content_hint).as_str(),
        select_text(document, &s.paragraph).as_str(),
        select_text(document, &s.list_item).as_str(),
    ]);

    ExtractedPage {
        title: clean_text(&title),
        meta_description: clean_text(&meta_description),
        h1: clean_text(&h1),
        h2: clean_text(&h2),
        content,
    }
}

/// Parse an HTML string and extract from it.
pub fn extract_html(html: &str) -> ExtractedPage {
    extract(&Html::parse_document(html))
}
