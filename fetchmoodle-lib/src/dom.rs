//! Navigation helpers over a parsed HTML document.
//!
//! `tl` hands out a flat, document-ordered node list where every tag's descendants form a
//! contiguous run right after it. Everything here walks that list instead of relying on a selector
//! engine, so the extraction code can express "first `.instancename` below this activity" as plain
//! iterator chains.

use std::borrow::Cow;

use html_escape::decode_html_entities;
use tl::{HTMLTag, Node, Parser, ParserOptions, VDom};
use url::Url;

/// Tags whose boundaries start a new line when linearizing text.
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "dd",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "thead",
    "tr",
    "ul",
];

/// Tags whose content is never text.
const SKIPPED_TAGS: &[&str] = &["script", "style", "template", "noscript"];

/// A parsed HTML page.
pub struct Document<'a> {
    dom: VDom<'a>,
    base: Option<Url>,
}

impl<'a> Document<'a> {
    pub fn parse(html: &'a str) -> Result<Self, tl::errors::ParseError> {
        Ok(Self {
            dom: tl::parse(html, ParserOptions::default())?,
            base: None,
        })
    }

    /// Parse a page fetched from `base`, relative links are resolved against it.
    pub fn parse_with_base(html: &'a str, base: Url) -> Result<Self, tl::errors::ParseError> {
        let mut document = Self::parse(html)?;
        document.base = Some(base);
        Ok(document)
    }

    /// Every element of the document, in document order.
    pub fn elements(&self) -> impl Iterator<Item = Element<'_, 'a>> + '_ {
        let parser = self.dom.parser();
        let base = self.base.as_ref();
        self.dom
            .nodes()
            .iter()
            .filter_map(|node| node.as_tag())
            .map(move |tag| Element { tag, parser, base })
    }

    /// Top level elements of the document, usually just `<html>`.
    pub fn roots(&self) -> impl Iterator<Item = Element<'_, 'a>> + '_ {
        let parser = self.dom.parser();
        let base = self.base.as_ref();
        self.dom
            .children()
            .iter()
            .filter_map(move |handle| handle.get(parser))
            .filter_map(|node| node.as_tag())
            .map(move |tag| Element { tag, parser, base })
    }

    pub fn find<'d, P>(&'d self, predicate: P) -> Option<Element<'d, 'a>>
    where
        P: FnMut(&Element<'d, 'a>) -> bool,
    {
        self.elements().find(predicate)
    }

    pub fn find_class(&self, class: &str) -> Option<Element<'_, 'a>> {
        self.find(|element| element.has_class(class))
    }

    pub fn find_id(&self, id: &str) -> Option<Element<'_, 'a>> {
        self.find(|element| element.attr("id").is_some_and(|value| value == id))
    }

    pub fn body(&self) -> Option<Element<'_, 'a>> {
        self.find(|element| element.is("body"))
    }

    /// Text of the `<title>` element.
    pub fn title(&self) -> Option<String> {
        self.find(|element| element.is("title"))
            .map(|element| element.text())
    }
}

/// A single element borrowed from a [`Document`].
#[derive(Clone, Copy)]
pub struct Element<'d, 'a> {
    tag: &'d HTMLTag<'a>,
    parser: &'d Parser<'a>,
    base: Option<&'d Url>,
}

impl<'d, 'a> Element<'d, 'a> {
    /// Lowercase tag name.
    pub fn name(&self) -> String {
        self.tag.name().as_utf8_str().to_ascii_lowercase()
    }

    pub fn is(&self, name: &str) -> bool {
        self.tag.name().as_utf8_str().eq_ignore_ascii_case(name)
    }

    /// Attribute value with character references decoded.
    pub fn attr(&self, key: &'static str) -> Option<Cow<'d, str>> {
        let tag = self.tag;
        tag.attributes()
            .get(key)
            .flatten()
            .map(|value| match value.as_utf8_str() {
                Cow::Borrowed(raw) => decode_html_entities(raw),
                Cow::Owned(raw) => Cow::Owned(decode_html_entities(&raw).into_owned()),
            })
    }

    /// Attribute resolved into an absolute url against the page it came from.
    ///
    /// Falls back to the raw value when there is no page url or the value cannot be joined.
    pub fn abs_attr(&self, key: &'static str) -> Option<String> {
        let value = self.attr(key)?;
        Some(
            self.base
                .and_then(|base| base.join(&value).ok())
                .map(String::from)
                .unwrap_or_else(|| value.into_owned()),
        )
    }

    pub fn classes(&self) -> impl Iterator<Item = String> {
        self.attr("class")
            .map(|class| {
                class
                    .split_whitespace()
                    .map(ToOwned::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
            .into_iter()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|name| name == class))
    }

    /// Every descendant element, in document order.
    pub fn descendants(&self) -> impl Iterator<Item = Element<'d, 'a>> + 'd {
        let Element { tag, parser, base } = *self;
        tag.children()
            .all(parser)
            .iter()
            .filter_map(|node| node.as_tag())
            .map(move |tag| Element { tag, parser, base })
    }

    /// Direct child elements.
    pub fn children(&self) -> impl Iterator<Item = Element<'d, 'a>> + 'd {
        let Element { parser, base, .. } = *self;
        self.child_nodes()
            .filter_map(|node| node.as_tag())
            .map(move |tag| Element { tag, parser, base })
    }

    fn child_nodes(&self) -> impl Iterator<Item = &'d Node<'a>> + 'd {
        let Element { tag, parser, .. } = *self;
        let handles = tag.children().top().as_slice().to_vec();
        handles
            .into_iter()
            .filter_map(move |handle| handle.get(parser))
    }

    pub fn find<P>(&self, predicate: P) -> Option<Element<'d, 'a>>
    where
        P: FnMut(&Element<'d, 'a>) -> bool,
    {
        self.descendants().find(predicate)
    }

    pub fn find_class(&self, class: &str) -> Option<Element<'d, 'a>> {
        self.find(|element| element.has_class(class))
    }

    /// Text of this element and its descendants with whitespace collapsed, like a browser's
    /// `innerText` on a single line.
    pub fn text(&self) -> String {
        self.text_without(|_| false)
    }

    /// Like [`text`](Self::text), leaving out every subtree `skip` matches.
    pub fn text_without<F>(&self, skip: F) -> String
    where
        F: Fn(&Element<'d, 'a>) -> bool,
    {
        let mut text = TextBuilder::default();
        self.collect_text(&mut text, &skip, false);
        text.finish_line()
    }

    /// Text directly inside this element, ignoring child elements.
    pub fn own_text(&self) -> String {
        let mut text = TextBuilder::default();
        for node in self.child_nodes() {
            if let Node::Raw(raw) = node {
                text.push_str(&decode_html_entities(&raw.as_utf8_str()));
            }
        }
        text.finish_line()
    }

    pub fn has_text(&self) -> bool {
        !self.text().is_empty()
    }

    /// Text with a line break at every block boundary, for rich text such as descriptions and
    /// summaries.
    pub fn all_text(&self) -> String {
        let mut text = TextBuilder::default();
        self.collect_text(&mut text, &|_| false, true);
        text.finish()
    }

    /// Raw markup between this element's start and end tags.
    pub fn inner_html(&self) -> String {
        self.tag.inner_html(self.parser).into()
    }

    fn collect_text<F>(&self, text: &mut TextBuilder, skip: &F, lines: bool)
    where
        F: Fn(&Element<'d, 'a>) -> bool,
    {
        let Element { parser, base, .. } = *self;
        for node in self.child_nodes() {
            match node {
                Node::Raw(raw) => text.push_str(&decode_html_entities(&raw.as_utf8_str())),
                Node::Tag(tag) => {
                    let child = Element { tag, parser, base };
                    let name = child.name();
                    if SKIPPED_TAGS.contains(&name.as_str()) || skip(&child) {
                        continue;
                    }

                    let block = name == "br" || BLOCK_TAGS.contains(&name.as_str());
                    if block {
                        if lines {
                            text.break_line();
                        } else {
                            text.push_space();
                        }
                    }
                    child.collect_text(text, skip, lines);
                    if block {
                        if lines {
                            text.break_line();
                        } else {
                            text.push_space();
                        }
                    }
                }
                Node::Comment(_) => {}
            }
        }
    }
}

/// Accumulates text into lines, collapsing runs of whitespace.
#[derive(Default)]
struct TextBuilder {
    lines: Vec<String>,
    line: String,
    pending_space: bool,
}

impl TextBuilder {
    fn push_str(&mut self, s: &str) {
        for c in s.chars() {
            if c.is_whitespace() {
                self.pending_space = true;
            } else {
                if self.pending_space && !self.line.is_empty() {
                    self.line.push(' ');
                }
                self.pending_space = false;
                self.line.push(c);
            }
        }
    }

    fn push_space(&mut self) {
        self.pending_space = true;
    }

    fn break_line(&mut self) {
        if !self.line.is_empty() {
            self.lines.push(std::mem::take(&mut self.line));
        }
        self.pending_space = false;
    }

    fn finish_line(mut self) -> String {
        self.break_line();
        self.lines.join(" ")
    }

    fn finish(mut self) -> String {
        self.break_line();
        self.lines.join("\n")
    }
}
