//! Typed view construction.
//!
//! Controllers never build markup from strings. They build `View` trees with
//! the helpers here and mount them into the document; any HTML that leaves
//! the crate goes through [`View::to_html`], which escapes every text node and
//! attribute value.

use crate::models::{GalleryEntry, ImageResult, ModelDescriptor};
use crate::toast::Severity;

/// A detached element descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ElementView {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub style: Vec<(String, String)>,
    pub children: Vec<View>,
}

/// A node of a view tree
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Element(ElementView),
    Text(String),
}

/// Start an element descriptor
pub fn el(tag: &str) -> ElementView {
    ElementView {
        tag: tag.to_ascii_lowercase(),
        id: None,
        classes: Vec::new(),
        attributes: Vec::new(),
        style: Vec::new(),
        children: Vec::new(),
    }
}

/// A text node. Escaped on serialization.
pub fn text(s: impl Into<String>) -> View {
    View::Text(s.into())
}

impl ElementView {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add one or more space separated classes
    pub fn class(mut self, class: &str) -> Self {
        for c in class.split_whitespace() {
            if !self.classes.iter().any(|existing| existing == c) {
                self.classes.push(c.to_string());
            }
        }
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
        self
    }

    pub fn style(mut self, property: &str, value: impl Into<String>) -> Self {
        self.style.push((property.to_string(), value.into()));
        self
    }

    pub fn child(mut self, child: impl Into<View>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn text(self, s: impl Into<String>) -> Self {
        self.child(text(s))
    }

    pub fn into_view(self) -> View {
        View::Element(self)
    }
}

impl From<ElementView> for View {
    fn from(e: ElementView) -> Self {
        View::Element(e)
    }
}

const VOID_TAGS: &[&str] = &["img", "input", "br", "hr", "meta", "link"];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

impl View {
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            View::Text(t) => out.push_str(&escape_text(t)),
            View::Element(e) => {
                let mut attrs: Vec<(String, String)> = Vec::new();
                if let Some(id) = &e.id {
                    attrs.push(("id".into(), id.clone()));
                }
                if !e.classes.is_empty() {
                    attrs.push(("class".into(), e.classes.join(" ")));
                }
                attrs.extend(e.attributes.iter().cloned());
                if !e.style.is_empty() {
                    attrs.push(("style".into(), style_string(e.style.iter())));
                }
                open_tag(out, &e.tag, &attrs);
                if is_void(&e.tag) {
                    return;
                }
                for c in &e.children {
                    c.write_html(out);
                }
                out.push_str("</");
                out.push_str(&e.tag);
                out.push('>');
            }
        }
    }
}

pub(crate) fn open_tag(out: &mut String, tag: &str, attrs: &[(String, String)]) {
    out.push('<');
    out.push_str(tag);
    for (k, v) in attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape_attr(v));
        out.push('"');
    }
    out.push('>');
}

pub(crate) fn style_string<'a, I>(decls: I) -> String
where
    I: Iterator<Item = &'a (String, String)>,
{
    decls
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

// --- Page fragments ---

/// A generated image card: image, prompt, model label and a download button.
///
/// The download target travels in `data-url` / `data-filename`; the
/// controller reads them back when the button is clicked.
pub fn result_card(image: &ImageResult) -> View {
    el("div")
        .class("result-item")
        .child(
            el("img")
                .class("result-image")
                .attr("src", image.url.as_str())
                .attr("alt", "Generated image")
                .attr("loading", "lazy"),
        )
        .child(
            el("div")
                .class("result-info")
                .child(el("div").class("result-prompt").text(image.prompt.as_str()))
                .child(
                    el("div")
                        .class("result-meta")
                        .child(el("span").text(format!("Model: {}", image.model)))
                        .child(
                            el("button")
                                .class("download-btn")
                                .attr("type", "button")
                                .attr("data-url", image.url.as_str())
                                .attr("data-filename", image.filename.as_str())
                                .child(el("i").class("fas fa-download"))
                                .text("Download"),
                        ),
                ),
        )
        .into_view()
}

/// Toast body: severity icon plus message
pub fn toast(message: &str, severity: Severity) -> View {
    el("div")
        .class("toast")
        .class(severity.as_str())
        .child(el("i").class("fas").class(severity.icon()))
        .child(el("span").text(message))
        .into_view()
}

pub fn model_option(model: &ModelDescriptor) -> View {
    el("option")
        .attr("value", model.id.as_str())
        .text(model.label())
        .into_view()
}

/// An option with an empty value, used for "Loading models..." and friends
pub fn placeholder_option(label: &str) -> View {
    el("option").attr("value", "").text(label).into_view()
}

/// A gallery grid item carrying its image metadata in data attributes
pub fn gallery_item(entry: &GalleryEntry) -> View {
    let mut item = el("div")
        .class("gallery-item")
        .attr("data-url", entry.url.as_str())
        .attr("data-filename", entry.filename.as_str())
        .attr("data-timestamp", entry.timestamp.as_str());
    if let Some(size) = entry.size {
        item = item.attr("data-size", size.to_string());
    }
    item.child(
        el("img")
            .class("gallery-image")
            .attr("src", entry.url.as_str())
            .attr("alt", entry.filename.as_str())
            .attr("loading", "lazy"),
    )
    .child(
        el("div")
            .class("image-overlay")
            .child(
                el("button")
                    .class("view-btn")
                    .attr("type", "button")
                    .child(el("i").class("fas fa-expand"))
                    .text("View"),
            )
            .child(
                el("button")
                    .class("download-btn")
                    .attr("type", "button")
                    .attr("data-url", entry.url.as_str())
                    .attr("data-filename", entry.filename.as_str())
                    .child(el("i").class("fas fa-download"))
                    .text("Download"),
            ),
    )
    .child(
        el("div")
            .class("image-info")
            .child(el("div").class("image-name").text(entry.filename.as_str()))
            .child(el("div").class("image-date").text(entry.timestamp.as_str())),
    )
    .into_view()
}

/// The invisible anchor a download is routed through
pub fn download_anchor(url: &str, filename: &str) -> View {
    el("a")
        .attr("href", url)
        .attr("download", filename)
        .style("display", "none")
        .into_view()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(prompt: &str, filename: &str) -> ImageResult {
        ImageResult {
            url: "/img/1.png".into(),
            prompt: prompt.into(),
            model: "m1".into(),
            filename: filename.into(),
            timestamp: None,
            storage: None,
        }
    }

    #[test]
    fn result_card_escapes_untrusted_text() {
        let html = result_card(&image("<script>alert(1)</script>", "a\"b.png")).to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("data-filename=\"a&quot;b.png\""));
    }

    #[test]
    fn result_card_shape() {
        let html = result_card(&image("a red fox", "1.png")).to_html();
        assert!(html.starts_with("<div class=\"result-item\"><img class=\"result-image\" src=\"/img/1.png\""));
        assert!(html.contains("<div class=\"result-prompt\">a red fox</div>"));
        assert!(html.contains("<span>Model: m1</span>"));
        // void element has no closing tag
        assert!(!html.contains("</img>"));
    }

    #[test]
    fn toast_carries_severity_class_and_icon() {
        let html = toast("Saved", Severity::Success).to_html();
        assert_eq!(
            html,
            "<div class=\"toast success\"><i class=\"fas fa-check-circle\"></i><span>Saved</span></div>"
        );
    }

    #[test]
    fn class_dedups() {
        let e = el("div").class("a b").class("b c");
        assert_eq!(e.classes, vec!["a", "b", "c"]);
    }

    #[test]
    fn anchor_is_hidden() {
        let html = download_anchor("/media/x.png", "x.png").to_html();
        assert_eq!(
            html,
            "<a href=\"/media/x.png\" download=\"x.png\" style=\"display: none\"></a>"
        );
    }
}
