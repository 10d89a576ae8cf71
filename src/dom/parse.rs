//! Build a [`Document`] from HTML markup with `scraper`.

use super::{Document, Element, NodeId};
use crate::error::{Error, Result};
use scraper::{ElementRef, Html, Node, Selector};

/// Parse a full HTML document.
///
/// Whitespace-only text nodes are dropped; comments, doctypes and
/// `<script>`/`<style>` bodies are skipped since nothing in the page model
/// reads them.
pub fn parse_document(html: &str) -> Result<Document> {
    let parsed = Html::parse_document(html);
    let mut doc = Document {
        nodes: Vec::new(),
        root: NodeId(0),
        body: NodeId(0),
        title: String::new(),
        url: String::new(),
    };

    let root_el = parsed.root_element();
    let root = doc.alloc(None, super::NodeData::Element(convert_element(&root_el)));
    doc.root = root;
    copy_children(&mut doc, root, root_el);

    let title_sel =
        Selector::parse("title").map_err(|e| Error::ParseError(format!("{:?}", e)))?;
    doc.title = parsed
        .select(&title_sel)
        .next()
        .map(|n| n.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    doc.body = doc
        .descendants(doc.root)
        .into_iter()
        .find(|n| doc.element(*n).map(|e| e.tag == "body").unwrap_or(false))
        .ok_or_else(|| Error::ParseError("document has no <body>".into()))?;

    log::debug!(
        "parsed page '{}' into {} nodes",
        doc.title,
        doc.nodes.len()
    );
    Ok(doc)
}

fn convert_element(el: &ElementRef<'_>) -> Element {
    let value = el.value();
    let mut element = Element::new(value.name());
    for (name, v) in value.attrs() {
        match name {
            "id" => element.id = Some(v.to_string()),
            "class" => {
                element.classes = v.split_whitespace().map(String::from).collect();
            }
            "style" => element.style = parse_style(v),
            _ => {
                element.attributes.insert(name.to_string(), v.to_string());
            }
        }
    }
    element
}

fn copy_children(doc: &mut Document, parent: NodeId, from: ElementRef<'_>) {
    if matches!(from.value().name(), "script" | "style") {
        return;
    }
    for child in from.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    let id = doc.create_element(parent, convert_element(&child_el));
                    copy_children(doc, id, child_el);
                }
            }
            Node::Text(t) => {
                let s: &str = t;
                if !s.trim().is_empty() {
                    doc.create_text(parent, s);
                }
            }
            _ => {}
        }
    }
}

/// Split an inline `style` attribute into declarations
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let (k, v) = (k.trim(), v.trim());
            if k.is_empty() {
                None
            } else {
                Some((k.to_ascii_lowercase(), v.to_string()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_classes_styles_and_text() {
        let doc = parse_document(
            r#"<!DOCTYPE html><html><head><title> Gallery </title><style>.x{}</style></head>
            <body>
              <div id="imageModal" class="modal  dark" style="display: none; z-index:10">
                <span class="close">&times;</span>
              </div>
              <script>window.gallery = null;</script>
            </body></html>"#,
        )
        .unwrap();
        assert_eq!(doc.title(), "Gallery");
        let modal = doc.require("imageModal").unwrap();
        let el = doc.element(modal).unwrap();
        assert_eq!(el.classes, vec!["modal", "dark"]);
        assert_eq!(el.style("display"), Some("none"));
        assert_eq!(el.style("z-index"), Some("10"));
        let close = doc.first_by_class("close").unwrap();
        assert_eq!(doc.text_content(close), "\u{d7}");
        assert!(!doc.text_content(doc.body()).contains("window.gallery"));
    }

    #[test]
    fn fragment_without_body_still_gets_one() {
        let doc = parse_document("<p>hi</p>").unwrap();
        assert_eq!(doc.text_content(doc.body()), "hi");
    }

    #[test]
    fn style_parser_skips_junk() {
        assert_eq!(
            parse_style("display:flex;;bogus; Color : Red "),
            vec![
                ("display".to_string(), "flex".to_string()),
                ("color".to_string(), "Red".to_string())
            ]
        );
    }
}
