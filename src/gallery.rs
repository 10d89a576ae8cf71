//! Gallery page controller: staggered entrance of the grid, the lightbox
//! modal and downloads from either.

use crate::dom::{NodeId, Page, PageEvent};
use crate::download::DownloadTrigger;
use crate::error::Result;
use crate::models::GalleryEntry;
use crate::toast::Toaster;
use crate::view;

pub mod ids {
    pub const MODAL: &str = "imageModal";
    pub const MODAL_IMAGE: &str = "modalImage";
    pub const MODAL_TITLE: &str = "modalTitle";
    pub const MODAL_DATE: &str = "modalDate";
    pub const GALLERY_GRID: &str = "galleryGrid";
}

pub const ITEM_CLASS: &str = "gallery-item";
pub const ESCAPE_KEY: &str = "Escape";

/// Parallax factor applied to `.gallery-header` on scroll
const PARALLAX_SPEED: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
struct Elements {
    modal: NodeId,
    modal_image: NodeId,
    modal_title: NodeId,
    modal_date: NodeId,
}

/// Controller for the gallery page
#[derive(Debug, Clone)]
pub struct GalleryController {
    page: Page,
    els: Elements,
    downloads: DownloadTrigger,
    toaster: Toaster,
}

impl GalleryController {
    /// Bind to the modal elements and animate the pre-rendered items in
    pub fn init(page: &Page, downloads: DownloadTrigger, toaster: Toaster) -> Result<Self> {
        let els = page.with(|doc| -> Result<Elements> {
            Ok(Elements {
                modal: doc.require(ids::MODAL)?,
                modal_image: doc.require(ids::MODAL_IMAGE)?,
                modal_title: doc.require(ids::MODAL_TITLE)?,
                modal_date: doc.require(ids::MODAL_DATE)?,
            })
        })?;
        let ctrl = Self {
            page: page.clone(),
            els,
            downloads,
            toaster,
        };
        ctrl.add_animations();
        Ok(ctrl)
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn toaster(&self) -> &Toaster {
        &self.toaster
    }

    fn add_animations(&self) {
        self.page.with(|doc| {
            let items = doc.get_elements_by_class(ITEM_CLASS);
            for (index, item) in items.iter().enumerate() {
                doc.set_style(*item, "opacity", "0");
                doc.set_style(*item, "transform", "translateY(30px)");
                doc.set_style(
                    *item,
                    "animation",
                    &format!(
                        "fadeInUp 0.6s ease-out {} forwards",
                        crate::stagger_delay_css(index)
                    ),
                );
            }
            log::debug!("animated {} gallery items", items.len());
        });
    }

    /// Gallery items in page order
    pub fn items(&self) -> Vec<NodeId> {
        self.page.with(|doc| doc.get_elements_by_class(ITEM_CLASS))
    }

    /// Metadata carried by a gallery item's data attributes
    pub fn entry(&self, item: NodeId) -> Option<GalleryEntry> {
        self.page.with(|doc| {
            Some(GalleryEntry {
                url: doc.attr(item, "data-url")?,
                filename: doc.attr(item, "data-filename").unwrap_or_default(),
                timestamp: doc.attr(item, "data-timestamp").unwrap_or_default(),
                size: doc.attr(item, "data-size").and_then(|s| s.parse().ok()),
            })
        })
    }

    pub fn entries(&self) -> Vec<GalleryEntry> {
        self.items()
            .into_iter()
            .filter_map(|i| self.entry(i))
            .collect()
    }

    /// Show `image_url` in the lightbox and lock page scrolling
    pub fn open_modal(&self, image_url: &str, title: &str, timestamp: &str) {
        let els = self.els;
        self.page.with(|doc| {
            doc.set_attr(els.modal_image, "src", image_url);
            doc.set_text(els.modal_title, title);
            doc.set_text(els.modal_date, timestamp);
            doc.set_style(els.modal, "display", "flex");
            let body = doc.body();
            doc.set_style(body, "overflow", "hidden");
        });
        log::debug!("modal opened for {}", title);
    }

    /// Hide the lightbox and restore scrolling. Returns false when the modal
    /// was already closed, in which case nothing changes.
    pub fn close_modal(&self) -> bool {
        if !self.is_modal_open() {
            return false;
        }
        let els = self.els;
        self.page.with(|doc| {
            doc.set_style(els.modal, "display", "none");
            let body = doc.body();
            doc.set_style(body, "overflow", "auto");
        });
        log::debug!("modal closed");
        true
    }

    pub fn is_modal_open(&self) -> bool {
        self.page
            .with(|doc| doc.style(self.els.modal, "display"))
            .as_deref()
            == Some("flex")
    }

    /// Title and image source currently shown in the modal
    pub fn modal_contents(&self) -> (String, String) {
        let els = self.els;
        self.page.with(|doc| {
            (
                doc.text_content(els.modal_title),
                doc.attr(els.modal_image, "src").unwrap_or_default(),
            )
        })
    }

    /// Download the image in the modal, named after the modal title
    pub fn download_modal_image(&self) {
        let (title, src) = self.modal_contents();
        self.downloads.download(&src, &title);
    }

    /// Route a page event
    pub fn dispatch(&self, event: &PageEvent) {
        match event {
            PageEvent::Click { target } => self.handle_click(*target),
            PageEvent::KeyDown { key } => {
                if key == ESCAPE_KEY && self.is_modal_open() {
                    self.close_modal();
                }
            }
            PageEvent::PointerEnter { target } => self.hover(*target, true),
            PageEvent::PointerLeave { target } => self.hover(*target, false),
            PageEvent::Scroll { offset_y } => self.parallax(*offset_y),
            PageEvent::Submit { .. } => {}
        }
    }

    fn handle_click(&self, target: NodeId) {
        enum Action {
            Close,
            Open(GalleryEntry),
            Download(String, String),
            DownloadModal,
            Nothing,
        }
        let modal = self.els.modal;
        let action = self.page.with(|doc| {
            if target == modal {
                return Action::Close;
            }
            if doc.is_inclusive_descendant(target, modal) {
                if doc.has_class(target, "close") {
                    return Action::Close;
                }
                if doc.closest(target, "modal-download-btn").is_some() {
                    return Action::DownloadModal;
                }
                return Action::Nothing;
            }
            let Some(item) = doc.closest(target, ITEM_CLASS) else {
                return Action::Nothing;
            };
            if let Some(btn) = doc.closest(target, "download-btn") {
                return Action::Download(
                    doc.attr(btn, "data-url").unwrap_or_default(),
                    doc.attr(btn, "data-filename").unwrap_or_default(),
                );
            }
            if doc.closest(target, "view-btn").is_some() || doc.closest(target, "gallery-image").is_some() {
                if let Some(url) = doc.attr(item, "data-url") {
                    return Action::Open(GalleryEntry {
                        url,
                        filename: doc.attr(item, "data-filename").unwrap_or_default(),
                        timestamp: doc.attr(item, "data-timestamp").unwrap_or_default(),
                        size: None,
                    });
                }
            }
            Action::Nothing
        });

        match action {
            Action::Close => {
                self.close_modal();
            }
            Action::Open(entry) => self.open_modal(&entry.url, &entry.filename, &entry.timestamp),
            Action::Download(url, filename) => self.downloads.download(&url, &filename),
            Action::DownloadModal => self.download_modal_image(),
            Action::Nothing => {}
        }
    }

    fn hover(&self, target: NodeId, entering: bool) {
        self.page.with(|doc| {
            if let Some(item) = doc.closest(target, ITEM_CLASS) {
                let transform = if entering {
                    "translateY(-10px) scale(1.02)"
                } else {
                    "translateY(0) scale(1)"
                };
                doc.set_style(item, "transform", transform);
            }
        });
    }

    fn parallax(&self, offset_y: f64) {
        self.page.with(|doc| {
            if let Some(header) = doc.first_by_class("gallery-header") {
                let shift = offset_y * PARALLAX_SPEED;
                doc.set_style(header, "transform", &format!("translateY({}px)", shift));
            }
        });
    }
}

/// Mount gallery items for `entries` into `#galleryGrid`, replacing what is
/// there. Used when the page is assembled locally instead of fetched.
pub fn render_entries(page: &Page, entries: &[GalleryEntry]) -> Result<()> {
    let grid = page.require(ids::GALLERY_GRID)?;
    page.with(|doc| {
        doc.clear_children(grid);
        for entry in entries {
            doc.append(grid, &view::gallery_item(entry));
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::MemoryDownloadSink;
    use crate::toast::ToastTiming;
    use std::sync::Arc;

    fn entries() -> Vec<GalleryEntry> {
        (0..3)
            .map(|i| GalleryEntry {
                filename: format!("img_{}.png", i),
                url: format!("/media/img_{}.png", i),
                timestamp: format!("2024-01-0{} 10:00:00", i + 1),
                size: Some(1000 + i),
            })
            .collect()
    }

    fn controller() -> GalleryController {
        let page = crate::pages::gallery_page(&entries()).unwrap();
        let toaster = Toaster::attach(&page, ToastTiming::default()).unwrap();
        let downloads = DownloadTrigger::new(&page, Arc::new(MemoryDownloadSink::new()))
            .with_toaster(toaster.clone());
        GalleryController::init(&page, downloads, toaster).unwrap()
    }

    #[test]
    fn items_are_staggered_by_index() {
        let ctrl = controller();
        let anims: Vec<String> = ctrl.page.with(|doc| {
            doc.get_elements_by_class(ITEM_CLASS)
                .into_iter()
                .map(|i| doc.style(i, "animation").unwrap_or_default())
                .collect()
        });
        assert_eq!(
            anims,
            vec![
                "fadeInUp 0.6s ease-out 0s forwards",
                "fadeInUp 0.6s ease-out 0.1s forwards",
                "fadeInUp 0.6s ease-out 0.2s forwards",
            ]
        );
    }

    #[test]
    fn entries_round_trip_through_data_attributes() {
        let ctrl = controller();
        assert_eq!(ctrl.entries(), entries());
    }

    #[test]
    fn open_then_close_restores_scroll() {
        let ctrl = controller();
        ctrl.open_modal("/media/img_1.png", "img_1.png", "2024-01-02 10:00:00");
        assert!(ctrl.is_modal_open());
        let body = ctrl.page.with(|d| d.body());
        assert_eq!(ctrl.page.with(|d| d.style(body, "overflow")).as_deref(), Some("hidden"));
        assert_eq!(
            ctrl.modal_contents(),
            ("img_1.png".to_string(), "/media/img_1.png".to_string())
        );

        assert!(ctrl.close_modal());
        assert!(!ctrl.is_modal_open());
        assert_eq!(ctrl.page.with(|d| d.style(body, "overflow")).as_deref(), Some("auto"));
        assert!(!ctrl.close_modal());
    }

    #[test]
    fn hover_lifts_item() {
        let ctrl = controller();
        let item = ctrl.items()[0];
        let img = ctrl.page.with(|d| d.first_by_class("gallery-image")).unwrap();
        ctrl.dispatch(&PageEvent::PointerEnter { target: img });
        assert_eq!(
            ctrl.page.with(|d| d.style(item, "transform")).as_deref(),
            Some("translateY(-10px) scale(1.02)")
        );
        ctrl.dispatch(&PageEvent::PointerLeave { target: item });
        assert_eq!(
            ctrl.page.with(|d| d.style(item, "transform")).as_deref(),
            Some("translateY(0) scale(1)")
        );
    }

    #[test]
    fn scroll_moves_header_at_half_speed() {
        let ctrl = controller();
        ctrl.dispatch(&PageEvent::Scroll { offset_y: 120.0 });
        let header = ctrl.page.with(|d| d.first_by_class("gallery-header")).unwrap();
        assert_eq!(
            ctrl.page.with(|d| d.style(header, "transform")).as_deref(),
            Some("translateY(60px)")
        );
    }
}
