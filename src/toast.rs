//! Toast notifications.
//!
//! Each call to [`Toaster::show`] mounts an independent toast into
//! `#toast-container` and spawns its own timer task: the toast becomes
//! visible after `show_delay`, starts fading at `lifetime` and is removed
//! from the tree `fade` later. Nothing is queued or deduplicated.

use crate::dom::{NodeId, Page};
use crate::error::Result;
use crate::view;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

pub const TOAST_CONTAINER_ID: &str = "toast-container";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Font Awesome icon class
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Success => "fa-check-circle",
            Severity::Error => "fa-exclamation-circle",
            Severity::Warning => "fa-exclamation-triangle",
            Severity::Info => "fa-info-circle",
        }
    }

    fn from_class(class: &str) -> Option<Self> {
        match class {
            "info" => Some(Severity::Info),
            "success" => Some(Severity::Success),
            "warning" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }
}

/// A notification as currently shown on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastMessage {
    pub text: String,
    pub severity: Severity,
}

/// Toast timeline, all offsets measured from creation except `fade`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastTiming {
    /// Delay before the `show` class is applied
    pub show_delay: Duration,
    /// When the fade-out starts
    pub lifetime: Duration,
    /// Fade-out length; the node is removed at `lifetime + fade`
    pub fade: Duration,
}

impl Default for ToastTiming {
    fn default() -> Self {
        Self {
            show_delay: Duration::from_millis(100),
            lifetime: Duration::from_millis(5000),
            fade: Duration::from_millis(300),
        }
    }
}

impl ToastTiming {
    /// Time from creation until the toast leaves the tree
    pub fn total(&self) -> Duration {
        self.lifetime + self.fade
    }
}

/// Notifier bound to a page's toast container
#[derive(Debug, Clone)]
pub struct Toaster {
    page: Page,
    container: NodeId,
    timing: ToastTiming,
}

impl Toaster {
    /// Bind to `#toast-container`
    pub fn attach(page: &Page, timing: ToastTiming) -> Result<Self> {
        let container = page.require(TOAST_CONTAINER_ID)?;
        Ok(Self {
            page: page.clone(),
            container,
            timing,
        })
    }

    /// Bind to `#toast-container`, mounting one at the end of `<body>` when
    /// the markup has none
    pub fn attach_or_mount(page: &Page, timing: ToastTiming) -> Self {
        let container = page.with(|doc| match doc.get_element_by_id(TOAST_CONTAINER_ID) {
            Some(c) => c,
            None => {
                log::debug!("page has no #{}, mounting one", TOAST_CONTAINER_ID);
                let body = doc.body();
                doc.append(
                    body,
                    &view::el("div").id(TOAST_CONTAINER_ID).class("toast-container").into_view(),
                )
            }
        });
        Self {
            page: page.clone(),
            container,
            timing,
        }
    }

    pub fn timing(&self) -> ToastTiming {
        self.timing
    }

    /// Show a toast and schedule its removal. Returns the toast's node.
    ///
    /// Must be called from within a tokio runtime for the toast to ever go
    /// away; outside one the toast is mounted and left in place.
    pub fn show(&self, text: &str, severity: Severity) -> NodeId {
        let created = Instant::now();
        let node = self
            .page
            .with(|doc| doc.append(self.container, &view::toast(text, severity)));
        log::debug!("toast [{}] {}", severity.as_str(), text);

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                log::warn!("no runtime available; toast '{}' will not expire", text);
                return node;
            }
        };

        let page = self.page.clone();
        let timing = self.timing;
        handle.spawn(async move {
            sleep_until(created + timing.show_delay).await;
            page.with(|doc| doc.add_class(node, "show"));

            sleep_until(created + timing.lifetime).await;
            page.with(|doc| doc.remove_class(node, "show"));

            sleep_until(created + timing.lifetime + timing.fade).await;
            // The container may have been cleared in the meantime
            page.with(|doc| doc.remove(node));
        });
        node
    }

    pub fn info(&self, text: &str) -> NodeId {
        self.show(text, Severity::Info)
    }

    pub fn success(&self, text: &str) -> NodeId {
        self.show(text, Severity::Success)
    }

    pub fn warning(&self, text: &str) -> NodeId {
        self.show(text, Severity::Warning)
    }

    pub fn error(&self, text: &str) -> NodeId {
        self.show(text, Severity::Error)
    }

    /// Toasts currently mounted, oldest first
    pub fn messages(&self) -> Vec<ToastMessage> {
        self.page.with(|doc| {
            doc.child_elements(self.container)
                .into_iter()
                .filter_map(|t| {
                    let el = doc.element(t)?;
                    if !el.has_class("toast") {
                        return None;
                    }
                    let severity = el
                        .classes
                        .iter()
                        .find_map(|c| Severity::from_class(c))
                        .unwrap_or(Severity::Info);
                    Some(ToastMessage {
                        text: doc.text_content(t).trim().to_string(),
                        severity,
                    })
                })
                .collect()
        })
    }

    pub fn active_count(&self) -> usize {
        self.messages().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Page {
        Page::from_html(r#"<html><body><div id="toast-container"></div></body></html>"#).unwrap()
    }

    #[test]
    fn attach_requires_container() {
        let page = Page::from_html("<html><body></body></html>").unwrap();
        assert!(Toaster::attach(&page, ToastTiming::default()).is_err());
    }

    #[test]
    fn attach_or_mount_creates_missing_container() {
        let page = Page::from_html("<html><body><p>hi</p></body></html>").unwrap();
        let toaster = Toaster::attach_or_mount(&page, ToastTiming::default());
        assert!(page.require(TOAST_CONTAINER_ID).is_ok());
        toaster.info("hello");
        assert_eq!(toaster.active_count(), 1);

        let again = Toaster::attach_or_mount(&page, ToastTiming::default());
        assert_eq!(again.active_count(), 1);
    }

    #[test]
    fn show_without_runtime_mounts_toast() {
        let page = page();
        let toaster = Toaster::attach(&page, ToastTiming::default()).unwrap();
        toaster.warning("careful");
        assert_eq!(
            toaster.messages(),
            vec![ToastMessage {
                text: "careful".into(),
                severity: Severity::Warning
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn toast_timeline() {
        let page = page();
        let toaster = Toaster::attach(&page, ToastTiming::default()).unwrap();
        let node = toaster.success("Models loaded successfully");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!page.with(|d| d.has_class(node, "show")));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(page.with(|d| d.has_class(node, "show")));

        tokio::time::sleep(Duration::from_millis(4900)).await; // t = 5050
        assert!(!page.with(|d| d.has_class(node, "show")));
        assert_eq!(toaster.active_count(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await; // t = 5350
        assert_eq!(toaster.active_count(), 0);
        assert!(!page.with(|d| d.contains(node)));
    }

    #[test]
    fn total_lifetime_default() {
        assert_eq!(ToastTiming::default().total(), Duration::from_millis(5300));
    }
}
