//! Download trigger and the sinks that actually save files.
//!
//! [`DownloadTrigger::download`] does what the page does with a transient
//! `<a download>`: mount a hidden anchor, "click" it by handing the request to
//! a [`DownloadSink`], drop the anchor again. The save runs in the background
//! and its completion is not observed by the page.

use crate::api::HttpApi;
use crate::dom::Page;
use crate::error::{Error, Result};
use crate::toast::Toaster;
use crate::view;
use async_trait::async_trait;
use base64::Engine as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const DOWNLOAD_STARTED: &str = "Download started";

/// A resource the page asked to save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub filename: String,
}

/// Where downloads end up
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Save the resource, returning where it went
    async fn save(&self, request: DownloadRequest) -> Result<PathBuf>;
}

/// Keeps requests in memory. Used by tests and headless runs that only need
/// to know what would have been saved.
#[derive(Debug, Default)]
pub struct MemoryDownloadSink {
    saved: Mutex<Vec<DownloadRequest>>,
}

impl MemoryDownloadSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.saved.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DownloadSink for MemoryDownloadSink {
    async fn save(&self, request: DownloadRequest) -> Result<PathBuf> {
        let path = PathBuf::from(&request.filename);
        if let Ok(mut saved) = self.saved.lock() {
            saved.push(request);
        }
        Ok(path)
    }
}

/// Saves into a directory on disk. Relative urls are fetched through the
/// page's [`HttpApi`]; `data:` urls are decoded in place.
#[derive(Debug, Clone)]
pub struct FsDownloadSink {
    api: HttpApi,
    dir: PathBuf,
}

impl FsDownloadSink {
    pub fn new(api: HttpApi, dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DownloadSink for FsDownloadSink {
    async fn save(&self, request: DownloadRequest) -> Result<PathBuf> {
        let bytes = if request.url.starts_with("data:") {
            decode_data_url(&request.url)?
        } else {
            self.api.get_bytes(&request.url).await?
        };

        let name = sanitize_filename(&request.filename)
            .or_else(|| url_file_name(&request.url).and_then(|n| sanitize_filename(&n)))
            .unwrap_or_else(|| "download".to_string());

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, &bytes).await?;
        log::info!("saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// Decode `data:[<mime>][;base64],<payload>`
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| Error::DownloadError("not a data url".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::DownloadError("data url without payload".into()))?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::DownloadError(format!("bad base64 payload: {}", e)))
    } else {
        Ok(percent_encoding::percent_decode_str(payload).collect())
    }
}

/// Reduce a suggested name to a single safe path component.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; whitespace becomes `_`;
/// everything else is dropped along with leading dots. `None` when nothing
/// usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = last
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn url_file_name(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().map(String::from).filter(|s| !s.is_empty())
}

/// Routes downloads from a page to a sink
#[derive(Clone)]
pub struct DownloadTrigger {
    page: Page,
    sink: Arc<dyn DownloadSink>,
    toaster: Option<Toaster>,
}

impl DownloadTrigger {
    pub fn new(page: &Page, sink: Arc<dyn DownloadSink>) -> Self {
        Self {
            page: page.clone(),
            sink,
            toaster: None,
        }
    }

    /// Announce started downloads through `toaster`
    pub fn with_toaster(mut self, toaster: Toaster) -> Self {
        self.toaster = Some(toaster);
        self
    }

    /// Ask the host to save `url` as `filename`
    pub fn download(&self, url: &str, filename: &str) {
        self.page.with(|doc| {
            let body = doc.body();
            let anchor = doc.append(body, &view::download_anchor(url, filename));
            doc.remove(anchor);
        });

        let request = DownloadRequest {
            url: url.to_string(),
            filename: filename.to_string(),
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sink = self.sink.clone();
                handle.spawn(async move {
                    let name = request.filename.clone();
                    if let Err(e) = sink.save(request).await {
                        log::error!("download of {} failed: {}", name, e);
                    }
                });
            }
            Err(_) => log::warn!("no runtime available; dropping download of {}", url),
        }

        if let Some(toaster) = &self.toaster {
            toaster.success(DOWNLOAD_STARTED);
        }
    }
}

impl std::fmt::Debug for DownloadTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTrigger")
            .field("toaster", &self.toaster.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toast::{Severity, ToastTiming};

    fn page() -> Page {
        Page::from_html(r#"<html><body><div id="toast-container"></div></body></html>"#).unwrap()
    }

    #[test]
    fn sanitize_strips_paths_and_junk() {
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("my cat.png").as_deref(), Some("my_cat.png"));
        assert_eq!(sanitize_filename("..\\a<b>.png").as_deref(), Some("ab.png"));
        assert_eq!(sanitize_filename("...").as_deref(), None);
        assert_eq!(sanitize_filename("").as_deref(), None);
    }

    #[test]
    fn data_urls_decode() {
        assert_eq!(decode_data_url("data:image/png;base64,aGk=").unwrap(), b"hi");
        assert_eq!(decode_data_url("data:text/plain,hi").unwrap(), b"hi");
        assert_eq!(decode_data_url("data:text/plain,a%20b").unwrap(), b"a b");
        assert_eq!(decode_data_url("data:,100%25%2Fdone").unwrap(), b"100%/done");
        assert!(decode_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn url_file_name_ignores_query() {
        assert_eq!(url_file_name("/media/a.png?x=1").as_deref(), Some("a.png"));
        assert_eq!(url_file_name("/media/"), None);
    }

    #[tokio::test]
    async fn download_routes_to_sink_and_announces() {
        let page = page();
        let sink = Arc::new(MemoryDownloadSink::new());
        let toaster = Toaster::attach(&page, ToastTiming::default()).unwrap();
        let trigger = DownloadTrigger::new(&page, sink.clone()).with_toaster(toaster.clone());

        trigger.download("/media/1.png", "1.png");
        tokio::task::yield_now().await;

        assert_eq!(
            sink.requests(),
            vec![DownloadRequest {
                url: "/media/1.png".into(),
                filename: "1.png".into()
            }]
        );
        let toasts = toaster.messages();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].text, DOWNLOAD_STARTED);
        assert_eq!(toasts[0].severity, Severity::Success);
        // the anchor is transient
        assert!(page.with(|d| d.children(d.body()).len()) == 1);
    }

    #[tokio::test]
    async fn download_without_toaster_is_silent() {
        let page = page();
        let sink = Arc::new(MemoryDownloadSink::new());
        let trigger = DownloadTrigger::new(&page, sink.clone());
        trigger.download("/media/2.png", "2.png");
        tokio::task::yield_now().await;
        assert_eq!(sink.requests().len(), 1);
        let container = page.require("toast-container").unwrap();
        assert!(page.with(|d| d.children(container).is_empty()));
    }
}
