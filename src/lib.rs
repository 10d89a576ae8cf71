//! genview
//!
//! Headless page controllers for an image-generation web front end. The two
//! pages of the front end (a prompt form that renders generated images, and
//! a gallery with a lightbox) are driven against an in-memory document
//! instead of a browser DOM, on a single-threaded tokio runtime that plays the
//! part of the page's UI thread.
//!
//! # Layout
//!
//! - [`dom`]: the document model and the shared [`Page`] handle
//! - [`view`]: typed, escaping-safe element builders
//! - [`api`]: the [`GenerationApi`] seam and its reqwest implementation
//! - [`generator`] / [`gallery`]: the page controllers
//! - [`toast`] / [`download`]: notifications and downloads shared by both
//!
//! # Example
//!
//! ```no_run
//! use genview::{GenerationRequest, PageConfig};
//!
//! # async fn run() -> genview::Result<()> {
//! let config = PageConfig {
//!     base_url: "http://127.0.0.1:5000".to_string(),
//!     ..Default::default()
//! };
//! let generator = genview::open_generator(&config, None).await?;
//! let outcome = generator
//!     .handle_submit(GenerationRequest::new("a red fox", "img3"))
//!     .await;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

pub mod api;
pub mod dom;
pub mod download;
pub mod error;
pub mod gallery;
pub mod generator;
pub mod logger;
pub mod models;
pub mod pages;
pub mod toast;
pub mod view;

pub use api::{GenerationApi, HttpApi, RequestAction, RequestInfo};
pub use dom::{Document, NodeId, Page, PageEvent, TextSnapshot};
pub use download::{DownloadSink, DownloadTrigger, FsDownloadSink, MemoryDownloadSink};
pub use error::{Error, Result, ValidationError};
pub use gallery::GalleryController;
pub use generator::{GeneratorController, LoadModelsOutcome, SubmitOutcome};
pub use models::{
    GalleryEntry, GenerateResponse, GenerationRequest, ImageResult, ModelDescriptor,
    ModelsResponse, StorageInfo,
};
pub use toast::{Severity, ToastMessage, ToastTiming, Toaster};

/// Configuration shared by every page of a session
///
/// The defaults mirror the browser front end: no request timeout (a hung
/// request keeps the loading overlay up), standard toast timings.
///
/// # Examples
///
/// ```
/// let cfg = genview::PageConfig::default();
/// assert!(cfg.timeout_ms.is_none());
/// assert_eq!(cfg.toast.lifetime.as_millis(), 5000);
/// ```
#[derive(Debug, Clone)]
pub struct PageConfig {
    /// Origin the pages were served from; API paths resolve against it
    pub base_url: String,
    /// User agent string to send with requests
    pub user_agent: String,
    /// Request timeout in milliseconds, `None` waits forever
    pub timeout_ms: Option<u64>,
    /// Extra HTTP headers sent with every request
    pub headers: HashMap<String, String>,
    /// Toast timeline
    pub toast: ToastTiming,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            user_agent: format!("genview/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: None,
            headers: HashMap::new(),
            toast: ToastTiming::default(),
        }
    }
}

/// CSS delay for the `index`-th staggered entrance animation (0.1s steps)
pub fn stagger_delay_css(index: usize) -> String {
    if index % 10 == 0 {
        format!("{}s", index / 10)
    } else {
        format!("{}.{}s", index / 10, index % 10)
    }
}

/// Open the bundled generator page against the API at `config.base_url` and
/// run its initialization (including the one-time model load).
///
/// Downloads go to `sink`, or are only recorded when `None`.
pub async fn open_generator(
    config: &PageConfig,
    sink: Option<Arc<dyn DownloadSink>>,
) -> Result<GeneratorController> {
    let api = HttpApi::new(config)?;
    let page = pages::generator_page()?;
    page.with(|doc| doc.set_url(config.base_url.as_str()));
    let toaster = Toaster::attach(&page, config.toast)?;
    let sink = sink.unwrap_or_else(|| Arc::new(MemoryDownloadSink::new()));
    let downloads = DownloadTrigger::new(&page, sink).with_toaster(toaster.clone());
    GeneratorController::init(&page, Arc::new(api), downloads, toaster).await
}

/// Fetch the server-rendered gallery page and bind a controller to it
pub async fn open_gallery(
    config: &PageConfig,
    sink: Option<Arc<dyn DownloadSink>>,
) -> Result<GalleryController> {
    let api = HttpApi::new(config)?;
    let page = pages::fetch_page(&api, api::GALLERY_PATH).await?;
    let toaster = Toaster::attach_or_mount(&page, config.toast);
    let sink = sink.unwrap_or_else(|| Arc::new(MemoryDownloadSink::new()));
    let downloads = DownloadTrigger::new(&page, sink).with_toaster(toaster.clone());
    GalleryController::init(&page, downloads, toaster)
}
