//! Bundled page markup and page loading.
//!
//! The element ids in these documents are the contract between markup and
//! controllers; see `generator::ids` and `gallery::ids`.

use crate::api::HttpApi;
use crate::dom::Page;
use crate::error::Result;
use crate::gallery;
use crate::models::GalleryEntry;

pub const GENERATOR_HTML: &str = include_str!("pages/index.html");
pub const GALLERY_HTML: &str = include_str!("pages/gallery.html");

/// A fresh generator page
pub fn generator_page() -> Result<Page> {
    Page::from_html(GENERATOR_HTML)
}

/// A gallery page with `entries` rendered into the grid
pub fn gallery_page(entries: &[GalleryEntry]) -> Result<Page> {
    let page = Page::from_html(GALLERY_HTML)?;
    gallery::render_entries(&page, entries)?;
    Ok(page)
}

/// Fetch markup from the server and load it as a page
pub async fn fetch_page(api: &HttpApi, path: &str) -> Result<Page> {
    let url = api.resolve(path)?;
    let html = api.get_text(path).await?;
    let page = Page::from_html(&html)?;
    page.with(|doc| doc.set_url(url.as_str()));
    log::info!("loaded {}", url);
    Ok(page)
}
