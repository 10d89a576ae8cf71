//! Generator page controller.
//!
//! Owns the prompt form: loads the model list once at startup, validates and
//! submits generation requests, renders result cards and keeps the loading
//! state honest on every exit path.

use crate::api::GenerationApi;
use crate::dom::{NodeId, Page, PageEvent};
use crate::download::DownloadTrigger;
use crate::error::{Result, ValidationError};
use crate::models::{GenerationRequest, ImageResult, DEFAULT_QUALITY, DEFAULT_SIZE};
use crate::toast::Toaster;
use crate::view;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub mod ids {
    pub const FORM: &str = "imageForm";
    pub const PROMPT: &str = "prompt";
    pub const MODEL: &str = "model";
    pub const SIZE: &str = "size";
    pub const QUALITY: &str = "quality";
    pub const GENERATE_BTN: &str = "generateBtn";
    pub const LOADING_OVERLAY: &str = "loadingOverlay";
    pub const RESULTS_SECTION: &str = "resultsSection";
    pub const RESULTS_GRID: &str = "resultsGrid";
    pub const TOGGLE_ADVANCED: &str = "toggleAdvanced";
    pub const ADVANCED_CONTENT: &str = "advancedContent";
}

pub const MODELS_LOADING: &str = "Loading models...";
pub const MODELS_LOADED: &str = "Models loaded successfully";
pub const NO_MODELS: &str = "No models available";
pub const MODELS_ERROR: &str = "Error loading models";
pub const GENERATE_FAILED: &str = "Failed to generate image";
pub const NETWORK_ERROR: &str = "Network error occurred";
pub const NO_IMAGES: &str = "No images generated";

/// Result of [`GeneratorController::load_models`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadModelsOutcome {
    Loaded(usize),
    Empty,
    Failed,
}

/// Result of one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Client-side validation stopped the submission; nothing was sent
    Rejected(ValidationError),
    /// The server generated these images; they are now rendered
    Generated { images: Vec<ImageResult> },
    /// The server answered with a structured failure
    Failed { reason: String },
    /// No usable response (unreachable, non-JSON body)
    NetworkError,
}

#[derive(Debug, Clone, Copy)]
struct Elements {
    form: NodeId,
    prompt: NodeId,
    model: NodeId,
    size: NodeId,
    quality: NodeId,
    generate_btn: NodeId,
    loading_overlay: NodeId,
    results_section: NodeId,
    results_grid: NodeId,
    toggle_advanced: NodeId,
    advanced_content: NodeId,
}

impl Elements {
    fn resolve(page: &Page) -> Result<Self> {
        page.with(|doc| {
            Ok(Self {
                form: doc.require(ids::FORM)?,
                prompt: doc.require(ids::PROMPT)?,
                model: doc.require(ids::MODEL)?,
                size: doc.require(ids::SIZE)?,
                quality: doc.require(ids::QUALITY)?,
                generate_btn: doc.require(ids::GENERATE_BTN)?,
                loading_overlay: doc.require(ids::LOADING_OVERLAY)?,
                results_section: doc.require(ids::RESULTS_SECTION)?,
                results_grid: doc.require(ids::RESULTS_GRID)?,
                toggle_advanced: doc.require(ids::TOGGLE_ADVANCED)?,
                advanced_content: doc.require(ids::ADVANCED_CONTENT)?,
            })
        })
    }
}

/// Controller for the generator page.
///
/// Cheap to clone; clones share the page, the API client and the in-flight
/// counter.
#[derive(Clone)]
pub struct GeneratorController {
    page: Page,
    els: Elements,
    api: Arc<dyn GenerationApi>,
    toaster: Toaster,
    downloads: DownloadTrigger,
    in_flight: Arc<AtomicUsize>,
}

impl GeneratorController {
    /// Bind to the page, run the entrance animations and load the model list.
    pub async fn init(
        page: &Page,
        api: Arc<dyn GenerationApi>,
        downloads: DownloadTrigger,
        toaster: Toaster,
    ) -> Result<Self> {
        let ctrl = Self::attach(page, api, downloads, toaster)?;
        ctrl.add_animations();
        ctrl.load_models().await;
        Ok(ctrl)
    }

    /// Bind to the page without loading models. `init` is the normal entry
    /// point; this exists for hosts that drive loading themselves.
    pub fn attach(
        page: &Page,
        api: Arc<dyn GenerationApi>,
        downloads: DownloadTrigger,
        toaster: Toaster,
    ) -> Result<Self> {
        let els = Elements::resolve(page)?;
        Ok(Self {
            page: page.clone(),
            els,
            api,
            toaster,
            downloads,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn toaster(&self) -> &Toaster {
        &self.toaster
    }

    fn add_animations(&self) {
        self.page.with(|doc| {
            if let Some(hero) = doc.first_by_class("hero") {
                doc.set_style(hero, "animation", "fadeInUp 1s ease-out");
            }
            for (index, group) in doc.get_elements_by_class("form-group").into_iter().enumerate() {
                doc.set_style(group, "opacity", "0");
                doc.set_style(group, "transform", "translateY(20px)");
                doc.set_style(
                    group,
                    "animation",
                    &format!(
                        "fadeInUp 0.6s ease-out {} forwards",
                        crate::stagger_delay_css(index)
                    ),
                );
            }
        });
    }

    /// Fill the model select from `GET /api/models`
    pub async fn load_models(&self) -> LoadModelsOutcome {
        let select = self.els.model;
        self.page.with(|doc| {
            doc.clear_children(select);
            doc.append(select, &view::placeholder_option(MODELS_LOADING));
        });

        match self.api.list_models().await {
            Ok(resp) if !resp.data.is_empty() => {
                let count = resp.data.len();
                self.page.with(|doc| {
                    doc.clear_children(select);
                    for model in &resp.data {
                        doc.append(select, &view::model_option(model));
                    }
                    doc.set_value(select, &resp.data[0].id);
                });
                log::info!("loaded {} models", count);
                self.toaster.success(MODELS_LOADED);
                LoadModelsOutcome::Loaded(count)
            }
            Ok(_) => {
                self.set_model_placeholder(NO_MODELS);
                log::warn!("model list is empty");
                self.toaster.error(NO_MODELS);
                LoadModelsOutcome::Empty
            }
            Err(e) => {
                log::error!("Error loading models: {}", e);
                self.set_model_placeholder(MODELS_ERROR);
                self.toaster.error(MODELS_ERROR);
                LoadModelsOutcome::Failed
            }
        }
    }

    fn set_model_placeholder(&self, label: &str) {
        let select = self.els.model;
        self.page.with(|doc| {
            doc.clear_children(select);
            doc.append(select, &view::placeholder_option(label));
        });
    }

    /// Read the form controls into a request. Empty size/quality controls
    /// fall back to the backend defaults.
    pub fn read_form(&self) -> GenerationRequest {
        let els = self.els;
        self.page.with(|doc| {
            let size = doc.value(els.size);
            let quality = doc.value(els.quality);
            GenerationRequest::new(doc.value(els.prompt), doc.value(els.model))
                .with_size(if size.is_empty() { DEFAULT_SIZE.to_string() } else { size })
                .with_quality(if quality.is_empty() { DEFAULT_QUALITY.to_string() } else { quality })
        })
    }

    /// Submit whatever the form currently holds
    pub async fn submit_form(&self) -> SubmitOutcome {
        let request = self.read_form();
        self.handle_submit(request).await
    }

    /// Validate, send and render one generation request.
    ///
    /// Overlapping calls are not serialized: each one reaches the network.
    /// The loading state stays up until the last in-flight call finishes.
    pub async fn handle_submit(&self, request: GenerationRequest) -> SubmitOutcome {
        if let Err(e) = request.validate() {
            self.toaster.error(&e.to_string());
            return SubmitOutcome::Rejected(e);
        }

        let _loading = LoadingGuard::begin(self);
        self.hide_results();

        log::debug!("submitting prompt for model {}", request.model);
        match self.api.generate(&request).await {
            Ok(resp) if resp.success => {
                self.display_results(&resp.images);
                let message = resp.message.unwrap_or_else(|| {
                    format!("Generated {} image(s) successfully!", resp.images.len())
                });
                log::info!("{}", message);
                self.toaster.success(&message);
                SubmitOutcome::Generated {
                    images: resp.images,
                }
            }
            Ok(resp) => {
                let reason = resp.error.unwrap_or_else(|| GENERATE_FAILED.to_string());
                log::warn!("generation failed: {}", reason);
                self.toaster.error(&reason);
                SubmitOutcome::Failed { reason }
            }
            Err(e) => {
                log::error!("Error generating image: {}", e);
                self.toaster.error(NETWORK_ERROR);
                SubmitOutcome::NetworkError
            }
        }
    }

    fn set_loading(&self, loading: bool) {
        let els = self.els;
        self.page.with(|doc| {
            if loading {
                doc.add_class(els.generate_btn, "loading");
                doc.set_disabled(els.generate_btn, true);
                doc.set_style(els.loading_overlay, "display", "flex");
            } else {
                doc.remove_class(els.generate_btn, "loading");
                doc.set_disabled(els.generate_btn, false);
                doc.set_style(els.loading_overlay, "display", "none");
            }
        });
    }

    /// Whether the loading overlay is showing
    pub fn is_loading(&self) -> bool {
        self.page
            .with(|doc| doc.style(self.els.loading_overlay, "display"))
            .as_deref()
            == Some("flex")
    }

    /// Number of submissions currently waiting on the network
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_submit_disabled(&self) -> bool {
        self.page.with(|doc| doc.is_disabled(self.els.generate_btn))
    }

    fn hide_results(&self) {
        let els = self.els;
        self.page.with(|doc| {
            doc.set_style(els.results_section, "display", "none");
            doc.clear_children(els.results_grid);
        });
    }

    fn display_results(&self, images: &[ImageResult]) {
        if images.is_empty() {
            self.toaster.warning(NO_IMAGES);
            return;
        }
        let els = self.els;
        self.page.with(|doc| {
            doc.clear_children(els.results_grid);
            for image in images {
                doc.append(els.results_grid, &view::result_card(image));
            }
            doc.set_style(els.results_section, "display", "block");
        });
    }

    /// Whether the results section is showing
    pub fn results_visible(&self) -> bool {
        self.page
            .with(|doc| doc.style(self.els.results_section, "display"))
            .as_deref()
            == Some("block")
    }

    /// Cards currently in the results grid, in display order
    pub fn result_cards(&self) -> Vec<NodeId> {
        self.page.with(|doc| doc.child_elements(self.els.results_grid))
    }

    pub fn results_grid(&self) -> NodeId {
        self.els.results_grid
    }

    /// Open or close the advanced options panel. Returns the new state.
    pub fn toggle_advanced_options(&self) -> bool {
        let els = self.els;
        self.page.with(|doc| {
            let open = doc.toggle_class(els.advanced_content, "show");
            if open {
                doc.add_class(els.toggle_advanced, "active");
            } else {
                doc.remove_class(els.toggle_advanced, "active");
            }
            open
        })
    }

    /// Route a page event. Returns the submission outcome for submit events.
    pub async fn dispatch(&self, event: &PageEvent) -> Option<SubmitOutcome> {
        match event {
            PageEvent::Submit { form } if *form == self.els.form => Some(self.submit_form().await),
            PageEvent::Click { target } => {
                self.handle_click(*target);
                None
            }
            _ => None,
        }
    }

    fn handle_click(&self, target: NodeId) {
        let els = self.els;
        enum Action {
            Toggle,
            Download(String, String),
            Nothing,
        }
        let action = self.page.with(|doc| {
            if doc.is_inclusive_descendant(target, els.toggle_advanced) {
                return Action::Toggle;
            }
            if !doc.is_inclusive_descendant(target, els.results_grid) {
                return Action::Nothing;
            }
            match doc.closest(target, "download-btn") {
                Some(btn) => Action::Download(
                    doc.attr(btn, "data-url").unwrap_or_default(),
                    doc.attr(btn, "data-filename").unwrap_or_default(),
                ),
                None => Action::Nothing,
            }
        });
        match action {
            Action::Toggle => {
                self.toggle_advanced_options();
            }
            Action::Download(url, filename) => self.downloads.download(&url, &filename),
            Action::Nothing => {}
        }
    }
}

impl std::fmt::Debug for GeneratorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorController")
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// Holds the loading state for one submission and releases it on drop, so
/// the overlay comes down on success, failure, panic or cancellation alike.
struct LoadingGuard<'a> {
    ctrl: &'a GeneratorController,
}

impl<'a> LoadingGuard<'a> {
    fn begin(ctrl: &'a GeneratorController) -> Self {
        ctrl.in_flight.fetch_add(1, Ordering::SeqCst);
        ctrl.set_loading(true);
        Self { ctrl }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.ctrl.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.ctrl.set_loading(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::MemoryDownloadSink;
    use crate::error::Error;
    use crate::models::{GenerateResponse, ModelDescriptor, ModelsResponse, StorageInfo};
    use crate::toast::{Severity, ToastTiming};
    use async_trait::async_trait;

    struct FixedApi {
        models: std::result::Result<Vec<ModelDescriptor>, String>,
    }

    #[async_trait]
    impl GenerationApi for FixedApi {
        async fn list_models(&self) -> Result<ModelsResponse> {
            match &self.models {
                Ok(data) => Ok(ModelsResponse { data: data.clone() }),
                Err(e) => Err(Error::NetworkError(e.clone())),
            }
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerateResponse> {
            Err(Error::NetworkError("offline".into()))
        }

        async fn storage_info(&self) -> Result<StorageInfo> {
            Err(Error::NetworkError("offline".into()))
        }
    }

    async fn controller(api: FixedApi) -> GeneratorController {
        let page = crate::pages::generator_page().unwrap();
        let toaster = Toaster::attach(&page, ToastTiming::default()).unwrap();
        let downloads = DownloadTrigger::new(&page, Arc::new(MemoryDownloadSink::new()))
            .with_toaster(toaster.clone());
        GeneratorController::init(&page, Arc::new(api), downloads, toaster)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn models_populate_select_with_first_selected() {
        let ctrl = controller(FixedApi {
            models: Ok(vec![
                ModelDescriptor::new("img3", "free"),
                ModelDescriptor::new("img4", "pro"),
            ]),
        })
        .await;
        let select = ctrl.els.model;
        let labels: Vec<String> = ctrl.page.with(|doc| {
            doc.options(select)
                .into_iter()
                .map(|o| doc.text_content(o))
                .collect()
        });
        assert_eq!(labels, vec!["img3 (free)", "img4 (pro)"]);
        assert_eq!(ctrl.read_form().model, "img3");
        assert_eq!(ctrl.toaster.messages()[0].text, MODELS_LOADED);
    }

    #[tokio::test]
    async fn empty_model_list_leaves_placeholder() {
        let ctrl = controller(FixedApi { models: Ok(vec![]) }).await;
        let select = ctrl.els.model;
        let text = ctrl.page.with(|doc| doc.text_content(select));
        assert_eq!(text, NO_MODELS);
        assert_eq!(ctrl.read_form().model, "");
        let toasts = ctrl.toaster.messages();
        assert_eq!(toasts[0].severity, Severity::Error);
        assert_eq!(toasts[0].text, NO_MODELS);
    }

    #[tokio::test]
    async fn null_model_data_reads_as_no_models() {
        let api = crate::api::HttpApi::new(&crate::PageConfig::default()).unwrap();
        api.on_request(|_| crate::api::RequestAction::json(&serde_json::json!({"data": null})));
        let page = crate::pages::generator_page().unwrap();
        let toaster = Toaster::attach(&page, ToastTiming::default()).unwrap();
        let downloads = DownloadTrigger::new(&page, Arc::new(MemoryDownloadSink::new()));
        let ctrl = GeneratorController::attach(&page, Arc::new(api), downloads, toaster).unwrap();

        assert_eq!(ctrl.load_models().await, LoadModelsOutcome::Empty);
        let select = ctrl.els.model;
        assert_eq!(ctrl.page.with(|doc| doc.text_content(select)), NO_MODELS);
        let toasts = ctrl.toaster.messages();
        assert_eq!(toasts[0].severity, Severity::Error);
        assert_eq!(toasts[0].text, NO_MODELS);
    }

    #[tokio::test]
    async fn model_transport_failure_shows_error_state() {
        let ctrl = controller(FixedApi {
            models: Err("refused".into()),
        })
        .await;
        let select = ctrl.els.model;
        assert_eq!(ctrl.page.with(|doc| doc.text_content(select)), MODELS_ERROR);
        assert_eq!(ctrl.toaster.messages()[0].text, MODELS_ERROR);
    }

    #[tokio::test]
    async fn advanced_toggle_flips_both_classes() {
        let ctrl = controller(FixedApi { models: Ok(vec![]) }).await;
        assert!(ctrl.toggle_advanced_options());
        let (panel, toggle) = (ctrl.els.advanced_content, ctrl.els.toggle_advanced);
        assert!(ctrl.page.with(|d| d.has_class(panel, "show") && d.has_class(toggle, "active")));
        assert!(!ctrl.toggle_advanced_options());
        assert!(ctrl.page.with(|d| !d.has_class(panel, "show") && !d.has_class(toggle, "active")));
    }

    #[tokio::test]
    async fn form_groups_get_staggered_animation() {
        let ctrl = controller(FixedApi { models: Ok(vec![]) }).await;
        let anims: Vec<String> = ctrl.page.with(|doc| {
            doc.get_elements_by_class("form-group")
                .into_iter()
                .filter_map(|g| doc.style(g, "animation"))
                .collect()
        });
        assert!(anims.len() >= 2);
        assert_eq!(anims[0], "fadeInUp 0.6s ease-out 0s forwards");
        assert_eq!(anims[1], "fadeInUp 0.6s ease-out 0.1s forwards");
    }

    #[tokio::test]
    async fn guard_releases_on_transport_error() {
        let ctrl = controller(FixedApi {
            models: Ok(vec![ModelDescriptor::new("m1", "free")]),
        })
        .await;
        let outcome = ctrl.handle_submit(GenerationRequest::new("fox", "m1")).await;
        assert_eq!(outcome, SubmitOutcome::NetworkError);
        assert!(!ctrl.is_loading());
        assert!(!ctrl.is_submit_disabled());
        assert_eq!(ctrl.in_flight(), 0);
    }
}
