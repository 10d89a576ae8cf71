//! Wire types exchanged with the generation API and the values the page
//! controllers pass around.

use crate::error::ValidationError;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_SIZE: &str = "1024x1024";
pub const DEFAULT_QUALITY: &str = "standard";

/// Read an explicit `null` the same as a missing key
fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Body of `POST /api/generate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub size: String,
    pub quality: String,
}

impl GenerationRequest {
    /// Build a request with the backend's default size and quality.
    /// The prompt is trimmed.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into().trim().to_string(),
            model: model.into(),
            size: DEFAULT_SIZE.to_string(),
            quality: DEFAULT_QUALITY.to_string(),
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    /// Prompt is checked before model, same order the form reports them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        if self.model.is_empty() {
            return Err(ValidationError::NoModel);
        }
        Ok(())
    }
}

/// One generated image as the backend reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub url: String,
    pub prompt: String,
    pub model: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// "Local" or "S3"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
}

/// Response of `POST /api/generate`.
///
/// The backend answers failures with only `{ "error": ... }`, so every field
/// is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<ImageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An entry of the model list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, tier: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tier: Some(tier.into()),
        }
    }

    /// Option label shown in the model select: `id (tier)`, or the bare id
    /// when the backend reports no tier.
    pub fn label(&self) -> String {
        match &self.tier {
            Some(tier) => format!("{} ({})", self.id, tier),
            None => self.id.clone(),
        }
    }
}

/// Response of `GET /api/models`. A missing or `null` `data` reads as an
/// empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<ModelDescriptor>,
}

/// A pre-rendered image on the gallery page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub filename: String,
    pub url: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Response of `GET /api/storage-info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub storage_type: String,
    #[serde(default)]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub s3_configured: bool,
    #[serde(default)]
    pub use_s3: bool,
}
