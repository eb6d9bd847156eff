use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::GrayImage;
use leptess::{LepTess, Variable};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::OcrConfig;
use crate::error::{MeterError, Result};

use super::preprocessing::encode_png;

/// Tesseract page segmentation mode 7: treat the image as a single text line.
pub const PSM_SINGLE_LINE: &str = "7";

/// Only meter digits are worth recognizing.
pub const DIGIT_WHITELIST: &str = "0123456789";

/// Turns a normalized raster into raw text.
///
/// Implementations perform no validation of the text. Errors mean the engine
/// itself failed, not that the image was unreadable.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: &GrayImage) -> Result<String>;
}

#[derive(Clone)]
enum OcrBackend {
    Local { tesseract: Arc<Mutex<LepTess>> },
    Unavailable { reason: String },
}

/// Tesseract-backed recognizer configured for a single line of digits.
#[derive(Clone)]
pub struct OcrProvider {
    backend: OcrBackend,
    timeout: Duration,
}

fn create_tesseract(config: &OcrConfig) -> std::result::Result<LepTess, String> {
    let mut lt =
        LepTess::new(config.data_path.as_deref(), &config.languages).map_err(|e| e.to_string())?;
    lt.set_variable(Variable::TesseditPagesegMode, PSM_SINGLE_LINE)
        .map_err(|e| format!("Failed to set page segmentation mode: {e:?}"))?;
    lt.set_variable(Variable::TesseditCharWhitelist, DIGIT_WHITELIST)
        .map_err(|e| format!("Failed to set character whitelist: {e:?}"))?;
    Ok(lt)
}

/// Bound a recognition call; running out of time is a recognition failure.
async fn with_timeout<F>(timeout: Duration, recognition: F) -> Result<String>
where
    F: Future<Output = Result<String>>,
{
    match tokio::time::timeout(timeout, recognition).await {
        Ok(inner_result) => inner_result,
        Err(_) => Err(MeterError::Recognition(format!(
            "OCR operation timed out after {} seconds",
            timeout.as_secs()
        ))),
    }
}

impl OcrProvider {
    /// Initialize Tesseract, degrading to an unavailable backend when the
    /// engine or its language data is missing.
    pub fn new(config: &OcrConfig) -> Self {
        let backend = match create_tesseract(config) {
            Ok(lt) => {
                info!(languages = %config.languages, "Tesseract OCR initialized");
                OcrBackend::Local {
                    tesseract: Arc::new(Mutex::new(lt)),
                }
            }
            Err(e) => {
                let reason = format!("Tesseract not available: {e}");
                warn!("{}", reason);
                OcrBackend::Unavailable { reason }
            }
        };

        Self {
            backend,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }

    async fn recognize_internal(&self, png: Vec<u8>) -> Result<String> {
        match &self.backend {
            OcrBackend::Local { tesseract } => {
                let tesseract = Arc::clone(tesseract);

                tokio::task::spawn_blocking(move || {
                    let mut lt = tesseract.blocking_lock();
                    lt.set_image_from_mem(&png)
                        .map_err(|e| MeterError::Recognition(format!("Failed to set image: {e}")))?;
                    lt.get_utf8_text().map_err(|e| {
                        MeterError::Recognition(format!("Failed to extract text: {e}"))
                    })
                })
                .await
                .map_err(|e| MeterError::Recognition(format!("OCR task panicked: {e}")))?
            }
            OcrBackend::Unavailable { reason } => {
                Err(MeterError::RecognitionUnavailable(reason.clone()))
            }
        }
    }
}

#[async_trait]
impl Recognizer for OcrProvider {
    async fn recognize(&self, image: &GrayImage) -> Result<String> {
        if let OcrBackend::Unavailable { reason } = &self.backend {
            return Err(MeterError::RecognitionUnavailable(reason.clone()));
        }

        let png = encode_png(image)?;

        with_timeout(self.timeout, self.recognize_internal(png)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable() -> OcrProvider {
        OcrProvider {
            backend: OcrBackend::Unavailable {
                reason: "Test unavailable".to_string(),
            },
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_ocr_provider_graceful_degradation() {
        let config = OcrConfig {
            languages: "definitely-not-a-language".to_string(),
            ..OcrConfig::default()
        };

        let provider = OcrProvider::new(&config);
        assert!(!provider.is_available());
    }

    #[tokio::test]
    async fn test_unavailable_returns_recognition_error() {
        let provider = unavailable();
        let image = GrayImage::new(10, 10);

        let result = provider.recognize(&image).await;
        assert!(matches!(result, Err(MeterError::RecognitionUnavailable(_))));
        assert!(result.unwrap_err().is_recognition());
    }

    #[tokio::test]
    async fn test_stalled_recognition_times_out() {
        let result = with_timeout(
            Duration::from_millis(20),
            std::future::pending::<Result<String>>(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, MeterError::Recognition(_)));
        assert!(err.is_recognition());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_prompt_recognition_passes_through() {
        let text = with_timeout(Duration::from_secs(1), async { Ok("123456".to_string()) })
            .await
            .unwrap();
        assert_eq!(text, "123456");

        let failed = with_timeout(Duration::from_secs(1), async {
            Err(MeterError::Recognition("Failed to set image".to_string()))
        })
        .await;
        assert!(!failed.unwrap_err().to_string().contains("timed out"));
    }

    #[test]
    fn test_clone_keeps_availability() {
        let provider = unavailable();
        let cloned = provider.clone();
        assert_eq!(provider.is_available(), cloned.is_available());
    }

    #[test]
    fn test_recognition_hint_constants() {
        assert_eq!(PSM_SINGLE_LINE, "7");
        assert!(DIGIT_WHITELIST.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(DIGIT_WHITELIST.len(), 10);
    }
}
