//! OCR (Optical Character Recognition) Module
//!
//! Turns meter photos into raw text. Two stages:
//! - `normalize_image` decodes the payload and produces a contrast-boosted
//!   grayscale raster
//! - `Recognizer` runs the engine over that raster; `OcrProvider` is the
//!   Tesseract implementation (via leptess), configured for a single line of
//!   digits
//!
//! # Configuration
//!
//! Controlled via `OcrConfig` (see `config.rs`):
//! - `languages`: Tesseract language codes, usually `eng`
//! - `data_path`: Directory holding traineddata files, engine default if unset
//! - `timeout_secs`: Upper bound on a single recognition call
//! - `max_image_dimension`: Larger images are downscaled first
//! - `contrast_factor`: Contrast multiplier applied after grayscale conversion
//!
//! # Usage
//!
//! ```rust,ignore
//! let ocr = OcrProvider::new(&config.ocr);
//! let raster = normalize_image(&payload, &config.ocr)?;
//! let text = ocr.recognize(&raster).await?;
//! ```

mod preprocessing;
mod provider;

pub use preprocessing::{encode_png, normalize_image};
pub use provider::{OcrProvider, Recognizer, DIGIT_WHITELIST, PSM_SINGLE_LINE};
