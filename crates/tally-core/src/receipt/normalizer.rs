//! Upload sniffing and image normalization
//!
//! Every upload leaves here as a single JPEG no larger than
//! [`MAX_DIMENSION`] on either side. PDFs are rasterized by an external
//! program (poppler's `pdftoppm` by default).

use std::process::Stdio;
use std::time::Duration;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;

/// Longest side allowed after normalization
pub const MAX_DIMENSION: u32 = 1500;

/// JPEG quality for the first encoding pass
pub const PRIMARY_QUALITY: u8 = 85;

/// JPEG quality for the single fallback pass
pub const FALLBACK_QUALITY: u8 = 50;

/// Encoded size above which the fallback pass runs
pub const MAX_ENCODED_BYTES: usize = 3 * 1024 * 1024;

/// Environment variable naming the PDF rasterizer binary
pub const RASTERIZER_ENV: &str = "TALLY_PDF_RASTERIZER";

/// File type detected from leading magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Png,
    Jpeg,
    Webp,
    Pdf,
    Unknown,
}

impl FileKind {
    /// Inspect the first bytes of an upload. The client's content type is
    /// never consulted.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Self::Png
        } else if bytes.starts_with(&[0xFF, 0xD8]) {
            Self::Jpeg
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Self::Webp
        } else if bytes.starts_with(b"%PDF") {
            Self::Pdf
        } else {
            Self::Unknown
        }
    }

    /// MIME type of the raw upload
    pub fn mime(&self) -> Option<&'static str> {
        match self {
            Self::Png => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            Self::Webp => Some("image/webp"),
            Self::Pdf => Some("application/pdf"),
            Self::Unknown => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Webp => "WEBP",
            Self::Pdf => "PDF",
            Self::Unknown => "unknown",
        }
    }
}

/// A normalized JPEG ready for the vision model
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Decode, shrink if needed, and re-encode a raster image as JPEG
///
/// Unknown formats are handed to the decoder anyway; a decode failure is
/// `ProcessingFailed`.
pub fn normalize_image(bytes: &[u8]) -> Result<NormalizedImage, ExtractionError> {
    normalize_with_budget(bytes, MAX_ENCODED_BYTES)
}

fn normalize_with_budget(bytes: &[u8], budget: usize) -> Result<NormalizedImage, ExtractionError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ExtractionError::ProcessingFailed(e.to_string()))?;

    let (width, height) = img.dimensions();
    let img = if width > MAX_DIMENSION || height > MAX_DIMENSION {
        let resized = img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3);
        debug!(
            from = %format!("{}x{}", width, height),
            to = %format!("{}x{}", resized.width(), resized.height()),
            "Resized receipt image"
        );
        resized
    } else {
        img
    };

    let mut encoded = encode_jpeg(&img, PRIMARY_QUALITY)?;
    if encoded.len() > budget {
        debug!(size = encoded.len(), "Re-encoding receipt at fallback quality");
        encoded = encode_jpeg(&img, FALLBACK_QUALITY)?;
    }

    info!(
        input_bytes = bytes.len(),
        output_bytes = encoded.len(),
        width = img.width(),
        height = img.height(),
        "Image normalized"
    );

    Ok(NormalizedImage {
        bytes: encoded,
        mime: "image/jpeg",
        width: img.width(),
        height: img.height(),
    })
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ExtractionError> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| ExtractionError::ProcessingFailed(e.to_string()))?;
    Ok(out)
}

/// Renders the first page of a PDF to JPEG via an external program
#[derive(Debug, Clone)]
pub struct PdfRasterizer {
    program: String,
    dpi: u32,
    timeout: Duration,
}

impl Default for PdfRasterizer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl PdfRasterizer {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            dpi: 150,
            timeout: Duration::from_secs(30),
        }
    }

    /// Use `TALLY_PDF_RASTERIZER` if set, else `pdftoppm` from `PATH`
    pub fn from_env() -> Self {
        match std::env::var(RASTERIZER_ENV) {
            Ok(program) if !program.trim().is_empty() => Self::new(program.trim()),
            _ => Self::default(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Rasterize the first page. Any failure (missing binary, bad PDF,
    /// timeout, empty output) is reported as an unsupported PDF.
    pub async fn rasterize(&self, pdf: &[u8]) -> Result<Vec<u8>, ExtractionError> {
        let unsupported = || ExtractionError::UnsupportedFormat {
            format: FileKind::Pdf.label().to_string(),
        };

        let dpi = self.dpi.to_string();
        let mut child = Command::new(&self.program)
            .args(["-jpeg", "-r", dpi.as_str(), "-f", "1", "-l", "1", "-singlefile", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                warn!(program = %self.program, error = %e, "Could not start PDF rasterizer");
                unsupported()
            })?;

        // Feed stdin concurrently so a large PDF cannot fill the pipe while
        // we wait on stdout
        if let Some(mut stdin) = child.stdin.take() {
            let data = pdf.to_vec();
            tokio::spawn(async move {
                let _ = stdin.write_all(&data).await;
            });
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(error = %e, "PDF rasterizer failed");
                return Err(unsupported());
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "PDF rasterizer timed out");
                return Err(unsupported());
            }
        };

        if !output.status.success() || output.stdout.is_empty() {
            warn!(
                status = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "PDF rasterizer produced no image"
            );
            return Err(unsupported());
        }

        debug!(bytes = output.stdout.len(), "Rasterized PDF page");
        Ok(output.stdout)
    }
}

/// Full upload normalization: PDFs are rasterized first, everything else
/// goes straight to [`normalize_image`]
pub async fn normalize(
    bytes: &[u8],
    rasterizer: &PdfRasterizer,
) -> Result<NormalizedImage, ExtractionError> {
    let kind = FileKind::sniff(bytes);
    debug!(kind = kind.label(), bytes = bytes.len(), "Sniffed upload");

    match kind {
        FileKind::Pdf => {
            let page = rasterizer.rasterize(bytes).await?;
            normalize_image(&page)
        }
        _ => normalize_image(bytes),
    }
}

/// Encode raw upload bytes as a data URI, for storing alongside an expense
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Encode an image as PNG; shared by tests that need real image bytes
#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_magic_bytes() {
        assert_eq!(FileKind::sniff(&png_bytes(2, 2)), FileKind::Png);
        assert_eq!(FileKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), FileKind::Jpeg);
        assert_eq!(FileKind::sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "), FileKind::Webp);
        assert_eq!(FileKind::sniff(b"%PDF-1.7\n"), FileKind::Pdf);
        assert_eq!(FileKind::sniff(b"GIF89a"), FileKind::Unknown);
        assert_eq!(FileKind::sniff(b""), FileKind::Unknown);
        // RIFF without the WEBP tag is something else (e.g. WAV)
        assert_eq!(FileKind::sniff(b"RIFF\x00\x00\x00\x00WAVEfmt "), FileKind::Unknown);
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let out = normalize_image(&png_bytes(200, 100)).unwrap();
        assert_eq!(out.mime, "image/jpeg");
        assert_eq!((out.width, out.height), (200, 100));
        assert_eq!(FileKind::sniff(&out.bytes), FileKind::Jpeg);
    }

    #[test]
    fn test_large_image_fits_inside_bound() {
        let out = normalize_image(&png_bytes(3000, 1000)).unwrap();
        assert_eq!((out.width, out.height), (1500, 500));

        let tall = normalize_image(&png_bytes(800, 2400)).unwrap();
        assert_eq!(tall.height, MAX_DIMENSION);
        assert_eq!(tall.width, 500);
    }

    #[test]
    fn test_fallback_quality_is_smaller() {
        let png = png_bytes(400, 400);
        let primary = normalize_with_budget(&png, usize::MAX).unwrap();
        let fallback = normalize_with_budget(&png, 0).unwrap();
        assert!(fallback.bytes.len() < primary.bytes.len());
    }

    #[test]
    fn test_garbage_is_processing_failure() {
        let err = normalize_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ExtractionError::ProcessingFailed(_)));
    }

    #[tokio::test]
    async fn test_pdf_without_rasterizer_is_unsupported() {
        let rasterizer = PdfRasterizer::new("tally-no-such-rasterizer");
        let err = normalize(b"%PDF-1.4\n%fake", &rasterizer).await.unwrap_err();
        assert_eq!(
            err,
            ExtractionError::UnsupportedFormat {
                format: "PDF".into()
            }
        );
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri("image/png", b"abc"), "data:image/png;base64,YWJj");
    }
}
