//! Imaging tools.
//!
//! Image processing runs behind `ImagingGateway`, a handle that is expensive
//! to construct in real deployments and therefore built once at process
//! startup and injected wherever it is needed. Processors never construct
//! their own gateway.

use serde_json::{Value as JsonValue, json};
use tracing::debug;

use crate::params::{self, GaussianBlurParams};
use crate::{Processor, ProcessorError, ProcessorOutput, ToolInput};

/// Handle to an image-processing backend.
pub trait ImagingGateway: Send + Sync {
    /// Apply a gaussian blur; input and output are encoded image bytes.
    fn gaussian_blur(&self, image: &[u8], sigma: f64) -> Result<Vec<u8>, ProcessorError>;
}

impl<G> ImagingGateway for std::sync::Arc<G>
where
    G: ImagingGateway + ?Sized,
{
    fn gaussian_blur(&self, image: &[u8], sigma: f64) -> Result<Vec<u8>, ProcessorError> {
        (**self).gaussian_blur(image, sigma)
    }
}

/// Gateway over binary grayscale PGM (`P5`) images.
#[derive(Debug, Default)]
pub struct PgmImagingGateway;

impl PgmImagingGateway {
    pub fn new() -> Self {
        Self
    }
}

impl ImagingGateway for PgmImagingGateway {
    fn gaussian_blur(&self, image: &[u8], sigma: f64) -> Result<Vec<u8>, ProcessorError> {
        let pgm = Pgm::decode(image)?;
        debug!(width = pgm.width, height = pgm.height, sigma, "blurring image");
        let blurred = pgm.blur(sigma);
        Ok(blurred.encode())
    }
}

struct Pgm {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Pgm {
    fn decode(bytes: &[u8]) -> Result<Self, ProcessorError> {
        let mut cursor = 0usize;
        let magic = next_token(bytes, &mut cursor)
            .ok_or_else(|| ProcessorError::invalid_input("empty image file"))?;
        if magic != b"P5" {
            return Err(ProcessorError::invalid_input(
                "unsupported image format; only binary grayscale PGM (P5) is supported",
            ));
        }

        let width = next_usize(bytes, &mut cursor, "width")?;
        let height = next_usize(bytes, &mut cursor, "height")?;
        let maxval = next_usize(bytes, &mut cursor, "maxval")?;
        if maxval == 0 || maxval > 255 {
            return Err(ProcessorError::invalid_input(format!(
                "unsupported PGM maxval {maxval}; expected 1..=255"
            )));
        }
        if width == 0 || height == 0 {
            return Err(ProcessorError::invalid_input("image has zero dimensions"));
        }

        // Exactly one whitespace byte separates the header from pixel data.
        cursor += 1;
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| ProcessorError::invalid_input("image dimensions overflow"))?;
        let pixels = bytes
            .get(cursor..cursor + expected)
            .ok_or_else(|| ProcessorError::invalid_input("truncated PGM pixel data"))?
            .to_vec();

        Ok(Self { width, height, pixels })
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = format!("P5\n{} {}\n255\n", self.width, self.height).into_bytes();
        out.extend_from_slice(&self.pixels);
        out
    }

    /// Separable gaussian blur with edge clamping.
    fn blur(&self, sigma: f64) -> Self {
        let radius = (sigma * 3.0).ceil() as i64;
        let mut kernel = Vec::with_capacity((radius * 2 + 1) as usize);
        for x in -radius..=radius {
            kernel.push((-(x as f64).powi(2) / (2.0 * sigma * sigma)).exp());
        }
        let weight_sum: f64 = kernel.iter().sum();
        for w in &mut kernel {
            *w /= weight_sum;
        }

        let (w, h) = (self.width as i64, self.height as i64);
        let at = |p: &[f64], x: i64, y: i64| {
            let x = x.clamp(0, w - 1) as usize;
            let y = y.clamp(0, h - 1) as usize;
            p[y * self.width + x]
        };

        let source: Vec<f64> = self.pixels.iter().map(|&p| p as f64).collect();
        let mut horizontal = vec![0.0f64; source.len()];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    acc += weight * at(&source, x + k as i64 - radius, y);
                }
                horizontal[(y * w + x) as usize] = acc;
            }
        }
        let mut vertical = vec![0.0f64; source.len()];
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    acc += weight * at(&horizontal, x, y + k as i64 - radius);
                }
                vertical[(y * w + x) as usize] = acc;
            }
        }

        Self {
            width: self.width,
            height: self.height,
            pixels: vertical
                .into_iter()
                .map(|v| v.round().clamp(0.0, 255.0) as u8)
                .collect(),
        }
    }
}

/// Next whitespace-delimited header token, skipping `#` comment lines.
fn next_token<'a>(bytes: &'a [u8], cursor: &mut usize) -> Option<&'a [u8]> {
    loop {
        while *cursor < bytes.len() && bytes[*cursor].is_ascii_whitespace() {
            *cursor += 1;
        }
        if bytes.get(*cursor) == Some(&b'#') {
            while *cursor < bytes.len() && bytes[*cursor] != b'\n' {
                *cursor += 1;
            }
            continue;
        }
        break;
    }
    let start = *cursor;
    while *cursor < bytes.len() && !bytes[*cursor].is_ascii_whitespace() {
        *cursor += 1;
    }
    (*cursor > start).then(|| &bytes[start..*cursor])
}

fn next_usize(bytes: &[u8], cursor: &mut usize, what: &str) -> Result<usize, ProcessorError> {
    let token = next_token(bytes, cursor)
        .ok_or_else(|| ProcessorError::invalid_input(format!("PGM header missing {what}")))?;
    std::str::from_utf8(token)
        .ok()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| ProcessorError::invalid_input(format!("PGM header has invalid {what}")))
}

/// Gaussian blur tool over an injected gateway.
pub struct GaussianBlurProcessor<G> {
    gateway: G,
}

impl<G: ImagingGateway> GaussianBlurProcessor<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }
}

impl<G: ImagingGateway> Processor for GaussianBlurProcessor<G> {
    fn run(&self, input: &ToolInput, params: &JsonValue) -> Result<ProcessorOutput, ProcessorError> {
        let params: GaussianBlurParams = params::parse(params)?;
        params.validate()?;

        let blurred = self.gateway.gaussian_blur(&input.bytes, params.sigma)?;
        let output_bytes = blurred.len();

        Ok(ProcessorOutput {
            result: json!({
                "plot_type": "image",
                "format": "pgm",
                "image": blurred,
            }),
            summary_stats: json!({
                "operation": "gaussian_blur",
                "sigma": params.sigma,
                "input_bytes": input.bytes.len(),
                "output_bytes": output_bytes,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pgm(width: usize, height: usize, pixels: &[u8]) -> Vec<u8> {
        let mut out = format!("P5\n{width} {height}\n255\n").into_bytes();
        out.extend_from_slice(pixels);
        out
    }

    #[test]
    fn blur_preserves_dimensions_and_softens_edges() {
        // A hard vertical edge: left half black, right half white.
        let mut pixels = Vec::new();
        for _ in 0..8 {
            pixels.extend_from_slice(&[0, 0, 0, 0, 255, 255, 255, 255]);
        }
        let blurred = PgmImagingGateway::new()
            .gaussian_blur(&pgm(8, 8, &pixels), 1.0)
            .unwrap();
        let decoded = Pgm::decode(&blurred).unwrap();
        assert_eq!((decoded.width, decoded.height), (8, 8));
        // The pixel next to the edge is no longer fully black.
        let row = &decoded.pixels[0..8];
        assert!(row[3] > 0, "edge should bleed: {row:?}");
        assert!(row[4] < 255, "edge should bleed: {row:?}");
    }

    #[test]
    fn uniform_image_is_unchanged_by_blur() {
        let blurred = PgmImagingGateway::new()
            .gaussian_blur(&pgm(4, 4, &[100; 16]), 2.0)
            .unwrap();
        let decoded = Pgm::decode(&blurred).unwrap();
        assert!(decoded.pixels.iter().all(|&p| p == 100), "{:?}", decoded.pixels);
    }

    #[test]
    fn non_pgm_input_is_invalid() {
        let err = PgmImagingGateway::new()
            .gaussian_blur(b"\x89PNG\r\n", 1.0)
            .unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidInput(_)));
    }

    #[test]
    fn truncated_pixel_data_is_invalid() {
        let err = PgmImagingGateway::new()
            .gaussian_blur(&pgm(4, 4, &[0; 3]), 1.0)
            .unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidInput(_)));
    }

    #[test]
    fn processor_rejects_non_positive_sigma() {
        let processor = GaussianBlurProcessor::new(PgmImagingGateway::new());
        let input = ToolInput::new(pgm(2, 2, &[0; 4]), "cells.pgm");
        let err = processor.run(&input, &json!({"sigma": 0.0})).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidInput(_)));
    }

    #[test]
    fn processor_rejects_oversized_sigma_before_touching_the_image() {
        let processor = GaussianBlurProcessor::new(PgmImagingGateway::new());
        let input = ToolInput::new(pgm(2, 2, &[0; 4]), "cells.pgm");
        let err = processor.run(&input, &json!({"sigma": 1e9})).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidInput(_)));
    }

    #[test]
    fn header_comments_are_skipped() {
        let mut bytes = b"P5\n# made by a microscope\n2 2\n255\n".to_vec();
        bytes.extend_from_slice(&[10, 20, 30, 40]);
        let decoded = Pgm::decode(&bytes).unwrap();
        assert_eq!(decoded.pixels, vec![10, 20, 30, 40]);
    }
}
