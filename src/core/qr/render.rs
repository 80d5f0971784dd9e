//! PNG rendering of QR codes

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

use super::QrError;

/// Default edge length of rendered codes, in pixels
pub const DEFAULT_QR_CODE_SIZE: u32 = 256;

/// Renders tokens as base64-encoded PNG QR codes
#[derive(Debug, Clone, Copy)]
pub struct QrRenderer {
    size: u32,
}

impl Default for QrRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_QR_CODE_SIZE)
    }
}

impl QrRenderer {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }

    /// Raw PNG bytes for `data`
    pub fn render_png(&self, data: &str) -> Result<Vec<u8>, QrError> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
            .map_err(|e| QrError::Render(e.to_string()))?;

        let image = code
            .render::<Luma<u8>>()
            .min_dimensions(self.size, self.size)
            .build();

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| QrError::Render(e.to_string()))?;

        Ok(png)
    }

    /// PNG for `data`, base64 encoded
    pub fn render(&self, data: &str) -> Result<String, QrError> {
        Ok(STANDARD.encode(self.render_png(data)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_render_is_decodable_png() {
        let renderer = QrRenderer::new(200);

        let encoded = renderer.render("qr-token-value").unwrap();
        let png = STANDARD.decode(encoded).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert!(decoded.width() >= 200);
        assert_eq!(decoded.width(), decoded.height());
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = QrRenderer::default();
        assert_eq!(
            renderer.render("same").unwrap(),
            renderer.render("same").unwrap()
        );
        assert_ne!(
            renderer.render("same").unwrap(),
            renderer.render("other").unwrap()
        );
    }

    #[test]
    fn test_oversized_payload_fails() {
        let renderer = QrRenderer::default();
        let data = "x".repeat(5000);

        assert!(matches!(renderer.render(&data), Err(QrError::Render(_))));
    }
}
