//! Result format handling service
//!
//! Maps MIME types of processed images to file extensions, `image` crate
//! formats and download names.

use image::ImageFormat;

/// Base name suggested when the processed image is downloaded
pub const DOWNLOAD_BASENAME: &str = "removed-bg-hd";

/// Service for handling result formats
pub struct ResultFormatHandler;

impl ResultFormatHandler {
    /// `image` crate format for a MIME type
    ///
    /// # Examples
    /// ```rust
    /// use bg_reveal::services::ResultFormatHandler;
    /// use image::ImageFormat;
    ///
    /// assert_eq!(ResultFormatHandler::image_format("image/png"), Some(ImageFormat::Png));
    /// assert_eq!(ResultFormatHandler::image_format("text/html"), None);
    /// ```
    #[must_use]
    pub fn image_format(mime_type: &str) -> Option<ImageFormat> {
        ImageFormat::from_mime_type(mime_type)
    }

    /// File extension (without the dot) for a MIME type, `png` when unknown
    #[must_use]
    pub fn get_extension(mime_type: &str) -> &'static str {
        match Self::image_format(mime_type) {
            Some(ImageFormat::Jpeg) => "jpg",
            Some(ImageFormat::WebP) => "webp",
            Some(ImageFormat::Tiff) => "tiff",
            Some(ImageFormat::Bmp) => "bmp",
            _ => "png",
        }
    }

    /// Suggested download file name for a processed image
    ///
    /// # Examples
    /// ```rust
    /// use bg_reveal::services::ResultFormatHandler;
    ///
    /// assert_eq!(ResultFormatHandler::download_file_name("image/png"), "removed-bg-hd.png");
    /// ```
    #[must_use]
    pub fn download_file_name(mime_type: &str) -> String {
        format!("{}.{}", DOWNLOAD_BASENAME, Self::get_extension(mime_type))
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(mime_type: &str) -> bool {
        matches!(
            Self::image_format(mime_type),
            Some(ImageFormat::Png | ImageFormat::WebP | ImageFormat::Tiff)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert_eq!(ResultFormatHandler::get_extension("image/png"), "png");
        assert_eq!(ResultFormatHandler::get_extension("image/jpeg"), "jpg");
        assert_eq!(ResultFormatHandler::get_extension("image/webp"), "webp");
        assert_eq!(ResultFormatHandler::get_extension("application/octet-stream"), "png");
    }

    #[test]
    fn test_download_names() {
        assert_eq!(
            ResultFormatHandler::download_file_name("image/webp"),
            "removed-bg-hd.webp"
        );
        assert_eq!(
            ResultFormatHandler::download_file_name("image/jpeg"),
            "removed-bg-hd.jpg"
        );
    }

    #[test]
    fn test_transparency_support() {
        assert!(ResultFormatHandler::supports_transparency("image/png"));
        assert!(ResultFormatHandler::supports_transparency("image/webp"));
        assert!(!ResultFormatHandler::supports_transparency("image/jpeg"));
    }
}
