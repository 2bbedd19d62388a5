use crate::config::Settings;
use base64::Engine;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

// Keeps names unique when one document carries several images.
static IMAGE_SEQ: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageProcessingMode {
    Base64,
    SaveToFile,
}

impl ImageProcessingMode {
    pub fn for_settings(settings: &Settings) -> Self {
        // if image_path is empty, use base64
        if settings.saves_images() {
            ImageProcessingMode::SaveToFile
        } else {
            ImageProcessingMode::Base64
        }
    }
}

pub fn run(file_stream: &[u8], settings: &Settings) -> Result<String, String> {
    run_with_mode(file_stream, ImageProcessingMode::for_settings(settings), &settings.image_path)
}

pub fn run_with_mode(
    file_stream: &[u8],
    mode: ImageProcessingMode,
    image_dir: &Path,
) -> Result<String, String> {
    if file_stream.is_empty() {
        return Err("Input stream is empty".to_string());
    }

    // Determine the MIME type and extension of the image
    let (mime_type, extension) = match infer::get(file_stream) {
        Some(kind) if kind.mime_type().starts_with("image/") => {
            let ext = match kind.mime_type() {
                "image/png" => "png",
                "image/gif" => "gif",
                "image/webp" => "webp",
                _ => "jpg",
            };
            (kind.mime_type().to_string(), ext)
        }
        Some(kind) => return Err(format!("Not an image: {}", kind.mime_type())),
        None => ("image/jpeg".to_string(), "jpg"),
    };

    let image_name = image_name();

    match mode {
        ImageProcessingMode::Base64 => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(file_stream);
            Ok(format!("![{}](data:{};base64,{})", image_name, mime_type, encoded))
        }
        ImageProcessingMode::SaveToFile => {
            let filename = format!("{}.{}", image_name, extension);
            let file_path = image_dir.join(&filename);

            fs::create_dir_all(image_dir)
                .map_err(|e| format!("Failed to create image directory: {}", e))?;
            fs::write(&file_path, file_stream)
                .map_err(|e| format!("Failed to save image file: {}", e))?;
            log::debug!("saved image {}", file_path.display());

            Ok(format!("![{}]({})", image_name, file_path.display()))
        }
    }
}

// name: pic-{timestamp}-{seq}
fn image_name() -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let seq = IMAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("pic-{}-{}", timestamp, seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x02\0\0\0";

    #[test]
    fn test_base64_embedding() {
        let md = run(PNG_HEADER, &Settings::default()).unwrap();
        assert!(md.starts_with("![pic-"));
        assert!(md.contains("](data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let md = run_with_mode(PNG_HEADER, ImageProcessingMode::SaveToFile, dir.path()).unwrap();

        let saved: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(saved.len(), 1);
        let saved_path = saved[0].as_ref().unwrap().path();
        assert_eq!(saved_path.extension().unwrap(), "png");
        assert!(md.ends_with(&format!("({})", saved_path.display())));
    }

    #[test]
    fn test_names_are_unique() {
        assert_ne!(image_name(), image_name());
    }

    #[test]
    fn test_empty_stream() {
        assert!(run(b"", &Settings::default()).is_err());
    }
}
