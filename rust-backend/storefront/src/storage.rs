use base64::prelude::*;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::AppError;
use crate::models::ImageUpload;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Products,
    Categories,
    Banners,
    PaymentProofs,
}

impl Folder {
    pub fn as_str(self) -> &'static str {
        match self {
            Folder::Products => "products",
            Folder::Categories => "categories",
            Folder::Banners => "banners",
            Folder::PaymentProofs => "payment-proofs",
        }
    }
}

/// Image files on local disk, addressed by their public URL.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    public_url: String,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn save(&self, folder: Folder, upload: &ImageUpload) -> Result<String, AppError> {
        self.save_base64(folder, &upload.filename, &upload.content_base64).await
    }

    /// Writes the decoded image under a random name and returns its public URL.
    pub async fn save_base64(&self, folder: Folder, filename: &str, content: &str) -> Result<String, AppError> {
        let extension = extension_of(filename)?;
        let bytes = decode_image(content)?;

        let name = format!("{}.{}", random_name(), extension);
        let dir = self.root.join(folder.as_str());
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(&name), &bytes).await?;

        tracing::debug!(folder = folder.as_str(), file = %name, size = bytes.len(), "upload stored");
        Ok(format!("{}/{}/{}", self.public_url, folder.as_str(), name))
    }

    /// Removes the file behind `url`. URLs outside this storage are ignored.
    pub async fn delete(&self, url: &str) -> Result<(), AppError> {
        let Some(path) = self.path_for(url) else {
            tracing::debug!(url, "not a stored upload, nothing to delete");
            return Ok(());
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes quietly; a leftover file is not worth failing a request for.
    pub async fn discard(&self, url: &str) {
        if let Err(e) = self.delete(url).await {
            tracing::warn!(url, error = %e, "could not remove stored file");
        }
    }

    fn path_for(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(&self.public_url)?.strip_prefix('/')?;
        let mut parts = relative.split('/');
        let (folder, file) = (parts.next()?, parts.next()?);
        if parts.next().is_some() || !is_safe_segment(folder) || !is_safe_segment(file) {
            return None;
        }
        Some(self.root.join(folder).join(file))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\')
}

fn extension_of(filename: &str) -> Result<String, AppError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(AppError::field("image", "the image must be a jpg, jpeg, png or webp file"))
    }
}

fn decode_image(content: &str) -> Result<Vec<u8>, AppError> {
    // Accept data URLs as sent by browsers.
    let encoded = match content.split_once(";base64,") {
        Some((_, data)) => data,
        None => content,
    };
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|_| AppError::field("image", "the image is not valid base64"))?;
    if bytes.is_empty() {
        return Err(AppError::field("image", "the image is empty"));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::field("image", "the image may not be greater than 5 MB"));
    }
    Ok(bytes)
}

fn random_name() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(40)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> Storage {
        let root = std::env::temp_dir().join(format!("storefront-storage-{}", random_name()));
        Storage::new(root, "/storage/")
    }

    #[tokio::test]
    async fn saves_and_deletes_by_url() {
        let storage = temp_storage();
        let content = BASE64_STANDARD.encode(b"\x89PNG fake image");

        let url = storage.save_base64(Folder::Banners, "Hero.PNG", &content).await.unwrap();
        assert!(url.starts_with("/storage/banners/"));
        assert!(url.ends_with(".png"));

        let path = storage.path_for(&url).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG fake image");

        storage.delete(&url).await.unwrap();
        assert!(!path.exists());
        // second delete is a no-op
        storage.delete(&url).await.unwrap();

        let _ = std::fs::remove_dir_all(storage.root());
    }

    #[tokio::test]
    async fn rejects_unsupported_extensions() {
        let storage = temp_storage();
        let content = BASE64_STANDARD.encode(b"GIF89a");
        let err = storage.save_base64(Folder::Products, "anim.gif", &content).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_oversized_payloads() {
        let content = BASE64_STANDARD.encode(vec![0u8; MAX_UPLOAD_BYTES + 1]);
        assert!(decode_image(&content).is_err());
        assert!(decode_image("***").is_err());
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        let content = format!("data:image/png;base64,{}", BASE64_STANDARD.encode(b"png"));
        assert_eq!(decode_image(&content).unwrap(), b"png");
    }

    #[test]
    fn foreign_or_traversing_urls_map_to_nothing() {
        let storage = Storage::new("/srv/storage", "/storage");
        assert!(storage.path_for("https://cdn.example.com/a.png").is_none());
        assert!(storage.path_for("/storage/../etc/passwd").is_none());
        assert!(storage.path_for("/storage/products/a/b.png").is_none());
        assert_eq!(
            storage.path_for("/storage/products/a.png").unwrap(),
            PathBuf::from("/srv/storage/products/a.png")
        );
    }
}
