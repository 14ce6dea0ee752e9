//! Blob storage for post and profile images. The core only ever sees the
//! URL a store hands back.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("{0}")]
    InvalidPayload(String),

    #[error("blob io: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob service: {0}")]
    Http(#[from] reqwest::Error),

    #[error("blob url {0} is not owned by this store")]
    ForeignUrl(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores a `data:` URI payload under `folder` and returns its public URL.
    async fn upload(&self, data_uri: &str, folder: &str) -> Result<String, BlobError>;

    async fn destroy(&self, url: &str) -> Result<(), BlobError>;
}

/// Raster formats only; anything a browser could run as markup stays out.
const RASTER_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg", "image/gif", "image/webp"];

pub(crate) struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    pub(crate) fn parse(raw: &str) -> Result<DataUri, BlobError> {
        let invalid = || BlobError::InvalidPayload("image must be a base64 data URI".to_owned());

        let rest = raw.trim().strip_prefix("data:").ok_or_else(invalid)?;
        let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;
        let mime = header.strip_suffix(";base64").ok_or_else(invalid)?;
        let mime = mime.to_ascii_lowercase();
        if !RASTER_TYPES.contains(&mime.as_str()) {
            return Err(BlobError::InvalidPayload(format!("unsupported media type {mime}")));
        }

        let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
        if bytes.is_empty() {
            return Err(invalid());
        }

        Ok(DataUri { mime, bytes })
    }

    fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

fn clean_folder(folder: &str) -> String {
    folder
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Writes blobs under a directory that the router serves at `/uploads`.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base: format!("{}/uploads/", public_url.trim_end_matches('/')),
        }
    }

    fn path_for(&self, url: &str) -> Result<PathBuf, BlobError> {
        let relative = url
            .strip_prefix(&self.public_base)
            .ok_or_else(|| BlobError::ForeignUrl(url.to_owned()))?;
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(BlobError::ForeignUrl(url.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, data_uri: &str, folder: &str) -> Result<String, BlobError> {
        let data = DataUri::parse(data_uri)?;
        let folder = clean_folder(folder);
        let name = format!("{}.{}", Uuid::now_v7().simple(), data.extension());

        let dir = self.root.join(&folder);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&name), &data.bytes).await?;

        debug!("stored {} bytes as {folder}/{name}", data.bytes.len());
        Ok(format!("{}{folder}/{name}", self.public_base))
    }

    async fn destroy(&self, url: &str) -> Result<(), BlobError> {
        let path = self.path_for(url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Serialize)]
struct RemoteUpload<'a> {
    file: &'a str,
    folder: &'a str,
}

#[derive(Deserialize)]
struct RemoteUploaded {
    secure_url: String,
}

#[derive(Serialize)]
struct RemoteDestroy<'a> {
    public_id: &'a str,
}

/// Media service speaking a Cloudinary-style JSON API:
/// `POST {endpoint}/upload {file, folder} -> {secure_url}` and
/// `POST {endpoint}/destroy {public_id}`.
pub struct RemoteBlobStore {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RemoteBlobStore {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}/{path}", self.endpoint));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

/// The id a remote store knows a blob by: last path segment, no extension.
pub(crate) fn public_id(url: &str) -> Option<&str> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    let id = last.split('.').next()?;
    (!id.is_empty()).then_some(id)
}

#[async_trait]
impl BlobStore for RemoteBlobStore {
    async fn upload(&self, data_uri: &str, folder: &str) -> Result<String, BlobError> {
        // validate locally so bad payloads never leave the process
        DataUri::parse(data_uri)?;

        let uploaded: RemoteUploaded = self
            .post("upload")
            .json(&RemoteUpload {
                file: data_uri.trim(),
                folder,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!("uploaded blob to {}", uploaded.secure_url);
        Ok(uploaded.secure_url)
    }

    async fn destroy(&self, url: &str) -> Result<(), BlobError> {
        let public_id = public_id(url).ok_or_else(|| BlobError::ForeignUrl(url.to_owned()))?;
        self.post("destroy")
            .json(&RemoteDestroy { public_id })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn parses_base64_image_uri() {
        let data = DataUri::parse(PIXEL).unwrap();
        assert_eq!(data.mime, "image/png");
        assert_eq!(data.extension(), "png");
        assert_eq!(data.bytes.len(), 8);
    }

    #[test]
    fn rejects_non_image_payloads() {
        assert!(matches!(
            DataUri::parse("https://example.com/cat.png"),
            Err(BlobError::InvalidPayload(_))
        ));
        assert!(matches!(
            DataUri::parse("data:text/plain;base64,aGVsbG8="),
            Err(BlobError::InvalidPayload(_))
        ));
        assert!(matches!(
            DataUri::parse("data:image/svg+xml;base64,PHN2Zz48L3N2Zz4="),
            Err(BlobError::InvalidPayload(_))
        ));
        assert!(matches!(
            DataUri::parse("data:image/png;base64,@@@"),
            Err(BlobError::InvalidPayload(_))
        ));
    }

    #[test]
    fn jpeg_payloads_get_a_jpg_name() {
        let data = DataUri::parse("data:image/JPEG;base64,/9j/4AAQ").unwrap();
        assert_eq!(data.mime, "image/jpeg");
        assert_eq!(data.extension(), "jpg");
    }

    #[tokio::test]
    async fn local_store_refuses_svg() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:5000");

        let err = store
            .upload("data:image/svg+xml;base64,PHN2Zz48L3N2Zz4=", "posts")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::InvalidPayload(_)));
        assert!(!dir.path().join("posts").exists());
    }

    #[test]
    fn public_id_is_last_segment_without_extension() {
        assert_eq!(
            public_id("https://res.example.com/v1/posts/abc123.jpg"),
            Some("abc123")
        );
        assert_eq!(public_id(""), None);
    }

    #[tokio::test]
    async fn local_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:5000/");

        let url = store.upload(PIXEL, "posts").await.unwrap();
        assert!(url.starts_with("http://localhost:5000/uploads/posts/"));
        assert!(url.ends_with(".png"));

        let path = store.path_for(&url).unwrap();
        assert!(path.exists());

        store.destroy(&url).await.unwrap();
        assert!(!path.exists());
        // already gone is fine
        store.destroy(&url).await.unwrap();
    }

    #[tokio::test]
    async fn local_store_refuses_paths_outside_its_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:5000");

        let err = store
            .destroy("http://localhost:5000/uploads/../secrets.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::ForeignUrl(_)));

        let err = store.destroy("https://elsewhere.test/x.png").await.unwrap_err();
        assert!(matches!(err, BlobError::ForeignUrl(_)));
    }
}
