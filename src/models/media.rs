use std::{
    fs::{copy, create_dir_all},
    path::{Path, PathBuf},
};

use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use mime_guess::{from_path, get_mime_extensions_str};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    AccidentPhoto,
    AccidentVideo,
}

#[derive(Debug, MultipartForm)]
pub struct AccidentMediaMultipartRequest {
    #[multipart(rename = "file")]
    pub files: Vec<TempFile>,
}
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AccidentMediaResponse {
    pub urls: Vec<String>,
    pub photos: Vec<String>,
    pub videos: Vec<String>,
}

/// Local directory tree holding uploaded accident media.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaKind {
    fn from_content_type(content_type: &str) -> Result<Self> {
        if content_type.starts_with("video/") {
            Ok(Self::AccidentVideo)
        } else if content_type.starts_with("image/") {
            Ok(Self::AccidentPhoto)
        } else {
            Err(Error::InvalidMime)
        }
    }
    fn dir(&self) -> &'static str {
        match self {
            Self::AccidentPhoto => "accidents/photos",
            Self::AccidentVideo => "accidents/videos",
        }
    }
    fn as_str(&self) -> &'static str {
        match self {
            Self::AccidentPhoto => "accident_photo",
            Self::AccidentVideo => "accident_video",
        }
    }
    pub fn url(&self, name: &str) -> String {
        format!("/files?kind={}&name={}", self.as_str(), name)
    }
}

impl AccidentMediaResponse {
    pub fn push(&mut self, kind: MediaKind, url: String) {
        match kind {
            MediaKind::AccidentPhoto => self.photos.push(url.clone()),
            MediaKind::AccidentVideo => self.videos.push(url.clone()),
        }
        self.urls.push(url);
    }
}

/// Extensions used for stored files when the upload name gives none.
const PREFERRED_EXTENSIONS: &[&str] = &[
    "jpg", "png", "gif", "webp", "heic", "mp4", "mov", "webm", "3gp",
];

/// Pick the stored file's extension: the uploaded name's own extension when it
/// agrees with the content type, otherwise a common one registered for it.
fn extension_for(content_type: &str, file_name: Option<&str>) -> Result<String> {
    let known = get_mime_extensions_str(content_type).ok_or(Error::InvalidMime)?;

    let own = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .filter(|ext| known.iter().any(|known| *known == ext.as_str()));

    own.or_else(|| {
        PREFERRED_EXTENSIONS
            .iter()
            .find(|preferred| known.contains(*preferred))
            .or_else(|| known.first())
            .map(|ext| ext.to_string())
    })
    .ok_or(Error::InvalidMime)
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
    /// Resolve a stored file. Names are bare file names only.
    pub fn path_for(&self, kind: &MediaKind, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
            || name.contains("..")
        {
            return Err(Error::InvalidName);
        }
        Ok(self.root.join(kind.dir()).join(name))
    }
    /// Copy an uploaded file into the store, returning its kind and URL.
    pub fn store(
        &self,
        source: &Path,
        content_type: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<(MediaKind, String)> {
        let content_type = match content_type {
            Some(content_type) => content_type.to_string(),
            None => from_path(file_name.ok_or(Error::InvalidMime)?)
                .first()
                .ok_or(Error::InvalidMime)?
                .essence_str()
                .to_string(),
        };
        let kind = MediaKind::from_content_type(&content_type)?;
        let name = format!(
            "{}.{}",
            ObjectId::new().to_hex(),
            extension_for(&content_type, file_name)?
        );

        let save_dir = self.root.join(kind.dir());
        create_dir_all(&save_dir).map_err(|error| {
            tracing::error!(%error, dir = %save_dir.display(), "directory creation failed");
            Error::FileStorageFailed
        })?;
        copy(source, save_dir.join(&name)).map_err(|error| {
            tracing::error!(%error, "storing uploaded file failed");
            Error::FileStorageFailed
        })?;

        Ok((kind, kind.url(&name)))
    }
    pub fn store_upload(&self, file: &TempFile) -> Result<(MediaKind, String)> {
        let content_type = file.content_type.as_ref().map(|mime| mime.essence_str());
        self.store(file.file.path(), content_type, file.file_name.as_deref())
    }
}
