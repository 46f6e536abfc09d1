//! Club logo and banner uploads, written below a local media root that the
//! router serves at `/media`.

use chrono::Utc;
use nanoid::nanoid;
use std::{
    io,
    path::{Component, Path, PathBuf},
};
use tracing::info;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("the upload is empty")]
    Empty,
    #[error("uploads are limited to 5 MiB")]
    TooLarge,
    #[error("only image uploads are accepted")]
    NotAnImage,
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    public_url: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores the image and returns the URL it is served from.
    pub async fn save(&self, club_id: i32, bytes: &[u8]) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(MediaError::TooLarge);
        }
        let kind = infer::get(bytes).ok_or(MediaError::NotAnImage)?;
        let media_type: mime::Mime = kind
            .mime_type()
            .parse()
            .map_err(|_| MediaError::NotAnImage)?;
        if media_type.type_() != mime::IMAGE {
            return Err(MediaError::NotAnImage);
        }

        let relative = format!(
            "clubs/{club_id}/{}-{}.{}",
            Utc::now().timestamp_millis(),
            nanoid!(10),
            kind.extension()
        );
        let path = self.root.join(&relative);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        info!(club = club_id, path = %relative, %media_type, "media stored");

        Ok(format!("{}/media/{relative}", self.public_url))
    }

    /// Deletes a file previously returned by [`MediaStore::save`]. URLs this
    /// store did not issue are left alone and reported as `false`.
    pub async fn remove(&self, url: &str) -> Result<bool, MediaError> {
        let relative = match url
            .strip_prefix(self.public_url.as_str())
            .and_then(|rest| rest.strip_prefix("/media/"))
        {
            Some(relative) => Path::new(relative),
            None => return Ok(false),
        };
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Ok(false);
        }

        match tokio::fs::remove_file(self.root.join(relative)).await {
            Ok(()) => {
                info!(path = %relative.display(), "media removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
