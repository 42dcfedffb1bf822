use std::path::{Component, Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    config::Config,
    error::{Error, HtmlError},
};

const DATA_URI_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";

#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

fn invalid(field: &'static str, info: &str) -> Error {
    Error {
        field: Some(field),
        ..HtmlError::InvalidRequest.new(info)
    }
}

/// Decodes `data:image/<ext>;base64,<payload>`. Any other value is not a data
/// URI and yields `None`.
pub fn decode_data_uri(value: &str, field: &'static str) -> Result<Option<DecodedImage>, Error> {
    let Some(rest) = value.strip_prefix(DATA_URI_PREFIX) else {
        return Ok(None);
    };

    let (extension, payload) = rest
        .split_once(BASE64_MARKER)
        .ok_or_else(|| invalid(field, "Image must be base64 encoded"))?;

    let extension = extension.to_ascii_lowercase();
    let extension = match extension.as_str() {
        "jpeg" => "jpg".to_owned(),
        "svg+xml" => "svg".to_owned(),
        _ => extension,
    };
    if extension.is_empty()
        || extension.len() > 5
        || !extension.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(invalid(field, "Unsupported image type"));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| invalid(field, "Image is not valid base64"))?;
    if bytes.is_empty() {
        return Err(invalid(field, "Image is empty"));
    }

    Ok(Some(DecodedImage { extension, bytes }))
}

/// Turns an `image`/`avatar` value into a path relative to the media root.
/// Data URIs are written to `folder` under a fresh name. Anything else must
/// name the `current` image of the entity, either as its stored path or its
/// public URL.
pub async fn store_image(
    value: &str,
    folder: &str,
    field: &'static str,
    current: Option<&str>,
    config: &Config,
) -> Result<String, Error> {
    let value = value.trim();

    match decode_data_uri(value, field)? {
        Some(image) => {
            let name = format!("{}.{}", uuid::Uuid::new_v4(), image.extension);
            let directory = Path::new(&config.media_root).join(folder);

            tokio::fs::create_dir_all(&directory)
                .await
                .map_err(|e| storage_error(&directory, e))?;
            let path = directory.join(&name);
            tokio::fs::write(&path, &image.bytes)
                .await
                .map_err(|e| storage_error(&path, e))?;

            log::debug!("Stored {} bytes to {}", image.bytes.len(), path.display());
            Ok(format!("{folder}/{name}"))
        }
        None => current_reference(value, field, current, config),
    }
}

fn current_reference(
    value: &str,
    field: &'static str,
    current: Option<&str>,
    config: &Config,
) -> Result<String, Error> {
    let prefix = config.media_url("");
    let path = value.strip_prefix(&prefix).unwrap_or(value);

    match current {
        Some(current) if current == path => Ok(current.to_owned()),
        _ => Err(invalid(field, "Image must be a base64 encoded data URI")),
    }
}

/// Location of a stored file under the media root. Only plain relative paths
/// resolve.
fn media_path(path: &str, config: &Config) -> Option<PathBuf> {
    let relative = Path::new(path);
    let plain = relative.components().next().is_some()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

    plain.then(|| Path::new(&config.media_root).join(relative))
}

fn storage_error(path: &Path, e: std::io::Error) -> Error {
    log::error!("Could not write {}: {e}", path.display());
    HtmlError::InternalServerError.default()
}

/// Removes a stored file, a missing file is not an error.
pub async fn remove_image(path: &str, config: &Config) {
    let Some(full_path) = media_path(path, config) else {
        log::warn!("Refusing to remove {path:?} outside the media root");
        return;
    };

    if let Err(e) = tokio::fs::remove_file(&full_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove {}: {e}", full_path.display());
        }
    }
}

/// Removes a freshly stored image when the write that should reference it
/// failed.
pub async fn discard_image_on_error<T>(
    result: Result<T, Error>,
    path: &str,
    config: &Config,
) -> Result<T, Error> {
    if result.is_err() {
        remove_image(path, config).await;
    }
    result
}
