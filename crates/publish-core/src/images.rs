use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use kuchiki::NodeRef;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::config::{
    ImageMode, MissingImagePolicy, TransformOptions, FLOAT_STYLE, SMALL_IMAGE_THRESHOLD_PX,
};
use crate::error::PublishError;

static DIMENSIONS: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"width:\s*(\d+(?:\.\d+)?)px;\s*height:\s*(\d+(?:\.\d+)?)px;").ok()
});

/// One image handed to the upload function in uploaded mode.
#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    pub name: &'a str,
    pub mime_type: &'static str,
    pub bytes: &'a [u8],
}

pub type Uploader<'u> = dyn FnMut(ImageUpload<'_>) -> Result<String, String> + 'u;

pub fn mime_type(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpg",
        _ => "application/octet-stream",
    }
}

pub fn basename(src: &str) -> &str {
    src.rsplit('/').next().unwrap_or(src)
}

pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// `width: <n>px; height: <n>px;` as declared in an inline style.
pub fn declared_dimensions(style: &str) -> Option<(f32, f32)> {
    let caps = DIMENSIONS.as_ref()?.captures(style)?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    Some((width, height))
}

/// Small images, and images without usable dimensions, float beside the text.
pub fn should_float(dimensions: Option<(f32, f32)>) -> bool {
    match dimensions {
        Some((w, h)) => w < SMALL_IMAGE_THRESHOLD_PX && h < SMALL_IMAGE_THRESHOLD_PX,
        None => true,
    }
}

fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    }
}

pub(crate) struct ImageResolver<'a, 'u> {
    images: &'a HashMap<String, Vec<u8>>,
    options: &'a TransformOptions,
    uploader: Option<&'a mut Uploader<'u>>,
    uploaded: HashMap<String, String>,
}

impl<'a, 'u> ImageResolver<'a, 'u> {
    pub(crate) fn new(
        images: &'a HashMap<String, Vec<u8>>,
        options: &'a TransformOptions,
        uploader: Option<&'a mut Uploader<'u>>,
    ) -> Self {
        Self {
            images,
            options,
            uploader,
            uploaded: HashMap::new(),
        }
    }

    /// Rewrites the `src` (and layout) of every image under `root`.
    pub(crate) fn resolve_all(&mut self, root: &NodeRef) -> Result<usize, PublishError> {
        let Ok(images) = root.select("img[src]") else {
            return Ok(0);
        };
        let images: Vec<NodeRef> = images.map(|img| img.as_node().clone()).collect();
        let mut resolved = 0;
        for img in &images {
            if self.resolve(img)? {
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    fn resolve(&mut self, img: &NodeRef) -> Result<bool, PublishError> {
        let Some(el) = img.as_element() else {
            return Ok(false);
        };
        let mut attrs = el.attributes.borrow_mut();
        let Some(src) = attrs.get("src").map(str::to_string) else {
            return Ok(false);
        };
        let name = basename(&src).to_string();
        let (images, options) = (self.images, self.options);
        let Some(bytes) = images.get(&name) else {
            return match options.missing_images {
                MissingImagePolicy::Fail => Err(PublishError::MissingImageReference(src)),
                MissingImagePolicy::KeepSource => {
                    warn!(%src, "image missing from archive, keeping original src");
                    Ok(false)
                }
            };
        };
        let mime = mime_type(&name);
        match options.image_mode {
            ImageMode::Inline => {
                let dims = attrs.get("style").and_then(declared_dimensions);
                attrs.insert("src", data_uri(mime, bytes));
                if should_float(dims) {
                    attrs.insert("style", FLOAT_STYLE.to_string());
                } else {
                    attrs.remove("style");
                }
            }
            ImageMode::Uploaded => {
                let url = self.upload(&name, mime, bytes)?;
                attrs.insert("src", url);
            }
        }
        debug!(%name, mode = ?options.image_mode, "image resolved");
        Ok(true)
    }

    fn upload(&mut self, name: &str, mime: &'static str, bytes: &[u8]) -> Result<String, PublishError> {
        if let Some(path) = self.uploaded.get(name) {
            return Ok(path.clone());
        }
        let uploader = self
            .uploader
            .as_deref_mut()
            .ok_or(PublishError::UploaderMissing)?;
        let remote_name = match self.options.upload_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{name}"),
            _ => name.to_string(),
        };
        let url = uploader(ImageUpload {
            name: &remote_name,
            mime_type: mime,
            bytes,
        })
        .map_err(|reason| PublishError::Upload {
            name: remote_name.clone(),
            reason,
        })?;
        let path = url_path(&url);
        self.uploaded.insert(name.to_string(), path.clone());
        Ok(path)
    }
}
