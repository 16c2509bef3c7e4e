use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use kuchiki::{traits::*, NodeRef};
use tracing::debug;
use zip::ZipArchive;

use crate::error::PublishError;
use crate::images::basename;

const IMAGES_DIR: &str = "images/";

/// Contents of an exporter zip: one HTML page plus its images.
#[derive(Debug, Clone, Default)]
pub struct ExportArchive {
    pub html: String,
    /// Image bytes keyed by file name.
    pub images: HashMap<String, Vec<u8>>,
}

fn read_entry<R: Read + Seek>(zip: &mut ZipArchive<R>, index: usize) -> Result<Vec<u8>, PublishError> {
    let mut entry = zip.by_index(index)?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

impl ExportArchive {
    pub fn open(path: &Path) -> Result<Self, PublishError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PublishError> {
        Self::from_reader(Cursor::new(bytes))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, PublishError> {
        let mut zip = ZipArchive::new(reader)?;
        let mut html: Option<String> = None;
        let mut images = HashMap::new();
        for index in 0..zip.len() {
            let name = zip.by_index(index)?.name().to_string();
            if name.ends_with('/') {
                continue;
            }
            let lower = name.to_ascii_lowercase();
            if lower.ends_with(".html") || lower.ends_with(".htm") {
                if html.is_some() {
                    debug!(%name, "ignoring additional html entry");
                    continue;
                }
                let bytes = read_entry(&mut zip, index)?;
                html = Some(String::from_utf8_lossy(&bytes).into_owned());
            } else if name.starts_with(IMAGES_DIR) {
                let bytes = read_entry(&mut zip, index)?;
                images.insert(basename(&name).to_string(), bytes);
            }
        }
        let html = html.ok_or_else(|| PublishError::Archive("no .html entry in archive".into()))?;
        debug!(images = images.len(), "export archive read");
        Ok(Self { html, images })
    }

    pub fn document(&self) -> NodeRef {
        kuchiki::parse_html().one(self.html.as_str())
    }
}

/// Text of every `<style>` element, in document order.
pub fn stylesheet_text(document: &NodeRef) -> String {
    let Ok(styles) = document.select("style") else {
        return String::new();
    };
    styles
        .map(|style| style.text_contents())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start file");
            writer.write_all(data).expect("write");
        }
        writer.finish().expect("finish").into_inner()
    }

    #[test]
    fn reads_html_and_images() {
        let bytes = build_zip(&[
            (
                "MyDoc.html",
                &b"<html><head><style>.c1{color:red}</style></head><body><p>x</p></body></html>"[..],
            ),
            ("images/image1.png", &[1u8, 2, 3][..]),
            ("images/image2.jpg", &[4u8][..]),
            ("other.txt", &b"ignored"[..]),
        ]);
        let archive = ExportArchive::from_bytes(bytes).expect("archive");
        assert!(archive.html.contains("<p>x</p>"));
        assert_eq!(archive.images.len(), 2);
        assert_eq!(archive.images["image1.png"], vec![1, 2, 3]);
        assert_eq!(stylesheet_text(&archive.document()), ".c1{color:red}");
    }

    #[test]
    fn archive_without_html_is_rejected() {
        let bytes = build_zip(&[("images/a.png", &[0u8][..])]);
        assert!(matches!(
            ExportArchive::from_bytes(bytes),
            Err(PublishError::Archive(_))
        ));
    }
}
