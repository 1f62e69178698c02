//! Writing exported pages into the mirror
//!
//! Every page is written to a temporary file next to its destination and
//! renamed into place, so a page on disk is either the previous version or
//! the complete new one.

use crate::WriteError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// What to delete from the destination before a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOptions {
    /// Remove the whole output directory
    pub all: bool,
    /// Remove cached stylesheets
    pub css: bool,
    /// Remove cached scripts
    pub js: bool,
}

/// Writes cleaned documents below one output directory
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Prepares the destination, applying the requested clean options
    ///
    /// Cached assets are kept unless a clean option removes them, so later
    /// runs reuse what earlier runs downloaded.
    pub fn prepare(&self, clean: &CleanOptions, assets_dir: &str) -> Result<(), WriteError> {
        if clean.all && self.output_dir.exists() {
            info!("Removing {}", self.output_dir.display());
            fs::remove_dir_all(&self.output_dir).map_err(|source| WriteError {
                path: self.output_dir.clone(),
                source,
            })?;
        }

        let asset_dir = self.output_dir.join(assets_dir);
        let mut extensions = Vec::new();
        if clean.css {
            extensions.push("css");
        }
        if clean.js {
            extensions.push("js");
        }
        if !extensions.is_empty() && asset_dir.is_dir() {
            let entries = fs::read_dir(&asset_dir).map_err(|source| WriteError {
                path: asset_dir.clone(),
                source,
            })?;
            for entry in entries.flatten() {
                let path = entry.path();
                let matches = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| extensions.contains(&e));
                if matches {
                    debug!("Removing cached {}", path.display());
                    fs::remove_file(&path).map_err(|source| WriteError {
                        path: path.clone(),
                        source,
                    })?;
                }
            }
        }

        fs::create_dir_all(&self.output_dir).map_err(|source| WriteError {
            path: self.output_dir.clone(),
            source,
        })
    }

    /// Writes `html` to `local_path` (relative to the output directory)
    ///
    /// # Returns
    ///
    /// The absolute-or-cwd-relative path that was written
    pub fn export(&self, html: &str, local_path: &Path) -> Result<PathBuf, WriteError> {
        let destination = self.output_dir.join(local_path);
        let parent = destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.output_dir.clone());

        let fail = |source: std::io::Error| WriteError {
            path: destination.clone(),
            source,
        };

        fs::create_dir_all(&parent).map_err(fail)?;
        let mut file = NamedTempFile::new_in(&parent).map_err(fail)?;
        file.write_all(html.as_bytes()).map_err(fail)?;
        file.flush().map_err(fail)?;
        file.persist(&destination).map_err(|e| fail(e.error))?;

        debug!("Wrote {}", destination.display());
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_export_creates_parents() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let written = exporter
            .export("<p>hi</p>", Path::new("blog/post/index.html"))
            .unwrap();
        assert_eq!(written, dir.path().join("blog/post/index.html"));
        assert_eq!(fs::read_to_string(written).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn test_export_replaces_whole_file() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        exporter.export("first version, longer", Path::new("index.html")).unwrap();
        exporter.export("second", Path::new("index.html")).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "second"
        );
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_export_failure_reports_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blocked"), "file, not a directory").unwrap();
        let exporter = Exporter::new(dir.path());
        let err = exporter
            .export("x", Path::new("blocked/index.html"))
            .unwrap_err();
        assert_eq!(err.path, dir.path().join("blocked/index.html"));
    }

    #[test]
    fn test_prepare_clean_options() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("site");
        let assets = out.join("assets");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("a.css"), "").unwrap();
        fs::write(assets.join("b.js"), "").unwrap();
        fs::write(assets.join("c.png"), "").unwrap();

        let exporter = Exporter::new(&out);
        exporter
            .prepare(
                &CleanOptions {
                    css: true,
                    ..CleanOptions::default()
                },
                "assets",
            )
            .unwrap();
        assert!(!assets.join("a.css").exists());
        assert!(assets.join("b.js").exists());
        assert!(assets.join("c.png").exists());

        exporter
            .prepare(
                &CleanOptions {
                    all: true,
                    ..CleanOptions::default()
                },
                "assets",
            )
            .unwrap();
        assert!(out.is_dir());
        assert!(!assets.exists());
    }
}
