//! Static configuration shipped with the operator.
//!
//! The assets directory holds `default-configuration/` (one file per bundle
//! category) and `scripts/` (Groovy sources). Install materialises both as
//! config maps.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIGURATION_DIR: &str = "default-configuration";
pub const SCRIPTS_DIR: &str = "scripts";

/// Content of one bundle to materialise, named `<instance>-<suffix>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBundle {
    pub suffix: String,
    pub data: BTreeMap<String, String>,
}

/// How a directory maps onto bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One bundle per file, keyed by the file name.
    Exploded,
    /// One bundle for the whole directory, one key per file.
    Collapsed,
}

/// Directories to materialise, in install order.
pub fn asset_dirs(root: &Path) -> [(PathBuf, Layout); 2] {
    [
        (root.join(DEFAULT_CONFIGURATION_DIR), Layout::Exploded),
        (root.join(SCRIPTS_DIR), Layout::Collapsed),
    ]
}

/// Read the regular, non-hidden files of `dir` sorted by name.
fn read_files(dir: &Path) -> Result<BTreeMap<String, String>> {
    let io_err = |source| Error::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = BTreeMap::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.starts_with('.') {
            continue;
        }

        let content = std::fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        files.insert(file_name.to_string(), content);
    }

    debug!(dir = %dir.display(), files = files.len(), "Read asset directory");
    Ok(files)
}

pub fn load_bundles(dir: &Path, layout: Layout) -> Result<Vec<AssetBundle>> {
    let files = read_files(dir)?;

    let bundles = match layout {
        Layout::Exploded => files
            .into_iter()
            .map(|(file_name, content)| AssetBundle {
                suffix: file_name.clone(),
                data: BTreeMap::from([(file_name, content)]),
            })
            .collect(),
        Layout::Collapsed => {
            let suffix = dir
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or(Error::MissingObjectKey("asset directory name"))?
                .to_string();
            vec![AssetBundle {
                suffix,
                data: files,
            }]
        }
    };
    Ok(bundles)
}
