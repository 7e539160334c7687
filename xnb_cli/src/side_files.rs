use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::info;
use xnb_core::{Result, SideFiles, XnbError};

/// Side files stored next to a JSON document.
///
/// Exports are named after the document (`font.json` spills `font.png`);
/// a second export with the same extension gets a counter (`font.1.png`).
pub struct DirSideFiles {
    dir: PathBuf,
    stem: String,
    used: HashSet<String>,
}

impl DirSideFiles {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            used: HashSet::new(),
        }
    }

    /// Side files for the document at `json_path`.
    pub fn for_document(json_path: &Path) -> Self {
        let dir = json_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let stem = json_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(dir, stem)
    }

    fn next_name(&mut self, extension: &str) -> String {
        let mut name = format!("{}.{extension}", self.stem);
        let mut n = 1;
        while self.used.contains(&name) {
            name = format!("{}.{n}.{extension}", self.stem);
            n += 1;
        }
        self.used.insert(name.clone());
        name
    }
}

/// Only plain relative names inside the document directory are accepted.
fn check_name(name: &str) -> Result<()> {
    let plain = Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if name.is_empty() || !plain {
        return Err(XnbError::SideFile(format!("refusing side file path {name:?}")));
    }
    Ok(())
}

impl SideFiles for DirSideFiles {
    fn export_file(&mut self, data: &[u8], extension: &str) -> Result<String> {
        let name = self.next_name(extension);
        info!(file = %name, bytes = data.len(), "exporting side file");
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(&name), data)?;
        Ok(name)
    }

    fn import_file(&mut self, name: &str) -> Result<Vec<u8>> {
        check_name(name)?;
        let path = self.dir.join(name);
        fs::read(&path).map_err(|e| XnbError::SideFile(format!("{}: {e}", path.display())))
    }
}
