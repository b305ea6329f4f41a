//! Shard discovery and reading.
//!
//! A kind's shards are either loose `.xml` files or `.xml` entries of a
//! `.zip` archive; in both cases the file name carries the kind's archive
//! code (`9999VBO`, `GEM-WPL-RELATIE`, ...).

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{BagError, Result};
use crate::models::EntityKind;

/// One document of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shard {
    File(PathBuf),
    ZipEntry { archive: PathBuf, name: String },
}

impl Shard {
    /// Name used in logs and errors
    pub fn label(&self) -> String {
        match self {
            Shard::File(path) => path.display().to_string(),
            Shard::ZipEntry { archive, name } => format!("{}:{}", archive.display(), name),
        }
    }
}

/// Largest buffer reserved up front for a zip entry, whatever size the
/// archive declares.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Reads shards, keeping the last zip archive open so consecutive entries
/// share one central directory read.
#[derive(Default)]
pub struct ShardReader {
    open: Option<(PathBuf, ZipArchive<File>)>,
    archives_opened: usize,
}

impl ShardReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&mut self, shard: &Shard) -> Result<String> {
        match shard {
            Shard::File(path) => Ok(fs::read_to_string(path)?),
            Shard::ZipEntry { archive, name } => {
                let zip = self.archive(archive)?;
                let mut entry = zip.by_name(name)?;
                let capacity = entry.size().min(MAX_PREALLOCATION) as usize;
                let mut content = String::with_capacity(capacity);
                entry.read_to_string(&mut content)?;
                Ok(content)
            }
        }
    }

    /// How many times an archive had to be opened
    pub fn archives_opened(&self) -> usize {
        self.archives_opened
    }

    fn archive(&mut self, path: &Path) -> Result<&mut ZipArchive<File>> {
        let reuse = matches!(&self.open, Some((open, _)) if open == path);
        if !reuse {
            debug!("opening {}", path.display());
            let zip = ZipArchive::new(File::open(path)?)?;
            self.open = Some((path.to_path_buf(), zip));
            self.archives_opened += 1;
        }
        match &mut self.open {
            Some((_, zip)) => Ok(zip),
            None => Err(BagError::Worker(format!("archive {} not open", path.display()))),
        }
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Find every shard of `kind` under `dir`, in a stable order.
pub fn discover_shards(dir: &Path, kind: EntityKind) -> Result<Vec<Shard>> {
    if !dir.is_dir() {
        return Err(BagError::Config(format!(
            "input directory {} does not exist",
            dir.display()
        )));
    }

    let code = kind.archive_code();
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().is_some_and(|n| n.contains(code)))
        .map(|e| e.into_path())
        .collect();
    paths.sort();

    let mut shards = Vec::new();
    for path in paths {
        if has_extension(&path, "xml") {
            shards.push(Shard::File(path));
        } else if has_extension(&path, "zip") {
            let archive = ZipArchive::new(File::open(&path)?)?;
            let mut names: Vec<String> = archive
                .file_names()
                .filter(|n| has_extension(Path::new(n), "xml"))
                .map(str::to_string)
                .collect();
            names.sort();
            debug!("{}: {} entries", path.display(), names.len());
            shards.extend(names.into_iter().map(|name| Shard::ZipEntry {
                archive: path.clone(),
                name,
            }));
        }
    }

    Ok(shards)
}
