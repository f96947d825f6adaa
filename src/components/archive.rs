use log::debug;
use regex::Regex;
use std::{
    fs,
    io::Read,
    path::{Component, Path, PathBuf},
};
use tar::Archive;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::errors::{Result, SensorioError};

/// Suffixes stripped from a path to obtain the product name.
const PRODUCT_SUFFIXES: [&str; 3] = [".zip", ".SAFE", ".tar"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packaging {
    Directory,
    Zip,
    Tar,
    File,
}

/// Files of a product as delivered: a directory tree, a zip or tar
/// archive, or a single file.
///
/// Entries are relative to the product root, `/` separated and sorted.
/// The listing is taken once, when the tree is opened.
#[derive(Debug, Clone)]
pub struct ProductTree {
    path: PathBuf,
    packaging: Packaging,
    entries: Vec<String>,
}

impl ProductTree {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = fs::metadata(&path)?;
        let (packaging, mut entries) = if metadata.is_dir() {
            (Packaging::Directory, Self::list_directory(&path))
        } else if has_extension(&path, "zip") {
            (Packaging::Zip, Self::list_zip(&path)?)
        } else if has_extension(&path, "tar") {
            (Packaging::Tar, Self::list_tar(&path)?)
        } else {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    SensorioError::InvalidProduct(format!("{path:?} has no file name"))
                })?;
            (Packaging::File, vec![name])
        };
        entries.sort();
        debug!("{path:?} lists {} entries as {packaging:?}", entries.len());
        Ok(Self {
            path,
            packaging,
            entries,
        })
    }

    fn list_directory(root: &Path) -> Vec<String> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry.path().strip_prefix(root).ok().map(|relative| {
                    relative
                        .components()
                        .map(|component| component.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/")
                })
            })
            .collect()
    }

    fn list_zip(path: &Path) -> Result<Vec<String>> {
        let archive = ZipArchive::new(fs::File::open(path)?)?;
        Ok(archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(String::from)
            .collect())
    }

    fn list_tar(path: &Path) -> Result<Vec<String>> {
        let mut archive = Archive::new(fs::File::open(path)?);
        let mut entries = Vec::new();
        for entry in archive.entries()? {
            let entry = entry?;
            if entry.header().entry_type().is_file() {
                entries.push(tar_entry_name(&entry.path()?));
            }
        }
        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn packaging(&self) -> Packaging {
        self.packaging
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Final path component without packaging suffixes.
    pub fn name(&self) -> String {
        product_name(&self.path)
    }

    pub fn find(&self, pattern: &Regex) -> Option<&str> {
        self.entries
            .iter()
            .map(String::as_str)
            .find(|entry| pattern.is_match(entry))
    }

    pub fn find_all<'a>(&'a self, pattern: &'a Regex) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .map(String::as_str)
            .filter(move |entry| pattern.is_match(entry))
    }

    /// Like [ProductTree::find] but a missing entry is an error.
    pub fn require(&self, pattern: &Regex) -> Result<&str> {
        self.find(pattern).ok_or_else(|| {
            SensorioError::MissingAuxiliaryFile(format!(
                "no entry of {:?} matches {}",
                self.path,
                pattern.as_str()
            ))
        })
    }

    pub fn read_to_string(&self, entry: &str) -> Result<String> {
        match self.packaging {
            Packaging::Directory => Ok(fs::read_to_string(self.path.join(entry))?),
            Packaging::File => Ok(fs::read_to_string(&self.path)?),
            Packaging::Zip => {
                let mut archive = ZipArchive::new(fs::File::open(&self.path)?)?;
                let mut file = archive.by_name(entry)?;
                let mut text = String::new();
                file.read_to_string(&mut text)?;
                Ok(text)
            }
            Packaging::Tar => {
                let mut archive = Archive::new(fs::File::open(&self.path)?);
                for file in archive.entries()? {
                    let mut file = file?;
                    if tar_entry_name(&file.path()?) == entry {
                        let mut text = String::new();
                        file.read_to_string(&mut text)?;
                        return Ok(text);
                    }
                }
                Err(SensorioError::MissingAuxiliaryFile(format!(
                    "{entry} is not in {:?}",
                    self.path
                )))
            }
        }
    }

    /// Path GDAL can open, through `/vsizip/` or `/vsitar/` for archives.
    pub fn gdal_path(&self, entry: &str) -> PathBuf {
        let prefix = match self.packaging {
            Packaging::Directory => return self.path.join(entry),
            Packaging::File => return self.path.clone(),
            Packaging::Zip => "/vsizip",
            Packaging::Tar => "/vsitar",
        };
        let archive = fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        PathBuf::from(format!("{prefix}/{}/{entry}", archive.display()))
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|actual| actual.eq_ignore_ascii_case(extension))
}

/// `/` separated entry name, `./` prefixes dropped.
fn tar_entry_name(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Final path component with `.zip`, `.SAFE` and `.tar` suffixes stripped.
pub fn product_name(path: &Path) -> String {
    let mut name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    while let Some(stripped) = PRODUCT_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
    {
        name = stripped.to_string();
    }
    name
}
