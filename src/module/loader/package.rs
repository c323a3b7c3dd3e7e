//! Module package formats
//!
//! A package is either a zip archive or an exploded directory. Both carry a
//! descriptor entry plus any number of resource entries.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::module::registry::descriptor::ModuleDescriptor;
use crate::module::traits::{DescriptorError, ModuleError};

/// Descriptor entry name used when none is configured
pub const DEFAULT_DESCRIPTOR_ENTRY: &str = "module.properties";

/// Zip local file header signature
const ZIP_SIGNATURE: [u8; 4] = *b"PK\x03\x04";

/// Supported package layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    /// Zip archive (`.zip`, `.jar`, or any file with a zip signature)
    Archive,
    /// Directory holding the descriptor file
    Directory,
}

impl PackageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageFormat::Archive => "archive",
            PackageFormat::Directory => "directory",
        }
    }

    /// Cheap format check; reads at most the file signature.
    pub fn matches(self, path: &Path, descriptor_entry: &str) -> bool {
        match self {
            PackageFormat::Archive => {
                if !path.is_file() {
                    return false;
                }
                let mut signature = [0u8; 4];
                File::open(path)
                    .and_then(|mut file| file.read_exact(&mut signature))
                    .map(|_| signature == ZIP_SIGNATURE)
                    .unwrap_or(false)
            }
            PackageFormat::Directory => path.is_dir() && path.join(descriptor_entry).is_file(),
        }
    }
}

/// An opened package
pub(crate) enum Package {
    Archive {
        path: PathBuf,
        archive: ZipArchive<File>,
    },
    Directory {
        root: PathBuf,
    },
}

impl Package {
    pub(crate) fn open(format: PackageFormat, path: &Path) -> Result<Self, ModuleError> {
        match format {
            PackageFormat::Archive => {
                let file = File::open(path).map_err(|e| {
                    ModuleError::validation(path, format!("cannot open package: {}", e))
                })?;
                let archive = ZipArchive::new(file).map_err(|e| {
                    ModuleError::validation(path, format!("cannot read archive: {}", e))
                })?;
                Ok(Package::Archive {
                    path: path.to_path_buf(),
                    archive,
                })
            }
            PackageFormat::Directory => {
                if !path.is_dir() {
                    return Err(ModuleError::validation(path, "package directory does not exist"));
                }
                Ok(Package::Directory {
                    root: path.to_path_buf(),
                })
            }
        }
    }

    /// Parse the descriptor entry
    pub(crate) fn descriptor(&mut self, entry: &str) -> Result<ModuleDescriptor, ModuleError> {
        match self {
            Package::Archive { archive, path } => match archive.by_name(entry) {
                Ok(file) => Ok(ModuleDescriptor::parse(file)?),
                Err(ZipError::FileNotFound) => Err(ModuleError::validation(
                    path.as_path(),
                    format!("package has no `{}` descriptor entry", entry),
                )),
                Err(e) => Err(ModuleError::validation(
                    path.as_path(),
                    format!("cannot read descriptor entry: {}", e),
                )),
            },
            Package::Directory { root } => {
                let descriptor_path = root.join(entry);
                if !descriptor_path.is_file() {
                    return Err(ModuleError::validation(
                        root.as_path(),
                        format!("package has no `{}` descriptor entry", entry),
                    ));
                }
                let file = File::open(&descriptor_path)
                    .map_err(|e| DescriptorError::Unreadable(e.to_string()))?;
                Ok(ModuleDescriptor::parse(file)?)
            }
        }
    }

    /// Every entry except the descriptor, as (`/`-separated path, bytes)
    pub(crate) fn resources(&mut self, skip: &str) -> Result<Vec<(String, Vec<u8>)>, ModuleError> {
        let mut resources = Vec::new();
        match self {
            Package::Archive { archive, path } => {
                for index in 0..archive.len() {
                    let mut file = archive.by_index(index).map_err(|e| {
                        ModuleError::validation(path.as_path(), format!("cannot read entry {}: {}", index, e))
                    })?;
                    if file.is_dir() || file.name() == skip {
                        continue;
                    }
                    let name = file.name().to_string();
                    let mut bytes = Vec::new();
                    file.read_to_end(&mut bytes).map_err(|e| {
                        ModuleError::validation(path.as_path(), format!("cannot read entry {}: {}", name, e))
                    })?;
                    resources.push((name, bytes));
                }
            }
            Package::Directory { root } => {
                collect_files(root, root, skip, &mut resources)?;
                resources.sort_by(|a, b| a.0.cmp(&b.0));
            }
        }
        Ok(resources)
    }
}

fn collect_files(
    root: &Path,
    dir: &Path,
    skip: &str,
    out: &mut Vec<(String, Vec<u8>)>,
) -> Result<(), ModuleError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ModuleError::validation(dir, format!("cannot list package directory: {}", e)))?;

    for entry in entries {
        let path = entry
            .map_err(|e| ModuleError::validation(dir, format!("cannot read directory entry: {}", e)))?
            .path();
        if path.is_dir() {
            collect_files(root, &path, skip, out)?;
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if relative == skip {
            continue;
        }
        let bytes = fs::read(&path)
            .map_err(|e| ModuleError::validation(&path, format!("cannot read package file: {}", e)))?;
        out.push((relative, bytes));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, bytes) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(bytes.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_archive_signature_check() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pkg.zip");
        write_archive(&archive, &[("module.properties", "name=a\nmain=b")]);
        let text = temp.path().join("notes.txt");
        fs::write(&text, "plain text").unwrap();

        assert!(PackageFormat::Archive.matches(&archive, DEFAULT_DESCRIPTOR_ENTRY));
        assert!(!PackageFormat::Archive.matches(&text, DEFAULT_DESCRIPTOR_ENTRY));
        assert!(!PackageFormat::Archive.matches(temp.path(), DEFAULT_DESCRIPTOR_ENTRY));
        assert!(!PackageFormat::Directory.matches(&archive, DEFAULT_DESCRIPTOR_ENTRY));
    }

    #[test]
    fn test_archive_descriptor_and_resources() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pkg.zip");
        write_archive(
            &path,
            &[
                ("module.properties", "name=packed\nmain=packed.Main"),
                ("assets/banner.txt", "hi"),
            ],
        );

        let mut package = Package::open(PackageFormat::Archive, &path).unwrap();
        let descriptor = package.descriptor(DEFAULT_DESCRIPTOR_ENTRY).unwrap();
        assert_eq!(descriptor.name(), "packed");

        let resources = package.resources(DEFAULT_DESCRIPTOR_ENTRY).unwrap();
        assert_eq!(resources, vec![("assets/banner.txt".to_string(), b"hi".to_vec())]);
    }

    #[test]
    fn test_archive_without_descriptor() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bare.zip");
        write_archive(&path, &[("readme.md", "nothing here")]);

        let mut package = Package::open(PackageFormat::Archive, &path).unwrap();
        let err = package.descriptor(DEFAULT_DESCRIPTOR_ENTRY).unwrap_err();
        assert!(matches!(err, ModuleError::Validation { .. }));
    }

    #[test]
    fn test_directory_package() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("exploded");
        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(root.join(DEFAULT_DESCRIPTOR_ENTRY), "name=exploded\nmain=e.Main").unwrap();
        fs::write(root.join("data").join("table.csv"), "a,b").unwrap();
        fs::write(root.join("top.txt"), "t").unwrap();

        assert!(PackageFormat::Directory.matches(&root, DEFAULT_DESCRIPTOR_ENTRY));
        let mut package = Package::open(PackageFormat::Directory, &root).unwrap();
        assert_eq!(
            package.descriptor(DEFAULT_DESCRIPTOR_ENTRY).unwrap().entry_point(),
            "e.Main"
        );
        let names: Vec<String> = package
            .resources(DEFAULT_DESCRIPTOR_ENTRY)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["data/table.csv".to_string(), "top.txt".to_string()]);
    }
}
