//! Storage containers for projects: either a plain directory with the
//! manifest next to a sources folder, or the same layout inside a single
//! zip archive. The project layer above only ever talks to the two
//! traits, so both containers share one code path.

use std::ffi::{OsStr, OsString};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub trait FSWriteAbstraction {
    fn write_manifest_file(&mut self, bytes: &[u8]) -> Result<(), std::io::Error>;
    fn write_source_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), std::io::Error>;
}

pub struct FSRawWriter<'a> {
    root: &'a Path,
    manifest_file_name: &'a OsStr,
    sources_folder: &'a OsStr,
}

impl<'a> FSRawWriter<'a> {
    pub fn new(
        root: &'a Path,
        manifest_file_name: &'a OsStr,
        sources_folder: &'a OsStr,
    ) -> Result<Self, std::io::Error> {
        std::fs::DirBuilder::new()
            .recursive(true)
            .create(root.join(sources_folder).join("documents"))?;

        Ok(Self {
            root,
            manifest_file_name,
            sources_folder,
        })
    }
}

impl FSWriteAbstraction for FSRawWriter<'_> {
    fn write_manifest_file(&mut self, bytes: &[u8]) -> Result<(), std::io::Error> {
        let path = self.root.join(self.manifest_file_name);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)?;
        file.write_all(bytes)
    }
    fn write_source_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), std::io::Error> {
        let path = self.root.join(self.sources_folder).join(path);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)?;
        file.write_all(bytes)
    }
}

pub struct ZipFSWriter<'a> {
    zip: zip::ZipWriter<std::io::Cursor<Vec<u8>>>,
    manifest_file_name: &'a str,
    sources_folder: &'a str,
}

impl<'a> ZipFSWriter<'a> {
    pub fn new(manifest_file_name: &'a str, sources_folder: &'a str) -> Self {
        Self {
            zip: zip::ZipWriter::new(std::io::Cursor::new(Vec::new())),
            manifest_file_name,
            sources_folder,
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, std::io::Error> {
        Ok(self.zip.finish()?.into_inner())
    }
}

impl FSWriteAbstraction for ZipFSWriter<'_> {
    fn write_manifest_file(&mut self, bytes: &[u8]) -> Result<(), std::io::Error> {
        self.zip
            .start_file(self.manifest_file_name, zip::write::SimpleFileOptions::default())?;
        self.zip.write_all(bytes)
    }
    fn write_source_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), std::io::Error> {
        let path = format!("{}/{}", self.sources_folder, path);
        self.zip
            .start_file(path, zip::write::SimpleFileOptions::default())?;
        self.zip.write_all(bytes)
    }
}

pub trait FSReadAbstraction {
    fn read_manifest_file(&mut self) -> Result<Vec<u8>, std::io::Error>;
    /// The sources folder is only known once the manifest was read.
    fn set_sources_folder(&mut self, sources_folder: &str);
    fn read_source_file(&mut self, path: &str) -> Result<Vec<u8>, std::io::Error>;
}

pub struct FSRawReader {
    root: PathBuf,
    manifest_file_name: OsString,
    sources_folder: String,
}

impl FSRawReader {
    pub fn new(root: PathBuf, manifest_file_name: OsString) -> Self {
        Self {
            root,
            manifest_file_name,
            sources_folder: ".".to_owned(),
        }
    }
}

impl FSReadAbstraction for FSRawReader {
    fn read_manifest_file(&mut self) -> Result<Vec<u8>, std::io::Error> {
        let path = self.root.join(&self.manifest_file_name);
        let mut file = std::fs::File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }
    fn set_sources_folder(&mut self, sources_folder: &str) {
        self.sources_folder = sources_folder.to_owned();
    }
    fn read_source_file(&mut self, path: &str) -> Result<Vec<u8>, std::io::Error> {
        let path = self.root.join(&self.sources_folder).join(path);
        let mut file = std::fs::File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }
}

pub struct ZipFSReader<'a> {
    zip: zip::ZipArchive<std::io::Cursor<Vec<u8>>>,
    manifest_file_name: &'a str,
    sources_folder: String,
}

impl<'a> ZipFSReader<'a> {
    pub fn new(bytes: Vec<u8>, manifest_file_name: &'a str) -> Result<Self, std::io::Error> {
        let zip = zip::ZipArchive::new(std::io::Cursor::new(bytes))?;

        Ok(Self {
            zip,
            manifest_file_name,
            sources_folder: ".".to_owned(),
        })
    }
}

impl FSReadAbstraction for ZipFSReader<'_> {
    fn read_manifest_file(&mut self) -> Result<Vec<u8>, std::io::Error> {
        self.zip.by_name(self.manifest_file_name)?.bytes().collect()
    }
    fn set_sources_folder(&mut self, sources_folder: &str) {
        self.sources_folder = sources_folder.to_owned();
    }
    fn read_source_file(&mut self, path: &str) -> Result<Vec<u8>, std::io::Error> {
        let path = format!("{}/{}", self.sources_folder, path);
        self.zip.by_name(&path)?.bytes().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_writer_reader_round_trip() {
        let mut writer = ZipFSWriter::new("project.toml", "sources");
        writer.write_manifest_file(b"manifest").unwrap();
        writer
            .write_source_file("documents/0.toml", b"document")
            .unwrap();
        let bytes = writer.into_bytes().unwrap();

        let mut reader = ZipFSReader::new(bytes, "project.toml").unwrap();
        assert_eq!(reader.read_manifest_file().unwrap(), b"manifest");
        reader.set_sources_folder("sources");
        assert_eq!(
            reader.read_source_file("documents/0.toml").unwrap(),
            b"document"
        );
    }

    #[test]
    fn missing_zip_entry_is_an_error() {
        let writer = ZipFSWriter::new("project.toml", "sources");
        let bytes = writer.into_bytes().unwrap();
        let mut reader = ZipFSReader::new(bytes, "project.toml").unwrap();
        assert!(reader.read_manifest_file().is_err());
    }
}
