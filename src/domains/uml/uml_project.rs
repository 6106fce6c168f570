//! Project envelope: a manifest naming the contained documents plus one
//! TOML file per document under `documents/`, stored through the
//! container abstractions of [`crate::common::project_serde`].

use log::info;
use serde::{Deserialize, Serialize};

use crate::common::project_serde::{FSReadAbstraction, FSWriteAbstraction, ZipFSReader, ZipFSWriter};

use super::uml_document::Document;

/// Bumped when the manifest layout changes. Like the document version
/// there is no migration: any other number is refused.
pub const PROJECT_FORMAT_VERSION: u32 = 1;

pub const MANIFEST_FILE_NAME: &str = "project.toml";
pub const SOURCES_FOLDER: &str = "sources";

#[derive(Debug, derive_more::From)]
pub enum ProjectSerializeError {
    TomlSer(toml::ser::Error),
    Io(std::io::Error),
}

#[derive(Debug, derive_more::From)]
pub enum ProjectDeserializeError {
    #[from(ignore)]
    VersionMismatch { found: u32, supported: u32 },
    TomlDe(toml::de::Error),
    Io(std::io::Error),
    Utf8(std::string::FromUtf8Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestDocumentEntry {
    title: String,
    path: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectManifest {
    format_version: u32,
    project_name: String,
    sources_root: String,
    #[serde(default)]
    documents: Vec<ManifestDocumentEntry>,
}

/// A named bundle of documents, the unit of save and open.
#[derive(Debug)]
pub struct Project {
    pub name: String,
    pub documents: Vec<Document>,
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            documents: Vec::new(),
        }
    }

    pub fn write_to<WA: FSWriteAbstraction>(
        &self,
        wa: &mut WA,
    ) -> Result<(), ProjectSerializeError> {
        let mut manifest = ProjectManifest {
            format_version: PROJECT_FORMAT_VERSION,
            project_name: self.name.clone(),
            sources_root: SOURCES_FOLDER.to_owned(),
            documents: Vec::new(),
        };
        for (i, document) in self.documents.iter().enumerate() {
            let path = format!("documents/{i}.toml");
            wa.write_source_file(&path, toml::to_string(document)?.as_bytes())?;
            manifest.documents.push(ManifestDocumentEntry {
                title: document.title.clone(),
                path,
            });
        }
        wa.write_manifest_file(toml::to_string(&manifest)?.as_bytes())?;
        info!(
            "wrote project '{}' with {} document(s)",
            self.name,
            self.documents.len()
        );
        Ok(())
    }

    pub fn read_from<RA: FSReadAbstraction>(
        ra: &mut RA,
    ) -> Result<Self, ProjectDeserializeError> {
        let manifest_text = String::from_utf8(ra.read_manifest_file()?)?;
        let manifest: ProjectManifest = toml::from_str(&manifest_text)?;
        if manifest.format_version != PROJECT_FORMAT_VERSION {
            return Err(ProjectDeserializeError::VersionMismatch {
                found: manifest.format_version,
                supported: PROJECT_FORMAT_VERSION,
            });
        }
        ra.set_sources_folder(&manifest.sources_root);

        let mut documents = Vec::new();
        for entry in &manifest.documents {
            let text = String::from_utf8(ra.read_source_file(&entry.path)?)?;
            documents.push(toml::from_str(&text)?);
        }
        Ok(Self {
            name: manifest.project_name,
            documents,
        })
    }

    /// The whole project as one zip archive.
    pub fn to_zip_bytes(&self) -> Result<Vec<u8>, ProjectSerializeError> {
        let mut writer = ZipFSWriter::new(MANIFEST_FILE_NAME, SOURCES_FOLDER);
        self.write_to(&mut writer)?;
        Ok(writer.into_bytes()?)
    }

    pub fn from_zip_bytes(bytes: Vec<u8>) -> Result<Self, ProjectDeserializeError> {
        let mut reader = ZipFSReader::new(bytes, MANIFEST_FILE_NAME)?;
        Self::read_from(&mut reader)
    }
}
