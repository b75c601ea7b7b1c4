//! # Package I/O
//!
//! Reads and writes the zip container of a word-processing document.
//!
//! Entries keep their original order and bytes; only parts replaced through
//! [`Package::set`] change. Saving writes a sibling temporary file and renames
//! it over the target so a failed write never truncates the original.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use redline_parser::{parse_bytes, serialize, XmlElement};
use zip::write::FileOptions;
use zip::CompressionMethod;

use crate::errors::{EditorError, EditorResult};

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const PACKAGE_RELS_PART: &str = "_rels/.rels";

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// A single zip entry
#[derive(Debug, Clone, PartialEq)]
pub struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
}

/// In-memory zip container
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<PackageEntry>,
}

impl Package {
    /// Read a package from disk
    pub fn read(path: &Path) -> EditorResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> EditorResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
            });
        }

        let package = Self { entries };
        if !package.contains(DOCUMENT_PART) {
            return Err(EditorError::MissingPart(DOCUMENT_PART.to_string()));
        }
        Ok(package)
    }

    /// Smallest package a consuming application will open around `document_xml`
    pub fn minimal(document_xml: &str) -> Self {
        let mut package = Self::default();
        package.set(
            CONTENT_TYPES_PART,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="{CONTENT_TYPES_NS}"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#
            )
            .into_bytes(),
        );
        package.set(
            PACKAGE_RELS_PART,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{RELATIONSHIPS_NS}"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#
            )
            .into_bytes(),
        );
        package.set(DOCUMENT_PART, document_xml.as_bytes().to_vec());
        package.set(
            DOCUMENT_RELS_PART,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{RELATIONSHIPS_NS}"></Relationships>"#
            )
            .into_bytes(),
        );
        package
    }

    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.data.as_slice())
    }

    /// Replace a part's bytes in place, or append a new deflated part
    pub fn set(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.data = data,
            None => self.entries.push(PackageEntry {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
            }),
        }
    }

    /// Declare a new part in the content types and document relationships.
    /// Already-declared parts are left alone.
    pub fn register_part(&mut self, part: &str, content_type: &str, relationship_type: &str) -> EditorResult<()> {
        self.ensure_override(part, content_type)?;
        self.ensure_relationship(part, relationship_type)
    }

    fn ensure_override(&mut self, part: &str, content_type: &str) -> EditorResult<()> {
        let bytes = self
            .get(CONTENT_TYPES_PART)
            .ok_or_else(|| EditorError::MissingPart(CONTENT_TYPES_PART.to_string()))?;
        let mut types = parse_bytes(CONTENT_TYPES_PART, bytes)?;

        let part_name = format!("/{}", part);
        let declared = types
            .root
            .elements()
            .any(|e| e.is("Override") && e.attr("PartName") == Some(part_name.as_str()));
        if declared {
            return Ok(());
        }

        types.root.children.push(
            XmlElement::new("Override")
                .with_attr("PartName", part_name)
                .with_attr("ContentType", content_type)
                .into(),
        );
        self.set(CONTENT_TYPES_PART, serialize(&types).into_bytes());
        Ok(())
    }

    fn ensure_relationship(&mut self, part: &str, relationship_type: &str) -> EditorResult<()> {
        let target = part.strip_prefix("word/").unwrap_or(part);
        let mut rels = match self.get(DOCUMENT_RELS_PART) {
            Some(bytes) => parse_bytes(DOCUMENT_RELS_PART, bytes)?,
            None => redline_parser::XmlDocument::new(
                XmlElement::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS),
            ),
        };

        if rels
            .root
            .elements()
            .any(|e| e.attr("Type") == Some(relationship_type) && e.attr("Target") == Some(target))
        {
            return Ok(());
        }

        let next = rels
            .root
            .elements()
            .filter_map(|e| e.attr("Id")?.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        rels.root.children.push(
            XmlElement::new("Relationship")
                .with_attr("Id", format!("rId{}", next))
                .with_attr("Type", relationship_type)
                .with_attr("Target", target)
                .into(),
        );
        self.set(DOCUMENT_RELS_PART, serialize(&rels).into_bytes());
        Ok(())
    }

    pub fn write_to<W: Write + Seek>(&self, writer: W) -> EditorResult<W> {
        let mut zip = zip::ZipWriter::new(writer);
        for entry in &self.entries {
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = FileOptions::default().compression_method(method);
            if entry.name.ends_with('/') {
                zip.add_directory(entry.name.as_str(), options)?;
            } else {
                zip.start_file(entry.name.as_str(), options)?;
                zip.write_all(&entry.data)?;
            }
        }
        Ok(zip.finish()?)
    }

    pub fn to_bytes(&self) -> EditorResult<Vec<u8>> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    /// Write the package to `path` through a temporary sibling file
    pub fn write(&self, path: &Path) -> EditorResult<()> {
        let temp = temp_sibling(path);
        let result = File::create(&temp)
            .map_err(EditorError::from)
            .and_then(|file| self.write_to(BufWriter::new(file)))
            .and_then(|mut writer| writer.flush().map_err(EditorError::from))
            .and_then(|_| std::fs::rename(&temp, path).map_err(EditorError::from));

        if result.is_err() {
            let _ = std::fs::remove_file(&temp);
        }
        result
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{}.redline-tmp", name))
}
