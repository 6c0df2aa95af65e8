//! ZIP import/export of a region's files.
//!
//! Archives hold one `<NAME>.BIN` member per file plus a `manifest.json`
//! describing them. Import checks member lengths against the manifest when
//! one is present.

use std::collections::HashMap;
use std::io::{Read, Seek, Write};

use log::debug;
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{FsError, FsResult};
use crate::filesystem::FileSystem;
use crate::sink::{host_file_name, parse_host_file_name};
use crate::storage::Storage;

/// Name of the manifest member.
pub const MANIFEST_NAME: &str = "manifest.json";

/// One file listed in an archive manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub kind: String,
    pub length: u16,
}

/// Archive manifest schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    #[serde(default)]
    pub files: Vec<ArchiveEntry>,
}

/// Write every non-empty file of `fs` into a ZIP archive.
pub fn export_zip<S: Storage, W: Write + Seek>(fs: &mut FileSystem<S>, writer: W) -> FsResult<W> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default();
    let mut manifest = ArchiveManifest::default();

    for entry in fs.entries()? {
        if entry.length == 0 {
            continue;
        }
        let data = fs.read_file(entry.name)?;
        zip.start_file(host_file_name(entry.name), options)?;
        zip.write_all(&data)?;
        manifest.files.push(ArchiveEntry {
            name: entry.name.to_string(),
            kind: entry.name.kind().describe().to_string(),
            length: entry.length,
        });
    }

    zip.start_file(MANIFEST_NAME, options)?;
    zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;
    debug!("exported {} files", manifest.files.len());
    Ok(zip.finish()?)
}

/// Store every `<NAME>.BIN` member of a ZIP archive into `fs`.
///
/// Members with other names are skipped. Returns the number of files stored.
pub fn import_zip<S: Storage, R: Read + Seek>(fs: &mut FileSystem<S>, reader: R) -> FsResult<usize> {
    let mut archive = ZipArchive::new(reader)?;
    let expected = read_manifest(&mut archive)?
        .map(|m| {
            m.files
                .into_iter()
                .map(|f| (f.name, f.length))
                .collect::<HashMap<_, _>>()
        })
        .unwrap_or_default();

    let mut imported = 0;
    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        if member.is_dir() {
            continue;
        }
        let Some(name) = parse_host_file_name(member.name()) else {
            debug!("skipping archive member {}", member.name());
            continue;
        };

        let mut content = Vec::new();
        member.read_to_end(&mut content)?;
        if let Some(&length) = expected.get(&name.to_string()) {
            if length as usize != content.len() {
                return Err(FsError::Corrupt(format!(
                    "{} holds {} bytes, manifest says {}",
                    name,
                    content.len(),
                    length
                )));
            }
        }
        fs.write_whole_file(name, &content)?;
        imported += 1;
    }
    debug!("imported {} files", imported);
    Ok(imported)
}

fn read_manifest<R: Read + Seek>(archive: &mut ZipArchive<R>) -> FsResult<Option<ArchiveManifest>> {
    let mut member = match archive.by_name(MANIFEST_NAME) {
        Ok(member) => member,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    member.read_to_string(&mut text)?;
    Ok(Some(serde_json::from_str(&text)?))
}
