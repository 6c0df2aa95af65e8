//! Regions persisted in host image files, and ZIP transfer between regions.

use std::io::Cursor;
use std::path::PathBuf;

use altairfs_core::{
    export_zip, import_zip, FileName, FileStorage, FileSystem, FsConfig, MemoryStorage,
};

fn image_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("altairfs-{}-{}.img", tag, std::process::id()))
}

#[test]
fn test_image_survives_reopen() {
    let path = image_path("reopen");
    let config = FsConfig::default();

    {
        let storage = FileStorage::create(&path, 4096).unwrap();
        let mut fs = FileSystem::mount(storage, config.clone()).unwrap();
        fs.write_whole_file(FileName::new(b'C', 0), b"mem=64k").unwrap();
        fs.write_whole_file(FileName::new(b'B', 1), b"10 PRINT \"HI\"\r\n20 GOTO 10\r\n")
            .unwrap();
        fs.delete(FileName::new(b'C', 0)).unwrap();
        fs.write_whole_file(FileName::new(b'D', 2), &[0x55; 300]).unwrap();
        fs.storage_mut().sync().unwrap();
    }

    let storage = FileStorage::open(&path).unwrap();
    let mut fs = FileSystem::mount(storage, config).unwrap();
    fs.check().unwrap();
    let entries = fs.entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, FileName::new(b'B', 1));
    assert_eq!(entries[0].offset, 0);
    assert!(!fs.exists(FileName::new(b'C', 0)));
    assert_eq!(fs.read_file(FileName::new(b'D', 2)).unwrap(), vec![0x55; 300]);

    drop(fs);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_blank_image_is_formatted_on_mount() {
    let path = image_path("blank");
    let storage = FileStorage::create(&path, 1024).unwrap();
    let mut fs = FileSystem::mount(storage, FsConfig::default()).unwrap();
    assert!(fs.entries().unwrap().is_empty());
    assert_eq!(fs.dir_start(), 1020);

    drop(fs);
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 1024);
    assert_eq!(&bytes[1020..], &[0, b'A', b'F', b'2']);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_zip_transfer_between_regions() {
    let mut source = FileSystem::mount(MemoryStorage::new(2048), FsConfig::default()).unwrap();
    source.write_whole_file(FileName::new(b'M', 0x10), &[0xC3; 256]).unwrap();
    source.write_whole_file(FileName::new(b'C', 1), b"port=2").unwrap();
    source.write_whole_file(FileName::new(b'Z', 0), b"").unwrap();

    let archive = export_zip(&mut source, Cursor::new(Vec::new())).unwrap();

    let mut target = FileSystem::mount(MemoryStorage::new(1024), FsConfig::default()).unwrap();
    target.write_whole_file(FileName::new(b'C', 1), b"stale").unwrap();
    let imported = import_zip(&mut target, Cursor::new(archive.into_inner())).unwrap();

    // empty files are not exported
    assert_eq!(imported, 2);
    assert_eq!(target.read_file(FileName::new(b'C', 1)).unwrap(), b"port=2");
    assert_eq!(
        target.read_file(FileName::new(b'M', 0x10)).unwrap(),
        vec![0xC3; 256]
    );
    assert!(!target.exists(FileName::new(b'Z', 0)));
    target.check().unwrap();
}
