//! Altair storage CLI - Inspect and edit emulator storage images from the host.
//!
//! Usage:
//!   altairfs [--trace] [--config fs.json] <image> <command>
//!
//! Examples:
//!   altairfs flash.img format --capacity 65536   # Create an empty image
//!   altairfs flash.img ls                        # List stored files
//!   altairfs flash.img put B01 hello.bas         # Store a host file as B01
//!   altairfs flash.img get D01 capture.bin       # Copy D01 out to the host
//!   altairfs flash.img export backup.zip         # Archive every file
//!   altairfs old.img migrate ./rescued           # Copy legacy files out

mod host_dir;
mod logger;

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::info;

use altairfs_core::{
    export_zip, import_zip, mount_existing, FileName, FileStorage, FileSystem, FsConfig, Mount,
};

use crate::host_dir::HostDirSink;

/// Altair emulator storage image tool
#[derive(Parser, Debug)]
#[command(name = "altairfs")]
#[command(about = "Manage Altair emulator storage images")]
struct Args {
    /// Storage image file
    image: PathBuf,

    /// Enable debug logging of file system operations
    #[arg(short, long, global = true)]
    trace: bool,

    /// JSON file system config (maxOpenFiles, writeBufferSize, exclusiveOpen)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a blank, formatted image
    Format {
        /// Region size in bytes
        #[arg(long, default_value_t = 16384)]
        capacity: u32,
    },
    /// List stored files
    Ls {
        /// Print entries and usage as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store a host file
    Put { name: FileName, file: PathBuf },
    /// Copy a stored file to the host
    Get { name: FileName, file: PathBuf },
    /// Delete a stored file
    Rm { name: FileName },
    /// Verify the image layout
    Check,
    /// Write every file into a ZIP archive
    Export { zip: PathBuf },
    /// Store every file from a ZIP archive
    Import { zip: PathBuf },
    /// Copy the files of a legacy image into a host directory
    Migrate { dir: PathBuf },
}

/// Open and mount an image created by `format`.
///
/// Files without a signature are refused rather than formatted, and legacy
/// images must be migrated first.
fn open_image(
    image: &Path,
    config: FsConfig,
) -> Result<FileSystem<FileStorage>, Box<dyn std::error::Error>> {
    let storage = FileStorage::open(image)?;
    Ok(FileSystem::mount_existing(storage, config)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logger::init_logger(args.trace).map_err(|e| e.to_string())?;

    let config = match &args.config {
        Some(path) => FsConfig::load(path)?,
        None => FsConfig::default(),
    };

    match &args.command {
        Command::Format { capacity } => {
            let storage = FileStorage::create(&args.image, *capacity)?;
            let mut fs = FileSystem::format(storage, config)?;
            fs.storage_mut().sync()?;
            eprintln!("Formatted {} ({} bytes)", args.image.display(), capacity);
        }
        Command::Ls { json } => {
            let mut fs = open_image(&args.image, config)?;
            if *json {
                let listing = serde_json::json!({
                    "files": fs.entries()?,
                    "usage": fs.usage()?,
                });
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                fs.print_directory(&mut io::stdout().lock())?;
            }
        }
        Command::Put { name, file } => {
            let data = std::fs::read(file)?;
            let mut fs = open_image(&args.image, config)?;
            fs.write_whole_file(*name, &data)?;
            fs.storage_mut().sync()?;
            info!("stored {} bytes as {}", data.len(), name);
        }
        Command::Get { name, file } => {
            let mut fs = open_image(&args.image, config)?;
            let data = fs.read_file(*name)?;
            std::fs::write(file, &data)?;
            info!("copied {} bytes of {} to {}", data.len(), name, file.display());
        }
        Command::Rm { name } => {
            let mut fs = open_image(&args.image, config)?;
            if !fs.delete(*name)? {
                return Err(format!("{} not found", name).into());
            }
            fs.storage_mut().sync()?;
        }
        Command::Check => {
            let mut fs = open_image(&args.image, config)?;
            fs.check()?;
            let usage = fs.usage()?;
            println!(
                "OK: {} file(s), {} bytes used, {} bytes free, {} bytes of directory",
                fs.entries()?.len(),
                usage.used,
                usage.free,
                usage.directory
            );
        }
        Command::Export { zip } => {
            let mut fs = open_image(&args.image, config)?;
            let writer = export_zip(&mut fs, BufWriter::new(File::create(zip)?))?;
            writer.into_inner()?.sync_all()?;
            eprintln!("Exported to {}", zip.display());
        }
        Command::Import { zip } => {
            let mut fs = open_image(&args.image, config)?;
            let reader = BufReader::new(File::open(zip)?);
            let count = import_zip(&mut fs, reader)?;
            fs.storage_mut().sync()?;
            eprintln!("Imported {} file(s)", count);
        }
        Command::Migrate { dir } => {
            let storage = FileStorage::open(&args.image)?;
            match mount_existing(storage, config)? {
                Mount::Legacy(mut legacy) => {
                    let mut sink = HostDirSink::new(dir)?;
                    let report = legacy.migrate_into(&mut sink)?;
                    legacy.into_storage().sync()?;
                    eprintln!(
                        "Migrated {} file(s), {} bytes into {}",
                        report.files,
                        report.bytes,
                        dir.display()
                    );
                }
                Mount::Ready(_) => {
                    eprintln!("{} is already in the current format", args.image.display());
                }
            }
        }
    }

    Ok(())
}
