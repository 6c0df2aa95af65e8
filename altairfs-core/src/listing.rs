//! Human-readable directory listing.

use std::io::Write;

use crate::error::FsResult;
use crate::filesystem::FileSystem;
use crate::storage::Storage;

impl<S: Storage> FileSystem<S> {
    /// Print the directory as a table followed by a usage summary.
    pub fn print_directory<W: Write>(&mut self, out: &mut W) -> FsResult<()> {
        let entries = self.entries()?;
        let usage = self.usage()?;

        writeln!(out, "Name  Type            Offset  Length")?;
        for entry in &entries {
            writeln!(
                out,
                "{:<5} {:<15} {:>6}  {:>6}",
                entry.name.to_string(),
                entry.name.kind().describe(),
                entry.offset,
                entry.length
            )?;
        }
        writeln!(
            out,
            "{} file(s), {} bytes used, {} bytes free",
            entries.len(),
            usage.used,
            usage.free
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::FsConfig;
    use crate::filesystem::FileSystem;
    use crate::layout::FileName;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_print_directory() {
        let mut fs = FileSystem::format(MemoryStorage::new(1024), FsConfig::default()).unwrap();
        fs.write_whole_file(FileName::new(b'D', 1), &[0; 100]).unwrap();
        fs.write_whole_file(FileName::new(b'Q', 0x10), &[0; 20]).unwrap();

        let mut out = Vec::new();
        fs.print_directory(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "D01   Captured data        0     100");
        assert_eq!(lines[2], "Q10   Unknown            100      20");
        assert_eq!(lines[3], "2 file(s), 120 bytes used, 884 bytes free");
    }
}
