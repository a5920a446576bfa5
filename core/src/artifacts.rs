//! The file-system surface consumed by the core (spec §6): an abstract
//! "virtual file" and "virtual directory", so the supervisor doesn't care
//! whether a ROM comes from a plain file, a zip archive, or anything else.
//! Only a plain `std::fs` implementation ships here -- no example in the
//! retrieval pack uses a zip/7z crate for this, so that flavor is left as a
//! trait-level seam (DESIGN.md).

use std::{
    fs,
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

pub trait VirtualFile: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;
    fn close(self: Box<Self>) -> io::Result<()>;
}

pub trait VirtualDirectory: Send {
    /// Resets iteration to the first entry.
    fn rewind(&mut self);
    /// Returns the next entry's name, or `None` when exhausted.
    fn list_next(&mut self) -> Option<String>;
    fn open_file(&self, name: &str) -> io::Result<Box<dyn VirtualFile>>;
    fn close(self: Box<Self>);
}

/// `std::fs`-backed `VirtualFile`.
pub struct FsFile {
    inner: fs::File,
}

impl FsFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self { inner: fs::File::open(path)? })
    }

    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self { inner: fs::File::create(path)? })
    }
}

impl VirtualFile for FsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

/// `std::fs`-backed `VirtualDirectory`.
pub struct FsDirectory {
    root: PathBuf,
    entries: Vec<String>,
    cursor: usize,
}

impl FsDirectory {
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                entries.push(name.to_owned());
            }
        }
        entries.sort();
        Ok(Self { root: path.to_owned(), entries, cursor: 0 })
    }
}

impl VirtualDirectory for FsDirectory {
    fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn list_next(&mut self) -> Option<String> {
        let entry = self.entries.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(entry)
    }

    fn open_file(&self, name: &str) -> io::Result<Box<dyn VirtualFile>> {
        Ok(Box::new(FsFile::open(&self.root.join(name))?))
    }

    fn close(self: Box<Self>) {}
}

/// Extensions commonly used for ROM files, checked by `lifecycle::scan_for_rom`
/// when no explicit ROM path is given (spec §4.6: "scanning a provided game
/// directory for the first file that looks like a ROM").
const ROM_EXTENSIONS: &[&str] = &["gba", "gb", "gbc", "bin", "rom"];

/// Extensions commonly used for patch files.
const PATCH_EXTENSIONS: &[&str] = &["ips", "ups", "bps"];

pub fn looks_like_rom(name: &str) -> bool {
    has_extension(name, ROM_EXTENSIONS)
}

pub fn looks_like_patch(name: &str) -> bool {
    has_extension(name, PATCH_EXTENSIONS)
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|candidate| candidate.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rom_extension_detection() {
        assert!(looks_like_rom("Pokemon.gba"));
        assert!(looks_like_rom("game.GBA"));
        assert!(!looks_like_rom("readme.txt"));
    }

    #[test]
    fn patch_extension_detection() {
        assert!(looks_like_patch("fix.ips"));
        assert!(!looks_like_patch("fix.zip"));
    }
}
