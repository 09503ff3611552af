//! Best-effort ELF introspection.
//!
//! Answers two questions about a file: what word width and machine it was
//! built for, and which dynamic loader it requests (`PT_INTERP`). Both ELF
//! classes go through the same `goblin` code path. Nothing here is fatal:
//! a file that is missing, truncated, or not ELF at all simply yields `None`,
//! because introspection only enriches the library search path.

use std::io::Read;
use std::path::{Path, PathBuf};

use goblin::elf::Elf;
use goblin::elf::header::{EI_CLASS, ELFCLASS32, ELFCLASS64};

/// ELF word-width class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    /// 32-bit image.
    Elf32,
    /// 64-bit image.
    Elf64,
}

/// What makes two ELF images loadable into the same process: word width and
/// machine architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfIdentity {
    /// Word-width class.
    pub class: ElfClass,
    /// Machine architecture code (`e_machine`).
    pub machine: u16,
}

impl ElfIdentity {
    /// Two identities are compatible iff both fields match.
    #[must_use]
    pub fn compatible_with(&self, other: &Self) -> bool {
        self.class == other.class && self.machine == other.machine
    }
}

/// Reads at most the ELF header from the start of a file.
fn read_header_prefix(path: &Path) -> Option<Vec<u8>> {
    let file = std::fs::File::open(path).ok()?;
    let mut buf = Vec::with_capacity(64);
    let _ = file.take(64).read_to_end(&mut buf).ok()?;
    Some(buf)
}

fn identity_from_header(bytes: &[u8]) -> Option<ElfIdentity> {
    let header = Elf::parse_header(bytes).ok()?;
    let class = match header.e_ident[EI_CLASS] {
        ELFCLASS32 => ElfClass::Elf32,
        ELFCLASS64 => ElfClass::Elf64,
        _ => return None,
    };
    Some(ElfIdentity {
        class,
        machine: header.e_machine,
    })
}

/// Returns the identity of the ELF image at `path`, or `None` if the file is
/// unreadable or not a recognized ELF image.
#[must_use]
pub fn identify(path: &Path) -> Option<ElfIdentity> {
    identity_from_header(&read_header_prefix(path)?)
}

/// Returns the identity of the running process's own image.
#[must_use]
pub fn self_identity() -> Option<ElfIdentity> {
    identify(Path::new("/proc/self/exe"))
}

/// Returns the directory portion of the dynamic loader requested by the ELF
/// image at `path`, or `None` if the file is not ELF or requests no loader.
#[must_use]
pub fn interpreter_dir(path: &Path) -> Option<PathBuf> {
    let bytes = std::fs::read(path).ok()?;
    let elf = Elf::parse(&bytes).ok()?;
    let interp = elf.interpreter?;
    Path::new(interp).parent().map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    use goblin::elf::header::{EM_386, EM_AARCH64, EM_X86_64};

    fn put16(buf: &mut [u8], at: usize, v: u16) {
        buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn put32(buf: &mut [u8], at: usize, v: u32) {
        buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn put64(buf: &mut [u8], at: usize, v: u64) {
        buf[at..at + 8].copy_from_slice(&v.to_le_bytes());
    }

    /// Minimal little-endian ELF64 executable with one `PT_INTERP` segment.
    fn elf64_with_interp(machine: u16, interp: &str) -> Vec<u8> {
        let mut interp_bytes = interp.as_bytes().to_vec();
        interp_bytes.push(0);
        let interp_off = 64 + 56;
        let mut b = vec![0u8; interp_off + interp_bytes.len()];

        b[0..4].copy_from_slice(b"\x7fELF");
        b[4] = 2; // ELFCLASS64
        b[5] = 1; // little endian
        b[6] = 1; // EV_CURRENT
        put16(&mut b, 16, 2); // ET_EXEC
        put16(&mut b, 18, machine);
        put32(&mut b, 20, 1);
        put64(&mut b, 32, 64); // e_phoff
        put16(&mut b, 52, 64); // e_ehsize
        put16(&mut b, 54, 56); // e_phentsize
        put16(&mut b, 56, 1); // e_phnum
        put16(&mut b, 58, 64); // e_shentsize

        put32(&mut b, 64, 3); // PT_INTERP
        put32(&mut b, 68, 4); // PF_R
        put64(&mut b, 72, interp_off as u64);
        put64(&mut b, 96, interp_bytes.len() as u64); // p_filesz
        put64(&mut b, 104, interp_bytes.len() as u64); // p_memsz
        put64(&mut b, 112, 1); // p_align

        b[interp_off..].copy_from_slice(&interp_bytes);
        b
    }

    /// Minimal little-endian ELF32 executable with one `PT_INTERP` segment.
    fn elf32_with_interp(machine: u16, interp: &str) -> Vec<u8> {
        let mut interp_bytes = interp.as_bytes().to_vec();
        interp_bytes.push(0);
        let interp_off = 52 + 32;
        let mut b = vec![0u8; interp_off + interp_bytes.len()];

        b[0..4].copy_from_slice(b"\x7fELF");
        b[4] = 1; // ELFCLASS32
        b[5] = 1;
        b[6] = 1;
        put16(&mut b, 16, 2);
        put16(&mut b, 18, machine);
        put32(&mut b, 20, 1);
        put32(&mut b, 28, 52); // e_phoff
        put16(&mut b, 40, 52); // e_ehsize
        put16(&mut b, 42, 32); // e_phentsize
        put16(&mut b, 44, 1); // e_phnum
        put16(&mut b, 46, 40); // e_shentsize

        put32(&mut b, 52, 3); // PT_INTERP
        put32(&mut b, 56, interp_off as u32); // p_offset
        put32(&mut b, 68, interp_bytes.len() as u32); // p_filesz
        put32(&mut b, 72, interp_bytes.len() as u32); // p_memsz
        put32(&mut b, 76, 4); // PF_R
        put32(&mut b, 80, 1); // p_align

        b[interp_off..].copy_from_slice(&interp_bytes);
        b
    }

    fn write_temp(bytes: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("image");
        std::fs::write(&path, bytes).expect("write image");
        (dir, path)
    }

    #[test]
    fn identifies_a_64_bit_image() {
        let (_dir, path) = write_temp(&elf64_with_interp(EM_X86_64, "/lib64/ld-linux-x86-64.so.2"));
        let id = identify(&path).expect("should identify");
        assert_eq!(id.class, ElfClass::Elf64);
        assert_eq!(id.machine, EM_X86_64);
    }

    #[test]
    fn identifies_a_32_bit_image() {
        let (_dir, path) = write_temp(&elf32_with_interp(EM_386, "/lib/ld-linux.so.2"));
        let id = identify(&path).expect("should identify");
        assert_eq!(id.class, ElfClass::Elf32);
        assert_eq!(id.machine, EM_386);
    }

    #[test]
    fn extracts_the_interpreter_directory() {
        let (_dir, path) = write_temp(&elf64_with_interp(EM_X86_64, "/lib64/ld-linux-x86-64.so.2"));
        assert_eq!(
            interpreter_dir(&path),
            Some(PathBuf::from("/lib64"))
        );

        let (_dir, path) = write_temp(&elf32_with_interp(EM_386, "/lib/ld-linux.so.2"));
        assert_eq!(interpreter_dir(&path), Some(PathBuf::from("/lib")));
    }

    #[test]
    fn rejects_non_elf_files() {
        let (_dir, path) = write_temp(b"#!/bin/sh\necho not an elf\n");
        assert!(identify(&path).is_none());
        assert!(interpreter_dir(&path).is_none());
    }

    #[test]
    fn rejects_truncated_images() {
        let full = elf64_with_interp(EM_X86_64, "/lib64/ld-linux-x86-64.so.2");
        let (_dir, path) = write_temp(&full[..8]);
        assert!(identify(&path).is_none());
    }

    #[test]
    fn missing_file_yields_none() {
        assert!(identify(Path::new("/nonexistent/image")).is_none());
        assert!(interpreter_dir(Path::new("/nonexistent/image")).is_none());
    }

    #[test]
    fn compatibility_requires_both_fields() {
        let x64 = ElfIdentity {
            class: ElfClass::Elf64,
            machine: EM_X86_64,
        };
        let x32 = ElfIdentity {
            class: ElfClass::Elf32,
            machine: EM_386,
        };
        let arm64 = ElfIdentity {
            class: ElfClass::Elf64,
            machine: EM_AARCH64,
        };
        assert!(x64.compatible_with(&x64));
        assert!(!x64.compatible_with(&x32));
        assert!(!x64.compatible_with(&arm64));
    }

    #[test]
    fn own_image_is_recognized() {
        let id = self_identity().expect("the test binary is an ELF image");
        assert_eq!(id.class, ElfClass::Elf64);
    }
}
