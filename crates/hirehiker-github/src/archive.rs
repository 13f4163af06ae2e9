//! Tarball extraction and WebContainer file trees
//!
//! GitHub serves repositories as gzip-compressed ustar archives with a pax
//! global header first and every entry under a `<owner>-<repo>-<sha>/`
//! directory. Only regular UTF-8 text files are kept.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use hirehiker_core::problem::normalize_path;
use hirehiker_core::ProjectFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Read};
use tracing::{debug, warn};

const BLOCK_SIZE: usize = 512;

/// Files larger than this are left out of a problem
pub const MAX_FILE_BYTES: usize = 1024 * 1024;

/// Upper bound on the decompressed size of one archive
pub const MAX_ARCHIVE_BYTES: u64 = 256 * 1024 * 1024;

/// pax and GNU long-name bodies above this are skipped
const MAX_META_BYTES: usize = 64 * 1024;

/// Decompress and extract a GitHub tarball
pub fn extract_tarball(gzip: &[u8]) -> Result<Vec<ProjectFile>> {
    extract_from(GzDecoder::new(gzip), MAX_ARCHIVE_BYTES).context("Failed to extract tarball")
}

/// Extract regular files from an uncompressed tar archive
pub fn extract_tar(data: &[u8]) -> Result<Vec<ProjectFile>> {
    extract_from(data, MAX_ARCHIVE_BYTES)
}

/// Walk tar headers straight off the reader; only kept bodies are buffered
fn extract_from<R: Read>(reader: R, limit: u64) -> Result<Vec<ProjectFile>> {
    let mut reader = Bounded::new(reader, limit);
    let mut files = Vec::new();
    let mut header = [0u8; BLOCK_SIZE];
    // Path from a preceding pax or GNU long-name entry
    let mut next_path: Option<String> = None;

    loop {
        let read = read_block(&mut reader, &mut header).context("Failed to read tar header")?;
        if read < BLOCK_SIZE || header.iter().all(|&b| b == 0) {
            break;
        }

        let name = header_str(&header[0..100]);
        let size = parse_octal(&header[124..136])
            .with_context(|| format!("Bad size field for '{}'", name))?;
        let typeflag = header[156];
        let prefix = if &header[257..263] == b"ustar\0" {
            header_str(&header[345..500])
        } else {
            String::new()
        };

        match typeflag {
            b'x' if size <= MAX_META_BYTES => {
                if let Some(path) = pax_path(&read_body(&mut reader, size, &name)?) {
                    next_path = Some(path);
                }
            }
            b'L' if size <= MAX_META_BYTES => {
                next_path = Some(header_str(&read_body(&mut reader, size, &name)?));
            }
            b'x' | b'L' | b'g' => skip(&mut reader, size, &name)?,
            b'0' | 0 => {
                let full = next_path.take().unwrap_or_else(|| {
                    if prefix.is_empty() {
                        name.clone()
                    } else {
                        format!("{}/{}", prefix, name)
                    }
                });
                if size > MAX_FILE_BYTES {
                    debug!("Skipping {} ({} bytes)", full, size);
                    skip(&mut reader, size, &name)?;
                } else if let Some(file) = to_project_file(&full, &read_body(&mut reader, size, &name)?) {
                    files.push(file);
                }
            }
            _ => {
                // Directories, links and devices
                next_path = None;
                skip(&mut reader, size, &name)?;
            }
        }

        let padding = (BLOCK_SIZE - size % BLOCK_SIZE) % BLOCK_SIZE;
        io::copy(&mut (&mut reader).take(padding as u64), &mut io::sink())
            .context("Failed to read tar padding")?;
    }

    debug!("Extracted {} files from tarball", files.len());
    Ok(files)
}

/// Fill `buf` unless the stream ends first; returns the bytes read
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_body<R: Read>(reader: &mut R, size: usize, name: &str) -> Result<Vec<u8>> {
    let mut body = vec![0u8; size];
    reader
        .read_exact(&mut body)
        .map_err(|e| entry_error(e, name))?;
    Ok(body)
}

fn skip<R: Read>(reader: &mut R, size: usize, name: &str) -> Result<()> {
    let size = size as u64;
    let copied = io::copy(&mut reader.take(size), &mut io::sink()).map_err(|e| entry_error(e, name))?;
    if copied < size {
        anyhow::bail!("Truncated tar entry '{}'", name);
    }
    Ok(())
}

fn entry_error(err: io::Error, name: &str) -> anyhow::Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        anyhow::anyhow!("Truncated tar entry '{}'", name)
    } else {
        anyhow::Error::new(err).context(format!("Failed to read tar entry '{}'", name))
    }
}

/// Reader that fails once more than `remaining` bytes come out of it
struct Bounded<R> {
    inner: R,
    limit: u64,
    remaining: u64,
}

impl<R: Read> Bounded<R> {
    fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            limit,
            remaining: limit,
        }
    }
}

impl<R: Read> Read for Bounded<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            let mut extra = [0u8; 1];
            return match self.inner.read(&mut extra)? {
                0 => Ok(0),
                _ => Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("archive exceeds {} bytes once decompressed", self.limit),
                )),
            };
        }
        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

fn to_project_file(full_path: &str, body: &[u8]) -> Option<ProjectFile> {
    let path = strip_root(full_path)?;
    if path.split('/').any(|seg| seg == ".." || seg.is_empty()) {
        warn!("Skipping unsafe path '{}'", full_path);
        return None;
    }
    match std::str::from_utf8(body) {
        Ok(text) => Some(ProjectFile::new(path, text)),
        Err(_) => {
            debug!("Skipping binary file {}", path);
            None
        }
    }
}

/// Drop the top-level directory GitHub wraps the repository in
fn strip_root(path: &str) -> Option<&str> {
    let (_, rest) = path.trim_start_matches("./").split_once('/')?;
    let rest = rest.trim_end_matches('/');
    (!rest.is_empty()).then_some(rest)
}

fn header_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Octal numeric field, or GNU base-256 when the high bit is set
fn parse_octal(field: &[u8]) -> Result<usize> {
    if field.first().is_some_and(|b| b & 0x80 != 0) {
        let mut value: usize = (field[0] & 0x7f) as usize;
        for &b in &field[1..] {
            value = value
                .checked_mul(256)
                .and_then(|v| v.checked_add(b as usize))
                .context("Size field overflow")?;
        }
        return Ok(value);
    }

    let text = header_str(field);
    let text = text.trim_matches(|c: char| c == ' ' || c == '\0');
    if text.is_empty() {
        return Ok(0);
    }
    usize::from_str_radix(text, 8).with_context(|| format!("Invalid octal '{}'", text))
}

/// `path` record of a pax extended header (`<len> key=value\n` records)
fn pax_path(body: &[u8]) -> Option<String> {
    let mut rest = body;
    let mut path = None;

    while !rest.is_empty() {
        let space = rest.iter().position(|&b| b == b' ')?;
        let len: usize = std::str::from_utf8(&rest[..space]).ok()?.parse().ok()?;
        if len <= space || len > rest.len() {
            return path;
        }
        let record = &rest[space + 1..len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        if let Some(value) = record.strip_prefix(b"path=") {
            path = Some(String::from_utf8_lossy(value).into_owned());
        }
        rest = &rest[len..];
    }

    path
}

/// A node of a WebContainer mount tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSystemNode {
    File { contents: String },
    Directory(FileSystemTree),
}

/// Directory listing keyed by entry name
pub type FileSystemTree = BTreeMap<String, FileSystemNode>;

/// Nest flat project files into a mountable tree
pub fn build_file_tree(files: &[ProjectFile]) -> Result<FileSystemTree> {
    let mut tree = FileSystemTree::new();
    for file in files {
        let path = normalize_path(&file.path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            anyhow::bail!("Empty file path");
        }
        insert(&mut tree, path, &segments, &file.content)?;
    }
    Ok(tree)
}

fn insert(tree: &mut FileSystemTree, path: &str, segments: &[&str], contents: &str) -> Result<()> {
    let Some((first, rest)) = segments.split_first() else {
        return Ok(());
    };

    if rest.is_empty() {
        if tree.contains_key(*first) {
            anyhow::bail!("Path '{}' is used more than once", path);
        }
        tree.insert(
            first.to_string(),
            FileSystemNode::File {
                contents: contents.to_string(),
            },
        );
        return Ok(());
    }

    let node = tree
        .entry(first.to_string())
        .or_insert_with(|| FileSystemNode::Directory(FileSystemTree::new()));
    match node {
        FileSystemNode::Directory(children) => insert(children, path, rest, contents),
        FileSystemNode::File { .. } => {
            anyhow::bail!("'{}' is both a file and a directory in '{}'", first, path)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    /// Build one tar entry (header plus padded body)
    pub fn entry(name: &str, typeflag: u8, body: &[u8]) -> Vec<u8> {
        let mut header = [0u8; 512];
        let name_bytes = name.as_bytes();
        header[..name_bytes.len().min(100)].copy_from_slice(&name_bytes[..name_bytes.len().min(100)]);
        header[100..107].copy_from_slice(b"0000644");
        header[124..135].copy_from_slice(format!("{:011o}", body.len()).as_bytes());
        header[156] = typeflag;
        header[257..263].copy_from_slice(b"ustar\0");
        header[263..265].copy_from_slice(b"00");

        let mut out = header.to_vec();
        out.extend_from_slice(body);
        let padding = (512 - body.len() % 512) % 512;
        out.extend(std::iter::repeat(0u8).take(padding));
        out
    }

    pub fn finish(mut tar: Vec<u8>) -> Vec<u8> {
        tar.extend(std::iter::repeat(0u8).take(1024));
        tar
    }

    pub fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// A small archive shaped like GitHub's
    pub fn github_tarball() -> Vec<u8> {
        let mut tar = entry("pax_global_header", b'g', b"52 comment=0123456789abcdef0123456789abcdef01234567\n");
        tar.extend(entry("acme-shop-abc123/", b'5', b""));
        tar.extend(entry("acme-shop-abc123/README.md", b'0', b"# Shop\n"));
        tar.extend(entry("acme-shop-abc123/src/", b'5', b""));
        tar.extend(entry("acme-shop-abc123/src/cart.js", b'0', b"export const total = () => 0;\n"));
        gzip(&finish(tar))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn pax_record(key: &str, value: &str) -> Vec<u8> {
        // Length prefix counts itself
        let body = format!(" {}={}\n", key, value);
        let mut len = body.len() + 1;
        while format!("{}{}", len, body).len() != len {
            len += 1;
        }
        format!("{}{}", len, body).into_bytes()
    }

    #[test]
    fn test_extracts_github_tarball() {
        let files = extract_tarball(&github_tarball()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/cart.js"]);
        assert_eq!(files[1].content, "export const total = () => 0;\n");
    }

    #[test]
    fn test_pax_path_override() {
        let long = format!("acme-shop-abc123/{}/deep.txt", "d".repeat(120));
        let mut tar = entry("PaxHeaders/deep", b'x', &pax_record("path", &long));
        tar.extend(entry("truncated-name", b'0', b"deep"));
        let files = extract_tar(&finish(tar)).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, format!("{}/deep.txt", "d".repeat(120)));
    }

    #[test]
    fn test_gnu_long_name() {
        let long = format!("root/{}.rs", "n".repeat(150));
        let mut name_body = long.clone().into_bytes();
        name_body.push(0);
        let mut tar = entry("././@LongLink", b'L', &name_body);
        tar.extend(entry("short", b'0', b"fn main() {}"));
        tar.extend(entry("root/after.rs", b'0', b"x"));

        let files = extract_tar(&finish(tar)).unwrap();
        assert_eq!(files[0].path, format!("{}.rs", "n".repeat(150)));
        // Long name applies to one entry only
        assert_eq!(files[1].path, "after.rs");
    }

    #[test]
    fn test_ustar_prefix_joined() {
        let mut header_entry = entry("file.txt", b'0', b"hi");
        header_entry[345..356].copy_from_slice(b"root/nested");
        let files = extract_tar(&finish(header_entry)).unwrap();
        assert_eq!(files[0].path, "nested/file.txt");
    }

    #[test]
    fn test_skips_binary_and_large_files() {
        let mut tar = entry("root/logo.png", b'0', &[0x89, 0x50, 0xff, 0xfe]);
        tar.extend(entry("root/big.txt", b'0', &vec![b'a'; MAX_FILE_BYTES + 1]));
        tar.extend(entry("root/link", b'2', b""));
        tar.extend(entry("root/ok.txt", b'0', b"ok"));
        let files = extract_tar(&finish(tar)).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "ok.txt");
    }

    #[test]
    fn test_truncated_entry_is_error() {
        let mut tar = entry("root/a.txt", b'0', &[b'a'; 1000]);
        tar.truncate(600);
        assert!(extract_tar(&tar).is_err());
    }

    #[test]
    fn test_end_without_zero_blocks() {
        let tar = entry("root/a.txt", b'0', b"a");
        assert_eq!(extract_tar(&tar).unwrap().len(), 1);
        assert!(extract_tar(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decompressed_size_is_capped() {
        // Highly compressible body, far smaller on the wire than unpacked
        let mut tar = entry("root/zeros.bin", b'0', &vec![0u8; 64 * 1024]);
        tar.extend(entry("root/ok.txt", b'0', b"ok"));
        let tar = finish(tar);
        let gz = gzip(&tar);
        assert!(gz.len() < 4096);

        let err = extract_from(GzDecoder::new(gz.as_slice()), 16 * 1024).unwrap_err();
        assert!(format!("{:#}", err).contains("exceeds"));

        let files = extract_from(GzDecoder::new(gz.as_slice()), tar.len() as u64).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_oversized_entry_skipped_from_stream() {
        let mut tar = entry("root/huge.txt", b'0', &vec![b'a'; MAX_FILE_BYTES * 2]);
        tar.extend(entry("root/small.txt", b'0', b"small"));
        let files = extract_tarball(&gzip(&finish(tar))).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "small.txt");
    }

    #[test]
    fn test_gnu_magic_has_no_prefix() {
        let mut gnu = entry("root/file.txt", b'0', b"hi");
        gnu[257..265].copy_from_slice(b"ustar  \0");
        // atime/ctime live where ustar keeps its prefix
        gnu[345..356].copy_from_slice(b"14523001234");
        let files = extract_tar(&finish(gnu)).unwrap();
        assert_eq!(files[0].path, "file.txt");
    }

    #[test]
    fn test_not_gzip_is_error() {
        assert!(extract_tarball(b"definitely not gzip").is_err());
    }

    #[test]
    fn test_parse_octal_forms() {
        assert_eq!(parse_octal(b"00000000012\0").unwrap(), 10);
        assert_eq!(parse_octal(b"          12 ").unwrap(), 10);
        assert_eq!(parse_octal(&[0u8; 12]).unwrap(), 0);
        let mut base256 = [0u8; 12];
        base256[0] = 0x80;
        base256[11] = 0x01;
        base256[10] = 0x01;
        assert_eq!(parse_octal(&base256).unwrap(), 257);
        assert!(parse_octal(b"0000000009\0\0").is_err());
    }

    #[test]
    fn test_build_file_tree_nesting() {
        let files = vec![
            ProjectFile::new("package.json", "{}"),
            ProjectFile::new("src/index.js", "main"),
            ProjectFile::new("./src/lib/util.js", "util"),
        ];
        let tree = build_file_tree(&files).unwrap();
        let json = serde_json::to_value(&tree).unwrap();

        assert_eq!(json["package.json"]["file"]["contents"], "{}");
        assert_eq!(json["src"]["directory"]["index.js"]["file"]["contents"], "main");
        assert_eq!(
            json["src"]["directory"]["lib"]["directory"]["util.js"]["file"]["contents"],
            "util"
        );
    }

    #[test]
    fn test_build_file_tree_conflicts() {
        let files = vec![ProjectFile::new("src", "x"), ProjectFile::new("src/a.js", "y")];
        assert!(build_file_tree(&files).is_err());

        let files = vec![ProjectFile::new("src/a.js", "y"), ProjectFile::new("src", "x")];
        assert!(build_file_tree(&files).is_err());

        let files = vec![ProjectFile::new("a.js", "1"), ProjectFile::new("./a.js", "2")];
        assert!(build_file_tree(&files).is_err());
    }

    #[test]
    fn test_tree_round_trips_through_json() {
        let tree = build_file_tree(&[ProjectFile::new("a/b.txt", "c")]).unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        let back: FileSystemTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
