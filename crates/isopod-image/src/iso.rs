//! ISO 9660 backed file tree
//!
//! [`IsoImage::open`] parses the image's directory records once and builds
//! the full [`Node`] tree up front. After that the image file is only
//! touched by content streams, and each stream opens its own handle, so no
//! request ever shares a seek position with another.

use crate::error::{ImageError, Result};
use crate::tree::{join_path, ContentStream, FileTree, Node, CONTENT_CHUNK_SIZE};
use async_trait::async_trait;
use bytes::Bytes;
use cdfs::{DirectoryEntry, ISODirectory, ISOError, ISOFile, ISO9660};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// A read-only view of an ISO 9660 disc image.
#[derive(Debug)]
pub struct IsoImage {
    path: PathBuf,
    root: Node,
}

impl IsoImage {
    /// Opens the image at `path` and materializes its directory tree.
    ///
    /// Reads the image synchronously; call it during startup, before
    /// serving traffic. Any unreadable or unparsable image is reported
    /// here rather than surfacing later on a per-request basis.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| ImageError::Open {
            path: path.clone(),
            source,
        })?;
        let iso = ISO9660::new(file).map_err(|err| parse_error(&path, err))?;
        let children = read_dir(iso.root(), "/", &path)?;
        let root = Node::dir("", "/", children);
        Ok(Self { path, root })
    }
}

fn parse_error(path: &Path, err: ISOError) -> ImageError {
    ImageError::Parse {
        path: path.to_path_buf(),
        detail: err.to_string(),
    }
}

fn read_dir(dir: &ISODirectory<File>, dir_path: &str, image_path: &Path) -> Result<Vec<Node>> {
    let mut children = Vec::new();
    for entry in dir.contents() {
        let entry = entry.map_err(|err| parse_error(image_path, err))?;
        match entry {
            DirectoryEntry::Directory(sub) => {
                let name = sub.identifier.clone();
                if name == "." || name == ".." {
                    continue;
                }
                let child_path = join_path(dir_path, &name);
                let grandchildren = read_dir(&sub, &child_path, image_path)?;
                children.push(Node::dir(name, child_path, grandchildren));
            }
            DirectoryEntry::File(file) => {
                let name = file.identifier.clone();
                let child_path = join_path(dir_path, &name);
                children.push(Node::file(name, child_path, file.size() as u64));
            }
            // Symlinks and other record kinds are not served.
            _ => {}
        }
    }
    Ok(children)
}

#[async_trait]
impl FileTree for IsoImage {
    fn root(&self) -> &Node {
        &self.root
    }

    async fn content(&self, path: &str) -> Result<ContentStream> {
        let node = self
            .root
            .resolve(path)
            .ok_or_else(|| ImageError::NotFound(path.to_string()))?;
        if node.is_dir() {
            return Err(ImageError::NotAFile(path.to_string()));
        }
        let entry_path = node.path().to_string();

        // Fresh handle per stream: concurrent transfers must not share a
        // seek cursor.
        let file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|source| ImageError::Open {
                path: self.path.clone(),
                source,
            })?;
        let file = file.into_std().await;

        let (tx, rx) = mpsc::channel(8);
        tokio::task::spawn_blocking(move || stream_entry(file, entry_path, tx));
        Ok(ReceiverStream::new(rx))
    }
}

/// Reads `entry_path` out of the image chunk by chunk, forwarding each chunk
/// over `tx`. Runs on the blocking pool; stops early when the receiver is
/// dropped.
fn stream_entry(file: File, entry_path: String, tx: mpsc::Sender<std::io::Result<Bytes>>) {
    let iso = match ISO9660::new(file) {
        Ok(iso) => iso,
        Err(err) => {
            let _ = tx.blocking_send(Err(stream_io_error(err)));
            return;
        }
    };
    let entry = match find_file(iso.root(), &entry_path) {
        Ok(Some(file)) => file,
        Ok(None) => {
            // The materialized tree said this was a file; the image on disk
            // no longer agrees.
            let _ = tx.blocking_send(Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file in image: {entry_path}"),
            )));
            return;
        }
        Err(err) => {
            let _ = tx.blocking_send(Err(stream_io_error(err)));
            return;
        }
    };

    let mut reader = entry.read();
    loop {
        let mut buf = vec![0u8; CONTENT_CHUNK_SIZE];
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                buf.truncate(n);
                if tx.blocking_send(Ok(Bytes::from(buf))).is_err() {
                    // Receiver dropped, the client went away.
                    break;
                }
            }
            Err(err) => {
                let _ = tx.blocking_send(Err(err));
                break;
            }
        }
    }
}

/// Re-walks `path`'s segments from `dir`, matching entry identifiers exactly
/// the way the materialized tree was built, so a node the tree knows about
/// is found by the same name here.
fn find_file(
    dir: &ISODirectory<File>,
    path: &str,
) -> std::result::Result<Option<ISOFile<File>>, ISOError> {
    let mut dir = dir.clone();
    let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
    while let Some(segment) = segments.next() {
        let mut next_dir = None;
        for entry in dir.contents() {
            match entry? {
                DirectoryEntry::Directory(sub) if sub.identifier == segment => {
                    next_dir = Some(sub);
                    break;
                }
                DirectoryEntry::File(file) if file.identifier == segment => {
                    // A file only counts when it is the final segment.
                    return Ok(segments.peek().is_none().then_some(file));
                }
                _ => {}
            }
        }
        match next_dir {
            Some(sub) => dir = sub,
            None => return Ok(None),
        }
    }
    Ok(None)
}

fn stream_io_error(err: ISOError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_stream::StreamExt;

    const SECTOR: usize = 2048;

    fn both_endian16(out: &mut Vec<u8>, v: u16) {
        out.extend(v.to_le_bytes());
        out.extend(v.to_be_bytes());
    }

    fn both_endian32(out: &mut Vec<u8>, v: u32) {
        out.extend(v.to_le_bytes());
        out.extend(v.to_be_bytes());
    }

    // ECMA-119 §9.1 directory record. The record length includes one pad
    // byte whenever the identifier length is even.
    fn dir_record(name: &[u8], lba: u32, data_len: u32, is_dir: bool) -> Vec<u8> {
        let pad = name.len() % 2 == 0;
        let total = 33 + name.len() + usize::from(pad);
        let mut rec = Vec::with_capacity(total);
        rec.push(total as u8);
        rec.push(0);
        both_endian32(&mut rec, lba);
        both_endian32(&mut rec, data_len);
        rec.extend([126, 1, 1, 0, 0, 0, 0]);
        rec.push(if is_dir { 2 } else { 0 });
        rec.extend([0, 0]);
        both_endian16(&mut rec, 1);
        rec.push(name.len() as u8);
        rec.extend(name);
        if pad {
            rec.push(0);
        }
        rec
    }

    fn primary_volume_descriptor(root_lba: u32, total_sectors: u32) -> Vec<u8> {
        let mut pvd = vec![0u8; SECTOR];
        pvd[0] = 1;
        pvd[1..6].copy_from_slice(b"CD001");
        pvd[6] = 1;
        pvd[8..72].fill(b' ');
        let mut field = Vec::new();
        both_endian32(&mut field, total_sectors);
        pvd[80..88].copy_from_slice(&field);
        field.clear();
        both_endian16(&mut field, 1);
        both_endian16(&mut field, 1);
        both_endian16(&mut field, SECTOR as u16);
        pvd[120..132].copy_from_slice(&field);
        field.clear();
        both_endian32(&mut field, 10);
        pvd[132..140].copy_from_slice(&field);
        pvd[156..190].copy_from_slice(&dir_record(&[0], root_lba, SECTOR as u32, true));
        pvd[190..813].fill(b' ');
        pvd[881] = 1;
        pvd
    }

    fn write_sector(image: &mut [u8], lba: u32, bytes: &[u8]) {
        let start = lba as usize * SECTOR;
        image[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Builds a minimal ISO 9660 image holding `/BOOT/VMLINUZ`,
    /// `/BOOT/INITRD.IMG`, `/README.TXT` and a zero-length `/EMPTY.BIN`.
    fn fixture_image(vmlinuz: &[u8], initrd: &[u8], readme: &[u8]) -> Vec<u8> {
        assert!(readme.len() <= SECTOR);
        let root_lba = 18u32;
        let boot_lba = 19u32;
        let readme_lba = 20u32;
        let vmlinuz_lba = 21u32;
        let initrd_lba = vmlinuz_lba + vmlinuz.len().div_ceil(SECTOR).max(1) as u32;
        let total_sectors = initrd_lba + initrd.len().div_ceil(SECTOR).max(1) as u32;

        let mut image = vec![0u8; total_sectors as usize * SECTOR];
        write_sector(
            &mut image,
            16,
            &primary_volume_descriptor(root_lba, total_sectors),
        );
        let mut terminator = vec![0u8; SECTOR];
        terminator[0] = 255;
        terminator[1..6].copy_from_slice(b"CD001");
        terminator[6] = 1;
        write_sector(&mut image, 17, &terminator);

        let mut root = Vec::new();
        root.extend(dir_record(&[0], root_lba, SECTOR as u32, true));
        root.extend(dir_record(&[1], root_lba, SECTOR as u32, true));
        root.extend(dir_record(b"BOOT", boot_lba, SECTOR as u32, true));
        root.extend(dir_record(b"README.TXT", readme_lba, readme.len() as u32, false));
        root.extend(dir_record(b"EMPTY.BIN", 0, 0, false));
        write_sector(&mut image, root_lba, &root);

        let mut boot = Vec::new();
        boot.extend(dir_record(&[0], boot_lba, SECTOR as u32, true));
        boot.extend(dir_record(&[1], root_lba, SECTOR as u32, true));
        boot.extend(dir_record(b"VMLINUZ", vmlinuz_lba, vmlinuz.len() as u32, false));
        boot.extend(dir_record(b"INITRD.IMG", initrd_lba, initrd.len() as u32, false));
        write_sector(&mut image, boot_lba, &boot);

        write_sector(&mut image, readme_lba, readme);
        write_sector(&mut image, vmlinuz_lba, vmlinuz);
        write_sector(&mut image, initrd_lba, initrd);
        image
    }

    fn write_image(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, bytes).expect("write fixture image");
        path
    }

    async fn collect(mut stream: ContentStream) -> Vec<u8> {
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.expect("stream chunk"));
        }
        body
    }

    #[test]
    fn test_open_materializes_tree() {
        let image = fixture_image(b"kernel", b"ramdisk", b"readme text");
        let path = write_image("isopod-iso-tree.iso", &image);
        let iso = IsoImage::open(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let root = iso.root();
        assert!(root.is_dir());
        let names: Vec<&str> = root.children().unwrap().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["BOOT", "README.TXT", "EMPTY.BIN"]);

        let boot = root.resolve("/BOOT").unwrap();
        assert!(boot.is_dir());
        let names: Vec<&str> = boot.children().unwrap().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["VMLINUZ", "INITRD.IMG"]);

        let vmlinuz = root.resolve("/BOOT/VMLINUZ").unwrap();
        assert_eq!(vmlinuz.path(), "/BOOT/VMLINUZ");
        assert_eq!(vmlinuz.size(), Some(6));
        assert_eq!(root.resolve("/EMPTY.BIN").unwrap().size(), Some(0));

        // Identifier matching stays case-sensitive against the stored names.
        assert!(root.resolve("/boot/VMLINUZ").is_none());
        assert!(root.resolve("/BOOT/vmlinuz").is_none());
    }

    #[tokio::test]
    async fn test_streams_file_content_byte_exact() {
        let vmlinuz: Vec<u8> = (0..150_000).map(|i| (i % 251) as u8).collect();
        let image = fixture_image(&vmlinuz, b"ramdisk contents", b"readme");
        let path = write_image("isopod-iso-stream.iso", &image);
        let iso = IsoImage::open(&path).unwrap();

        let body = collect(iso.content("/BOOT/VMLINUZ").await.unwrap()).await;
        assert_eq!(body, vmlinuz);

        let body = collect(iso.content("//BOOT//INITRD.IMG/").await.unwrap()).await;
        assert_eq!(body, b"ramdisk contents");

        let body = collect(iso.content("/EMPTY.BIN").await.unwrap()).await;
        assert!(body.is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_content_errors() {
        let image = fixture_image(b"kernel", b"ramdisk", b"readme");
        let path = write_image("isopod-iso-errors.iso", &image);
        let iso = IsoImage::open(&path).unwrap();

        let err = iso.content("/missing").await.unwrap_err();
        assert!(matches!(err, ImageError::NotFound(_)));

        let err = iso.content("/BOOT").await.unwrap_err();
        assert!(matches!(err, ImageError::NotAFile(_)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_open_rejects_missing_or_garbage_images() {
        let err = IsoImage::open("/nonexistent/isopod-test.iso").unwrap_err();
        assert!(matches!(err, ImageError::Open { .. }));

        let path = write_image("isopod-iso-garbage.iso", &[0xAA; 4096]);
        let err = IsoImage::open(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ImageError::Parse { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_streams_have_independent_cursors() {
        let vmlinuz: Vec<u8> = (0..150_000).map(|i| (i % 251) as u8).collect();
        let initrd: Vec<u8> = (0..60_000).map(|i| (i % 83) as u8).collect();
        let image = fixture_image(&vmlinuz, &initrd, b"readme");
        let path = write_image("isopod-iso-concurrent.iso", &image);
        let iso = Arc::new(IsoImage::open(&path).unwrap());

        let mut handles = Vec::new();
        for i in 0..6 {
            let iso = Arc::clone(&iso);
            let (target, expected) = if i % 2 == 0 {
                ("/BOOT/VMLINUZ", vmlinuz.clone())
            } else {
                ("/BOOT/INITRD.IMG", initrd.clone())
            };
            handles.push(tokio::spawn(async move {
                let body = collect(iso.content(target).await.unwrap()).await;
                assert_eq!(body, expected);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        std::fs::remove_file(&path).ok();
    }
}
