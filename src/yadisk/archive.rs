//! Archive assembler
//!
//! Turns a selection of files and folders into one in-memory ZIP. Folders are
//! expanded through the [`DirectoryWalker`] with an explicit stack, files are
//! resolved and fetched one at a time, and every per-file failure is logged
//! and skipped so the caller always gets a valid archive.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::client::ResourceSource;
use super::paths;
use super::types::{Listing, PublicKey, ResourceItem, ResourceKind};
use super::walker::DirectoryWalker;
use crate::config::Config;

#[derive(Debug, Clone, Copy)]
pub struct ArchiveOptions {
    /// Folder levels expanded below a selected folder
    pub max_depth: usize,
    /// Uncompressed bytes accepted into one archive
    pub max_total_bytes: u64,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_total_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

impl ArchiveOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_depth: config.archive.max_depth,
            max_total_bytes: config.web.max_zip_size,
        }
    }
}

/// A finished archive. The counters are for logging; callers hand out the
/// bytes only.
#[derive(Debug)]
pub struct Assembled {
    pub bytes: Vec<u8>,
    pub written: usize,
    pub skipped: usize,
}

/// Pending children of one expanded folder.
struct Frame {
    prefix: String,
    depth: usize,
    remaining: std::vec::IntoIter<ResourceItem>,
}

struct ArchiveSink {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    entries: HashSet<String>,
    total_bytes: u64,
    max_total_bytes: u64,
    written: usize,
    skipped: usize,
}

impl ArchiveSink {
    fn new(max_total_bytes: u64) -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(6));

        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options,
            entries: HashSet::new(),
            total_bytes: 0,
            max_total_bytes,
            written: 0,
            skipped: 0,
        }
    }

    fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    fn skip(&mut self) {
        self.skipped += 1;
    }

    /// Bytes still accepted before the archive limit.
    fn remaining(&self) -> u64 {
        self.max_total_bytes.saturating_sub(self.total_bytes)
    }

    fn write_entry(&mut self, entry: &str, data: &[u8]) -> Result<()> {
        let size = data.len() as u64;
        if size > self.remaining() {
            warn!(
                "⚠️ {} ({} bytes) would exceed the archive limit of {} bytes, skipped",
                entry, size, self.max_total_bytes
            );
            self.skip();
            return Ok(());
        }

        let options = self.options.large_file(size >= u32::MAX as u64);
        self.writer
            .start_file(entry.to_string(), options)
            .with_context(|| format!("failed to add {} to archive", entry))?;
        self.writer
            .write_all(data)
            .with_context(|| format!("failed to write {} to archive", entry))?;

        self.entries.insert(entry.to_string());
        self.total_bytes += size;
        self.written += 1;
        debug!("🗜️ {} ({} bytes)", entry, size);
        Ok(())
    }

    fn finish(self) -> Result<Assembled> {
        let cursor = self.writer.finish().context("failed to finalize archive")?;
        Ok(Assembled {
            bytes: cursor.into_inner(),
            written: self.written,
            skipped: self.skipped,
        })
    }
}

pub struct ArchiveAssembler<'a, S: ?Sized> {
    source: &'a S,
    walker: DirectoryWalker<'a, S>,
    options: ArchiveOptions,
}

impl<'a, S: ResourceSource + ?Sized> ArchiveAssembler<'a, S> {
    pub fn new(source: &'a S, options: ArchiveOptions) -> Self {
        Self {
            source,
            walker: DirectoryWalker::new(source),
            options,
        }
    }

    /// Builds one archive from `selection`, in selection order.
    ///
    /// Folder selections (trailing `/`) land under their own name with the
    /// nested structure kept; file selections land at the archive root under
    /// their base name. The first entry written at an archive path wins.
    /// Only a failure of the ZIP writer itself is returned as an error.
    pub async fn assemble(&self, key: &PublicKey, selection: &[String]) -> Result<Assembled> {
        info!("📦 assembling archive from {} selected entries", selection.len());

        let mut sink = ArchiveSink::new(self.options.max_total_bytes);
        let mut seen = HashSet::new();

        for entry in selection {
            if !seen.insert(entry.as_str()) {
                debug!("duplicate selection ignored: {}", entry);
                continue;
            }

            if paths::is_directory_selection(entry) {
                self.expand_directory(key, entry, &mut sink).await?;
                continue;
            }

            match paths::sanitize_component(paths::base_name(entry)) {
                Some(name) => self.add_file(key, entry, &name, None, &mut sink).await?,
                None => {
                    warn!("⚠️ selection {:?} has no file name, skipped", entry);
                    sink.skip();
                }
            }
        }

        let assembled = sink.finish()?;
        info!(
            "✅ archive ready: {} files, {} skipped, {} bytes",
            assembled.written,
            assembled.skipped,
            assembled.bytes.len()
        );
        Ok(assembled)
    }

    /// Depth-first pre-order over the folder, siblings in listing order.
    async fn expand_directory(
        &self,
        key: &PublicKey,
        selection: &str,
        sink: &mut ArchiveSink,
    ) -> Result<()> {
        let root_prefix = paths::sanitize_component(paths::base_name(selection)).unwrap_or_default();
        let mut stack = Vec::new();

        if let Some(root) = self
            .open_frame(key, paths::directory_path(selection), root_prefix, 0, sink)
            .await
        {
            stack.push(root);
        }

        while let Some(frame) = stack.last_mut() {
            let Some(child) = frame.remaining.next() else {
                stack.pop();
                continue;
            };
            let depth = frame.depth + 1;

            let Some(name) = paths::sanitize_component(&child.name) else {
                warn!("⚠️ {:?} has an unusable name, skipped", child.path);
                sink.skip();
                continue;
            };
            let entry = paths::join_archive_path(&frame.prefix, &name);

            match child.kind {
                ResourceKind::File => {
                    self.add_file(key, &child.path, &entry, child.size, sink)
                        .await?
                }
                ResourceKind::Directory => {
                    if depth > self.options.max_depth {
                        warn!(
                            "⚠️ {:?} is nested deeper than {} levels, skipped",
                            child.path, self.options.max_depth
                        );
                        sink.skip();
                        continue;
                    }
                    if let Some(next) = self.open_frame(key, &child.path, entry, depth, sink).await {
                        stack.push(next);
                    }
                }
            }
        }

        Ok(())
    }

    async fn open_frame(
        &self,
        key: &PublicKey,
        path: &str,
        prefix: String,
        depth: usize,
        sink: &mut ArchiveSink,
    ) -> Option<Frame> {
        match self.walker.children(key, path).await {
            Listing::Items(items) => Some(Frame {
                prefix,
                depth,
                remaining: items.into_iter(),
            }),
            Listing::Empty => {
                debug!("📁 {:?} is empty", path);
                None
            }
            Listing::Failed(reason) => {
                warn!("⚠️ could not list {:?}, skipped: {}", path, reason);
                sink.skip();
                None
            }
        }
    }

    async fn add_file(
        &self,
        key: &PublicKey,
        path: &str,
        entry: &str,
        size: Option<u64>,
        sink: &mut ArchiveSink,
    ) -> Result<()> {
        if sink.contains(entry) {
            debug!("{} already in archive, {:?} skipped", entry, path);
            sink.skip();
            return Ok(());
        }

        // listed size known: skip before anything is downloaded
        if let Some(size) = size.filter(|&size| size > sink.remaining()) {
            warn!(
                "⚠️ {:?} ({} bytes) would exceed the archive limit of {} bytes, skipped",
                path, size, sink.max_total_bytes
            );
            sink.skip();
            return Ok(());
        }

        let link = match self.source.resolve_download_link(key, path).await {
            Ok(link) => link,
            Err(e) => {
                warn!("⚠️ no download link for {:?}, skipped: {}", path, e);
                sink.skip();
                return Ok(());
            }
        };

        let data = match self.source.fetch_bytes(&link, sink.remaining()).await {
            Ok(data) => data,
            Err(e) => {
                warn!("⚠️ failed to fetch {:?}, skipped: {}", path, e);
                sink.skip();
                return Ok(());
            }
        };

        sink.write_entry(entry, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yadisk::types::DownloadLink;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::io::Read;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySource {
        dirs: HashMap<String, Vec<ResourceItem>>,
        files: HashMap<String, Vec<u8>>,
        unresolvable: HashSet<String>,
        broken: HashSet<String>,
        failing_dirs: HashSet<String>,
        fetched: Mutex<Vec<String>>,
    }

    impl MemorySource {
        fn dir(mut self, path: &str, items: Vec<ResourceItem>) -> Self {
            self.dirs.insert(path.to_string(), items);
            self
        }

        fn file(mut self, path: &str, data: &[u8]) -> Self {
            self.files.insert(path.to_string(), data.to_vec());
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResourceSource for MemorySource {
        async fn list_children(&self, _key: &PublicKey, path: &str) -> Listing {
            if self.failing_dirs.contains(path) {
                return Listing::Failed("HTTP 500".to_string());
            }
            match self.dirs.get(path) {
                Some(items) => Listing::from_items(items.clone()),
                None => Listing::Failed(format!("HTTP 404 for {}", path)),
            }
        }

        async fn resolve_download_link(&self, _key: &PublicKey, path: &str) -> Result<DownloadLink> {
            if self.unresolvable.contains(path) || !self.files.contains_key(path) {
                return Err(anyhow!("no href"));
            }
            Ok(DownloadLink::new(format!("mem://{}", path)))
        }

        async fn fetch_bytes(&self, link: &DownloadLink, max_len: u64) -> Result<Bytes> {
            let path = link.as_str().trim_start_matches("mem://");
            self.fetched.lock().unwrap().push(path.to_string());
            if self.broken.contains(path) {
                return Err(anyhow!("HTTP 503"));
            }
            let data = self.files.get(path).ok_or_else(|| anyhow!("HTTP 404"))?;
            if data.len() as u64 > max_len {
                return Err(anyhow!("{} bytes exceeds the {} byte limit", data.len(), max_len));
            }
            Ok(Bytes::from(data.clone()))
        }
    }

    fn key() -> PublicKey {
        PublicKey::new("public-key").unwrap()
    }

    fn selection(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    /// Entry names in archive order.
    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn read_entry(bytes: &[u8], name: &str) -> Vec<u8> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        data
    }

    fn docs_source() -> MemorySource {
        MemorySource::default()
            .dir(
                "docs",
                vec![
                    ResourceItem::file("a.txt", "docs/a.txt"),
                    ResourceItem::directory("sub", "docs/sub"),
                ],
            )
            .dir("docs/sub", vec![ResourceItem::file("b.txt", "docs/sub/b.txt")])
            .file("docs/a.txt", b"alpha")
            .file("docs/sub/b.txt", b"beta")
            .file("readme.txt", b"read me")
    }

    #[tokio::test]
    async fn test_folder_and_file_selection() {
        let source = docs_source();
        let assembler = ArchiveAssembler::new(&source, ArchiveOptions::default());

        let out = assembler
            .assemble(&key(), &selection(&["docs/", "readme.txt"]))
            .await
            .unwrap();

        assert_eq!(entry_names(&out.bytes), vec!["docs/a.txt", "docs/sub/b.txt", "readme.txt"]);
        assert_eq!(read_entry(&out.bytes, "docs/sub/b.txt"), b"beta");
        assert_eq!(read_entry(&out.bytes, "readme.txt"), b"read me");
        assert_eq!((out.written, out.skipped), (3, 0));
    }

    #[tokio::test]
    async fn test_subfolder_contents_precede_later_siblings() {
        let source = MemorySource::default()
            .dir(
                "docs",
                vec![
                    ResourceItem::directory("sub", "docs/sub"),
                    ResourceItem::file("z.txt", "docs/z.txt"),
                ],
            )
            .dir("docs/sub", vec![ResourceItem::file("b.txt", "docs/sub/b.txt")])
            .file("docs/sub/b.txt", b"b")
            .file("docs/z.txt", b"z");
        let assembler = ArchiveAssembler::new(&source, ArchiveOptions::default());

        let out = assembler.assemble(&key(), &selection(&["docs/"])).await.unwrap();
        assert_eq!(entry_names(&out.bytes), vec!["docs/sub/b.txt", "docs/z.txt"]);
    }

    #[tokio::test]
    async fn test_nested_file_selection_is_flattened() {
        let source = MemorySource::default()
            .file("deep/nested/c.txt", b"c")
            .file("top.bin", &[0u8, 159, 146, 150, 255]);
        let assembler = ArchiveAssembler::new(&source, ArchiveOptions::default());

        let out = assembler
            .assemble(&key(), &selection(&["deep/nested/c.txt", "top.bin"]))
            .await
            .unwrap();

        assert_eq!(entry_names(&out.bytes), vec!["c.txt", "top.bin"]);
        assert_eq!(read_entry(&out.bytes, "top.bin"), vec![0u8, 159, 146, 150, 255]);
    }

    #[tokio::test]
    async fn test_unresolvable_file_yields_valid_empty_archive() {
        let mut source = MemorySource::default().file("gone.txt", b"x");
        source.unresolvable.insert("gone.txt".to_string());
        let assembler = ArchiveAssembler::new(&source, ArchiveOptions::default());

        let out = assembler.assemble(&key(), &selection(&["gone.txt"])).await.unwrap();

        assert!(entry_names(&out.bytes).is_empty());
        assert_eq!((out.written, out.skipped), (0, 1));
        assert!(source.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_empty_selection_yields_valid_empty_archive() {
        let source = MemorySource::default();
        let assembler = ArchiveAssembler::new(&source, ArchiveOptions::default());

        let out = assembler.assemble(&key(), &[]).await.unwrap();
        assert!(entry_names(&out.bytes).is_empty());
    }

    #[tokio::test]
    async fn test_partial_failures_are_skipped() {
        let mut source = docs_source();
        source.broken.insert("docs/a.txt".to_string());
        source.failing_dirs.insert("docs/sub".to_string());
        let assembler = ArchiveAssembler::new(&source, ArchiveOptions::default());

        let out = assembler
            .assemble(&key(), &selection(&["docs/", "missing.txt", "readme.txt"]))
            .await
            .unwrap();

        // broken a.txt, unlistable sub/, missing.txt
        assert_eq!(entry_names(&out.bytes), vec!["readme.txt"]);
        assert_eq!(out.skipped, 3);
    }

    #[tokio::test]
    async fn test_failed_folder_listing_yields_empty_archive() {
        let source = MemorySource::default();
        let assembler = ArchiveAssembler::new(&source, ArchiveOptions::default());

        let out = assembler.assemble(&key(), &selection(&["nowhere/"])).await.unwrap();
        assert!(entry_names(&out.bytes).is_empty());
        assert_eq!(out.skipped, 1);
    }

    #[tokio::test]
    async fn test_duplicates_written_once() {
        let source = docs_source().file("other/a.txt", b"second a");
        let assembler = ArchiveAssembler::new(&source, ArchiveOptions::default());

        let out = assembler
            .assemble(
                &key(),
                &selection(&["readme.txt", "readme.txt", "docs/", "docs/", "docs/a.txt", "other/a.txt"]),
            )
            .await
            .unwrap();

        assert_eq!(
            entry_names(&out.bytes),
            vec!["readme.txt", "docs/a.txt", "docs/sub/b.txt", "a.txt"]
        );
        // first writer of `a.txt` wins
        assert_eq!(read_entry(&out.bytes, "a.txt"), b"alpha");
        assert_eq!(
            source.fetched(),
            vec!["readme.txt", "docs/a.txt", "docs/sub/b.txt", "docs/a.txt"]
        );
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let source = docs_source()
            .dir(
                "docs/sub",
                vec![
                    ResourceItem::file("b.txt", "docs/sub/b.txt"),
                    ResourceItem::directory("deeper", "docs/sub/deeper"),
                ],
            )
            .dir("docs/sub/deeper", vec![ResourceItem::file("c.txt", "docs/sub/deeper/c.txt")])
            .file("docs/sub/deeper/c.txt", b"c");
        let options = ArchiveOptions {
            max_depth: 1,
            ..ArchiveOptions::default()
        };
        let assembler = ArchiveAssembler::new(&source, options);

        let out = assembler.assemble(&key(), &selection(&["docs/"])).await.unwrap();
        assert_eq!(entry_names(&out.bytes), vec!["docs/a.txt", "docs/sub/b.txt"]);
        assert_eq!(out.skipped, 1);
    }

    #[tokio::test]
    async fn test_size_limit_skips_oversized_files() {
        let source = MemorySource::default()
            .file("small.txt", b"1234")
            .file("big.txt", b"123456789");
        let options = ArchiveOptions {
            max_total_bytes: 8,
            ..ArchiveOptions::default()
        };
        let assembler = ArchiveAssembler::new(&source, options);

        let out = assembler
            .assemble(&key(), &selection(&["small.txt", "big.txt"]))
            .await
            .unwrap();
        assert_eq!(entry_names(&out.bytes), vec!["small.txt"]);
        assert_eq!(out.skipped, 1);
    }

    #[tokio::test]
    async fn test_listed_size_over_limit_is_never_fetched() {
        let mut big = ResourceItem::file("big.bin", "d/big.bin");
        big.size = Some(1000);
        let mut small = ResourceItem::file("small.bin", "d/small.bin");
        small.size = Some(4);
        let source = MemorySource::default()
            .dir("d", vec![big, small])
            .file("d/big.bin", &[7u8; 1000])
            .file("d/small.bin", b"tiny");
        let options = ArchiveOptions {
            max_total_bytes: 10,
            ..ArchiveOptions::default()
        };
        let assembler = ArchiveAssembler::new(&source, options);

        let out = assembler.assemble(&key(), &selection(&["d/"])).await.unwrap();

        assert_eq!(entry_names(&out.bytes), vec!["d/small.bin"]);
        assert_eq!((out.written, out.skipped), (1, 1));
        assert_eq!(source.fetched(), vec!["d/small.bin"]);
    }

    #[tokio::test]
    async fn test_unlisted_size_is_bounded_by_remaining_budget() {
        let source = MemorySource::default()
            .file("first.txt", b"123456")
            .file("second.txt", b"12345");
        let options = ArchiveOptions {
            max_total_bytes: 10,
            ..ArchiveOptions::default()
        };
        let assembler = ArchiveAssembler::new(&source, options);

        let out = assembler
            .assemble(&key(), &selection(&["first.txt", "second.txt"]))
            .await
            .unwrap();

        // second.txt is refused by the fetch itself: only 4 bytes were left
        assert_eq!(entry_names(&out.bytes), vec!["first.txt"]);
        assert_eq!(out.skipped, 1);
    }

    #[tokio::test]
    async fn test_root_folder_selection_has_no_prefix() {
        let source = MemorySource::default()
            .dir("/", vec![ResourceItem::file("a.txt", "/a.txt")])
            .file("/a.txt", b"a");
        let assembler = ArchiveAssembler::new(&source, ArchiveOptions::default());

        let out = assembler.assemble(&key(), &selection(&["/"])).await.unwrap();
        assert_eq!(entry_names(&out.bytes), vec!["a.txt"]);
    }
}
