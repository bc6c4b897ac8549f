//! Isolated on-disk workspace for end-to-end tests: a `Storage` plus a
//! `RoomCache` rooted in the same temporary directory, with seeding
//! helpers for the fixtures scenarios need.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use palace_core::rooms::RoomCache;
use palace_core::storage::Chunk;
use palace_core::{RecordInput, Storage};
use tempfile::TempDir;

/// A disposable workspace: deleted on drop along with its sqlite file
/// and room manifests. `storage` is `Arc`-wrapped so tests can hand it
/// to an embedding `Pipeline`, which needs shared ownership across its
/// worker tasks.
pub struct TestWorkspace {
    pub storage: Arc<Storage>,
    pub rooms: RoomCache,
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp workspace");
        let storage = Arc::new(Storage::open_temp(dir.path()).expect("failed to open test storage"));
        let rooms = RoomCache::load(&dir.path().join("rooms"));
        Self { storage, rooms, dir }
    }

    pub fn root(&self) -> &std::path::Path {
        self.dir.path()
    }

    fn rooms_dir(&self) -> PathBuf {
        self.dir.path().join("rooms")
    }

    /// Write a room manifest to disk and reload the cache so it's
    /// immediately visible, mirroring what the `room` tool does on
    /// `create`.
    pub fn seed_room(&mut self, name: &str, summary: &str, entry_points: &[&str]) {
        let rooms_dir = self.rooms_dir();
        std::fs::create_dir_all(&rooms_dir).expect("failed to create rooms dir");
        let entries: Vec<String> = entry_points.iter().map(|e| format!("\"{e}\"")).collect();
        let manifest = format!(
            r#"{{"schemaVersion":"1.0.0","kind":"palace/room","name":"{name}","summary":"{summary}","entryPoints":[{}],"capabilities":[],"artifacts":[],"steps":[]}}"#,
            entries.join(",")
        );
        let mut file = std::fs::File::create(rooms_dir.join(format!("{name}.jsonc"))).expect("failed to write manifest");
        file.write_all(manifest.as_bytes()).expect("failed to write manifest");
        self.rooms.reload(&rooms_dir);
    }

    /// Index a single-chunk file at `path` with `content`, as if a
    /// full-file reindex had just run.
    pub fn index_file(&self, path: &str, content: &str) {
        self.storage
            .reindex_file(
                path,
                &[Chunk {
                    path: path.to_string(),
                    chunk_index: 0,
                    start_line: 1,
                    end_line: content.lines().count().max(1) as i64,
                    content: content.to_string(),
                    language: None,
                }],
                &[],
                &[],
                &[],
            )
            .expect("failed to index file");
    }

    /// Add a record straight to `approved` authority, bypassing the
    /// proposal queue, the way admin-mode callers do.
    pub fn seed_record(&self, input: RecordInput) -> palace_core::Record {
        self.storage.add_record(RecordInput { direct: Some(true), ..input }, true).expect("failed to seed record")
    }

    pub fn record_count(&self) -> i64 {
        self.storage.index_summary().map(|s| s.records).unwrap_or(0)
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_a_room_makes_it_visible_in_the_cache() {
        let mut ws = TestWorkspace::new();
        ws.seed_room("auth", "authentication flows", &["src/auth/"]);
        assert!(ws.rooms.get("auth").is_some());
    }

    #[test]
    fn indexed_files_are_readable_back() {
        let ws = TestWorkspace::new();
        ws.index_file("src/main.rs", "fn main() {}");
        assert_eq!(ws.storage.read_file("src/main.rs").unwrap(), "fn main() {}");
    }

    #[test]
    fn seeded_records_land_approved() {
        let ws = TestWorkspace::new();
        let record = ws.seed_record(RecordInput { content: "use exponential backoff".into(), kind: Some("learning".into()), ..Default::default() });
        assert_eq!(record.authority, palace_core::Authority::Approved);
        assert_eq!(ws.record_count(), 1);
    }
}
