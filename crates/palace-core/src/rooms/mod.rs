//! Room manifest loading and caching (component J).

mod manifest;

pub use manifest::{parse_manifest, Artifact, Room, Step};

use std::path::Path;
use std::sync::{Arc, RwLock};

/// An atomically-swappable snapshot of every loaded room plus its derived
/// entry-point index (longest path prefix -> room name).
#[derive(Debug, Clone, Default)]
struct RoomSnapshot {
    rooms: Vec<Room>,
}

/// In-memory room cache. Loaded once at startup; `reload` re-reads the
/// manifest directory and swaps the snapshot atomically so concurrent
/// readers never observe a torn state.
pub struct RoomCache {
    snapshot: RwLock<Arc<RoomSnapshot>>,
}

impl RoomCache {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(RoomSnapshot::default())),
        }
    }

    /// Load from `<root>/.palace/rooms/*.jsonc`. A missing directory is
    /// not an error (empty room set); per-file parse errors are logged
    /// and the file skipped.
    pub fn load(rooms_dir: &Path) -> Self {
        let cache = Self::new();
        cache.reload(rooms_dir);
        cache
    }

    pub fn reload(&self, rooms_dir: &Path) {
        let mut rooms = Vec::new();

        let entries = match std::fs::read_dir(rooms_dir) {
            Ok(entries) => entries,
            Err(_) => {
                *self.snapshot.write().expect("room cache poisoned") =
                    Arc::new(RoomSnapshot { rooms });
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonc") {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(text) => match parse_manifest(&text) {
                    Some(room) => rooms.push(room),
                    None => tracing::warn!(path = %path.display(), "skipping unparseable room manifest"),
                },
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to read room manifest"),
            }
        }

        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        *self.snapshot.write().expect("room cache poisoned") = Arc::new(RoomSnapshot { rooms });
    }

    pub fn all(&self) -> Vec<Room> {
        self.snapshot.read().expect("room cache poisoned").rooms.clone()
    }

    pub fn get(&self, name: &str) -> Option<Room> {
        self.all().into_iter().find(|r| r.name == name)
    }

    /// Resolve the room owning `path` by longest entry-point prefix
    /// match; ties broken by room name ascending.
    pub fn room_for_path(&self, path: &str) -> Option<Room> {
        let rooms = self.all();
        let mut best: Option<(usize, &Room)> = None;

        for room in &rooms {
            for entry in &room.entry_points {
                if path.starts_with(entry.as_str()) {
                    let len = entry.len();
                    best = match best {
                        Some((best_len, best_room)) if best_len > len => Some((best_len, best_room)),
                        Some((best_len, best_room)) if best_len == len && best_room.name < room.name => {
                            Some((best_len, best_room))
                        }
                        _ => Some((len, room)),
                    };
                }
            }
        }

        best.map(|(_, room)| room.clone())
    }

    /// Whether `path` is a literal entry point of some room.
    pub fn is_entry_point(&self, path: &str) -> Option<Room> {
        self.all()
            .into_iter()
            .find(|room| room.entry_points.iter().any(|e| e == path))
    }
}

impl Default for RoomCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_manifest(dir: &Path, filename: &str, name: &str, entry_points: &[&str]) {
        let path = dir.join(filename);
        let entries_json = entry_points
            .iter()
            .map(|e| format!("\"{e}\""))
            .collect::<Vec<_>>()
            .join(",");
        let text = format!(
            r#"{{"schemaVersion":"1.0.0","kind":"palace/room","name":"{name}","summary":"s","entryPoints":[{entries_json}],"capabilities":[],"artifacts":[],"steps":[]}}"#
        );
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn longest_prefix_wins_over_shorter_match() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "a.jsonc", "top", &["src/"]);
        write_manifest(dir.path(), "b.jsonc", "auth", &["src/auth/"]);
        let cache = RoomCache::load(dir.path());

        let room = cache.room_for_path("src/auth/jwt.go").unwrap();
        assert_eq!(room.name, "auth");
    }

    #[test]
    fn tie_breaks_by_room_name_ascending() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "a.jsonc", "zebra", &["src/shared/"]);
        write_manifest(dir.path(), "b.jsonc", "alpha", &["src/shared/"]);
        let cache = RoomCache::load(dir.path());

        let room = cache.room_for_path("src/shared/util.go").unwrap();
        assert_eq!(room.name, "alpha");
    }

    #[test]
    fn missing_directory_yields_empty_cache() {
        let cache = RoomCache::load(Path::new("/nonexistent/.palace/rooms"));
        assert!(cache.all().is_empty());
    }

    #[test]
    fn unparseable_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "good.jsonc", "good", &["src/"]);
        std::fs::write(dir.path().join("bad.jsonc"), "{ not json").unwrap();
        let cache = RoomCache::load(dir.path());
        assert_eq!(cache.all().len(), 1);
        assert_eq!(cache.all()[0].name, "good");
    }
}
