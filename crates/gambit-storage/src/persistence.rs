//! Atomic, garbage-collected on-disk persistence for saved games.

use crate::error::{Result, StorageError};
use gambit_types::{ConnectionInfo, GameId, GameSnapshot};
use std::path::{Path, PathBuf};

/// Default number of saved-game snapshots retained per storage directory.
pub const DEFAULT_MAX_SNAPSHOTS: usize = 10;

const GAME_SUFFIX: &str = ".chess.json";
const CONNECTION_SUFFIX: &str = ".connection.json";

/// Saves and loads game snapshots and connection info under one directory,
/// one JSON file per game per kind. Writes are atomic (write to a sibling
/// temp file, then rename); `save_game` also garbage-collects old
/// snapshots, keeping the `max_snapshots` most recently modified.
pub struct Persistence {
    dir: PathBuf,
    max_snapshots: usize,
}

impl Persistence {
    /// Opens persistence rooted at `dir`, creating it if absent.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_limit(dir, DEFAULT_MAX_SNAPSHOTS).await
    }

    /// Like [`Persistence::open`], with an explicit snapshot-retention limit.
    pub async fn open_with_limit(dir: impl Into<PathBuf>, max_snapshots: usize) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir, max_snapshots })
    }

    fn game_path(&self, game_id: &GameId) -> PathBuf {
        self.dir.join(format!("{}{GAME_SUFFIX}", game_id.sanitized()))
    }

    fn connection_path(&self, game_id: &GameId) -> PathBuf {
        self.dir
            .join(format!("{}{CONNECTION_SUFFIX}", game_id.sanitized()))
    }

    /// Writes `snapshot` for `game_id`, then GCs down to `max_snapshots`.
    pub async fn save_game(&self, game_id: &GameId, snapshot: &GameSnapshot) -> Result<()> {
        let body = serde_json::to_vec_pretty(snapshot)?;
        atomic_write(&self.game_path(game_id), &body).await?;
        self.gc_snapshots().await
    }

    /// Loads the snapshot for `game_id`, or [`StorageError::NotFound`].
    pub async fn load_game(&self, game_id: &GameId) -> Result<GameSnapshot> {
        read_json(&self.game_path(game_id), game_id).await
    }

    /// Writes connection info for `game_id`.
    pub async fn save_connection_info(
        &self,
        game_id: &GameId,
        info: &ConnectionInfo,
    ) -> Result<()> {
        let body = serde_json::to_vec_pretty(info)?;
        atomic_write(&self.connection_path(game_id), &body).await
    }

    /// Loads connection info for `game_id`, or [`StorageError::NotFound`].
    pub async fn load_connection_info(&self, game_id: &GameId) -> Result<ConnectionInfo> {
        read_json(&self.connection_path(game_id), game_id).await
    }

    /// Lists every game with a saved snapshot, most recently modified first.
    pub async fn list_games(&self) -> Result<Vec<GameId>> {
        let mut dated = dated_entries(&self.dir, GAME_SUFFIX).await?;
        dated.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(dated.into_iter().filter_map(|(id, _)| id).collect())
    }

    async fn gc_snapshots(&self) -> Result<()> {
        let mut dated = dated_entries(&self.dir, GAME_SUFFIX).await?;
        if dated.len() <= self.max_snapshots {
            return Ok(());
        }
        dated.sort_by(|a, b| b.1.cmp(&a.1));
        for (id, _) in dated.into_iter().skip(self.max_snapshots) {
            if let Some(id) = id {
                let path = self.game_path(&id);
                tracing::debug!(path = %path.display(), "evicting old snapshot");
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }
}

/// Reads every `*{suffix}` entry in `dir`, pairing its parsed [`GameId`]
/// (`None` if the stem isn't valid hex) with its modified time.
async fn dated_entries(
    dir: &Path,
    suffix: &str,
) -> Result<Vec<(Option<GameId>, std::time::SystemTime)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut dated = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(stem) = name.strip_suffix(suffix) else {
            continue;
        };
        let metadata = entry.metadata().await?;
        let modified = metadata.modified()?;
        dated.push((GameId::from_hex(stem).ok(), modified));
    }
    Ok(dated)
}

async fn read_json<T: for<'de> serde::Deserialize<'de>>(
    path: &Path,
    game_id: &GameId,
) -> Result<T> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StorageError::NotFound(game_id.to_hex()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn atomic_write(path: &Path, body: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("json")
    ));
    tokio::fs::write(&tmp_path, body).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_types::PlayerColor;

    fn sample_snapshot(game_id: GameId) -> GameSnapshot {
        GameSnapshot::new(
            game_id,
            gambit_types::Players {
                white: Some("host".into()),
                black: Some("guest".into()),
            },
            Vec::new(),
            PlayerColor::White,
            0,
            PlayerColor::White,
            true,
            "startpos".into(),
            1_000,
        )
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::open(dir.path()).await.unwrap();
        let game_id = GameId::from_bytes(&[1u8; 32]).unwrap();
        let snapshot = sample_snapshot(game_id);

        persistence.save_game(&game_id, &snapshot).await.unwrap();
        let loaded = persistence.load_game(&game_id).await.unwrap();
        assert_eq!(loaded.game_id, snapshot.game_id);
        assert_eq!(loaded.players.white, snapshot.players.white);
    }

    #[tokio::test]
    async fn load_missing_game_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::open(dir.path()).await.unwrap();
        let game_id = GameId::from_bytes(&[2u8; 32]).unwrap();
        assert!(matches!(
            persistence.load_game(&game_id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn gc_keeps_only_the_most_recent_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::open_with_limit(dir.path(), 2).await.unwrap();

        for i in 0..4u8 {
            let game_id = GameId::from_bytes(&[i; 32]).unwrap();
            let snapshot = sample_snapshot(game_id);
            persistence.save_game(&game_id, &snapshot).await.unwrap();
            // Ensure distinct mtimes across iterations on coarse filesystems.
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let remaining = persistence.list_games().await.unwrap();
        assert_eq!(remaining.len(), 2);
        let last = GameId::from_bytes(&[3u8; 32]).unwrap();
        assert_eq!(remaining[0], last);
    }

    #[tokio::test]
    async fn connection_info_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::open(dir.path()).await.unwrap();
        let game_id = GameId::from_bytes(&[9u8; 32]).unwrap();
        let info = ConnectionInfo::new(
            game_id,
            game_id.to_invite_code(),
            PlayerColor::Black,
            false,
            1_000,
        );

        persistence.save_connection_info(&game_id, &info).await.unwrap();
        let loaded = persistence.load_connection_info(&game_id).await.unwrap();
        assert_eq!(loaded.game_key, info.game_key);
    }
}
