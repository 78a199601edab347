//! The replicated move log: per-writer storage, linearization, and sync.

use crate::codec::{decode_move, encode_move};
use crate::entry::LinearizedEntry;
use crate::error::{LogError, Result};
use crate::view::View;
use crate::writer_store::WriterStore;
use crate::writers_index::WritersIndex;
use async_trait::async_trait;
use gambit_identity::PublicKey;
use gambit_types::{GameId, Move};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;

/// The callback hooks a log owner supplies at `open` time.
///
/// `on_open` runs once, after every writer file has been replayed into the
/// initial [`View`]. `apply` runs once per batch of newly-linearized
/// entries — a single local [`Log::append`] produces a batch of one; a
/// [`Log::replicate`] call can produce a larger batch in one shot.
#[async_trait]
pub trait LogApplication: Send + Sync {
    /// Called once, right after the log finishes replaying its on-disk state.
    async fn on_open(&self, _view: &View) {}

    /// Called after `batch` has been merged into `view`.
    async fn apply(&self, batch: &[LinearizedEntry], view: &View);
}

struct WriterSlot {
    store: WriterStore,
    len: u64,
}

/// A multi-writer, append-only, crash-safe log of moves for one game.
pub struct Log {
    dir: PathBuf,
    game_id: GameId,
    local_writer: PublicKey,
    writers_index: AsyncMutex<WritersIndex>,
    slots: AsyncMutex<HashMap<PublicKey, WriterSlot>>,
    view: View,
    application: Arc<dyn LogApplication>,
}

fn writer_file_name(writer: &PublicKey) -> String {
    format!("writer_{}.log", hex::encode(writer.as_bytes()))
}

impl Log {
    /// Opens (creating if absent) the log for `game_id` under `dir`,
    /// authorizing `local_writer` if it is not already, replaying every
    /// known writer's entries into the linearized view, and invoking
    /// `application.on_open`.
    pub async fn open(
        dir: impl Into<PathBuf>,
        game_id: GameId,
        local_writer: PublicKey,
        application: Arc<dyn LogApplication>,
    ) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut writers_index = WritersIndex::open(&dir).await?;
        if !writers_index.contains(&local_writer) {
            writers_index.add(local_writer).await?;
        }

        let view = View::new();
        let mut slots = HashMap::new();
        for writer in writers_index.writers() {
            let path = dir.join(writer_file_name(&writer));
            let (store, records) = WriterStore::open(&path).await?;
            for (index, bytes) in records.iter().enumerate() {
                let Ok(mv) = decode_move(bytes, game_id) else {
                    tracing::warn!(
                        writer = %writer,
                        index,
                        "open: corrupt entry, dropping"
                    );
                    continue;
                };
                view.insert(LinearizedEntry {
                    writer_id: writer,
                    writer_index: index as u64,
                    timestamp: mv.timestamp,
                    value: mv,
                });
            }
            if records.len() as u64 != writers_index.committed_length(&writer) {
                writers_index
                    .set_committed_length(&writer, records.len() as u64)
                    .await?;
            }
            slots.insert(
                writer,
                WriterSlot {
                    store,
                    len: records.len() as u64,
                },
            );
        }

        application.on_open(&view).await;

        Ok(Self {
            dir,
            game_id,
            local_writer,
            writers_index: AsyncMutex::new(writers_index),
            slots: AsyncMutex::new(slots),
            view,
            application,
        })
    }

    /// The linearized view over every entry currently known.
    #[must_use]
    pub fn view(&self) -> &View {
        &self.view
    }

    /// This log's game id.
    #[must_use]
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// The directory this log is stored under.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stages `value` on the local writer: encodes it, appends and fsyncs
    /// the record, merges it into the view, and invokes `apply` with the
    /// single-entry batch.
    pub async fn append(&self, value: Move) -> Result<LinearizedEntry> {
        let mut slots = self.slots.lock().await;
        let slot = slots
            .get_mut(&self.local_writer)
            .ok_or_else(|| LogError::UnknownWriter(self.local_writer.to_string()))?;

        let bytes = encode_move(&value);
        slot.store.append(&bytes).await?;
        let writer_index = slot.len;
        slot.len += 1;
        let new_len = slot.len;
        drop(slots);

        self.writers_index
            .lock()
            .await
            .set_committed_length(&self.local_writer, new_len)
            .await?;

        let entry = LinearizedEntry {
            writer_id: self.local_writer,
            writer_index,
            timestamp: value.timestamp,
            value,
        };
        self.view.insert(entry.clone());
        self.application.apply(std::slice::from_ref(&entry), &self.view).await;
        Ok(entry)
    }

    /// Authorizes `writer` to append to this log, creating its (initially
    /// empty) on-disk file. Entries from `writer` arrive later via
    /// [`Log::replicate`].
    pub async fn add_writer(&self, writer: PublicKey) -> Result<()> {
        self.writers_index.lock().await.add(writer).await?;
        let path = self.dir.join(writer_file_name(&writer));
        let (store, records) = WriterStore::open(&path).await?;
        debug_assert!(records.is_empty());
        self.slots
            .lock()
            .await
            .insert(writer, WriterSlot { store, len: 0 });
        Ok(())
    }

    /// The currently authorized writers.
    pub async fn writers(&self) -> Vec<PublicKey> {
        self.writers_index.lock().await.writers()
    }

    /// Appends `value` to an already-authorized remote `writer`'s file.
    ///
    /// The single-entry counterpart to what [`Log::replicate`]'s receive
    /// loop does per incoming entry, usable when a session already has a
    /// decoded [`Move`] in hand (e.g. from a `game_state_response`) rather
    /// than a raw stream to sync against.
    pub async fn apply_remote(&self, writer: PublicKey, value: Move) -> Result<LinearizedEntry> {
        let mut slots = self.slots.lock().await;
        let slot = slots
            .get_mut(&writer)
            .ok_or_else(|| LogError::UnknownWriter(writer.to_string()))?;

        let bytes = encode_move(&value);
        slot.store.append(&bytes).await?;
        let writer_index = slot.len;
        slot.len += 1;
        let new_len = slot.len;
        drop(slots);

        self.writers_index
            .lock()
            .await
            .set_committed_length(&writer, new_len)
            .await?;

        let entry = LinearizedEntry {
            writer_id: writer,
            writer_index,
            timestamp: value.timestamp,
            value,
        };
        self.view.insert(entry.clone());
        self.application.apply(std::slice::from_ref(&entry), &self.view).await;
        Ok(entry)
    }

    /// Runs a one-shot bidirectional sync over `stream`: both sides
    /// exchange per-writer entry counts, then each sends whatever entries
    /// the other is missing. Entries from writers not yet authorized
    /// locally are logged and dropped rather than rejected outright,
    /// since authorization can arrive in a later `add_writer` call.
    pub async fn replicate<S>(&self, stream: S) -> Result<usize>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        let local_lengths: HashMap<String, u64> = {
            let slots = self.slots.lock().await;
            slots
                .iter()
                .map(|(writer, slot)| (hex::encode(writer.as_bytes()), slot.len))
                .collect()
        };
        send_line(&mut write_half, &SyncMessage::Lengths(local_lengths.clone())).await?;

        let mut remote_lengths = HashMap::new();
        loop {
            let Some(msg) = read_line::<SyncMessage>(&mut reader).await? else {
                return Ok(0);
            };
            if let SyncMessage::Lengths(lengths) = msg {
                remote_lengths = lengths;
                break;
            }
        }

        {
            let slots = self.slots.lock().await;
            for (writer, slot) in slots.iter() {
                let hex_id = hex::encode(writer.as_bytes());
                let remote_len = remote_lengths.get(&hex_id).copied().unwrap_or(0);
                if remote_len >= slot.len {
                    continue;
                }
                for index in remote_len..slot.len {
                    let entry = self
                        .view
                        .to_vec()
                        .into_iter()
                        .find(|e| e.writer_id == *writer && e.writer_index == index)
                        .expect("every stored record has a linearized entry");
                    let payload = hex::encode(encode_move(&entry.value));
                    send_line(
                        &mut write_half,
                        &SyncMessage::Entry {
                            writer: hex_id.clone(),
                            index,
                            payload,
                        },
                    )
                    .await?;
                }
            }
        }
        send_line(&mut write_half, &SyncMessage::Done).await?;

        let mut received = Vec::new();
        loop {
            match read_line::<SyncMessage>(&mut reader).await? {
                Some(SyncMessage::Done) | None => break,
                Some(SyncMessage::Entry {
                    writer,
                    index,
                    payload,
                }) => {
                    let Ok(writer_bytes) = hex::decode(&writer) else {
                        tracing::warn!(writer, "replicate: unparseable writer id, skipping");
                        continue;
                    };
                    let Ok(writer_id) = PublicKey::from_bytes(&writer_bytes) else {
                        tracing::warn!(writer, "replicate: invalid writer public key, skipping");
                        continue;
                    };
                    let Ok(bytes) = hex::decode(&payload) else {
                        tracing::warn!(writer, index, "replicate: unparseable payload, skipping");
                        continue;
                    };
                    let mut slots = self.slots.lock().await;
                    let Some(slot) = slots.get_mut(&writer_id) else {
                        tracing::warn!(writer, "replicate: writer not authorized locally, dropping entry");
                        continue;
                    };
                    if index != slot.len {
                        tracing::warn!(
                            writer,
                            index,
                            expected = slot.len,
                            "replicate: out-of-order entry, dropping"
                        );
                        continue;
                    }
                    let Ok(mv) = decode_move(&bytes, self.game_id) else {
                        tracing::warn!(writer, index, "replicate: corrupt entry, dropping");
                        continue;
                    };
                    if let Err(e) = slot.store.append(&bytes).await {
                        tracing::warn!(writer, index, error = %e, "replicate: failed to persist entry");
                        continue;
                    }
                    slot.len += 1;
                    let new_len = slot.len;
                    drop(slots);

                    if let Err(e) = self
                        .writers_index
                        .lock()
                        .await
                        .set_committed_length(&writer_id, new_len)
                        .await
                    {
                        tracing::warn!(writer, error = %e, "replicate: failed to persist committed length");
                    }

                    let entry = LinearizedEntry {
                        writer_id,
                        writer_index: index,
                        timestamp: mv.timestamp,
                        value: mv,
                    };
                    self.view.insert(entry.clone());
                    received.push(entry);
                }
                Some(SyncMessage::Lengths(_)) => {
                    tracing::warn!("replicate: unexpected lengths message mid-sync, ignoring");
                }
            }
        }

        if !received.is_empty() {
            self.application.apply(&received, &self.view).await;
        }
        Ok(received.len())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SyncMessage {
    Lengths(HashMap<String, u64>),
    Entry {
        writer: String,
        index: u64,
        payload: String,
    },
    Done,
}

async fn send_line<W: AsyncWriteExt + Unpin>(writer: &mut W, msg: &SyncMessage) -> Result<()> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

async fn read_line<T: for<'de> Deserialize<'de>>(
    reader: &mut (impl AsyncBufReadExt + Unpin),
) -> Result<Option<T>> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_identity::Keypair;
    use gambit_types::PlayerColor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingApplication {
        applied: AtomicUsize,
    }

    #[async_trait]
    impl LogApplication for CountingApplication {
        async fn apply(&self, batch: &[LinearizedEntry], _view: &View) {
            self.applied.fetch_add(batch.len(), Ordering::SeqCst);
        }
    }

    fn sample_move(timestamp: u64, game_id: GameId) -> Move {
        Move {
            timestamp,
            player: PlayerColor::White,
            from: "e2".into(),
            to: "e4".into(),
            piece: 'p',
            captured: None,
            promotion: None,
            check: false,
            checkmate: false,
            fen: "fen".into(),
            san: "e4".into(),
            game_id,
        }
    }

    #[tokio::test]
    async fn append_persists_and_applies() {
        let dir = tempfile::tempdir().unwrap();
        let game_id = GameId::from_bytes(&[5u8; 32]).unwrap();
        let writer = Keypair::generate().public_key();
        let app = Arc::new(CountingApplication {
            applied: AtomicUsize::new(0),
        });
        let log = Log::open(dir.path(), game_id, writer, app.clone())
            .await
            .unwrap();

        log.append(sample_move(100, game_id)).await.unwrap();
        log.append(sample_move(200, game_id)).await.unwrap();

        assert_eq!(log.view().length(), 2);
        assert_eq!(app.applied.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reopening_replays_the_view_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let game_id = GameId::from_bytes(&[6u8; 32]).unwrap();
        let writer = Keypair::generate().public_key();
        let app = Arc::new(CountingApplication {
            applied: AtomicUsize::new(0),
        });
        {
            let log = Log::open(dir.path(), game_id, writer, app.clone())
                .await
                .unwrap();
            log.append(sample_move(1, game_id)).await.unwrap();
        }

        let app2 = Arc::new(CountingApplication {
            applied: AtomicUsize::new(0),
        });
        let log = Log::open(dir.path(), game_id, writer, app2).await.unwrap();
        assert_eq!(log.view().length(), 1);
    }

    #[tokio::test]
    async fn replicate_over_a_duplex_pipe_syncs_missing_entries() {
        let game_id = GameId::from_bytes(&[7u8; 32]).unwrap();
        let host_key = Keypair::generate().public_key();
        let guest_key = Keypair::generate().public_key();

        let host_dir = tempfile::tempdir().unwrap();
        let guest_dir = tempfile::tempdir().unwrap();

        let host_app = Arc::new(CountingApplication {
            applied: AtomicUsize::new(0),
        });
        let guest_app = Arc::new(CountingApplication {
            applied: AtomicUsize::new(0),
        });

        let host = Log::open(host_dir.path(), game_id, host_key, host_app).await.unwrap();
        host.add_writer(guest_key).await.unwrap();
        host.append(sample_move(10, game_id)).await.unwrap();
        host.append(sample_move(20, game_id)).await.unwrap();

        let guest = Log::open(guest_dir.path(), game_id, guest_key, guest_app)
            .await
            .unwrap();
        guest.add_writer(host_key).await.unwrap();

        let (host_side, guest_side) = tokio::io::duplex(4096);
        let host_fut = host.replicate(host_side);
        let guest_fut = guest.replicate(guest_side);
        let (host_result, guest_result) = tokio::join!(host_fut, guest_fut);
        host_result.unwrap();
        let received = guest_result.unwrap();

        assert_eq!(received, 2);
        assert_eq!(guest.view().length(), 2);
    }
}
