//! Subprocess lifecycle and request/response driving for the engine.

use crate::error::{EngineError, Result};
use crate::protocol::{
    go_depth_command, go_movetime_command, parse_info, parse_reply, position_fen_command,
    EngineReply, InfoFrame, Score,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// Default deadline for a correlated request (`uci`, `isready`).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Outer safety deadline for a `go`, bounding even an unbounded search.
pub const ANALYZE_SAFETY_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period between `quit` and a forced kill on shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

const DEFAULT_ANALYZE_DEPTH: u32 = 15;

/// Options for [`EngineAdapter::analyze`]. If both are `None`, a default
/// search depth is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzeOptions {
    /// Fixed search depth.
    pub depth: Option<u32>,
    /// Fixed search time, in milliseconds.
    pub movetime_ms: Option<u64>,
}

/// One reported line from an `analyze` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisLine {
    /// The principal variation, as UCI move strings.
    pub moves: Vec<String>,
    /// The evaluated score for this line, if reported.
    pub score: Option<Score>,
    /// The depth this line was reported at.
    pub depth: u32,
}

/// The result of [`EngineAdapter::analyze`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    /// The position analyzed, in FEN.
    pub fen: String,
    /// The engine's chosen move, in UCI notation.
    pub best_move: String,
    /// The final reported search depth.
    pub depth: u32,
    /// Every `info` line observed while the search ran.
    pub lines: Vec<AnalysisLine>,
}

type PendingMap = Mutex<HashMap<&'static str, oneshot::Sender<EngineReply>>>;
type AnalysisSink = Mutex<Option<mpsc::UnboundedSender<InfoFrame>>>;

/// A running engine subprocess, driven over its UCI-like line protocol.
///
/// Exactly one `EngineAdapter` owns its child process; dropping it without
/// calling [`EngineAdapter::shutdown`] still kills the process (a leaked
/// `EngineAdapter` never leaks a process), but `shutdown` is the graceful
/// path (`quit`, wait, then kill).
pub struct EngineAdapter {
    stdin: AsyncMutex<ChildStdin>,
    child: Child,
    pending: Arc<PendingMap>,
    analysis_sink: Arc<AnalysisSink>,
    exited: Arc<AtomicBool>,
    reader_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl EngineAdapter {
    /// Spawns `binary` and starts its reader/stderr-drain tasks.
    pub fn spawn(binary: &Path) -> Result<Self> {
        let mut child = Command::new(binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Spawn(e.to_string()))?;

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");

        let pending: Arc<PendingMap> = Arc::new(Mutex::new(HashMap::new()));
        let analysis_sink: Arc<AnalysisSink> = Arc::new(Mutex::new(None));
        let exited = Arc::new(AtomicBool::new(false));

        let reader_task = tokio::spawn(reader_loop(
            stdout,
            Arc::clone(&pending),
            Arc::clone(&analysis_sink),
            Arc::clone(&exited),
        ));
        let stderr_task = tokio::spawn(stderr_drain_loop(stderr));

        Ok(Self {
            stdin: AsyncMutex::new(stdin),
            child,
            pending,
            analysis_sink,
            exited,
            reader_task: Some(reader_task),
            stderr_task: Some(stderr_task),
        })
    }

    async fn write_line(&self, command: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(command.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn send_correlated(
        &self,
        command: String,
        token: &'static str,
        timeout: Duration,
    ) -> Result<EngineReply> {
        let (tx, rx) = oneshot::channel();
        // A duplicate registration on the same token cancels the older
        // waiter's timer by dropping its sender, resolving its `recv` early.
        self.pending.lock().insert(token, tx);
        self.write_line(&command).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                if self.exited.load(Ordering::SeqCst) {
                    Err(EngineError::ProcessExited)
                } else {
                    Err(EngineError::Superseded(token.to_string()))
                }
            }
            Err(_) => {
                self.pending.lock().remove(token);
                Err(EngineError::Timeout(token.to_string()))
            }
        }
    }

    /// Sends `uci` and waits for `uciok`.
    pub async fn uci(&self) -> Result<()> {
        self.send_correlated("uci".to_string(), "uciok", DEFAULT_REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Sends `isready` and waits for `readyok`.
    pub async fn isready(&self) -> Result<()> {
        self.send_correlated("isready".to_string(), "readyok", DEFAULT_REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    /// Sends `setoption name <name> value <value>`. Completes on write,
    /// with no reply to correlate.
    pub async fn set_option(&self, name: &str, value: &str) -> Result<()> {
        self.write_line(&format!("setoption name {name} value {value}"))
            .await
    }

    /// Sends `position fen <fen>`.
    pub async fn position_fen(&self, fen: &str) -> Result<()> {
        self.write_line(&position_fen_command(fen)).await
    }

    /// Sends `stop`. Resolves whatever `go` is outstanding via its own
    /// pending `bestmove` waiter; does not itself wait for a reply.
    pub async fn stop(&self) -> Result<()> {
        self.write_line("stop").await
    }

    /// Runs `position fen <fen>` then `go`, returning the engine's chosen
    /// move and every `info` frame observed while the search ran.
    pub async fn analyze(&self, fen: &str, options: AnalyzeOptions) -> Result<AnalysisResult> {
        self.position_fen(fen).await?;

        let (info_tx, mut info_rx) = mpsc::unbounded_channel();
        *self.analysis_sink.lock() = Some(info_tx);

        let command = match options.movetime_ms {
            Some(ms) => go_movetime_command(ms),
            None => go_depth_command(options.depth.unwrap_or(DEFAULT_ANALYZE_DEPTH)),
        };
        let reply = self
            .send_correlated(command, "bestmove", ANALYZE_SAFETY_TIMEOUT)
            .await;
        *self.analysis_sink.lock() = None;
        let reply = reply?;

        let EngineReply::BestMove(best) = reply else {
            return Err(EngineError::Protocol(
                "expected bestmove reply to go".to_string(),
            ));
        };

        let mut frames = Vec::new();
        while let Ok(frame) = info_rx.try_recv() {
            frames.push(frame);
        }

        let depth = frames
            .last()
            .and_then(|f| f.depth)
            .unwrap_or_else(|| options.depth.unwrap_or(DEFAULT_ANALYZE_DEPTH));
        let lines = frames
            .into_iter()
            .map(|f| AnalysisLine {
                moves: f.pv,
                score: f.score,
                depth: f.depth.unwrap_or(depth),
            })
            .collect();

        Ok(AnalysisResult {
            fen: fen.to_string(),
            best_move: best.mv,
            depth,
            lines,
        })
    }

    /// Sends `quit`, waits [`SHUTDOWN_GRACE`], then forcibly kills the
    /// process if it hasn't exited, reaping it either way.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.write_line("quit").await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
        Ok(())
    }
}

impl Drop for EngineAdapter {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        // Best-effort: if `shutdown` already reaped the child this is a
        // harmless no-op; if the adapter was simply dropped, this is what
        // keeps the process from leaking.
        let _ = self.child.start_kill();
    }
}

async fn reader_loop(
    stdout: tokio::process::ChildStdout,
    pending: Arc<PendingMap>,
    analysis_sink: Arc<AnalysisSink>,
    exited: Arc<AtomicBool>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(reply) = parse_reply(&line) {
                    let token = match &reply {
                        EngineReply::UciOk => "uciok",
                        EngineReply::ReadyOk => "readyok",
                        EngineReply::BestMove(_) => "bestmove",
                    };
                    if let Some(tx) = pending.lock().remove(token) {
                        let _ = tx.send(reply);
                    }
                } else if let Some(frame) = parse_info(&line) {
                    if let Some(sink) = analysis_sink.lock().as_ref() {
                        let _ = sink.send(frame);
                    }
                } else {
                    tracing::trace!(line, "unrecognized engine output");
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "error reading engine stdout");
                break;
            }
        }
    }
    exited.store(true, Ordering::SeqCst);
    pending.lock().clear();
}

async fn stderr_drain_loop(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(line, "engine stderr");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_stub_engine(body: &str) -> tempfile::TempPath {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        write!(file, "{body}").unwrap();
        let path = file.into_temp_path();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[tokio::test]
    async fn uci_and_isready_round_trip_with_a_stub_engine() {
        let script = write_stub_engine(
            r#"
while read -r line; do
  case "$line" in
    uci) echo uciok ;;
    isready) echo readyok ;;
    quit) exit 0 ;;
  esac
done
"#,
        );
        let adapter = EngineAdapter::spawn(&script).unwrap();
        adapter.uci().await.unwrap();
        adapter.isready().await.unwrap();
        adapter.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn analyze_collects_info_frames_and_bestmove() {
        let script = write_stub_engine(
            r#"
while read -r line; do
  case "$line" in
    position*) ;;
    go*)
      echo "info depth 1 score cp 10 pv e2e4"
      echo "info depth 2 score cp 12 pv e2e4 e7e5"
      echo "bestmove e2e4 ponder e7e5"
      ;;
    quit) exit 0 ;;
  esac
done
"#,
        );
        let adapter = EngineAdapter::spawn(&script).unwrap();
        let result = adapter
            .analyze(
                "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
                AnalyzeOptions {
                    depth: Some(2),
                    movetime_ms: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(result.best_move, "e2e4");
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.depth, 2);
        adapter.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn timeout_on_a_silent_engine() {
        let script = write_stub_engine(
            r#"
while read -r line; do
  case "$line" in
    quit) exit 0 ;;
  esac
done
"#,
        );
        let adapter = EngineAdapter::spawn(&script).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), async {
            adapter
                .send_correlated("isready".to_string(), "readyok", Duration::from_millis(50))
                .await
        })
        .await
        .unwrap();
        assert!(matches!(result, Err(EngineError::Timeout(_))));
        adapter.shutdown().await.unwrap();
    }
}
