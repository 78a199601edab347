//! Command construction and reply parsing for the engine's line protocol.

/// A parsed `score` field from an `info` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawn evaluation, from the side to move's perspective.
    Centipawns(i64),
    /// Forced mate in this many plies (negative: being mated).
    Mate(i64),
}

/// One parsed `info` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoFrame {
    /// Search depth reached.
    pub depth: Option<u32>,
    /// Selective search depth.
    pub seldepth: Option<u32>,
    /// Milliseconds searched.
    pub time_ms: Option<u64>,
    /// Nodes searched.
    pub nodes: Option<u64>,
    /// Nodes per second.
    pub nps: Option<u64>,
    /// Which principal variation this frame reports, for multi-PV search.
    pub multipv: Option<u32>,
    /// The evaluated score, if present.
    pub score: Option<Score>,
    /// The principal variation, as UCI move strings.
    pub pv: Vec<String>,
}

/// The terminal reply to a `bestmove`-correlated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestMove {
    /// The chosen move, in UCI notation (e.g. `"e2e4"`).
    pub mv: String,
    /// The move the engine expects to ponder on, if offered.
    pub ponder: Option<String>,
}

/// A reply line the engine produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReply {
    /// Reply to `uci`.
    UciOk,
    /// Reply to `isready`.
    ReadyOk,
    /// Reply to `go`/`stop`.
    BestMove(BestMove),
}

/// Builds the `position` command for a FEN with no move list.
#[must_use]
pub fn position_fen_command(fen: &str) -> String {
    format!("position fen {fen}")
}

/// Builds the `go` command for a fixed search depth.
#[must_use]
pub fn go_depth_command(depth: u32) -> String {
    format!("go depth {depth}")
}

/// Builds the `go` command for a fixed search time.
#[must_use]
pub fn go_movetime_command(movetime_ms: u64) -> String {
    format!("go movetime {movetime_ms}")
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Parses one line of engine stdout into a terminal [`EngineReply`], if the
/// line is one of `uciok`/`readyok`/`bestmove ...`.
#[must_use]
pub fn parse_reply(line: &str) -> Option<EngineReply> {
    let line = strip_cr(line).trim();
    if line == "uciok" {
        return Some(EngineReply::UciOk);
    }
    if line == "readyok" {
        return Some(EngineReply::ReadyOk);
    }
    if let Some(rest) = line.strip_prefix("bestmove ") {
        let mut tokens = rest.split_whitespace();
        let mv = tokens.next()?.to_string();
        let ponder = match tokens.next() {
            Some("ponder") => tokens.next().map(str::to_string),
            _ => None,
        };
        return Some(EngineReply::BestMove(BestMove { mv, ponder }));
    }
    None
}

/// Parses one `info` line into an [`InfoFrame`]. Returns `None` for
/// non-`info` lines.
#[must_use]
pub fn parse_info(line: &str) -> Option<InfoFrame> {
    let line = strip_cr(line).trim();
    let rest = line.strip_prefix("info ")?;
    let tokens: Vec<&str> = rest.split_whitespace().collect();

    let mut frame = InfoFrame::default();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                frame.depth = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "seldepth" => {
                frame.seldepth = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "time" => {
                frame.time_ms = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "nodes" => {
                frame.nodes = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "nps" => {
                frame.nps = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "multipv" => {
                frame.multipv = tokens.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "score" => {
                match tokens.get(i + 1).copied() {
                    Some("cp") => {
                        frame.score = tokens
                            .get(i + 2)
                            .and_then(|v| v.parse().ok())
                            .map(Score::Centipawns);
                        i += 3;
                    }
                    Some("mate") => {
                        frame.score = tokens
                            .get(i + 2)
                            .and_then(|v| v.parse().ok())
                            .map(Score::Mate);
                        i += 3;
                    }
                    _ => i += 2,
                }
            }
            "pv" => {
                frame.pv = tokens[i + 1..].iter().map(|s| s.to_string()).collect();
                break;
            }
            _ => i += 1,
        }
    }
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uciok_and_readyok() {
        assert_eq!(parse_reply("uciok"), Some(EngineReply::UciOk));
        assert_eq!(parse_reply("readyok\r"), Some(EngineReply::ReadyOk));
    }

    #[test]
    fn parses_bestmove_with_ponder() {
        let reply = parse_reply("bestmove e2e4 ponder e7e5").unwrap();
        assert_eq!(
            reply,
            EngineReply::BestMove(BestMove {
                mv: "e2e4".into(),
                ponder: Some("e7e5".into()),
            })
        );
    }

    #[test]
    fn parses_bestmove_without_ponder() {
        let reply = parse_reply("bestmove e2e4").unwrap();
        assert_eq!(
            reply,
            EngineReply::BestMove(BestMove {
                mv: "e2e4".into(),
                ponder: None,
            })
        );
    }

    #[test]
    fn non_reply_lines_are_none() {
        assert_eq!(parse_reply("id name Stub 1.0"), None);
    }

    #[test]
    fn parses_info_frame_with_cp_score_and_pv() {
        let frame =
            parse_info("info depth 12 seldepth 18 time 340 nodes 98213 nps 288000 score cp 34 pv e2e4 e7e5 g1f3")
                .unwrap();
        assert_eq!(frame.depth, Some(12));
        assert_eq!(frame.seldepth, Some(18));
        assert_eq!(frame.time_ms, Some(340));
        assert_eq!(frame.nodes, Some(98213));
        assert_eq!(frame.nps, Some(288000));
        assert_eq!(frame.score, Some(Score::Centipawns(34)));
        assert_eq!(frame.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn parses_mate_score() {
        let frame = parse_info("info depth 5 score mate 3 pv f7f5").unwrap();
        assert_eq!(frame.score, Some(Score::Mate(3)));
    }

    #[test]
    fn non_info_line_is_none() {
        assert!(parse_info("bestmove e2e4").is_none());
    }
}
