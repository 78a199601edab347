//! Binary encoding for a single log entry (a [`Move`]).
//!
//! Field order is fixed: `timestamp`, `color`, then the length-prefixed
//! strings `from`, `to`, `piece`, `captured`, `promotion`, `fen`, `san`, and
//! finally the two flag bytes `check`/`checkmate`. `game_id` is never
//! encoded — every writer file lives under a directory already keyed by
//! game id, so the value is reattached from context on decode.

use crate::error::{LogError, Result};
use gambit_types::{GameId, Move, PlayerColor};

fn push_str(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn push_opt_char(buf: &mut Vec<u8>, c: Option<char>) {
    match c {
        Some(c) => push_str(buf, &c.to_string()),
        None => buf.extend_from_slice(&0u32.to_le_bytes()),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(|| decode_err("length overflow"))?;
        if end > self.bytes.len() {
            return Err(decode_err("record truncated"));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn string(&mut self) -> Result<String> {
        let len = u32::from_le_bytes(self.take(4)?.try_into().unwrap()) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| decode_err(&e.to_string()))
    }

    fn opt_char(&mut self) -> Result<Option<char>> {
        let s = self.string()?;
        if s.is_empty() {
            return Ok(None);
        }
        s.chars().next().map(Some).ok_or_else(|| decode_err("empty char field"))
    }
}

fn decode_err(msg: &str) -> LogError {
    LogError::CorruptRecord(String::new(), 0, msg.to_string())
}

/// Encodes a move for on-disk storage, omitting `game_id`.
#[must_use]
pub fn encode_move(mv: &Move) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&mv.timestamp.to_le_bytes());
    buf.push(match mv.player {
        PlayerColor::White => 0,
        PlayerColor::Black => 1,
    });
    push_str(&mut buf, &mv.from);
    push_str(&mut buf, &mv.to);
    push_str(&mut buf, &mv.piece.to_string());
    push_opt_char(&mut buf, mv.captured);
    push_opt_char(&mut buf, mv.promotion);
    push_str(&mut buf, &mv.fen);
    push_str(&mut buf, &mv.san);
    buf.push(u8::from(mv.check));
    buf.push(u8::from(mv.checkmate));
    buf
}

/// Decodes a move previously written by [`encode_move`], reattaching `game_id`.
pub fn decode_move(bytes: &[u8], game_id: GameId) -> Result<Move> {
    let mut r = Reader::new(bytes);
    let timestamp = r.u64()?;
    let player = match r.u8()? {
        0 => PlayerColor::White,
        1 => PlayerColor::Black,
        other => return Err(decode_err(&format!("invalid color byte {other}"))),
    };
    let from = r.string()?;
    let to = r.string()?;
    let piece = r
        .string()?
        .chars()
        .next()
        .ok_or_else(|| decode_err("empty piece field"))?;
    let captured = r.opt_char()?;
    let promotion = r.opt_char()?;
    let fen = r.string()?;
    let san = r.string()?;
    let check = r.u8()? != 0;
    let checkmate = r.u8()? != 0;

    Ok(Move {
        timestamp,
        player,
        from,
        to,
        piece,
        captured,
        promotion,
        check,
        checkmate,
        fen,
        san,
        game_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(game_id: GameId) -> Move {
        Move {
            timestamp: 123_456,
            player: PlayerColor::Black,
            from: "e7".into(),
            to: "e5".into(),
            piece: 'p',
            captured: Some('n'),
            promotion: None,
            check: true,
            checkmate: false,
            fen: "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2".into(),
            san: "e5".into(),
            game_id,
        }
    }

    #[test]
    fn round_trips_a_move() {
        let game_id = GameId::from_bytes(&[7u8; 32]).unwrap();
        let mv = sample(game_id);
        let bytes = encode_move(&mv);
        let decoded = decode_move(&bytes, game_id).unwrap();
        assert_eq!(mv, decoded);
    }

    #[test]
    fn encodes_none_fields_as_zero_length() {
        let game_id = GameId::from_bytes(&[8u8; 32]).unwrap();
        let mut mv = sample(game_id);
        mv.captured = None;
        mv.promotion = None;
        let bytes = encode_move(&mv);
        let decoded = decode_move(&bytes, game_id).unwrap();
        assert_eq!(decoded.captured, None);
        assert_eq!(decoded.promotion, None);
    }

    #[test]
    fn truncated_record_is_rejected() {
        let game_id = GameId::from_bytes(&[9u8; 32]).unwrap();
        let mv = sample(game_id);
        let mut bytes = encode_move(&mv);
        bytes.truncate(bytes.len() - 3);
        assert!(decode_move(&bytes, game_id).is_err());
    }
}
