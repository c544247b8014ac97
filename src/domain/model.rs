use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Square name or move text that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid notation: {0}")]
pub struct NotationError(pub String);

/// One of the 64 board squares, stored as `rank * 8 + file` (a1 = 0, h8 = 63).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square(u8);

impl Square {
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Self(rank * 8 + file))
        } else {
            None
        }
    }

    /// 0 = a file, 7 = h file.
    pub fn file(self) -> u8 {
        self.0 % 8
    }

    /// 0 = first rank, 7 = eighth rank.
    pub fn rank(self) -> u8 {
        self.0 / 8
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = Square> {
        (0u8..64).map(Square)
    }

    pub fn offset(self, file_delta: i8, rank_delta: i8) -> Option<Square> {
        let file = self.file() as i8 + file_delta;
        let rank = self.rank() as i8 + rank_delta;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Square::new(file as u8, rank as u8)
        } else {
            None
        }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file()) as char, self.rank() + 1)
    }
}

impl FromStr for Square {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.trim().as_bytes();
        if bytes.len() != 2 {
            return Err(NotationError(s.to_string()));
        }
        let file = bytes[0].to_ascii_lowercase().wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Square::new(file, rank).ok_or_else(|| NotationError(s.to_string()))
    }
}

impl TryFrom<String> for Square {
    type Error = NotationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Square> for String {
    fn from(square: Square) -> Self {
        square.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }

    pub(crate) fn forward(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    pub(crate) fn back_rank(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub const ALL: [PieceKind; 6] = [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PieceKind::Pawn => "pawn",
            PieceKind::Knight => "knight",
            PieceKind::Bishop => "bishop",
            PieceKind::Rook => "rook",
            PieceKind::Queen => "queen",
            PieceKind::King => "king",
        }
    }

    /// Lowercase letter used in board-state strings and promotion suffixes.
    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    pub const fn new(color: Color, kind: PieceKind) -> Self {
        Self { color, kind }
    }

    /// Board-state letter: uppercase for white, lowercase for black.
    pub fn fen_char(self) -> char {
        let letter = self.kind.letter();
        match self.color {
            Color::White => letter.to_ascii_uppercase(),
            Color::Black => letter,
        }
    }

    pub fn from_fen_char(c: char) -> Option<Self> {
        let kind = PieceKind::from_letter(c)?;
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Self { color, kind })
    }
}

/// What the vision model reported for one square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceLabel {
    Empty,
    Occupied(Piece),
}

impl PieceLabel {
    pub fn piece(self) -> Option<Piece> {
        match self {
            PieceLabel::Empty => None,
            PieceLabel::Occupied(piece) => Some(piece),
        }
    }

    /// Canonical label text, e.g. `white_pawn` or `empty`.
    pub fn canonical(self) -> String {
        match self {
            PieceLabel::Empty => "empty".to_string(),
            PieceLabel::Occupied(piece) => {
                format!("{}_{}", piece.color.as_str(), piece.kind.as_str())
            }
        }
    }
}

impl From<Option<Piece>> for PieceLabel {
    fn from(piece: Option<Piece>) -> Self {
        match piece {
            Some(piece) => PieceLabel::Occupied(piece),
            None => PieceLabel::Empty,
        }
    }
}

/// Square → free-text label mapping as returned by the vision oracle.
pub type RawLabels = BTreeMap<Square, String>;

/// A move in coordinate form. Castling is encoded as the king's two-square step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl Move {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.letter())?;
        }
        Ok(())
    }
}

impl FromStr for Move {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return Err(NotationError(s.to_string()));
        }
        let from: Square = text[0..2].parse()?;
        let to: Square = text[2..4].parse()?;
        let promotion = match text[4..].chars().next() {
            None => None,
            Some(c) => match PieceKind::from_letter(c) {
                Some(kind) if !matches!(kind, PieceKind::Pawn | PieceKind::King) => Some(kind),
                _ => return Err(NotationError(s.to_string())),
            },
        };
        if from == to {
            return Err(NotationError(s.to_string()));
        }
        Ok(Self {
            from,
            to,
            promotion,
        })
    }
}

impl TryFrom<String> for Move {
    type Error = NotationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Move> for String {
    fn from(mv: Move) -> Self {
        mv.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Orientation {
    #[default]
    #[serde(rename = "white", alias = "white-at-bottom")]
    WhiteAtBottom,
    #[serde(rename = "black", alias = "black-at-bottom")]
    BlackAtBottom,
}

impl Orientation {
    /// Side whose pieces sit at the bottom of the screen.
    pub fn bottom_color(self) -> Color {
        match self {
            Orientation::WhiteAtBottom => Color::White,
            Orientation::BlackAtBottom => Color::Black,
        }
    }
}

/// Screen rectangle that holds the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRegion {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DevicePoint {
    pub x: i32,
    pub y: i32,
}

impl DevicePoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Pixel bounds of one board cell; `left..left + width` is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    pub fn contains(&self, point: DevicePoint) -> bool {
        point.x >= self.left
            && point.y >= self.top
            && point.x < self.left + self.width as i32
            && point.y < self.top + self.height as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MoveMethod {
    #[default]
    Drag,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoverStep {
    pub point: DevicePoint,
    pub dwell_ms: u64,
}

/// Fully specified pointer action for the actuator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub origin: DevicePoint,
    pub destination: DevicePoint,
    pub method: MoveMethod,
    pub pre_delay_ms: u64,
    pub motion_ms: u64,
    pub settle_ms: u64,
    pub jitter_radius: u32,
    pub hover: Option<HoverStep>,
}

impl ActionRequest {
    pub fn pre_delay(&self) -> Duration {
        Duration::from_millis(self.pre_delay_ms)
    }
}

/// Landing report from the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actuation {
    Landed,
    Missed,
    Unverified,
}

/// Search budget handed to the move oracle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBudget {
    pub skill: u8,
    pub depth: Option<u32>,
    pub time_limit: Option<Duration>,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            skill: 20,
            depth: Some(15),
            time_limit: Some(Duration::from_secs(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GameStatus {
    Ongoing,
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        !matches!(self, GameStatus::Ongoing)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Ongoing => f.write_str("ongoing"),
            GameStatus::Checkmate { winner } => write!(f, "checkmate, {} wins", winner),
            GameStatus::Stalemate => f.write_str("stalemate"),
            GameStatus::InsufficientMaterial => f.write_str("insufficient material"),
        }
    }
}

/// How a committed move became known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveSource {
    /// Chosen by the engine and confirmed on the board.
    Engine,
    /// Inferred from the observed board.
    Observed,
}

/// One committed ply, as written to the move journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ply: usize,
    pub mover: Color,
    pub mv: Move,
    pub source: MoveSource,
    pub fen: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_notation() {
        let e2: Square = "e2".parse().unwrap();
        assert_eq!(e2.file(), 4);
        assert_eq!(e2.rank(), 1);
        assert_eq!(e2.to_string(), "e2");
        assert_eq!("H8".parse::<Square>().unwrap().index(), 63);
        assert!("i1".parse::<Square>().is_err());
        assert!("a9".parse::<Square>().is_err());
        assert!("a".parse::<Square>().is_err());
        assert_eq!(Square::all().count(), 64);
    }

    #[test]
    fn test_move_notation() {
        let mv: Move = "e7e8q".parse().unwrap();
        assert_eq!(mv.from.to_string(), "e7");
        assert_eq!(mv.to.to_string(), "e8");
        assert_eq!(mv.promotion, Some(PieceKind::Queen));
        assert_eq!(mv.to_string(), "e7e8q");

        assert!("e2e4".parse::<Move>().unwrap().promotion.is_none());
        assert!("e7e8k".parse::<Move>().is_err());
        assert!("e2e2".parse::<Move>().is_err());
        assert!("(none)".parse::<Move>().is_err());
        assert!("e2e".parse::<Move>().is_err());
    }

    #[test]
    fn test_square_serde_as_string() {
        let json = serde_json::to_string(&"g7".parse::<Square>().unwrap()).unwrap();
        assert_eq!(json, "\"g7\"");
        let back: Square = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), "g7");
    }

    #[test]
    fn test_canonical_labels() {
        let label = PieceLabel::Occupied(Piece::new(Color::Black, PieceKind::Knight));
        assert_eq!(label.canonical(), "black_knight");
        assert_eq!(PieceLabel::Empty.canonical(), "empty");
    }
}
