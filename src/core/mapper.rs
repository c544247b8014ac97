use crate::domain::model::{BoardRegion, CellRect, DevicePoint, Move, Orientation, Square};

/// Start offset of grid line `index` (0..=8) across `dimension` pixels.
/// Remainder pixels are spread so every cell is `dimension / 8` or one more.
fn grid_line(dimension: u32, index: u32) -> i32 {
    ((dimension as u64 * index as u64) / 8) as i32
}

/// Screen column and row (0 = left / top) of a square.
fn screen_cell(square: Square, orientation: Orientation) -> (u32, u32) {
    let file = square.file() as u32;
    let rank = square.rank() as u32;
    match orientation {
        Orientation::WhiteAtBottom => (file, 7 - rank),
        Orientation::BlackAtBottom => (7 - file, rank),
    }
}

pub fn cell_rect(square: Square, board: &BoardRegion) -> CellRect {
    let (col, row) = screen_cell(square, board.orientation);
    let x0 = grid_line(board.width, col);
    let x1 = grid_line(board.width, col + 1);
    let y0 = grid_line(board.height, row);
    let y1 = grid_line(board.height, row + 1);
    CellRect {
        left: board.left + x0,
        top: board.top + y0,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    }
}

/// Center of the square's cell.
pub fn square_center(square: Square, board: &BoardRegion) -> DevicePoint {
    let cell = cell_rect(square, board);
    DevicePoint::new(
        cell.left + cell.width as i32 / 2,
        cell.top + cell.height as i32 / 2,
    )
}

/// Origin and destination points for a move.
pub fn to_regions(mv: &Move, board: &BoardRegion) -> (DevicePoint, DevicePoint) {
    (square_center(mv.from, board), square_center(mv.to, board))
}

/// Square under a device point, or `None` outside the board.
pub fn point_to_square(point: DevicePoint, board: &BoardRegion) -> Option<Square> {
    let dx = point.x - board.left;
    let dy = point.y - board.top;
    if dx < 0 || dy < 0 || dx >= board.width as i32 || dy >= board.height as i32 {
        return None;
    }
    let col = (0..8).rev().find(|&c| grid_line(board.width, c) <= dx)? as u8;
    let row = (0..8).rev().find(|&r| grid_line(board.height, r) <= dy)? as u8;
    let (file, rank) = match board.orientation {
        Orientation::WhiteAtBottom => (col, 7 - row),
        Orientation::BlackAtBottom => (7 - col, row),
    };
    Square::new(file, rank)
}

/// Half the smallest cell dimension minus one: the largest offset from a
/// cell center that still lands inside the cell.
pub fn max_safe_offset(board: &BoardRegion) -> u32 {
    let smallest = (board.width / 8).min(board.height / 8);
    (smallest / 2).saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(width: u32, height: u32, orientation: Orientation) -> BoardRegion {
        BoardRegion {
            left: 100,
            top: 100,
            width,
            height,
            orientation,
        }
    }

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_e2_white_at_bottom() {
        let region = board(800, 800, Orientation::WhiteAtBottom);
        let point = square_center(sq("e2"), &region);
        // column 4, row 6 of the grid
        assert_eq!(point, DevicePoint::new(550, 750));
        assert_eq!(square_center(sq("e2"), &region), point);
    }

    #[test]
    fn test_black_at_bottom_reflects_both_axes() {
        let white = board(800, 800, Orientation::WhiteAtBottom);
        let black = board(800, 800, Orientation::BlackAtBottom);
        for square in Square::all() {
            let p = square_center(square, &white);
            let q = square_center(square, &black);
            assert_eq!(q.x, 2 * white.left + white.width as i32 - p.x, "{square}");
            assert_eq!(q.y, 2 * white.top + white.height as i32 - p.y, "{square}");
        }
    }

    #[test]
    fn test_cells_tile_the_board_with_remainder() {
        let region = board(803, 797, Orientation::WhiteAtBottom);
        let a8 = cell_rect(sq("a8"), &region);
        let h1 = cell_rect(sq("h1"), &region);
        assert_eq!((a8.left, a8.top), (100, 100));
        assert_eq!(h1.left + h1.width as i32, 100 + 803);
        assert_eq!(h1.top + h1.height as i32, 100 + 797);
        for square in Square::all() {
            let cell = cell_rect(square, &region);
            assert!((100..=101).contains(&cell.width), "{square}");
            assert!((99..=100).contains(&cell.height), "{square}");
            assert!(cell.contains(square_center(square, &region)));
        }
    }

    #[test]
    fn test_point_to_square_inverts_center() {
        for orientation in [Orientation::WhiteAtBottom, Orientation::BlackAtBottom] {
            let region = board(803, 797, orientation);
            for square in Square::all() {
                let center = square_center(square, &region);
                assert_eq!(point_to_square(center, &region), Some(square));
            }
        }
        let region = board(800, 800, Orientation::WhiteAtBottom);
        assert_eq!(point_to_square(DevicePoint::new(99, 500), &region), None);
        assert_eq!(point_to_square(DevicePoint::new(900, 500), &region), None);
    }

    #[test]
    fn test_to_regions() {
        let region = board(800, 800, Orientation::WhiteAtBottom);
        let (from, to) = to_regions(&"e2e4".parse().unwrap(), &region);
        assert_eq!(from, DevicePoint::new(550, 750));
        assert_eq!(to, DevicePoint::new(550, 550));
    }

    #[test]
    fn test_max_safe_offset() {
        assert_eq!(max_safe_offset(&board(800, 800, Orientation::WhiteAtBottom)), 49);
        assert_eq!(max_safe_offset(&board(16, 16, Orientation::WhiteAtBottom)), 0);
    }
}
