// Board model: tile grid, mine placement, clue counts, digging and flags
// The grid is indexed [col][row] and owned exclusively by the Board

use rand::prelude::*;

use crate::tsd_error::{BoardError, Result};

/// Classification of a tile, fixed once the board is generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Mine,
    Clue(u8), // 1-8 adjacent mines
    Empty,    // no adjacent mines, triggers the flood-fill cascade
}

impl TileKind {
    fn from_count(count: u8) -> Self {
        if count == 0 {
            TileKind::Empty
        } else {
            TileKind::Clue(count)
        }
    }

    pub fn is_mine(&self) -> bool {
        matches!(self, TileKind::Mine)
    }

    /// Adjacent mine count, None for mines
    pub fn clue(&self) -> Option<u8> {
        match self {
            TileKind::Mine => None,
            TileKind::Clue(n) => Some(*n),
            TileKind::Empty => Some(0),
        }
    }
}

/// A single cell on the board
#[derive(Debug, Clone)]
pub struct Tile {
    kind: TileKind,
    revealed: bool,
    flagged: bool,
    misflagged: bool, // flag was on a safe tile when the game was lost
    position: (usize, usize),
}

impl Tile {
    fn new(kind: TileKind, position: (usize, usize)) -> Self {
        Tile {
            kind,
            revealed: false,
            flagged: false,
            misflagged: false,
            position,
        }
    }

    pub fn kind(&self) -> TileKind {
        self.kind
    }

    pub fn revealed(&self) -> bool {
        self.revealed
    }

    pub fn flagged(&self) -> bool {
        self.flagged
    }

    pub fn misflagged(&self) -> bool {
        self.misflagged
    }

    /// (col, row) of this tile
    pub fn position(&self) -> (usize, usize) {
        self.position
    }

    fn reveal(&mut self) -> TileKind {
        self.revealed = true;
        self.flagged = false;
        self.kind
    }
}

/// Minefield for one game attempt
#[derive(Debug, Clone)]
pub struct Board {
    width: usize,
    height: usize,
    mine_count: usize,
    grid: Vec<Vec<Tile>>,
    exploded: Option<(usize, usize)>,
}

impl Board {
    /// Generate a board with `mine_count` mines placed uniformly at random
    pub fn new(width: usize, height: usize, mine_count: usize) -> Result<Self> {
        Self::with_rng(width, height, mine_count, &mut thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(
        width: usize,
        height: usize,
        mine_count: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let cells = cell_count(width, height)?;
        if mine_count > cells - 1 {
            return Err(BoardError::TooManyMines {
                mines: mine_count,
                cells,
            });
        }
        // sampling indices without replacement keeps every mine on its own cell
        let mines: Vec<(usize, usize)> = rand::seq::index::sample(rng, cells, mine_count)
            .iter()
            .map(|i| (i % width, i / width))
            .collect();
        let board = Self::from_mines(width, height, &mines)?;
        log::debug!("generated {}x{} board with {} mines", width, height, mine_count);
        Ok(board)
    }

    /// Build a board from a fixed mine layout
    pub fn from_mines(width: usize, height: usize, mines: &[(usize, usize)]) -> Result<Self> {
        let cells = cell_count(width, height)?;
        let mut seen = vec![false; cells];
        for &(x, y) in mines {
            if x >= width || y >= height {
                return Err(BoardError::OutOfBounds {
                    x,
                    y,
                    width,
                    height,
                });
            }
            let i = y * width + x;
            if seen[i] {
                return Err(BoardError::DuplicateMine { x, y });
            }
            seen[i] = true;
        }
        if mines.len() > cells - 1 {
            return Err(BoardError::TooManyMines {
                mines: mines.len(),
                cells,
            });
        }
        Ok(Self::build(width, height, mines))
    }

    fn build(width: usize, height: usize, mines: &[(usize, usize)]) -> Self {
        let mut is_mine = vec![vec![false; height]; width];
        for &(x, y) in mines {
            is_mine[x][y] = true;
        }
        let grid = (0..width)
            .map(|x| {
                (0..height)
                    .map(|y| {
                        let kind = if is_mine[x][y] {
                            TileKind::Mine
                        } else {
                            let adj = neighbours(x, y, width, height)
                                .filter(|&(nx, ny)| is_mine[nx][ny])
                                .count();
                            TileKind::from_count(adj as u8)
                        };
                        Tile::new(kind, (x, y))
                    })
                    .collect()
            })
            .collect();
        Board {
            width,
            height,
            mine_count: mines.len(),
            grid,
            exploded: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn mine_count(&self) -> usize {
        self.mine_count
    }

    /// The mine that ended the game, if one was dug
    pub fn exploded(&self) -> Option<(usize, usize)> {
        self.exploded
    }

    pub fn tile(&self, x: usize, y: usize) -> Option<&Tile> {
        self.grid.get(x)?.get(y)
    }

    /// All tiles, column by column
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.grid.iter().flatten()
    }

    /// Tiles of row `y`, left to right
    pub fn row(&self, y: usize) -> impl Iterator<Item = &Tile> {
        self.grid.iter().filter_map(move |col| col.get(y))
    }

    pub fn flag_count(&self) -> usize {
        self.tiles().filter(|t| t.flagged).count()
    }

    /// Mine counter shown to the player, negative when over-flagged
    pub fn remaining_mines(&self) -> isize {
        self.mine_count() as isize - self.flag_count() as isize
    }

    fn check(&self, x: usize, y: usize) -> Result<()> {
        if x < self.width && y < self.height {
            Ok(())
        } else {
            Err(BoardError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Reveal the tile at (x, y), cascading through connected empty tiles
    /// and their bordering clues. Returns `Ok(false)` when a mine was dug.
    ///
    /// Flagged tiles are not protected here: callers must not dig a flagged,
    /// unrevealed tile.
    pub fn dig(&mut self, x: usize, y: usize) -> Result<bool> {
        self.check(x, y)?;
        if self.grid[x][y].kind.is_mine() {
            self.grid[x][y].reveal();
            self.exploded = Some((x, y));
            return Ok(false);
        }
        let (w, h) = (self.width, self.height);
        let mut stack = vec![(x, y)];
        let mut opened = 0usize;
        while let Some((cx, cy)) = stack.pop() {
            opened += 1;
            if self.grid[cx][cy].reveal() != TileKind::Empty {
                continue;
            }
            for (nx, ny) in neighbours(cx, cy, w, h) {
                // marked on push so a tile is never queued twice
                if !self.grid[nx][ny].revealed {
                    self.grid[nx][ny].reveal();
                    stack.push((nx, ny));
                }
            }
        }
        log::trace!("dig ({}, {}) opened {} tiles", x, y, opened);
        Ok(true)
    }

    /// Toggle the flag on an unrevealed tile and return the new flag state.
    /// Revealed tiles are left untouched.
    pub fn toggle_flag(&mut self, x: usize, y: usize) -> Result<bool> {
        self.check(x, y)?;
        let tile = &mut self.grid[x][y];
        if !tile.revealed {
            tile.flagged = !tile.flagged;
        }
        Ok(tile.flagged)
    }

    /// True once every non-mine tile is revealed; flags are irrelevant
    pub fn is_won(&self) -> bool {
        self.tiles().all(|t| t.kind.is_mine() || t.revealed)
    }

    /// Reveal up to `count` random numbered clues as a head start.
    /// No cascade is triggered. Returns how many tiles were revealed.
    pub fn pre_reveal<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> usize {
        let mut clues: Vec<(usize, usize)> = self
            .tiles()
            .filter(|t| !t.revealed && t.kind.clue().is_some_and(|n| n > 0))
            .map(|t| t.position)
            .collect();
        clues.shuffle(rng);
        let n = count.min(clues.len());
        for &(x, y) in &clues[..n] {
            self.grid[x][y].reveal();
        }
        n
    }

    /// Show every mine and mark flags that were placed on safe tiles
    pub fn reveal_for_loss(&mut self) {
        for tile in self.grid.iter_mut().flatten() {
            if tile.kind.is_mine() {
                tile.reveal();
            } else if tile.flagged {
                tile.reveal();
                tile.misflagged = true;
            }
        }
    }

    /// Flag every tile still hidden, used once the board is won
    pub fn flag_unrevealed(&mut self) {
        for tile in self.grid.iter_mut().flatten() {
            if !tile.revealed {
                tile.flagged = true;
            }
        }
    }
}

fn cell_count(width: usize, height: usize) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(BoardError::EmptyBoard);
    }
    width
        .checked_mul(height)
        .ok_or(BoardError::TooLarge { width, height })
}

/// Moore neighbourhood of (x, y), clipped to the board edges
fn neighbours(
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> impl Iterator<Item = (usize, usize)> {
    (x.saturating_sub(1)..=(x + 1).min(width - 1))
        .flat_map(move |nx| (y.saturating_sub(1)..=(y + 1).min(height - 1)).map(move |ny| (nx, ny)))
        .filter(move |&p| p != (x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use std::collections::{HashSet, VecDeque};

    fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn revealed(board: &Board) -> Vec<(usize, usize)> {
        let mut v: Vec<_> = board
            .tiles()
            .filter(|t| t.revealed())
            .map(|t| t.position())
            .collect();
        v.sort();
        v
    }

    #[test]
    fn generated_board_has_requested_mines() {
        for (seed, (w, h, n)) in [(9, 9, 10), (16, 16, 40), (30, 16, 99), (4, 3, 11)]
            .into_iter()
            .enumerate()
        {
            let board = Board::with_rng(w, h, n, &mut seeded(seed as u64)).unwrap();
            assert_eq!(board.tiles().filter(|t| t.kind().is_mine()).count(), n);
            assert_eq!(board.mine_count(), n);
            assert_eq!(board.tiles().count(), w * h);
        }
    }

    #[test]
    fn clues_match_adjacent_mines() {
        let board = Board::with_rng(16, 16, 40, &mut seeded(7)).unwrap();
        for tile in board.tiles() {
            let (x, y) = tile.position();
            let Some(clue) = tile.kind().clue() else {
                continue;
            };
            let mines = neighbours(x, y, 16, 16)
                .filter(|&(nx, ny)| board.tile(nx, ny).unwrap().kind().is_mine())
                .count();
            assert_eq!(clue as usize, mines, "tile ({}, {})", x, y);
        }
    }

    #[test]
    fn corner_has_three_neighbours() {
        assert_eq!(neighbours(0, 0, 5, 5).count(), 3);
        assert_eq!(neighbours(4, 2, 5, 5).count(), 5);
        assert_eq!(neighbours(2, 2, 5, 5).count(), 8);
        assert_eq!(neighbours(0, 0, 1, 1).count(), 0);
    }

    #[test]
    fn construction_rejects_bad_parameters() {
        assert_eq!(
            Board::new(3, 3, 9).unwrap_err(),
            BoardError::TooManyMines { mines: 9, cells: 9 }
        );
        assert_eq!(Board::new(0, 3, 0).unwrap_err(), BoardError::EmptyBoard);
        assert!(Board::new(3, 3, 8).is_ok());
        assert_eq!(
            Board::from_mines(3, 3, &[(1, 1), (1, 1)]).unwrap_err(),
            BoardError::DuplicateMine { x: 1, y: 1 }
        );
        assert!(matches!(
            Board::from_mines(3, 3, &[(3, 0)]),
            Err(BoardError::OutOfBounds { x: 3, y: 0, .. })
        ));
    }

    #[test]
    fn duplicates_are_reported_before_the_mine_count() {
        assert_eq!(
            Board::from_mines(2, 1, &[(0, 0), (0, 0)]).unwrap_err(),
            BoardError::DuplicateMine { x: 0, y: 0 }
        );
        assert_eq!(
            Board::from_mines(2, 1, &[(0, 0), (1, 0)]).unwrap_err(),
            BoardError::TooManyMines { mines: 2, cells: 2 }
        );
    }

    #[test]
    fn huge_dimensions_do_not_overflow() {
        assert_eq!(
            Board::new(usize::MAX, 2, 0).unwrap_err(),
            BoardError::TooLarge {
                width: usize::MAX,
                height: 2
            }
        );
        assert!(matches!(
            Board::from_mines(2, usize::MAX, &[]),
            Err(BoardError::TooLarge { .. })
        ));
    }

    #[test]
    fn single_centre_mine_gives_ones_and_no_cascade() {
        let mut board = Board::from_mines(3, 3, &[(1, 1)]).unwrap();
        for tile in board.tiles().filter(|t| t.position() != (1, 1)) {
            assert_eq!(tile.kind(), TileKind::Clue(1));
        }
        assert!(board.dig(0, 0).unwrap());
        assert_eq!(revealed(&board), vec![(0, 0)]);
    }

    #[test]
    fn mine_free_board_opens_fully_in_one_dig() {
        let mut board = Board::from_mines(5, 5, &[]).unwrap();
        assert!(!board.is_won());
        assert!(board.dig(3, 1).unwrap());
        assert_eq!(revealed(&board).len(), 25);
        assert!(board.is_won());
    }

    #[test]
    fn digging_a_mine_reveals_only_the_mine() {
        let mut board = Board::from_mines(4, 4, &[(2, 2), (0, 3)]).unwrap();
        assert!(!board.dig(2, 2).unwrap());
        assert_eq!(revealed(&board), vec![(2, 2)]);
        assert_eq!(board.exploded(), Some((2, 2)));
    }

    #[test]
    fn cascade_stops_at_bordering_clues() {
        // wall of mines down column 2
        let wall: Vec<_> = (0..5).map(|y| (2, y)).collect();
        let mut board = Board::from_mines(5, 5, &wall).unwrap();
        board.toggle_flag(0, 4).unwrap();
        assert!(board.dig(0, 0).unwrap());
        let expected: Vec<_> = (0..2).flat_map(|x| (0..5).map(move |y| (x, y))).collect();
        assert_eq!(revealed(&board), expected);
        // flags inside the cascade are cleared
        assert!(!board.tile(0, 4).unwrap().flagged());
        assert!(!board.is_won());
    }

    #[test]
    fn redigging_a_revealed_tile_is_harmless() {
        let mut board = Board::from_mines(4, 4, &[(3, 3)]).unwrap();
        assert!(board.dig(0, 0).unwrap());
        let before = revealed(&board);
        assert!(board.dig(0, 0).unwrap());
        assert_eq!(revealed(&board), before);
        assert!(board.is_won());
    }

    #[test]
    fn out_of_bounds_is_reported() {
        let mut board = Board::from_mines(3, 2, &[]).unwrap();
        assert_eq!(
            board.dig(3, 0).unwrap_err(),
            BoardError::OutOfBounds {
                x: 3,
                y: 0,
                width: 3,
                height: 2
            }
        );
        assert!(board.toggle_flag(0, 2).is_err());
        assert!(board.tile(5, 5).is_none());
    }

    #[test]
    fn flag_toggles_only_hidden_tiles() {
        let mut board = Board::from_mines(3, 3, &[(1, 1)]).unwrap();
        assert!(board.toggle_flag(2, 2).unwrap());
        assert!(!board.toggle_flag(2, 2).unwrap());
        assert!(!board.tile(2, 2).unwrap().flagged());

        board.dig(0, 0).unwrap();
        assert!(!board.toggle_flag(0, 0).unwrap());
        assert!(!board.tile(0, 0).unwrap().flagged());
        assert_eq!(board.flag_count(), 0);

        board.toggle_flag(1, 1).unwrap();
        board.toggle_flag(0, 1).unwrap();
        assert_eq!(board.remaining_mines(), -1);
    }

    #[test]
    fn win_ignores_flags() {
        let mut board = Board::from_mines(2, 2, &[(0, 0)]).unwrap();
        board.toggle_flag(1, 1).unwrap();
        board.dig(1, 0).unwrap();
        board.dig(0, 1).unwrap();
        assert!(!board.is_won());
        board.dig(1, 1).unwrap();
        assert!(board.is_won());
        assert!(!board.tile(0, 0).unwrap().flagged());
    }

    #[test]
    fn pre_reveal_picks_numbered_clues_only() {
        let mut board = Board::with_rng(9, 9, 10, &mut seeded(3)).unwrap();
        let clues = board
            .tiles()
            .filter(|t| matches!(t.kind(), TileKind::Clue(_)))
            .count();
        assert_eq!(board.pre_reveal(5, &mut seeded(4)), 5usize.min(clues));
        for tile in board.tiles().filter(|t| t.revealed()) {
            assert!(matches!(tile.kind(), TileKind::Clue(_)));
        }

        let mut board = Board::from_mines(3, 3, &[(1, 1)]).unwrap();
        assert_eq!(board.pre_reveal(20, &mut seeded(5)), 8);
        assert!(board.is_won());
    }

    #[test]
    fn loss_reveals_mines_and_marks_wrong_flags() {
        let mut board = Board::from_mines(3, 3, &[(0, 0), (2, 2)]).unwrap();
        board.toggle_flag(2, 2).unwrap();
        board.toggle_flag(1, 0).unwrap();
        assert!(!board.dig(0, 0).unwrap());
        board.reveal_for_loss();

        let wrong = board.tile(1, 0).unwrap();
        assert!(wrong.revealed() && wrong.misflagged() && !wrong.flagged());
        assert!(board.tile(2, 2).unwrap().revealed());
        assert!(!board.tile(2, 2).unwrap().misflagged());
        assert!(!board.tile(1, 1).unwrap().revealed());
    }

    #[test]
    fn flag_unrevealed_covers_hidden_tiles() {
        let mut board = Board::from_mines(3, 3, &[(2, 2)]).unwrap();
        board.dig(0, 0).unwrap();
        board.flag_unrevealed();
        assert!(board.tile(2, 2).unwrap().flagged());
        assert_eq!(board.flag_count(), 1);
    }

    /// Tiles one dig should open, found by breadth-first search over the
    /// public tile view
    fn expected_opening(board: &Board, start: (usize, usize)) -> HashSet<(usize, usize)> {
        let (w, h) = (board.width(), board.height());
        let mut seen = HashSet::from([start]);
        if board.tile(start.0, start.1).unwrap().kind().is_mine() {
            return seen;
        }
        let mut queue = VecDeque::from([start]);
        while let Some((x, y)) = queue.pop_front() {
            if board.tile(x, y).unwrap().kind() != TileKind::Empty {
                continue;
            }
            for dx in -1i64..=1 {
                for dy in -1i64..=1 {
                    let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let p = (nx as usize, ny as usize);
                    if seen.insert(p) {
                        queue.push_back(p);
                    }
                }
            }
        }
        seen
    }

    #[test]
    fn dig_matches_breadth_first_search_on_random_boards() {
        let mut rng = seeded(2024);
        for _ in 0..300 {
            let (w, h) = (rng.gen_range(1..=12), rng.gen_range(1..=12));
            let mines = rng.gen_range(0..w * h);
            let board = Board::with_rng(w, h, mines, &mut rng).unwrap();
            for start in board.tiles().map(|t| t.position()) {
                let mut dug = board.clone();
                let safe = dug.dig(start.0, start.1).unwrap();
                let opened: HashSet<_> = dug
                    .tiles()
                    .filter(|t| t.revealed())
                    .map(|t| t.position())
                    .collect();
                assert_eq!(safe, !board.tile(start.0, start.1).unwrap().kind().is_mine());
                assert_eq!(opened, expected_opening(&board, start), "{}x{} dig {:?}", w, h, start);
            }
        }
    }
}
