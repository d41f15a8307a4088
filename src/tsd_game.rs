// Game session, difficulty presets and configuration persistence
// The session owns the board and the screen state; the UI only reads it

use directories::ProjectDirs;
use log::LevelFilter;
use rand::thread_rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use crate::tsd_board::Board;
use crate::tsd_error::Result;

/// Pre-reveal count used when no difficulty has been chosen
pub const DEFAULT_PRE_REVEAL: usize = 3;

pub const MAX_WIDTH: usize = 64;
pub const MAX_HEIGHT: usize = 32;

/// Difficulty presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Serialize for Difficulty {
    /// Serialize difficulty as a human-readable string
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Config file identifier, also used as the on-screen label
    pub fn name(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn from_name(s: &str) -> Option<Difficulty> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
    }

    /// Number of clue tiles revealed before play starts
    pub fn pre_reveal(&self) -> usize {
        match self {
            Difficulty::Easy => 20,
            Difficulty::Medium => 10,
            Difficulty::Hard => 3,
        }
    }
}

/// Head start for an optional mode, falling back to the hardest count
pub fn pre_reveal_for(mode: Option<Difficulty>) -> usize {
    mode.map_or(DEFAULT_PRE_REVEAL, |d| d.pre_reveal())
}

/// Board dimensions and mine count for one difficulty
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub width: usize,
    pub height: usize,
    pub mines: usize,
}

impl Preset {
    pub const fn new(width: usize, height: usize, mines: usize) -> Self {
        Preset {
            width,
            height,
            mines,
        }
    }

    /// Clamp to something the terminal can draw and the board can hold
    pub fn sanitized(self) -> Preset {
        let width = self.width.clamp(1, MAX_WIDTH);
        let height = self.height.clamp(1, MAX_HEIGHT);
        let max_mines = width * height - 1;
        if width != self.width || height != self.height {
            log::warn!(
                "preset {}x{} clamped to {}x{}",
                self.width,
                self.height,
                width,
                height
            );
        }
        let mines = if self.mines > max_mines {
            log::warn!("{} mines do not fit {}x{}, using {}", self.mines, width, height, max_mines);
            max_mines
        } else {
            self.mines
        };
        Preset::new(width, height, mines)
    }
}

/// User configuration, persisted as TOML
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    // Last chosen difficulty, highlighted in the menu
    #[serde(
        deserialize_with = "lenient_difficulty",
        skip_serializing_if = "Option::is_none"
    )]
    pub difficulty: Option<Difficulty>,
    pub ascii_icons: bool, // Use ASCII fallback glyphs
    pub log_level: String, // off, error, warn, info, debug, trace
    pub easy: Preset,
    pub medium: Preset,
    pub hard: Preset,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            difficulty: None,
            ascii_icons: false,
            log_level: "info".to_string(),
            easy: Preset::new(9, 9, 10),
            medium: Preset::new(16, 16, 40),
            hard: Preset::new(30, 16, 99),
        }
    }
}

/// Unknown names leave the mode unset instead of rejecting the whole file
fn lenient_difficulty<'de, D>(deserializer: D) -> std::result::Result<Option<Difficulty>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let d = Difficulty::from_name(&s);
    if d.is_none() {
        log::warn!("ignoring unknown difficulty {:?} in config", s);
    }
    Ok(d)
}

impl Config {
    pub fn preset(&self, d: Difficulty) -> Preset {
        match d {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
        .sanitized()
    }

    pub fn level(&self) -> LevelFilter {
        LevelFilter::from_str(self.log_level.trim()).unwrap_or(LevelFilter::Info)
    }
}

/// Which screen the session is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    Win,
    Lose,
}

/// One player's run of the program: config, current mode, board and screen
pub struct GameSession {
    config: Config,
    mode: Option<Difficulty>,
    board: Option<Board>,
    screen: Screen,
}

impl GameSession {
    pub fn new(config: Config) -> Self {
        GameSession {
            config,
            mode: None,
            board: None,
            screen: Screen::Menu,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn mode(&self) -> Option<Difficulty> {
        self.mode
    }

    /// Board of the current or just-finished game; None on the menu
    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    /// Pick a difficulty from the menu and start playing
    pub fn choose(&mut self, d: Difficulty) -> Result<()> {
        self.mode = Some(d);
        self.config.difficulty = Some(d);
        self.start()
    }

    /// Fresh board with the same mode, from the win or lose screen
    pub fn restart(&mut self) -> Result<()> {
        match self.screen {
            Screen::Win | Screen::Lose => self.start(),
            _ => Ok(()),
        }
    }

    pub fn to_menu(&mut self) {
        if matches!(self.screen, Screen::Win | Screen::Lose) {
            log::debug!("back to menu");
            self.board = None;
            self.screen = Screen::Menu;
        }
    }

    fn start(&mut self) -> Result<()> {
        let preset = self.config.preset(self.mode.unwrap_or(Difficulty::Hard));
        let mut board = Board::new(preset.width, preset.height, preset.mines)?;
        let shown = board.pre_reveal(pre_reveal_for(self.mode), &mut thread_rng());
        log::info!(
            "new {} game: {}x{}, {} mines, {} clues shown",
            self.mode.map_or("default", |d| d.name()),
            preset.width,
            preset.height,
            preset.mines,
            shown
        );
        self.board = Some(board);
        self.screen = Screen::Playing;
        Ok(())
    }

    /// Dig a tile while playing. Flagged tiles are never dug.
    pub fn dig(&mut self, x: usize, y: usize) -> Result<()> {
        if self.screen != Screen::Playing {
            return Ok(());
        }
        let Some(board) = self.board.as_mut() else {
            return Ok(());
        };
        if board.tile(x, y).is_some_and(|t| t.flagged()) {
            return Ok(());
        }
        if !board.dig(x, y)? {
            board.reveal_for_loss();
            log::info!("mine hit at ({}, {})", x, y);
            self.screen = Screen::Lose;
            return Ok(());
        }
        self.check_win();
        Ok(())
    }

    pub fn toggle_flag(&mut self, x: usize, y: usize) -> Result<()> {
        if self.screen != Screen::Playing {
            return Ok(());
        }
        if let Some(board) = self.board.as_mut() {
            board.toggle_flag(x, y)?;
        }
        self.check_win();
        Ok(())
    }

    fn check_win(&mut self) {
        if let Some(board) = self.board.as_mut() {
            if board.is_won() {
                board.flag_unrevealed();
                log::info!("board cleared");
                self.screen = Screen::Win;
            }
        }
    }
}

/// Path of a per-user file named after the executable, e.g.
/// ~/.config/tswdig/tswdig.toml on Linux.
/// Falls back to the current directory if no config dir is known.
pub fn project_file(ext: &str) -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let name = exe.file_stem()?.to_str()?.to_string();
    let mut path = match ProjectDirs::from("org", "tswdig", &name) {
        Some(proj) => proj.config_dir().to_path_buf(),
        None => env::current_dir().ok()?,
    };
    path.push(format!("{}.{}", name, ext));
    Some(path)
}

/// Load configuration from disk, or write the defaults if there is none
pub fn load_or_create_config() -> Config {
    let Some(path) = project_file("toml") else {
        return Config::default();
    };
    if path.exists() {
        match fs::read_to_string(&path) {
            Ok(s) => match toml::from_str::<Config>(&s) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!("{} is invalid, using defaults: {}", path.display(), e),
            },
            Err(e) => log::warn!("cannot read {}: {}", path.display(), e),
        }
        return Config::default();
    }
    let cfg = Config::default();
    save_config(&cfg);
    cfg
}

/// Save configuration to disk as TOML
pub fn save_config(cfg: &Config) {
    let Some(path) = project_file("toml") else {
        return;
    };
    let written = toml::to_string(cfg)
        .map_err(|e| e.to_string())
        .and_then(|s| {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            fs::write(&path, s).map_err(|e| e.to_string())
        });
    if let Err(e) = written {
        log::warn!("cannot save {}: {}", path.display(), e);
    }
}
