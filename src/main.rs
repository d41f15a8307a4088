// Entry point for the terminal Minesweeper
// Loads configuration, starts logging and hands a fresh session to the UI

use log::LevelFilter;
use std::error::Error;

mod tsd_board; // Tiles, mine placement, digging and flags
mod tsd_color; // Terminal palette matching
mod tsd_error; // Board error kinds
mod tsd_game;  // Session, difficulty presets and configuration
mod tsd_log;   // File logger
mod tsd_ui;    // Terminal UI rendering and event handling

use tsd_game::{load_or_create_config, save_config, GameSession};

fn main() -> Result<(), Box<dyn Error>> {
    // Log config problems too; the configured level applies once it is read
    tsd_log::init(LevelFilter::Info);
    let cfg = load_or_create_config();
    log::set_max_level(cfg.level());
    log::info!("starting {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let mut session = GameSession::new(cfg);
    let result = tsd_ui::run(&mut session);

    // Remember the last chosen difficulty
    save_config(session.config());
    if let Err(e) = &result {
        log::error!("terminal error: {}", e);
    }
    log::logger().flush();
    result
}
