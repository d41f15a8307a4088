use std::sync::OnceLock;

use ratatui::style::Color;
use term_color_support::ColorSupport;

/// (truecolor, 256-color) support, detected once per run
fn support() -> (bool, bool) {
    static SUPPORT: OnceLock<(bool, bool)> = OnceLock::new();
    *SUPPORT.get_or_init(|| {
        let s = ColorSupport::stdout();
        (s.has_16m, s.has_256)
    })
}

/// Map the basic ANSI colors onto one fixed palette so the board looks the
/// same whatever theme the terminal ships with.
pub trait Themed {
    fn themed(self) -> Color;
}

impl Themed for Color {
    fn themed(self) -> Color {
        // ((R, G, B), ANSI_256_Index)
        let mapping = match self {
            Color::Black => Some(((12, 12, 12), 232)),
            Color::Red => Some(((197, 15, 31), 160)),
            Color::Green => Some(((19, 161, 14), 28)),
            Color::Yellow => Some(((193, 156, 0), 178)),
            Color::Blue => Some(((0, 55, 218), 20)),
            Color::Magenta => Some(((136, 23, 152), 90)),
            Color::Cyan => Some(((58, 150, 221), 38)),
            Color::Gray => Some(((204, 204, 204), 250)),
            Color::DarkGray => Some(((118, 118, 118), 243)),
            Color::LightRed => Some(((231, 72, 86), 203)),
            Color::LightGreen => Some(((22, 198, 12), 46)),
            Color::LightBlue => Some(((59, 120, 255), 63)),
            Color::White => Some(((242, 242, 242), 255)),
            _ => None,
        };

        match mapping {
            Some(((r, g, b), index256)) => {
                let (has_16m, has_256) = support();
                if has_16m {
                    Color::Rgb(r, g, b)
                } else if has_256 {
                    Color::Indexed(index256)
                } else {
                    self
                }
            }
            None => self,
        }
    }
}

/// Classic clue colors: 1 blue, 2 green, 3 red, 4 navy, 5 maroon, 6 teal, 7 black, 8 dark gray
pub fn clue_color(count: u8) -> Color {
    match count {
        1 => Color::LightBlue.themed(),
        2 => Color::Green.themed(),
        3 => Color::LightRed.themed(),
        4 => Color::Blue.themed(),
        5 => Color::Red.themed(),
        6 => Color::Cyan.themed(),
        7 => Color::Black.themed(),
        _ => Color::DarkGray.themed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn same_family(themed: Color, base: Color) -> bool {
        themed == base || matches!(themed, Color::Rgb(..) | Color::Indexed(_))
    }

    #[test]
    fn basic_colors_map_to_one_palette_entry() {
        let (has_16m, has_256) = support();
        let red = Color::Red.themed();
        if has_16m {
            assert_eq!(red, Color::Rgb(197, 15, 31));
        } else if has_256 {
            assert_eq!(red, Color::Indexed(160));
        } else {
            assert_eq!(red, Color::Red);
        }
        // colors outside the table pass through
        assert_eq!(Color::Rgb(1, 2, 3).themed(), Color::Rgb(1, 2, 3));
        assert_eq!(Color::Reset.themed(), Color::Reset);
    }

    #[test]
    fn every_clue_count_has_a_distinct_color() {
        let colors: Vec<Color> = (1..=8).map(clue_color).collect();
        assert!(same_family(colors[0], Color::LightBlue));
        assert!(same_family(colors[7], Color::DarkGray));
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
