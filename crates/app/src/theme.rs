use colored::Color;
use comfy_table::presets::UTF8_FULL_CONDENSED;

/// Colours and glyphs for the terminal. Built once at startup and passed by
/// reference; never mutated.
#[derive(Debug, Clone)]
pub struct Theme {
    pub affirmative: Color,
    pub negative: Color,
    pub heading: Color,
    pub muted: Color,
    pub affirmative_glyph: &'static str,
    pub negative_glyph: &'static str,
    pub prompt: &'static str,
    pub table_preset: &'static str,
}

impl Theme {
    pub fn standard() -> Self {
        Self {
            affirmative: Color::Green,
            negative: Color::Red,
            heading: Color::Cyan,
            muted: Color::BrightBlack,
            affirmative_glyph: "✔",
            negative_glyph: "✘",
            prompt: "desk> ",
            table_preset: UTF8_FULL_CONDENSED,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::standard()
    }
}
