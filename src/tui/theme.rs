use std::collections::HashMap;

use crossterm::style::Color;

use crate::config::UiConfig;
use crate::model::TaskStatus;

/// Parsed color theme for the grid and kanban views.
#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Color,
    pub text: Color,
    pub text_bright: Color,
    pub dim: Color,
    pub header: Color,
    pub highlight: Color,
    pub selection_bg: Color,
    pub multi_mark: Color,
    pub edit_bg: Color,
    pub error: Color,
    pub warning: Color,
    pub success: Color,
    pub accent: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            background: Color::Rgb { r: 0x10, g: 0x10, b: 0x18 },
            text: Color::Rgb { r: 0xC8, g: 0xC8, b: 0xD8 },
            text_bright: Color::Rgb { r: 0xFF, g: 0xFF, b: 0xFF },
            dim: Color::Rgb { r: 0x70, g: 0x70, b: 0x88 },
            header: Color::Rgb { r: 0x8A, g: 0xB4, b: 0xF8 },
            highlight: Color::Rgb { r: 0xF8, g: 0x6A, b: 0xB4 },
            selection_bg: Color::Rgb { r: 0x2E, g: 0x2E, b: 0x48 },
            multi_mark: Color::Rgb { r: 0xF8, g: 0xB4, b: 0x4A },
            edit_bg: Color::Rgb { r: 0x3A, g: 0x3A, b: 0x20 },
            error: Color::Rgb { r: 0xFF, g: 0x55, b: 0x55 },
            warning: Color::Rgb { r: 0xF8, g: 0xD0, b: 0x4A },
            success: Color::Rgb { r: 0x50, g: 0xE0, b: 0x90 },
            accent: Color::Rgb { r: 0x60, g: 0xC8, b: 0xF0 },
        }
    }
}

/// Parse a hex color string like "#FF4444" into an RGB color.
fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb { r, g, b })
}

impl Theme {
    /// Build a theme from `[ui.colors]` overrides, falling back to defaults.
    pub fn from_config(ui: &UiConfig) -> Theme {
        let mut theme = Theme::default();
        for (key, value) in &ui.colors {
            if let Some(color) = parse_hex_color(value) {
                match key.as_str() {
                    "background" => theme.background = color,
                    "text" => theme.text = color,
                    "text_bright" => theme.text_bright = color,
                    "dim" => theme.dim = color,
                    "header" => theme.header = color,
                    "highlight" => theme.highlight = color,
                    "selection_bg" => theme.selection_bg = color,
                    "multi_mark" => theme.multi_mark = color,
                    "edit_bg" => theme.edit_bg = color,
                    "error" => theme.error = color,
                    "warning" => theme.warning = color,
                    "success" => theme.success = color,
                    "accent" => theme.accent = color,
                    _ => {}
                }
            }
        }
        theme
    }

    /// Color for a priority value (1 hottest).
    pub fn priority_color(&self, priority: u8) -> Color {
        match priority {
            1 => self.error,
            2 => self.warning,
            _ => self.text,
        }
    }

    pub fn status_color(&self, status: TaskStatus) -> Color {
        match status {
            TaskStatus::Todo => self.text,
            TaskStatus::Doing => self.highlight,
            TaskStatus::Done => self.success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(
            parse_hex_color("#FF4444"),
            Some(Color::Rgb { r: 0xFF, g: 0x44, b: 0x44 })
        );
        assert_eq!(parse_hex_color("FF4444"), None); // missing #
        assert_eq!(parse_hex_color("#FFF"), None); // too short
        assert_eq!(parse_hex_color("#GGGGGG"), None); // not hex
    }

    #[test]
    fn test_from_config_overrides() {
        let mut ui = UiConfig::default();
        ui.colors.insert("highlight".into(), "#112233".into());
        ui.colors.insert("nonsense".into(), "#445566".into());
        let theme = Theme::from_config(&ui);
        assert_eq!(theme.highlight, Color::Rgb { r: 0x11, g: 0x22, b: 0x33 });
        // Untouched slot keeps its default
        assert_eq!(theme.text, Theme::default().text);
    }

    #[test]
    fn test_priority_colors_distinct() {
        let theme = Theme::default();
        assert_ne!(theme.priority_color(1), theme.priority_color(3));
    }
}
