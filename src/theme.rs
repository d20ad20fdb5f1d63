//! Theme colors, with optional overrides from the config file

use ratatui::style::Color;

use crate::config::ThemeOverrides;

/// Theme colors for the UI
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub accent: Color,      // Active borders, key hints
    pub danger: Color,      // Error lines
    pub success: Color,     // Stat values
    pub warning: Color,     // Status messages, pending request
    pub text: Color,        // Primary text
    pub text_dim: Color,    // Labels, secondary text
    pub inactive: Color,    // Inactive borders
    pub header: Color,      // Section headers
}

impl Default for Theme {
    fn default() -> Self {
        // Catppuccin-inspired colors
        Self {
            accent: Color::Rgb(250, 179, 135),
            danger: Color::Rgb(243, 139, 168),
            success: Color::Rgb(166, 218, 149),
            warning: Color::Rgb(250, 179, 135),
            text: Color::Rgb(205, 214, 244),
            text_dim: Color::Rgb(147, 153, 178),
            inactive: Color::Rgb(88, 91, 112),
            header: Color::Rgb(243, 139, 168),
        }
    }
}

impl Theme {
    /// Default theme with any valid overrides applied
    pub fn from_overrides(overrides: &ThemeOverrides) -> Self {
        let mut theme = Self::default();

        let pick = |value: &Option<String>, fallback: Color| {
            match value.as_deref() {
                Some(hex) => Self::parse_hex_color(hex).unwrap_or_else(|| {
                    tracing::warn!("Ignoring invalid theme color: {}", hex);
                    fallback
                }),
                None => fallback,
            }
        };

        theme.accent = pick(&overrides.accent, theme.accent);
        theme.danger = pick(&overrides.danger, theme.danger);
        theme.text = pick(&overrides.text, theme.text);
        theme.text_dim = pick(&overrides.text_dim, theme.text_dim);
        theme.header = theme.danger;

        theme
    }

    /// Parse a hex color string (#RRGGBB or #RGB)
    fn parse_hex_color(s: &str) -> Option<Color> {
        let s = s.trim().trim_start_matches('#');
        if !s.is_ascii() {
            return None;
        }

        if s.len() == 6 {
            let r = u8::from_str_radix(&s[0..2], 16).ok()?;
            let g = u8::from_str_radix(&s[2..4], 16).ok()?;
            let b = u8::from_str_radix(&s[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        } else if s.len() == 3 {
            let r = u8::from_str_radix(&s[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&s[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&s[2..3], 16).ok()? * 17;
            Some(Color::Rgb(r, g, b))
        } else {
            None
        }
    }
}
