// Color themes. A theme is just a name for one of two fixed palettes of
// 24-bit colors; nothing else in the program depends on which is active.

use crossterm::style::Color;

const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Fire,
    /// Grayscale.
    Stealth,
}

impl Theme {
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Fire => Theme::Stealth,
            Theme::Stealth => Theme::Fire,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Theme::Fire => "FIRE",
            Theme::Stealth => "STEALTH",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Theme::Fire => Palette::fire(),
            Theme::Stealth => Palette::stealth(),
        }
    }
}

/// Gradient colors (top to bottom of the banner) plus the three roles the
/// screen uses for borders, badges and body text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub gradient: [Color; 6],
    pub border: Color,
    pub badge: Color,
    pub text: Color,
}

impl Palette {
    pub fn fire() -> Self {
        let gradient = [
            rgb(255, 0, 0),
            rgb(255, 51, 0),
            rgb(255, 102, 0),
            rgb(255, 153, 0),
            rgb(255, 204, 0),
            rgb(255, 255, 0),
        ];
        Palette {
            gradient,
            border: gradient[4],
            badge: gradient[1],
            text: gradient[2],
        }
    }

    pub fn stealth() -> Self {
        let gradient = [
            rgb(220, 220, 220),
            rgb(200, 200, 200),
            rgb(180, 180, 180),
            rgb(160, 160, 160),
            rgb(140, 140, 140),
            rgb(120, 120, 120),
        ];
        Palette {
            gradient,
            border: gradient[4],
            badge: gradient[3],
            text: gradient[2],
        }
    }

    /// Color for errors and warnings.
    pub fn alert(&self) -> Color {
        self.gradient[0]
    }

    /// Color for success lines and highlights.
    pub fn accent(&self) -> Color {
        self.gradient[4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_twice_restores_the_palette() {
        for start in [Theme::Fire, Theme::Stealth] {
            let back = start.toggled().toggled();
            assert_eq!(back, start);
            assert_eq!(back.palette(), start.palette());
            assert_ne!(start.toggled().palette(), start.palette());
        }
    }

    #[test]
    fn roles_pick_from_the_gradient() {
        let fire = Palette::fire();
        assert_eq!(fire.border, rgb(255, 204, 0));
        assert_eq!(fire.badge, rgb(255, 51, 0));
        assert_eq!(fire.text, rgb(255, 102, 0));

        let stealth = Palette::stealth();
        assert_eq!(stealth.badge, rgb(160, 160, 160));
        assert_eq!(Theme::Stealth.name(), "STEALTH");
    }
}
