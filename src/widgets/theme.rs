use std::{env, sync::OnceLock, time::Duration};

use ratatui::style::Color;

const LUMA_THRESHOLD: f32 = 0.6;
// A single luma read right after startup can be noisy; use the median of a few.
const LUMA_SAMPLES: usize = 5;
const LUMA_SAMPLE_DELAY: Duration = Duration::from_millis(20);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeChoice {
    Light,
    Dark,
}

impl ThemeChoice {
    /// Value of `MONGOMATE_THEME`, case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("light") {
            Some(Self::Light)
        } else if value.eq_ignore_ascii_case("dark") {
            Some(Self::Dark)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy)]
pub struct Theme {
    bg: Color,
    panel_bg: Color,
    panel_bg_alt: Color,
    text: Color,
    text_muted: Color,
    accent: Color,
    accent_alt: Color,
    border: Color,
    selection_bg: Color,
    selection_fg: Color,
    column_bg: Color,
    success: Color,
    warning: Color,
    error: Color,
}

impl Theme {
    pub fn detect() -> Self {
        static THEME: OnceLock<Theme> = OnceLock::new();
        *THEME.get_or_init(|| {
            let choice = env::var("MONGOMATE_THEME")
                .ok()
                .and_then(|value| ThemeChoice::parse(&value));
            match choice {
                Some(ThemeChoice::Light) => Self::light(),
                Some(ThemeChoice::Dark) => Self::dark(),
                None => match detect_terminal_luma() {
                    Some(luma) if luma > LUMA_THRESHOLD => Self::light(),
                    _ => Self::dark(),
                },
            }
        })
    }

    pub fn dark() -> Self {
        Self {
            bg: Color::Rgb(13, 17, 16),
            panel_bg: Color::Rgb(18, 24, 22),
            panel_bg_alt: Color::Rgb(23, 30, 28),
            text: Color::Rgb(228, 236, 232),
            text_muted: Color::Rgb(150, 164, 158),
            accent: Color::Rgb(0, 237, 100),
            accent_alt: Color::Rgb(242, 177, 110),
            border: Color::Rgb(62, 78, 72),
            selection_bg: Color::Rgb(30, 58, 46),
            selection_fg: Color::Rgb(228, 236, 232),
            column_bg: Color::Rgb(26, 40, 34),
            success: Color::Rgb(158, 206, 106),
            warning: Color::Rgb(224, 175, 104),
            error: Color::Rgb(247, 118, 142),
        }
    }

    pub fn light() -> Self {
        Self {
            bg: Color::Rgb(247, 248, 246),
            panel_bg: Color::Rgb(255, 255, 255),
            panel_bg_alt: Color::Rgb(240, 243, 241),
            text: Color::Rgb(28, 36, 32),
            text_muted: Color::Rgb(88, 100, 94),
            accent: Color::Rgb(0, 104, 74),
            accent_alt: Color::Rgb(180, 83, 9),
            border: Color::Rgb(156, 168, 162),
            selection_bg: Color::Rgb(209, 240, 222),
            selection_fg: Color::Rgb(15, 30, 22),
            column_bg: Color::Rgb(228, 242, 234),
            success: Color::Rgb(47, 158, 68),
            warning: Color::Rgb(180, 83, 9),
            error: Color::Rgb(217, 72, 15),
        }
    }

    pub fn bg(&self) -> Color {
        self.bg
    }

    pub fn panel_bg(&self) -> Color {
        self.panel_bg
    }

    pub fn panel_bg_alt(&self) -> Color {
        self.panel_bg_alt
    }

    pub fn text(&self) -> Color {
        self.text
    }

    pub fn text_muted(&self) -> Color {
        self.text_muted
    }

    pub fn accent(&self) -> Color {
        self.accent
    }

    pub fn accent_alt(&self) -> Color {
        self.accent_alt
    }

    pub fn border(&self) -> Color {
        self.border
    }

    pub fn selection_bg(&self) -> Color {
        self.selection_bg
    }

    pub fn selection_fg(&self) -> Color {
        self.selection_fg
    }

    /// Background of the column under the cursor.
    pub fn column_bg(&self) -> Color {
        self.column_bg
    }

    pub fn success(&self) -> Color {
        self.success
    }

    pub fn warning(&self) -> Color {
        self.warning
    }

    pub fn error(&self) -> Color {
        self.error
    }
}

fn detect_terminal_luma() -> Option<f32> {
    let mut samples = Vec::with_capacity(LUMA_SAMPLES);
    for attempt in 0..LUMA_SAMPLES {
        if let Ok(luma) = terminal_light::luma()
            && luma.is_finite()
        {
            samples.push(luma);
        }
        if attempt + 1 < LUMA_SAMPLES {
            std::thread::sleep(LUMA_SAMPLE_DELAY);
        }
    }

    if samples.is_empty() {
        return None;
    }

    Some(median_luma(&mut samples))
}

fn median_luma(samples: &mut [f32]) -> f32 {
    samples.sort_by(|a, b| a.total_cmp(b));
    let mid = samples.len() / 2;
    if samples.len().is_multiple_of(2) {
        (samples[mid - 1] + samples[mid]) / 2.0
    } else {
        samples[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_sample_count() {
        let mut samples = [0.9_f32, 0.4, 0.2];
        assert!((median_luma(&mut samples) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn median_of_even_sample_count() {
        let mut samples = [0.2_f32, 0.8, 0.4, 0.6];
        assert!((median_luma(&mut samples) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn theme_choice_ignores_case() {
        assert_eq!(ThemeChoice::parse("LIGHT"), Some(ThemeChoice::Light));
        assert_eq!(ThemeChoice::parse("dark"), Some(ThemeChoice::Dark));
        assert_eq!(ThemeChoice::parse("solarized"), None);
    }
}
