use std::{
    env, fs,
    path::PathBuf,
    process::Command,
    time::{SystemTime, UNIX_EPOCH},
};

use crossterm::{
    cursor::MoveTo,
    terminal::{
        Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
        enable_raw_mode,
    },
};
use ratatui::{buffer::Buffer, layout::Rect, style::Color};

pub fn fill_bg(buf: &mut Buffer, area: Rect, color: Color) {
    for x in area.left()..area.right() {
        for y in area.top()..area.bottom() {
            buf[(x, y)].set_bg(color);
        }
    }
}

pub fn pad<S: AsRef<str>>(s: S, pad: usize) -> String {
    let padding = " ".repeat(pad);
    format!("{padding}{}{padding}", s.as_ref())
}

/// A rectangle of `width` x `height` centered in `area`, clamped to fit.
pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Hand `initial` to `$EDITOR` in a temporary file and return what was saved.
///
/// The terminal leaves raw mode and the alternate screen while the editor runs.
/// Callers must request a full redraw afterwards.
pub fn edit_in_external_editor(initial: &str, extension: &str) -> Result<String, String> {
    let editor = env::var("EDITOR").map_err(|_| "EDITOR is not set".to_string())?;
    let temp_path = temp_path(extension);
    fs::write(&temp_path, initial).map_err(|err| err.to_string())?;

    disable_raw_mode().map_err(|err| err.to_string())?;
    crossterm::execute!(std::io::stdout(), LeaveAlternateScreen).map_err(|err| err.to_string())?;

    let command = format!("{editor} \"{}\"", temp_path.display());
    let status = Command::new("sh").arg("-c").arg(command).status();

    crossterm::execute!(
        std::io::stdout(),
        EnterAlternateScreen,
        Clear(ClearType::All),
        MoveTo(0, 0)
    )
    .map_err(|err| err.to_string())?;
    enable_raw_mode().map_err(|err| err.to_string())?;

    let status = status.map_err(|err| err.to_string())?;
    let contents = fs::read_to_string(&temp_path).map_err(|err| err.to_string());
    let _ = fs::remove_file(&temp_path);
    if !status.success() {
        return Err("Editor exited with a non-zero status".to_string());
    }
    contents
}

fn temp_path(extension: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or_default();
    env::temp_dir().join(format!("mongomate-edit-{nanos}.{extension}"))
}
