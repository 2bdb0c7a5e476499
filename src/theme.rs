//! Look of the terminal host: the editor pane, the text attributes of each
//! block kind, the status bar and the scrollbar.

use ratatui::style::{Color, Modifier, Style};

#[derive(Clone, Debug)]
pub struct Theme {
    /// Editor pane background
    pub pane_bg: Color,

    /// Status bar text and background
    pub status_fg: Color,
    pub status_bg: Color,

    /// File name in the status bar, followed by `*` when dirty
    pub file_name: Color,

    /// Selected characters
    pub selection_fg: Color,
    pub selection_bg: Color,

    /// Link text, drawn underlined
    pub link: Color,

    /// Code blocks and inline code
    pub code: Color,

    /// Rows that are not text: fences, rules, heading underlines
    pub decoration: Color,

    pub scrollbar_thumb: Color,
    pub scrollbar_track: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            pane_bg: Color::Reset,
            status_fg: Color::White,
            status_bg: Color::Blue,
            file_name: Color::LightYellow,
            selection_fg: Color::White,
            selection_bg: Color::LightBlue,
            link: Color::Blue,
            code: Color::Reset,
            decoration: Color::DarkGray,
            scrollbar_thumb: Color::Reset,
            scrollbar_track: Color::Reset,
        }
    }
}

impl Theme {
    pub fn pane_style(&self) -> Style {
        Style::default().bg(self.pane_bg)
    }

    pub fn status_style(&self) -> Style {
        Style::default().fg(self.status_fg).bg(self.status_bg)
    }

    pub fn file_name_style(&self) -> Style {
        Style::default().fg(self.file_name)
    }

    pub fn selection_style(&self) -> Style {
        Style::default().fg(self.selection_fg).bg(self.selection_bg)
    }

    /// Patched over the surrounding run style, so emphasis inside a link keeps
    /// its modifiers.
    pub fn link_style(&self) -> Style {
        Style::default().fg(self.link).add_modifier(Modifier::UNDERLINED)
    }

    pub fn heading_style(&self) -> Style {
        Style::default().add_modifier(Modifier::BOLD)
    }

    pub fn quote_style(&self) -> Style {
        Style::default().add_modifier(Modifier::ITALIC)
    }

    pub fn code_style(&self) -> Style {
        Style::default().fg(self.code).add_modifier(Modifier::DIM)
    }

    pub fn decoration_style(&self) -> Style {
        Style::default().fg(self.decoration)
    }

    pub fn scrollbar_thumb_style(&self) -> Style {
        Style::default().fg(self.scrollbar_thumb)
    }

    pub fn scrollbar_track_style(&self) -> Style {
        Style::default().fg(self.scrollbar_track)
    }
}
