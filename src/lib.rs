pub mod cursor;
pub mod document;
pub mod editor;
pub mod html;
pub mod markdown;
pub mod render;
pub mod theme;
