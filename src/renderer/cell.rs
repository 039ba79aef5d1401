/// Represents a 24-bit RGB color
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct RgbColor(pub u8, pub u8, pub u8);

/// One terminal cell: upper half-block with the top pixel as foreground and
/// the bottom pixel as background.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct CellData {
    pub char: char,
    pub fg: RgbColor,
    pub bg: RgbColor,
}

impl Default for CellData {
    fn default() -> Self {
        Self {
            char: ' ',
            fg: RgbColor::default(),
            bg: RgbColor::default(),
        }
    }
}
