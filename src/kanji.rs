//! Kanji font ROM interface (JIS level 1 and 2 halves).
//!
//! Two independent 17-bit glyph addresses are latched through port pairs
//! 0xD8/0xD9 and 0xDA/0xDB; data reads auto-increment a 5-bit index inside
//! the 32-byte glyph. The second interface reads from the upper 128KB half.

use serde::{Deserialize, Serialize};

use crate::savestate::{ByteReader, ByteWriter};

const FONT_SIZE: usize = 0x40000;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct KanjiContext {
    pub address: [u32; 2],
    pub index: [u8; 2],
}

pub struct Kanji {
    pub ctx: KanjiContext,
    font: Vec<u8>,
}

impl Kanji {
    pub fn new() -> Self {
        Self { ctx: KanjiContext::default(), font: vec![0; FONT_SIZE] }
    }

    /// Oversized images are truncated to the 256KB the chip can address.
    pub fn load_font(&mut self, data: &[u8]) {
        let n = data.len().min(FONT_SIZE);
        self.font[..n].copy_from_slice(&data[..n]);
        if data.len() > FONT_SIZE {
            tracing::warn!("kanji font truncated from {} to {} bytes", data.len(), FONT_SIZE);
        }
    }

    pub fn reset(&mut self) {
        self.ctx = KanjiContext::default();
    }

    pub fn out_d8(&mut self, value: u8) {
        self.ctx.index[0] = 0;
        self.ctx.address[0] = (self.ctx.address[0] & 0x1f800) | ((value as u32) << 5);
    }

    pub fn out_d9(&mut self, value: u8) {
        self.ctx.index[0] = 0;
        self.ctx.address[0] = (self.ctx.address[0] & 0x007e0) | ((value as u32) << 11);
    }

    pub fn out_da(&mut self, value: u8) {
        self.ctx.index[1] = 0;
        self.ctx.address[1] = (self.ctx.address[1] & 0x1f800) | ((value as u32) << 5);
    }

    pub fn out_db(&mut self, value: u8) {
        self.ctx.index[1] = 0;
        self.ctx.address[1] = (self.ctx.address[1] & 0x007e0) | ((value as u32) << 11);
    }

    pub fn in_d9(&mut self) -> u8 {
        let addr = (self.ctx.address[0] + self.ctx.index[0] as u32) as usize;
        let result = self.font[addr & (FONT_SIZE - 1)];
        self.ctx.index[0] = (self.ctx.index[0] + 1) & 0x1f;
        result
    }

    pub fn in_db(&mut self) -> u8 {
        let addr = (0x20000 + self.ctx.address[1] + self.ctx.index[1] as u32) as usize;
        let result = self.font[addr & (FONT_SIZE - 1)];
        self.ctx.index[1] = (self.ctx.index[1] + 1) & 0x1f;
        result
    }

    pub fn context_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.u32(self.ctx.address[0]);
        w.u32(self.ctx.address[1]);
        w.u8(self.ctx.index[0]);
        w.u8(self.ctx.index[1]);
        w.into_bytes()
    }

    pub fn restore_context(&mut self, bytes: &[u8]) {
        let mut r = ByteReader::new(bytes);
        self.ctx.address[0] = r.u32();
        self.ctx.address[1] = r.u32();
        self.ctx.index[0] = r.u8();
        self.ctx.index[1] = r.u8();
    }
}

impl Default for Kanji {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glyph_reads_auto_increment() {
        let mut kanji = Kanji::new();
        let mut font = vec![0u8; FONT_SIZE];
        for (i, b) in font.iter_mut().enumerate().take(64) {
            *b = i as u8;
        }
        kanji.load_font(&font);

        kanji.out_d8(1); // address = 1 << 5 = 32
        kanji.out_d9(0);
        assert_eq!(kanji.in_d9(), 32);
        assert_eq!(kanji.in_d9(), 33);
    }

    #[test]
    fn index_wraps_within_glyph() {
        let mut kanji = Kanji::new();
        kanji.out_d8(0);
        for _ in 0..32 {
            kanji.in_d9();
        }
        assert_eq!(kanji.ctx.index[0], 0);
    }

    #[test]
    fn second_interface_reads_upper_half() {
        let mut kanji = Kanji::new();
        let mut font = vec![0u8; FONT_SIZE];
        font[0x20000] = 0x5a;
        kanji.load_font(&font);
        kanji.out_da(0);
        kanji.out_db(0);
        assert_eq!(kanji.in_db(), 0x5a);
    }
}
