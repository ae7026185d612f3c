//! VDP command engine: the on-chip 2D move/fill/line/search hardware.
//!
//! A nonzero write to R#46 starts a command; its walk state persists in
//! [`crate::vdp::CommandContext`] across ticks. Every executed step charges a
//! wait budget that `tick()` drains one VDP clock at a time, so commands
//! stay "in progress" (CE flag in stat2) for a hardware-plausible duration.
//! HMMC/LMMC steps are pumped by CPU writes to R#44 and LMCM by status-7
//! reads instead of by the dot clock.

use crate::vdp::Vdp;

/// Wait budget per executed step. The hardware figures differ between chip
/// generations; these are working values to validate against captures.
const WAIT_PER_DOT: i32 = 8;
const WAIT_PER_ROW: i32 = 24;

impl Vdp {
    /// Dot-clock entry point; runs the current command's next step once the
    /// wait counter has drained.
    pub(crate) fn command_step(&mut self) {
        match self.ctx.command {
            0b1110 => self.command_ymmm(false),
            0b1101 => self.command_hmmm(false),
            0b1100 => self.command_hmmv(false),
            0b1001 => self.command_lmmm(false),
            0b1000 => self.command_lmmv(false),
            0b0111 => self.command_line(false),
            0b0110 => self.command_srch(false),
            0b0101 => self.command_pset(false),
            0b0100 => self.command_point(false),
            _ => {}
        }
    }

    /// R#46 write: high nibble opcode, low nibble logical operation.
    pub(crate) fn execute_command(&mut self, cm: u8, lo: u8) {
        if cm == 0 {
            self.ctx.cmd.wait = 0;
            self.set_command_end();
            return;
        }
        self.ctx.command = cm;
        self.ctx.command_l = lo;
        self.ctx.stat[2] |= 0b00000001;
        match cm {
            0b1111 => self.command_hmmc(true),
            0b1110 => self.command_ymmm(true),
            0b1101 => self.command_hmmm(true),
            0b1100 => self.command_hmmv(true),
            0b1011 => self.command_lmmc(true),
            0b1010 => self.command_lmcm(true),
            0b1001 => self.command_lmmm(true),
            0b1000 => self.command_lmmv(true),
            0b0111 => self.command_line(true),
            0b0110 => self.command_srch(true),
            0b0101 => self.command_pset(true),
            0b0100 => self.command_point(true),
            _ => {
                tracing::warn!("unknown VDP command {:04b}", cm);
                self.set_command_end();
            }
        }
    }

    // -- mode geometry ------------------------------------------------------

    pub fn is_bitmap_mode(&self) -> bool {
        matches!(self.screen_mode(), 0b00011 | 0b00100 | 0b00101 | 0b00111)
    }

    fn dot_per_byte(&self) -> i32 {
        match self.screen_mode() {
            0b00011 => 2, // GRAPHIC4
            0b00100 => 4, // GRAPHIC5
            0b00101 => 2, // GRAPHIC6
            0b00111 => 1, // GRAPHIC7
            _ => 0,
        }
    }

    fn screen_width_dots(&self) -> i32 {
        match self.screen_mode() {
            0b00100 | 0b00101 => 512,
            _ => 256,
        }
    }

    fn require_bitmap_mode(&self, name: &str) {
        if !self.is_bitmap_mode() {
            panic!("{} issued in non-bitmap screen mode {:05b}", name, self.screen_mode());
        }
    }

    // -- argument registers -------------------------------------------------

    fn arg16(&self, low: usize, high_mask: u8) -> i32 {
        (((self.ctx.reg[low + 1] & high_mask) as i32) << 8) | self.ctx.reg[low] as i32
    }

    fn set_arg16(&mut self, low: usize, value: i32) {
        self.ctx.reg[low + 1] = ((value >> 8) & 0x03) as u8;
        self.ctx.reg[low] = (value & 0xff) as u8;
    }

    fn cmd_sx(&self) -> i32 {
        self.arg16(32, 0x01)
    }

    fn cmd_sy(&self) -> i32 {
        self.arg16(34, 0x03)
    }

    fn cmd_dx(&self) -> i32 {
        self.arg16(36, 0x01)
    }

    fn cmd_dy(&self) -> i32 {
        self.arg16(38, 0x03)
    }

    fn cmd_maj(&self) -> i32 {
        self.arg16(40, 0x01)
    }

    fn cmd_min(&self) -> i32 {
        self.arg16(42, 0x03)
    }

    /// Dot counts: zero selects the full logical plane.
    fn cmd_nx(&self) -> i32 {
        match self.cmd_maj() {
            0 => 512,
            n => n,
        }
    }

    fn cmd_ny(&self) -> i32 {
        match self.cmd_min() {
            0 => 1024,
            n => n,
        }
    }

    fn cmd_eq(&self) -> bool {
        self.ctx.reg[45] & 0b00000010 != 0
    }

    fn cmd_dix(&self) -> i32 {
        if self.ctx.reg[45] & 0b00000100 != 0 {
            -1
        } else {
            1
        }
    }

    fn cmd_diy(&self) -> i32 {
        if self.ctx.reg[45] & 0b00001000 != 0 {
            -1
        } else {
            1
        }
    }

    // -- walk advancement ---------------------------------------------------

    fn set_command_end(&mut self) {
        self.ctx.command = 0;
        self.ctx.stat[2] &= 0b11111110;
    }

    fn charge_wait(&mut self, row_advanced: bool) {
        self.ctx.cmd.wait = if row_advanced { WAIT_PER_ROW } else { WAIT_PER_DOT };
    }

    /// Advance the destination pointer; returns true when a row ended.
    fn command_move_d(&mut self) -> bool {
        self.ctx.cmd.dx += self.ctx.cmd.dix;
        self.ctx.cmd.nx -= self.ctx.cmd.dix.abs();
        if self.ctx.cmd.nx <= 0 || !(0..512).contains(&self.ctx.cmd.dx) {
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.dy += self.ctx.cmd.diy;
            self.ctx.cmd.ny -= 1;
            if self.ctx.cmd.ny <= 0 || !(0..1024).contains(&self.ctx.cmd.dy) {
                let (dx, dy, nx, ny) =
                    (self.ctx.cmd.dx, self.ctx.cmd.dy, self.ctx.cmd.nx, self.ctx.cmd.ny);
                self.set_arg16(36, dx);
                self.set_arg16(38, dy);
                self.set_arg16(40, nx);
                self.set_arg16(42, ny);
                self.set_command_end();
            }
            true
        } else {
            false
        }
    }

    /// Advance the source pointer (LMCM).
    fn command_move_s(&mut self) -> bool {
        self.ctx.cmd.sx += self.ctx.cmd.dix;
        self.ctx.cmd.nx -= self.ctx.cmd.dix.abs();
        if self.ctx.cmd.nx <= 0 || !(0..512).contains(&self.ctx.cmd.sx) {
            self.ctx.cmd.sx = self.cmd_sx();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.sy += self.ctx.cmd.diy;
            self.ctx.cmd.ny -= 1;
            if self.ctx.cmd.ny <= 0 || !(0..1024).contains(&self.ctx.cmd.sy) {
                let (sx, sy, nx, ny) =
                    (self.ctx.cmd.sx, self.ctx.cmd.sy, self.ctx.cmd.nx, self.ctx.cmd.ny);
                self.set_arg16(32, sx);
                self.set_arg16(34, sy);
                self.set_arg16(40, nx);
                self.set_arg16(42, ny);
                self.set_command_end();
            }
            true
        } else {
            false
        }
    }

    /// Advance both pointers in lockstep (HMMM/LMMM).
    fn command_move_ds(&mut self) -> bool {
        self.ctx.cmd.dx += self.ctx.cmd.dix;
        self.ctx.cmd.sx += self.ctx.cmd.dix;
        self.ctx.cmd.nx -= self.ctx.cmd.dix.abs();
        if self.ctx.cmd.nx <= 0
            || !(0..512).contains(&self.ctx.cmd.dx)
            || !(0..512).contains(&self.ctx.cmd.sx)
        {
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.sx = self.cmd_sx();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.dy += self.ctx.cmd.diy;
            self.ctx.cmd.sy += self.ctx.cmd.diy;
            self.ctx.cmd.ny -= 1;
            if self.ctx.cmd.ny <= 0
                || !(0..1024).contains(&self.ctx.cmd.dy)
                || !(0..1024).contains(&self.ctx.cmd.sy)
            {
                let cmd = self.ctx.cmd;
                self.set_arg16(36, cmd.dx);
                self.set_arg16(38, cmd.dy);
                self.set_arg16(32, cmd.sx);
                self.set_arg16(34, cmd.sy);
                self.set_arg16(40, cmd.nx);
                self.set_arg16(42, cmd.ny);
                self.set_command_end();
            }
            true
        } else {
            false
        }
    }

    /// Advance the destination with a shared Y for source rows (YMMM).
    fn command_move_dsy(&mut self) -> bool {
        self.ctx.cmd.dx += self.ctx.cmd.dix;
        if !(0..512).contains(&self.ctx.cmd.dx) {
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.dy += self.ctx.cmd.diy;
            self.ctx.cmd.sy += self.ctx.cmd.diy;
            self.ctx.cmd.ny -= 1;
            if self.ctx.cmd.ny <= 0
                || !(0..1024).contains(&self.ctx.cmd.dy)
                || !(0..1024).contains(&self.ctx.cmd.sy)
            {
                let cmd = self.ctx.cmd;
                self.set_arg16(36, cmd.dx);
                self.set_arg16(38, cmd.dy);
                self.set_arg16(34, cmd.sy);
                self.set_arg16(42, cmd.ny);
                self.set_command_end();
            }
            true
        } else {
            false
        }
    }

    // -- pixel access -------------------------------------------------------

    fn read_logical_pixel(&self, addr: usize, dpb: i32, x: i32) -> u8 {
        let src = self.vram_read(addr);
        match dpb {
            1 => src,
            2 => {
                if x & 1 != 0 {
                    src & 0x0f
                } else {
                    (src & 0xf0) >> 4
                }
            }
            4 => match x & 3 {
                3 => src & 0b11,
                2 => (src & 0b1100) >> 2,
                1 => (src & 0b110000) >> 4,
                _ => (src & 0b11000000) >> 6,
            },
            _ => 0,
        }
    }

    /// Combine `clr` into the destination pixel under the command's logical
    /// operation. The T variants (bit 3) skip transparent sources.
    fn render_logical_pixel(&mut self, addr: usize, dpb: i32, x: i32, clr: u8, lo: u8) {
        if clr == 0 && lo & 0b1000 != 0 {
            return;
        }
        let apply = |dc: u8, sc: u8| -> u8 {
            match lo & 0b0111 {
                0b000 => sc,
                0b001 => dc & sc,
                0b010 => dc | sc,
                0b011 => dc ^ sc,
                0b100 => 0xff ^ sc,
                _ => dc,
            }
        };
        let dst = self.vram_read(addr);
        let result = match dpb {
            1 => apply(dst, clr),
            2 => {
                let clr = clr & 0x0f;
                if x & 1 != 0 {
                    (dst & 0xf0) | (apply(dst & 0x0f, clr) & 0x0f)
                } else {
                    (dst & 0x0f) | ((apply((dst & 0xf0) >> 4, clr) & 0x0f) << 4)
                }
            }
            4 => {
                let clr = clr & 0x03;
                let shift = match x & 3 {
                    3 => 0,
                    2 => 2,
                    1 => 4,
                    _ => 6,
                };
                let keep = !(0b11 << shift);
                (dst & keep) | ((apply((dst >> shift) & 0b11, clr) & 0b11) << shift)
            }
            _ => dst,
        };
        self.vram_write(addr, result);
    }

    // -- executors ----------------------------------------------------------

    /// High-speed move, CPU to VRAM: one byte per R#44 write.
    pub(crate) fn command_hmmc(&mut self, setup: bool) {
        self.require_bitmap_mode("HMMC");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.dy = self.cmd_dy();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.ny = self.cmd_ny();
            self.ctx.cmd.diy = self.cmd_diy();
            self.ctx.cmd.dix = dpb * self.cmd_dix();
            tracing::debug!(
                "HMMC dx={} dy={} nx={} ny={} val=${:02X}",
                self.ctx.cmd.dx, self.ctx.cmd.dy, self.ctx.cmd.nx, self.ctx.cmd.ny, self.ctx.reg[44]
            );
        }
        let addr = (self.ctx.cmd.dx / dpb + self.ctx.cmd.dy * line_bytes) as usize;
        let value = self.ctx.reg[44];
        self.vram_write(addr, value);
        let row = self.command_move_d();
        self.charge_wait(row);
    }

    /// High-speed move, VRAM row to VRAM row at a shared X.
    pub(crate) fn command_ymmm(&mut self, setup: bool) {
        self.require_bitmap_mode("YMMM");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.sy = self.cmd_sy();
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.dy = self.cmd_dy();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.ny = self.cmd_ny();
            self.ctx.cmd.diy = self.cmd_diy();
            self.ctx.cmd.dix = dpb * self.cmd_dix();
            tracing::debug!(
                "YMMM sy={} dx={} dy={} ny={}",
                self.ctx.cmd.sy, self.ctx.cmd.dx, self.ctx.cmd.dy, self.ctx.cmd.ny
            );
        }
        let src = (self.ctx.cmd.dx / dpb + self.ctx.cmd.sy * line_bytes) as usize;
        let dst = (self.ctx.cmd.dx / dpb + self.ctx.cmd.dy * line_bytes) as usize;
        let byte = self.vram_read(src);
        self.vram_write(dst, byte);
        let row = self.command_move_dsy();
        self.charge_wait(row);
    }

    /// High-speed move, VRAM to VRAM, byte granular.
    pub(crate) fn command_hmmm(&mut self, setup: bool) {
        self.require_bitmap_mode("HMMM");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.sx = self.cmd_sx();
            self.ctx.cmd.sy = self.cmd_sy();
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.dy = self.cmd_dy();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.ny = self.cmd_ny();
            self.ctx.cmd.diy = self.cmd_diy();
            self.ctx.cmd.dix = dpb * self.cmd_dix();
            tracing::debug!(
                "HMMM sx={} sy={} dx={} dy={} nx={} ny={}",
                self.ctx.cmd.sx, self.ctx.cmd.sy, self.ctx.cmd.dx, self.ctx.cmd.dy,
                self.ctx.cmd.nx, self.ctx.cmd.ny
            );
        }
        let src = (self.ctx.cmd.sx / dpb + self.ctx.cmd.sy * line_bytes) as usize;
        let dst = (self.ctx.cmd.dx / dpb + self.ctx.cmd.dy * line_bytes) as usize;
        let byte = self.vram_read(src);
        self.vram_write(dst, byte);
        let row = self.command_move_ds();
        self.charge_wait(row);
    }

    /// High-speed fill with the R#44 byte.
    pub(crate) fn command_hmmv(&mut self, setup: bool) {
        self.require_bitmap_mode("HMMV");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.dy = self.cmd_dy();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.ny = self.cmd_ny();
            self.ctx.cmd.diy = self.cmd_diy();
            self.ctx.cmd.dix = dpb * self.cmd_dix();
            tracing::debug!(
                "HMMV dx={} dy={} nx={} ny={} clr=${:02X}",
                self.ctx.cmd.dx, self.ctx.cmd.dy, self.ctx.cmd.nx, self.ctx.cmd.ny, self.ctx.reg[44]
            );
        }
        let addr = (self.ctx.cmd.dx / dpb + self.ctx.cmd.dy * line_bytes) as usize;
        let value = self.ctx.reg[44];
        self.vram_write(addr, value);
        let row = self.command_move_d();
        self.charge_wait(row);
    }

    /// Logical move, CPU to VRAM: one dot per R#44 write.
    pub(crate) fn command_lmmc(&mut self, setup: bool) {
        self.require_bitmap_mode("LMMC");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.dy = self.cmd_dy();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.ny = self.cmd_ny();
            self.ctx.cmd.diy = self.cmd_diy();
            self.ctx.cmd.dix = self.cmd_dix();
            tracing::debug!(
                "LMMC dx={} dy={} nx={} ny={} lo={:X}",
                self.ctx.cmd.dx, self.ctx.cmd.dy, self.ctx.cmd.nx, self.ctx.cmd.ny, self.ctx.command_l
            );
        }
        let addr = (self.ctx.cmd.dx / dpb + self.ctx.cmd.dy * line_bytes) as usize;
        let (dx, clr, lo) = (self.ctx.cmd.dx, self.ctx.reg[44], self.ctx.command_l);
        self.render_logical_pixel(addr, dpb, dx, clr, lo);
        let row = self.command_move_d();
        self.charge_wait(row);
    }

    /// Logical move, VRAM to CPU: one dot per status-7 read.
    pub(crate) fn command_lmcm(&mut self, setup: bool) {
        self.require_bitmap_mode("LMCM");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.sx = self.cmd_sx();
            self.ctx.cmd.sy = self.cmd_sy();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.ny = self.cmd_ny();
            self.ctx.cmd.diy = self.cmd_diy();
            self.ctx.cmd.dix = self.cmd_dix();
        }
        let addr = (self.ctx.cmd.sx / dpb + self.ctx.cmd.sy * line_bytes) as usize;
        self.ctx.stat[7] = self.read_logical_pixel(addr, dpb, self.ctx.cmd.sx);
        let row = self.command_move_s();
        self.charge_wait(row);
    }

    /// Logical move, VRAM to VRAM, dot granular.
    pub(crate) fn command_lmmm(&mut self, setup: bool) {
        self.require_bitmap_mode("LMMM");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.sx = self.cmd_sx();
            self.ctx.cmd.sy = self.cmd_sy();
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.dy = self.cmd_dy();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.ny = self.cmd_ny();
            self.ctx.cmd.diy = self.cmd_diy();
            self.ctx.cmd.dix = self.cmd_dix();
            tracing::debug!(
                "LMMM sx={} sy={} dx={} dy={} nx={} ny={} lo={:X}",
                self.ctx.cmd.sx, self.ctx.cmd.sy, self.ctx.cmd.dx, self.ctx.cmd.dy,
                self.ctx.cmd.nx, self.ctx.cmd.ny, self.ctx.command_l
            );
        }
        let src = (self.ctx.cmd.sx / dpb + self.ctx.cmd.sy * line_bytes) as usize;
        let dst = (self.ctx.cmd.dx / dpb + self.ctx.cmd.dy * line_bytes) as usize;
        let sc = self.read_logical_pixel(src, dpb, self.ctx.cmd.sx);
        let (dx, lo) = (self.ctx.cmd.dx, self.ctx.command_l);
        self.render_logical_pixel(dst, dpb, dx, sc, lo);
        let row = self.command_move_ds();
        self.charge_wait(row);
    }

    /// Logical fill with the R#44 dot color.
    pub(crate) fn command_lmmv(&mut self, setup: bool) {
        self.require_bitmap_mode("LMMV");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.dy = self.cmd_dy();
            self.ctx.cmd.nx = self.cmd_nx();
            self.ctx.cmd.ny = self.cmd_ny();
            self.ctx.cmd.diy = self.cmd_diy();
            self.ctx.cmd.dix = self.cmd_dix();
            tracing::debug!(
                "LMMV dx={} dy={} nx={} ny={} clr=${:02X} lo={:X}",
                self.ctx.cmd.dx, self.ctx.cmd.dy, self.ctx.cmd.nx, self.ctx.cmd.ny,
                self.ctx.reg[44], self.ctx.command_l
            );
        }
        let addr = (self.ctx.cmd.dx / dpb + self.ctx.cmd.dy * line_bytes) as usize;
        let (dx, clr, lo) = (self.ctx.cmd.dx, self.ctx.reg[44], self.ctx.command_l);
        self.render_logical_pixel(addr, dpb, dx, clr, lo);
        let row = self.command_move_d();
        self.charge_wait(row);
    }

    /// Bresenham line; R#45 bit 0 picks the major axis.
    pub(crate) fn command_line(&mut self, setup: bool) {
        self.require_bitmap_mode("LINE");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.dy = self.cmd_dy();
            self.ctx.cmd.maj = self.cmd_maj();
            self.ctx.cmd.min = self.cmd_min();
            self.ctx.cmd.maj_f = self.ctx.cmd.maj as f64;
            self.ctx.cmd.min_f = self.ctx.cmd.min as f64;
            self.ctx.cmd.diy = self.cmd_diy();
            self.ctx.cmd.dix = self.cmd_dix();
            tracing::debug!(
                "LINE dx={} dy={} maj={} min={} axis={}",
                self.ctx.cmd.dx, self.ctx.cmd.dy, self.ctx.cmd.maj, self.ctx.cmd.min,
                if self.ctx.reg[45] & 1 != 0 { "Y" } else { "X" }
            );
        }
        let addr = (self.ctx.cmd.dx / dpb + self.ctx.cmd.dy * line_bytes) as usize;
        let (dx, clr, lo) = (self.ctx.cmd.dx, self.ctx.reg[44], self.ctx.command_l);
        self.render_logical_pixel(addr, dpb, dx, clr, lo);
        if self.ctx.cmd.maj > 0 {
            self.ctx.cmd.maj -= 1;
            if self.ctx.reg[45] & 1 != 0 {
                self.ctx.cmd.dy += self.ctx.cmd.diy;
            } else {
                self.ctx.cmd.dx += self.ctx.cmd.dix;
            }
            if self.ctx.cmd.min > 0 {
                let min_n = ((self.ctx.cmd.maj as f64 / self.ctx.cmd.maj_f)
                    * self.ctx.cmd.min_f) as i32;
                if min_n != self.ctx.cmd.min {
                    self.ctx.cmd.min = min_n;
                    if self.ctx.reg[45] & 1 != 0 {
                        self.ctx.cmd.dx += self.ctx.cmd.dix;
                    } else {
                        self.ctx.cmd.dy += self.ctx.cmd.diy;
                    }
                }
            }
        } else {
            let cmd = self.ctx.cmd;
            self.set_arg16(36, cmd.dx);
            self.set_arg16(38, cmd.dy);
            self.set_arg16(40, cmd.maj);
            self.set_arg16(42, cmd.min);
            self.set_command_end();
        }
        self.charge_wait(false);
    }

    /// Border search along a row; the found X lands in stat8/9.
    pub(crate) fn command_srch(&mut self, setup: bool) {
        self.require_bitmap_mode("SRCH");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.sx = self.cmd_sx();
            self.ctx.cmd.sy = self.cmd_sy();
            self.ctx.cmd.dix = self.cmd_dix();
            tracing::debug!(
                "SRCH sx={} sy={} clr=${:02X} eq={}",
                self.ctx.cmd.sx, self.ctx.cmd.sy, self.ctx.reg[44], self.cmd_eq()
            );
        }
        if (0..512).contains(&self.ctx.cmd.sx) {
            let addr = (self.ctx.cmd.sy * line_bytes + self.ctx.cmd.sx / dpb) as usize;
            let clr = match dpb {
                2 => self.ctx.reg[44] & 0x0f,
                4 => self.ctx.reg[44] & 0x03,
                _ => self.ctx.reg[44],
            };
            let px = self.read_logical_pixel(addr, dpb, self.ctx.cmd.sx);
            let hit = if self.cmd_eq() { px == clr } else { px != clr };
            if hit {
                self.ctx.stat[2] |= 0b00011100;
                self.ctx.stat[8] = (self.ctx.cmd.sx & 0xff) as u8;
                self.ctx.stat[9] = (((self.ctx.cmd.sx & 0x300) >> 8) as u8) | 0xfc;
                let sx = self.ctx.cmd.sx;
                self.set_arg16(32, sx);
                self.set_command_end();
            } else {
                self.ctx.cmd.sx += self.ctx.cmd.dix;
            }
        } else {
            self.ctx.stat[2] &= 0b11100010;
            self.ctx.stat[2] |= 0b00001100;
            let sx = self.ctx.cmd.sx;
            self.set_arg16(32, sx);
            self.set_command_end();
        }
        self.charge_wait(false);
    }

    /// Single logical pixel write.
    pub(crate) fn command_pset(&mut self, setup: bool) {
        self.require_bitmap_mode("PSET");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.dx = self.cmd_dx();
            self.ctx.cmd.dy = self.cmd_dy();
        }
        let addr = (self.ctx.cmd.dx / dpb + self.ctx.cmd.dy * line_bytes) as usize;
        let (dx, clr, lo) = (self.ctx.cmd.dx, self.ctx.reg[44], self.ctx.command_l);
        self.render_logical_pixel(addr, dpb, dx, clr, lo);
        self.set_command_end();
        self.charge_wait(false);
    }

    /// Single logical pixel read into stat7.
    pub(crate) fn command_point(&mut self, setup: bool) {
        self.require_bitmap_mode("POINT");
        let dpb = self.dot_per_byte();
        let line_bytes = self.screen_width_dots() / dpb;
        if setup {
            self.ctx.cmd.sx = self.cmd_sx();
            self.ctx.cmd.sy = self.cmd_sy();
        }
        let addr = (self.ctx.cmd.sx / dpb + self.ctx.cmd.sy * line_bytes) as usize;
        self.ctx.stat[7] = self.read_logical_pixel(addr, dpb, self.ctx.cmd.sx);
        self.set_command_end();
        self.charge_wait(false);
    }
}
