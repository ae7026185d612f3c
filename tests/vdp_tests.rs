use msx2_core::vdp::{ColorMode, Vdp, VdpRevision, VdpSignal};

fn graphic1_vdp() -> Vdp {
    let mut vdp = Vdp::new(VdpRevision::V9958, ColorMode::Rgb565);
    vdp.update_register(0, 0x00);
    vdp.update_register(1, 0x40); // screen on, GRAPHIC1
    vdp.update_register(2, 0x06); // name table at 0x1800
    vdp.update_register(3, 0x80); // color table at 0x2000
    vdp.update_register(4, 0x00); // pattern generator at 0x0000
    vdp
}

#[test]
fn graphic1_tables_derive_from_registers() {
    let vdp = graphic1_vdp();
    assert_eq!(vdp.screen_mode(), 0b00000);
    assert_eq!(vdp.name_table_address(), 0x1800);
    assert_eq!(vdp.color_table_address(), 0x2000);
    assert_eq!(vdp.pattern_table_address(), 0x0000);
}

#[test]
fn graphic1_renders_pattern_with_color_table_nibbles() {
    let mut vdp = graphic1_vdp();
    // name 0x41 at screen position (0,0), solid pattern, fg 15 / bg 0
    vdp.ctx.vram[0x1800] = 0x41;
    for i in 0..8 {
        vdp.ctx.vram[0x41 * 8 + i] = 0xff;
    }
    vdp.ctx.vram[0x2000 + 0x41 / 8] = 0xf0;

    let base = 100;
    vdp.render_scanline(0, base);

    let fg = vdp.palette[15];
    assert_ne!(fg, 0);
    // 8 dots, doubled to 16 device pixels
    for i in 0..16 {
        assert_eq!(vdp.display()[base + i], fg, "pixel {}", i);
    }
    // the next character is name 0, pattern 0: untouched backdrop
    assert_eq!(vdp.display()[base + 16], 0);
}

#[test]
fn ninth_sprite_on_a_line_sets_overflow_with_its_index() {
    let mut vdp = Vdp::new(VdpRevision::V9958, ColorMode::Rgb565);
    vdp.update_register(0, 0x04); // GRAPHIC3: sprite mode 2
    vdp.update_register(1, 0x40);
    vdp.update_register(5, 0x3c); // attributes 0x1E00, colors 0x1C00
    vdp.update_register(6, 0x00);

    for i in 0..9usize {
        vdp.ctx.vram[0x1e00 + i * 4] = 10; // y
        vdp.ctx.vram[0x1e00 + i * 4 + 1] = (i * 16) as u8; // x
        vdp.ctx.vram[0x1e00 + i * 4 + 2] = 0; // pattern
        for line in 0..8 {
            vdp.ctx.vram[0x1c00 + i * 16 + line] = 5;
        }
    }
    vdp.ctx.vram[0x1e00 + 9 * 4] = 216; // end-of-list marker
    for i in 0..8 {
        vdp.ctx.vram[i] = 0xff; // pattern 0
    }

    vdp.render_scanline(11, 26);

    assert_ne!(vdp.ctx.stat[0] & 0x40, 0, "overflow flag");
    assert_eq!(vdp.ctx.stat[0] & 0x1f, 8, "0-based index of the 9th sprite");
}

#[test]
fn sprite_collision_latches_offset_coordinates() {
    let mut vdp = Vdp::new(VdpRevision::V9958, ColorMode::Rgb565);
    vdp.update_register(0, 0x04);
    vdp.update_register(1, 0x40);
    vdp.update_register(5, 0x3c);

    // two overlapping sprites at the same position
    for i in 0..2usize {
        vdp.ctx.vram[0x1e00 + i * 4] = 10;
        vdp.ctx.vram[0x1e00 + i * 4 + 1] = 40;
        vdp.ctx.vram[0x1e00 + i * 4 + 2] = 0;
        for line in 0..8 {
            vdp.ctx.vram[0x1c00 + i * 16 + line] = 4 + i as u8;
        }
    }
    vdp.ctx.vram[0x1e00 + 2 * 4] = 216;
    for i in 0..8 {
        vdp.ctx.vram[i] = 0xff;
    }

    vdp.render_scanline(11, 26);

    assert_ne!(vdp.ctx.stat[0] & 0x20, 0, "collision flag");
    let x = vdp.ctx.stat[3] as i32 | ((vdp.ctx.stat[4] as i32 & 1) << 8);
    let y = vdp.ctx.stat[5] as i32 | ((vdp.ctx.stat[6] as i32 & 3) << 8);
    // the last overlapped pixel is the one that stays latched
    assert_eq!(x, 47 + 12);
    assert_eq!(y, 11 + 8);
}

#[test]
fn frame_interrupt_fires_at_the_end_of_the_active_area() {
    let mut vdp = graphic1_vdp();
    vdp.update_register(1, 0x60); // screen on + IE0

    let mut requested = false;
    let mut frames = 0;
    for _ in 0..342 * 262 {
        vdp.tick();
        while let Some(signal) = vdp.take_signal() {
            match signal {
                VdpSignal::RequestInterrupt => requested = true,
                VdpSignal::FrameComplete => frames += 1,
                VdpSignal::CancelInterrupt => {}
            }
        }
    }
    assert!(requested, "IE0 interrupt");
    assert_eq!(frames, 1, "exactly one frame per 342*262 dots");
    assert_ne!(vdp.ctx.stat[0] & 0x80, 0, "F flag");
}

#[test]
fn line_interrupt_matches_register_19() {
    let mut vdp = graphic1_vdp();
    vdp.update_register(0, 0x10); // IE1
    vdp.update_register(19, 50);

    let mut requested = false;
    for _ in 0..342 * 262 {
        vdp.tick();
        while let Some(signal) = vdp.take_signal() {
            if signal == VdpSignal::RequestInterrupt {
                requested = true;
            }
        }
    }
    assert!(requested);
    assert_ne!(vdp.ctx.stat[1] & 0x01, 0, "FH flag");
}

#[test]
fn enabling_ie0_with_pending_frame_flag_requests_at_once() {
    let mut vdp = graphic1_vdp();
    // run a frame with interrupts off; F is pending afterwards
    for _ in 0..342 * 262 {
        vdp.tick();
    }
    while vdp.take_signal().is_some() {}
    assert_ne!(vdp.ctx.stat[0] & 0x80, 0);

    vdp.update_register(1, 0x60);
    assert_eq!(vdp.take_signal(), Some(VdpSignal::RequestInterrupt));
}

#[test]
fn status_read_clears_the_frame_flag() {
    let mut vdp = graphic1_vdp();
    for _ in 0..342 * 262 {
        vdp.tick();
    }
    while vdp.take_signal().is_some() {}
    vdp.update_register(15, 0);
    let s0 = vdp.in_port_99();
    assert_ne!(s0 & 0x80, 0);
    let s0 = vdp.in_port_99();
    assert_eq!(s0 & 0x80, 0);
}

#[test]
fn palette_port_updates_the_rgb_cache() {
    let mut vdp = Vdp::new(VdpRevision::V9958, ColorMode::Rgb565);
    vdp.update_register(16, 1);
    vdp.out_port_9a(0x17); // R=1, B=7
    vdp.out_port_9a(0x02); // G=2
    assert_eq!(vdp.palette[1], (4 << 11) | (18 << 6) | 31);
    assert_eq!(vdp.ctx.reg[16], 2, "palette pointer auto-increments");
}

#[test]
fn tms_revision_ignores_the_palette_port() {
    let mut vdp = Vdp::new(VdpRevision::Tms9918a, ColorMode::Rgb565);
    let before = vdp.palette;
    vdp.update_register(16, 1);
    vdp.out_port_9a(0x17);
    vdp.out_port_9a(0x02);
    assert_eq!(vdp.palette, before);
}

#[test]
fn data_port_write_and_read_ahead() {
    let mut vdp = Vdp::new(VdpRevision::V9958, ColorMode::Rgb565);
    // set write address 0x1234
    vdp.out_port_99(0x34);
    vdp.out_port_99(0x12 | 0x40);
    vdp.out_port_98(0xde);
    assert_eq!(vdp.ctx.vram[0x1234], 0xde);
    assert_eq!(vdp.ctx.addr, 0x1235);

    // set read address 0x1234: the read-ahead buffer is primed
    vdp.out_port_99(0x34);
    vdp.out_port_99(0x12);
    assert_eq!(vdp.in_port_98(), 0xde);
}

#[test]
fn register_9_switches_line_count_and_border() {
    let mut vdp = Vdp::new(VdpRevision::V9958, ColorMode::Rgb565);
    assert_eq!(vdp.line_count(), 192);
    assert_eq!(vdp.top_border(), 24);
    vdp.update_register(9, 0x80);
    assert_eq!(vdp.line_count(), 212);
    assert_eq!(vdp.top_border(), 14);
}

#[test]
fn context_round_trip_rebuilds_caches() {
    let mut vdp = graphic1_vdp();
    vdp.ctx.vram[0x123] = 0x42;
    vdp.update_register(16, 3);
    vdp.out_port_9a(0x71);
    vdp.out_port_9a(0x07);
    let bytes = vdp.context_bytes();

    let mut other = Vdp::new(VdpRevision::V9958, ColorMode::Rgb565);
    other.restore_context(&bytes);
    other.update_all_palettes();
    other.rebuild_event_tables();

    assert_eq!(other.ctx.vram[0x123], 0x42);
    assert_eq!(other.ctx.reg[2], 0x06);
    assert_eq!(other.palette[3], vdp.palette[3]);
    assert_eq!(other.context_bytes(), bytes);
}
