use super::*;
use crate::buffer::ChannelLayout;

fn uniform(width: u32, height: u32, v: u8) -> PixelBuffer {
    PixelBuffer::filled(width, height, ChannelLayout::Rgba8, [v, v, v, 255]).unwrap()
}

fn lit_pixels(buf: &PixelBuffer) -> usize {
    buf.data()
        .chunks_exact(buf.layout().channels())
        .filter(|px| px[0] == 255)
        .count()
}

#[test]
fn params_reject_zero_pitch() {
    assert!(RenderParams::new(0, 0).is_err());
    assert!(RenderParams::new(0, 1).is_ok());
    assert!(RenderParams::new(1, 0).is_ok());
    assert!(RenderParams::new(u32::MAX, 1).is_err());
}

#[test]
fn render_rejects_invalid_params() {
    let params = RenderParams {
        dot_size: 0,
        spacing: 0,
        sampling: SampleMode::TopLeft,
    };
    assert!(matches!(
        render(&uniform(4, 4, 255), &params),
        Err(DotMatrixError::InvalidParams(_))
    ));
}

#[test]
fn grid_walk_steps_by_pitch_and_stays_in_bounds() {
    let params = RenderParams::new(2, 1).unwrap();
    let cells = grid_cells(7, 4, &params).collect::<Vec<_>>();
    assert_eq!(
        cells,
        vec![(0, 0), (3, 0), (6, 0), (0, 3), (3, 3), (6, 3)]
    );
}

#[test]
fn radius_is_capped_at_half_dot() {
    assert_eq!(dot_radius(1.0, 10), 5.0);
    assert_eq!(dot_radius(2.0, 10), 5.0);
    assert_eq!(dot_radius(0.0, 10), 0.0);
    assert_eq!(dot_radius(0.5, 0), 0.0);
}

#[test]
fn white_4x4_with_dot_2_fills_every_cell() {
    let params = RenderParams::new(2, 0).unwrap();
    let cells = grid_cells(4, 4, &params).collect::<Vec<_>>();
    assert_eq!(cells, vec![(0, 0), (2, 0), (0, 2), (2, 2)]);

    // Radius 1 around (1,1), (3,1), (1,3), (3,3): every pixel center is ~0.71 from a dot center.
    let out = render(&uniform(4, 4, 255), &params).unwrap();
    assert_eq!(out, uniform(4, 4, 255));
}

#[test]
fn black_input_renders_background_only() {
    let params = RenderParams::new(2, 0).unwrap();
    let out = render(&uniform(4, 4, 0), &params).unwrap();
    assert_eq!(
        out,
        PixelBuffer::filled(4, 4, ChannelLayout::Rgba8, BACKGROUND_RGBA).unwrap()
    );
}

#[test]
fn radius_exactly_at_dead_zone_draws_nothing() {
    // dot 5, rgb sum 153: brightness 0.2, radius 0.2 * 2.5 == 0.5.
    let params = RenderParams::new(5, 0).unwrap();
    assert_eq!(dot_radius(153.0 / 765.0, 5), DEAD_ZONE_RADIUS);
    let out = render(&uniform(5, 5, 51), &params).unwrap();
    assert_eq!(lit_pixels(&out), 0);
}

#[test]
fn radius_just_above_dead_zone_draws_a_dot() {
    // rgb sum 154: radius ~0.503, lights the center pixel of the 5x5 cell.
    let params = RenderParams::new(5, 0).unwrap();
    let input = PixelBuffer::filled(5, 5, ChannelLayout::Rgb8, [52, 51, 51, 255]).unwrap();
    let out = render(&input, &params).unwrap();
    assert_eq!(lit_pixels(&out), 1);
    assert_eq!(out.pixel(2, 2), Some(&[255u8, 255, 255][..]));
}

#[test]
fn even_dot_just_above_dead_zone_lights_the_central_block() {
    // dot 10: the center sits on a pixel corner, ~0.71 from the nearest pixel centers.
    let params = RenderParams::new(10, 0).unwrap();

    // rgb sum 76: radius ~0.497, inside the dead zone.
    let below = PixelBuffer::filled(10, 10, ChannelLayout::Rgb8, [26, 25, 25, 255]).unwrap();
    assert_eq!(lit_pixels(&render(&below, &params).unwrap()), 0);

    // rgb sum 77: radius ~0.503.
    let above = PixelBuffer::filled(10, 10, ChannelLayout::Rgb8, [26, 26, 25, 255]).unwrap();
    let out = render(&above, &params).unwrap();
    assert_eq!(lit_pixels(&out), 4);
    for (x, y) in [(4, 4), (5, 4), (4, 5), (5, 5)] {
        assert_eq!(out.pixel(x, y).unwrap()[0], 255, "({x}, {y})");
    }

    // radius ~0.61 still only reaches the central block.
    let out = render(&uniform(10, 10, 31), &params).unwrap();
    assert_eq!(lit_pixels(&out), 4);
}

#[test]
fn dots_never_leave_their_cell() {
    let params = RenderParams::new(4, 3).unwrap();
    let out = render(&uniform(14, 14, 255), &params).unwrap();
    for y in 0..14 {
        for x in 0..14 {
            let in_gap = x % 7 >= 4 || y % 7 >= 4;
            if in_gap {
                assert_eq!(out.pixel(x, y).unwrap()[0], 0, "gap pixel ({x}, {y}) was lit");
            }
        }
    }
}

#[test]
fn partial_edge_cells_are_clipped() {
    // 5x5 with pitch 4: cells at 0 and 4; the second row/column of cells is 1 pixel wide.
    let params = RenderParams::new(4, 0).unwrap();
    let out = render(&uniform(5, 5, 255), &params).unwrap();
    assert_eq!(out.width(), 5);
    assert_eq!(out.height(), 5);
    // Cell (4, 0) has its center at (6, 2): pixel (4, 1) is ~1.58 away, inside radius 2.
    assert_eq!(out.pixel(4, 1).unwrap()[0], 255);
    assert_eq!(out.pixel(4, 2).unwrap()[0], 255);
    // Cell (4, 4) has its center at (6, 6): pixel (4, 4) is ~2.12 away.
    assert_eq!(out.pixel(4, 4).unwrap()[0], 0);
}

#[test]
fn lit_area_grows_with_brightness() {
    let params = RenderParams::new(9, 1).unwrap();
    let mut last = 0usize;
    for v in (0u8..=255).step_by(15) {
        let lit = lit_pixels(&render(&uniform(20, 20, v), &params).unwrap());
        assert!(lit >= last, "brightness {v} lit {lit} < {last}");
        last = lit;
    }
    assert!(last > 0);
}

#[test]
fn render_is_deterministic_and_keeps_layout() {
    let data = (0..(6 * 5 * 3)).map(|i| (i * 37 % 256) as u8).collect::<Vec<_>>();
    let input = PixelBuffer::new(6, 5, ChannelLayout::Rgb8, data).unwrap();
    let params = RenderParams::new(3, 1).unwrap();
    let a = render(&input, &params).unwrap();
    let b = render(&input, &params).unwrap();
    assert_eq!(a.data(), b.data());
    assert_eq!(a.layout(), ChannelLayout::Rgb8);
}

#[test]
fn scaled_params_keep_a_floor_of_one() {
    let params = RenderParams::new(10, 2).unwrap();
    let half = params.scaled(0.5);
    assert_eq!((half.dot_size, half.spacing), (5, 1));
    let tiny = params.scaled(0.01);
    assert_eq!((tiny.dot_size, tiny.spacing), (1, 1));
    let no_gap = RenderParams::new(10, 0).unwrap().scaled(0.5);
    assert_eq!(no_gap.spacing, 0);
}
