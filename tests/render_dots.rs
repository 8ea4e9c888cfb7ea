use dotmatrix::{
    BACKGROUND_RGBA, ChannelLayout, DotMatrixError, PixelBuffer, RenderParams, SampleMode, render,
    sample,
};

fn lit_pixels(buf: &PixelBuffer) -> Vec<(u32, u32)> {
    let mut out = Vec::new();
    for y in 0..buf.height() {
        for x in 0..buf.width() {
            if buf.pixel(x, y).unwrap()[0] == 255 {
                out.push((x, y));
            }
        }
    }
    out
}

#[test]
fn white_4x4_with_dot_2_is_four_full_dots() {
    let input = PixelBuffer::filled(4, 4, ChannelLayout::Rgba8, [255, 255, 255, 255]).unwrap();
    let params = RenderParams::new(2, 0).unwrap();

    for (x, y) in [(0, 0), (2, 0), (0, 2), (2, 2)] {
        assert_eq!(sample(&input, x, y, &params).unwrap(), 1.0);
    }

    let out = render(&input, &params).unwrap();
    assert_eq!((out.width(), out.height()), (4, 4));
    assert_eq!(out.layout(), ChannelLayout::Rgba8);
    // Radius 1 around (1,1), (3,1), (1,3), (3,3) covers every pixel center.
    assert!(out.data().iter().all(|&b| b == 255));
}

#[test]
fn black_4x4_is_all_background() {
    let input = PixelBuffer::filled(4, 4, ChannelLayout::Rgba8, [0, 0, 0, 255]).unwrap();
    let out = render(&input, &RenderParams::new(2, 0).unwrap()).unwrap();
    let background =
        PixelBuffer::filled(4, 4, ChannelLayout::Rgba8, BACKGROUND_RGBA).unwrap();
    assert_eq!(out, background);
}

#[test]
fn radius_of_exactly_half_draws_nothing() {
    let params = RenderParams::new(5, 0).unwrap();

    // 153 / 765 * 2.5 == 0.5
    let at_threshold = PixelBuffer::filled(5, 5, ChannelLayout::Rgb8, [51, 51, 51, 255]).unwrap();
    assert!(lit_pixels(&render(&at_threshold, &params).unwrap()).is_empty());

    // 157 / 765 * 2.5 ~= 0.513
    let above = PixelBuffer::filled(5, 5, ChannelLayout::Rgb8, [52, 52, 53, 255]).unwrap();
    assert_eq!(lit_pixels(&render(&above, &params).unwrap()), vec![(2, 2)]);
}

#[test]
fn even_dot_sizes_share_the_dead_zone() {
    for dot in [2u32, 4, 10] {
        let params = RenderParams::new(dot, 1).unwrap();
        // Smallest byte value whose radius exceeds 0.5 for this dot size.
        let v = (0..=255u8)
            .find(|&v| f64::from(v) * 3.0 / 765.0 * f64::from(dot) / 2.0 > 0.5)
            .unwrap();
        let input = PixelBuffer::filled(dot, dot, ChannelLayout::Rgb8, [v, v, v, 255]).unwrap();
        let lit = lit_pixels(&render(&input, &params).unwrap());
        assert!(!lit.is_empty(), "dot {dot} value {v} drew nothing");

        let dim = PixelBuffer::filled(dot, dot, ChannelLayout::Rgb8, [v - 1, v - 1, v - 1, 255])
            .unwrap();
        assert!(lit_pixels(&render(&dim, &params).unwrap()).is_empty());
    }
}

#[test]
fn output_dimensions_always_match_input() {
    for (w, h) in [(1, 1), (1, 9), (13, 1), (17, 11), (32, 32)] {
        let input = PixelBuffer::filled(w, h, ChannelLayout::Rgb8, [180, 90, 30, 255]).unwrap();
        for (dot, gap) in [(1, 0), (0, 1), (3, 2), (10, 2), (40, 0)] {
            let out = render(&input, &RenderParams::new(dot, gap).unwrap()).unwrap();
            assert_eq!((out.width(), out.height()), (w, h), "{w}x{h} dot={dot} gap={gap}");
            assert_eq!(out.data().len(), input.data().len());
        }
    }
}

#[test]
fn brighter_input_never_shrinks_dots() {
    let params = RenderParams::new(9, 1).unwrap();
    let mut prev = 0;
    for v in (0..=255u8).step_by(5) {
        let input = PixelBuffer::filled(20, 20, ChannelLayout::Rgb8, [v, v, v, 255]).unwrap();
        let lit = lit_pixels(&render(&input, &params).unwrap()).len();
        assert!(lit >= prev, "value {v}: {lit} < {prev}");
        prev = lit;
    }
    assert!(prev > 0);
}

#[test]
fn alpha_does_not_affect_brightness() {
    let params = RenderParams::new(4, 0).unwrap();
    let opaque = PixelBuffer::filled(4, 4, ChannelLayout::Rgba8, [200, 100, 0, 255]).unwrap();
    let clear = PixelBuffer::filled(4, 4, ChannelLayout::Rgba8, [200, 100, 0, 0]).unwrap();
    assert_eq!(
        sample(&opaque, 0, 0, &params).unwrap(),
        sample(&clear, 0, 0, &params).unwrap()
    );
    assert_eq!(
        render(&opaque, &params).unwrap(),
        render(&clear, &params).unwrap()
    );
}

#[test]
fn sampling_outside_the_buffer_is_out_of_bounds() {
    let input = PixelBuffer::filled(3, 2, ChannelLayout::Rgb8, [9, 9, 9, 255]).unwrap();
    let params = RenderParams::default();
    let err = sample(&input, 3, 0, &params).unwrap_err();
    assert!(matches!(
        err,
        DotMatrixError::OutOfBounds {
            x: 3,
            y: 0,
            width: 3,
            height: 2
        }
    ));
    assert!(sample(&input, 0, 2, &params).is_err());
}

#[test]
fn block_average_is_opt_in() {
    // Bright top-left pixel in an otherwise dark cell.
    let mut data = vec![0u8; 4 * 4 * 3];
    data[..3].copy_from_slice(&[255, 255, 255]);
    let input = PixelBuffer::new(4, 4, ChannelLayout::Rgb8, data).unwrap();

    let top_left = RenderParams::new(4, 0).unwrap();
    let average = top_left.with_sampling(SampleMode::BlockAverage);
    assert_eq!(sample(&input, 0, 0, &top_left).unwrap(), 1.0);
    assert!((sample(&input, 0, 0, &average).unwrap() - 1.0 / 16.0).abs() < 1e-12);

    assert!(!lit_pixels(&render(&input, &top_left).unwrap()).is_empty());
    assert!(lit_pixels(&render(&input, &average).unwrap()).is_empty());
}
