// src/pattern/tests.rs

use super::ramp::{gradient, linear_levels, render, transition_band};
use super::shapes::{flat, knife, pyramid};
use super::*;
use crate::color::{grey_level, Intensity, BLACK, WHITE};
use crate::session::Edge;
use test_log::test;

const DMD: (usize, usize) = (960, 540);
const DISPLAY: (usize, usize) = (1920, 1080);

fn generator() -> PatternGenerator {
    PatternGenerator::new(DMD, DISPLAY, ResponseCurve::default())
}

fn state(family: PatternFamily, edge: Edge, width: u32, offset: Offset) -> SessionSnapshot {
    SessionSnapshot {
        family,
        edge,
        width,
        offset,
        ..SessionSnapshot::default()
    }
}

#[test]
fn it_should_center_an_even_band_on_the_dmd_midline() {
    let buffer = generator()
        .generate(&state(PatternFamily::Ramp, Edge::Edge1, 8, Offset::default()))
        .unwrap();
    assert_eq!(buffer.dimensions(), DMD);

    let expected_band = gradient(8, true, &ResponseCurve::default());
    for y in [0, 269, 539] {
        let row = buffer.row(y);
        assert!(row[..476].iter().all(|&p| p == BLACK), "row {}", y);
        assert_eq!(&row[476..484], expected_band.as_slice());
        assert!(row[484..].iter().all(|&p| p == WHITE), "row {}", y);
    }
    // Every row is identical.
    let first = buffer.row(0).to_vec();
    assert!((1..540).all(|y| buffer.row(y) == first.as_slice()));
}

#[test]
fn it_should_fill_the_band_with_increasing_levels_from_0_to_255() {
    let band = gradient(8, true, &ResponseCurve::default());
    assert_eq!(band.len(), 8);
    assert_eq!(grey_level(band[0]), 0);
    assert_eq!(band[7], WHITE);
    assert!(band.windows(2).all(|pair| grey_level(pair[0]) < grey_level(pair[1])));
    // Every band pixel is opaque, including the darkest one.
    assert!(band.iter().all(|p| p >> 24 == 0xFF));
}

#[test]
fn it_should_space_levels_like_a_truncated_linspace() {
    let levels: Vec<u8> = linear_levels(8).into_iter().map(Intensity::value).collect();
    assert_eq!(levels, vec![0, 36, 72, 109, 145, 182, 218, 255]);
    assert_eq!(linear_levels(1), vec![Intensity::MIN]);
    assert!(linear_levels(0).is_empty());
}

#[test]
fn it_should_mirror_edge1_into_edge2() {
    let curve = ResponseCurve::default();
    let center = (480 + 37, 270);
    let e1 = render(Edge::Edge1, 8, center, DMD, true, &curve).unwrap();
    let e2 = render(Edge::Edge2, 8, center, DMD, true, &curve).unwrap();

    let band = 513..521;
    let mut reversed = e1.row(0)[band.clone()].to_vec();
    reversed.reverse();
    assert_eq!(&e2.row(0)[band.clone()], reversed.as_slice());

    assert!(e1.row(0)[..band.start].iter().all(|&p| p == BLACK));
    assert!(e2.row(0)[..band.start].iter().all(|&p| p == WHITE));
    assert!(e1.row(0)[band.end..].iter().all(|&p| p == WHITE));
    assert!(e2.row(0)[band.end..].iter().all(|&p| p == BLACK));
}

#[test]
fn it_should_mirror_edge3_into_edge4_along_rows() {
    let curve = ResponseCurve::default();
    let e3 = render(Edge::Edge3, 4, (480, 270), DMD, false, &curve).unwrap();
    let e4 = render(Edge::Edge4, 4, (480, 270), DMD, false, &curve).unwrap();

    let column = |b: &PatternBuffer, x: usize| -> Vec<u32> {
        (0..b.height()).map(|y| b.get(x, y).unwrap()).collect()
    };
    let c3 = column(&e3, 10);
    let c4 = column(&e4, 10);

    let mut reversed = c3[268..272].to_vec();
    reversed.reverse();
    assert_eq!(&c4[268..272], reversed.as_slice());
    assert!(c3[..268].iter().all(|&p| p == BLACK));
    assert!(c3[272..].iter().all(|&p| p == WHITE));
    assert!(c4[..268].iter().all(|&p| p == WHITE));
    assert!(c4[272..].iter().all(|&p| p == BLACK));
    // Rows are uniform across x.
    assert!(e3.row(269).iter().all(|&p| p == e3.row(269)[0]));
}

#[test]
fn it_should_extend_odd_bands_by_one_mirror() {
    assert_eq!(transition_band(480, 5, 960).unwrap(), 478..483);
    assert_eq!(transition_band(480, 1, 960).unwrap(), 480..481);
    assert_eq!(transition_band(480, 4, 960).unwrap(), 478..482);
}

#[test]
fn it_should_clip_bands_at_the_dmd_border() {
    assert_eq!(transition_band(2, 8, 960).unwrap(), 0..6);
    assert_eq!(transition_band(958, 8, 960).unwrap(), 954..960);

    let buffer = generator()
        .generate(&state(PatternFamily::Ramp, Edge::Edge1, 8, Offset::new(-478, 0)))
        .unwrap();
    assert_eq!(buffer.dimensions(), DMD);
    assert_eq!(buffer.row(0)[5], WHITE);
    assert_eq!(buffer.row(0)[6], WHITE);
}

#[test]
fn it_should_refuse_bands_that_leave_the_dmd() {
    let err = transition_band(2000, 8, 960).unwrap_err();
    assert_eq!(
        err,
        PatternError::EmptyBand {
            start: 1996,
            end: 2004,
            limit: 960
        }
    );
    assert!(transition_band(-10, 8, 960).is_err());
    assert!(transition_band(480, 0, 960).is_err());

    let result = generator().generate(&state(
        PatternFamily::Ramp,
        Edge::Edge3,
        8,
        Offset::new(0, 1000),
    ));
    assert!(matches!(result, Err(PatternError::EmptyBand { limit: 540, .. })));
}

#[test]
fn it_should_light_one_half_plane_for_knife_edges() {
    let center = (480, 270);
    let e1 = knife(Edge::Edge1, center, DMD);
    assert_eq!(e1.get(479, 0), Some(BLACK));
    assert_eq!(e1.get(480, 0), Some(WHITE));
    let e2 = knife(Edge::Edge2, center, DMD);
    assert_eq!(e2.get(479, 539), Some(WHITE));
    assert_eq!(e2.get(480, 539), Some(BLACK));
    let e3 = knife(Edge::Edge3, center, DMD);
    assert_eq!(e3.get(0, 269), Some(BLACK));
    assert_eq!(e3.get(0, 270), Some(WHITE));
    let e4 = knife(Edge::Edge4, center, DMD);
    assert_eq!(e4.get(959, 269), Some(WHITE));
    assert_eq!(e4.get(959, 270), Some(BLACK));
}

#[test]
fn it_should_light_one_quadrant_for_pyramids() {
    let center = (480, 270);
    let lit = |q: Edge| -> Vec<(usize, usize)> {
        let b = pyramid(q, center, DMD);
        [(0, 0), (959, 0), (0, 539), (959, 539)]
            .into_iter()
            .filter(|&(x, y)| b.get(x, y) == Some(WHITE))
            .collect()
    };
    assert_eq!(lit(Edge::Edge1), vec![(959, 539)]);
    assert_eq!(lit(Edge::Edge2), vec![(0, 539)]);
    assert_eq!(lit(Edge::Edge3), vec![(0, 0)]);
    assert_eq!(lit(Edge::Edge4), vec![(959, 0)]);
}

#[test]
fn it_should_clip_shapes_moved_past_the_border_without_wrapping() {
    let all_on = knife(Edge::Edge1, (-50, 270), DMD);
    assert!(all_on.pixels().iter().all(|&p| p == WHITE));
    let all_off = knife(Edge::Edge1, (5000, 270), DMD);
    assert!(all_off.pixels().iter().all(|&p| p == BLACK));
    let quadrant = pyramid(Edge::Edge3, (-1, -1), DMD);
    assert!(quadrant.pixels().iter().all(|&p| p == BLACK));
}

#[test]
fn it_should_fill_flat_fields_uniformly() {
    let field = flat(Intensity::from(128), (4, 3));
    assert!(field.pixels().iter().all(|&p| p == 0xFF80_8080));
    assert_eq!(flat(Intensity::MAX, (2, 2)).pixels()[0], WHITE);
}

#[test]
fn it_should_leave_the_flat_field_uncorrected_in_a_default_session() {
    let snapshot = SessionSnapshot {
        family: PatternFamily::Flat,
        flat_intensity: Intensity::from(128),
        ..SessionSnapshot::default()
    };
    assert!(snapshot.correction);
    let buffer = generator().generate(&snapshot).unwrap();
    assert_eq!(buffer.dimensions(), DMD);
    assert!(buffer.pixels().iter().all(|&p| p == 0xFF80_8080));

    let no_correction = SessionSnapshot {
        correction: false,
        ..snapshot
    };
    assert_eq!(generator().generate(&no_correction).unwrap(), buffer);
}

#[test]
fn it_should_render_display_sized_frames() {
    let frame = generator()
        .render(&state(PatternFamily::Knife, Edge::Edge1, 1, Offset::default()))
        .unwrap();
    assert_eq!(frame.dimensions(), DISPLAY);
    assert_eq!(frame.get(959, 0), Some(BLACK));
    assert_eq!(frame.get(960, 0), Some(WHITE));
}

#[test]
fn it_should_move_the_center_with_the_offset() {
    let g = generator();
    assert_eq!(g.center(Offset::default()), (480, 270));
    assert_eq!(g.center(Offset::new(-100, 100)), (380, 370));
}

#[test]
fn it_should_reject_pixel_vectors_of_the_wrong_length() {
    let err = PatternBuffer::from_pixels(3, 3, vec![0; 8]).unwrap_err();
    assert_eq!(
        err,
        PatternError::ShapeMismatch {
            width: 3,
            height: 3,
            expected: 9,
            actual: 8
        }
    );
}
