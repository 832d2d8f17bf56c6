//! Contour retrieval on top of `imageproc`'s border following, and contour drawing.

use super::{Contour, ContourApprox, Contours, DrawStyle, HierarchyNode, LineType, RetrievalMode};
use crate::{Channels, Image};
use image::GrayImage;
use imageproc::{
    contours::{find_contours, BorderType},
    drawing::BresenhamLineIter,
};

/// Collapses runs of equal step direction to their endpoints.
fn compress(points: &[[i32; 2]]) -> Vec<[i32; 2]> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let step = |a: [i32; 2], b: [i32; 2]| [b[0] - a[0], b[1] - a[1]];
    let kept = (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect::<Vec<_>>();

    if kept.is_empty() {
        vec![points[0]]
    } else {
        kept
    }
}

/// Fills in sibling and child links from each node's parent.
fn link(parents: &[Option<usize>]) -> Vec<HierarchyNode> {
    let mut nodes = parents
        .iter()
        .map(|&parent| HierarchyNode { parent, ..HierarchyNode::default() })
        .collect::<Vec<_>>();

    // last seen child of each parent, with the roots tracked separately
    let mut last_child: Vec<Option<usize>> = vec![None; parents.len()];
    let mut last_root = None;
    for (i, &parent) in parents.iter().enumerate() {
        let last = match parent {
            Some(p) => &mut last_child[p],
            None => &mut last_root,
        };
        match *last {
            Some(prev) => {
                nodes[prev].next = Some(i);
                nodes[i].previous = Some(prev);
            }
            None => {
                if let Some(p) = parent {
                    nodes[p].first_child = Some(i);
                }
            }
        }
        *last = Some(i);
    }

    nodes
}

/// Traces the borders of the non-zero regions of `binary`.
pub(super) fn find(binary: &GrayImage, mode: RetrievalMode, approx: ContourApprox) -> Contours {
    let traced = find_contours::<i32>(binary);

    let keep = |c: &imageproc::contours::Contour<i32>| match mode {
        RetrievalMode::External => c.border_type == BorderType::Outer && c.parent.is_none(),
        RetrievalMode::List | RetrievalMode::TwoLevel | RetrievalMode::Tree => true,
    };

    // index of each traced contour in the output, if it is kept
    let mut remap: Vec<Option<usize>> = vec![None; traced.len()];
    let mut next_index = 0;
    for (i, contour) in traced.iter().enumerate() {
        if keep(contour) {
            remap[i] = Some(next_index);
            next_index += 1;
        }
    }

    let mut contours = Vec::with_capacity(next_index);
    let mut parents = Vec::with_capacity(next_index);
    for contour in traced.iter().filter(|c| keep(c)) {
        let parent = match mode {
            RetrievalMode::External | RetrievalMode::List => None,
            RetrievalMode::TwoLevel => match contour.border_type {
                BorderType::Outer => None,
                BorderType::Hole => contour.parent.and_then(|p| remap[p]),
            },
            RetrievalMode::Tree => contour.parent.and_then(|p| remap[p]),
        };

        let points = contour.points.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>();
        let points = match approx {
            ContourApprox::None => points,
            ContourApprox::Simple => compress(&points),
        };

        contours.push(Contour { points });
        parents.push(parent);
    }

    Contours { contours, hierarchy: link(&parents) }
}

/// The number of ancestors of contour `i`, or `None` if the parent links loop.
fn depth(hierarchy: &[HierarchyNode], mut i: usize) -> Option<u32> {
    let mut depth = 0;
    while let Some(parent) = hierarchy.get(i).and_then(|node| node.parent) {
        depth += 1;
        if depth as usize > hierarchy.len() {
            return None;
        }
        i = parent;
    }
    Some(depth)
}

/// Whether contour `i` lies at most `max_depth` levels below `root`.
///
/// Parent links that loop without reaching `root` count as unrelated.
fn within(hierarchy: &[HierarchyNode], root: usize, mut i: usize, max_depth: u32) -> bool {
    let mut levels = 0;
    loop {
        if i == root {
            return true;
        }
        if levels >= max_depth || levels as usize > hierarchy.len() {
            return false;
        }
        match hierarchy.get(i).and_then(|node| node.parent) {
            Some(parent) => i = parent,
            None => return false,
        }
        levels += 1;
    }
}

/// Writes single pixels of one color into an [`Image`], ignoring out of bounds points.
struct Painter<'a> {
    /// The target image.
    image: &'a mut Image,
    /// The bytes of one pixel in the image's layout.
    pixel: Vec<u8>,
    /// Offsets stamped around every plotted point.
    brush: Vec<[i32; 2]>,
}

impl<'a> Painter<'a> {
    /// Creates a painter for `style` on `image`.
    fn new(image: &'a mut Image, style: &DrawStyle) -> Self {
        let [r, g, b] = [style.color.red, style.color.green, style.color.blue];
        let pixel = match image.channels() {
            Channels::Gray => vec![r],
            Channels::Rgb => vec![r, g, b],
            Channels::Rgba => vec![r, g, b, u8::MAX],
        };

        #[allow(clippy::cast_possible_wrap)]
        let radius = (style.thickness.max(1) / 2) as i32;
        let brush = (-radius..=radius)
            .flat_map(|dy| (-radius..=radius).map(move |dx| [dx, dy]))
            .filter(|[dx, dy]| dx * dx + dy * dy <= radius * radius)
            .collect();

        Self { image, pixel, brush }
    }

    /// Stamps the brush centered at `(x, y)`.
    #[allow(clippy::cast_sign_loss)]
    fn plot(&mut self, x: i32, y: i32) {
        let (width, height) = self.image.dimensions();
        let n = self.pixel.len();
        for &[dx, dy] in &self.brush {
            let (px, py) = (x + dx, y + dy);
            if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                continue;
            }
            let start = (py as usize * width as usize + px as usize) * n;
            self.image.as_raw_mut()[start..start + n].copy_from_slice(&self.pixel);
        }
    }

    /// Draws a straight segment from `a` to `b`, both ends included.
    fn segment(&mut self, a: [i32; 2], b: [i32; 2], line: LineType) {
        match line {
            LineType::Connected8 => {
                #[allow(clippy::cast_precision_loss)]
                let iter = BresenhamLineIter::new((a[0] as f32, a[1] as f32), (b[0] as f32, b[1] as f32));
                for (x, y) in iter {
                    self.plot(x, y);
                }
            }
            LineType::Connected4 => {
                let [mut x, mut y] = a;
                let dx = (b[0] - x).abs();
                let dy = -(b[1] - y).abs();
                let sx = if x < b[0] { 1 } else { -1 };
                let sy = if y < b[1] { 1 } else { -1 };
                let mut err = dx + dy;
                loop {
                    self.plot(x, y);
                    if x == b[0] && y == b[1] {
                        break;
                    }
                    let e2 = 2 * err;
                    if e2 - dy > dx - e2 {
                        err += dy;
                        x += sx;
                    } else {
                        err += dx;
                        y += sy;
                    }
                }
            }
        }
    }

    /// Draws the closed polyline through `points`.
    fn polyline(&mut self, points: &[[i32; 2]], line: LineType) {
        match points {
            [] => {}
            &[[x, y]] => self.plot(x, y),
            _ => {
                for (i, &a) in points.iter().enumerate() {
                    self.segment(a, points[(i + 1) % points.len()], line);
                }
            }
        }
    }
}

/// Draws the selected contours onto `image`. `index` must already be in range.
pub(super) fn draw(image: &mut Image, contours: &Contours, index: Option<usize>, style: &DrawStyle) {
    let hierarchy = &contours.hierarchy;
    let selected = |i: usize| match index {
        Some(root) => within(hierarchy, root, i, style.max_depth),
        None => hierarchy.is_empty() || depth(hierarchy, i).is_some_and(|d| d <= style.max_depth),
    };

    let mut painter = Painter::new(image, style);
    for (i, contour) in contours.contours.iter().enumerate() {
        if selected(i) {
            painter.polyline(&contour.points, style.line);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use palette::Srgb;

    /// An 11×11 binary image: a square ring with a 5×5 hole and a dot inside the hole.
    fn ring_with_dot() -> GrayImage {
        GrayImage::from_fn(11, 11, |x, y| {
            let in_square = (1..=9).contains(&x) && (1..=9).contains(&y);
            let in_hole = (3..=7).contains(&x) && (3..=7).contains(&y);
            let dot = x == 5 && y == 5;
            image::Luma([if (in_square && !in_hole) || dot { 255 } else { 0 }])
        })
    }

    fn parents(contours: &Contours) -> Vec<Option<usize>> {
        contours.hierarchy.iter().map(|n| n.parent).collect()
    }

    #[test]
    fn simple_approximation_keeps_corners() {
        let image = GrayImage::from_fn(8, 8, |x, y| {
            image::Luma([if (2..5).contains(&x) && (2..6).contains(&y) { 255 } else { 0 }])
        });
        let found = find(&image, RetrievalMode::List, ContourApprox::Simple);
        assert_eq!(found.len(), 1);

        let mut corners = found.contours[0].points.clone();
        corners.sort_unstable();
        assert_eq!(corners, [[2, 2], [2, 5], [4, 2], [4, 5]]);

        let full = find(&image, RetrievalMode::List, ContourApprox::None);
        assert_eq!(full.contours[0].points.len(), 10);
    }

    #[test]
    fn retrieval_modes_shape_the_hierarchy() {
        let image = ring_with_dot();

        let tree = find(&image, RetrievalMode::Tree, ContourApprox::Simple);
        assert_eq!(parents(&tree), [None, Some(0), Some(1)]);
        assert_eq!(tree.hierarchy[0].first_child, Some(1));
        assert_eq!(tree.hierarchy[1].first_child, Some(2));

        let two_level = find(&image, RetrievalMode::TwoLevel, ContourApprox::Simple);
        assert_eq!(parents(&two_level), [None, Some(0), None]);
        assert_eq!(two_level.hierarchy[0].next, Some(2));
        assert_eq!(two_level.hierarchy[2].previous, Some(0));
        assert_eq!(two_level.hierarchy[0].first_child, Some(1));

        let list = find(&image, RetrievalMode::List, ContourApprox::Simple);
        assert_eq!(parents(&list), [None; 3]);

        let external = find(&image, RetrievalMode::External, ContourApprox::Simple);
        assert_eq!(external.len(), 1);
        assert_eq!(external.contours[0], tree.contours[0]);
    }

    #[test]
    fn blank_image_has_no_contours() {
        let found = find(&GrayImage::new(6, 4), RetrievalMode::TwoLevel, ContourApprox::Simple);
        assert!(found.is_empty());
        assert!(found.hierarchy.is_empty());
    }

    #[test]
    fn draws_closed_outline() {
        let contours = Contours {
            contours: vec![Contour { points: vec![[1, 1], [4, 1], [4, 3], [1, 3]] }],
            hierarchy: vec![HierarchyNode::default()],
        };
        let mut image = Image::new(6, 5, Channels::Rgb);
        draw(&mut image, &contours, None, &DrawStyle::new(Srgb::new(0, 255, 0)));

        for y in 0..5 {
            for x in 0..6 {
                let on_border = (1..=4).contains(&x)
                    && (1..=3).contains(&y)
                    && (x == 1 || x == 4 || y == 1 || y == 3);
                let expected: &[u8] = if on_border { &[0, 255, 0] } else { &[0, 0, 0] };
                assert_eq!(image.pixel(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn max_depth_limits_nested_drawing() {
        let found = find(&ring_with_dot(), RetrievalMode::Tree, ContourApprox::Simple);
        let style = DrawStyle::new(Srgb::new(255, 255, 255)).max_depth(0);

        let mut outer_only = Image::new(11, 11, Channels::Gray);
        draw(&mut outer_only, &found, None, &style);
        assert_eq!(outer_only.pixel(5, 5), [0]);
        assert_eq!(outer_only.pixel(1, 1), [255]);

        let mut everything = Image::new(11, 11, Channels::Gray);
        draw(&mut everything, &found, None, &style.max_depth(100));
        assert_eq!(everything.pixel(5, 5), [255]);

        let mut hole_subtree = Image::new(11, 11, Channels::Gray);
        draw(&mut hole_subtree, &found, Some(1), &style.max_depth(1));
        assert_eq!(hole_subtree.pixel(5, 5), [255]);
        assert_eq!(hole_subtree.pixel(1, 1), [0]);
    }

    #[test]
    fn looping_parents_stop_subtree_search() {
        let node = |parent| HierarchyNode { parent: Some(parent), ..HierarchyNode::default() };
        let contours = Contours {
            contours: vec![
                Contour { points: vec![[0, 0]] },
                Contour { points: vec![[2, 0]] },
                Contour { points: vec![[4, 0]] },
            ],
            // 1 and 2 are each other's parent, 0 is a root
            hierarchy: vec![HierarchyNode::default(), node(2), node(1)],
        };
        assert!(!within(&contours.hierarchy, 0, 1, u32::MAX));
        assert_eq!(depth(&contours.hierarchy, 1), None);

        let mut image = Image::new(5, 1, Channels::Gray);
        draw(&mut image, &contours, Some(0), &DrawStyle::new(Srgb::new(7, 7, 7)));
        assert_eq!(image.as_raw(), [7, 0, 0, 0, 0]);
    }

    #[test]
    fn four_connected_lines_have_no_diagonal_steps() {
        let mut image = Image::new(4, 4, Channels::Gray);
        let style = DrawStyle::new(Srgb::new(9, 9, 9));
        let mut painter = Painter::new(&mut image, &style);
        painter.segment([0, 0], [3, 3], LineType::Connected4);
        assert_eq!(image.as_raw().iter().filter(|&&v| v == 9).count(), 7);

        let mut image = Image::new(4, 4, Channels::Gray);
        let mut painter = Painter::new(&mut image, &style);
        painter.segment([0, 0], [3, 3], LineType::Connected8);
        assert_eq!(image.as_raw().iter().filter(|&&v| v == 9).count(), 4);
    }

    #[test]
    fn thick_lines_stamp_discs() {
        let mut image = Image::new(7, 7, Channels::Rgba);
        let style = DrawStyle::new(Srgb::new(1, 2, 3)).thickness(3);
        Painter::new(&mut image, &style).plot(3, 3);
        assert_eq!(image.pixels().filter(|p| *p == [1, 2, 3, 255]).count(), 5);
        assert_eq!(image.pixel(2, 2), [0, 0, 0, 0]);
    }
}
