use super::Packer;
use crate::model::Rect;

/// MaxRects free-list packer using the best-short-side-fit rule.
///
/// Candidates are scored by the shorter leftover side, ties broken by the
/// longer leftover side; on a full tie the first candidate seen wins, with
/// the upright orientation checked before the rotated one.
pub struct MaxRectsPacker {
    bin: Rect,
    free: Vec<Rect>,
    used: Vec<Rect>,
}

impl MaxRectsPacker {
    pub fn new(width: u32, height: u32) -> Self {
        let bin = Rect::new(0, 0, width, height);
        Self {
            bin,
            free: vec![bin],
            used: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.bin.w
    }

    pub fn height(&self) -> u32 {
        self.bin.h
    }

    /// Rectangles placed so far, in insertion order.
    pub fn used(&self) -> &[Rect] {
        &self.used
    }

    pub fn free_list_len(&self) -> usize {
        self.free.len()
    }

    fn score(fr: &Rect, w: u32, h: u32) -> (u32, u32) {
        let leftover_h = fr.w - w;
        let leftover_v = fr.h - h;
        (leftover_h.min(leftover_v), leftover_h.max(leftover_v))
    }

    fn find_position(&self, w: u32, h: u32, allow_rotate: bool) -> Option<Rect> {
        let mut best: Option<(Rect, (u32, u32))> = None;
        let mut consider = |candidate: Rect, score: (u32, u32)| match &best {
            Some((_, s)) if score >= *s => {}
            _ => best = Some((candidate, score)),
        };

        for fr in &self.free {
            if fr.w >= w && fr.h >= h {
                // perfect fit early-out
                if fr.w == w && fr.h == h {
                    return Some(Rect::new(fr.x, fr.y, w, h));
                }
                consider(Rect::new(fr.x, fr.y, w, h), Self::score(fr, w, h));
            }
            if allow_rotate && w != h && fr.w >= h && fr.h >= w {
                if fr.w == h && fr.h == w {
                    return Some(Rect::new(fr.x, fr.y, h, w));
                }
                consider(Rect::new(fr.x, fr.y, h, w), Self::score(fr, h, w));
            }
        }
        best.map(|(r, _)| r)
    }

    fn place_rect(&mut self, node: &Rect) {
        let mut new_free: Vec<Rect> = Vec::new();
        let mut i = 0usize;
        while i < self.free.len() {
            let fr = self.free[i];
            if fr.intersects(node) {
                self.free.swap_remove(i);
                split_free_node(fr, node, &mut new_free);
            } else {
                i += 1;
            }
        }
        new_free.retain(|r| !r.is_empty());
        self.free.extend(new_free);
        self.prune_free_list();
        self.used.push(*node);
    }

    /// Drops every free rectangle fully contained in another one.
    fn prune_free_list(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let a = self.free[i];
            let mut remove_i = false;
            let mut j = i + 1;
            while j < self.free.len() {
                let b = self.free[j];
                if b.contains(&a) {
                    remove_i = true;
                    break;
                }
                if a.contains(&b) {
                    self.free.remove(j);
                    continue;
                }
                j += 1;
            }
            if remove_i {
                self.free.remove(i);
            } else {
                i += 1;
            }
        }
    }
}

/// Splits `fr` around `node`, pushing the maximal leftover strips.
fn split_free_node(fr: Rect, node: &Rect, out: &mut Vec<Rect>) {
    let fr_x2 = fr.right();
    let fr_y2 = fr.bottom();
    let n_x2 = node.right();
    let n_y2 = node.bottom();

    if node.x < fr_x2 && n_x2 > fr.x {
        // Top
        if node.y > fr.y && node.y < fr_y2 {
            out.push(Rect::new(fr.x, fr.y, fr.w, node.y - fr.y));
        }
        // Bottom
        if n_y2 < fr_y2 {
            out.push(Rect::new(fr.x, n_y2, fr.w, fr_y2 - n_y2));
        }
    }
    if node.y < fr_y2 && n_y2 > fr.y {
        // Left
        if node.x > fr.x && node.x < fr_x2 {
            out.push(Rect::new(fr.x, fr.y, node.x - fr.x, fr.h));
        }
        // Right
        if n_x2 < fr_x2 {
            out.push(Rect::new(n_x2, fr.y, fr_x2 - n_x2, fr.h));
        }
    }
}

impl Packer for MaxRectsPacker {
    fn insert(&mut self, w: u32, h: u32, allow_rotate: bool) -> Option<Rect> {
        if w == 0 || h == 0 {
            return None;
        }
        let place = self.find_position(w, h, allow_rotate)?;
        self.place_rect(&place);
        Some(place)
    }
}
