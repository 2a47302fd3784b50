use crate::model::Rect;

pub mod maxrects;

/// A packer places rectangles into one fixed-size bin.
///
/// Implementations must never overlap a new rectangle with earlier ones and
/// never backtrack a prior placement. `insert` returns `None` when the request
/// fits no free space in any allowed orientation; that is the bin-full signal,
/// not an error.
pub trait Packer {
    /// Places a `w`x`h` request, returning the occupied rectangle. When the
    /// request was rotated the returned `w`/`h` are swapped.
    fn insert(&mut self, w: u32, h: u32, allow_rotate: bool) -> Option<Rect>;
}
