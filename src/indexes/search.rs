//! Doubling-probe binary search over the sorted element array of a node,
//! in a leftmost and a rightmost flavor.
//!
//! Both start from a power-of-two-aligned probe (`m = ceil(log2 count)`),
//! halve the step until it reaches zero, then disambiguate between the final
//! one or two candidates explicitly. With duplicate keys the leftmost flavor
//! lands on the first equal element and the rightmost on the last, e.g. for
//! keys `2 3 3 5 7 7 8`:
//!
//! ```text
//!   key       1  2  3  4  5  6  7  8  9
//!   leftmost  x  0  1  x  3  x  4  6  x
//!   rightmost x  0  2  x  3  x  5  6  x
//! ```
//!
//! The lookup/insert anchors fill the `x` slots: leftmost+lookup yields the
//! last element smaller than the key (the descent branch), rightmost+insert
//! yields the element to insert after; both report "before everything" as a
//! distinct outcome.

use std::cmp::Ordering;

use crate::block::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchPos {
    /// Exact match (left- or rightmost occurrence, per flavor).
    Found(usize),
    /// The key orders before every element.
    BeforeAll,
    /// No match; descent/insert anchor at this index.
    Anchor(usize),
    /// No match and no anchor was requested.
    NotFound,
}

#[inline]
fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

#[inline]
fn anchored(i: isize) -> SearchPos {
    if i < 0 {
        SearchPos::BeforeAll
    } else {
        SearchPos::Anchor(i as usize)
    }
}

/// Leftmost occurrence of `key`; with `with_anchor`, a miss yields the last
/// element ordering before the key instead of `NotFound`.
pub(crate) fn search_leftmost(elements: &[Element], key: &[u8], with_anchor: bool) -> SearchPos {
    let count = elements.len() as isize;
    let cmp = |i: isize| -> Ordering { elements[i as usize].key.as_slice().cmp(key) };

    if count == 0 || cmp(count - 1) == Ordering::Less {
        return if with_anchor { anchored(count - 1) } else { SearchPos::NotFound };
    }
    if cmp(0) == Ordering::Greater {
        return if with_anchor { SearchPos::BeforeAll } else { SearchPos::NotFound };
    }

    let m = ceil_log2(count as usize);
    let mut probe: isize = if m == 0 { 0 } else { (1isize << (m - 1)) - 1 };
    let mut diff: isize = if m < 2 { 0 } else { 1isize << (m - 2) };
    while diff > 0 {
        if probe < count && cmp(probe) == Ordering::Less {
            probe += diff;
        } else {
            probe -= diff;
        }
        diff /= 2;
    }

    if probe < count && cmp(probe) == Ordering::Equal {
        SearchPos::Found(probe as usize)
    } else if probe + 1 < count && cmp(probe + 1) == Ordering::Equal {
        SearchPos::Found((probe + 1) as usize)
    } else if with_anchor && probe < count && cmp(probe) == Ordering::Greater {
        anchored(probe - 1)
    } else if with_anchor && probe + 1 < count && cmp(probe + 1) == Ordering::Greater {
        anchored(probe)
    } else {
        SearchPos::NotFound
    }
}

/// Rightmost occurrence of `key`; with `with_anchor`, a miss yields the
/// element to insert after instead of `NotFound`.
pub(crate) fn search_rightmost(elements: &[Element], key: &[u8], with_anchor: bool) -> SearchPos {
    let count = elements.len() as isize;
    let cmp = |i: isize| -> Ordering { elements[i as usize].key.as_slice().cmp(key) };

    if count == 0 || cmp(count - 1) == Ordering::Less {
        return if with_anchor { anchored(count - 1) } else { SearchPos::NotFound };
    }
    if cmp(0) == Ordering::Greater {
        return if with_anchor { SearchPos::BeforeAll } else { SearchPos::NotFound };
    }

    let m = ceil_log2(count as usize);
    let mut probe: isize = if m == 0 { 0 } else { count - (1isize << (m - 1)) };
    let mut diff: isize = if m < 2 { 0 } else { 1isize << (m - 2) };
    while diff > 0 {
        if probe >= 0 && cmp(probe) == Ordering::Greater {
            probe -= diff;
        } else {
            probe += diff;
        }
        diff /= 2;
    }

    if probe >= 0 && probe < count && cmp(probe) == Ordering::Equal {
        SearchPos::Found(probe as usize)
    } else if probe >= 1 && cmp(probe - 1) == Ordering::Equal {
        SearchPos::Found((probe - 1) as usize)
    } else if with_anchor && probe >= 0 && probe < count && cmp(probe) == Ordering::Less {
        SearchPos::Anchor(probe as usize)
    } else if with_anchor && probe >= 1 && cmp(probe - 1) == Ordering::Less {
        SearchPos::Anchor((probe - 1) as usize)
    } else {
        SearchPos::NotFound
    }
}
