/// One window of a paged listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub index: usize,
    /// Offset of `items[0]` within the full listing.
    pub offset: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Cut the `page_index`-th window of `page_size` items out of `items`.
///
/// Ordering and filtering are the caller's job. A page past the end is empty,
/// not an error. A zero `page_size` is treated as 1.
pub fn page<T>(items: &[T], page_index: usize, page_size: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let start = page_index.saturating_mul(page_size);
    let end = start.saturating_add(page_size);

    let window = if start >= items.len() {
        &items[..0]
    } else {
        &items[start..end.min(items.len())]
    };

    Page {
        items: window,
        index: page_index,
        offset: start,
        has_prev: page_index > 0,
        has_next: end < items.len(),
    }
}
