//! Next/previous as index arithmetic over the catalog

/// Index of the next track, if any
pub fn next_index(index: usize, len: usize) -> Option<usize> {
    index.checked_add(1).filter(|&next| next < len)
}

/// Index of the previous track, if any
pub fn prev_index(index: usize) -> Option<usize> {
    index.checked_sub(1)
}
