//! Remote key derivation for like documents

use crate::library::Track;

const UNTITLED: &str = "untitled";

/// Key of a track's like document: its id, or a slug of its title.
///
/// Never empty.
pub fn remote_key_for(track: &Track) -> String {
    let id = track.id.trim();
    if !id.is_empty() {
        return id.to_string();
    }
    slugify(&track.title)
}

/// Lowercase the title and join its words with `-`
pub fn slugify(title: &str) -> String {
    let slug = title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        UNTITLED.to_string()
    } else {
        slug
    }
}
