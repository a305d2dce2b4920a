//! The playable item produced by the search collaborator.

/// A playable item: the platform's opaque video id plus display metadata.
///
/// Tracks are immutable once created; identity is the `id` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    /// Artist or channel name.
    pub artist: String,
    pub description: String,
    pub thumbnail_url: String,
}

impl Track {
    pub fn same_id(&self, other: &Track) -> bool {
        self.id == other.id
    }

    /// `Artist - Title`, or just the title when the artist is blank.
    pub fn display(&self) -> String {
        let artist = self.artist.trim();
        if artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", artist, self.title)
        }
    }
}
