//! The fixed mood catalog shown on the first screen.
//!
//! Each mood maps to the phrase sent to the search collaborator.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mood {
    pub name: &'static str,
    pub description: &'static str,
    pub search_term: &'static str,
}

pub const MOODS: &[Mood] = &[
    Mood {
        name: "Happy",
        description: "Feeling joyful, content, or pleased",
        search_term: "happy upbeat music",
    },
    Mood {
        name: "Sad",
        description: "Feeling down, blue, or unhappy",
        search_term: "sad emotional music",
    },
    Mood {
        name: "Energetic",
        description: "Feeling excited, motivated, or dynamic",
        search_term: "energetic upbeat music",
    },
    Mood {
        name: "Romantic",
        description: "Feeling loving, tender, or passionate",
        search_term: "romantic love songs",
    },
    Mood {
        name: "Calm",
        description: "Feeling relaxed, peaceful, or tranquil",
        search_term: "calm relaxing music",
    },
    Mood {
        name: "Melancholy",
        description: "Feeling wistful, nostalgic, or reflective",
        search_term: "melancholy reflective music",
    },
    Mood {
        name: "Night",
        description: "Feeling mysterious, atmospheric, or deep",
        search_term: "atmospheric night music",
    },
    Mood {
        name: "Discover",
        description: "Discover new music across all emotions",
        search_term: "popular music mix",
    },
];

/// Look a mood up by name, ignoring case and surrounding whitespace.
pub fn find(mood: &str) -> Option<&'static Mood> {
    let mood = mood.trim();
    MOODS.iter().find(|m| m.name.eq_ignore_ascii_case(mood))
}

/// The phrase to search for `mood`; unknown moods are searched verbatim.
pub fn search_term_for(mood: &str) -> String {
    match find(mood) {
        Some(m) => m.search_term.to_string(),
        None => mood.trim().to_string(),
    }
}
