//! Case-insensitive external-name to [`TagType`] lookup table.

use crate::tag::TagType;

const TABLE: &[(&str, TagType)] = &[
    ("artist", TagType::Artist),
    ("album", TagType::Album),
    ("title", TagType::Title),
    ("track", TagType::Track),
    ("name", TagType::Name),
    ("genre", TagType::Genre),
    ("date", TagType::Date),
    ("composer", TagType::Composer),
    ("performer", TagType::Performer),
    ("comment", TagType::Comment),
    ("disc", TagType::Disc),
];

/// A case-insensitive lookup table from external string names (as found in
/// a container's metadata, or a playlist's `#EXTINF`-style line) to the
/// internal [`TagType`] enumeration. Unknown names map to `None`.
pub struct TagTable;

impl TagTable {
    pub fn lookup(name: &str) -> Option<TagType> {
        TABLE.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, t)| *t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(TagTable::lookup("ARTIST"), Some(TagType::Artist));
        assert_eq!(TagTable::lookup("Artist"), Some(TagType::Artist));
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(TagTable::lookup("not-a-real-tag"), None);
    }
}
