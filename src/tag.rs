//! Tag value and merge semantics.

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TagType {
    Artist,
    Album,
    Title,
    Track,
    Name,
    Genre,
    Date,
    Composer,
    Performer,
    Comment,
    Disc,
}

/// Ordered sequence of `(type, text)` items plus an optional duration.
///
/// Deep-copied on hand-off (`Clone`); immutable after publish — nothing in
/// this crate ever mutates a `Tag` once it has been attached to a
/// [`crate::chunk::MusicChunk`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tag {
    items: Vec<(TagType, String)>,
    duration: Option<f64>,
}

impl Tag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn push(mut self, ty: TagType, text: impl Into<String>) -> Self {
        self.items.push((ty, text.into()));
        self
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn items(&self) -> &[(TagType, String)] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.duration.is_none()
    }

    pub fn get(&self, ty: TagType) -> Option<&str> {
        self.items.iter().find(|(t, _)| *t == ty).map(|(_, v)| v.as_str())
    }

    /// Copies overlay's items, then fills in any item type present in
    /// `base` but absent from `overlay`.
    pub fn merge(base: &Tag, overlay: &Tag) -> Tag {
        let mut items = overlay.items.clone();
        for (ty, text) in &base.items {
            if !items.iter().any(|(t, _)| t == ty) {
                items.push((*ty, text.clone()));
            }
        }
        Tag {
            items,
            duration: overlay.duration.or(base.duration),
        }
    }
}
