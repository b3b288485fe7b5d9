use super::{KeyValueSlot, erase_collection, load_collection, persist_collection};
use crate::types::{GalleryEntry, InlineImage};
use std::sync::Arc;

pub const GALLERY_KEY: &str = "imageGallery";

/// Every image generated so far, independent of the conversation log.
pub struct Gallery {
    slot: Arc<dyn KeyValueSlot>,
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn load(slot: Arc<dyn KeyValueSlot>) -> Self {
        let entries = load_collection(slot.as_ref(), GALLERY_KEY).unwrap_or_default();
        Self { slot, entries }
    }

    /// Oldest first.
    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add an image. Timestamps identify entries, so one that would not be
    /// newer than the latest entry is moved just past it.
    pub fn append(&mut self, image: InlineImage, prompt: impl Into<String>, timestamp: i64) -> &GalleryEntry {
        let timestamp = match self.entries.iter().map(|e| e.timestamp).max() {
            Some(latest) if timestamp <= latest => latest + 1,
            _ => timestamp,
        };
        self.entries.push(GalleryEntry {
            image,
            prompt: prompt.into(),
            timestamp,
        });
        persist_collection(self.slot.as_ref(), GALLERY_KEY, &self.entries);
        &self.entries[self.entries.len() - 1]
    }

    /// Remove the entry with `timestamp`. Returns whether one was removed.
    pub fn delete(&mut self, timestamp: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.timestamp != timestamp);
        let removed = self.entries.len() != before;
        if removed {
            persist_collection(self.slot.as_ref(), GALLERY_KEY, &self.entries);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        erase_collection(self.slot.as_ref(), GALLERY_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySlot;

    fn image(byte: u8) -> InlineImage {
        InlineImage::from_bytes("image/jpeg", &[byte])
    }

    #[test]
    fn appends_are_monotonic_with_distinct_timestamps() {
        let slot = Arc::new(MemorySlot::new());
        let mut gallery = Gallery::load(slot.clone());
        for i in 0..5u8 {
            // same millisecond every time
            gallery.append(image(i), format!("prompt {i}"), 1_000);
        }
        assert_eq!(gallery.len(), 5);
        let mut stamps: Vec<i64> = gallery.entries().iter().map(|e| e.timestamp).collect();
        stamps.dedup();
        assert_eq!(stamps, [1_000, 1_001, 1_002, 1_003, 1_004]);

        let reloaded = Gallery::load(slot);
        assert_eq!(reloaded.entries(), gallery.entries());
    }

    #[test]
    fn delete_by_timestamp() {
        let slot = Arc::new(MemorySlot::new());
        let mut gallery = Gallery::load(slot.clone());
        gallery.append(image(1), "one", 10);
        gallery.append(image(2), "two", 20);

        assert!(gallery.delete(10));
        assert!(!gallery.delete(10));
        assert_eq!(gallery.entries().len(), 1);
        assert_eq!(gallery.entries()[0].prompt, "two");
        assert_eq!(Gallery::load(slot).len(), 1);
    }

    #[test]
    fn clear_erases_the_slot() {
        let slot = Arc::new(MemorySlot::new());
        let mut gallery = Gallery::load(slot.clone());
        gallery.append(image(1), "one", 10);
        gallery.clear();
        assert!(gallery.is_empty());
        assert_eq!(slot.read(GALLERY_KEY).unwrap(), None);
    }
}
