use crate::oci_registry::ImageDetail;
use std::collections::HashSet;

/// Picks the images to delete from a repository inventory.
///
/// The inventory must be ordered most-recent-first; the caller-imposed order
/// is authoritative and is never re-sorted here. Images carrying an in-use
/// tag are retained unconditionally. Of the remaining unused images the
/// first `max_images` entries are kept and the rest are marked for deletion,
/// so `max_images = 0` deletes every unused image.
pub fn select_for_deletion(
    inventory: Vec<ImageDetail>,
    in_use: Option<&HashSet<String>>,
    max_images: u32,
) -> Vec<ImageDetail> {
    let mut retained_unused: usize = 0;
    let mut to_delete = Vec::new();

    for image in inventory {
        let used = in_use.is_some_and(|tags| image.tags.iter().any(|tag| tags.contains(tag)));
        if used {
            continue;
        }

        // An untagged image is unused by definition: nothing can reference it
        if retained_unused < max_images as usize {
            retained_unused += 1;
        } else {
            to_delete.push(image);
        }
    }

    to_delete
}
