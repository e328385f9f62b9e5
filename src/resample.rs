// src/resample.rs

//! Nearest-neighbour scaling from DMD mirror resolution to framebuffer resolution.

use crate::pattern::PatternBuffer;

/// Source index for each destination index along one axis:
/// `floor(dst * src_len / dst_len)`, computed in integers so there is no drift.
fn index_map(src_len: usize, dst_len: usize) -> Vec<usize> {
    (0..dst_len)
        .map(|dst| ((dst as u64 * src_len as u64) / dst_len as u64) as usize)
        .collect()
}

/// Returns a `target_width` x `target_height` copy of `source` where each
/// output pixel takes the value of the source pixel it falls on. No blending.
///
/// When the target shape equals the source shape the buffer is cloned as is.
pub fn upscale_nearest(
    source: &PatternBuffer,
    target_width: usize,
    target_height: usize,
) -> PatternBuffer {
    if source.width() == target_width && source.height() == target_height {
        return source.clone();
    }

    let mut target = PatternBuffer::new(target_width, target_height);
    if source.is_empty() || target.is_empty() {
        return target;
    }

    let columns = index_map(source.width(), target_width);
    let rows = index_map(source.height(), target_height);

    let mut previous_row: Option<usize> = None;
    for (y, &src_y) in rows.iter().enumerate() {
        // Consecutive output rows often sample the same source row.
        if previous_row == Some(src_y) {
            target.copy_row_within(y - 1, y);
            continue;
        }
        let src_row = source.row(src_y);
        for (dst, &src_x) in target.row_mut(y).iter_mut().zip(columns.iter()) {
            *dst = src_row[src_x];
        }
        previous_row = Some(src_y);
    }

    log::trace!(
        "Upscaled {}x{} -> {}x{}",
        source.width(),
        source.height(),
        target_width,
        target_height
    );
    target
}
