// ============================================================
// Layer 4 — Rank Splitter
// ============================================================
// Partitions a list of input files across the processes of an
// offline run. Every process sees the same sorted file list and
// keeps only its own contiguous chunk:
//
//   chunk  = ceil(total / world_size)
//   rank r → items[r * chunk .. min((r + 1) * chunk, total)]
//
//   10 files, world_size 4 → chunk 3
//     rank 0: 0..3   rank 1: 3..6   rank 2: 6..9   rank 3: 9..10
//
// Trailing ranks may receive fewer items, or none at all when
// the list is short. Chunks never overlap and together cover
// every item exactly once.
//
// Reference: Rust Book §8 (Vectors)

/// Keep the contiguous chunk of `items` owned by `rank`.
///
/// `world_size` of 0 is treated as 1; a `rank` outside the world
/// gets an empty chunk.
pub fn split_by_rank<T>(mut items: Vec<T>, rank: usize, world_size: usize) -> Vec<T> {
    let world_size = world_size.max(1);
    let total      = items.len();
    let chunk      = total.div_ceil(world_size);

    let start = (rank * chunk).min(total);
    let end   = ((rank + 1) * chunk).min(total);

    // split_off(n) returns [n..) and leaves the prefix behind in `items`
    let mut tail = items.split_off(start);
    tail.truncate(end - start);

    tracing::debug!(
        "Rank {}/{}: {} of {} items (chunk {})",
        rank,
        world_size,
        tail.len(),
        total,
        chunk
    );

    tail
}
