use std::ops::Range;

/// Splits `len` items into `parts` contiguous, disjoint ranges of
/// `len / parts` items each; the last range absorbs the remainder.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }
    let per_part = len / parts;
    (0..parts)
        .map(|idx| {
            let start = idx * per_part;
            let end = if idx + 1 == parts {
                len
            } else {
                start + per_part
            };
            start..end
        })
        .collect()
}

/// Range of the 1-based `worker_id` out of `workers`.
pub fn worker_range(len: usize, workers: usize, worker_id: usize) -> Option<Range<usize>> {
    if worker_id == 0 {
        return None;
    }
    partition(len, workers).into_iter().nth(worker_id - 1)
}
