//! Chunked fork-join over particle index ranges.
//!
//! Scoped threads fan the index space out in contiguous chunks and a
//! channel collects one result per chunk. Results are returned in chunk
//! order so downstream merges are deterministic regardless of which
//! worker finished first.

use std::ops::Range;

use crossbeam_channel::unbounded;

/// Apply `f` to contiguous chunks of `0..len` across `workers` threads
/// and return the per-chunk results in chunk order.
pub fn map_chunks<R, F>(len: usize, workers: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(Range<usize>) -> R + Sync,
{
    if len == 0 {
        return Vec::new();
    }
    let workers = workers.max(1).min(len);
    if workers == 1 {
        return vec![f(0..len)];
    }

    let chunk = len.div_ceil(workers);
    let chunks = len.div_ceil(chunk);
    let (tx, rx) = unbounded::<(usize, R)>();

    std::thread::scope(|scope| {
        for (w, start) in (0..len).step_by(chunk).enumerate() {
            let end = (start + chunk).min(len);
            let tx = tx.clone();
            let f = &f;
            scope.spawn(move || {
                let out = f(start..end);
                // Receiver outlives the scope; send cannot fail.
                let _ = tx.send((w, out));
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<R>> = Vec::new();
    for _ in 0..chunks {
        slots.push(None);
    }
    for (w, out) in rx.iter() {
        slots[w] = Some(out);
    }
    slots
        .into_iter()
        .map(|slot| slot.expect("every chunk reports once"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_the_range_exactly_once() {
        for workers in [1, 2, 3, 7] {
            let ranges = map_chunks(100, workers, |r| r);
            let mut seen = vec![false; 100];
            for r in &ranges {
                for i in r.clone() {
                    assert!(!seen[i]);
                    seen[i] = true;
                }
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn results_arrive_in_chunk_order() {
        let starts: Vec<usize> = map_chunks(64, 4, |r| r.start);
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn empty_range_yields_no_chunks() {
        let out: Vec<usize> = map_chunks(0, 4, |r| r.start);
        assert!(out.is_empty());
    }

    #[test]
    fn worker_count_is_clamped_to_len() {
        let out = map_chunks(3, 16, |r| r.len());
        assert_eq!(out.iter().sum::<usize>(), 3);
    }
}
