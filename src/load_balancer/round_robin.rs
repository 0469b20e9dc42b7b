//! Round-robin load balancing strategy.

/// Return the index to use for a healthy sequence of length `len` and
/// advance `cursor` past it.
///
/// The cursor indexes the *current* healthy sequence, so when that sequence
/// shrinks below the cursor it restarts from the front.
pub fn next_index(cursor: &mut usize, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if *cursor >= len {
        *cursor = 0;
    }
    let index = *cursor;
    *cursor = (index + 1) % len;
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let mut cursor = 0;
        let picks: Vec<_> = (0..5).map(|_| next_index(&mut cursor, 2).unwrap()).collect();
        assert_eq!(picks, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn single_backend_always_selected() {
        let mut cursor = 0;
        for _ in 0..4 {
            assert_eq!(next_index(&mut cursor, 1), Some(0));
        }
    }

    #[test]
    fn cursor_resets_when_sequence_shrinks() {
        let mut cursor = 0;
        next_index(&mut cursor, 3);
        next_index(&mut cursor, 3);
        assert_eq!(cursor, 2);

        // Healthy set dropped to two backends.
        assert_eq!(next_index(&mut cursor, 2), Some(0));
        assert_eq!(next_index(&mut cursor, 2), Some(1));
    }

    #[test]
    fn even_distribution_over_many_rounds() {
        for k in 1..=7usize {
            let mut cursor = 0;
            let mut hits = vec![0usize; k];
            let m = 100;
            for _ in 0..m {
                hits[next_index(&mut cursor, k).unwrap()] += 1;
            }
            for count in hits {
                assert!(count == m / k || count == m.div_ceil(k), "k={k} count={count}");
            }
        }
    }

    #[test]
    fn empty_sequence_yields_nothing() {
        let mut cursor = 3;
        assert_eq!(next_index(&mut cursor, 0), None);
    }
}
