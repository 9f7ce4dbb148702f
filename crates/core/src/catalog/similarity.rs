/// Scores how alike two strings are, in `0.0..=1.0`.
pub trait SimilarityMetric: Send + Sync {
    fn name(&self) -> &'static str;

    fn similarity(&self, left: &str, right: &str) -> f64;
}

impl<M: SimilarityMetric + ?Sized> SimilarityMetric for Box<M> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn similarity(&self, left: &str, right: &str) -> f64 {
        (**self).similarity(left, right)
    }
}

/// Longest-matching-blocks ratio: `2 * M / T`, where `M` is the number of
/// characters in matching blocks and `T` the combined length.
///
/// Blocks are found by taking the longest common run, then recursing on
/// the text to its left and right. Ties go to the run that starts first in
/// `left`, then first in `right`. No characters are treated as junk.
#[derive(Clone, Copy, Debug, Default)]
pub struct MatchingBlocksRatio;

impl SimilarityMetric for MatchingBlocksRatio {
    fn name(&self) -> &'static str {
        "matching_blocks"
    }

    fn similarity(&self, left: &str, right: &str) -> f64 {
        let left: Vec<char> = left.chars().collect();
        let right: Vec<char> = right.chars().collect();
        let total = left.len() + right.len();
        if total == 0 {
            return 1.0;
        }

        let matched = matched_characters(&left, &right);
        (2 * matched) as f64 / total as f64
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JaroWinkler;

impl SimilarityMetric for JaroWinkler {
    fn name(&self) -> &'static str {
        "jaro_winkler"
    }

    fn similarity(&self, left: &str, right: &str) -> f64 {
        strsim::jaro_winkler(left, right)
    }
}

fn matched_characters(left: &[char], right: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, left.len(), 0, right.len())];

    while let Some((left_lo, left_hi, right_lo, right_hi)) = pending.pop() {
        let (start_left, start_right, size) =
            longest_block(left, right, left_lo, left_hi, right_lo, right_hi);
        if size == 0 {
            continue;
        }

        matched += size;
        if left_lo < start_left && right_lo < start_right {
            pending.push((left_lo, start_left, right_lo, start_right));
        }
        if start_left + size < left_hi && start_right + size < right_hi {
            pending.push((start_left + size, left_hi, start_right + size, right_hi));
        }
    }

    matched
}

fn longest_block(
    left: &[char],
    right: &[char],
    left_lo: usize,
    left_hi: usize,
    right_lo: usize,
    right_hi: usize,
) -> (usize, usize, usize) {
    let width = right_hi - right_lo + 1;
    let mut best = (left_lo, right_lo, 0);
    // slot j - right_lo + 1 holds the length of the common run ending at j
    let mut previous = vec![0usize; width];
    let mut current = vec![0usize; width];

    for i in left_lo..left_hi {
        current.iter_mut().for_each(|slot| *slot = 0);
        for j in right_lo..right_hi {
            if left[i] != right[j] {
                continue;
            }
            let run = previous[j - right_lo] + 1;
            current[j - right_lo + 1] = run;
            if run > best.2 {
                best = (i + 1 - run, j + 1 - run, run);
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }

    best
}
