use crate::config::SiftConfig;

/// One emitted line: position in the file and its distance.
pub type ScoredLine = (usize, f32);

/// A contiguous run of emitted lines from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyBlock {
    pub lines: Vec<ScoredLine>,
}

/// Walk the per-line distances and emit outliers with their surrounding
/// context, merging nearby outliers into continuous runs.
///
/// A trailing-context line advances the last-outlier anchor, so the next
/// outlier is compared against the end of the previous block rather than
/// its last outlier: two outliers whose positions differ by exactly
/// `after_context + merge_distance - 1` still land in one run. Gap lines
/// between merged outliers are back-filled so runs stay contiguous.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn collect(distances: &[f32], config: &SiftConfig) -> Vec<ScoredLine> {
    let mut emitted: Vec<ScoredLine> = Vec::new();
    let mut last_outlier = i64::MIN;
    let mut remaining_after = 0usize;

    for (pos, &distance) in distances.iter().enumerate() {
        let pos_i = pos as i64;
        if distance >= config.threshold {
            if pos_i.saturating_sub(last_outlier) >= config.merge_distance as i64 {
                // Too far from the previous block: anchor a fresh one
                // just before the leading context.
                last_outlier = (pos_i - 1 - config.before_context as i64).max(-1);
            }
            for prev in (last_outlier + 1)..pos_i {
                let prev = prev as usize;
                emitted.push((prev, distances[prev]));
            }
            emitted.push((pos, distance));
            last_outlier = pos_i;
            remaining_after = config.after_context;
        } else if remaining_after > 0 {
            emitted.push((pos, distance));
            remaining_after -= 1;
            last_outlier = pos_i;
        }
    }
    emitted
}

/// Split the emitted stream into its maximal contiguous runs. A position
/// that does not directly follow its predecessor starts a new block.
pub fn into_blocks(emitted: &[ScoredLine]) -> Vec<AnomalyBlock> {
    let mut blocks: Vec<AnomalyBlock> = Vec::new();
    for &(pos, distance) in emitted {
        let extends = blocks
            .last()
            .and_then(|b| b.lines.last())
            .is_some_and(|&(last, _)| pos == last + 1);
        if extends {
            if let Some(block) = blocks.last_mut() {
                block.lines.push((pos, distance));
            }
        } else {
            blocks.push(AnomalyBlock {
                lines: vec![(pos, distance)],
            });
        }
    }
    blocks
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config(threshold: f32, merge: usize, before: usize, after: usize) -> SiftConfig {
        SiftConfig {
            threshold,
            merge_distance: merge,
            before_context: before,
            after_context: after,
            ..SiftConfig::default()
        }
    }

    /// 30 quiet lines with outliers planted at the given positions.
    fn distances(outliers: &[usize]) -> Vec<f32> {
        let mut d = vec![0.0_f32; 30];
        for &pos in outliers {
            d[pos] = 0.9;
        }
        d
    }

    fn positions(emitted: &[ScoredLine]) -> Vec<usize> {
        emitted.iter().map(|&(pos, _)| pos).collect()
    }

    #[test]
    fn no_outliers_no_output() {
        let emitted = collect(&distances(&[]), &config(0.2, 5, 2, 2));
        assert!(emitted.is_empty());
    }

    #[test]
    fn lone_outlier_with_context() {
        let emitted = collect(&distances(&[20]), &config(0.2, 5, 3, 2));
        assert_eq!(positions(&emitted), vec![17, 18, 19, 20, 21, 22]);
        let blocks = into_blocks(&emitted);
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn zero_context_zero_merge_emits_only_outliers() {
        let emitted = collect(&distances(&[5, 9]), &config(0.2, 0, 0, 0));
        assert_eq!(positions(&emitted), vec![5, 9]);
        assert_eq!(into_blocks(&emitted).len(), 2);
    }

    #[test]
    fn nearby_outliers_merge_into_one_block() {
        let emitted = collect(&distances(&[20, 24]), &config(0.2, 5, 3, 2));
        assert_eq!(
            positions(&emitted),
            vec![17, 18, 19, 20, 21, 22, 23, 24, 25, 26]
        );
        assert_eq!(into_blocks(&emitted).len(), 1);
    }

    #[test]
    fn trailing_context_extends_merge_reach() {
        // Positions differing by after_context + merge_distance - 1
        // merge: the context lines moved the anchor forward.
        let cfg = config(0.2, 3, 3, 2);
        let merged = collect(&distances(&[20, 24]), &cfg);
        assert_eq!(into_blocks(&merged).len(), 1);

        // One line further apart: a separate block, re-anchored with its
        // own leading context.
        let split = collect(&distances(&[20, 25]), &cfg);
        let blocks = into_blocks(&split);
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            positions(&split),
            vec![17, 18, 19, 20, 21, 22, 22, 23, 24, 25, 26, 27]
        );
    }

    #[test]
    fn outlier_at_file_start_clamps_context() {
        let emitted = collect(&distances(&[1]), &config(0.2, 5, 3, 1));
        assert_eq!(positions(&emitted), vec![0, 1, 2]);
    }

    #[test]
    fn outlier_at_file_end_truncates_after_context() {
        let mut d = distances(&[]);
        let last = d.len() - 1;
        d[last] = 0.9;
        let emitted = collect(&d, &config(0.2, 5, 1, 3));
        assert_eq!(positions(&emitted), vec![last - 1, last]);
    }

    #[test]
    fn context_lines_carry_their_own_distances() {
        let mut d = distances(&[10]);
        d[9] = 0.1;
        let emitted = collect(&d, &config(0.2, 5, 1, 0));
        assert_eq!(emitted, vec![(9, 0.1), (10, 0.9)]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut d = vec![0.0_f32; 5];
        d[2] = 0.2;
        let emitted = collect(&d, &config(0.2, 0, 0, 0));
        assert_eq!(positions(&emitted), vec![2]);
    }

    #[test]
    fn blocks_split_on_gaps() {
        let emitted = vec![(1, 0.9), (2, 0.1), (7, 0.9), (8, 0.1)];
        let blocks = into_blocks(&emitted);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lines, vec![(1, 0.9), (2, 0.1)]);
        assert_eq!(blocks[1].lines, vec![(7, 0.9), (8, 0.1)]);
    }
}
