// Paired-end scoring
//
// Combines per-mate alignments (or per-mate NAMs) into ranked pair
// candidates. Geometric consistency enters as the log-density of the
// observed distance under the current insert-size estimate; pairs outside
// the expected geometry fall back to a flat penalty on the summed mate
// scores.

use rustc_hash::FxHashSet;

use crate::alignment::Alignment;
use crate::nam::Nam;

/// A joint NAM candidate for one mate pair. A missing side means the mate
/// has no seed of its own and must be rescued from its partner's geometry.
#[derive(Clone, Debug)]
pub struct NamPair {
    pub n_hits: u32,
    pub nam1: Option<Nam>,
    pub nam2: Option<Nam>,
}

/// A scored pair of mate alignments
#[derive(Clone, Debug)]
pub struct ScoredAlignmentPair {
    pub score: f64,
    pub alignment1: Alignment,
    pub alignment2: Alignment,
}

/// Density of the normal distribution N(m, s) at x
pub fn normal_pdf(x: f32, m: f32, s: f32) -> f32 {
    const INV_SQRT_2PI: f32 = 0.3989422804014327;
    let a = (x - m) / s;
    INV_SQRT_2PI / s * (-0.5 * a * a).exp()
}

/// Coordinate-level proper pair test: both mates aligned to the same
/// contig, converging orientations, distance within mu + 10 sigma.
pub fn is_proper_pair(alignment1: &Alignment, alignment2: &Alignment, mu: f32, sigma: f32) -> bool {
    let dist = alignment2.ref_start - alignment1.ref_start;
    let same_reference = alignment1.ref_id == alignment2.ref_id;
    let both_aligned = same_reference && !alignment1.is_unaligned && !alignment2.is_unaligned;
    // r1 ---> <--- r2
    let r1_r2 = !alignment1.is_rc && alignment2.is_rc && dist >= 0;
    // r2 ---> <--- r1
    let r2_r1 = !alignment2.is_rc && alignment1.is_rc && dist <= 0;
    let insert_good = (dist.abs() as f32) < mu + 10.0 * sigma;

    both_aligned && insert_good && (r1_r2 || r2_r1)
}

/// Seed-level proper pair test on extrapolated whole-read start positions
pub fn is_proper_nam_pair(nam1: &Nam, nam2: &Nam, mu: f32, sigma: f32) -> bool {
    if nam1.ref_id != nam2.ref_id || nam1.is_rc == nam2.is_rc {
        return false;
    }
    let a = (nam1.ref_start - nam1.query_start).max(0);
    let b = (nam2.ref_start - nam2.query_start).max(0);

    // r1 ---> <--- r2
    let r1_r2 = nam2.is_rc && a <= b && ((b - a) as f32) < mu + 10.0 * sigma;
    // r2 ---> <--- r1
    let r2_r1 = nam1.is_rc && b <= a && ((a - b) as f32) < mu + 10.0 * sigma;

    r1_r2 || r2_r1
}

/// Score the Cartesian product of two per-mate alignment sets.
///
/// Pairs in converging orientation within mu + 4 sigma collect the
/// insert-size log-density; everything else is treated as two independent
/// mappings and pays a flat 10 (the log-density of a distance beyond 4
/// sigma). Result is sorted by score, best first, stable over ties.
pub fn get_best_scoring_pairs(
    alignments1: &[Alignment],
    alignments2: &[Alignment],
    mu: f32,
    sigma: f32,
) -> Vec<ScoredAlignmentPair> {
    let mut pairs = Vec::with_capacity(alignments1.len() * alignments2.len());
    for a1 in alignments1 {
        for a2 in alignments2 {
            let dist = (a1.ref_start - a2.ref_start).abs() as f32;
            let mut score = (a1.score + a2.score) as f64;
            if (a1.is_rc ^ a2.is_rc) && dist < mu + 4.0 * sigma {
                score += (normal_pdf(dist, mu, sigma) as f64).ln();
            } else {
                score -= 10.0;
            }
            pairs.push(ScoredAlignmentPair {
                score,
                alignment1: a1.clone(),
                alignment2: a2.clone(),
            });
        }
    }
    pairs.sort_by(|a, b| b.score.total_cmp(&a.score));
    pairs
}

/// Combine two score-sorted NAM lists into joint candidates ranked by
/// summed hit count.
///
/// Proper NAM pairs are collected first; NAMs left unpaired are appended as
/// singletons with the other side missing, gated at half the highest joint
/// hit count (or half their own side's top hit count when no joint pair
/// exists).
pub fn get_best_scoring_nam_locations(
    nams1: &[Nam],
    nams2: &[Nam],
    mu: f32,
    sigma: f32,
) -> Vec<NamPair> {
    let mut joint_nam_scores = Vec::new();
    if nams1.is_empty() && nams2.is_empty() {
        return joint_nam_scores;
    }

    let mut added_n1: FxHashSet<usize> = FxHashSet::default();
    let mut added_n2: FxHashSet<usize> = FxHashSet::default();
    let mut hjss = 0u32; // highest joint seed count seen
    for n1 in nams1 {
        for n2 in nams2 {
            if n1.n_hits + n2.n_hits < hjss / 2 {
                break;
            }
            if is_proper_nam_pair(n1, n2, mu, sigma) {
                let joint_hits = n1.n_hits + n2.n_hits;
                joint_nam_scores.push(NamPair {
                    n_hits: joint_hits,
                    nam1: Some(n1.clone()),
                    nam2: Some(n2.clone()),
                });
                added_n1.insert(n1.nam_id);
                added_n2.insert(n2.nam_id);
                if joint_hits > hjss {
                    hjss = joint_hits;
                }
            }
        }
    }

    if !nams1.is_empty() {
        let hjss1 = if hjss > 0 { hjss } else { nams1[0].n_hits };
        for n1 in nams1 {
            if n1.n_hits < hjss1 / 2 {
                break;
            }
            if added_n1.contains(&n1.nam_id) {
                continue;
            }
            joint_nam_scores.push(NamPair {
                n_hits: n1.n_hits,
                nam1: Some(n1.clone()),
                nam2: None,
            });
        }
    }

    if !nams2.is_empty() {
        let hjss2 = if hjss > 0 { hjss } else { nams2[0].n_hits };
        for n2 in nams2 {
            if n2.n_hits < hjss2 / 2 {
                break;
            }
            if added_n2.contains(&n2.nam_id) {
                continue;
            }
            joint_nam_scores.push(NamPair {
                n_hits: n2.n_hits,
                nam1: None,
                nam2: Some(n2.clone()),
            });
        }
    }

    joint_nam_scores.sort_by(|a, b| b.n_hits.cmp(&a.n_hits));
    joint_nam_scores
}
