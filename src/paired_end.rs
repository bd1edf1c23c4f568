// Paired-end driver
//
// Four regimes on a pair of score-ranked NAM lists:
// - neither mate has seeds: unmapped pair
// - one mate has seeds: anchor on it and rescue the other
// - both have seeds and the top candidates already form a confident proper
//   pair: extend just those two (fast path)
// - otherwise: joint search over proper NAM pairs and singletons, with
//   per-NAM extension results memoized across candidates
//
// The fast path is also where the insert-size estimate warms up.

use rustc_hash::FxHashMap;

use crate::aligner::Aligner;
use crate::alignment::{Alignment, Details};
use crate::extend::extend_nam;
use crate::insert_size::InsertSizeDistribution;
use crate::mate_rescue::rescue_mate;
use crate::nam::{reverse_nam_if_needed, Nam};
use crate::pairing::{
    get_best_scoring_nam_locations, get_best_scoring_pairs, is_proper_nam_pair, is_proper_pair,
    normal_pdf, ScoredAlignmentPair,
};
use crate::params::MappingParameters;
use crate::read::{Read, SequenceRecord};
use crate::references::References;
use crate::sam::SamOutput;
use crate::single_end::get_mapq;

/// Hit-count dropoff of the top NAM relative to the runner-up.
///
/// Top NAMs with very few hits are never treated as confident (1.0); a
/// single candidate with more hits is maximally confident (0.0).
pub fn top_dropoff(nams: &[Nam]) -> f32 {
    let n_max = &nams[0];
    if n_max.n_hits <= 2 {
        return 1.0;
    }
    if nams.len() > 1 {
        nams[1].n_hits as f32 / n_max.n_hits as f32
    } else {
        0.0
    }
}

/// Joint MAPQ for both mates from the top-two pair scores
pub fn joint_mapq_from_alignment_scores(score1: f64, score2: f64) -> (u8, u8) {
    let mapq = if score1 == score2 {
        // At least two identical placements
        0
    } else if score1 > 0.0 && score2 > 0.0 {
        ((score1 - score2) as i32).min(60)
    } else if score1 > 0.0 {
        60
    } else {
        1
    };
    (mapq as u8, mapq as u8)
}

/// Joint MAPQ from the ranked pair list. When the two top entries are the
/// same placement (the individually-best pair duplicating the joint best),
/// the comparison falls through to the third entry.
fn joint_mapq_from_high_scores(high_scores: &[ScoredAlignmentPair]) -> (u8, u8) {
    if high_scores.len() <= 1 {
        return (60, 60);
    }
    let best = &high_scores[0];
    let second = &high_scores[1];
    let same_pos = best.alignment1.ref_start == second.alignment1.ref_start
        && best.alignment2.ref_start == second.alignment2.ref_start;
    let same_ref = best.alignment1.ref_id == second.alignment1.ref_id
        && best.alignment2.ref_id == second.alignment2.ref_id;
    if !same_pos || !same_ref {
        joint_mapq_from_alignment_scores(best.score, second.score)
    } else if high_scores.len() > 2 {
        joint_mapq_from_alignment_scores(best.score, high_scores[2].score)
    } else {
        (60, 60)
    }
}

/// Extend `nam`, reusing a previous extension of the same NAM when one is
/// memoized for this read pair
fn extended_alignment(
    aligner: &Aligner,
    memo: &mut FxHashMap<usize, Alignment>,
    nam: &Nam,
    read: &Read,
    references: &References,
    k: usize,
    details: &mut Details,
) -> Alignment {
    if let Some(alignment) = memo.get(&nam.nam_id) {
        return alignment.clone();
    }
    let mut nam = nam.clone();
    let consistent_nam = reverse_nam_if_needed(&mut nam, read, references, k);
    details.nam_inconsistent += !consistent_nam as usize;
    let alignment = extend_nam(aligner, &nam, references, read, consistent_nam);
    details.tried_alignment += 1;
    details.gapped += alignment.gapped as usize;
    memo.insert(nam.nam_id, alignment.clone());
    alignment
}

/// Anchor on the mate that has NAMs, and rescue the other from each
/// extended anchor placement.
#[allow(clippy::too_many_arguments)]
fn rescue_read(
    aligner: &Aligner,
    sam: &mut SamOutput,
    references: &References,
    nams_anchor: &mut [Nam],
    record_anchor: &SequenceRecord,
    record_rescued: &SequenceRecord,
    details: &mut [Details; 2],
    k: usize,
    mu: f32,
    sigma: f32,
    map_param: &MappingParameters,
    secondary_dropoff: f64,
    swap_r1r2: bool,
) {
    let (anchor_ix, rescued_ix) = if swap_r1r2 { (1, 0) } else { (0, 1) };
    let read_anchor = Read::new(&record_anchor.seq);
    let read_rescued = Read::new(&record_rescued.seq);
    let n_max = nams_anchor[0].clone();
    let mut tries = 0;

    let mut alignments_anchor: Vec<Alignment> = Vec::new();
    let mut alignments_rescued: Vec<Alignment> = Vec::new();
    for nam in nams_anchor.iter_mut() {
        let score_dropoff = nam.n_hits as f32 / n_max.n_hits as f32;
        if tries >= map_param.max_tries || score_dropoff < map_param.dropoff_threshold {
            break;
        }

        let consistent_nam = reverse_nam_if_needed(nam, &read_anchor, references, k);
        details[anchor_ix].nam_inconsistent += !consistent_nam as usize;
        let alignment = extend_nam(aligner, nam, references, &read_anchor, consistent_nam);
        details[anchor_ix].gapped += alignment.gapped as usize;
        details[anchor_ix].tried_alignment += 1;
        alignments_anchor.push(alignment);

        // Force SW alignment of the seedless mate near this placement
        let (rescued, attempted) = rescue_mate(
            aligner,
            nam,
            references,
            &read_anchor,
            &read_rescued,
            mu,
            sigma,
            k,
        );
        details[rescued_ix].mate_rescue += attempted as usize;
        alignments_rescued.push(rescued);

        tries += 1;
    }
    alignments_anchor.sort_by(|a, b| b.score.cmp(&a.score));
    alignments_rescued.sort_by(|a, b| b.score.cmp(&a.score));

    let high_scores = get_best_scoring_pairs(&alignments_anchor, &alignments_rescued, mu, sigma);
    let (record1, record2) = if swap_r1r2 {
        (record_rescued, record_anchor)
    } else {
        (record_anchor, record_rescued)
    };
    if high_scores.is_empty() {
        sam.add_unmapped_pair(record1, record2);
        return;
    }

    let (mut mapq_anchor, mut mapq_rescued) = if high_scores.len() > 1 {
        joint_mapq_from_alignment_scores(high_scores[0].score, high_scores[1].score)
    } else {
        (60, 60)
    };

    let max_out = if map_param.max_secondary == 0 {
        1
    } else {
        high_scores.len().min(map_param.max_secondary + 1)
    };
    let s_max = high_scores[0].score;
    for (i, pair) in high_scores.iter().take(max_out).enumerate() {
        let is_primary = i == 0;
        if !is_primary {
            mapq_anchor = 0;
            mapq_rescued = 0;
            if s_max - pair.score >= secondary_dropoff {
                break;
            }
        }
        let alignment_anchor = &pair.alignment1;
        let alignment_rescued = &pair.alignment2;
        if swap_r1r2 {
            let is_proper = is_proper_pair(alignment_rescued, alignment_anchor, mu, sigma);
            sam.add_pair(
                alignment_rescued,
                alignment_anchor,
                record1,
                record2,
                read_rescued.rc(),
                read_anchor.rc(),
                mapq_rescued,
                mapq_anchor,
                is_proper,
                is_primary,
                details,
            );
        } else {
            let is_proper = is_proper_pair(alignment_anchor, alignment_rescued, mu, sigma);
            sam.add_pair(
                alignment_anchor,
                alignment_rescued,
                record1,
                record2,
                read_anchor.rc(),
                read_rescued.rc(),
                mapq_anchor,
                mapq_rescued,
                is_proper,
                is_primary,
                details,
            );
        }
    }
}

/// Align one read pair from its two NAM lists (each sorted by score, best
/// first) and write SAM records.
#[allow(clippy::too_many_arguments)]
pub fn align_paired_end(
    aligner: &Aligner,
    sam: &mut SamOutput,
    nams1: &mut Vec<Nam>,
    nams2: &mut Vec<Nam>,
    record1: &SequenceRecord,
    record2: &SequenceRecord,
    k: usize,
    references: &References,
    details: &mut [Details; 2],
    isize_est: &mut InsertSizeDistribution,
    map_param: &MappingParameters,
) {
    let mu = isize_est.mu;
    let sigma = isize_est.sigma;
    let p = &aligner.parameters;
    let secondary_dropoff = (2 * p.mismatch + p.gap_open) as f64;

    if nams1.is_empty() && nams2.is_empty() {
        sam.add_unmapped_pair(record1, record2);
        return;
    }

    if !nams1.is_empty() && nams2.is_empty() {
        // Only read 1 has NAMs: attempt to rescue read 2
        rescue_read(
            aligner,
            sam,
            references,
            nams1,
            record1,
            record2,
            details,
            k,
            mu,
            sigma,
            map_param,
            secondary_dropoff,
            false,
        );
        return;
    }

    if nams1.is_empty() && !nams2.is_empty() {
        // Only read 2 has NAMs: attempt to rescue read 1
        rescue_read(
            aligner,
            sam,
            references,
            nams2,
            record2,
            record1,
            details,
            k,
            mu,
            sigma,
            map_param,
            secondary_dropoff,
            true,
        );
        return;
    }

    let read1 = Read::new(&record1.seq);
    let read2 = Read::new(&record2.seq);

    if top_dropoff(nams1) < map_param.dropoff_threshold
        && top_dropoff(nams2) < map_param.dropoff_threshold
        && is_proper_nam_pair(&nams1[0], &nams2[0], mu, sigma)
    {
        // Both top NAMs are unambiguous and already geometrically
        // consistent; extend them directly
        let mut n_max1 = nams1[0].clone();
        let mut n_max2 = nams2[0].clone();

        let consistent_nam1 = reverse_nam_if_needed(&mut n_max1, &read1, references, k);
        details[0].nam_inconsistent += !consistent_nam1 as usize;
        let consistent_nam2 = reverse_nam_if_needed(&mut n_max2, &read2, references, k);
        details[1].nam_inconsistent += !consistent_nam2 as usize;

        let alignment1 = extend_nam(aligner, &n_max1, references, &read1, consistent_nam1);
        details[0].tried_alignment += 1;
        details[0].gapped += alignment1.gapped as usize;
        let alignment2 = extend_nam(aligner, &n_max2, references, &read2, consistent_nam2);
        details[1].tried_alignment += 1;
        details[1].gapped += alignment2.gapped as usize;

        let mapq1 = get_mapq(nams1, &n_max1);
        let mapq2 = get_mapq(nams2, &n_max2);
        let is_proper = is_proper_pair(&alignment1, &alignment2, mu, sigma);
        sam.add_pair(
            &alignment1,
            &alignment2,
            record1,
            record2,
            read1.rc(),
            read2.rc(),
            mapq1,
            mapq2,
            is_proper,
            true,
            details,
        );

        if isize_est.sample_size < 400.0
            && alignment1.edit_distance + alignment2.edit_distance < 3
            && is_proper
        {
            isize_est.update((alignment1.ref_start - alignment2.ref_start).abs());
        }
        return;
    }

    // Full search for the highest-scoring pair over joint NAM candidates
    let joint_nam_scores = get_best_scoring_nam_locations(nams1, nams2, mu, sigma);
    let max_score = joint_nam_scores[0].n_hits;

    let mut is_aligned1: FxHashMap<usize, Alignment> = FxHashMap::default();
    let mut is_aligned2: FxHashMap<usize, Alignment> = FxHashMap::default();

    let mut a1_indv_max = extended_alignment(
        aligner,
        &mut is_aligned1,
        &nams1[0],
        &read1,
        references,
        k,
        &mut details[0],
    );
    let mut a2_indv_max = extended_alignment(
        aligner,
        &mut is_aligned2,
        &nams2[0],
        &read2,
        references,
        k,
        &mut details[1],
    );

    let mut high_scores: Vec<ScoredAlignmentPair> = Vec::new();
    let mut tries = 0;
    for pair in &joint_nam_scores {
        let score_dropoff = pair.n_hits as f32 / max_score as f32;
        if tries >= map_param.max_tries || score_dropoff < map_param.dropoff_threshold {
            break;
        }

        let (a1, a2) = match (&pair.nam1, &pair.nam2) {
            (Some(n1), Some(n2)) => {
                let a1 = extended_alignment(
                    aligner,
                    &mut is_aligned1,
                    n1,
                    &read1,
                    references,
                    k,
                    &mut details[0],
                );
                let a2 = extended_alignment(
                    aligner,
                    &mut is_aligned2,
                    n2,
                    &read2,
                    references,
                    k,
                    &mut details[1],
                );
                (a1, a2)
            }
            (Some(n1), None) => {
                let a1 = extended_alignment(
                    aligner,
                    &mut is_aligned1,
                    n1,
                    &read1,
                    references,
                    k,
                    &mut details[0],
                );
                // Force SW alignment to rescue the mate
                let mut guide = n1.clone();
                let (a2, attempted) =
                    rescue_mate(aligner, &mut guide, references, &read1, &read2, mu, sigma, k);
                details[1].mate_rescue += attempted as usize;
                details[1].tried_alignment += 1;
                (a1, a2)
            }
            (None, Some(n2)) => {
                let mut guide = n2.clone();
                let (a1, attempted) =
                    rescue_mate(aligner, &mut guide, references, &read2, &read1, mu, sigma, k);
                details[0].mate_rescue += attempted as usize;
                details[0].tried_alignment += 1;
                let a2 = extended_alignment(
                    aligner,
                    &mut is_aligned2,
                    &guide,
                    &read2,
                    references,
                    k,
                    &mut details[1],
                );
                (a1, a2)
            }
            (None, None) => continue,
        };

        if a1.score > a1_indv_max.score {
            a1_indv_max = a1.clone();
        }
        if a2.score > a2_indv_max.score {
            a2_indv_max = a2.clone();
        }

        // r1 ---> <--- r2
        let r1_r2 = a2.is_rc
            && a1.ref_start <= a2.ref_start
            && ((a2.ref_start - a1.ref_start) as f32) < mu + 10.0 * sigma;
        // r2 ---> <--- r1
        let r2_r1 = a1.is_rc
            && a2.ref_start <= a1.ref_start
            && ((a1.ref_start - a2.ref_start) as f32) < mu + 10.0 * sigma;
        let score = if r1_r2 || r2_r1 {
            let x = (a1.ref_start - a2.ref_start).abs() as f32;
            a1.score as f64 + a2.score as f64 + (normal_pdf(x, mu, sigma) as f64).ln()
        } else {
            // The log-density of a distance beyond 5 sigma, for any
            // reasonable spread
            a1.score as f64 + a2.score as f64 - 20.0
        };
        high_scores.push(ScoredAlignmentPair {
            score,
            alignment1: a1,
            alignment2: a2,
        });
        tries += 1;
    }

    // The individually best placements count as one more candidate pair
    let score_indv = a1_indv_max.score as f64 + a2_indv_max.score as f64 - 20.0;
    high_scores.push(ScoredAlignmentPair {
        score: score_indv,
        alignment1: a1_indv_max,
        alignment2: a2_indv_max,
    });
    high_scores.sort_by(|a, b| b.score.total_cmp(&a.score));

    let (mapq1, mapq2) = joint_mapq_from_high_scores(&high_scores);
    let best = &high_scores[0];
    if map_param.max_secondary == 0 {
        let is_proper = is_proper_pair(&best.alignment1, &best.alignment2, mu, sigma);
        sam.add_pair(
            &best.alignment1,
            &best.alignment2,
            record1,
            record2,
            read1.rc(),
            read2.rc(),
            mapq1,
            mapq2,
            is_proper,
            true,
            details,
        );
        return;
    }

    let max_out = high_scores.len().min(map_param.max_secondary + 1);
    let s_max = best.score;
    let mut prev_start_m1 = best.alignment1.ref_start;
    let mut prev_start_m2 = best.alignment2.ref_start;
    let mut prev_ref_id_m1 = best.alignment1.ref_id;
    let mut prev_ref_id_m2 = best.alignment2.ref_id;
    for (i, pair) in high_scores.iter().take(max_out).enumerate() {
        let is_primary = i == 0;
        let (m1, m2) = if is_primary { (mapq1, mapq2) } else { (255, 255) };
        if !is_primary {
            // Skip exact duplicates of the previously emitted placement
            // (the appended individually-best pair often repeats the best
            // joint pair)
            let same_pos = prev_start_m1 == pair.alignment1.ref_start
                && prev_start_m2 == pair.alignment2.ref_start;
            let same_ref = prev_ref_id_m1 == pair.alignment1.ref_id
                && prev_ref_id_m2 == pair.alignment2.ref_id;
            if same_pos && same_ref {
                continue;
            }
        }
        if s_max - pair.score < secondary_dropoff {
            let is_proper = is_proper_pair(&pair.alignment1, &pair.alignment2, mu, sigma);
            sam.add_pair(
                &pair.alignment1,
                &pair.alignment2,
                record1,
                record2,
                read1.rc(),
                read2.rc(),
                m1,
                m2,
                is_proper,
                is_primary,
                details,
            );
        } else {
            break;
        }
        prev_start_m1 = pair.alignment1.ref_start;
        prev_start_m2 = pair.alignment2.ref_start;
        prev_ref_id_m1 = pair.alignment1.ref_id;
        prev_ref_id_m2 = pair.alignment2.ref_id;
    }
}

/// Mapping-only (PAF) location choice: the best proper NAM pair if its
/// summed seed score beats the halved scores of the individually best
/// NAMs, otherwise the individual top NAMs. Feeds the insert-size
/// estimator while it is still warming up.
pub fn get_best_map_location(
    nams1: &[Nam],
    nams2: &[Nam],
    isize_est: &mut InsertSizeDistribution,
) -> (Option<Nam>, Option<Nam>) {
    let joint_nam_scores =
        get_best_scoring_nam_locations(nams1, nams2, isize_est.mu, isize_est.sigma);
    if joint_nam_scores.is_empty() {
        return (None, None);
    }

    let mut joint = None;
    let mut score_joint = 0.0f32;
    for pair in &joint_nam_scores {
        if let (Some(n1), Some(n2)) = (&pair.nam1, &pair.nam2) {
            score_joint = n1.score + n2.score;
            joint = Some((n1.clone(), n2.clone()));
            break;
        }
    }

    let mut best_nam1 = None;
    let mut best_nam2 = None;
    let mut score_indiv = 0.0f32;
    if let Some(n1) = nams1.first() {
        // Penalty for mapping the mates independently
        score_indiv += n1.score / 2.0;
        best_nam1 = Some(n1.clone());
    }
    if let Some(n2) = nams2.first() {
        score_indiv += n2.score / 2.0;
        best_nam2 = Some(n2.clone());
    }

    if let Some((n1, n2)) = joint {
        if score_joint > score_indiv {
            if isize_est.sample_size < 400.0 {
                isize_est.update((n1.ref_start - n2.ref_start).abs());
            }
            best_nam1 = Some(n1);
            best_nam2 = Some(n2);
        }
    }
    (best_nam1, best_nam2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nam_at(nam_id: usize, ref_start: i32, n_hits: u32, score: f32, is_rc: bool) -> Nam {
        Nam {
            nam_id,
            ref_start,
            ref_end: ref_start + 100,
            query_start: 0,
            query_end: 100,
            ref_id: 0,
            n_hits,
            score,
            is_rc,
        }
    }

    #[test]
    fn test_top_dropoff() {
        let few_hits = vec![nam_at(0, 0, 2, 10.0, false)];
        assert_eq!(top_dropoff(&few_hits), 1.0);

        let lone = vec![nam_at(0, 0, 10, 10.0, false)];
        assert_eq!(top_dropoff(&lone), 0.0);

        let two = vec![nam_at(0, 0, 10, 10.0, false), nam_at(1, 50, 4, 5.0, false)];
        assert_eq!(top_dropoff(&two), 0.4);
    }

    #[test]
    fn test_joint_mapq_from_alignment_scores() {
        assert_eq!(joint_mapq_from_alignment_scores(100.0, 100.0), (0, 0));
        assert_eq!(joint_mapq_from_alignment_scores(100.0, 80.0), (20, 20));
        assert_eq!(joint_mapq_from_alignment_scores(400.0, 80.0), (60, 60));
        assert_eq!(joint_mapq_from_alignment_scores(100.0, -5.0), (60, 60));
        assert_eq!(joint_mapq_from_alignment_scores(-5.0, -10.0), (1, 1));
    }

    #[test]
    fn test_joint_mapq_falls_through_identical_placements() {
        let a = Alignment {
            ref_start: 1000,
            score: 100,
            ..Alignment::default()
        };
        let b = Alignment {
            ref_start: 1200,
            score: 100,
            is_rc: true,
            ..Alignment::default()
        };
        let pair = |score: f64| ScoredAlignmentPair {
            score,
            alignment1: a.clone(),
            alignment2: b.clone(),
        };
        // Two identical placements and nothing else: confident
        assert_eq!(joint_mapq_from_high_scores(&[pair(190.0), pair(180.0)]), (60, 60));
        // A third, different placement decides the confidence
        let mut other = pair(150.0);
        other.alignment1.ref_start = 5000;
        assert_eq!(
            joint_mapq_from_high_scores(&[pair(190.0), pair(180.0), other]),
            (40, 40)
        );
    }

    #[test]
    fn test_joint_mapq_single_pair_is_maximal() {
        let pair = ScoredAlignmentPair {
            score: 100.0,
            alignment1: Alignment::default(),
            alignment2: Alignment::default(),
        };
        assert_eq!(joint_mapq_from_high_scores(&[pair]), (60, 60));
    }

    #[test]
    fn test_get_best_map_location_prefers_joint() {
        let mut isize_est = InsertSizeDistribution::default();
        let nams1 = vec![nam_at(0, 1000, 5, 50.0, false)];
        let nams2 = vec![nam_at(1, 1180, 5, 50.0, true)];
        let (best1, best2) = get_best_map_location(&nams1, &nams2, &mut isize_est);
        // Joint score 100 beats halved individual scores 50
        assert_eq!(best1.as_ref().map(|n| n.ref_start), Some(1000));
        assert_eq!(best2.as_ref().map(|n| n.ref_start), Some(1180));
        assert_eq!(isize_est.sample_size, 2.0);
        assert_eq!(isize_est.mu, 180.0);
    }

    #[test]
    fn test_get_best_map_location_no_nams() {
        let mut isize_est = InsertSizeDistribution::default();
        let (best1, best2) = get_best_map_location(&[], &[], &mut isize_est);
        assert!(best1.is_none() && best2.is_none());
        assert_eq!(isize_est.sample_size, 1.0);
    }

    #[test]
    fn test_get_best_map_location_falls_back_to_individual() {
        let mut isize_est = InsertSizeDistribution::default();
        // Same strand: no proper pair exists
        let nams1 = vec![nam_at(0, 1000, 5, 50.0, false)];
        let nams2 = vec![nam_at(1, 1180, 5, 50.0, false)];
        let (best1, best2) = get_best_map_location(&nams1, &nams2, &mut isize_est);
        assert_eq!(best1.as_ref().map(|n| n.ref_start), Some(1000));
        assert_eq!(best2.as_ref().map(|n| n.ref_start), Some(1180));
        // Estimator untouched without a joint winner
        assert_eq!(isize_est.sample_size, 1.0);
    }
}
