// Single-end driver
//
// Walks the score-ranked NAM list under attempt/dropoff caps, extends each
// candidate, and emits the primary (plus optional secondaries) with a MAPQ
// derived from the score spread over all extended candidates.

use crate::aligner::Aligner;
use crate::alignment::{Alignment, Details};
use crate::extend::extend_nam;
use crate::nam::{reverse_nam_if_needed, Nam};
use crate::params::MappingParameters;
use crate::read::{Read, SequenceRecord};
use crate::references::References;
use crate::sam::SamOutput;

/// Single-end MAPQ from the top-two NAM scores, in the style of minimap2:
/// `40 (1 - s2/s1) min(1, |M|/10) log s1`, clamped to [0, 60].
pub fn get_mapq(nams: &[Nam], n_max: &Nam) -> u8 {
    if nams.len() <= 1 {
        return 60;
    }
    let s1 = n_max.score;
    let s2 = nams[1].score;
    let min_matches = (n_max.n_hits as f32 / 10.0).min(1.0);
    let uncapped_mapq = (40.0 * (1.0 - s2 / s1) * min_matches * s1.ln()) as i32;
    uncapped_mapq.clamp(0, 60) as u8
}

/// Align one single-end read from its NAM list (sorted by score, best
/// first) and write SAM records.
pub fn align_single_end(
    aligner: &Aligner,
    sam: &mut SamOutput,
    nams: &mut [Nam],
    record: &SequenceRecord,
    k: usize,
    references: &References,
    details: &mut Details,
    map_param: &MappingParameters,
) {
    if nams.is_empty() {
        sam.add_unmapped(record);
        return;
    }

    let read = Read::new(&record.seq);
    let max_secondary = map_param.max_secondary;
    let mut alignments: Vec<Alignment> = Vec::new();
    let mut tries = 0;
    let n_max = nams[0].clone();

    let mut best_edit_distance = u32::MAX;
    let mut best_score = -1000;
    let mut best_alignment = Alignment {
        score: -100_000,
        is_unaligned: true,
        ..Alignment::default()
    };
    let mut min_mapq_diff = i32::MAX;

    for nam in nams.iter_mut() {
        let score_dropoff = nam.n_hits as f32 / n_max.n_hits as f32;
        if tries >= map_param.max_tries
            || (tries > 1 && best_edit_distance == 0)
            || score_dropoff < map_param.dropoff_threshold
        {
            break;
        }
        let consistent_nam = reverse_nam_if_needed(nam, &read, references, k);
        details.nam_inconsistent += !consistent_nam as usize;
        let alignment = extend_nam(aligner, nam, references, &read, consistent_nam);
        details.tried_alignment += 1;
        details.gapped += alignment.gapped as usize;

        let diff_to_best = (best_score - alignment.score).abs();
        min_mapq_diff = min_mapq_diff.min(diff_to_best);

        if max_secondary > 0 {
            alignments.push(alignment.clone());
        }
        if alignment.score > best_score {
            // New distance to the next-best candidate
            min_mapq_diff = (alignment.score - best_score).max(0);
            best_score = alignment.score;
            best_alignment = alignment;
            if max_secondary == 0 {
                best_edit_distance = best_alignment.global_ed;
            }
        }
        tries += 1;
    }

    if max_secondary == 0 {
        best_alignment.mapq = min_mapq_diff.min(60) as u8;
        sam.add(&best_alignment, record, read.rc(), true, details);
        return;
    }

    alignments.sort_by(|a, b| b.score.cmp(&a.score));

    let p = &aligner.parameters;
    let secondary_dropoff = 2 * p.mismatch + p.gap_open;
    let max_out = alignments.len().min(max_secondary + 1);
    for (i, alignment) in alignments.iter_mut().take(max_out).enumerate() {
        if best_score - alignment.score > secondary_dropoff {
            break;
        }
        let is_primary = i == 0;
        alignment.mapq = if is_primary {
            min_mapq_diff.min(60) as u8
        } else {
            255
        };
        sam.add(alignment, record, read.rc(), is_primary, details);
    }
}
