// Single-NAM extension
//
// Projects a seed-level NAM to whole-read reference coordinates and turns
// it into a base-level alignment, preferring the cheap ungapped kernel
// whenever the projection is clean.

use crate::aligner::{hamming_align, hamming_distance, Aligner, AlignmentInfo};
use crate::alignment::Alignment;
use crate::nam::Nam;
use crate::read::Read;
use crate::references::References;

/// Mismatch rate below which an ungapped comparison is accepted
const HAMMING_RATE_LIMIT: f32 = 0.05;

/// Reference extension on each side of the projected interval for the
/// gapped path
const GAP_EXTENSION: i32 = 50;

/// Extend a NAM so that it covers the entire read and return the resulting
/// alignment.
///
/// The projected reference interval is the NAM's interval widened by the
/// uncovered query prefix and suffix, clamped to the contig. When the
/// projection has exactly read length and the NAM orientation was verified,
/// a Hamming comparison below [`HAMMING_RATE_LIMIT`] settles the alignment
/// without dynamic programming; otherwise the projected interval is widened
/// by up to [`GAP_EXTENSION`] bases on each side and handed to the gapped
/// kernel.
pub fn extend_nam(
    aligner: &Aligner,
    nam: &Nam,
    references: &References,
    read: &Read,
    consistent_nam: bool,
) -> Alignment {
    let query = if nam.is_rc { read.rc() } else { read.seq() };
    let ref_seq = &references.sequences[nam.ref_id];
    let ref_len = ref_seq.len() as i32;
    let read_len = query.len() as i32;

    let projected_ref_start = (nam.ref_start - nam.query_start).max(0);
    let projected_ref_end = (nam.ref_end + (read_len - nam.query_end)).min(ref_len);

    let mut ungapped: Option<(AlignmentInfo, i32)> = None;
    if projected_ref_end - projected_ref_start == read_len && consistent_nam {
        let segment = &ref_seq[projected_ref_start as usize..projected_ref_end as usize];
        if let Some(dist) = hamming_distance(query, segment) {
            if (dist as f32 / read_len as f32) < HAMMING_RATE_LIMIT {
                let p = &aligner.parameters;
                if let Some(info) =
                    hamming_align(query, segment, p.match_score, p.mismatch, p.end_bonus)
                {
                    let result_ref_start = projected_ref_start + info.ref_start as i32;
                    ungapped = Some((info, result_ref_start));
                }
            }
        }
    }

    let gapped = ungapped.is_none();
    let (info, result_ref_start) = match ungapped {
        Some(result) => result,
        None => {
            let diff = (nam.ref_span() - nam.query_span()).abs();
            let ext_left = projected_ref_start.min(GAP_EXTENSION);
            let segment_start = projected_ref_start - ext_left;
            let ext_right = (ref_len - nam.ref_end).min(GAP_EXTENSION);
            let segment_size = read_len + diff + ext_left + ext_right;
            let segment_end = (segment_start + segment_size).min(ref_len);
            let segment = &ref_seq[segment_start as usize..segment_end as usize];
            let info = aligner.align(query, segment);
            let result_ref_start = segment_start + info.ref_start as i32;
            (info, result_ref_start)
        }
    };

    let softclipped = info.query_start + (query.len() - info.query_end);
    Alignment {
        global_ed: info.edit_distance + softclipped as u32,
        cigar: info.cigar,
        edit_distance: info.edit_distance,
        score: info.score,
        ref_start: result_ref_start,
        length: info.ref_span as i32,
        is_rc: nam.is_rc,
        is_unaligned: false,
        ref_id: nam.ref_id,
        gapped,
        mapq: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::AlignmentParameters;
    use bio::alphabets::dna;

    const REF: &[u8] = b"TTACGACTGCATCAGGACTATTTTACGAAGGCTGCAATCG";

    fn references() -> References {
        References::new(vec!["ref1".to_string()], vec![REF.to_vec()])
    }

    fn nam(ref_start: i32, ref_end: i32, query_start: i32, query_end: i32, is_rc: bool) -> Nam {
        Nam {
            nam_id: 0,
            ref_start,
            ref_end,
            query_start,
            query_end,
            ref_id: 0,
            n_hits: 3,
            score: 10.0,
            is_rc,
        }
    }

    #[test]
    fn test_exact_match_takes_ungapped_path() {
        let aligner = Aligner::new(AlignmentParameters {
            end_bonus: 0,
            ..AlignmentParameters::default()
        });
        let refs = references();
        let read = Read::new(&REF[8..28]);
        let alignment = extend_nam(&aligner, &nam(8, 28, 0, 20, false), &refs, &read, true);
        assert!(!alignment.gapped);
        assert!(!alignment.is_unaligned);
        assert_eq!(alignment.cigar.to_string(), "20=");
        assert_eq!(alignment.edit_distance, 0);
        assert_eq!(alignment.global_ed, 0);
        assert_eq!(alignment.ref_start, 8);
        assert_eq!(alignment.length, 20);
        assert_eq!(alignment.score, 20 * 2);
    }

    #[test]
    fn test_partial_nam_is_projected_to_whole_read() {
        let aligner = Aligner::default();
        let refs = references();
        let read = Read::new(&REF[8..28]);
        // Seed only covers the middle of the read
        let alignment = extend_nam(&aligner, &nam(12, 24, 4, 16, false), &refs, &read, true);
        assert!(!alignment.gapped);
        assert_eq!(alignment.ref_start, 8);
        assert_eq!(alignment.cigar.to_string(), "20=");
    }

    #[test]
    fn test_reverse_complement_read_aligns_on_rc_query() {
        let aligner = Aligner::default();
        let refs = references();
        let read = Read::new(&dna::revcomp(&REF[8..28]));
        let alignment = extend_nam(&aligner, &nam(8, 28, 0, 20, true), &refs, &read, true);
        assert!(alignment.is_rc);
        assert!(!alignment.gapped);
        assert_eq!(alignment.ref_start, 8);
        assert_eq!(alignment.edit_distance, 0);
    }

    #[test]
    fn test_inconsistent_nam_forces_gapped_path() {
        let aligner = Aligner::default();
        let refs = references();
        let read = Read::new(&REF[8..28]);
        let alignment = extend_nam(&aligner, &nam(8, 28, 0, 20, false), &refs, &read, false);
        assert!(alignment.gapped);
        assert_eq!(alignment.ref_start, 8);
        assert_eq!(alignment.edit_distance, 0);
    }

    #[test]
    fn test_noisy_projection_falls_back_to_gapped() {
        let aligner = Aligner::default();
        let refs = references();
        // Three mismatches in 20 bases is over the ungapped rate limit
        let mut seq = REF[8..28].to_vec();
        seq[3] = b'G';
        seq[9] = b'A';
        seq[15] = b'G';
        let read = Read::new(&seq);
        let alignment = extend_nam(&aligner, &nam(8, 28, 0, 20, false), &refs, &read, true);
        assert!(alignment.gapped);
    }

    #[test]
    fn test_projection_is_clamped_at_contig_start() {
        let aligner = Aligner::default();
        let refs = references();
        // Read hangs two bases off the left end of the contig
        let mut seq = b"GG".to_vec();
        seq.extend_from_slice(&REF[0..18]);
        let read = Read::new(&seq);
        let alignment = extend_nam(&aligner, &nam(0, 18, 2, 20, false), &refs, &read, true);
        assert!(alignment.gapped);
        assert!(alignment.ref_start >= 0);
        assert_eq!(alignment.global_ed, alignment.edit_distance + 2);
    }
}
