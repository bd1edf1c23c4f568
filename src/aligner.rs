//! Base-level alignment kernels.
//!
//! Two kernels live here: an ungapped scorer that finds the best Hamming
//! segment of two equal-length sequences, and a gapped Smith-Waterman-style
//! aligner built on `bio::alignment::pairwise` in local mode. Both report
//! their result as an [`AlignmentInfo`] so the extension code can treat them
//! interchangeably.

use bio::alignment::pairwise::Aligner as PairwiseAligner;
use bio::alignment::AlignmentOperation;

use crate::cigar::{Cigar, CigarOp};

/// Reference windows longer than this are rejected instead of aligned
const MAX_SEGMENT_LEN: usize = 2000;

/// Score reported for a rejected or failed gapped alignment
const FAILED_SCORE: i32 = -1_000_000;

/// Scoring parameters shared by both kernels.
///
/// `end_bonus` is credited once per query end the alignment reaches, which
/// keeps ungapped and gapped scores on the same scale and discourages
/// needless soft clipping.
#[derive(Clone, Copy, Debug)]
pub struct AlignmentParameters {
    pub match_score: i32,
    pub mismatch: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
    pub end_bonus: i32,
}

impl Default for AlignmentParameters {
    fn default() -> Self {
        AlignmentParameters {
            match_score: 2,
            mismatch: 8,
            gap_open: 12,
            gap_extend: 1,
            end_bonus: 10,
        }
    }
}

/// Result of one kernel invocation, in segment-local coordinates
#[derive(Clone, Debug, Default)]
pub struct AlignmentInfo {
    pub cigar: Cigar,
    pub edit_distance: u32,
    pub ref_start: usize,
    pub ref_span: usize,
    pub query_start: usize,
    pub query_end: usize,
    pub score: i32,
}

/// Number of mismatching positions, or `None` if the lengths differ
pub fn hamming_distance(s: &[u8], t: &[u8]) -> Option<usize> {
    if s.len() != t.len() {
        return None;
    }
    Some(s.iter().zip(t.iter()).filter(|(a, b)| a != b).count())
}

/// Find the highest-scoring segment of two equal-length sequences compared
/// position by position. A segment anchored at the first position starts
/// from `end_bonus`, and a segment reaching the last position collects
/// `end_bonus` on top.
///
/// Returns `(segment_start, segment_end, score)`.
pub fn highest_scoring_segment(
    query: &[u8],
    ref_seq: &[u8],
    match_score: i32,
    mismatch: i32,
    end_bonus: i32,
) -> (usize, usize, i32) {
    let n = query.len();
    let mut start = 0;
    let mut score = end_bonus;
    let mut best_start = 0;
    let mut best_end = 0;
    let mut best_score = 0;
    for i in 0..n {
        if query[i] == ref_seq[i] {
            score += match_score;
        } else {
            score -= mismatch;
        }
        if score < 0 {
            start = i + 1;
            score = 0;
        }
        if score > best_score {
            best_start = start;
            best_end = i + 1;
            best_score = score;
        }
    }
    if score + end_bonus > best_score {
        best_score = score + end_bonus;
        best_end = n;
        best_start = start;
    }
    (best_start, best_end, best_score)
}

/// Ungapped alignment of two equal-length sequences: soft clips outside the
/// highest-scoring segment, `=`/`X` runs inside it.
///
/// Returns `None` if the lengths differ.
pub fn hamming_align(
    query: &[u8],
    ref_seq: &[u8],
    match_score: i32,
    mismatch: i32,
    end_bonus: i32,
) -> Option<AlignmentInfo> {
    if query.len() != ref_seq.len() {
        return None;
    }

    let (segment_start, segment_end, score) =
        highest_scoring_segment(query, ref_seq, match_score, mismatch, end_bonus);

    let mut cigar = Cigar::new();
    cigar.push(CigarOp::S, segment_start as u32);
    let mut mismatches = 0u32;
    for i in segment_start..segment_end {
        if query[i] == ref_seq[i] {
            cigar.push(CigarOp::Eq, 1);
        } else {
            mismatches += 1;
            cigar.push(CigarOp::X, 1);
        }
    }
    cigar.push(CigarOp::S, (query.len() - segment_end) as u32);

    Some(AlignmentInfo {
        cigar,
        edit_distance: mismatches,
        ref_start: segment_start,
        ref_span: segment_end - segment_start,
        query_start: segment_start,
        query_end: segment_end,
        score,
    })
}

/// The gapped kernel. Owns nothing but the scoring parameters; each `align`
/// call is independent, so one instance can be shared by reference across
/// workers.
#[derive(Clone, Debug, Default)]
pub struct Aligner {
    pub parameters: AlignmentParameters,
}

impl Aligner {
    pub fn new(parameters: AlignmentParameters) -> Self {
        Aligner { parameters }
    }

    /// Local gapped alignment of `query` against a reference segment.
    ///
    /// An oversized segment, or one the query cannot be locally aligned to
    /// at a positive score, yields a result with an empty CIGAR; callers
    /// treat that as unaligned.
    pub fn align(&self, query: &[u8], ref_seq: &[u8]) -> AlignmentInfo {
        let p = &self.parameters;
        if ref_seq.len() > MAX_SEGMENT_LEN {
            return AlignmentInfo {
                edit_distance: query.len() as u32,
                score: FAILED_SCORE,
                ..AlignmentInfo::default()
            };
        }

        // bio prices a k-base gap at open + k*extend, so shift the open
        // penalty to make a 1-base gap cost exactly gap_open
        let match_fn = |a: u8, b: u8| {
            if a == b {
                p.match_score
            } else {
                -p.mismatch
            }
        };
        let mut dp = PairwiseAligner::with_capacity(
            query.len(),
            ref_seq.len(),
            -(p.gap_open - p.gap_extend),
            -p.gap_extend,
            &match_fn,
        );
        let result = dp.local(query, ref_seq);

        if result.xstart == result.xend {
            return AlignmentInfo {
                edit_distance: query.len() as u32,
                score: 0,
                ..AlignmentInfo::default()
            };
        }

        let mut cigar = Cigar::new();
        cigar.push(CigarOp::S, result.xstart as u32);
        let mut edit_distance = 0u32;
        for op in &result.operations {
            match op {
                AlignmentOperation::Match => cigar.push(CigarOp::Eq, 1),
                AlignmentOperation::Subst => {
                    edit_distance += 1;
                    cigar.push(CigarOp::X, 1);
                }
                AlignmentOperation::Ins => {
                    edit_distance += 1;
                    cigar.push(CigarOp::I, 1);
                }
                AlignmentOperation::Del => {
                    edit_distance += 1;
                    cigar.push(CigarOp::D, 1);
                }
                AlignmentOperation::Xclip(_) | AlignmentOperation::Yclip(_) => {}
            }
        }
        cigar.push(CigarOp::S, (query.len() - result.xend) as u32);

        let mut score = result.score;
        if result.xstart == 0 {
            score += p.end_bonus;
        }
        if result.xend == query.len() {
            score += p.end_bonus;
        }

        AlignmentInfo {
            cigar,
            edit_distance,
            ref_start: result.ystart,
            ref_span: result.yend - result.ystart,
            query_start: result.xstart,
            query_end: result.xend,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(b"ACGT", b"ACGT"), Some(0));
        assert_eq!(hamming_distance(b"ACGT", b"AGGA"), Some(2));
        assert_eq!(hamming_distance(b"ACGT", b"ACG"), None);
    }

    #[test]
    fn test_highest_scoring_segment_whole_read() {
        // One interior mismatch is cheaper than clipping either side
        let query = b"AAAAAAAAAACAAAAAAAAA";
        let refs = b"AAAAAAAAAAGAAAAAAAAA";
        let (start, end, score) = highest_scoring_segment(query, refs, 2, 8, 10);
        assert_eq!((start, end), (0, 20));
        assert_eq!(score, 10 + 19 * 2 - 8 + 10);
    }

    #[test]
    fn test_highest_scoring_segment_clips_noisy_prefix() {
        let query = b"TTTAAAAAAAAAAAAAAAAA";
        let refs = b"GGGAAAAAAAAAAAAAAAAA";
        let (start, end, score) = highest_scoring_segment(query, refs, 2, 8, 0);
        assert_eq!((start, end), (3, 20));
        assert_eq!(score, 17 * 2);
    }

    #[test]
    fn test_hamming_align_exact() {
        let info = hamming_align(b"CGTACGTA", b"CGTACGTA", 2, 8, 0).unwrap();
        assert_eq!(info.cigar.to_string(), "8=");
        assert_eq!(info.edit_distance, 0);
        assert_eq!(info.score, 16);
        assert_eq!((info.query_start, info.query_end), (0, 8));
        assert_eq!((info.ref_start, info.ref_span), (0, 8));
    }

    #[test]
    fn test_hamming_align_mismatch_and_clip() {
        let query = b"TTTAAAAAAAAAAAAAAACA";
        let refs = b"GGGAAAAAAAAAAAAAAAGA";
        let info = hamming_align(query, refs, 2, 8, 10).unwrap();
        assert_eq!(info.cigar.to_string(), "3S15=1X1=");
        assert_eq!(info.edit_distance, 1);
        assert_eq!(info.query_start, 3);
        assert_eq!(info.query_end, 20);
        assert_eq!(info.ref_start, 3);
        assert_eq!(info.ref_span, 17);
        assert_eq!(info.score, 16 * 2 - 8 + 10);
    }

    #[test]
    fn test_hamming_align_length_mismatch() {
        assert!(hamming_align(b"ACGT", b"ACG", 2, 8, 10).is_none());
    }

    #[test]
    fn test_gapped_align_exact_interior_match() {
        let aligner = Aligner::default();
        let refs = b"TTACGACTGCATCAGGACTATTTTACGAAGGCTGCAATCG";
        let query = &refs[8..28];
        let info = aligner.align(query, refs);
        assert_eq!(info.cigar.to_string(), "20=");
        assert_eq!(info.edit_distance, 0);
        assert_eq!(info.ref_start, 8);
        assert_eq!(info.ref_span, 20);
        assert_eq!((info.query_start, info.query_end), (0, 20));
        // 20 matches plus both end bonuses
        assert_eq!(info.score, 20 * 2 + 2 * 10);
    }

    #[test]
    fn test_gapped_align_with_deletion() {
        let aligner = Aligner::default();
        let refs = b"ACGTGACTTGCAAGGTCCTAGATCCGGTAA";
        // Query lacks one reference base
        let mut query = refs.to_vec();
        query.remove(12);
        let info = aligner.align(&query, refs);
        assert_eq!(info.edit_distance, 1);
        assert_eq!(info.cigar.query_consumed(), 29);
        assert_eq!(info.ref_span, 30);
        assert_eq!(info.score, 29 * 2 - 12 + 2 * 10);
    }

    #[test]
    fn test_gapped_align_rejects_oversized_segment() {
        let aligner = Aligner::default();
        let refs = vec![b'A'; MAX_SEGMENT_LEN + 1];
        let info = aligner.align(b"ACGTACGTACGT", &refs);
        assert!(info.cigar.is_empty());
        assert_eq!(info.score, FAILED_SCORE);
    }

    #[test]
    fn test_gapped_align_no_local_match() {
        let aligner = Aligner::default();
        let info = aligner.align(b"AAAAAAAAAA", b"CCCCCCCCCCCCCCC");
        assert!(info.cigar.is_empty());
        assert_eq!(info.score, 0);
    }
}
