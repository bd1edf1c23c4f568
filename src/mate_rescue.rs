// Mate rescue
//
// When one mate of a pair has no seeds of its own, a reference window is
// derived from the other mate's NAM and the insert-size estimate, and the
// missing mate is force-aligned inside it. A cheap shared-substring check
// gates the expensive gapped call.

use crate::aligner::Aligner;
use crate::alignment::Alignment;
use crate::nam::{reverse_nam_if_needed, Nam};
use crate::read::Read;
use crate::references::References;

/// Determine (roughly) whether the read shares some l-mer (l = 2k/3) with
/// the reference window, sampling the read every k/3 positions.
pub fn has_shared_substring(read_seq: &[u8], ref_seq: &[u8], k: usize) -> bool {
    let sub_size = 2 * k / 3;
    let step_size = k / 3;
    let mut i = 0;
    while i + sub_size < read_seq.len() {
        let submer = &read_seq[i..i + sub_size];
        if ref_seq.windows(sub_size).any(|w| w == submer) {
            return true;
        }
        i += step_size;
    }
    false
}

/// Align `read` into the window implied by its mate's NAM.
///
/// The guiding NAM is re-oriented against the guide read first. A NAM on
/// the reverse strand means the missing mate lies upstream on the forward
/// strand; a forward NAM means it lies downstream, reverse-complemented.
/// Windows reach mu + 5 sigma away from the anchor and allow at most half
/// a read of overlap with it.
///
/// Returns the alignment and whether base-level alignment was actually
/// attempted. A window shorter than `k`, or one that shares no substring
/// with the read, yields an unmapped alignment and `false`.
pub fn rescue_mate(
    aligner: &Aligner,
    nam: &mut Nam,
    references: &References,
    guide: &Read,
    read: &Read,
    mu: f32,
    sigma: f32,
    k: usize,
) -> (Alignment, bool) {
    reverse_nam_if_needed(nam, guide, references, k);
    let read_len = read.len() as i32;

    let (r_tmp, a, b, a_is_rc) = if nam.is_rc {
        (
            read.seq(),
            ((nam.ref_start - nam.query_start) as f32 - (mu + 5.0 * sigma)) as i32,
            nam.ref_start - nam.query_start + read_len / 2,
            false,
        )
    } else {
        // Mate is reverse-complemented in the expected orientation
        (
            read.rc(),
            nam.ref_end + (read_len - nam.query_end) - read_len / 2,
            ((nam.ref_end + (read_len - nam.query_end)) as f32 + (mu + 5.0 * sigma)) as i32,
            true,
        )
    };

    let ref_len = references.lengths[nam.ref_id] as i32;
    let ref_start = a.min(ref_len).max(0);
    let ref_end = b.max(0).min(ref_len);

    if ref_end < ref_start + k as i32 {
        let alignment = Alignment {
            edit_distance: read_len as u32,
            is_rc: nam.is_rc,
            ref_id: nam.ref_id,
            is_unaligned: true,
            ..Alignment::default()
        };
        return (alignment, false);
    }
    let ref_segm = &references.sequences[nam.ref_id][ref_start as usize..ref_end as usize];

    if !has_shared_substring(r_tmp, ref_segm, k) {
        let alignment = Alignment {
            edit_distance: read_len as u32,
            is_rc: nam.is_rc,
            ref_id: nam.ref_id,
            is_unaligned: true,
            ..Alignment::default()
        };
        return (alignment, false);
    }

    let info = aligner.align(r_tmp, ref_segm);
    let softclipped = info.query_start + (read.len() - info.query_end);
    let alignment = Alignment {
        is_unaligned: info.cigar.is_empty(),
        global_ed: info.edit_distance + softclipped as u32,
        cigar: info.cigar,
        edit_distance: info.edit_distance,
        score: info.score,
        ref_start: ref_start + info.ref_start as i32,
        length: info.ref_span as i32,
        is_rc: a_is_rc,
        ref_id: nam.ref_id,
        gapped: true,
        mapq: 0,
    };
    (alignment, true)
}
