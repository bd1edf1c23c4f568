// NAM (Non-overlapping Approximate Match) seed candidates
//
// NAMs arrive from the seeding stage with reference and query intervals,
// a hit count and a seed score. The only mutation the alignment core
// performs on them is the orientation fix below.

use crate::read::Read;
use crate::references::References;

/// A seed-level candidate region on one reference contig
#[derive(Clone, Debug, PartialEq)]
pub struct Nam {
    pub nam_id: usize,
    pub ref_start: i32,
    pub ref_end: i32,
    pub query_start: i32,
    pub query_end: i32,
    pub ref_id: usize,
    pub n_hits: u32,
    pub score: f32,
    pub is_rc: bool,
}

impl Nam {
    #[inline]
    pub fn ref_span(&self) -> i32 {
        self.ref_end - self.ref_start
    }

    #[inline]
    pub fn query_span(&self) -> i32 {
        self.query_end - self.query_start
    }
}

/// Determine whether the NAM matches the forward or the reverse-complemented
/// read by comparing the reference k-mers at both NAM ends against the read
/// k-mers at both query ends.
///
/// - Both end k-mers match in the recorded orientation: return true.
/// - Both end k-mers match in the mirrored orientation (possible with
///   symmetric seed hashes): flip `is_rc`, mirror the query coordinates,
///   return true.
/// - Neither: return false. The caller then counts the NAM as inconsistent
///   and falls back to gapped alignment.
pub fn reverse_nam_if_needed(nam: &mut Nam, read: &Read, references: &References, k: usize) -> bool {
    let ref_seq = &references.sequences[nam.ref_id];
    let ref_start_kmer = &ref_seq[nam.ref_start as usize..nam.ref_start as usize + k];
    let ref_end_kmer = &ref_seq[nam.ref_end as usize - k..nam.ref_end as usize];

    let (seq, seq_rc) = if nam.is_rc {
        (read.rc(), read.seq())
    } else {
        (read.seq(), read.rc())
    };
    let read_start_kmer = &seq[nam.query_start as usize..nam.query_start as usize + k];
    let read_end_kmer = &seq[nam.query_end as usize - k..nam.query_end as usize];
    if ref_start_kmer == read_start_kmer && ref_end_kmer == read_end_kmer {
        return true;
    }

    // Mirrored query interval on the opposite strand
    let read_len = read.len() as i32;
    let q_start_tmp = read_len - nam.query_end;
    let q_end_tmp = read_len - nam.query_start;
    let read_start_kmer = &seq_rc[q_start_tmp as usize..q_start_tmp as usize + k];
    let read_end_kmer = &seq_rc[q_end_tmp as usize - k..q_end_tmp as usize];
    if ref_start_kmer == read_start_kmer && ref_end_kmer == read_end_kmer {
        nam.is_rc = !nam.is_rc;
        nam.query_start = q_start_tmp;
        nam.query_end = q_end_tmp;
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use bio::alphabets::dna;

    const REF: &[u8] = b"TTACGACTGCATCAGGACTATTTTACGAAGGCTGCAATCG";

    fn references() -> References {
        References::new(vec!["ref1".to_string()], vec![REF.to_vec()])
    }

    fn forward_nam() -> Nam {
        Nam {
            nam_id: 0,
            ref_start: 5,
            ref_end: 25,
            query_start: 0,
            query_end: 20,
            ref_id: 0,
            n_hits: 3,
            score: 20.0,
            is_rc: false,
        }
    }

    #[test]
    fn test_consistent_forward_nam_is_untouched() {
        let refs = references();
        let read = Read::new(&REF[5..25]);
        let mut nam = forward_nam();
        assert!(reverse_nam_if_needed(&mut nam, &read, &refs, 4));
        assert_eq!(nam, forward_nam());
    }

    #[test]
    fn test_false_forward_nam_is_flipped() {
        let refs = references();
        let read = Read::new(&dna::revcomp(&REF[5..25]));
        // Claims a forward match even though the read is the reverse
        // complement of the reference window
        let mut nam = forward_nam();
        assert!(reverse_nam_if_needed(&mut nam, &read, &refs, 4));
        assert!(nam.is_rc);
        assert_eq!(nam.query_start, 0);
        assert_eq!(nam.query_end, 20);
    }

    #[test]
    fn test_orientation_fix_is_idempotent() {
        let refs = references();
        let read = Read::new(&dna::revcomp(&REF[5..25]));
        let mut nam = forward_nam();
        assert!(reverse_nam_if_needed(&mut nam, &read, &refs, 4));
        let fixed = nam.clone();
        assert!(reverse_nam_if_needed(&mut nam, &read, &refs, 4));
        assert_eq!(nam, fixed);
    }

    #[test]
    fn test_unrelated_read_is_inconsistent() {
        let refs = references();
        let read = Read::new(b"GGGGGGGGGGGGGGGGGGGG");
        let mut nam = forward_nam();
        assert!(!reverse_nam_if_needed(&mut nam, &read, &refs, 4));
        assert_eq!(nam, forward_nam());
    }
}
