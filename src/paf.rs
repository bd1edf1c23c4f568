// PAF output for mapping-only mode
//
// In mapping-only mode no base-level alignment is computed; the chosen NAM
// itself is reported. Reads without a chosen NAM produce no output line.

use std::fmt::Write;

use crate::nam::Nam;
use crate::references::References;

fn output_line(out: &mut String, n: &Nam, query_name: &str, references: &References, read_len: usize) {
    let strand = if n.is_rc { '-' } else { '+' };
    let _ = writeln!(
        out,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        query_name,
        read_len,
        n.query_start,
        n.query_end,
        strand,
        references.names[n.ref_id],
        references.lengths[n.ref_id],
        n.ref_start,
        n.ref_end,
        n.query_span(),
        n.ref_span(),
        255
    );
}

/// Report the best NAM of a single-end read
pub fn output_hits_paf(
    out: &mut String,
    nams: &[Nam],
    query_name: &str,
    references: &References,
    read_len: usize,
) {
    if let Some(n) = nams.first() {
        output_line(out, n, query_name, references, read_len);
    }
}

/// Report the chosen NAM of one mate of a pair
pub fn output_hits_paf_pe(
    out: &mut String,
    nam: Option<&Nam>,
    query_name: &str,
    references: &References,
    read_len: usize,
) {
    if let Some(n) = nam {
        output_line(out, n, query_name, references, read_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn references() -> References {
        References::new(vec!["chr1".to_string()], vec![vec![b'A'; 5000]])
    }

    #[test]
    fn test_paf_line_fields() {
        let refs = references();
        let n = Nam {
            nam_id: 0,
            ref_start: 1000,
            ref_end: 1100,
            query_start: 0,
            query_end: 100,
            ref_id: 0,
            n_hits: 5,
            score: 50.0,
            is_rc: true,
        };
        let mut out = String::new();
        output_hits_paf_pe(&mut out, Some(&n), "q1", &refs, 100);
        assert_eq!(out, "q1\t100\t0\t100\t-\tchr1\t5000\t1000\t1100\t100\t100\t255\n");
    }

    #[test]
    fn test_no_nam_no_output() {
        let refs = references();
        let mut out = String::new();
        output_hits_paf(&mut out, &[], "q1", &refs, 100);
        output_hits_paf_pe(&mut out, None, "q1", &refs, 100);
        assert!(out.is_empty());
    }
}
