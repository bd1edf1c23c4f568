// SAM record construction
//
// The drivers hand finished alignments here; this module renders the
// eleven mandatory fields plus NM/AS tags (and optional per-read
// diagnostic tags) into the caller's output string. Unmapped mates are
// placed at their partner's coordinates per the SAM pairing conventions.

use std::fmt::Write;

use crate::alignment::{Alignment, Details};
use crate::read::SequenceRecord;
use crate::references::References;

pub mod sam_flags {
    pub const PAIRED: u16 = 0x1;
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE: u16 = 0x10;
    pub const MATE_REVERSE: u16 = 0x20;
    pub const FIRST_IN_PAIR: u16 = 0x40;
    pub const SECOND_IN_PAIR: u16 = 0x80;
    pub const SECONDARY: u16 = 0x100;
}

use sam_flags::*;

/// Writes SAM records for one worker into a borrowed output buffer
pub struct SamOutput<'a> {
    out: &'a mut String,
    references: &'a References,
    show_details: bool,
}

impl<'a> SamOutput<'a> {
    pub fn new(out: &'a mut String, references: &'a References, show_details: bool) -> Self {
        SamOutput {
            out,
            references,
            show_details,
        }
    }

    /// Emit a single-end record
    pub fn add(
        &mut self,
        alignment: &Alignment,
        record: &SequenceRecord,
        read_rc: &[u8],
        is_primary: bool,
        details: &Details,
    ) {
        if alignment.is_unaligned {
            self.add_unmapped(record);
            return;
        }
        let mut flag = 0u16;
        if alignment.is_rc {
            flag |= REVERSE;
        }
        if !is_primary {
            flag |= SECONDARY;
        }
        let (seq, qual) = oriented(record, read_rc, alignment.is_rc);
        self.append_line(
            &record.name,
            flag,
            &self.references.names[alignment.ref_id].clone(),
            alignment.ref_start as i64 + 1,
            alignment.mapq,
            &alignment.cigar.to_string(),
            "*",
            0,
            0,
            &seq,
            &qual,
            Some(alignment),
            Some(details),
        );
    }

    /// Emit a record for a read without any alignment
    pub fn add_unmapped(&mut self, record: &SequenceRecord) {
        self.append_line(
            &record.name,
            UNMAPPED,
            "*",
            0,
            0,
            "*",
            "*",
            0,
            0,
            &String::from_utf8_lossy(&record.seq).into_owned(),
            &record.qual,
            None,
            None,
        );
    }

    /// Emit records for a pair where neither mate has any alignment
    pub fn add_unmapped_pair(&mut self, record1: &SequenceRecord, record2: &SequenceRecord) {
        let common = PAIRED | UNMAPPED | MATE_UNMAPPED;
        for (record, which) in [(record1, FIRST_IN_PAIR), (record2, SECOND_IN_PAIR)] {
            self.append_line(
                &record.name,
                common | which,
                "*",
                0,
                0,
                "*",
                "*",
                0,
                0,
                &String::from_utf8_lossy(&record.seq).into_owned(),
                &record.qual,
                None,
                None,
            );
        }
    }

    /// Emit both records of a mate pair
    #[allow(clippy::too_many_arguments)]
    pub fn add_pair(
        &mut self,
        alignment1: &Alignment,
        alignment2: &Alignment,
        record1: &SequenceRecord,
        record2: &SequenceRecord,
        read1_rc: &[u8],
        read2_rc: &[u8],
        mapq1: u8,
        mapq2: u8,
        is_proper: bool,
        is_primary: bool,
        details: &[Details; 2],
    ) {
        if alignment1.is_unaligned && alignment2.is_unaligned {
            self.add_unmapped_pair(record1, record2);
            return;
        }

        let mut flag1 = PAIRED | FIRST_IN_PAIR;
        let mut flag2 = PAIRED | SECOND_IN_PAIR;
        if is_proper {
            flag1 |= PROPER_PAIR;
            flag2 |= PROPER_PAIR;
        }
        if alignment1.is_unaligned {
            flag1 |= UNMAPPED;
            flag2 |= MATE_UNMAPPED;
        } else {
            if alignment1.is_rc {
                flag1 |= REVERSE;
                flag2 |= MATE_REVERSE;
            }
            if !is_primary {
                flag1 |= SECONDARY;
            }
        }
        if alignment2.is_unaligned {
            flag2 |= UNMAPPED;
            flag1 |= MATE_UNMAPPED;
        } else {
            if alignment2.is_rc {
                flag2 |= REVERSE;
                flag1 |= MATE_REVERSE;
            }
            if !is_primary {
                flag2 |= SECONDARY;
            }
        }

        let both_mapped = !alignment1.is_unaligned && !alignment2.is_unaligned;
        let (tlen1, tlen2) = if both_mapped && alignment1.ref_id == alignment2.ref_id {
            if alignment1.ref_start <= alignment2.ref_start {
                let t = alignment2.ref_end() - alignment1.ref_start;
                (t, -t)
            } else {
                let t = alignment1.ref_end() - alignment2.ref_start;
                (-t, t)
            }
        } else {
            (0, 0)
        };

        self.append_pair_mate(
            alignment1, alignment2, record1, read1_rc, mapq1, flag1, tlen1, &details[0],
        );
        self.append_pair_mate(
            alignment2, alignment1, record2, read2_rc, mapq2, flag2, tlen2, &details[1],
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn append_pair_mate(
        &mut self,
        alignment: &Alignment,
        mate: &Alignment,
        record: &SequenceRecord,
        read_rc: &[u8],
        mapq: u8,
        flag: u16,
        tlen: i32,
        details: &Details,
    ) {
        // An unmapped read is placed at its mapped mate's coordinates
        let (rname, pos) = if !alignment.is_unaligned {
            (
                self.references.names[alignment.ref_id].clone(),
                alignment.ref_start as i64 + 1,
            )
        } else {
            (
                self.references.names[mate.ref_id].clone(),
                mate.ref_start as i64 + 1,
            )
        };
        let (rnext, pnext) = if !mate.is_unaligned {
            let name = if alignment.is_unaligned || alignment.ref_id == mate.ref_id {
                "=".to_string()
            } else {
                self.references.names[mate.ref_id].clone()
            };
            (name, mate.ref_start as i64 + 1)
        } else {
            ("=".to_string(), pos)
        };

        let (cigar, mapq, nm_as, seq, qual) = if alignment.is_unaligned {
            (
                "*".to_string(),
                0,
                None,
                String::from_utf8_lossy(&record.seq).into_owned(),
                record.qual.clone(),
            )
        } else {
            let (seq, qual) = oriented(record, read_rc, alignment.is_rc);
            (
                alignment.cigar.to_string(),
                mapq,
                Some(alignment),
                seq,
                qual,
            )
        };

        self.append_line(
            &record.name,
            flag,
            &rname,
            pos,
            mapq,
            &cigar,
            &rnext,
            pnext,
            tlen,
            &seq,
            &qual,
            nm_as,
            Some(details),
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn append_line(
        &mut self,
        qname: &str,
        flag: u16,
        rname: &str,
        pos: i64,
        mapq: u8,
        cigar: &str,
        rnext: &str,
        pnext: i64,
        tlen: i32,
        seq: &str,
        qual: &str,
        tags_from: Option<&Alignment>,
        details: Option<&Details>,
    ) {
        let qual = if qual.is_empty() { "*" } else { qual };
        let cigar = if cigar.is_empty() { "*" } else { cigar };
        let _ = write!(
            self.out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            qname, flag, rname, pos, mapq, cigar, rnext, pnext, tlen, seq, qual
        );
        if let Some(alignment) = tags_from {
            let _ = write!(
                self.out,
                "\tNM:i:{}\tAS:i:{}",
                alignment.edit_distance, alignment.score
            );
        }
        if self.show_details {
            if let Some(d) = details {
                let _ = write!(
                    self.out,
                    "\tna:i:{}\tnr:i:{}\tal:i:{}\tga:i:{}\tmr:i:{}\tX0:i:{}",
                    d.nams,
                    d.nam_rescue as u8,
                    d.tried_alignment,
                    d.gapped,
                    d.mate_rescue,
                    d.nam_inconsistent
                );
            }
        }
        self.out.push('\n');
    }
}

fn oriented(record: &SequenceRecord, read_rc: &[u8], is_rc: bool) -> (String, String) {
    if is_rc {
        (
            String::from_utf8_lossy(read_rc).into_owned(),
            record.qual.chars().rev().collect(),
        )
    } else {
        (
            String::from_utf8_lossy(&record.seq).into_owned(),
            record.qual.clone(),
        )
    }
}
