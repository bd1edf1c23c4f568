// Per-read mapping drivers
//
// Ties the pipeline together for one read (or read pair): ask the seeder
// for NAMs, re-seed sparse reads, rank by score, then hand off to the
// SAM alignment drivers or the PAF mapping-only path. Batch helpers fan
// independent reads out over rayon workers; every worker owns its output
// buffer, statistics and insert-size estimator.

use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::aligner::Aligner;
use crate::alignment::Details;
use crate::insert_size::InsertSizeDistribution;
use crate::nam::Nam;
use crate::paf::{output_hits_paf, output_hits_paf_pe};
use crate::paired_end::{align_paired_end, get_best_map_location};
use crate::params::{IndexParameters, MappingParameters};
use crate::read::SequenceRecord;
use crate::references::References;
use crate::sam::SamOutput;
use crate::single_end::align_single_end;

/// Reads whose non-repetitive seed fraction is below this are re-seeded
const RESCUE_FRACTION_LIMIT: f32 = 0.7;

/// Reads handled per worker task in the batch helpers
const CHUNK_READS: usize = 512;

/// Seam to the seeding stage. `find_nams` returns the non-repetitive
/// fraction of the query's seeds together with the NAM candidates;
/// `find_nams_rescue` is the more exhaustive pass used for sparse reads.
pub trait NamFinder {
    fn find_nams(&self, seq: &[u8]) -> (f32, Vec<Nam>);
    fn find_nams_rescue(&self, seq: &[u8], rescue_cutoff: usize) -> Vec<Nam>;
}

/// Per-worker timing and counter totals
#[derive(Clone, Debug, Default)]
pub struct AlignmentStatistics {
    pub tot_find_nams: Duration,
    pub tot_nam_rescue: Duration,
    pub tot_sort_nams: Duration,
    pub tot_extend: Duration,
    pub n_reads: u64,
    pub n_nams: u64,
    pub n_nam_rescue: u64,
    pub n_inconsistent_nams: u64,
    pub n_mate_rescue: u64,
    pub n_tried_alignment: u64,
    pub n_gapped: u64,
}

impl AlignmentStatistics {
    pub fn add_details(&mut self, details: &Details) {
        self.n_nams += details.nams as u64;
        self.n_nam_rescue += details.nam_rescue as u64;
        self.n_inconsistent_nams += details.nam_inconsistent as u64;
        self.n_mate_rescue += details.mate_rescue as u64;
        self.n_tried_alignment += details.tried_alignment as u64;
        self.n_gapped += details.gapped as u64;
    }

    pub fn merge(&mut self, other: &AlignmentStatistics) {
        self.tot_find_nams += other.tot_find_nams;
        self.tot_nam_rescue += other.tot_nam_rescue;
        self.tot_sort_nams += other.tot_sort_nams;
        self.tot_extend += other.tot_extend;
        self.n_reads += other.n_reads;
        self.n_nams += other.n_nams;
        self.n_nam_rescue += other.n_nam_rescue;
        self.n_inconsistent_nams += other.n_inconsistent_nams;
        self.n_mate_rescue += other.n_mate_rescue;
        self.n_tried_alignment += other.n_tried_alignment;
        self.n_gapped += other.n_gapped;
    }
}

fn find_nams_timed<F: NamFinder>(
    finder: &F,
    seq: &[u8],
    map_param: &MappingParameters,
    statistics: &mut AlignmentStatistics,
    details: &mut Details,
) -> Vec<Nam> {
    let timer = Instant::now();
    let (nonrepetitive_fraction, mut nams) = finder.find_nams(seq);
    statistics.tot_find_nams += timer.elapsed();

    if map_param.rescue_level > 1 && (nams.is_empty() || nonrepetitive_fraction < RESCUE_FRACTION_LIMIT)
    {
        let timer = Instant::now();
        details.nam_rescue = true;
        nams = finder.find_nams_rescue(seq, map_param.rescue_cutoff);
        statistics.tot_nam_rescue += timer.elapsed();
    }
    details.nams = nams.len();

    let timer = Instant::now();
    nams.sort_by(|a, b| b.score.total_cmp(&a.score));
    statistics.tot_sort_nams += timer.elapsed();
    nams
}

/// Map one single-end read end to end and append its output records
#[allow(clippy::too_many_arguments)]
pub fn map_single_end_read<F: NamFinder>(
    record: &SequenceRecord,
    finder: &F,
    out: &mut String,
    statistics: &mut AlignmentStatistics,
    aligner: &Aligner,
    map_param: &MappingParameters,
    index_param: &IndexParameters,
    references: &References,
) {
    let mut details = Details::default();
    let mut nams = find_nams_timed(finder, &record.seq, map_param, statistics, &mut details);

    let timer = Instant::now();
    if map_param.is_sam_out {
        let mut sam = SamOutput::new(out, references, map_param.details);
        align_single_end(
            aligner,
            &mut sam,
            &mut nams,
            record,
            index_param.syncmer.k,
            references,
            &mut details,
            map_param,
        );
    } else {
        output_hits_paf(out, &nams, &record.name, references, record.seq.len());
    }
    statistics.tot_extend += timer.elapsed();
    statistics.n_reads += 1;
    statistics.add_details(&details);
}

/// Map one read pair end to end and append its output records
#[allow(clippy::too_many_arguments)]
pub fn map_paired_end_read<F: NamFinder>(
    record1: &SequenceRecord,
    record2: &SequenceRecord,
    finder: &F,
    out: &mut String,
    statistics: &mut AlignmentStatistics,
    isize_est: &mut InsertSizeDistribution,
    aligner: &Aligner,
    map_param: &MappingParameters,
    index_param: &IndexParameters,
    references: &References,
) {
    let mut details = [Details::default(), Details::default()];
    let mut nams1 = find_nams_timed(finder, &record1.seq, map_param, statistics, &mut details[0]);
    let mut nams2 = find_nams_timed(finder, &record2.seq, map_param, statistics, &mut details[1]);

    let timer = Instant::now();
    if map_param.is_sam_out {
        let mut sam = SamOutput::new(out, references, map_param.details);
        align_paired_end(
            aligner,
            &mut sam,
            &mut nams1,
            &mut nams2,
            record1,
            record2,
            index_param.syncmer.k,
            references,
            &mut details,
            isize_est,
            map_param,
        );
    } else {
        let (nam1, nam2) = get_best_map_location(&nams1, &nams2, isize_est);
        output_hits_paf_pe(
            out,
            nam1.as_ref(),
            &record1.name,
            references,
            record1.seq.len(),
        );
        output_hits_paf_pe(
            out,
            nam2.as_ref(),
            &record2.name,
            references,
            record2.seq.len(),
        );
    }
    statistics.tot_extend += timer.elapsed();
    statistics.n_reads += 2;
    statistics.add_details(&details[0]);
    statistics.add_details(&details[1]);
}

/// Map a batch of single-end reads on the rayon pool. Output order follows
/// input order.
pub fn map_single_end_batch<F: NamFinder + Sync>(
    records: &[SequenceRecord],
    finder: &F,
    aligner: &Aligner,
    map_param: &MappingParameters,
    index_param: &IndexParameters,
    references: &References,
) -> (String, AlignmentStatistics) {
    let results: Vec<(String, AlignmentStatistics)> = records
        .par_chunks(CHUNK_READS)
        .map(|chunk| {
            let mut out = String::new();
            let mut statistics = AlignmentStatistics::default();
            for record in chunk {
                map_single_end_read(
                    record,
                    finder,
                    &mut out,
                    &mut statistics,
                    aligner,
                    map_param,
                    index_param,
                    references,
                );
            }
            (out, statistics)
        })
        .collect();
    collect_worker_outputs(results)
}

/// Map a batch of read pairs on the rayon pool. Each worker chunk owns its
/// insert-size estimator; size chunks generously if the estimate matters.
pub fn map_paired_end_batch<F: NamFinder + Sync>(
    records1: &[SequenceRecord],
    records2: &[SequenceRecord],
    finder: &F,
    aligner: &Aligner,
    map_param: &MappingParameters,
    index_param: &IndexParameters,
    references: &References,
) -> (String, AlignmentStatistics) {
    if records1.len() != records2.len() {
        log::warn!(
            "paired input lengths differ: {} vs {} records",
            records1.len(),
            records2.len()
        );
    }
    let n = records1.len().min(records2.len());
    let results: Vec<(String, AlignmentStatistics)> = records1[..n]
        .par_chunks(CHUNK_READS)
        .zip(records2[..n].par_chunks(CHUNK_READS))
        .map(|(chunk1, chunk2)| {
            let mut out = String::new();
            let mut statistics = AlignmentStatistics::default();
            let mut isize_est = InsertSizeDistribution::default();
            for (record1, record2) in chunk1.iter().zip(chunk2.iter()) {
                map_paired_end_read(
                    record1,
                    record2,
                    finder,
                    &mut out,
                    &mut statistics,
                    &mut isize_est,
                    aligner,
                    map_param,
                    index_param,
                    references,
                );
            }
            (out, statistics)
        })
        .collect();
    collect_worker_outputs(results)
}

fn collect_worker_outputs(results: Vec<(String, AlignmentStatistics)>) -> (String, AlignmentStatistics) {
    let mut out = String::new();
    let mut statistics = AlignmentStatistics::default();
    for (chunk_out, chunk_stats) in results {
        out.push_str(&chunk_out);
        statistics.merge(&chunk_stats);
    }
    (out, statistics)
}
