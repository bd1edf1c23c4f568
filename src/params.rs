// Mapping and index parameter structures

/// Knobs for the mapping drivers
#[derive(Clone, Debug)]
pub struct MappingParameters {
    /// Stop extending candidates whose hit count drops below this fraction
    /// of the top candidate's
    pub dropoff_threshold: f32,
    /// Maximum extension attempts per read (or per joint candidate list)
    pub max_tries: usize,
    /// Maximum number of secondary records emitted per read
    pub max_secondary: usize,
    /// Seeding rescue is attempted when > 1
    pub rescue_level: usize,
    /// Hit-count cutoff handed to the seeder's rescue path
    pub rescue_cutoff: usize,
    /// SAM output when true, PAF mapping-only output otherwise
    pub is_sam_out: bool,
    /// Emit per-record diagnostic tags
    pub details: bool,
}

impl Default for MappingParameters {
    fn default() -> Self {
        MappingParameters {
            dropoff_threshold: 0.5,
            max_tries: 20,
            max_secondary: 0,
            rescue_level: 2,
            rescue_cutoff: 1000,
            is_sam_out: true,
            details: false,
        }
    }
}

/// Syncmer seed dimensions
#[derive(Clone, Copy, Debug)]
pub struct SyncmerParameters {
    pub k: usize,
    pub s: usize,
}

impl Default for SyncmerParameters {
    fn default() -> Self {
        SyncmerParameters { k: 20, s: 16 }
    }
}

/// Index-time parameters the alignment core needs to see
#[derive(Clone, Copy, Debug, Default)]
pub struct IndexParameters {
    pub syncmer: SyncmerParameters,
}

impl IndexParameters {
    pub fn new(k: usize, s: usize) -> Self {
        IndexParameters {
            syncmer: SyncmerParameters { k, s },
        }
    }
}
