// Reference sequence store
//
// Read-only after construction and shared by reference across workers.

/// Named reference contigs with their sequences and lengths
#[derive(Clone, Debug, Default)]
pub struct References {
    pub names: Vec<String>,
    pub sequences: Vec<Vec<u8>>,
    pub lengths: Vec<usize>,
}

impl References {
    pub fn new(names: Vec<String>, sequences: Vec<Vec<u8>>) -> Self {
        let lengths = sequences.iter().map(|s| s.len()).collect();
        References {
            names,
            sequences,
            lengths,
        }
    }

    /// Number of contigs
    pub fn size(&self) -> usize {
        self.sequences.len()
    }

    /// Total number of reference bases
    pub fn total_length(&self) -> usize {
        self.lengths.iter().sum()
    }
}
