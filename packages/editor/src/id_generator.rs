use crc32fast::Hasher;

/// Generate a document seed from its path using CRC32
pub fn get_document_seed(path: &str) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(path.as_bytes());
    hasher.finalize()
}

/// Sequential `w:id` allocator for revision wrappers and comments.
///
/// Ids are strictly increasing from one past the largest id already present,
/// so new wrappers never collide with existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionIds {
    next: u32,
}

impl RevisionIds {
    pub fn starting_after(max_existing: u32) -> Self {
        Self {
            next: max_existing.saturating_add(1),
        }
    }

    /// Generate next sequential ID
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Deterministic `w14:paraId` generator for comment paragraphs.
///
/// Values are 8 uppercase hex digits below `0x80000000`, derived from the
/// document seed and a counter.
#[derive(Debug, Clone)]
pub struct IDGenerator {
    seed: u32,
    count: u32,
}

impl IDGenerator {
    pub fn new(path: &str) -> Self {
        Self {
            seed: get_document_seed(path),
            count: 0,
        }
    }

    /// Generate next paragraph id
    pub fn new_para_id(&mut self) -> String {
        self.count += 1;
        let mut hasher = Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(&self.count.to_le_bytes());
        format!("{:08X}", hasher.finalize() & 0x7FFF_FFFF)
    }
}
