//! UID generation for TS6-style user identifiers.

/// Generates unique user IDs (UIDs) in TS6 format.
///
/// Format: SID (3 chars) + client ID (6 chars base36) = 9 chars total.
/// Example: "0AAAAAAAB"
///
/// IDs are never handed out twice during the life of the process.
#[derive(Debug)]
pub struct UidGenerator {
    sid: String,
    counter: u64,
}

/// Largest client ID representable in six base36 characters.
const UID_SPACE: u64 = 36u64.pow(6);

impl UidGenerator {
    /// Create a new UID generator for the given server ID.
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            counter: 0,
        }
    }

    /// Generate the next unique UID.
    ///
    /// # Panics
    ///
    /// When the six-character client ID space is exhausted.
    pub fn next_uid(&mut self) -> String {
        assert!(self.counter < UID_SPACE, "UID space exhausted for {}", self.sid);
        let n = self.counter;
        self.counter += 1;
        format!("{}{}", self.sid, base36_encode_6(n))
    }
}

/// Encode a number as a 6-character base36 string.
fn base36_encode_6(mut n: u64) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut result = [b'A'; 6];

    for slot in result.iter_mut().rev() {
        *slot = CHARS[(n % 36) as usize];
        n /= 36;
    }

    result.iter().map(|&b| b as char).collect()
}
