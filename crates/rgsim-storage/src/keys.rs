use rgsim_types::RgsimError;

const ENC_GROUP_SIZE: usize = 8;
const ENC_MARKER: u8 = 0xFF;
const ENC_PAD: u8 = 0x00;

/// Memcomparable byte encoding.
///
/// The input is cut into 8-byte groups; the last group is zero-padded and
/// every group is followed by a marker byte `0xFF - pad_count`. An input whose
/// length is a multiple of 8 gets a trailing all-pad group, so the encoding is
/// self-delimiting. Lexicographic order of encodings equals the order of the
/// inputs.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let groups = data.len() / ENC_GROUP_SIZE + 1;
    let mut buf = Vec::with_capacity(groups * (ENC_GROUP_SIZE + 1));
    for chunk_start in (0..=data.len()).step_by(ENC_GROUP_SIZE) {
        let remain = data.len() - chunk_start;
        let pad_count = if remain >= ENC_GROUP_SIZE {
            buf.extend_from_slice(&data[chunk_start..chunk_start + ENC_GROUP_SIZE]);
            0
        } else {
            buf.extend_from_slice(&data[chunk_start..]);
            let pad = ENC_GROUP_SIZE - remain;
            buf.resize(buf.len() + pad, ENC_PAD);
            pad
        };
        buf.push(ENC_MARKER - pad_count as u8);
    }
    buf
}

/// Inverse of [`encode_bytes`]. Returns the decoded bytes and the unconsumed
/// tail of `encoded`.
pub fn decode_bytes(encoded: &[u8]) -> Result<(Vec<u8>, &[u8]), RgsimError> {
    let mut out = Vec::with_capacity(encoded.len() / (ENC_GROUP_SIZE + 1) * ENC_GROUP_SIZE);
    let mut rest = encoded;
    loop {
        if rest.len() < ENC_GROUP_SIZE + 1 {
            return Err(RgsimError::Storage("insufficient bytes to decode key".into()));
        }
        let (group, tail) = rest.split_at(ENC_GROUP_SIZE + 1);
        rest = tail;

        let marker = group[ENC_GROUP_SIZE];
        let pad_count = (ENC_MARKER - marker) as usize;
        if pad_count > ENC_GROUP_SIZE {
            return Err(RgsimError::Storage(format!("invalid key group marker {marker:#04x}")));
        }
        let real = ENC_GROUP_SIZE - pad_count;
        out.extend_from_slice(&group[..real]);
        if pad_count != 0 {
            if group[real..ENC_GROUP_SIZE].iter().any(|&b| b != ENC_PAD) {
                return Err(RgsimError::Storage("invalid key padding".into()));
            }
            return Ok((out, rest));
        }
    }
}

/// A key in the encoded form regions store and compare.
///
/// The empty key stays empty in both directions, so "beginning of keyspace"
/// and "unbounded end" survive encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MvccKey(Vec<u8>);

impl MvccKey {
    pub fn new(raw: &[u8]) -> Self {
        if raw.is_empty() {
            return MvccKey(Vec::new());
        }
        MvccKey(encode_bytes(raw))
    }

    /// Wrap bytes that are already encoded.
    pub fn from_encoded(encoded: Vec<u8>) -> Self {
        MvccKey(encoded)
    }

    pub fn raw(&self) -> Result<Vec<u8>, RgsimError> {
        if self.0.is_empty() {
            return Ok(Vec::new());
        }
        let (raw, rest) = decode_bytes(&self.0)?;
        if !rest.is_empty() {
            return Err(RgsimError::Storage(format!(
                "{} trailing bytes after encoded key",
                rest.len()
            )));
        }
        Ok(raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}
