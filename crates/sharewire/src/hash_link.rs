use super::*;

use crate::error::{HashLinkTailSnafu, IoSnafu};

/// A saved partial SHA-256 computation: the midstate after every full block
/// of the preceding bytes plus the total byte count consumed. Finishing the
/// digest only needs the partial-block tail, which is always a suffix of a
/// trailer both sides know, so the tail itself never travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashLink {
    pub state: [u8; 32],
    pub length: u64,
}

impl HashLink {
    pub fn read(r: &mut impl Read) -> Result<Self> {
        let state = codec::read_fixed::<32>(r)?;
        let length = codec::read_varint(r)?;
        Ok(Self { state, length })
    }

    pub fn write(&self, w: &mut impl Write) -> Result {
        w.write_all(&self.state).context(IoSnafu)?;
        codec::write_varint(w, self.length)
    }

    /// Captures the state of a SHA-256 over `prefix`. The prefix must end
    /// with `ending` and the partial-block tail must fit inside it, since
    /// `finalize` reconstructs the tail from the trailer alone.
    pub fn from_prefix(prefix: &[u8], ending: &[u8]) -> Self {
        assert!(prefix.ends_with(ending), "prefix must end with the trailer");
        assert!(
            prefix.len() % 64 <= ending.len(),
            "partial-block tail must be covered by the trailer"
        );

        let mut engine = sha256::HashEngine::default();
        engine.input(prefix);

        Self {
            state: engine.midstate().to_byte_array(),
            length: prefix.len() as u64,
        }
    }

    /// Resumes the saved computation, replays the buffered tail out of
    /// `ending`, feeds `data`, and finishes with a second SHA-256 pass.
    pub fn finalize(&self, data: &[u8], ending: &[u8]) -> Result<sha256d::Hash> {
        let extra = (self.length % 64) as usize;
        ensure!(
            extra <= ending.len(),
            HashLinkTailSnafu {
                extra,
                trailer: ending.len()
            }
        );

        let mut engine = sha256::HashEngine::from_midstate(
            sha256::Midstate::from_byte_array(self.state),
            (self.length - extra as u64) as usize,
        );
        engine.input(&ending[ending.len() - extra..]);
        engine.input(data);

        let inner = sha256::Hash::from_engine(engine);
        let outer = sha256::Hash::hash(inner.as_byte_array());

        Ok(sha256d::Hash::from_byte_array(outer.to_byte_array()))
    }
}
