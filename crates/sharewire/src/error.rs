use super::*;

pub type Result<T = (), E = WireError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WireError {
    #[snafu(display("read failed: {source}"))]
    Io { source: std::io::Error },

    #[snafu(display("varint not canonically packed: {value} under a {width} byte marker"))]
    NonCanonicalVarint { value: u64, width: usize },

    #[snafu(display("length of {length} bytes exceeds payload maximum"))]
    OversizedPayload { length: u64 },

    #[snafu(display("string is not valid UTF-8: {source}"))]
    Utf8 { source: std::string::FromUtf8Error },

    #[snafu(display("unknown stale tag {tag}"))]
    UnknownStaleTag { tag: u8 },

    #[snafu(display("unknown share reply result {value}"))]
    UnknownReplyResult { value: u64 },

    #[snafu(display("unknown command {command}"))]
    UnknownCommand { command: String },

    #[snafu(display("command bytes are not valid UTF-8"))]
    MalformedCommand,

    #[snafu(display("unknown network {name}"))]
    UnknownNetwork { name: String },

    #[snafu(display("wrong checksum: expected {expected}, got {actual}"))]
    ChecksumMismatch { expected: String, actual: String },

    #[snafu(display("record has {trailing} trailing bytes"))]
    TrailingBytes { trailing: usize },

    #[snafu(display("segwit share is missing its segwit data"))]
    MissingSegwitData,

    #[snafu(display("hash link buffers {extra} bytes, more than the {trailer} byte trailer"))]
    HashLinkTail { extra: usize, trailer: usize },

    #[snafu(display("consensus decode failed: {source}"))]
    Consensus {
        source: bitcoin::consensus::encode::Error,
    },
}
