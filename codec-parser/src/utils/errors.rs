/// Logs a diagnostic at the given level when the parser has logging enabled.
///
/// `$state` is anything with an `enable_logging: bool` field, normally
/// [`ParserOptions`](crate::process::parse::ParserOptions).
#[macro_export]
macro_rules! log_diagnostic {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $state.enable_logging {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum CodecParserError {
    #[error("Unsupported codec for mime type: {0}")]
    UnsupportedMimeType(String),
}

/// Reasons a header decoder rejects the bytes at the current offset.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Invalid sync pattern")]
    InvalidSyncPattern,

    #[error("Reserved MPEG version")]
    ReservedMpegVersion,

    #[error("Reserved MPEG layer")]
    ReservedLayer,

    #[error("Free format bitrate is not supported")]
    FreeFormatBitrate,

    #[error("Bad bitrate index")]
    BadBitrate,

    #[error("Reserved sample rate code {0:#04b}")]
    ReservedSampleRate(u8),

    #[error("Reserved emphasis code")]
    ReservedEmphasis,

    #[error("Computed frame length is zero")]
    ZeroFrameLength,

    #[error("ADTS layer must be 0, found {0}")]
    InvalidAdtsLayer(u8),

    #[error("Reserved sample frequency index {0}")]
    ReservedSampleRateIndex(u8),

    #[error("Frame length {length} does not cover the {header} byte header")]
    FrameLengthTooShort { length: usize, header: usize },

    #[error("Reserved block size code")]
    ReservedBlockSize,

    #[error("Invalid sample rate code {0:#06b}")]
    InvalidSampleRateCode(u8),

    #[error("Reserved channel assignment {0:#06b}")]
    ReservedChannelAssignment(u8),

    #[error("Reserved bit depth code {0:#05b}")]
    ReservedBitDepth(u8),

    #[error("Reserved bit is set")]
    ReservedBit,

    #[error("Invalid UTF-8 coded frame or sample number")]
    InvalidCodedNumber,

    #[error("Header CRC-8 mismatch: expected {expected:#04X}, found {found:#04X}")]
    HeaderCrcMismatch { expected: u8, found: u8 },

    #[error("Unsupported Ogg stream structure version {0}")]
    InvalidPageVersion(u8),

    #[error("Reserved Ogg header type flags {0:#010b}")]
    InvalidPageFlags(u8),

    #[error("Unsupported Opus version {0}")]
    InvalidOpusVersion(u8),

    #[error("Unsupported channel mapping family {family} with {channels} channels")]
    UnsupportedChannelMapping { family: u8, channels: u8 },

    #[error("Empty packet")]
    EmptyPacket,

    #[error("Packet ends inside its table of contents")]
    TruncatedPacket,

    #[error("Unsupported Vorbis version {0}")]
    InvalidVorbisVersion(u32),

    #[error("Invalid Vorbis block size exponent {0}")]
    InvalidBlockSize(u8),

    #[error("Zero {0} in identification header")]
    ZeroField(&'static str),
}

/// Framing events that are absorbed by resynchronization.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("Lost sync at byte {offset}: {reason}")]
    LostSync { offset: u64, reason: HeaderError },

    #[error("Discarding false positive {codec} header at byte {offset}")]
    FalsePositive { codec: &'static str, offset: u64 },

    #[error("Unable to sync FLAC frame at byte {offset}: no valid frame within {limit} bytes")]
    FlacFrameTooLong { offset: u64, limit: usize },

    #[error("FLAC frame footer CRC-16 mismatch at end of stream (byte {offset})")]
    FlacFooterMismatch { offset: u64 },

    #[error("Discarding {0} trailing bytes that do not form a frame")]
    TrailingBytes(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum OggError {
    #[error(
        "Unexpected gap in Ogg page sequence for stream {serial:#010X}: expected {expected}, found {found}"
    )]
    SequenceGap {
        serial: u32,
        expected: u32,
        found: u32,
    },

    #[error("Ogg page {sequence} checksum mismatch: expected {expected:#010X}, computed {computed:#010X}")]
    ChecksumMismatch {
        sequence: u32,
        expected: u32,
        computed: u32,
    },

    #[error("Dropping {0} bytes of an unterminated continued packet")]
    StaleContinuation(usize),

    #[error("Ignoring {0} logical stream")]
    UnsupportedStream(&'static str),

    #[error("{codec} identification header is missing, skipping page {sequence}")]
    MissingIdentification { codec: &'static str, sequence: u32 },

    #[error("Invalid {codec} packet: {reason}")]
    InvalidPacket {
        codec: &'static str,
        reason: HeaderError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("Missing fLaC marker")]
    MissingFlacMarker,

    #[error("First metadata block is type {0}, not STREAMINFO")]
    NotStreamInfo(u8),

    #[error("STREAMINFO block length is {0}, expected 34")]
    StreamInfoLength(u32),

    #[error("Vorbis setup header signature mismatch")]
    SetupSignature,

    #[error("Vorbis setup header has no framing bit")]
    MissingFramingBit,

    #[error("Unable to locate Vorbis mode configurations")]
    ModesNotFound,
}
