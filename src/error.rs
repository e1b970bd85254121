use thiserror::Error;

/// I/O errors that can occur when reading from a backing store (local file,
/// S3, or any other [`crate::io::RangeReader`] implementation).
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage.
    #[error("S3 error: {0}")]
    S3(String),

    /// Requested range exceeds resource bounds.
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Network or connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object not found.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Local filesystem error.
    #[error("Filesystem error for {path}: {message}")]
    Filesystem { path: String, message: String },
}

/// Errors related to format detection and validation.
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// File format is not supported by any registered backend.
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

/// Errors that can occur when parsing TIFF files.
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM).
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number.
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8).
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header.
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location).
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD.
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count.
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme.
    #[error("Unsupported compression: {0} (only JPEG is supported)")]
    UnsupportedCompression(String),

    /// File uses strips instead of tiles.
    #[error("Unsupported organization: file uses strips instead of tiles")]
    StripOrganization,

    /// Unknown field type in IFD entry.
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors from the coordinate and unit conversion layer.
#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    /// No pyramid level satisfies the requested scale within tolerance.
    #[error("no level matches requested scale: {0}")]
    NoMatchingLevel(String),

    /// A `mm`-based scale or region was requested but the source carries no
    /// physical calibration (`mm_x`/`mm_y`).
    #[error("source has no physical calibration (mm_x/mm_y unavailable)")]
    MissingCalibration,

    /// An option value was structurally valid but semantically nonsensical
    /// (e.g. an unknown unit name, a negative size).
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// A coordinate fell outside the addressable range for the given level.
    #[error("out of range: {0}")]
    OutOfRange(String),
}

/// Top-level error type returned by [`crate::source::TileSource`] operations
/// and by the registry/dispatcher.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// No registered backend can read this resource.
    #[error("unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// The underlying file is structurally invalid.
    #[error("corrupt file: {0}")]
    CorruptFile(String),

    /// A specific tile or region failed to decode; does not imply the whole
    /// source is unusable.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// A requested tile/level/coordinate does not exist.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// An option was malformed or not applicable to this source.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// Unit/level selection could not be satisfied.
    #[error("no matching level: {0}")]
    NoMatchingLevel(String),

    /// Physical calibration was requested but unavailable.
    #[error("missing calibration")]
    MissingCalibration,

    /// The source exceeds a configured size limit (e.g. flat-image max side).
    #[error("source too large: {0}")]
    TooLarge(String),

    /// The operation was cancelled before completion.
    #[error("cancelled")]
    Cancelled,

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl From<GeometryError> for SourceError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::NoMatchingLevel(msg) => SourceError::NoMatchingLevel(msg),
            GeometryError::MissingCalibration => SourceError::MissingCalibration,
            GeometryError::InvalidOption(msg) => SourceError::InvalidOption(msg),
            GeometryError::OutOfRange(msg) => SourceError::OutOfRange(msg),
        }
    }
}

impl From<FormatError> for SourceError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Io(e) => SourceError::IoError(e),
            FormatError::Tiff(e) => SourceError::CorruptFile(e.to_string()),
            FormatError::UnsupportedFormat { reason } => SourceError::UnsupportedFormat { reason },
        }
    }
}

impl From<TiffError> for SourceError {
    fn from(err: TiffError) -> Self {
        match &err {
            // `tag: "tile"`/`"level"` mark an out-of-range coordinate rather
            // than a structurally broken file — surface it the way
            // `TileSource::get_tile`'s own contract promises.
            TiffError::InvalidTagValue { tag, .. } if *tag == "tile" || *tag == "level" => {
                SourceError::OutOfRange(err.to_string())
            }
            _ => SourceError::CorruptFile(err.to_string()),
        }
    }
}

/// Errors surfaced by tile encoding (kept for the low-level encode helpers
/// used by the region assembler).
#[derive(Debug, Clone, Error)]
pub enum TileError {
    #[error("decode error: {message}")]
    DecodeError { message: String },

    #[error("encode error: {message}")]
    EncodeError { message: String },
}

impl From<TileError> for SourceError {
    fn from(err: TileError) -> Self {
        SourceError::DecodeFailed(err.to_string())
    }
}
