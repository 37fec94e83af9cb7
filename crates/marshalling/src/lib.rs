//! Payload marshalling for the bean store
//!
//! Bean state is serialized to MessagePack and then transcoded into whatever
//! format the remote cache stores:
//! - MediaType: parsed content types
//! - Transcoder: a codec between media types
//! - MarshallingRegistry: dynamic transcoder lookup with a cached index
//! - EncoderRegistry: id-keyed encoders and wrappers over the same registry
//! - Marshaller: typed serialize / deserialize for one storage format

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoder;
pub mod error;
pub mod marshaller;
pub mod media_type;
pub mod registry;
pub mod transcoder;

pub use encoder::{
    Encoder, EncoderRegistry, IdentityEncoder, IdentityWrapper, JsonEncoder,
    LengthPrefixedWrapper, Wrapper, IDENTITY_ENCODER_ID, IDENTITY_WRAPPER_ID, JSON_ENCODER_ID,
    LENGTH_PREFIXED_WRAPPER_ID,
};
pub use error::{Lookup, MarshallingError, Result};
pub use marshaller::Marshaller;
pub use media_type::{
    MediaType, APPLICATION_BASE64, APPLICATION_JSON, APPLICATION_MSGPACK,
    APPLICATION_OCTET_STREAM, TEXT_PLAIN,
};
pub use registry::MarshallingRegistry;
pub use transcoder::{Base64Transcoder, JsonTranscoder, Transcoder};
