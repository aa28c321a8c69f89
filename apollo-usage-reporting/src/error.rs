//! Usage reporting errors.
use thiserror::Error;

/// Errors raised while decoding traces or preparing report metadata.
///
/// Aggregating a trace never fails: incomplete trace data is skipped instead.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("trace protobuf decode error")]
    ProtobufDecode(#[from] prost::DecodeError),

    #[error("subgraph trace payload was not base64")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("could not determine the host name")]
    Hostname(#[from] sys_info::Error),

    #[error("could not determine the system uname")]
    Uname(#[from] std::io::Error),
}
