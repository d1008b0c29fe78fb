//! Message-oriented transport for flange/tread exchanges
pub mod codec;
pub mod framing;
pub mod server;

pub use codec::*;
pub use framing::*;
pub use server::*;
