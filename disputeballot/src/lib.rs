#[macro_use]
extern crate serde;

#[macro_use]
extern crate log;

mod address;
mod ballot;
mod call;
mod dispute;
mod encoding;
mod error;
mod finalize;
mod keys;
mod ledger;
mod lifecycle;
mod memledger;
mod oracle;
mod rpc;
mod serde_codec;
mod tally;

pub use address::*;
pub use ballot::*;
pub use call::*;
pub use dispute::*;
pub use encoding::*;
pub use error::*;
pub use finalize::*;
pub use keys::*;
pub use ledger::*;
pub use lifecycle::*;
pub use memledger::*;
pub use oracle::*;
pub use rpc::*;
pub use serde_codec::*;
pub use tally::*;

#[cfg(test)]
mod tests;
