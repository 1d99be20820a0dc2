pub mod checksum;
pub mod xml;
pub(crate) mod zip;
