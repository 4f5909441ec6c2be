mod encoding;
mod reader;

pub use reader::{deserialize_base64_openlr, deserialize_binary_openlr};
