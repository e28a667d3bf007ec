pub(crate) mod byte_size;
pub(crate) mod cmd;
pub(crate) mod input;
pub(crate) mod path;
