pub(crate) mod closure;
pub(crate) mod codegen;
pub(crate) mod driver;
pub(crate) mod emit;
pub(crate) mod opts;
pub(crate) mod stack;
pub(crate) mod summary;
pub(crate) mod volume_merge;
