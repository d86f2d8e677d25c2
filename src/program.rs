pub(crate) mod buffer;
pub(crate) mod compiled;
pub(crate) mod fingerprint;
pub(crate) mod global;
pub(crate) mod instr;
pub(crate) mod usage;
