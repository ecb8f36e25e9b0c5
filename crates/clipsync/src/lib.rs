//! clipsync command-line front end.
//!
//! The binary in `main.rs` is a thin shell: it parses arguments, loads the
//! optional config file through [`domain::config`], and then runs either the
//! relay (`clipsync server`) or a client (`clipsync client <host>:<port>`).
//! Config handling lives in this library so it can be tested on its own.

pub mod domain;
