//! Core abstractions for Keystash: the key-value capability interface, the
//! backing facility contract, and the regular and secure adapters.
//! This crate performs no I/O of its own; concrete facilities live in
//! `keystash-storage`.

pub mod storage;
