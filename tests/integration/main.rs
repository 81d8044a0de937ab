//! End-to-end suites run against every backend: the table adapter over
//! `MemoryTable` and the object adapter over `MemoryBucket` and `FsBucket`.

#[path = "../common/mod.rs"]
mod common;

mod crud;
mod guards;
mod matching;
