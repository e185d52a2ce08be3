//! Whole-turn tests against scripted retrievers and generation.

mod persistence;
mod support;
