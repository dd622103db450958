#[doc = include_str!("../README.md")]
mod readme_doctests {}
