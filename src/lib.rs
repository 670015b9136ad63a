//! Veredicto - statistical analysis of two-arm A/B experiments
//!
//! This library provides data-integrity validation, two-proportion z-tests,
//! power analysis and Bonferroni-corrected segment testing for conversion
//! experiments, plus CSV loading and text/JSON/CSV reporting.

pub mod cli;
pub mod csv_output;
pub mod dataset;
pub mod experiment;
pub mod json_output;
pub mod observation;
pub mod pipeline;
pub mod recommendation;
pub mod sample_data;
pub mod text_output;
