// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! A compiler for XGC, an extended G-code dialect with arithmetic, variables
//! and loops, producing plain numeric-control G-code text.
//!
//! The pipeline has four stages: `strip` removes comments and layout sugar,
//! `translate` classifies each line and rewrites it into a narrow
//! intermediate form, `eval` interprets that form in a closed environment
//! while tracking modal machine state, and `round` reformats positional and
//! angular values to fixed precision.
//!
//! ## Basic usage
//!
//! Use [`compile`] to run the whole pipeline.  The print callback receives
//! the output of in-script `console_print` calls; the compiled G-code never
//! contains it.
//!
//! ```rust,no_run
//! use xgc::{compile, Options};
//!
//! fn main() {
//!     let script = "\
//! G21
//! for i in frange(0, 360, 30):
//!     G01 X[10*cos(i)] Y[10*sin(i)] Z-1
//! ";
//!     match compile(script, &Options::default(), |msg| println!("{}", msg)) {
//!         Err(e) => eprintln!("Compile error: {}", e),
//!         Ok(gcode) => print!("{}", gcode),
//!     }
//! }
//! ```
//!
//! ## Unsupported features
//!
//! Scripts have no host access of any kind: no files, no processes, no
//! library calls beyond the whitelisted math and machine commands.

use strum_macros::{Display, EnumString};

pub mod ast;
pub mod eval;
pub mod parse;
pub mod round;
pub mod strip;
pub mod translate;

// internal helpers
pub(crate) mod util;

use crate::eval::{CompileError, Evaluator};

/// Options controlling a single compilation.
#[derive(Clone, Debug)]
pub struct Options {
    /// Digits after the decimal point for X/Y/Z values.
    pub positional_precision: u32,
    /// Digits after the decimal point for A/B/C values.
    pub angular_precision: u32,
    pub dwell_style: DwellStyle,
    /// Whether the host should prepend its header to the result; carried
    /// through unchanged, header synthesis is not done here.
    pub add_header: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            positional_precision: 3,
            angular_precision: 2,
            dwell_style: DwellStyle::Rs274,
            add_header: true,
        }
    }
}

/// Output format of the dwell command (G04), which varies across machine
/// controllers.  Parsing an unknown style name from a settings file fails,
/// rather than configuring a style that would silently emit nothing.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, EnumString)]
pub enum DwellStyle {
    /// `P<seconds>`, as in the original RS-274 standard.
    #[strum(serialize = "RS-274")]
    Rs274,
}

/// Compile an XGC script to G-code.
///
/// The print callback is invoked once per in-script `console_print` call.
/// On failure, the error carries the pipeline phase and the 1-based line
/// number, counted over the normalized script (comment-only and blank lines
/// do not count).
pub fn compile(script: &str, options: &Options, print: impl FnMut(&str))
               -> Result<String, CompileError> {
    let normalized = strip::strip(script);
    let ic = translate::translate(&normalized)?;
    let program = parse::parse_program(&ic)?;
    let raw = Evaluator::new(options, print).eval(&program)?;
    Ok(round::round_gcode(&raw, options))
}
