// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Final formatting pass over the raw G-code output.

use fancy_regex::{Captures, Regex};

use crate::Options;

/// Reformat positional (X/Y/Z) and angular (A/B/C) values to fixed-point
/// notation at the configured precisions.
///
/// The two passes are order-independent since the letter sets are disjoint.
pub fn round_gcode(gcode: &str, opts: &Options) -> String {
    let positional = Regex::new(r"([XYZ])(-?\d+(?:\.\d+)?)").expect("valid regex");
    let angular = Regex::new(r"([ABC])(-?\d+(?:\.\d+)?)").expect("valid regex");
    let rounded = round_values(&positional, gcode, opts.positional_precision);
    round_values(&angular, &rounded, opts.angular_precision)
}

fn round_values(pattern: &Regex, gcode: &str, precision: u32) -> String {
    pattern.replace_all(gcode, |caps: &Captures| {
        let value: f64 = caps[2].parse().expect("numeric match");
        format!("{}{:.*}", &caps[1], precision as usize, value)
    }).into_owned()
}
