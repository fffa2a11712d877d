// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Normalization of raw XGC text before translation.

use fancy_regex::Regex;
use itertools::Itertools;

/// Strip an XGC script of comments, `[]` syntax sugar and blank lines.
///
/// The only comments allowed in XGC are semicolon ones, both standalone and
/// inline; parentheses are taken by function calls (e.g. `X[10*cos(i)]`).
/// Brackets around values are a readability convention and are removed
/// without pairing checks.  Line numbers of the result are counted 1-based
/// over the surviving lines only.
///
/// Stripping is idempotent: running it on its own output is a no-op.
pub fn strip(script: &str) -> String {
    let comments = Regex::new(r"[ \t]*;.*").expect("valid regex");
    let script = comments.replace_all(script, "");
    script.lines()
        .map(|line| line.replace('[', "").replace(']', ""))
        .filter(|line| !line.trim().is_empty())
        .join("\n")
}
