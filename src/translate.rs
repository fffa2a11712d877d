// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Line classification and translation of normalized XGC into intermediate
//! code.

use std::collections::BTreeSet;
use itertools::Itertools;

use crate::eval::{CompileError, ErrType};
use crate::parse::is_assignment;

/// Supported commands that take no input.  They update modal state and may
/// share a line, e.g. a safety starting line `G17 G90 G21`.
const PARAMETERLESS: &[&str] = &[
    "G15", "G17", "G18", "G19", "G20", "G21", "G80", "G90",
    "G91", "G93", "G94", "M05", "M30",
];

/// Translate a normalized script into intermediate code, line by line.
///
/// Each input line yields exactly one output line, so line numbers carry
/// over unchanged into evaluation.
pub fn translate(normalized: &str) -> Result<String, CompileError> {
    let mut ic = String::new();
    for (n, line) in normalized.lines().enumerate() {
        translate_line(line, &mut ic)
            .map_err(|errtype| CompileError::translate(n + 1, errtype))?;
    }
    Ok(ic)
}

/// Classify one line and append its translation.  First match wins:
///
/// 1. variable assignments and lines starting with a lowercase character
///    (loop headers, utility calls) pass through untouched,
/// 2. lines consisting of X and/or Y words only belong to the active canned
///    cycle and become a `canned_cycle(...)` call,
/// 3. lines of parameterless commands become one call per token, all but the
///    last with a `False` line-end flag,
/// 4. everything else must be a command with `<Letter><value>` words and
///    becomes a call with one keyword argument per word.
fn translate_line(line: &str, ic: &mut String) -> Result<(), ErrType> {
    let body = line.trim();
    let indent = &line[..line.len() - line.trim_start().len()];
    let first = match body.chars().next() {
        Some(first) => first,
        None => return ErrType::other("blank line in normalized input"),
    };

    if first.is_lowercase() || is_assignment(body) {
        ic.push_str(line);
        ic.push('\n');
        return Ok(());
    }

    let tokens: Vec<&str> = body.split_whitespace().collect();
    let letters: Vec<char> = tokens.iter().map(|t| t.chars().next().expect("token")).collect();

    if letters.iter().all(|&l| l == 'X' || l == 'Y') {
        let mut seen = BTreeSet::new();
        for &letter in &letters {
            if !seen.insert(letter) {
                return Err(ErrType::DuplicateAxis(letter));
            }
        }
        let args: Vec<_> = tokens.iter().map(|t| word_arg(t)).try_collect()?;
        ic.push_str(&format!("{}canned_cycle({})\n", indent, args.join(", ")));
        return Ok(());
    }

    if tokens.iter().all(|t| PARAMETERLESS.contains(t)) {
        let (last, init) = tokens.split_last().expect("nonempty line");
        ic.push_str(indent);
        for code in init {
            ic.push_str(&format!("{}(False)", code));
        }
        ic.push_str(&format!("{}(True)\n", last));
        return Ok(());
    }

    let (command, words) = tokens.split_first().expect("nonempty line");
    if !is_command_code(command) {
        return Err(ErrType::MalformedCommand((*command).into()));
    }
    if words.is_empty() {
        return Err(ErrType::BareCommand((*command).into()));
    }
    let args: Vec<_> = words.iter().map(|t| word_arg(t)).try_collect()?;
    ic.push_str(&format!("{}{}({})\n", indent, command, args.join(", ")));
    Ok(())
}

/// Split a `<Letter><value>` word into a `Letter=value` keyword argument.
fn word_arg(token: &str) -> Result<String, ErrType> {
    let mut chars = token.chars();
    match chars.next() {
        Some(letter) if letter.is_ascii_uppercase() && !chars.as_str().is_empty() =>
            Ok(format!("{}={}", letter, chars.as_str())),
        _ => Err(ErrType::MalformedWord(token.into())),
    }
}

fn is_command_code(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next().map_or(false, |c| c.is_ascii_uppercase()) &&
        chars.all(|c| c.is_ascii_alphanumeric() || c == '.')
}
