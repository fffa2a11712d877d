// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

use strum_macros::Display;

/// The modal state of the machine during one compilation.
///
/// Constructed fresh per compilation and owned by the evaluator; each field
/// is written only by its owning command handler and read by handlers whose
/// output depends on it.
#[derive(Debug, Default)]
pub struct MachineState {
    /// Turned on by G16 and off by G15.
    pub polar_enabled: bool,
    /// Polar origin, set by G16.
    pub polar_cx: f64,
    pub polar_cy: f64,
    /// The active canned cycle, entered by G81.1 and left by G80.
    pub cycle: Option<CycleContext>,
    pub unit: Unit,
    pub positioning: Positioning,
    pub spindle: Spindle,
    pub spindle_rpm: i64,
    pub feedrate_mode: FeedrateMode,
    pub arc_plane: Plane,
}

/// Parameters of the active canned cycle, minus the per-hole coordinates.
#[derive(Clone, Debug)]
pub struct CycleContext {
    pub mode: CycleMode,
    pub params: Words,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CycleMode {
    /// Simple drilling cycle (G81.1).
    Drill,
}

/// A plane as selected by G17-G19.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum Plane {
    XY, XZ, YZ,
}

impl Default for Plane {
    fn default() -> Self { Plane::XY }
}

/// A length unit as selected by G20-G21.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum Unit {
    #[strum(serialize = "mm")]
    Mm,
    #[strum(serialize = "in")]
    In,
}

impl Default for Unit {
    fn default() -> Self { Unit::Mm }
}

/// A positioning mode as selected by G90-G91.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Positioning {
    Absolute,
    Incremental,
}

impl Default for Positioning {
    fn default() -> Self { Positioning::Absolute }
}

/// A feedrate mode as selected by G93-G94.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FeedrateMode {
    Normal,
    Inverse,
}

impl Default for FeedrateMode {
    fn default() -> Self { FeedrateMode::Normal }
}

/// A spindle state.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum Spindle {
    Off, Cw,
}

impl Default for Spindle {
    fn default() -> Self { Spindle::Off }
}

/// The ordered parameter words of a single command.
///
/// Insertion order is emission order, matching the order the letters appear
/// on the source line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Words(Vec<(String, f64)>);

impl Words {
    pub fn push(&mut self, letter: impl Into<String>, value: f64) {
        self.0.push((letter.into(), value));
    }

    pub fn get(&self, letter: &str) -> Option<f64> {
        self.0.iter().find(|(l, _)| l == letter).map(|&(_, v)| v)
    }

    pub fn get_def(&self, letter: &str, def: f64) -> f64 {
        self.get(letter).unwrap_or(def)
    }

    /// Replace the value of an existing word, keeping its position.
    pub fn set(&mut self, letter: &str, value: f64) {
        if let Some(entry) = self.0.iter_mut().find(|(l, _)| l == letter) {
            entry.1 = value;
        }
    }

    pub fn remove(&mut self, letter: &str) -> Option<f64> {
        let idx = self.0.iter().position(|(l, _)| l == letter)?;
        Some(self.0.remove(idx).1)
    }

    pub fn contains(&self, letter: &str) -> bool {
        self.get(letter).is_some()
    }

    pub fn letters(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(l, v)| (l.as_str(), *v))
    }
}
