// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

mod error;
mod state;

use std::collections::HashMap;
use std::f64::consts;
use itertools::Itertools;

use crate::ast::*;
use crate::util::{is_close, num_to_int};
use crate::{DwellStyle, Options};

pub use self::error::*;
pub use self::state::*;

/// Math and utility functions callable from expressions.
const FUNCTIONS: &[&str] = &[
    "cos", "sin", "tan", "sqrt", "abs", "pow", "log", "exp", "round", "frange",
];

/// A value produced by the intermediate code at run time.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
    Bool(bool),
    Range(FRange),
}

impl Value {
    fn as_num(&self) -> Result<f64, ErrType> {
        match self {
            Value::Num(n) => Ok(*n),
            other => Err(ErrType::NotANumber(other.type_name())),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Range(_) => "range",
        }
    }
}

/// Lazily yields floats from `start` (inclusive) to `stop` (exclusive).
///
/// Construction fails for a zero step, and for a step whose sign walks away
/// from `stop` (including `start == stop`), so iteration always terminates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FRange {
    next: f64,
    stop: f64,
    step: f64,
}

impl FRange {
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self, ErrType> {
        if step == 0. {
            return Err(ErrType::ZeroStep);
        }
        if !(step > 0. && stop > start || step < 0. && start > stop) {
            return Err(ErrType::InfiniteLoop);
        }
        Ok(FRange { next: start, stop, step })
    }
}

impl Iterator for FRange {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let i = self.next;
        let in_range = if self.step > 0. { i < self.stop } else { i > self.stop };
        if !in_range || is_close(i, self.stop) {
            return None;
        }
        self.next = i + self.step;
        Some(i)
    }
}

/// The Evaluator interprets an intermediate program, threading the machine's
/// modal state through the command handlers and collecting their output.
///
/// The execution environment is closed: scripts can reach the whitelisted
/// math functions, `frange`, `console_print` and the command handlers, and
/// nothing else.  Diagnostic output goes through the registered print
/// callback; everything destined for the G-code result is appended to the
/// output buffer, which is owned by this evaluator and reset on every run.
pub struct Evaluator<'a> {
    opts: &'a Options,
    print: Box<dyn FnMut(&str) + 'a>,
    vars: HashMap<String, Value>,
    state: MachineState,
    out: String,
}

impl<'a> Evaluator<'a> {
    pub fn new(opts: &'a Options, print: impl FnMut(&str) + 'a) -> Self {
        Evaluator {
            opts,
            print: Box::new(print),
            vars: HashMap::new(),
            state: MachineState::default(),
            out: String::new(),
        }
    }

    /// Run a program against fresh machine state and return the raw G-code.
    ///
    /// On failure the output buffer is discarded in full; no partial output
    /// is ever returned.
    pub fn eval(&mut self, program: &[Stmt]) -> Result<String, CompileError> {
        self.vars.clear();
        self.state = MachineState::default();
        self.out.clear();
        self.exec_body(program)?;
        Ok(std::mem::take(&mut self.out))
    }

    /// The machine state left behind by the last run.
    pub fn state(&self) -> &MachineState {
        &self.state
    }

    // -- statement execution --

    fn exec_body(&mut self, body: &[Stmt]) -> Result<(), CompileError> {
        for stmt in body {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        // Attach the line number to errors of this statement only; errors
        // already attributed by a nested statement pass through unchanged.
        let lineno = stmt.lineno;
        match &stmt.kind {
            StmtKind::Assign { targets, value } => {
                let value = self.eval_expr(value)
                    .map_err(|e| CompileError::evaluate(lineno, e))?;
                for target in targets {
                    self.vars.insert(target.clone(), value.clone());
                }
            }
            StmtKind::For { var, iter, body } => {
                let range = match self.eval_expr(iter)
                    .map_err(|e| CompileError::evaluate(lineno, e))? {
                    Value::Range(range) => range,
                    other => return Err(CompileError::evaluate(
                        lineno, ErrType::NotIterable(other.type_name()))),
                };
                for i in range {
                    self.vars.insert(var.clone(), Value::Num(i));
                    self.exec_body(body)?;
                }
            }
            StmtKind::Calls(calls) => {
                for call in calls {
                    self.exec_call(call)
                        .map_err(|e| CompileError::evaluate(lineno, e))?;
                }
            }
            StmtKind::Expr(expr) => {
                self.eval_expr(expr)
                    .map_err(|e| CompileError::evaluate(lineno, e))?;
            }
        }
        Ok(())
    }

    fn exec_call(&mut self, call: &Call) -> Result<(), ErrType> {
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push((arg.key.as_deref(), self.eval_expr(&arg.value)?));
        }
        if FUNCTIONS.contains(&call.name.as_str()) {
            self.call_function(&call.name, args).map(|_| ())
        } else {
            self.dispatch(&call.name, args)
        }
    }

    // -- expression evaluation --

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, ErrType> {
        Ok(match expr {
            Expr::Num(n) => Value::Num(*n),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Name(name) => match self.vars.get(name) {
                Some(value) => value.clone(),
                None => match name.as_str() {
                    "PI" => Value::Num(consts::PI),
                    "E" => Value::Num(consts::E),
                    _ => return Err(ErrType::UnknownName(name.clone())),
                },
            },
            Expr::UnOp(op, arg) => {
                let arg = self.eval_expr(arg)?.as_num()?;
                Value::Num(match op {
                    UnOp::Minus => -arg,
                    UnOp::Plus => arg,
                })
            }
            Expr::BinOp(op, lhs, rhs) => {
                let lhs = self.eval_expr(lhs)?.as_num()?;
                let rhs = self.eval_expr(rhs)?.as_num()?;
                Value::Num(match op {
                    Op::Add => lhs + rhs,
                    Op::Sub => lhs - rhs,
                    Op::Mul => lhs * rhs,
                    Op::Div => if rhs == 0. {
                        return Err(ErrType::DivByZero)
                    } else { lhs / rhs },
                    Op::Mod => if rhs == 0. {
                        return Err(ErrType::DivByZero)
                    } else { lhs % rhs },
                    Op::Exp => lhs.powf(rhs),
                })
            }
            Expr::Call(call) => {
                let mut args = Vec::with_capacity(call.args.len());
                for arg in &call.args {
                    args.push((arg.key.as_deref(), self.eval_expr(&arg.value)?));
                }
                self.call_function(&call.name, args)?
            }
        })
    }

    /// Call one of the whitelisted functions.  Trigonometry is degree-based.
    fn call_function(&mut self, name: &str, args: Vec<(Option<&str>, Value)>)
                     -> Result<Value, ErrType> {
        let mut vals = Vec::with_capacity(args.len());
        for (key, value) in args {
            if key.is_some() {
                return Err(ErrType::KeywordArg(name.into()));
            }
            vals.push(value);
        }
        let nargs = vals.len();
        let nums = || -> Result<Vec<f64>, ErrType> {
            vals.iter().map(|v| v.as_num()).collect()
        };
        Ok(Value::Num(match name {
            "cos" => one("cos", nums()?)?.to_radians().cos(),
            "sin" => one("sin", nums()?)?.to_radians().sin(),
            "tan" => one("tan", nums()?)?.to_radians().tan(),
            "abs" => one("abs", nums()?)?.abs(),
            "exp" => one("exp", nums()?)?.exp(),
            "sqrt" => {
                let x = one("sqrt", nums()?)?;
                if x < 0. {
                    return ErrType::other("sqrt() of a negative value");
                }
                x.sqrt()
            }
            "log" => match nums()?.as_slice() {
                &[x] | &[x, _] if x <= 0. =>
                    return ErrType::other("log() of a non-positive value"),
                &[x] => x.ln(),
                &[x, base] => x.log(base),
                _ => return Err(ErrType::BadArgCount("log", nargs)),
            },
            "pow" => match nums()?.as_slice() {
                &[x, y] => x.powf(y),
                _ => return Err(ErrType::BadArgCount("pow", nargs)),
            },
            "round" => match nums()?.as_slice() {
                &[x] => round_even(x),
                &[x, digits] => {
                    let digits = num_to_int(digits, |_| ErrType::Other(
                        "round() digits must be an integer".into()))?;
                    let scale = 10f64.powi(digits as i32);
                    round_even(x * scale) / scale
                }
                _ => return Err(ErrType::BadArgCount("round", nargs)),
            },
            "frange" => match nums()?.as_slice() {
                &[start, stop, step] =>
                    return Ok(Value::Range(FRange::new(start, stop, step)?)),
                _ => return Err(ErrType::BadArgCount("frange", nargs)),
            },
            _ => return Err(ErrType::UnknownCommand(name.into())),
        }))
    }

    // -- command handlers --

    /// Look up and run the handler of a machine command.
    fn dispatch(&mut self, name: &str, args: Vec<(Option<&str>, Value)>)
                -> Result<(), ErrType> {
        match name {
            "G00" => {
                let words = words_args("G00", args)?;
                self.rapid_move(words)
            }
            "G01" => {
                let words = words_args("G01", args)?;
                self.line_move(words)
            }
            "G02" | "G03" => {
                let code = if name == "G02" { "G02" } else { "G03" };
                let words = words_args(code, args)?;
                check_allowed(code, &words, &["X", "Y", "Z", "I", "J", "K", "R", "F"])?;
                self.emit_words(code, &words);
                Ok(())
            }
            "G04" => {
                let words = words_args("G04", args)?;
                check_allowed("G04", &words, &["P"])?;
                check_required("G04", &words, &["P"])?;
                self.dwell(words.get("P").expect("checked"));
                Ok(())
            }
            "G15" => {
                flag_arg("G15", &args)?;
                self.state.polar_enabled = false;
                Ok(())
            }
            "G16" => {
                let words = words_args("G16", args)?;
                check_allowed("G16", &words, &["X", "Y"])?;
                check_required("G16", &words, &["X", "Y"])?;
                self.state.polar_enabled = true;
                self.state.polar_cx = words.get("X").expect("checked");
                self.state.polar_cy = words.get("Y").expect("checked");
                Ok(())
            }
            "G17" => {
                let nl = flag_arg("G17", &args)?;
                self.state.arc_plane = Plane::XY;
                self.emit_modal("G17", nl);
                Ok(())
            }
            "G18" => {
                let nl = flag_arg("G18", &args)?;
                self.state.arc_plane = Plane::XZ;
                self.emit_modal("G18", nl);
                Ok(())
            }
            "G19" => {
                let nl = flag_arg("G19", &args)?;
                self.state.arc_plane = Plane::YZ;
                self.emit_modal("G19", nl);
                Ok(())
            }
            "G20" => {
                let nl = flag_arg("G20", &args)?;
                self.state.unit = Unit::In;
                self.emit_modal("G20", nl);
                Ok(())
            }
            "G21" => {
                let nl = flag_arg("G21", &args)?;
                self.state.unit = Unit::Mm;
                self.emit_modal("G21", nl);
                Ok(())
            }
            "G80" => {
                flag_arg("G80", &args)?;
                self.state.cycle = None;
                Ok(())
            }
            "G81.1" => {
                let words = words_args("G81.1", args)?;
                self.drill_enter(words)
            }
            "G90" => {
                let nl = flag_arg("G90", &args)?;
                self.state.positioning = Positioning::Absolute;
                self.emit_modal("G90", nl);
                Ok(())
            }
            "G91" => {
                let nl = flag_arg("G91", &args)?;
                self.state.positioning = Positioning::Incremental;
                self.emit_modal("G91", nl);
                Ok(())
            }
            "G93" => {
                let nl = flag_arg("G93", &args)?;
                self.state.feedrate_mode = FeedrateMode::Inverse;
                self.emit_modal("G93", nl);
                Ok(())
            }
            "G94" => {
                let nl = flag_arg("G94", &args)?;
                self.state.feedrate_mode = FeedrateMode::Normal;
                self.emit_modal("G94", nl);
                Ok(())
            }
            "M03" => {
                let words = words_args("M03", args)?;
                check_allowed("M03", &words, &["S"])?;
                check_required("M03", &words, &["S"])?;
                let rpm = num_to_int(words.get("S").expect("checked"),
                                     ErrType::SpindleSpeedNotInt)?;
                self.state.spindle = Spindle::Cw;
                self.state.spindle_rpm = rpm;
                self.out.push_str(&format!("M03 S{}\n", rpm));
                Ok(())
            }
            "M05" => {
                let nl = flag_arg("M05", &args)?;
                self.state.spindle = Spindle::Off;
                self.state.spindle_rpm = 0;
                self.emit_modal("M05", nl);
                Ok(())
            }
            "M30" => {
                let nl = flag_arg("M30", &args)?;
                self.emit_modal("M30", nl);
                Ok(())
            }
            "canned_cycle" => {
                let words = words_args("canned_cycle", args)?;
                check_allowed("canned_cycle", &words, &["X", "Y"])?;
                self.cycle_dispatch(words)
            }
            "console_print" => self.console_print(args),
            _ => Err(ErrType::UnknownCommand(name.into())),
        }
    }

    /// Rapid linear motion (G00).
    fn rapid_move(&mut self, words: Words) -> Result<(), ErrType> {
        check_allowed("G00", &words, &["X", "Y", "Z", "A", "B", "C"])?;
        let words = self.polar_to_cartesian("G00", words)?;
        self.emit_words("G00", &words);
        Ok(())
    }

    /// Linear motion at the current or given feedrate (G01).
    fn line_move(&mut self, words: Words) -> Result<(), ErrType> {
        check_allowed("G01", &words, &["X", "Y", "Z", "A", "B", "C", "F"])?;
        let words = self.polar_to_cartesian("G01", words)?;
        self.emit_words("G01", &words);
        Ok(())
    }

    /// In polar mode, X is a radius and Y an angle in degrees around the
    /// configured origin.  Both must be given to convert; a lone Z (or other
    /// axis) move passes through untouched.
    fn polar_to_cartesian(&self, code: &'static str, mut words: Words)
                          -> Result<Words, ErrType> {
        if !self.state.polar_enabled {
            return Ok(words);
        }
        match (words.get("X"), words.get("Y")) {
            (Some(r), Some(theta)) => {
                let theta = theta.to_radians();
                words.set("X", self.state.polar_cx + r * theta.cos());
                words.set("Y", self.state.polar_cy + r * theta.sin());
            }
            (Some(_), None) => return Err(ErrType::PolarNeeds(code, "Y")),
            (None, Some(_)) => return Err(ErrType::PolarNeeds(code, "X")),
            (None, None) => (),
        }
        Ok(words)
    }

    /// Dwell (G04) for P time: non-negative P is seconds, negative P is
    /// milliseconds.  The emitted format depends on the configured style.
    fn dwell(&mut self, p: f64) {
        match self.opts.dwell_style {
            DwellStyle::Rs274 => {
                let secs = if p >= 0. { p } else { -p / 1000. };
                self.out.push_str(&format!("G04 P{}\n", secs));
            }
        }
    }

    /// Enter the drilling cycle (G81.1), storing its parameters and running
    /// the expansion once for the initial coordinates.
    fn drill_enter(&mut self, mut words: Words) -> Result<(), ErrType> {
        check_allowed("G81.1", &words, &["Z", "R", "F", "X", "Y", "L", "P", "D", "A"])?;
        check_required("G81.1", &words, &["Z", "R", "F", "X", "Y"])?;
        if words.contains("D") != words.contains("A") {
            return Err(ErrType::ExclusiveParams("G81.1", "D", "A"));
        }
        let x = words.remove("X").expect("checked");
        let y = words.remove("Y").expect("checked");
        self.state.cycle = Some(CycleContext { mode: CycleMode::Drill, params: words });
        let mut coords = Words::default();
        coords.push("X", x);
        coords.push("Y", y);
        self.cycle_dispatch(coords)
    }

    /// Expand one coordinate line of the active canned cycle.
    fn cycle_dispatch(&mut self, coords: Words) -> Result<(), ErrType> {
        let ctx = match &self.state.cycle {
            Some(ctx) => ctx.clone(),
            None => return Err(ErrType::CycleLineOutsideCycle),
        };
        match ctx.mode {
            CycleMode::Drill => {
                // rapid move above the hole, then plunge/retract L times
                self.rapid_move(coords)?;
                let repeats = ctx.params.get_def("L", 1.);
                let mut i = 0.;
                while i < repeats {
                    let mut plunge = Words::default();
                    plunge.push("Z", ctx.params.get("Z").expect("required word"));
                    plunge.push("F", ctx.params.get("F").expect("required word"));
                    self.line_move(plunge)?;
                    if let Some(p) = ctx.params.get("P") {
                        self.dwell(p);
                    }
                    let mut retract = Words::default();
                    retract.push("Z", ctx.params.get("R").expect("required word"));
                    self.rapid_move(retract)?;
                    i += 1.;
                }
            }
        }
        Ok(())
    }

    /// Forward a value to the registered print callback.  Accepts numbers
    /// and strings; output does not land in the compiled G-code.
    fn console_print(&mut self, args: Vec<(Option<&str>, Value)>)
                     -> Result<(), ErrType> {
        match args.as_slice() {
            [(None, Value::Num(n))] => (self.print)(&n.to_string()),
            [(None, Value::Str(s))] => (self.print)(s),
            [(None, other)] => return Err(ErrType::BadPrintArg(other.type_name())),
            _ => return ErrType::other("console_print takes a single value"),
        }
        Ok(())
    }

    // -- emission --

    fn emit_words(&mut self, code: &str, words: &Words) {
        let params = words.iter().map(|(l, v)| format!("{}{}", l, v)).join(" ");
        self.out.push_str(&format!("{} {}\n", code, params));
    }

    fn emit_modal(&mut self, code: &str, line_end: bool) {
        self.out.push_str(code);
        self.out.push(if line_end { '\n' } else { ' ' });
    }
}

// ----- non-public helper APIs

/// Collect evaluated call arguments into ordered parameter words; commands
/// take `Letter=value` parameters only, each letter at most once.
fn words_args(code: &'static str, args: Vec<(Option<&str>, Value)>)
              -> Result<Words, ErrType> {
    let mut words = Words::default();
    for (key, value) in args {
        match key {
            Some(letter) => {
                if words.contains(letter) {
                    return ErrType::other(
                        format!("{} given duplicate parameter {}", code, letter));
                }
                words.push(letter, value.as_num()?);
            }
            None => return ErrType::other(
                format!("{} takes letter=value parameters only", code)),
        }
    }
    Ok(words)
}

/// Extract the single line-end flag of a parameterless command.
fn flag_arg(code: &'static str, args: &[(Option<&str>, Value)])
            -> Result<bool, ErrType> {
    match args {
        [(None, Value::Bool(b))] => Ok(*b),
        _ => ErrType::other(format!("{} takes a single line-end flag", code)),
    }
}

fn check_allowed(code: &'static str, words: &Words, allowed: &[&str])
                 -> Result<(), ErrType> {
    let illegal: Vec<String> = words.letters()
        .filter(|l| !allowed.contains(l)).map(Into::into).collect();
    if illegal.is_empty() {
        Ok(())
    } else {
        Err(ErrType::UnexpectedParams(code, illegal))
    }
}

fn check_required(code: &'static str, words: &Words, required: &[&str])
                  -> Result<(), ErrType> {
    let missing: Vec<String> = required.iter()
        .filter(|&&l| !words.contains(l)).map(|&l| l.into()).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ErrType::MissingParams(code, missing))
    }
}

fn one(name: &'static str, vals: Vec<f64>) -> Result<f64, ErrType> {
    match vals.as_slice() {
        &[x] => Ok(x),
        _ => Err(ErrType::BadArgCount(name, vals.len())),
    }
}

/// Round half to even, as the script-level `round` does.
fn round_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 && rounded % 2. != 0. {
        rounded - (x - x.trunc()).signum()
    } else {
        rounded
    }
}
