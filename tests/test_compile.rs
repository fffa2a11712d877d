// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

use xgc::{compile, parse, strip, translate, Options};
use xgc::eval::{CompileError, ErrorKind, Evaluator, Phase, Plane, Positioning, Unit};

fn comp(src: &str) -> Result<String, CompileError> {
    compile(src, &Options::default(), |_: &str| ())
}

#[test]
fn test_strip_idempotent() {
    let src = "; prepared by hand\nG21 ; set units\n\n   \nG01 X[1+2] Y5\n";
    let normalized = strip::strip(src);
    assert_eq!(normalized, "G21\nG01 X1+2 Y5");
    // re-normalizing normalized text is a no-op
    assert_eq!(strip::strip(&normalized), normalized);
}

#[test]
fn test_parameterless_merge() {
    // several modal codes on one line stay on one output line
    assert_eq!(comp("G17 G90 G21").unwrap(), "G17 G90 G21\n");
    assert_eq!(comp("M05 M30").unwrap(), "M05 M30\n");
    assert_eq!(comp("M30").unwrap(), "M30\n");
}

#[test]
fn test_modal_state() {
    let opts = Options::default();
    let normalized = strip::strip("G17 G90 G21");
    let ic = translate::translate(&normalized).unwrap();
    let program = parse::parse_program(&ic).unwrap();
    let mut evaluator = Evaluator::new(&opts, |_: &str| ());
    assert_eq!(evaluator.eval(&program).unwrap(), "G17 G90 G21\n");
    assert_eq!(evaluator.state().arc_plane, Plane::XY);
    assert_eq!(evaluator.state().positioning, Positioning::Absolute);
    assert_eq!(evaluator.state().unit, Unit::Mm);
}

#[test]
fn test_rounding() {
    assert_eq!(comp("G01 X3.14159 Y2 Z0").unwrap(),
               "G01 X3.142 Y2.000 Z0.000\n");

    let opts = Options { positional_precision: 2, angular_precision: 0,
                         ..Options::default() };
    assert_eq!(compile("G01 X3.14159 Z0", &opts, |_: &str| ()).unwrap(),
               "G01 X3.14 Z0.00\n");
    assert_eq!(compile("G00 A-45.0 Z1", &opts, |_: &str| ()).unwrap(),
               "G00 A-45 Z1.00\n");
}

#[test]
fn test_polar_mode() {
    let src = "\
G16 X0 Y0
G01 X10 Y90
G15
G01 X3 Y4
";
    // radius 10 at 90 degrees lands on (0, 10); G16/G15 emit nothing
    assert_eq!(comp(src).unwrap(), "G01 X0.000 Y10.000\nG01 X3.000 Y4.000\n");

    let err = comp("G16 X0 Y0\nG01 X5").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.lineno, 2);
    assert!(err.to_string().contains("needs an extra argument: Y"));

    // a pure Z move passes through polar mode untouched
    assert_eq!(comp("G16 X0 Y0\nG01 Z-2").unwrap(), "G01 Z-2.000\n");
}

#[test]
fn test_drill_cycle() {
    let src = "\
G81.1 Z-5 R2 F100 X0 Y0
X5 Y5
G80
";
    assert_eq!(comp(src).unwrap(), "\
G00 X0.000 Y0.000
G01 Z-5.000 F100
G00 Z2.000
G00 X5.000 Y5.000
G01 Z-5.000 F100
G00 Z2.000
");

    // L repeats the plunge/retract sequence after a single rapid move
    assert_eq!(comp("G81.1 Z-5 R2 F100 X0 Y0 L3").unwrap(), "\
G00 X0.000 Y0.000
G01 Z-5.000 F100
G00 Z2.000
G01 Z-5.000 F100
G00 Z2.000
G01 Z-5.000 F100
G00 Z2.000
");

    // P adds a dwell after each plunge
    assert_eq!(comp("G81.1 Z-1 R1 F50 X0 Y0 P-500").unwrap(), "\
G00 X0.000 Y0.000
G01 Z-1.000 F50
G04 P0.5
G00 Z1.000
");
}

#[test]
fn test_arcs_verbatim() {
    // arcs are validated for parameter letters only, never interpreted
    assert_eq!(comp("G02 X5 Y5 I2 J0 F100").unwrap(),
               "G02 X5.000 Y5.000 I2 J0 F100\n");
    let err = comp("G03 X5 D2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_cycle_line_requires_cycle() {
    let err = comp("X5 Y5").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluation);
    assert_eq!(err.phase, Phase::Evaluate);
    assert_eq!(err.lineno, 1);
}

#[test]
fn test_frange() {
    let src = "\
for i in frange(5, 1, -1):
    G01 Xi Y0
";
    assert_eq!(comp(src).unwrap(), "\
G01 X5.000 Y0.000
G01 X4.000 Y0.000
G01 X3.000 Y0.000
G01 X2.000 Y0.000
");

    for bad in &["for i in frange(1, 5, 0):\n    G01 Xi",
                 "for i in frange(1, 5, -1):\n    G01 Xi"] {
        let err = comp(bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Loop);
        assert_eq!(err.lineno, 1);
    }
}

#[test]
fn test_nested_loops() {
    let src = "\
for i in frange(1, 3, 1):
    for j in frange(1, 3, 1):
        G01 Xi Yj
";
    assert_eq!(comp(src).unwrap(), "\
G01 X1.000 Y1.000
G01 X1.000 Y2.000
G01 X2.000 Y1.000
G01 X2.000 Y2.000
");
}

#[test]
fn test_variables_and_expressions() {
    let src = "\
r = 2
G01 X[r*cos(60)] Y[r*sin(60)]
";
    assert_eq!(comp(src).unwrap(), "G01 X1.000 Y1.732\n");

    // chained assignment
    assert_eq!(comp("a = b = 2\nG01 Xa Yb").unwrap(), "G01 X2.000 Y2.000\n");
}

#[test]
fn test_illegal_parameter() {
    let err = comp("G01 Q5 X1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains('Q'));
}

#[test]
fn test_line_numbers_skip_comments() {
    let src = "\
; prepared by hand
; do not edit
G21
G90
G01 X1
G01 X2
G01 Q9
";
    // the error is on the 5th surviving line, not the 7th raw one
    assert_eq!(comp(src).unwrap_err().lineno, 5);
}

#[test]
fn test_spindle() {
    assert_eq!(comp("M03 S2000").unwrap(), "M03 S2000\n");
    assert_eq!(comp("speed = 1500\nM03 Sspeed").unwrap(), "M03 S1500\n");

    let err = comp("M03 S2000.5").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn test_dwell() {
    assert_eq!(comp("G04 P1").unwrap(), "G04 P1\n");
    // negative P is milliseconds
    assert_eq!(comp("G04 P-500").unwrap(), "G04 P0.5\n");
}

#[test]
fn test_console_print() {
    let mut prints = vec![];
    let out = compile("console_print(42)\nconsole_print(\"tool change\")\nG21",
                      &Options::default(),
                      |msg| prints.push(msg.to_string())).unwrap();
    // printed output never lands in the compiled G-code
    assert_eq!(out, "G21\n");
    assert_eq!(prints, vec!["42", "tool change"]);

    let err = comp("console_print(frange(1, 2, 1))").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn test_translate_phase() {
    let err = comp("G01 X").unwrap_err();
    assert_eq!(err.phase, Phase::Translate);
    assert_eq!(err.kind(), ErrorKind::Translation);
}

#[test]
fn test_invalid() {
    for snippet in &[
        "G01 X",                        // word without a value
        "G01",                          // parameterized command without words
        "X1 X2",                        // repeated cycle axis
        "G16 X1",                       // polar origin needs X and Y
        "G81.1 Z-5 R2 F100 X0 Y0 D1",   // D without A
        "M03 S2000 X1",                 // M03 takes S only
        "G04 X1",                       // dwell takes P only
        "x ==",                         // not a statement
        "G99 X1",                       // no such command
        "q = nope",                     // undefined name
        "for i in 5:\n    G01 Xi",      // loops need a range
        "G01 X[1/0]",                   // division by zero
        "G21\n    G01 X1",              // indent without a loop
        "for i in frange(1, 2, 1):",    // loop without a body
    ] {
        assert!(comp(snippet).is_err(), "should fail: {:?}", snippet);
    }
}

#[test]
fn test_loop_body_statements() {
    let src = "\
for i in frange(1, 3, 1):
    G91 G21
    depth = i*2
    G01 Z[0-depth]
";
    assert_eq!(comp(src).unwrap(), "\
G91 G21
G01 Z-2.000
G91 G21
G01 Z-4.000
");
}
