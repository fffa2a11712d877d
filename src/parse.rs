// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

//! Parser for the intermediate code, using the Pest parser library.
//!
//! Each line is parsed on its own; leading whitespace encodes loop-body
//! nesting and is resolved here into a statement tree.

use std::iter::Peekable;
use std::vec::IntoIter;
use itertools::Itertools;
use pest_derive::Parser;
use pest::{Parser, iterators::Pair};

use crate::ast::*;
use crate::eval::{CompileError, ErrType};

#[derive(Parser)]
#[grammar = "ic.pest"]
pub struct IcParser;

struct FlatStmt {
    lineno: usize,
    indent: usize,
    kind: StmtKind,
}

/// Check whether a line is a single chained assignment to simple names
/// (`x = 42`, `x = y = 42`; tuple targets and comparisons don't qualify).
pub(crate) fn is_assignment(line: &str) -> bool {
    IcParser::parse(Rule::assign_line, line).is_ok()
}

/// Parse a whole intermediate program into a statement tree.
pub fn parse_program(ic: &str) -> Result<Vec<Stmt>, CompileError> {
    let mut flat = vec![];
    for (n, line) in ic.lines().enumerate() {
        let lineno = n + 1;
        let body = line.trim_start();
        let indent = line.len() - body.len();
        let kind = parse_stmt(body).map_err(|e| CompileError::evaluate(lineno, e))?;
        flat.push(FlatStmt { lineno, indent, kind });
    }
    build_body(&mut flat.into_iter().peekable(), 0)
}

fn parse_stmt(line: &str) -> Result<StmtKind, ErrType> {
    let mut pairs = IcParser::parse(Rule::stmt_line, line)
        .map_err(|e| ErrType::Syntax(e.variant.message().into_owned()))?;
    let stmt = pairs.next().expect("line").into_inner().next().expect("statement");
    Ok(match stmt.as_rule() {
        Rule::for_stmt => {
            let mut var = None;
            let mut iter = None;
            for pair in stmt.into_inner() {
                match pair.as_rule() {
                    Rule::name => var = Some(pair.as_str().into()),
                    Rule::expr => iter = Some(make_expr(pair)),
                    _ => ()
                }
            }
            StmtKind::For { var: var.expect("loop variable"),
                            iter: iter.expect("iterable"), body: vec![] }
        }
        Rule::assign_stmt => {
            let mut targets = vec![];
            let mut value = None;
            for pair in stmt.into_inner() {
                match pair.as_rule() {
                    Rule::name => targets.push(pair.as_str().into()),
                    Rule::expr => value = Some(make_expr(pair)),
                    _ => unreachable!()
                }
            }
            StmtKind::Assign { targets, value: value.expect("assigned value") }
        }
        Rule::call_stmt => StmtKind::Calls(stmt.into_inner().map(make_call).collect()),
        Rule::expr => StmtKind::Expr(make_expr(stmt)),
        _ => unreachable!()
    })
}

/// Group a run of equally indented statements, recursing for loop bodies.
fn build_body(it: &mut Peekable<IntoIter<FlatStmt>>, indent: usize)
              -> Result<Vec<Stmt>, CompileError> {
    let mut body = vec![];
    while let Some(next) = it.peek() {
        if next.indent < indent {
            break;
        }
        if next.indent > indent {
            return Err(CompileError::evaluate(next.lineno, ErrType::UnexpectedIndent));
        }
        let flat = it.next().expect("peeked");
        let kind = match flat.kind {
            StmtKind::For { var, iter, .. } => {
                let inner = match it.peek() {
                    Some(n) if n.indent > indent => n.indent,
                    _ => return Err(CompileError::evaluate(flat.lineno, ErrType::ExpectedBlock)),
                };
                StmtKind::For { var, iter, body: build_body(it, inner)? }
            }
            kind => kind,
        };
        body.push(Stmt { lineno: flat.lineno, kind });
    }
    Ok(body)
}

fn make_call(pair: Pair<Rule>) -> Call {
    let mut name = String::new();
    let mut args = vec![];
    for pair in pair.into_inner() {
        match pair.as_rule() {
            Rule::callee => name = pair.as_str().into(),
            Rule::kwarg => {
                let (key, value) = pair.into_inner().collect_tuple().expect("children");
                args.push(CallArg { key: Some(key.as_str().into()),
                                    value: make_expr(value) });
            }
            _ => args.push(CallArg { key: None, value: make_expr(pair) }),
        }
    }
    Call { name, args }
}

fn make_expr(pair: Pair<Rule>) -> Expr {
    match pair.as_rule() {
        Rule::expr => make_expr(pair.into_inner().next().expect("one child")),
        // left-associative binops
        Rule::expr_add | Rule::expr_mul => {
            let mut inner = pair.into_inner();
            let mut lhs = make_expr(inner.next().expect("operand"));
            while let Some(op) = inner.next() {
                let rhs = make_expr(inner.next().expect("operand"));
                lhs = Expr::BinOp(make_op(op.as_str()), Box::new(lhs), Box::new(rhs));
            }
            lhs
        }
        Rule::expr_un => {
            let mut ops = vec![];
            let mut operand = None;
            for pair in pair.into_inner() {
                match pair.as_rule() {
                    Rule::op_un => ops.push(if pair.as_str() == "-" { UnOp::Minus }
                                            else { UnOp::Plus }),
                    _ => operand = Some(make_expr(pair)),
                }
            }
            let mut expr = operand.expect("operand");
            for op in ops.into_iter().rev() {
                expr = Expr::UnOp(op, Box::new(expr));
            }
            expr
        }
        // right-associative
        Rule::expr_pow => {
            let mut inner = pair.into_inner();
            let base = make_expr(inner.next().expect("base"));
            match inner.next() {
                Some(_) => {
                    let exp = make_expr(inner.next().expect("exponent"));
                    Expr::BinOp(Op::Exp, Box::new(base), Box::new(exp))
                }
                None => base,
            }
        }
        Rule::expr_atom => {
            let inner = pair.into_inner().next().expect("one child");
            match inner.as_rule() {
                Rule::num => Expr::Num(inner.as_str().parse().expect("valid number")),
                Rule::string => {
                    let quoted = inner.as_str();
                    Expr::Str(quoted[1..quoted.len() - 1].into())
                }
                Rule::bool_lit => Expr::Bool(inner.as_str() == "True"),
                Rule::call => Expr::Call(Box::new(make_call(inner))),
                Rule::name => Expr::Name(inner.as_str().into()),
                Rule::expr => make_expr(inner),
                _ => unreachable!()
            }
        }
        _ => unreachable!()
    }
}

fn make_op(op: &str) -> Op {
    match op {
        "+" => Op::Add,
        "-" => Op::Sub,
        "*" => Op::Mul,
        "/" => Op::Div,
        _ => Op::Mod,
    }
}
