// Copyright (c) 2019 Georg Brandl.  Licensed under the Apache License,
// Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at
// your option. This file may not be copied, modified, or distributed except
// according to those terms.

use std::{env, fs};
use xgc::{compile, Options};

fn main() {
    let filename = env::args().nth(1).expect("file name required");
    let input = fs::read_to_string(&filename).unwrap();

    match compile(&input, &Options::default(), |msg| eprintln!("{}", msg)) {
        Err(e) => eprintln!("{}", e),
        Ok(gcode) => print!("{}", gcode),
    }
}
