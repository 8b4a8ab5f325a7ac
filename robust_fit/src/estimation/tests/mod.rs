mod config;
mod line_problem;
mod ransac;
mod selector;

use self::line_problem::{INTERCEPT, LineProblem, SLOPE, synthetic_line};
