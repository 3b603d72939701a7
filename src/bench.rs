use test::Bencher;

use super::{evaluate, AngleMode};

const SEXPR: &str = "4 ^ (88 × 9 ÷ (59 − 3))";
const MEXPR: &str = "((((87))) − 73) + (97 + (((15 ÷ 55 × ((31)) + 35))) + (15 − (9)) − (39 ÷ 26) ÷ 20 ÷ 91 + 27 ÷ (33 × 26 + 28 − (7) ÷ 10 + 66 × 6) + 60 ÷ 35 − ((29) − (69) ÷ 44 ÷ (92)) ÷ (89) + 2 + 87 ÷ 47 × ((2)) × 83 ÷ 98 × 42 ÷ (((67)) × ((97))) ÷ (34 ÷ 89 + 77) − 29 + 70 × (20)) + ((((((92))) + 23 × (98) ÷ (95) + (((99) × (41))) + (5 + 41) + 10) − (36) ÷ (6 + 80 × 52 + (90))))";
const TRIG: &str = "sin cos tan 30 + 2(3 + 4)log 100 − √(2π";

#[bench]
fn small_expr(bench: &mut Bencher) {
    bench.iter(|| evaluate(SEXPR, AngleMode::Radians, None));
}

#[bench]
fn medium_expr(bench: &mut Bencher) {
    bench.iter(|| evaluate(MEXPR, AngleMode::Radians, None));
}

#[bench]
fn nested_functions(bench: &mut Bencher) {
    bench.iter(|| evaluate(TRIG, AngleMode::Degrees, None));
}
