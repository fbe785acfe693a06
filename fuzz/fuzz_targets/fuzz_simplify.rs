#![no_main]

use libfuzzer_sys::fuzz_target;
use raster_ir::{Expr, Type};
use raster_opt::simplify;

/// Decodes fuzz bytes into a scalar i32 expression with a stack machine.
/// Unknown opcodes push leaves, so every byte string decodes to something.
fn decode(data: &[u8]) -> Option<Expr> {
    let mut stack: Vec<Expr> = Vec::new();
    let vars = ["x", "y", "z"];
    let mut let_counter = 0u32;
    let mut bytes = data.iter();
    while let Some(&op) = bytes.next() {
        match op % 12 {
            0 => stack.push(Expr::int(i64::from(*bytes.next()?) - 128)),
            1 => stack.push(Expr::var(Type::I32, vars[op as usize % vars.len()])),
            2 => {
                let (b, a) = (stack.pop()?, stack.pop()?);
                stack.push(a + b);
            }
            3 => {
                let (b, a) = (stack.pop()?, stack.pop()?);
                stack.push(a - b);
            }
            4 => {
                let (b, a) = (stack.pop()?, stack.pop()?);
                stack.push(a * b);
            }
            5 => {
                let (b, a) = (stack.pop()?, stack.pop()?);
                stack.push(a / b);
            }
            6 => {
                let (b, a) = (stack.pop()?, stack.pop()?);
                stack.push(a % b);
            }
            7 => {
                let (b, a) = (stack.pop()?, stack.pop()?);
                stack.push(raster_ir::min(a, b));
            }
            8 => {
                let (b, a) = (stack.pop()?, stack.pop()?);
                stack.push(raster_ir::max(a, b));
            }
            9 => {
                let (b, a) = (stack.pop()?, stack.pop()?);
                let (c, d) = (stack.pop()?, stack.pop()?);
                stack.push(raster_ir::select(raster_ir::lt(a, b), c, d));
            }
            10 => {
                let (value, rest) = (stack.pop()?, stack.pop()?);
                let name = format!("t{let_counter}");
                let_counter += 1;
                let body = rest + Expr::var(Type::I32, &name);
                stack.push(Expr::let_in(name, value, body));
            }
            _ => stack.push(Expr::int(1)),
        }
        if stack.len() > 64 {
            return None;
        }
    }
    stack.pop()
}

fuzz_target!(|data: &[u8]| {
    if data.len() > 512 {
        return;
    }
    let Some(e) = decode(data) else { return };
    // Simplification must never panic and must settle after one pass.
    let once = simplify(&e, true);
    let twice = simplify(&once, true);
    let _ = simplify(&twice, true);
});
