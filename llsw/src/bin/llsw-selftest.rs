//! Host self-test: runs dispatch scenarios end to end through the reference
//! kernels and prints PASS/FAIL per case.
//!
//! Usage:
//!   llsw-selftest [--filter <substr>] [--json <path>]

use std::path::PathBuf;
use std::process;

use llsw::ir::*;
use llsw::kernels::Reference;
use llsw::Result;
use serde::Serialize;

// ============================================================================
// Test infrastructure
// ============================================================================

const EPS: f32 = 1e-4;

fn approx_eq(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= EPS)
}

fn run<'a>(params: impl Into<NodeParams<'a>>) -> Result<()> {
    llsw::forward(&mut params.into(), &mut Reference)
}

const ONE: Dim = Dim::new(1, 1, 1, 1);

// ============================================================================
// Test cases
// ============================================================================

fn conv_sum_of_products() -> Result<bool> {
    let x: [f32; 9] = core::array::from_fn(|i| i as f32 + 1.0);
    let w = [0.5f32, -1.0, 2.0, 0.0, 1.0, 0.25, -0.5, 1.5, 1.0];
    let expected: f32 = x.iter().zip(&w).map(|(a, b)| a * b).sum();
    let mut y = [0.0f32];
    let spatial = Dim::nhwc(1, 3, 3, 1);
    run(ConvParams {
        general: General::new(NodeType::Conv, Tensor::f32(spatial, &x), TensorMut::f32(ONE, &mut y)),
        weights: Tensor::f32(spatial, &w),
        bias: Tensor::null(),
        pads: [0; 4],
        strides: [1, 1],
        dilations: [1, 1],
        ngroup: 1,
    })?;
    Ok(approx_eq(&y, &[expected]))
}

fn quantize_linear_u8() -> Result<bool> {
    let x = [0.0f32, 1.0, 2.0];
    let (scale, zero_point) = ([1.0f32], [0u8]);
    let mut y = [0u8; 3];
    let dim = Dim::nhwc(1, 1, 1, 3);
    run(QuantizeParams {
        general: General::new(NodeType::QuantizeLinear, Tensor::f32(dim, &x), TensorMut::u8(dim, &mut y)),
        quant: Quant::new(Tensor::f32(ONE, &scale), Tensor::u8(ONE, &zero_point)),
    })?;
    Ok(y == [0, 1, 2])
}

fn concat_channels() -> Result<bool> {
    let (a, b) = ([1.0f32, 2.0], [3.0f32, 4.0]);
    let mut y = [0.0f32; 4];
    let half = Dim::new(1, 1, 2, 1);
    run(ConcatParams {
        general: General::new(
            NodeType::Concat,
            Tensor::f32(half, &a),
            TensorMut::f32(Dim::new(1, 1, 4, 1), &mut y),
        ),
        input2: Tensor::f32(half, &b),
        input3: Tensor::null(),
        input4: Tensor::null(),
        num_of_inputs: 2,
        axis: 1,
    })?;
    Ok(approx_eq(&y, &[1.0, 2.0, 3.0, 4.0]))
}

fn sum_four_operands() -> Result<bool> {
    let ops = [[1.0f32, -1.0], [2.0, 0.5], [3.0, 0.25], [4.0, 0.125]];
    let mut y = [0.0f32; 2];
    let dim = Dim::nhwc(1, 1, 1, 2);
    run(ArithParams {
        general: General::new(NodeType::ArithSum, Tensor::f32(dim, &ops[0]), TensorMut::f32(dim, &mut y)),
        input2: Tensor::f32(dim, &ops[1]),
        input3: Tensor::f32(dim, &ops[2]),
        input4: Tensor::f32(dim, &ops[3]),
        num_of_inputs: 4,
    })?;
    Ok(approx_eq(&y, &[10.0, -0.125]))
}

fn reduce_sum_of_zeros() -> Result<bool> {
    let x = [0.0f32; 3];
    let mut y = [7.0f32];
    run(ReduceParams {
        general: General::new(
            NodeType::ReduceSum,
            Tensor::f32(Dim::nhwc(1, 1, 1, 3), &x),
            TensorMut::f32(ONE, &mut y),
        ),
        axis: 1,
    })?;
    Ok(y == [0.0])
}

fn reduce_min_single_entry_axis() -> Result<bool> {
    let x = [3.5f32, -2.0];
    let mut y = [0.0f32; 2];
    let dim = Dim::nhwc(1, 1, 2, 1);
    run(ReduceParams {
        general: General::new(NodeType::ReduceMin, Tensor::f32(dim, &x), TensorMut::f32(dim, &mut y)),
        axis: 1,
    })?;
    Ok(y == x)
}

fn batch_norm_identity() -> Result<bool> {
    let x = [-3.0f32, 0.5, 8.0];
    let (ones, zeros) = ([1.0f32; 3], [0.0f32; 3]);
    let var = [1.0f32 - 1e-5; 3];
    let mut y = [0.0f32; 3];
    let dim = Dim::nhwc(1, 1, 1, 3);
    run(BatchNormParams {
        general: General::new(NodeType::BatchNorm, Tensor::f32(dim, &x), TensorMut::f32(dim, &mut y)),
        scale: Tensor::f32(dim, &ones),
        bias: Tensor::f32(dim, &zeros),
        mean: Tensor::f32(dim, &zeros),
        var: Tensor::f32(dim, &var),
    })?;
    Ok(approx_eq(&y, &x))
}

fn dequantize_requantize() -> Result<bool> {
    let x = [130u8, 126];
    let (in_scale, in_zp) = ([0.5f32], [128u8]);
    let (out_scale, out_zp) = ([0.25f32], [-10i8]);
    let dim = Dim::nhwc(1, 1, 1, 2);
    let in_quant = Quant::new(Tensor::f32(ONE, &in_scale), Tensor::u8(ONE, &in_zp));

    let mut real = [0.0f32; 2];
    run(DequantizeParams {
        general: General::new(NodeType::DequantizeLinear, Tensor::u8(dim, &x), TensorMut::f32(dim, &mut real)),
        quant: in_quant,
    })?;

    let mut requant = [0i8; 2];
    run(RequantizeParams {
        general: General::new(NodeType::RequantizeLinear, Tensor::u8(dim, &x), TensorMut::i8(dim, &mut requant)),
        input_quant: in_quant,
        output_quant: Quant::new(Tensor::f32(ONE, &out_scale), Tensor::i8(ONE, &out_zp)),
    })?;
    Ok(approx_eq(&real, &[1.0, -1.0]) && requant == [-6, -14])
}

fn invalid_axis_rejected() -> Result<bool> {
    let x = [1.0f32];
    let mut y = [0.0f32];
    let res = run(SoftmaxParams {
        general: General::new(NodeType::Softmax, Tensor::f32(ONE, &x), TensorMut::f32(ONE, &mut y)),
        axis: 4,
    });
    Ok(res == Err(llsw::Error::InvalidAxis(4)))
}

// ============================================================================
// Test runner
// ============================================================================

type TestFn = fn() -> Result<bool>;

const TESTS: &[(&str, TestFn)] = &[
    ("conv_sum_of_products", conv_sum_of_products),
    ("quantize_linear_u8", quantize_linear_u8),
    ("concat_channels", concat_channels),
    ("sum_four_operands", sum_four_operands),
    ("reduce_sum_of_zeros", reduce_sum_of_zeros),
    ("reduce_min_single_entry_axis", reduce_min_single_entry_axis),
    ("batch_norm_identity", batch_norm_identity),
    ("dequantize_requantize", dequantize_requantize),
    ("invalid_axis_rejected", invalid_axis_rejected),
];

#[derive(Debug, Serialize)]
struct CaseResult {
    name: &'static str,
    passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct Report {
    passed: usize,
    failed: usize,
    tests: Vec<CaseResult>,
}

fn run_tests(filter: Option<&str>) -> Report {
    let mut tests = Vec::new();
    for &(name, test_fn) in TESTS {
        if filter.is_some_and(|f| !name.contains(f)) {
            continue;
        }
        let (passed, error) = match test_fn() {
            Ok(ok) => (ok, None),
            Err(e) => (false, Some(e.to_string())),
        };
        match &error {
            Some(e) => println!("  FAIL  {name}: {e}"),
            None if passed => println!("  PASS  {name}"),
            None => println!("  FAIL  {name}"),
        }
        tests.push(CaseResult {
            name,
            passed,
            error,
        });
    }
    let passed = tests.iter().filter(|t| t.passed).count();
    Report {
        passed,
        failed: tests.len() - passed,
        tests,
    }
}

// ============================================================================
// Entry point
// ============================================================================

fn print_usage() {
    eprintln!("llsw-selftest: dispatch scenarios against the reference kernels");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  llsw-selftest [--filter <substr>] [--json <path>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --filter <SUBSTR>  Only run cases whose name contains SUBSTR");
    eprintln!("  --json <PATH>      Write a JSON report to PATH");
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut filter: Option<String> = None;
    let mut json: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--filter" => {
                i += 1;
                filter = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("error: --filter needs a value");
                    process::exit(1);
                }));
            }
            "--json" => {
                i += 1;
                json = Some(PathBuf::from(args.get(i).unwrap_or_else(|| {
                    eprintln!("error: --json needs a path");
                    process::exit(1);
                })));
            }
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!();
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    println!("llsw dispatch self-test");
    println!("=======================");
    println!();

    let report = run_tests(filter.as_deref());

    println!();
    println!("Results: {} passed, {} failed", report.passed, report.failed);

    if let Some(path) = json {
        let written = serde_json::to_string_pretty(&report)
            .map_err(|e| e.to_string())
            .and_then(|s| std::fs::write(&path, s).map_err(|e| e.to_string()));
        match written {
            Ok(()) => println!("Wrote {}", path.display()),
            Err(e) => {
                eprintln!("error: failed to write {}: {e}", path.display());
                process::exit(1);
            }
        }
    }

    if report.failed > 0 {
        process::exit(1);
    }
}
