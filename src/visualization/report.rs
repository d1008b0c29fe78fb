use crate::analysis::{success_rate, BenchmarkResult};
use crate::pipeline::AlignmentResult;

pub fn print_results(result: &AlignmentResult) {
    println!("=== Alignment Result ===");
    println!("State: {}", result.state);
    println!("Iterations: {}", result.iterations);
    if let Some(coarse) = result.coarse_rotation_degrees {
        println!("Coarse rotation: {:.4}°", coarse);
    }
    println!("Rotation: {:.6}°", result.transform.rotation_degrees());
    println!("Translation: ({:.6}, {:.6})", result.transform.tx, result.transform.ty);
    println!("Final pairs: {}", result.final_pair_count);
    match result.final_rms {
        Some(rms) => println!("Final RMS: {:.6}", rms),
        None => println!("Final RMS: n/a"),
    }
    println!("Processing Time: {:.2}ms", result.execution_time_ms);
    println!();
}

pub fn print_comparison_table(results: &[BenchmarkResult]) {
    println!("| Case | State | Iterations | Rot. err (°) | Trans. err | RMS | Time (ms) |");
    println!("|------|-------|------------|--------------|------------|-----|-----------|");

    for r in results {
        let rms = r
            .residual_rms
            .map(|v| format!("{:.4}", v))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "| {} | {} | {} | {:.5} | {:.5} | {} | {:.2} |",
            r.name, r.state, r.iterations, r.rotation_error_deg, r.translation_error, rms, r.execution_time_ms
        );
    }

    println!();
    println!("Success rate: {:.1}%", success_rate(results) * 100.0);
}
