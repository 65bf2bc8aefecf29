//! Compile summaries for the terminal.

/// Elapsed compile time: milliseconds under a second, tenths of a second
/// under a minute, then minutes and zero-padded seconds.
pub fn elapsed(ms: u64) -> String {
    match ms {
        0..1_000 => format!("{ms}ms"),
        1_000..60_000 => format!("{}.{}s", ms / 1_000, ms % 1_000 / 100),
        _ => {
            let secs = ms / 1_000;
            format!("{}m {:02}s", secs / 60, secs % 60)
        }
    }
}

/// One-line outcome of a successful compile.
pub fn compile_summary(duration_ms: u64, warnings: usize) -> String {
    let took = elapsed(duration_ms);
    match warnings {
        0 => format!("Compiled in {took}"),
        1 => format!("Compiled in {took} with 1 warning"),
        n => format!("Compiled in {took} with {n} warnings"),
    }
}
