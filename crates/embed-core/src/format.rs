//! Display helpers for scores and vectors.

/// Render a similarity score as a percentage, truncated (not rounded) to
/// `decimal_places`.
///
/// `0.98765` with two places renders as `98.76%`.
pub fn to_percentage_truncated(value: f32, decimal_places: u32) -> String {
    let scale = 10f32.powi(decimal_places as i32);
    let truncated = (value * (scale * 100.0)).trunc() / scale;
    format!("{}%", truncated)
}

/// Render a vector as `[ v0, v1, ... ]`.
pub fn format_vector(values: &[f32]) -> String {
    let body: Vec<String> = values.iter().map(|v| format!(" {}", v)).collect();
    format!("[{} ]", body.join(","))
}
