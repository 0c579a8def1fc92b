pub fn mean(data: &[f32]) -> Option<f32> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f32>() / data.len() as f32)
}

pub fn std_dev(data: &[f32]) -> Option<f32> {
    let m = mean(data)?;
    let variance = data.iter().map(|v| (m - v) * (m - v)).sum::<f32>() / data.len() as f32;
    Some(variance.sqrt())
}
