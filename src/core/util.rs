use std::f64::consts::PI;

/// Sample times `i / fs` for `n` samples.
pub fn time_axis(n: usize, fs: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 / fs).collect()
}

/// `amp * sin(2π f t)` over the given sample times.
pub fn sine(t: &[f64], f: f64, amp: f64) -> Vec<f64> {
    t.iter().map(|&ti| amp * (2.0 * PI * f * ti).sin()).collect()
}

/// Adds `amp * sin(2π f t)` into `out` in place.
pub fn add_sine(out: &mut [f64], t: &[f64], f: f64, amp: f64) {
    for (o, &ti) in out.iter_mut().zip(t) {
        *o += amp * (2.0 * PI * f * ti).sin();
    }
}

/// `num` evenly spaced values between start and stop (inclusive).
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Values `start, start + step, ...` strictly below `stop`.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || stop <= start {
        return Vec::new();
    }
    let n = ((stop - start) / step).ceil() as usize;
    (0..n).map(|i| start + step * i as f64).collect()
}
