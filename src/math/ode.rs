/// Workspace for allocation-free RK4 steps
pub struct Rk4Workspace {
    pub k1: Vec<f64>,
    pub k2: Vec<f64>,
    pub k3: Vec<f64>,
    pub k4: Vec<f64>,
    pub ytmp: Vec<f64>,
}

impl Rk4Workspace {
    pub fn new(n: usize) -> Self {
        Self {
            k1: vec![0.0; n],
            k2: vec![0.0; n],
            k3: vec![0.0; n],
            k4: vec![0.0; n],
            ytmp: vec![0.0; n],
        }
    }

    pub fn resize(&mut self, n: usize) {
        if self.k1.len() != n {
            self.k1.resize(n, 0.0);
            self.k2.resize(n, 0.0);
            self.k3.resize(n, 0.0);
            self.k4.resize(n, 0.0);
            self.ytmp.resize(n, 0.0);
        }
    }
}

/// Fixed-step classic RK4 using a preallocated workspace.
/// State and derivative are plain slices; `f(t, y, dy)` fills `dy`.
pub fn rk4_step_ws<F>(y: &mut [f64], t: f64, dt: f64, ws: &mut Rk4Workspace, mut f: F)
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let n = y.len();
    ws.resize(n);

    let (k1, k2, k3, k4, ytmp) = (&mut ws.k1, &mut ws.k2, &mut ws.k3, &mut ws.k4, &mut ws.ytmp);

    f(t, y, k1);

    for i in 0..n {
        ytmp[i] = y[i] + 0.5 * dt * k1[i];
    }
    f(t + 0.5 * dt, ytmp, k2);

    for i in 0..n {
        ytmp[i] = y[i] + 0.5 * dt * k2[i];
    }
    f(t + 0.5 * dt, ytmp, k3);

    for i in 0..n {
        ytmp[i] = y[i] + dt * k3[i];
    }
    f(t + dt, ytmp, k4);

    for i in 0..n {
        y[i] += (dt / 6.0) * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
}

// Dormand-Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th order weights (also the last row of A, FSAL).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Difference between 5th and embedded 4th order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

/// Workspace for allocation-free Dormand-Prince steps.
///
/// After [`dopri5_step_ws`] returns, `y_new` holds the 5th order solution and
/// `err` the local error estimate (difference to the embedded 4th order one).
pub struct Dopri5Workspace {
    pub k: [Vec<f64>; 7],
    pub ytmp: Vec<f64>,
    pub y_new: Vec<f64>,
    pub err: Vec<f64>,
}

impl Dopri5Workspace {
    pub fn new(n: usize) -> Self {
        Self {
            k: std::array::from_fn(|_| vec![0.0; n]),
            ytmp: vec![0.0; n],
            y_new: vec![0.0; n],
            err: vec![0.0; n],
        }
    }

    pub fn resize(&mut self, n: usize) {
        if self.ytmp.len() != n {
            for k in self.k.iter_mut() {
                k.resize(n, 0.0);
            }
            self.ytmp.resize(n, 0.0);
            self.y_new.resize(n, 0.0);
            self.err.resize(n, 0.0);
        }
    }
}

/// One trial Dormand-Prince step of size `h` from `(t, y)`.
///
/// `y` is left untouched so a rejected step can simply be retried with a
/// smaller `h`. Seven right-hand-side evaluations per call.
pub fn dopri5_step_ws<F>(y: &[f64], t: f64, h: f64, ws: &mut Dopri5Workspace, mut f: F)
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let n = y.len();
    ws.resize(n);

    let [k1, k2, k3, k4, k5, k6, k7] = &mut ws.k;
    let ytmp = &mut ws.ytmp;

    f(t, y, k1);

    for i in 0..n {
        ytmp[i] = y[i] + h * (A21 * k1[i]);
    }
    f(t + C2 * h, ytmp, k2);

    for i in 0..n {
        ytmp[i] = y[i] + h * (A31 * k1[i] + A32 * k2[i]);
    }
    f(t + C3 * h, ytmp, k3);

    for i in 0..n {
        ytmp[i] = y[i] + h * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
    }
    f(t + C4 * h, ytmp, k4);

    for i in 0..n {
        ytmp[i] = y[i] + h * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
    }
    f(t + C5 * h, ytmp, k5);

    for i in 0..n {
        ytmp[i] = y[i] + h * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
    }
    f(t + h, ytmp, k6);

    for i in 0..n {
        ws.y_new[i] = y[i] + h * (B1 * k1[i] + B3 * k3[i] + B4 * k4[i] + B5 * k5[i] + B6 * k6[i]);
    }
    f(t + h, &ws.y_new, k7);

    for i in 0..n {
        ws.err[i] = h * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
    }
}

/// Scaled RMS norm of a local error estimate. A value <= 1 means the step is
/// within tolerance.
pub fn error_norm(y: &[f64], y_new: &[f64], err: &[f64], rtol: f64, atol: f64) -> f64 {
    let n = y.len();
    if n == 0 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let scale = atol + rtol * y[i].abs().max(y_new[i].abs());
        let e = err[i] / scale;
        sum += e * e;
    }
    (sum / n as f64).sqrt()
}
