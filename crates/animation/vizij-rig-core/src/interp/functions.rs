//! Interpolation helpers over raw curve slices:
//! - lerp_f32 / lerp_into (component-wise)
//! - quaternion NLERP with shortest-arc normalization
//! - quaternion SLERP (falls back to NLERP for nearly parallel inputs)
//! - additive quaternion composition

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Component-wise lerp of two equally sized slices into `out`.
#[inline]
pub fn lerp_into(a: &[f32], b: &[f32], t: f32, out: &mut [f32]) {
    for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
        *o = lerp_f32(*x, *y, t);
    }
}

#[inline]
pub fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Normalize (x, y, z, w); a zero quaternion becomes identity.
#[inline]
pub fn normalize4(q: [f32; 4]) -> [f32; 4] {
    let len2 = dot4(q, q);
    if len2 > 0.0 {
        let inv_len = len2.sqrt().recip();
        [q[0] * inv_len, q[1] * inv_len, q[2] * inv_len, q[3] * inv_len]
    } else {
        [0.0, 0.0, 0.0, 1.0]
    }
}

/// Quaternion NLERP with shortest-arc correction.
/// If dot < 0, negate the second quaternion to ensure the shortest path.
/// Returns a normalized quaternion (x,y,z,w).
#[inline]
pub fn nlerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    if dot4(a, b) < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
    }
    normalize4([
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ])
}

/// Spherical interpolation between unit quaternions (shortest arc).
pub fn slerp_quat(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    const DOT_THRESHOLD: f32 = 0.9995;

    let qa = normalize4(a);
    let mut qb = normalize4(b);
    let mut dot = dot4(qa, qb);
    if dot < 0.0 {
        qb = [-qb[0], -qb[1], -qb[2], -qb[3]];
        dot = -dot;
    }
    // Close inputs: sin(theta) ~ 0, use nlerp.
    if dot > DOT_THRESHOLD {
        return nlerp_quat(qa, qb, t);
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();
    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;
    normalize4([
        s0 * qa[0] + s1 * qb[0],
        s0 * qa[1] + s1 * qb[1],
        s0 * qa[2] + s1 * qb[2],
        s0 * qa[3] + s1 * qb[3],
    ])
}

/// Hamilton product `a * b` for (x, y, z, w).
#[inline]
pub fn mul_quat(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}

/// Apply `delta` scaled by `weight` on top of `base`: `base * nlerp(I, delta, w)`.
#[inline]
pub fn add_quat_weighted(base: [f32; 4], delta: [f32; 4], weight: f32) -> [f32; 4] {
    let scaled = nlerp_quat([0.0, 0.0, 0.0, 1.0], delta, weight);
    normalize4(mul_quat(base, scaled))
}
