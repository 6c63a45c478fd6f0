//! 3x3 matrix helpers.

use crate::types::{sk_matrix_t, sk_point_t};

fn to_rows(m: &sk_matrix_t) -> [[f32; 3]; 3] {
    [
        [m.scale_x, m.skew_x, m.trans_x],
        [m.skew_y, m.scale_y, m.trans_y],
        [m.persp0, m.persp1, m.persp2],
    ]
}

fn from_rows(r: [[f32; 3]; 3]) -> sk_matrix_t {
    sk_matrix_t {
        scale_x: r[0][0],
        skew_x: r[0][1],
        trans_x: r[0][2],
        skew_y: r[1][0],
        scale_y: r[1][1],
        trans_y: r[1][2],
        persp0: r[2][0],
        persp1: r[2][1],
        persp2: r[2][2],
    }
}

/// `a * b`: applies `b` first, then `a`.
pub(crate) fn concat(a: &sk_matrix_t, b: &sk_matrix_t) -> sk_matrix_t {
    let (a, b) = (to_rows(a), to_rows(b));
    let mut out = [[0.0f32; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    from_rows(out)
}

pub(crate) fn translate(dx: f32, dy: f32) -> sk_matrix_t {
    sk_matrix_t {
        trans_x: dx,
        trans_y: dy,
        ..sk_matrix_t::IDENTITY
    }
}

pub(crate) fn scale(sx: f32, sy: f32) -> sk_matrix_t {
    sk_matrix_t {
        scale_x: sx,
        scale_y: sy,
        ..sk_matrix_t::IDENTITY
    }
}

fn invert(m: &sk_matrix_t) -> Option<sk_matrix_t> {
    let r = to_rows(m);
    let cof = |r0: usize, r1: usize, c0: usize, c1: usize| r[r0][c0] * r[r1][c1] - r[r0][c1] * r[r1][c0];
    let det = r[0][0] * cof(1, 2, 1, 2) - r[0][1] * cof(1, 2, 0, 2) + r[0][2] * cof(1, 2, 0, 1);
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let inv_det = 1.0 / det;
    let adj = [
        [cof(1, 2, 1, 2), -cof(0, 2, 1, 2), cof(0, 1, 1, 2)],
        [-cof(1, 2, 0, 2), cof(0, 2, 0, 2), -cof(0, 1, 0, 2)],
        [cof(1, 2, 0, 1), -cof(0, 2, 0, 1), cof(0, 1, 0, 1)],
    ];
    let mut out = [[0.0f32; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = adj[i][j] * inv_det;
        }
    }
    Some(from_rows(out))
}

#[no_mangle]
pub unsafe extern "C" fn sk_matrix_concat(result: *mut sk_matrix_t, first: *const sk_matrix_t, second: *const sk_matrix_t) {
    if result.is_null() || first.is_null() || second.is_null() {
        return;
    }
    *result = concat(&*first, &*second);
}

#[no_mangle]
pub unsafe extern "C" fn sk_matrix_try_invert(matrix: *const sk_matrix_t, result: *mut sk_matrix_t) -> bool {
    if matrix.is_null() {
        return false;
    }
    match invert(&*matrix) {
        Some(inverse) => {
            if !result.is_null() {
                *result = inverse;
            }
            true
        }
        None => false,
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_matrix_map_point(matrix: *const sk_matrix_t, x: f32, y: f32, result: *mut sk_point_t) {
    if matrix.is_null() || result.is_null() {
        return;
    }
    let m = &*matrix;
    let w = m.persp0 * x + m.persp1 * y + m.persp2;
    let w = if w == 0.0 { 1.0 } else { w };
    *result = sk_point_t {
        x: (m.scale_x * x + m.skew_x * y + m.trans_x) / w,
        y: (m.skew_y * x + m.scale_y * y + m.trans_y) / w,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_applies_second_first() {
        let m = concat(&translate(10.0, 0.0), &scale(2.0, 2.0));
        let mut p = sk_point_t::default();
        unsafe { sk_matrix_map_point(&m, 1.0, 1.0, &mut p) };
        assert_eq!(p, sk_point_t { x: 12.0, y: 2.0 });
    }

    #[test]
    fn test_invert_round_trips() {
        let m = concat(&translate(3.0, -4.0), &scale(2.0, 0.5));
        let inverse = invert(&m).unwrap();
        let identity = concat(&m, &inverse);
        assert!((identity.scale_x - 1.0).abs() < 1e-6);
        assert!((identity.scale_y - 1.0).abs() < 1e-6);
        assert!(identity.trans_x.abs() < 1e-6);
        assert!(identity.trans_y.abs() < 1e-6);
    }

    #[test]
    fn test_singular_matrix_has_no_inverse() {
        let m = scale(0.0, 1.0);
        assert!(!unsafe { sk_matrix_try_invert(&m, std::ptr::null_mut()) });
    }
}
