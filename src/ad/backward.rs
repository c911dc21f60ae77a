// src/ad/backward.rs

use crate::ad::graph::{ADNode, BinaryOp, Tape, UnaryOp};
use std::collections::HashMap;

/// Reverse sweep from `output_node_id`. The result maps every node that the
/// output depends on to d(output)/d(node).
pub fn backward(tape: &Tape, output_node_id: usize) -> HashMap<usize, f64> {
    let nodes = tape.nodes.borrow();
    let mut grads: HashMap<usize, f64> = HashMap::new();

    grads.insert(output_node_id, 1.0);

    for node_id in (0..=output_node_id).rev() {
        let g = match grads.get(&node_id) {
            Some(g) => *g,
            None => continue,
        };

        match &nodes[node_id] {
            ADNode::Input { .. } | ADNode::Constant { .. } => {}

            ADNode::Unary { op, arg, value } => {
                let input_val = nodes[*arg].value();
                let grad_arg = compute_unary_grad(*op, input_val, *value, g);
                add_grad(&mut grads, *arg, grad_arg);
            }
            ADNode::Binary {
                op,
                lhs,
                rhs,
                value,
            } => {
                let lhs_val = nodes[*lhs].value();
                let rhs_val = nodes[*rhs].value();
                let (grad_lhs, grad_rhs) = compute_binary_grad(*op, lhs_val, rhs_val, *value, g);

                add_grad(&mut grads, *lhs, grad_lhs);
                add_grad(&mut grads, *rhs, grad_rhs);
            }
        }
    }

    grads
}

fn add_grad(grads: &mut HashMap<usize, f64>, id: usize, update: f64) {
    *grads.entry(id).or_insert(0.0) += update;
}

fn compute_unary_grad(op: UnaryOp, input_val: f64, output_val: f64, grad_output: f64) -> f64 {
    match op {
        UnaryOp::Neg => -grad_output,
        UnaryOp::Exp => output_val * grad_output,
        UnaryOp::Log => grad_output / input_val,
        UnaryOp::Sigmoid => output_val * (1.0 - output_val) * grad_output,
        UnaryOp::LGamma => {
            use statrs::function::gamma::digamma;
            digamma(input_val) * grad_output
        }
    }
}

fn compute_binary_grad(
    op: BinaryOp,
    lhs_val: f64,
    rhs_val: f64,
    output_val: f64,
    grad_output: f64,
) -> (f64, f64) {
    match op {
        BinaryOp::Add => (grad_output, grad_output),
        BinaryOp::Sub => (grad_output, -grad_output),
        BinaryOp::Mul => (rhs_val * grad_output, lhs_val * grad_output),
        BinaryOp::Div => (
            grad_output / rhs_val,
            -lhs_val * grad_output / (rhs_val * rhs_val),
        ),
        BinaryOp::BetaSample => {
            // Implicit reparameterization: dz/dθ = -(dF/dθ) / pdf(z), with the
            // CDF derivative taken by central differences.
            use statrs::function::beta::beta_reg;
            use statrs::function::gamma::ln_gamma;

            let alpha = lhs_val;
            let beta_param = rhs_val;
            let z = output_val;

            if z <= 0.0 || z >= 1.0 {
                return (0.0, 0.0);
            }

            let ln_b = ln_gamma(alpha) + ln_gamma(beta_param) - ln_gamma(alpha + beta_param);
            let ln_pdf = (alpha - 1.0) * z.ln() + (beta_param - 1.0) * (1.0 - z).ln() - ln_b;
            let pdf = ln_pdf.exp();

            let h = 1e-4;

            let d_cdf_d_alpha =
                (beta_reg(alpha + h, beta_param, z) - beta_reg(alpha - h, beta_param, z)) / (2.0 * h);
            let d_cdf_d_beta =
                (beta_reg(alpha, beta_param + h, z) - beta_reg(alpha, beta_param - h, z)) / (2.0 * h);

            let dz_da = -d_cdf_d_alpha / pdf;
            let dz_db = -d_cdf_d_beta / pdf;

            (dz_da * grad_output, dz_db * grad_output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ad::create_tape;
    use crate::ad::types::ADFloat;

    #[test]
    fn test_simple_gradient() {
        let tape_id = create_tape();
        let x = ADFloat::new_input(3.0, tape_id);
        let y = x * x;

        if let ADFloat::Dual { node_id, tape_id, .. } = y {
            let grads = crate::ad::with_tape(tape_id, |tape| backward(tape, node_id));
            let x_id = x.node_id().unwrap();
            assert_eq!(grads.get(&x_id).copied().unwrap_or(0.0), 6.0);
        } else {
            panic!("expected a dual number");
        }
    }

    #[test]
    fn test_lgamma_grad() {
        use statrs::function::gamma::digamma;
        let tape_id = create_tape();
        let x_val = 2.5;
        let x = ADFloat::new_input(x_val, tape_id);
        let y = x.lgamma();

        let grads = y.backward();
        let grad = grads.get(&x.node_id().unwrap()).copied().unwrap_or(0.0);
        assert!((grad - digamma(x_val)).abs() < 1e-6);
    }

    #[test]
    fn test_beta_sample_grad_matches_finite_difference() {
        use statrs::function::beta::beta_reg;

        fn invert_cdf(a: f64, b: f64, u: f64) -> f64 {
            let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
            for _ in 0..200 {
                let mid = 0.5 * (lo + hi);
                if beta_reg(a, b, mid) < u {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            0.5 * (lo + hi)
        }

        let (a, b, z) = (2.0, 3.0, 0.35);
        let tape_id = create_tape();
        let alpha = ADFloat::new_input(a, tape_id);
        let beta = ADFloat::new_input(b, tape_id);
        let sample = alpha.beta_sample(beta, z);
        let grads = sample.backward();
        let dz_da = grads[&alpha.node_id().unwrap()];

        // Holding u = F(z; a, b) fixed, nudge a and re-invert the CDF.
        let u = beta_reg(a, b, z);
        let h = 1e-5;
        let expected = (invert_cdf(a + h, b, u) - invert_cdf(a - h, b, u)) / (2.0 * h);

        assert!((dz_da - expected).abs() < 1e-3, "{dz_da} vs {expected}");
    }

    #[test]
    fn test_shared_subexpression_accumulates() {
        // f(x) = x * x + x * x, df/dx = 4x
        let tape_id = create_tape();
        let x = ADFloat::new_input(1.5, tape_id);
        let sq = x * x;
        let f = sq + sq;
        let grads = f.backward();
        assert!((grads[&x.node_id().unwrap()] - 6.0).abs() < 1e-12);
    }
}
