use rten_tensor::prelude::*;
use rten_tensor::Tensor;

use crate::lod::LodTensor;
use crate::op_registry::ReadOp;
use crate::operator::{grad_var_name, require, Attrs, OpError, Operator, VarMap};

/// Compute the sum of absolute values of `input`, as a tensor of shape `[1]`.
pub fn l1_norm(input: &Tensor<f32>) -> Tensor<f32> {
    let norm: f32 = input.iter().map(|x| x.abs()).sum();
    Tensor::from_data(&[1], vec![norm])
}

/// Compute the gradient of [`l1_norm`] with respect to its input.
///
/// The gradient at zero is taken to be zero.
pub fn l1_norm_grad(input: &Tensor<f32>, out_grad: &Tensor<f32>) -> Result<Tensor<f32>, OpError> {
    let out_grad = out_grad.to_slice();
    let &[dy] = &out_grad[..] else {
        return Err(OpError::IncompatibleInputShapes(
            "output gradient must have one element",
        ));
    };
    Ok(input.map(|&x| {
        if x > 0. {
            dy
        } else if x < 0. {
            -dy
        } else {
            0.
        }
    }))
}

/// Computes the L1 norm of input `X` as output `Out`.
#[derive(Debug)]
pub struct L1Norm {}

impl Operator for L1Norm {
    fn name(&self) -> &str {
        "l1_norm"
    }

    fn input_names(&self) -> &[&'static str] {
        &["X"]
    }

    fn output_names(&self) -> &[&'static str] {
        &["Out"]
    }

    fn run(&self, inputs: &VarMap) -> Result<VarMap, OpError> {
        let x = require(inputs, "X")?;
        let mut outputs = VarMap::default();
        outputs.insert("Out".to_string(), l1_norm(x.tensor()).into());
        Ok(outputs)
    }

    fn run_grad(&self, inputs: &VarMap, out_grads: &VarMap) -> Result<VarMap, OpError> {
        let x = require(inputs, "X")?;
        let out_grad = require(out_grads, &grad_var_name("Out"))?;
        let grad = l1_norm_grad(x.tensor(), out_grad.tensor())?;

        let mut grads = VarMap::default();
        grads.insert(
            grad_var_name("X"),
            LodTensor::new(grad, x.lod().cloned())?,
        );
        Ok(grads)
    }
}

impl ReadOp for L1Norm {
    fn op_type() -> &'static str {
        "l1_norm"
    }

    fn read(_attrs: &Attrs) -> Result<Self, OpError> {
        Ok(L1Norm {})
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use rten_tensor::test_util::expect_equal;
    use rten_tensor::Tensor;

    use super::{l1_norm, l1_norm_grad};
    use crate::op_test::{GradCheckOptions, OpTest};
    use crate::operator::OpError;

    #[test]
    fn test_l1_norm() -> Result<(), Box<dyn Error>> {
        let input = Tensor::from_data(&[2, 2], vec![1., -2., 0., 3.5]);
        let expected = Tensor::from_data(&[1], vec![6.5]);
        expect_equal(&l1_norm(&input), &expected)?;
        Ok(())
    }

    #[test]
    fn test_l1_norm_grad() -> Result<(), Box<dyn Error>> {
        let input = Tensor::from_data(&[2, 2], vec![1., -2., 0., 3.5]);
        let out_grad = Tensor::from_data(&[1], vec![0.5]);

        let grad = l1_norm_grad(&input, &out_grad)?;

        let expected = Tensor::from_data(&[2, 2], vec![0.5, -0.5, 0., 0.5]);
        expect_equal(&grad, &expected)?;
        Ok(())
    }

    #[test]
    fn test_l1_norm_grad_invalid() {
        let input = Tensor::from_data(&[2], vec![1., 2.]);
        let out_grad = Tensor::from_data(&[2], vec![1., 1.]);
        assert_eq!(
            l1_norm_grad(&input, &out_grad).err(),
            Some(OpError::IncompatibleInputShapes(
                "output gradient must have one element"
            ))
        );
    }

    #[test]
    fn test_l1_norm_op() -> Result<(), Box<dyn Error>> {
        // Values are kept away from zero, where the gradient is discontinuous.
        let input = Tensor::from_data(&[2, 3], vec![1.5f32, -2., 0.5, -0.25, 3., -0.75]);
        let test = OpTest::new("l1_norm")
            .input("X", input)
            .expected_output("Out", Tensor::from_data(&[1], vec![8.]));

        test.check_output()?;
        test.check_grad(&["X"], "Out", &GradCheckOptions::default())?;
        Ok(())
    }
}
