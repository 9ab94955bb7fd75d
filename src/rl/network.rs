//! Q-network backed by tch-rs (PyTorch bindings).
//!
//! Provides the same [`FunctionApproximator`] contract as the candle MLP.
//! This module is only available with the `rl-nn` feature.

use std::collections::BTreeMap;

use tch::{nn, nn::Module, nn::OptimizerConfig, Device, Kind, Reduction, Tensor};

use super::approximator::{FunctionApproximator, ParamBlock, Weights};
use super::error::ApproximatorError;

/// MLP Q-network: `obs_dim → hidden… → action_dim` with ReLU activations
/// and a linear output head, optimised with Adam.
pub struct TorchApproximator {
    vs: nn::VarStore,
    net: nn::Sequential,
    opt: nn::Optimizer,
    input_dim: usize,
    output_dim: usize,
    device: Device,
}

impl TorchApproximator {
    /// Creates a new network on `device`.
    pub fn new(
        input_dim: usize,
        hidden: &[usize],
        output_dim: usize,
        learning_rate: f64,
        device: Device,
    ) -> Result<Self, ApproximatorError> {
        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let mut net = nn::seq();
        let mut width = input_dim as i64;
        for (i, &h) in hidden.iter().enumerate() {
            net = net
                .add(nn::linear(
                    &root / format!("l{}", i + 1),
                    width,
                    h as i64,
                    Default::default(),
                ))
                .add_fn(|x| x.relu());
            width = h as i64;
        }
        net = net.add(nn::linear(
            &root / format!("l{}", hidden.len() + 1),
            width,
            output_dim as i64,
            Default::default(),
        ));

        let opt = nn::Adam::default().build(&vs, learning_rate)?;

        Ok(Self {
            vs,
            net,
            opt,
            input_dim,
            output_dim,
            device,
        })
    }

    fn to_tensor(&self, rows: &[Vec<f64>], width: usize) -> Result<Tensor, ApproximatorError> {
        if rows.is_empty() || rows.iter().any(|r| r.len() != width) {
            return Err(ApproximatorError::InvalidBatch);
        }
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Ok(Tensor::from_slice(&flat)
            .reshape([rows.len() as i64, width as i64])
            .to_kind(Kind::Float)
            .to_device(self.device))
    }
}

impl FunctionApproximator for TorchApproximator {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn predict(&self, states: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ApproximatorError> {
        let input = self.to_tensor(states, self.input_dim)?;
        let output = tch::no_grad(|| self.net.forward(&input)).to_kind(Kind::Double);
        let flat = Vec::<f64>::try_from(output.flatten(0, -1))?;
        Ok(flat.chunks(self.output_dim).map(<[f64]>::to_vec).collect())
    }

    fn fit(&mut self, states: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<f64, ApproximatorError> {
        if targets.len() != states.len() {
            return Err(ApproximatorError::InvalidBatch);
        }
        let input = self.to_tensor(states, self.input_dim)?;
        let target = self.to_tensor(targets, self.output_dim)?;

        let loss = self.net.forward(&input).mse_loss(&target, Reduction::Mean);
        self.opt.backward_step(&loss);
        Ok(f64::try_from(&loss)?)
    }

    fn weights(&self) -> Result<Weights, ApproximatorError> {
        let mut params = BTreeMap::new();
        for (name, tensor) in self.vs.variables() {
            let shape = tensor.size().iter().map(|&d| d as usize).collect();
            let values = Vec::<f64>::try_from(tensor.to_kind(Kind::Double).flatten(0, -1))?;
            params.insert(name, ParamBlock { shape, values });
        }
        Ok(Weights { params })
    }

    fn set_weights(&mut self, weights: &Weights) -> Result<(), ApproximatorError> {
        let mut variables = self.vs.variables();
        for (name, var) in &variables {
            let block = weights
                .params
                .get(name)
                .ok_or_else(|| ApproximatorError::MissingParameter(name.clone()))?;
            let shape: Vec<usize> = var.size().iter().map(|&d| d as usize).collect();
            if block.shape != shape {
                return Err(ApproximatorError::ShapeMismatch(name.clone()));
            }
        }
        tch::no_grad(|| {
            for (name, var) in variables.iter_mut() {
                if let Some(block) = weights.params.get(name) {
                    let src = Tensor::from_slice(&block.values)
                        .reshape(var.size())
                        .to_kind(var.kind())
                        .to_device(self.device);
                    var.copy_(&src);
                }
            }
        });
        Ok(())
    }
}
