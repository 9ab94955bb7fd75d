//! Trainable function approximators for Q-values.
//!
//! The estimator only relies on the [`FunctionApproximator`] contract:
//! batched prediction, a single fitting step toward target vectors, and
//! weight export/import. [`MlpApproximator`] is the default candle backend;
//! the libtorch backend lives in [`super::network`] behind the `rl-nn` feature.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::loss::mse;
use candle_nn::{linear, Linear, Module, Optimizer, VarBuilder, VarMap, SGD};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::config::{ApproximatorKind, LearningConfig};
use super::error::ApproximatorError;

/// One named parameter tensor, stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamBlock {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

/// Backend-independent snapshot of every learnable parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub params: BTreeMap<String, ParamBlock>,
}

impl Weights {
    /// Total number of scalar parameters.
    pub fn parameter_count(&self) -> usize {
        self.params.values().map(|p| p.values.len()).sum()
    }
}

/// A trainable mapping from state vectors to per-action value vectors.
pub trait FunctionApproximator: Send {
    /// Width of each input state vector.
    fn input_dim(&self) -> usize;

    /// Width of each output vector (number of actions).
    fn output_dim(&self) -> usize;

    /// Predicts one output vector per input state.
    fn predict(&self, states: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ApproximatorError>;

    /// Performs a single optimisation step toward `targets` and returns the
    /// mean squared error before the step.
    fn fit(&mut self, states: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<f64, ApproximatorError>;

    /// Exports all learnable parameters.
    fn weights(&self) -> Result<Weights, ApproximatorError>;

    /// Replaces all learnable parameters. Shapes must match exactly.
    fn set_weights(&mut self, weights: &Weights) -> Result<(), ApproximatorError>;

    /// Writes the current weights as JSON.
    fn save(&self, path: &Path) -> Result<(), ApproximatorError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer(writer, &self.weights()?)?;
        Ok(())
    }

    /// Reads weights previously written by [`FunctionApproximator::save`].
    fn load(&mut self, path: &Path) -> Result<(), ApproximatorError> {
        let reader = BufReader::new(fs::File::open(path)?);
        let weights: Weights = serde_json::from_reader(reader)?;
        self.set_weights(&weights)
    }
}

impl<A: FunctionApproximator + ?Sized> FunctionApproximator for Box<A> {
    fn input_dim(&self) -> usize {
        (**self).input_dim()
    }

    fn output_dim(&self) -> usize {
        (**self).output_dim()
    }

    fn predict(&self, states: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ApproximatorError> {
        (**self).predict(states)
    }

    fn fit(&mut self, states: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<f64, ApproximatorError> {
        (**self).fit(states, targets)
    }

    fn weights(&self) -> Result<Weights, ApproximatorError> {
        (**self).weights()
    }

    fn set_weights(&mut self, weights: &Weights) -> Result<(), ApproximatorError> {
        (**self).set_weights(weights)
    }
}

/// Builds the approximator selected by the configuration.
///
/// `seed_offset` decorrelates the live and target networks' initial weights
/// when a fixed seed is configured; the target is overwritten on the first
/// sync anyway.
pub fn build_approximator(
    config: &LearningConfig,
    seed_offset: u64,
) -> Result<Box<dyn FunctionApproximator>, ApproximatorError> {
    match config.approximator {
        ApproximatorKind::Mlp => Ok(Box::new(MlpApproximator::new(
            config.input_dim(),
            &config.hidden_layers,
            config.output_dim(),
            config.learning_rate,
            config.seed.map(|s| s.wrapping_add(seed_offset)),
        )?)),
        #[cfg(feature = "rl-nn")]
        ApproximatorKind::Torch => Ok(Box::new(super::network::TorchApproximator::new(
            config.input_dim(),
            &config.hidden_layers,
            config.output_dim(),
            config.learning_rate,
            tch::Device::Cpu,
        )?)),
        #[cfg(not(feature = "rl-nn"))]
        ApproximatorKind::Torch => Err(ApproximatorError::Unavailable(
            "torch approximator requires the `rl-nn` feature".to_string(),
        )),
    }
}

/// Multi-layer perceptron on candle: ReLU hidden layers, a linear output,
/// trained by SGD on mean squared error.
pub struct MlpApproximator {
    varmap: VarMap,
    /// Every parameter by name, in a stable order.
    vars: BTreeMap<String, Var>,
    layers: Vec<Linear>,
    optimizer: SGD,
    input_dim: usize,
    output_dim: usize,
    device: Device,
}

impl MlpApproximator {
    /// Creates a network `input_dim → hidden… → output_dim` on the CPU.
    ///
    /// Weights are Xavier-uniform and biases zero, drawn from `seed` when
    /// given so that equal seeds build equal networks.
    pub fn new(
        input_dim: usize,
        hidden: &[usize],
        output_dim: usize,
        learning_rate: f64,
        seed: Option<u64>,
    ) -> Result<Self, ApproximatorError> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let mut widths = Vec::with_capacity(hidden.len() + 2);
        widths.push(input_dim);
        widths.extend_from_slice(hidden);
        widths.push(output_dim);
        let layers = widths
            .windows(2)
            .enumerate()
            .map(|(i, w)| linear(w[0], w[1], vb.pp(format!("l{}", i + 1))))
            .collect::<Result<Vec<_>, _>>()?;

        let vars: BTreeMap<String, Var> = varmap
            .data()
            .lock()
            .map_err(|_| ApproximatorError::Unavailable("parameter map poisoned".to_string()))?
            .iter()
            .map(|(name, var)| (name.clone(), var.clone()))
            .collect();

        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        for (name, var) in &vars {
            let dims = var.dims().to_vec();
            let count: usize = dims.iter().product();
            let values: Vec<f32> = if name.ends_with(".weight") {
                let limit = (6.0 / (dims[0] + dims[1]) as f64).sqrt();
                (0..count).map(|_| rng.gen_range(-limit..=limit) as f32).collect()
            } else {
                vec![0.0; count]
            };
            var.set(&Tensor::from_vec(values, dims, &device)?)?;
        }

        let optimizer = SGD::new(varmap.all_vars(), learning_rate)?;
        Ok(Self {
            varmap,
            vars,
            layers,
            optimizer,
            input_dim,
            output_dim,
            device,
        })
    }

    fn to_tensor(&self, rows: &[Vec<f64>], width: usize) -> Result<Tensor, ApproximatorError> {
        if rows.is_empty() || rows.iter().any(|r| r.len() != width) {
            return Err(ApproximatorError::InvalidBatch);
        }
        let flat: Vec<f32> = rows.iter().flatten().map(|&v| v as f32).collect();
        Ok(Tensor::from_vec(flat, (rows.len(), width), &self.device)?)
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor, ApproximatorError> {
        let last = self.layers.len() - 1;
        let mut y = input.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            y = layer.forward(&y)?;
            if i < last {
                y = y.relu()?;
            }
        }
        Ok(y)
    }

    /// Number of trainable tensors, two per layer.
    pub fn tensor_count(&self) -> usize {
        self.varmap.all_vars().len()
    }
}

impl FunctionApproximator for MlpApproximator {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn predict(&self, states: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ApproximatorError> {
        let input = self.to_tensor(states, self.input_dim)?;
        let output = self.forward(&input)?.to_vec2::<f32>()?;
        Ok(output
            .into_iter()
            .map(|row| row.into_iter().map(f64::from).collect())
            .collect())
    }

    fn fit(&mut self, states: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<f64, ApproximatorError> {
        if targets.len() != states.len() {
            return Err(ApproximatorError::InvalidBatch);
        }
        let input = self.to_tensor(states, self.input_dim)?;
        let target = self.to_tensor(targets, self.output_dim)?;

        let loss = mse(&self.forward(&input)?, &target)?;
        let value = loss.to_scalar::<f32>()?;
        self.optimizer.backward_step(&loss)?;
        Ok(f64::from(value))
    }

    fn weights(&self) -> Result<Weights, ApproximatorError> {
        let mut params = BTreeMap::new();
        for (name, var) in &self.vars {
            let values = var.flatten_all()?.to_vec1::<f32>()?;
            params.insert(
                name.clone(),
                ParamBlock {
                    shape: var.dims().to_vec(),
                    values: values.into_iter().map(f64::from).collect(),
                },
            );
        }
        Ok(Weights { params })
    }

    fn set_weights(&mut self, weights: &Weights) -> Result<(), ApproximatorError> {
        // Validate everything before touching any parameter.
        for (name, var) in &self.vars {
            let block = weights
                .params
                .get(name)
                .ok_or_else(|| ApproximatorError::MissingParameter(name.clone()))?;
            let expected: usize = var.dims().iter().product();
            if block.shape != var.dims() || block.values.len() != expected {
                return Err(ApproximatorError::ShapeMismatch(name.clone()));
            }
        }

        for (name, var) in &self.vars {
            if let Some(block) = weights.params.get(name) {
                let values: Vec<f32> = block.values.iter().map(|&v| v as f32).collect();
                var.set(&Tensor::from_vec(values, var.dims(), &self.device)?)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> MlpApproximator {
        MlpApproximator::new(3, &[8], 2, 0.05, Some(11)).unwrap()
    }

    #[test]
    fn predict_shape() {
        let net = small();
        let out = net.predict(&[vec![0.1, 0.2, 0.3], vec![1.0, 0.0, 0.5]]).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn ragged_batch_is_rejected() {
        let net = small();
        assert!(matches!(
            net.predict(&[vec![0.1, 0.2]]),
            Err(ApproximatorError::InvalidBatch)
        ));
        assert!(matches!(net.predict(&[]), Err(ApproximatorError::InvalidBatch)));
    }

    #[test]
    fn parameters_follow_the_layer_naming() {
        let net = small();
        assert_eq!(net.tensor_count(), 4);
        let weights = net.weights().unwrap();
        assert_eq!(weights.params["l1.weight"].shape, vec![8, 3]);
        assert_eq!(weights.params["l2.bias"].shape, vec![2]);
        assert!(weights.params["l2.bias"].values.iter().all(|&b| b == 0.0));
        assert_eq!(weights.parameter_count(), 3 * 8 + 8 + 8 * 2 + 2);
    }

    #[test]
    fn seeded_networks_are_identical() {
        assert_eq!(small().weights().unwrap(), small().weights().unwrap());
    }

    #[test]
    fn fit_reduces_loss() {
        let mut net = small();
        let states = vec![vec![0.5, 0.1, 0.9], vec![0.2, 0.8, 0.4]];
        let targets = vec![vec![1.0, -1.0], vec![-0.5, 2.0]];
        let first = net.fit(&states, &targets).unwrap();
        let mut last = first;
        for _ in 0..200 {
            last = net.fit(&states, &targets).unwrap();
        }
        assert!(last < first * 0.5, "loss {first} -> {last}");
    }

    #[test]
    fn fit_toward_own_prediction_is_a_fixed_point() {
        let mut net = small();
        let states = vec![vec![0.3, 0.3, 0.3]];
        let targets = net.predict(&states).unwrap();
        let before = net.weights().unwrap();
        let loss = net.fit(&states, &targets).unwrap();
        assert_eq!(loss, 0.0);
        assert_eq!(net.weights().unwrap(), before);
    }

    #[test]
    fn weights_round_trip_between_networks() {
        let source = small();
        let mut dest = MlpApproximator::new(3, &[8], 2, 0.05, Some(99)).unwrap();
        assert_ne!(source.weights().unwrap(), dest.weights().unwrap());
        dest.set_weights(&source.weights().unwrap()).unwrap();
        assert_eq!(source.weights().unwrap(), dest.weights().unwrap());
        let x = vec![vec![0.9, 0.1, 0.4]];
        assert_eq!(source.predict(&x).unwrap(), dest.predict(&x).unwrap());
    }

    #[test]
    fn mismatched_weights_are_rejected_untouched() {
        let mut net = small();
        let before = net.weights().unwrap();
        let other = MlpApproximator::new(3, &[4], 2, 0.05, Some(1))
            .unwrap()
            .weights()
            .unwrap();
        assert!(matches!(
            net.set_weights(&other),
            Err(ApproximatorError::ShapeMismatch(_))
        ));
        assert_eq!(net.weights().unwrap(), before);
    }

    #[test]
    fn save_and_load_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("weights.json");
        let source = small();
        source.save(&path).unwrap();

        let mut dest = MlpApproximator::new(3, &[8], 2, 0.05, Some(5)).unwrap();
        dest.load(&path).unwrap();
        assert_eq!(dest.weights().unwrap(), source.weights().unwrap());
    }

    #[test]
    fn boxed_approximator_delegates() {
        let cfg = LearningConfig {
            seed: Some(3),
            ..LearningConfig::default()
        };
        let net = build_approximator(&cfg, 0).unwrap();
        assert_eq!(net.input_dim(), cfg.input_dim());
        assert_eq!(net.output_dim(), cfg.output_dim());
    }
}
