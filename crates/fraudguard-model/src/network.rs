// Compact feed-forward binary classifier with single-sample Adam updates.
//
// Hidden layers use ReLU, the output is a single sigmoid unit trained on
// binary cross-entropy with an L2 weight penalty. Everything is plain f64
// so the weight artifact serializes cleanly.
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const INPUT_SIZE: usize = 10;
pub const LAYER_SIZES: [usize; 4] = [INPUT_SIZE, 32, 16, 1];

pub const LEARNING_RATE: f64 = 1e-3;
pub const L2_PENALTY: f64 = 1e-3;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

// keeps ln() finite at saturated outputs
const PROB_EPS: f64 = 1e-7;

/// One dense layer; `weights[out][in]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
}

/// First/second-moment estimates mirroring the network shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdamState {
    pub m_weights: Vec<Vec<Vec<f64>>>,
    pub v_weights: Vec<Vec<Vec<f64>>>,
    pub m_biases: Vec<Vec<f64>>,
    pub v_biases: Vec<Vec<f64>>,
    pub step: u64,
}

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl Network {
    /// Fresh network with Xavier-uniform weights.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let layers = LAYER_SIZES
            .windows(2)
            .map(|pair| {
                let (fan_in, fan_out) = (pair[0], pair[1]);
                let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
                let weights = (0..fan_out)
                    .map(|_| {
                        (0..fan_in)
                            .map(|_| rng.gen_range(-bound..bound))
                            .collect()
                    })
                    .collect();
                Layer {
                    weights,
                    biases: vec![0.0; fan_out],
                }
            })
            .collect();
        Self { layers }
    }

    /// Forward pass returning the fraud probability.
    pub fn predict(&self, input: &[f64]) -> f64 {
        let mut activation = input.to_vec();
        let last = self.layers.len() - 1;
        for (index, layer) in self.layers.iter().enumerate() {
            activation = layer
                .weights
                .iter()
                .zip(&layer.biases)
                .map(|(row, bias)| {
                    let z = row
                        .iter()
                        .zip(&activation)
                        .map(|(w, a)| w * a)
                        .sum::<f64>()
                        + bias;
                    if index == last {
                        sigmoid(z)
                    } else {
                        relu(z)
                    }
                })
                .collect();
        }
        activation[0]
    }

    /// One gradient step on a single labeled sample. Returns the
    /// cross-entropy loss before the update.
    pub fn train_step(&mut self, input: &[f64], label: f64, adam: &mut AdamState) -> f64 {
        // forward, keeping activations per layer for backprop
        let mut activations: Vec<Vec<f64>> = vec![input.to_vec()];
        let last = self.layers.len() - 1;
        for (index, layer) in self.layers.iter().enumerate() {
            let prev = activations.last().expect("input activation present");
            let next: Vec<f64> = layer
                .weights
                .iter()
                .zip(&layer.biases)
                .map(|(row, bias)| {
                    let z = row.iter().zip(prev).map(|(w, a)| w * a).sum::<f64>() + bias;
                    if index == last {
                        sigmoid(z)
                    } else {
                        relu(z)
                    }
                })
                .collect();
            activations.push(next);
        }

        let output = activations.last().expect("output activation present")[0];
        let clamped = output.clamp(PROB_EPS, 1.0 - PROB_EPS);
        let loss = -(label * clamped.ln() + (1.0 - label) * (1.0 - clamped).ln());

        // backward; sigmoid + BCE collapses the output delta to (p - y)
        adam.step += 1;
        let correction1 = 1.0 - ADAM_BETA1.powi(adam.step as i32);
        let correction2 = 1.0 - ADAM_BETA2.powi(adam.step as i32);
        let mut deltas = vec![output - label];
        for layer_index in (0..self.layers.len()).rev() {
            let prev_activation = &activations[layer_index];
            let layer = &self.layers[layer_index];

            let next_deltas: Vec<f64> = if layer_index > 0 {
                (0..prev_activation.len())
                    .map(|i| {
                        let upstream: f64 = layer
                            .weights
                            .iter()
                            .zip(&deltas)
                            .map(|(row, delta)| row[i] * delta)
                            .sum();
                        // ReLU gate of the producing layer
                        if prev_activation[i] > 0.0 {
                            upstream
                        } else {
                            0.0
                        }
                    })
                    .collect()
            } else {
                Vec::new()
            };

            let layer = &mut self.layers[layer_index];
            for (out, delta) in deltas.iter().enumerate() {
                for (inp, prev) in prev_activation.iter().enumerate() {
                    let grad = delta * prev + L2_PENALTY * layer.weights[out][inp];
                    let m = &mut adam.m_weights[layer_index][out][inp];
                    let v = &mut adam.v_weights[layer_index][out][inp];
                    *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * grad;
                    *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * grad * grad;
                    let m_hat = *m / correction1;
                    let v_hat = *v / correction2;
                    layer.weights[out][inp] -= LEARNING_RATE * m_hat / (v_hat.sqrt() + ADAM_EPS);
                }
                let m = &mut adam.m_biases[layer_index][out];
                let v = &mut adam.v_biases[layer_index][out];
                *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * delta;
                *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * delta * delta;
                let m_hat = *m / correction1;
                let v_hat = *v / correction2;
                layer.biases[out] -= LEARNING_RATE * m_hat / (v_hat.sqrt() + ADAM_EPS);
            }

            deltas = next_deltas;
        }

        loss
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl AdamState {
    /// Zeroed moments shaped like `network`.
    pub fn for_network(network: &Network) -> Self {
        let m_weights: Vec<Vec<Vec<f64>>> = network
            .layers
            .iter()
            .map(|layer| {
                layer
                    .weights
                    .iter()
                    .map(|row| vec![0.0; row.len()])
                    .collect()
            })
            .collect();
        let m_biases: Vec<Vec<f64>> = network
            .layers
            .iter()
            .map(|layer| vec![0.0; layer.biases.len()])
            .collect();
        Self {
            v_weights: m_weights.clone(),
            m_weights,
            v_biases: m_biases.clone(),
            m_biases,
            step: 0,
        }
    }
}
